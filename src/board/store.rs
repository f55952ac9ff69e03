use std::collections::{BTreeMap, HashMap};
use crate::board::{BoardError, BoardResult};
use crate::models::{Entity, EntityId, SegmentKey};

/// How [`SegmentStore::upsert_entities`] treats what is already loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Clear the segment and reseed it from the incoming page
    Replace,
    /// Merge the incoming page into the tail of the segment
    Append,
}

/// What [`SegmentStore::upsert_entities`] did to the board
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upserted {
    /// Entities newly added to the target segment
    pub added: usize,
    /// One entry per entity taken out of another segment
    pub rehomed_from: Vec<SegmentKey>,
}

/// In-memory board contents.
///
/// Holds the loaded entities of every segment in display order and keeps two
/// structural rules:
/// - an entity id is loaded in at most one segment
/// - within a segment, `sort_key` is strictly increasing in list order
///
/// Every other board component reads and mutates entities only through these
/// methods.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStore {
    segments: BTreeMap<SegmentKey, Vec<Entity>>,
    locations: HashMap<EntityId, SegmentKey>,
}

impl Default for SegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentStore {
    /// Create a store with one empty segment per pipeline stage
    pub fn new() -> Self {
        let segments = SegmentKey::ALL.iter().map(|key| (*key, Vec::new())).collect();
        Self {
            segments,
            locations: HashMap::new(),
        }
    }

    /// Insert a page of entities into a segment.
    ///
    /// Incoming entities are rehomed to `segment`. An id that is already
    /// loaded replaces its prior instance: in place when it was already in
    /// this segment (append mode), otherwise it is taken out of its old
    /// segment first.
    pub fn upsert_entities(&mut self, segment: SegmentKey, entities: Vec<Entity>, mode: UpsertMode) -> Upserted {
        if mode == UpsertMode::Replace {
            let cleared = self.segments.get_mut(&segment).map(std::mem::take).unwrap_or_default();
            for entity in &cleared {
                self.locations.remove(&entity.id);
            }
        }

        let tail_start = self.len(segment);
        let mut upserted = Upserted::default();
        for mut entity in entities {
            entity.segment = segment;
            match self.locations.get(&entity.id).copied() {
                Some(current) if current == segment => {
                    let list = self.segment_mut(segment);
                    if let Some(pos) = list.iter().position(|e| e.id == entity.id) {
                        if pos < tail_start {
                            // Keep the slot the user already sees
                            entity.sort_key = list[pos].sort_key;
                        }
                        list[pos] = entity;
                    }
                    continue;
                }
                Some(current) => {
                    log::debug!("entity {} rehomed from {} to {} by page load", entity.id, current, segment);
                    let list = self.segment_mut(current);
                    list.retain(|e| e.id != entity.id);
                    upserted.rehomed_from.push(current);
                }
                None => {}
            }
            self.locations.insert(entity.id.clone(), segment);
            self.segment_mut(segment).push(entity);
            upserted.added += 1;
        }

        let list = self.segment_mut(segment);
        match mode {
            UpsertMode::Replace => {
                list.sort_by_key(|e| e.sort_key);
                enforce_increasing(list, 0);
            }
            UpsertMode::Append => enforce_increasing(list, tail_start),
        }
        upserted
    }

    /// Remove an entity from whichever segment holds it
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        let segment = self.locations.remove(id)?;
        let list = self.segment_mut(segment);
        let pos = list.iter().position(|e| &e.id == id)?;
        Some(list.remove(pos))
    }

    /// Move an entity to `to_segment` at `to_index`.
    ///
    /// The index is clamped to the destination length. Both the source and
    /// destination segments are renumbered from their list positions.
    /// Returns the index the entity landed at.
    pub fn move_entity(&mut self, id: &EntityId, to_segment: SegmentKey, to_index: usize) -> BoardResult<usize> {
        let from_segment = *self
            .locations
            .get(id)
            .ok_or_else(|| BoardError::UnknownEntity(id.clone()))?;

        let source = self.segment_mut(from_segment);
        let pos = source
            .iter()
            .position(|e| &e.id == id)
            .ok_or_else(|| BoardError::UnknownEntity(id.clone()))?;
        let mut entity = source.remove(pos);
        renumber(source);

        entity.segment = to_segment;
        let dest = self.segment_mut(to_segment);
        let index = to_index.min(dest.len());
        dest.insert(index, entity);
        renumber(dest);

        self.locations.insert(id.clone(), to_segment);
        Ok(index)
    }

    /// Reorder one segment by moving the entity at `from_index` to `to_index`
    pub fn reorder(&mut self, segment: SegmentKey, from_index: usize, to_index: usize) -> BoardResult<EntityId> {
        let list = self.segment_mut(segment);
        if from_index >= list.len() {
            return Err(BoardError::IndexOutOfRange {
                segment,
                from_index,
                len: list.len(),
            });
        }
        let entity = list.remove(from_index);
        let id = entity.id.clone();
        let index = to_index.min(list.len());
        list.insert(index, entity);
        renumber(list);
        Ok(id)
    }

    /// Read-only ordered view of a segment
    pub fn segment_view(&self, segment: SegmentKey) -> &[Entity] {
        self.segments.get(&segment).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of a segment in display order
    pub fn ordered_ids(&self, segment: SegmentKey) -> Vec<EntityId> {
        self.segment_view(segment).iter().map(|e| e.id.clone()).collect()
    }

    pub fn len(&self, segment: SegmentKey) -> usize {
        self.segment_view(segment).len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Total number of loaded entities across all segments
    pub fn total_loaded(&self) -> usize {
        self.locations.len()
    }

    /// Find the segment and index of a loaded entity
    pub fn locate(&self, id: &EntityId) -> Option<(SegmentKey, usize)> {
        let segment = *self.locations.get(id)?;
        let index = self.segment_view(segment).iter().position(|e| &e.id == id)?;
        Some((segment, index))
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        let (segment, index) = self.locate(id)?;
        self.segment_view(segment).get(index)
    }

    fn segment_mut(&mut self, segment: SegmentKey) -> &mut Vec<Entity> {
        self.segments.entry(segment).or_default()
    }
}

/// Renumber sort keys to list positions (0, 1, 2, ...)
fn renumber(list: &mut [Entity]) {
    for (index, entity) in list.iter_mut().enumerate() {
        entity.sort_key = index as i64;
    }
}

/// Bump sort keys from `start` on so they stay strictly increasing
fn enforce_increasing(list: &mut [Entity], start: usize) {
    for i in start.max(1)..list.len() {
        let floor = list[i - 1].sort_key;
        if list[i].sort_key <= floor {
            list[i].sort_key = floor + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, segment: SegmentKey, sort_key: i64) -> Entity {
        Entity::new(id, segment, sort_key)
    }

    fn ids(store: &SegmentStore, segment: SegmentKey) -> Vec<String> {
        store.segment_view(segment).iter().map(|e| e.id.to_string()).collect()
    }

    fn assert_increasing(store: &SegmentStore) {
        for key in SegmentKey::ALL {
            let keys: Vec<i64> = store.segment_view(key).iter().map(|e| e.sort_key).collect();
            assert!(keys.windows(2).all(|w| w[0] < w[1]), "{} not increasing: {:?}", key, keys);
        }
    }

    #[test]
    fn test_new_store_has_every_segment() {
        let store = SegmentStore::new();
        for key in SegmentKey::ALL {
            assert!(store.segment_view(key).is_empty());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_sorts_and_reseeds() {
        let mut store = SegmentStore::new();
        store.upsert_entities(SegmentKey::New, vec![entity("a", SegmentKey::New, 0)], UpsertMode::Append);

        let added = store.upsert_entities(
            SegmentKey::New,
            vec![entity("c", SegmentKey::New, 9), entity("b", SegmentKey::New, 2)],
            UpsertMode::Replace,
        );

        assert_eq!(added.added, 2);
        assert_eq!(ids(&store, SegmentKey::New), vec!["b", "c"]);
        assert!(store.locate(&EntityId::new("a")).is_none());
        assert_increasing(&store);
    }

    #[test]
    fn test_append_bumps_colliding_sort_keys() {
        let mut store = SegmentStore::new();
        store.upsert_entities(
            SegmentKey::New,
            vec![entity("a", SegmentKey::New, 5), entity("b", SegmentKey::New, 6)],
            UpsertMode::Append,
        );
        store.upsert_entities(
            SegmentKey::New,
            vec![entity("c", SegmentKey::New, 1), entity("d", SegmentKey::New, 1)],
            UpsertMode::Append,
        );

        assert_eq!(ids(&store, SegmentKey::New), vec!["a", "b", "c", "d"]);
        let keys: Vec<i64> = store.segment_view(SegmentKey::New).iter().map(|e| e.sort_key).collect();
        assert_eq!(keys, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_append_duplicate_replaces_in_place() {
        let mut store = SegmentStore::new();
        store.upsert_entities(
            SegmentKey::New,
            vec![entity("a", SegmentKey::New, 0), entity("b", SegmentKey::New, 1)],
            UpsertMode::Append,
        );
        let refreshed = entity("a", SegmentKey::New, 40).with_payload(serde_json::json!({"name": "fresh"}));
        let added = store.upsert_entities(SegmentKey::New, vec![refreshed, entity("c", SegmentKey::New, 41)], UpsertMode::Append);

        assert_eq!(added, Upserted { added: 1, rehomed_from: vec![] });
        assert_eq!(ids(&store, SegmentKey::New), vec!["a", "b", "c"]);
        assert_eq!(store.segment_view(SegmentKey::New)[0].payload["name"], "fresh");
        assert_increasing(&store);
    }

    #[test]
    fn test_upsert_rehomes_entity_from_other_segment() {
        let mut store = SegmentStore::new();
        store.upsert_entities(SegmentKey::New, vec![entity("x", SegmentKey::New, 0)], UpsertMode::Append);
        let upserted = store.upsert_entities(SegmentKey::Won, vec![entity("x", SegmentKey::Won, 0)], UpsertMode::Append);

        assert_eq!(upserted.rehomed_from, vec![SegmentKey::New]);
        assert!(store.segment_view(SegmentKey::New).is_empty());
        assert_eq!(store.locate(&EntityId::new("x")), Some((SegmentKey::Won, 0)));
        assert_eq!(store.total_loaded(), 1);
    }

    #[test]
    fn test_remove_entity() {
        let mut store = SegmentStore::new();
        store.upsert_entities(SegmentKey::Lost, vec![entity("a", SegmentKey::Lost, 0)], UpsertMode::Append);

        assert!(store.remove_entity(&EntityId::new("a")).is_some());
        assert!(store.remove_entity(&EntityId::new("a")).is_none());
        assert!(store.segment_view(SegmentKey::Lost).is_empty());
    }

    #[test]
    fn test_move_entity_renumbers_both_segments() {
        let mut store = SegmentStore::new();
        store.upsert_entities(
            SegmentKey::Qualifying,
            vec![entity("a", SegmentKey::Qualifying, 10), entity("x", SegmentKey::Qualifying, 20), entity("b", SegmentKey::Qualifying, 30)],
            UpsertMode::Append,
        );
        store.upsert_entities(
            SegmentKey::InProgress,
            vec![entity("c", SegmentKey::InProgress, 100), entity("d", SegmentKey::InProgress, 200)],
            UpsertMode::Append,
        );

        let index = store.move_entity(&EntityId::new("x"), SegmentKey::InProgress, 1).unwrap();

        assert_eq!(index, 1);
        assert_eq!(ids(&store, SegmentKey::Qualifying), vec!["a", "b"]);
        assert_eq!(ids(&store, SegmentKey::InProgress), vec!["c", "x", "d"]);
        let dest: Vec<i64> = store.segment_view(SegmentKey::InProgress).iter().map(|e| e.sort_key).collect();
        assert_eq!(dest, vec![0, 1, 2]);
        let source: Vec<i64> = store.segment_view(SegmentKey::Qualifying).iter().map(|e| e.sort_key).collect();
        assert_eq!(source, vec![0, 1]);
        assert_eq!(store.get(&EntityId::new("x")).unwrap().segment, SegmentKey::InProgress);
    }

    #[test]
    fn test_move_entity_clamps_index() {
        let mut store = SegmentStore::new();
        store.upsert_entities(SegmentKey::New, vec![entity("a", SegmentKey::New, 0)], UpsertMode::Append);

        let index = store.move_entity(&EntityId::new("a"), SegmentKey::Won, 99).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_move_unknown_entity_fails() {
        let mut store = SegmentStore::new();
        let err = store.move_entity(&EntityId::new("ghost"), SegmentKey::Won, 0).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_reorder() {
        let mut store = SegmentStore::new();
        store.upsert_entities(
            SegmentKey::New,
            vec![entity("a", SegmentKey::New, 0), entity("b", SegmentKey::New, 1), entity("c", SegmentKey::New, 2)],
            UpsertMode::Append,
        );

        let moved = store.reorder(SegmentKey::New, 2, 0).unwrap();
        assert_eq!(moved.as_str(), "c");
        assert_eq!(ids(&store, SegmentKey::New), vec!["c", "a", "b"]);
        assert_increasing(&store);

        assert!(store.reorder(SegmentKey::New, 3, 0).is_err());
    }

    #[test]
    fn test_partition_stays_disjoint_after_mixed_operations() {
        let mut store = SegmentStore::new();
        let page: Vec<Entity> = (0..6).map(|i| entity(&format!("e{}", i), SegmentKey::New, i)).collect();
        store.upsert_entities(SegmentKey::New, page, UpsertMode::Replace);

        store.move_entity(&EntityId::new("e1"), SegmentKey::Won, 0).unwrap();
        store.move_entity(&EntityId::new("e2"), SegmentKey::Won, 0).unwrap();
        store.upsert_entities(SegmentKey::Contacted, vec![entity("e2", SegmentKey::Contacted, 3)], UpsertMode::Append);
        store.reorder(SegmentKey::New, 0, 3).unwrap();
        store.move_entity(&EntityId::new("e2"), SegmentKey::New, 1).unwrap();

        let mut seen = std::collections::HashSet::new();
        for key in SegmentKey::ALL {
            for e in store.segment_view(key) {
                assert!(seen.insert(e.id.clone()), "{} loaded twice", e.id);
                assert_eq!(e.segment, key);
            }
        }
        assert_eq!(seen.len(), 6);
        assert_increasing(&store);
    }
}
