use rusqlite::Connection;
use crate::board::{BoardRemote, MoveCommit, PageQuery, PageResponse, RemoteError};
use crate::models::{EntityId, SegmentKey};
use crate::repo::LeadRepo;

/// [`BoardRemote`] backed by the local lead database
pub struct SqliteRemote<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRemote<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn lead_id(id: &EntityId) -> Result<i64, RemoteError> {
    id.as_str()
        .parse()
        .map_err(|_| RemoteError::NotFound(id.clone()))
}

fn rejected(err: anyhow::Error) -> RemoteError {
    RemoteError::Rejected(format!("{:#}", err))
}

impl BoardRemote for SqliteRemote<'_> {
    fn fetch_segment_page(&mut self, query: &PageQuery) -> Result<PageResponse, RemoteError> {
        let (leads, total) = LeadRepo::page(
            self.conn,
            query.segment,
            query.page,
            query.page_size,
            query.filter_query.as_deref(),
        )
        .map_err(rejected)?;
        log::trace!("fetched {} leads of {} page {}", leads.len(), query.segment, query.page);

        Ok(PageResponse {
            entities: leads.iter().map(|lead| lead.to_entity()).collect(),
            total,
        })
    }

    fn commit_order(&mut self, segment: SegmentKey, ordered_ids: &[EntityId]) -> Result<(), RemoteError> {
        let ids = ordered_ids.iter().map(lead_id).collect::<Result<Vec<_>, _>>()?;
        LeadRepo::set_order(self.conn, segment, &ids).map_err(rejected)
    }

    fn commit_move(&mut self, commit: &MoveCommit) -> Result<(), RemoteError> {
        let id = lead_id(&commit.entity_id)?;
        if LeadRepo::get_by_id(self.conn, id).map_err(rejected)?.is_none() {
            return Err(RemoteError::NotFound(commit.entity_id.clone()));
        }
        LeadRepo::move_to(
            self.conn,
            id,
            commit.to_segment,
            commit.position,
            commit.side_effect.as_ref(),
        )
        .map(|_| ())
        .map_err(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, BoardConfig, DragOutcome};
    use crate::db::DbConnection;
    use crate::models::{ConfirmationOutcome, MoveIntent, SideEffectData};

    #[test]
    fn test_fetch_maps_leads_to_entities() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let lead = LeadRepo::create(&conn, "Ana", Some("Acme"), SegmentKey::New).unwrap();

        let mut remote = SqliteRemote::new(&conn);
        let page = remote
            .fetch_segment_page(&PageQuery {
                segment: SegmentKey::New,
                page: 1,
                page_size: 20,
                filter_query: None,
            })
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.entities[0].id, EntityId::from(lead.id.unwrap()));
        assert_eq!(page.entities[0].payload["name"], "Ana");
    }

    #[test]
    fn test_commit_move_unknown_lead() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let mut remote = SqliteRemote::new(&conn);
        let commit = MoveCommit {
            entity_id: EntityId::from(99),
            to_segment: SegmentKey::Won,
            position: 0,
            side_effect: None,
        };
        assert!(matches!(remote.commit_move(&commit), Err(RemoteError::NotFound(_))));

        let commit = MoveCommit {
            entity_id: EntityId::new("not-a-number"),
            ..commit
        };
        assert!(matches!(remote.commit_move(&commit), Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn test_board_gated_move_persists() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let lead = LeadRepo::create(&conn, "Ana", None, SegmentKey::InProgress).unwrap();
        let id = EntityId::from(lead.id.unwrap());

        let mut board = Board::new(BoardConfig::default(), SqliteRemote::new(&conn));
        assert!(board.load_all().is_complete());

        let intent = MoveIntent::new(id.clone(), SegmentKey::InProgress, SegmentKey::Won, 0);
        let request = match board.drag_end(intent).unwrap() {
            DragOutcome::AwaitingConfirmation(request) => request,
            other => panic!("expected confirmation, got {:?}", other),
        };
        let outcome = board
            .resolve(request.guard_token, ConfirmationOutcome::Approved, Some(SideEffectData::won(1200.0)))
            .unwrap();
        assert!(matches!(outcome, DragOutcome::Moved(ref report) if report.committed()));

        let stored = LeadRepo::get_by_id(&conn, lead.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.segment, SegmentKey::Won);
        assert_eq!(stored.value, Some(1200.0));
        assert_eq!(board.segment_view(SegmentKey::Won)[0].id, id);
    }

    #[test]
    fn test_board_reorder_persists() {
        let conn = DbConnection::connect_in_memory().unwrap();
        for name in ["A", "B", "C"] {
            LeadRepo::create(&conn, name, None, SegmentKey::Contacted).unwrap();
        }

        let mut board = Board::new(BoardConfig::default(), SqliteRemote::new(&conn));
        board.load_all();
        let report = board.reorder_within_segment(SegmentKey::Contacted, 2, 0).unwrap();
        assert!(report.committed);

        let (leads, _) = LeadRepo::page(&conn, SegmentKey::Contacted, 1, 20, None).unwrap();
        let names: Vec<&str> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }
}
