use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{Lead, LeadHistoryEntry, SegmentKey, SideEffectData};
use anyhow::{Context, Result};

const LEAD_COLUMNS: &str = "id, name, company, segment, display_order, value, loss_reason, notes,
                            won_ts, lost_ts, created_ts, modified_ts";

/// Lead repository for database operations
///
/// Backs the board's remote contracts:
/// - paging a stage (ordered by display_order, optionally filtered)
/// - rewriting the order of a stage
/// - moving a lead to another stage at a position, stamping won/lost data
///
/// Every stage change is written to `lead_history` in the same transaction.
pub struct LeadRepo;

impl LeadRepo {
    /// Create a lead at the end of its stage
    pub fn create(conn: &Connection, name: &str, company: Option<&str>, segment: SegmentKey) -> Result<Lead> {
        let mut lead = Lead::new(name.to_string(), segment);
        lead.company = company.map(|c| c.to_string());

        let tx = conn.unchecked_transaction()?;
        let max_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(display_order), -1) FROM leads WHERE segment = ?1",
            [segment.as_str()],
            |row| row.get(0),
        )?;
        lead.display_order = max_order + 1;

        tx.execute(
            "INSERT INTO leads (name, company, segment, display_order, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                lead.name,
                lead.company,
                lead.segment.as_str(),
                lead.display_order,
                lead.created_ts,
                lead.modified_ts
            ],
        )
        .with_context(|| format!("Failed to create lead: {}", name))?;
        let id = tx.last_insert_rowid();

        Self::record_history(&tx, id, "created", None, segment, None, None)?;
        tx.commit()?;

        Ok(Lead { id: Some(id), ..lead })
    }

    /// Get lead by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Lead>> {
        let sql = format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS);
        let lead = conn.query_row(&sql, [id], row_to_lead).optional()?;
        Ok(lead)
    }

    /// One page of a stage plus the stage's (filtered) total.
    /// `page` is 1-based.
    pub fn page(
        conn: &Connection,
        segment: SegmentKey,
        page: u32,
        page_size: u32,
        filter: Option<&str>,
    ) -> Result<(Vec<Lead>, u64)> {
        let pattern = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| format!("%{}%", f.to_lowercase()));
        let where_clause = "segment = ?1
             AND (?2 IS NULL OR LOWER(name) LIKE ?2 OR LOWER(COALESCE(company, '')) LIKE ?2)";

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM leads WHERE {}", where_clause),
            rusqlite::params![segment.as_str(), pattern],
            |row| row.get(0),
        )?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let sql = format!(
            "SELECT {} FROM leads WHERE {} ORDER BY display_order, id LIMIT ?3 OFFSET ?4",
            LEAD_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![segment.as_str(), pattern, i64::from(page_size), offset],
            row_to_lead,
        )?;

        let mut leads = Vec::new();
        for row in rows {
            leads.push(row?);
        }
        Ok((leads, total.max(0) as u64))
    }

    /// Rewrite display_order of a stage: `ids[i]` gets position `i`.
    /// Ids that are not in the stage are skipped.
    pub fn set_order(conn: &Connection, segment: SegmentKey, ids: &[i64]) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        let now = chrono::Utc::now().timestamp();
        for (position, id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE leads SET display_order = ?1, modified_ts = ?2 WHERE id = ?3 AND segment = ?4",
                rusqlite::params![position as i64, now, id, segment.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Move a lead to `to_segment` at `position` (clamped).
    ///
    /// Entering `won` stamps won_ts and stores the deal value; entering
    /// `lost` stamps lost_ts and stores the reason and notes; entering any
    /// other stage clears both stamps. Both stages are renumbered.
    pub fn move_to(
        conn: &Connection,
        id: i64,
        to_segment: SegmentKey,
        position: usize,
        side_effect: Option<&SideEffectData>,
    ) -> Result<Lead> {
        let lead = Self::get_by_id(conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Lead {} not found", id))?;
        let from_segment = lead.segment;
        let now = chrono::Utc::now().timestamp();
        let data = side_effect.cloned().unwrap_or_default();

        let tx = conn.unchecked_transaction()?;

        match to_segment {
            SegmentKey::Won if lead.won_ts.is_none() => {
                tx.execute(
                    "UPDATE leads SET won_ts = ?1, lost_ts = NULL, value = COALESCE(?2, value) WHERE id = ?3",
                    rusqlite::params![now, data.deal_value, id],
                )?;
            }
            SegmentKey::Lost if lead.lost_ts.is_none() => {
                tx.execute(
                    "UPDATE leads SET lost_ts = ?1, won_ts = NULL,
                            loss_reason = COALESCE(?2, loss_reason), notes = COALESCE(?3, notes)
                     WHERE id = ?4",
                    rusqlite::params![now, data.loss_reason, data.notes, id],
                )?;
            }
            SegmentKey::Won | SegmentKey::Lost => {}
            _ => {
                tx.execute(
                    "UPDATE leads SET won_ts = NULL, lost_ts = NULL WHERE id = ?1",
                    [id],
                )?;
            }
        }

        tx.execute(
            "UPDATE leads SET segment = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![to_segment.as_str(), now, id],
        )?;

        // Renumber the destination with the lead inserted at its position
        let mut dest_ids = Self::ordered_ids(&tx, to_segment)?;
        dest_ids.retain(|other| *other != id);
        let index = position.min(dest_ids.len());
        dest_ids.insert(index, id);
        Self::renumber(&tx, &dest_ids)?;
        if from_segment != to_segment {
            let source_ids = Self::ordered_ids(&tx, from_segment)?;
            Self::renumber(&tx, &source_ids)?;
        }

        let notes = data
            .notes
            .clone()
            .unwrap_or_else(|| format!("Moved to {}", to_segment.label()));
        let value = data.deal_value.or(lead.value);
        Self::record_history(&tx, id, "stage_changed", Some(from_segment), to_segment, value, Some(&notes))?;

        tx.commit()
            .with_context(|| format!("Failed to move lead {} to {}", id, to_segment))?;

        Self::get_by_id(conn, id)?
            .ok_or_else(|| anyhow::anyhow!("Lead {} disappeared during move", id))
    }

    /// Delete a lead (history cascades). Returns false if it did not exist.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM leads WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    /// Stage change history of a lead, oldest first
    pub fn history(conn: &Connection, id: i64) -> Result<Vec<LeadHistoryEntry>> {
        let mut stmt = conn.prepare(
            "SELECT id, lead_id, action, from_segment, to_segment, value, notes, created_ts
             FROM lead_history WHERE lead_id = ?1 ORDER BY created_ts, id",
        )?;
        let rows = stmt.query_map([id], |row| {
            let from: Option<String> = row.get(3)?;
            let to: String = row.get(4)?;
            Ok(LeadHistoryEntry {
                id: row.get(0)?,
                lead_id: row.get(1)?,
                action: row.get(2)?,
                from_segment: from.as_deref().map(|s| parse_segment(3, s)).transpose()?,
                to_segment: parse_segment(4, &to)?,
                value: row.get(5)?,
                notes: row.get(6)?,
                created_ts: row.get(7)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn ordered_ids(conn: &Connection, segment: SegmentKey) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT id FROM leads WHERE segment = ?1 ORDER BY display_order, id")?;
        let rows = stmt.query_map([segment.as_str()], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Renumber display_order to list positions (0, 1, 2, ...)
    fn renumber(conn: &Connection, ids: &[i64]) -> Result<()> {
        for (position, id) in ids.iter().enumerate() {
            conn.execute(
                "UPDATE leads SET display_order = ?1 WHERE id = ?2",
                rusqlite::params![position as i64, id],
            )?;
        }
        Ok(())
    }

    fn record_history(
        conn: &Connection,
        lead_id: i64,
        action: &str,
        from_segment: Option<SegmentKey>,
        to_segment: SegmentKey,
        value: Option<f64>,
        notes: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO lead_history (lead_id, action, from_segment, to_segment, value, notes, created_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                lead_id,
                action,
                from_segment.map(|s| s.as_str()),
                to_segment.as_str(),
                value,
                notes,
                chrono::Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }
}

fn parse_segment(column: usize, value: &str) -> rusqlite::Result<SegmentKey> {
    SegmentKey::from_str(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("unknown segment '{}'", value).into(),
        )
    })
}

fn row_to_lead(row: &Row<'_>) -> rusqlite::Result<Lead> {
    let segment: String = row.get(3)?;
    Ok(Lead {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        company: row.get(2)?,
        segment: parse_segment(3, &segment)?,
        display_order: row.get(4)?,
        value: row.get(5)?,
        loss_reason: row.get(6)?,
        notes: row.get(7)?,
        won_ts: row.get(8)?,
        lost_ts: row.get(9)?,
        created_ts: row.get(10)?,
        modified_ts: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    fn names(leads: &[Lead]) -> Vec<&str> {
        leads.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_create_appends_to_stage() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let a = LeadRepo::create(&conn, "Ana", Some("Acme"), SegmentKey::New).unwrap();
        let b = LeadRepo::create(&conn, "Bruno", None, SegmentKey::New).unwrap();

        assert_eq!(a.display_order, 0);
        assert_eq!(b.display_order, 1);
        let fetched = LeadRepo::get_by_id(&conn, a.id.unwrap()).unwrap().unwrap();
        assert_eq!(fetched.company.as_deref(), Some("Acme"));
        assert_eq!(LeadRepo::history(&conn, a.id.unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_page_and_total() {
        let conn = DbConnection::connect_in_memory().unwrap();
        for i in 0..45 {
            LeadRepo::create(&conn, &format!("Lead {:02}", i), None, SegmentKey::New).unwrap();
        }
        LeadRepo::create(&conn, "Elsewhere", None, SegmentKey::Won).unwrap();

        let (first, total) = LeadRepo::page(&conn, SegmentKey::New, 1, 20, None).unwrap();
        assert_eq!(total, 45);
        assert_eq!(first.len(), 20);
        assert_eq!(first[0].name, "Lead 00");

        let (third, _) = LeadRepo::page(&conn, SegmentKey::New, 3, 20, None).unwrap();
        assert_eq!(third.len(), 5);
        assert_eq!(third[4].name, "Lead 44");
    }

    #[test]
    fn test_page_filter_matches_name_or_company() {
        let conn = DbConnection::connect_in_memory().unwrap();
        LeadRepo::create(&conn, "Ana", Some("Acme Corp"), SegmentKey::New).unwrap();
        LeadRepo::create(&conn, "Bruno", Some("Globex"), SegmentKey::New).unwrap();
        LeadRepo::create(&conn, "Acmeson", None, SegmentKey::New).unwrap();

        let (leads, total) = LeadRepo::page(&conn, SegmentKey::New, 1, 20, Some("ACME")).unwrap();
        assert_eq!(total, 2);
        assert_eq!(names(&leads), vec!["Ana", "Acmeson"]);
    }

    #[test]
    fn test_set_order() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let a = LeadRepo::create(&conn, "A", None, SegmentKey::Contacted).unwrap();
        let b = LeadRepo::create(&conn, "B", None, SegmentKey::Contacted).unwrap();
        let c = LeadRepo::create(&conn, "C", None, SegmentKey::Contacted).unwrap();

        LeadRepo::set_order(&conn, SegmentKey::Contacted, &[c.id.unwrap(), a.id.unwrap(), b.id.unwrap()]).unwrap();

        let (leads, _) = LeadRepo::page(&conn, SegmentKey::Contacted, 1, 20, None).unwrap();
        assert_eq!(names(&leads), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_move_to_won_stamps_and_stores_value() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let lead = LeadRepo::create(&conn, "Ana", None, SegmentKey::InProgress).unwrap();
        LeadRepo::create(&conn, "Existing", None, SegmentKey::Won).unwrap();

        let moved = LeadRepo::move_to(&conn, lead.id.unwrap(), SegmentKey::Won, 0, Some(&SideEffectData::won(500.0))).unwrap();

        assert_eq!(moved.segment, SegmentKey::Won);
        assert_eq!(moved.display_order, 0);
        assert_eq!(moved.value, Some(500.0));
        assert!(moved.won_ts.is_some());
        assert!(moved.lost_ts.is_none());

        let (won, _) = LeadRepo::page(&conn, SegmentKey::Won, 1, 20, None).unwrap();
        assert_eq!(names(&won), vec!["Ana", "Existing"]);

        let history = LeadRepo::history(&conn, lead.id.unwrap()).unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.action, "stage_changed");
        assert_eq!(last.from_segment, Some(SegmentKey::InProgress));
        assert_eq!(last.to_segment, SegmentKey::Won);
        assert_eq!(last.value, Some(500.0));
    }

    #[test]
    fn test_move_to_lost_then_reopen_clears_stamps() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let lead = LeadRepo::create(&conn, "Ana", None, SegmentKey::Qualifying).unwrap();
        let id = lead.id.unwrap();

        let lost = LeadRepo::move_to(&conn, id, SegmentKey::Lost, 0, Some(&SideEffectData::lost("No budget"))).unwrap();
        assert_eq!(lost.loss_reason.as_deref(), Some("No budget"));
        assert!(lost.lost_ts.is_some());

        let reopened = LeadRepo::move_to(&conn, id, SegmentKey::Contacted, 0, None).unwrap();
        assert!(reopened.lost_ts.is_none());
        assert!(reopened.won_ts.is_none());
        assert_eq!(LeadRepo::history(&conn, id).unwrap().len(), 3);
    }

    #[test]
    fn test_move_renumbers_source() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let a = LeadRepo::create(&conn, "A", None, SegmentKey::New).unwrap();
        LeadRepo::create(&conn, "B", None, SegmentKey::New).unwrap();
        LeadRepo::create(&conn, "C", None, SegmentKey::New).unwrap();

        LeadRepo::move_to(&conn, a.id.unwrap(), SegmentKey::Contacted, 0, None).unwrap();

        let (left, _) = LeadRepo::page(&conn, SegmentKey::New, 1, 20, None).unwrap();
        let orders: Vec<i64> = left.iter().map(|l| l.display_order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_move_unknown_lead_fails() {
        let conn = DbConnection::connect_in_memory().unwrap();
        assert!(LeadRepo::move_to(&conn, 42, SegmentKey::Won, 0, None).is_err());
        assert!(!LeadRepo::delete(&conn, 42).unwrap());
    }
}
