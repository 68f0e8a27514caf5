use super::OptionalExt;
use crate::Database;
use crate::models::{PaymentRow, ReportRow};
use anyhow::Result;
use rusqlite::{Row, params};

impl Database {
    // -- Favorites --

    /// Returns false when the (user, listing) pair is already saved; the
    /// UNIQUE constraint makes the upsert race-free.
    pub fn add_favorite(&self, id: &str, user_id: &str, listing_id: &str, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO favorites (id, user_id, listing_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, listing_id, now],
            )?;
            Ok(n == 1)
        })
    }

    pub fn remove_favorite(&self, user_id: &str, listing_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
                params![user_id, listing_id],
            )?;
            Ok(n == 1)
        })
    }

    pub fn favorite_listing_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT listing_id FROM favorites WHERE user_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Payments --

    pub fn insert_payment(&self, p: &PaymentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO payments (id, user_id, listing_id, kind, amount, duration_days, \
                 method, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    p.id,
                    p.user_id,
                    p.listing_id,
                    p.kind,
                    p.amount,
                    p.duration_days,
                    p.method,
                    p.status,
                    p.created_at,
                ],
            )?;
            Ok(())
        })
    }

    // -- Reports --

    pub fn insert_report(&self, r: &ReportRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reports (id, listing_id, listing_title, reporter_id, reporter_name, \
                 reason, details, status, action, resolved_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    r.id,
                    r.listing_id,
                    r.listing_title,
                    r.reporter_id,
                    r.reporter_name,
                    r.reason,
                    r.details,
                    r.status,
                    r.action,
                    r.resolved_at,
                    r.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn pending_reports(&self) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {REPORT_COLS} FROM reports WHERE status = 'pending' \
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], report_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark a report resolved; returns the resolved row so the caller can
    /// apply the chosen action (e.g. deleting the reported listing).
    pub fn resolve_report(&self, id: &str, action: &str, now: &str) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE reports SET status = 'resolved', action = ?2, resolved_at = ?3 \
                 WHERE id = ?1",
                params![id, action, now],
            )?;
            if n == 0 {
                return Ok(None);
            }

            let mut stmt =
                conn.prepare(&format!("SELECT {REPORT_COLS} FROM reports WHERE id = ?1"))?;
            stmt.query_row([id], report_from_row).optional()
        })
    }
}

const REPORT_COLS: &str = "id, listing_id, listing_title, reporter_id, reporter_name, reason, \
     details, status, action, resolved_at, created_at";

fn report_from_row(row: &Row) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        listing_title: row.get(2)?,
        reporter_id: row.get(3)?,
        reporter_name: row.get(4)?,
        reason: row.get(5)?,
        details: row.get(6)?,
        status: row.get(7)?,
        action: row.get(8)?,
        resolved_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use crate::models::ReportRow;
    use crate::now_ts;

    #[test]
    fn duplicate_favorite_is_rejected() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "u1", "approved"))
            .unwrap();

        assert!(db.add_favorite("f1", "u1", "l1", &now_ts()).unwrap());
        assert!(!db.add_favorite("f2", "u1", "l1", &now_ts()).unwrap());
        assert_eq!(db.favorite_listing_ids("u1").unwrap(), vec!["l1"]);
    }

    #[test]
    fn remove_favorite_reports_absence() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "u1", "approved"))
            .unwrap();

        assert!(!db.remove_favorite("u1", "l1").unwrap());
        db.add_favorite("f1", "u1", "l1", &now_ts()).unwrap();
        assert!(db.remove_favorite("u1", "l1").unwrap());
    }

    #[test]
    fn report_resolution_round_trip() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "u1", "approved"))
            .unwrap();
        db.insert_report(&ReportRow {
            id: "r1".into(),
            listing_id: "l1".into(),
            listing_title: "Listing l1".into(),
            reporter_id: "u1".into(),
            reporter_name: "pseudo u1".into(),
            reason: "scam".into(),
            details: None,
            status: "pending".into(),
            action: None,
            resolved_at: None,
            created_at: now_ts(),
        })
        .unwrap();

        assert_eq!(db.pending_reports().unwrap().len(), 1);

        let resolved = db
            .resolve_report("r1", "delete_listing", &now_ts())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.action.as_deref(), Some("delete_listing"));
        assert!(db.pending_reports().unwrap().is_empty());
        assert!(db.resolve_report("missing", "ignore", &now_ts()).unwrap().is_none());
    }
}
