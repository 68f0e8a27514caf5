use super::OptionalExt;
use crate::Database;
use crate::models::{CreateUserOutcome, UserRow, VerificationRow};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

impl Database {
    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| insert_user(conn, user))
    }

    /// Duplicate checks and the insert under one connection lock, so a
    /// concurrent registration with the same email or phone reports a
    /// duplicate instead of tripping the UNIQUE constraint.
    pub fn create_user_unique(&self, user: &UserRow) -> Result<CreateUserOutcome> {
        self.with_conn(|conn| {
            if query_user(conn, "email", &user.email)?.is_some() {
                return Ok(CreateUserOutcome::EmailTaken);
            }
            if query_user(conn, "phone", &user.phone)?.is_some() {
                return Ok(CreateUserOutcome::PhoneTaken);
            }
            insert_user(conn, user)?;
            Ok(CreateUserOutcome::Created)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "phone", phone))
    }

    /// Match a still-valid email verification token.
    pub fn get_user_by_email_token(&self, token: &str, now: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLS} FROM users \
                 WHERE email_token = ?1 AND email_token_expires > ?2"
            ))?;
            stmt.query_row(params![token, now], user_from_row).optional()
        })
    }

    /// Flip `email_verified` and clear the token so the link is single-use.
    pub fn mark_email_verified(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET email_verified = 1, email_token = NULL, \
                 email_token_expires = NULL WHERE id = ?1",
                [user_id],
            )?;
            Ok(n == 1)
        })
    }

    pub fn set_email_token(&self, user_id: &str, token: &str, expires: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET email_token = ?2, email_token_expires = ?3 WHERE id = ?1",
                params![user_id, token, expires],
            )?;
            Ok(())
        })
    }

    pub fn insert_verification(&self, v: &VerificationRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO verifications (id, user_id, user_email, user_name, id_photo_front, \
                 id_photo_back, selfie_photo, status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    v.id,
                    v.user_id,
                    v.user_email,
                    v.user_name,
                    v.id_photo_front,
                    v.id_photo_back,
                    v.selfie_photo,
                    v.status,
                    v.created_at,
                ],
            )?;
            conn.execute(
                "UPDATE users SET identity_status = ?2, identity_verified = 0 WHERE id = ?1",
                params![v.user_id, v.status],
            )?;
            Ok(())
        })
    }

    pub fn pending_verifications(&self) -> Result<Vec<VerificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, user_email, user_name, id_photo_front, id_photo_back, \
                 selfie_photo, status, created_at \
                 FROM verifications WHERE status = 'pending' ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(VerificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        user_email: row.get(2)?,
                        user_name: row.get(3)?,
                        id_photo_front: row.get(4)?,
                        id_photo_back: row.get(5)?,
                        selfie_photo: row.get(6)?,
                        status: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Admin resolution of an identity submission.
    pub fn set_identity_verified(&self, user_id: &str, approved: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let status = if approved { "approved" } else { "rejected" };
            let n = conn.execute(
                "UPDATE users SET identity_verified = ?2, identity_status = ?3 WHERE id = ?1",
                params![user_id, approved, status],
            )?;
            conn.execute(
                "UPDATE verifications SET status = ?2 WHERE user_id = ?1 AND status = 'pending'",
                params![user_id, status],
            )?;
            Ok(n == 1)
        })
    }

    pub fn make_admin(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE users SET is_admin = 1 WHERE id = ?1", [user_id])?;
            Ok(n == 1)
        })
    }

    pub fn any_admin_exists(&self) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |row| {
                    row.get(0)
                })?;
            Ok(count > 0)
        })
    }

    pub fn insert_notification(&self, id: &str, kind: &str, user_id: Option<&str>, body: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, kind, user_id, body, is_read, created_at) \
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![id, kind, user_id, body, now],
            )?;
            Ok(())
        })
    }
}

const USER_COLS: &str = "id, email, phone, password, first_name, last_name, pseudo, birth_date, \
     email_verified, email_token, email_token_expires, identity_verified, identity_status, \
     is_admin, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        phone: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        pseudo: row.get(6)?,
        birth_date: row.get(7)?,
        email_verified: row.get(8)?,
        email_token: row.get(9)?,
        email_token_expires: row.get(10)?,
        identity_verified: row.get(11)?,
        identity_status: row.get(12)?,
        is_admin: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn insert_user(conn: &Connection, user: &UserRow) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, phone, password, first_name, last_name, pseudo, \
         birth_date, email_verified, email_token, email_token_expires, identity_verified, \
         identity_status, is_admin, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            user.id,
            user.email,
            user.phone,
            user.password,
            user.first_name,
            user.last_name,
            user.pseudo,
            user.birth_date,
            user.email_verified,
            user.email_token,
            user.email_token_expires,
            user.identity_verified,
            user.identity_status,
            user.is_admin,
            user.created_at,
        ],
    )?;
    Ok(())
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], user_from_row).optional()
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use crate::models::CreateUserOutcome;
    use crate::{now_ts, ts};
    use chrono::{Duration, Utc};

    #[test]
    fn duplicate_email_is_a_constraint_violation() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        let dup = testutil::user("u2", "a@example.com", "0600000002");
        assert!(db.create_user(&dup).is_err());
    }

    #[test]
    fn guarded_insert_reports_duplicates_instead_of_failing() {
        let db = testutil::db();
        match db
            .create_user_unique(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap()
        {
            CreateUserOutcome::Created => {}
            _ => panic!("first insert should succeed"),
        }
        match db
            .create_user_unique(&testutil::user("u2", "a@example.com", "0600000002"))
            .unwrap()
        {
            CreateUserOutcome::EmailTaken => {}
            _ => panic!("same email should report EmailTaken"),
        }
        match db
            .create_user_unique(&testutil::user("u3", "b@example.com", "0600000001"))
            .unwrap()
        {
            CreateUserOutcome::PhoneTaken => {}
            _ => panic!("same phone should report PhoneTaken"),
        }
        assert!(db.get_user_by_id("u2").unwrap().is_none());
        assert!(db.get_user_by_id("u3").unwrap().is_none());
    }

    #[test]
    fn email_token_is_single_use() {
        let db = testutil::db();
        let mut u = testutil::user("u1", "a@example.com", "0600000001");
        u.email_verified = false;
        u.email_token = Some("tok".into());
        u.email_token_expires = Some(ts(Utc::now() + Duration::hours(24)));
        db.create_user(&u).unwrap();

        let found = db.get_user_by_email_token("tok", &now_ts()).unwrap();
        assert_eq!(found.map(|u| u.id).as_deref(), Some("u1"));

        assert!(db.mark_email_verified("u1").unwrap());
        assert!(db.get_user_by_email_token("tok", &now_ts()).unwrap().is_none());
        assert!(db.get_user_by_id("u1").unwrap().unwrap().email_verified);
    }

    #[test]
    fn expired_email_token_does_not_match() {
        let db = testutil::db();
        let mut u = testutil::user("u1", "a@example.com", "0600000001");
        u.email_token = Some("tok".into());
        u.email_token_expires = Some(ts(Utc::now() - Duration::hours(1)));
        db.create_user(&u).unwrap();

        assert!(db.get_user_by_email_token("tok", &now_ts()).unwrap().is_none());
    }

    #[test]
    fn identity_resolution_updates_user_and_submission() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_verification(&crate::models::VerificationRow {
            id: "v1".into(),
            user_id: "u1".into(),
            user_email: "a@example.com".into(),
            user_name: "pseudo u1".into(),
            id_photo_front: "front".into(),
            id_photo_back: "back".into(),
            selfie_photo: "selfie".into(),
            status: "pending".into(),
            created_at: now_ts(),
        })
        .unwrap();

        assert_eq!(db.pending_verifications().unwrap().len(), 1);
        assert!(db.set_identity_verified("u1", true).unwrap());
        assert!(db.pending_verifications().unwrap().is_empty());
        assert!(db.get_user_by_id("u1").unwrap().unwrap().identity_verified);
    }
}
