mod commerce;
mod listings;
mod messaging;
mod users;

pub use listings::ListingFilter;

use crate::models::ListingRow;
use anyhow::Result;
use rusqlite::Row;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Column list shared by every query that materializes a full listing row.
/// Order must match [`listing_from_row`].
pub(crate) const LISTING_COLS: &str = "id, user_id, user_name, title, description, price, \
     category, sub_category, location, latitude, longitude, photos, details, \
     status, rejection_reason, is_boosted, boost_until, views, has_extra_photos, \
     created_at, expires_at, last_repost_date, validated_at";

pub(crate) fn listing_from_row(row: &Row) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        price: row.get(5)?,
        category: row.get(6)?,
        sub_category: row.get(7)?,
        location: row.get(8)?,
        latitude: row.get(9)?,
        longitude: row.get(10)?,
        photos: row.get(11)?,
        details: row.get(12)?,
        status: row.get(13)?,
        rejection_reason: row.get(14)?,
        is_boosted: row.get(15)?,
        boost_until: row.get(16)?,
        views: row.get(17)?,
        has_extra_photos: row.get(18)?,
        created_at: row.get(19)?,
        expires_at: row.get(20)?,
        last_repost_date: row.get(21)?,
        validated_at: row.get(22)?,
    })
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::models::{ListingRow, UserRow};
    use crate::{Database, now_ts, ts};
    use chrono::{Duration, Utc};

    pub fn db() -> Database {
        Database::open_in_memory().expect("in-memory db")
    }

    pub fn user(id: &str, email: &str, phone: &str) -> UserRow {
        UserRow {
            id: id.into(),
            email: email.into(),
            phone: phone.into(),
            password: "$argon2id$fake".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            pseudo: format!("pseudo {id}"),
            birth_date: "1990-01-15".into(),
            email_verified: true,
            email_token: None,
            email_token_expires: None,
            identity_verified: false,
            identity_status: None,
            is_admin: false,
            created_at: now_ts(),
        }
    }

    pub fn listing(id: &str, owner: &str, status: &str) -> ListingRow {
        ListingRow {
            id: id.into(),
            user_id: owner.into(),
            user_name: format!("pseudo {owner}"),
            title: format!("Listing {id}"),
            description: "A fine machine".into(),
            price: 4200.0,
            category: "vehicle".into(),
            sub_category: "auto".into(),
            location: "Lyon".into(),
            latitude: None,
            longitude: None,
            photos: "[]".into(),
            details: r#"{"category":"vehicle","brand":"Peugeot","year":2015}"#.into(),
            status: status.into(),
            rejection_reason: None,
            is_boosted: false,
            boost_until: None,
            views: 0,
            has_extra_photos: false,
            created_at: now_ts(),
            expires_at: ts(Utc::now() + Duration::days(30)),
            last_repost_date: None,
            validated_at: None,
        }
    }
}
