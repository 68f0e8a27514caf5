use super::{LISTING_COLS, OptionalExt, listing_from_row};
use crate::Database;
use crate::models::{AdminStats, ListingRow, ModerationResult, OwnerStats};
use anyhow::Result;
use rusqlite::{ToSql, params};

/// Search filters over the public listing index. Variant-specific fields are
/// matched through `json_extract` on the `details` column.
#[derive(Debug, Default)]
pub struct ListingFilter {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive substring match.
    pub location: Option<String>,
    // Vehicle
    pub brand: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub vehicle_type: Option<String>,
    pub min_year: Option<i64>,
    pub max_year: Option<i64>,
    pub max_mileage: Option<i64>,
    // Property
    pub min_surface: Option<i64>,
    pub max_surface: Option<i64>,
    pub min_rooms: Option<i64>,
    pub property_type: Option<String>,
    pub handicap_access: Option<bool>,
    pub has_garden: Option<bool>,
    pub boosted_only: bool,
    pub skip: i64,
    pub limit: i64,
}

impl Database {
    pub fn insert_listing(&self, l: &ListingRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO listings (id, user_id, user_name, title, description, price, \
                 category, sub_category, location, latitude, longitude, photos, details, status, \
                 rejection_reason, is_boosted, boost_until, views, has_extra_photos, created_at, \
                 expires_at, last_repost_date, validated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                params![
                    l.id,
                    l.user_id,
                    l.user_name,
                    l.title,
                    l.description,
                    l.price,
                    l.category,
                    l.sub_category,
                    l.location,
                    l.latitude,
                    l.longitude,
                    l.photos,
                    l.details,
                    l.status,
                    l.rejection_reason,
                    l.is_boosted,
                    l.boost_until,
                    l.views,
                    l.has_extra_photos,
                    l.created_at,
                    l.expires_at,
                    l.last_repost_date,
                    l.validated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {LISTING_COLS} FROM listings WHERE id = ?1"))?;
            stmt.query_row([id], listing_from_row).optional()
        })
    }

    /// Full rewrite of the mutable columns. Callers fetch the row, apply the
    /// partial update in memory, then persist the merged result.
    pub fn update_listing(&self, l: &ListingRow) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE listings SET title = ?2, description = ?3, price = ?4, \
                 sub_category = ?5, location = ?6, latitude = ?7, longitude = ?8, photos = ?9, \
                 details = ?10, status = ?11 WHERE id = ?1",
                params![
                    l.id,
                    l.title,
                    l.description,
                    l.price,
                    l.sub_category,
                    l.location,
                    l.latitude,
                    l.longitude,
                    l.photos,
                    l.details,
                    l.status,
                ],
            )?;
            Ok(n == 1)
        })
    }

    /// Hard delete. Favorites pointing at the listing go with it; message
    /// threads keep their history and render a deleted-listing placeholder.
    pub fn delete_listing(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM favorites WHERE listing_id = ?1", [id])?;
            let n = conn.execute("DELETE FROM listings WHERE id = ?1", [id])?;
            Ok(n == 1)
        })
    }

    pub fn increment_views(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE listings SET views = views + 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Public search: approved and unexpired only, boosted listings first.
    pub fn search_listings(&self, filter: &ListingFilter, now: &str) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut conditions: Vec<String> =
                vec!["status = 'approved'".into(), "expires_at > ?1".into()];
            let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(now.to_string())];

            if let Some(v) = &filter.category {
                conditions.push(bind(&mut values, "category =", Box::new(v.clone())));
            }
            if let Some(v) = &filter.sub_category {
                conditions.push(bind(&mut values, "sub_category =", Box::new(v.clone())));
            }
            if let Some(v) = filter.min_price {
                conditions.push(bind(&mut values, "price >=", Box::new(v)));
            }
            if let Some(v) = filter.max_price {
                conditions.push(bind(&mut values, "price <=", Box::new(v)));
            }
            if let Some(v) = &filter.location {
                conditions.push(bind(&mut values, "location LIKE", Box::new(format!("%{v}%"))));
            }
            if let Some(v) = &filter.brand {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.brand') LIKE",
                    Box::new(format!("%{v}%")),
                ));
            }
            if let Some(v) = &filter.fuel_type {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.fuel_type') =",
                    Box::new(v.clone()),
                ));
            }
            if let Some(v) = &filter.transmission {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.transmission') =",
                    Box::new(v.clone()),
                ));
            }
            if let Some(v) = &filter.vehicle_type {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.vehicle_type') =",
                    Box::new(v.clone()),
                ));
            }
            if let Some(v) = filter.min_year {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.year') >=",
                    Box::new(v),
                ));
            }
            if let Some(v) = filter.max_year {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.year') <=",
                    Box::new(v),
                ));
            }
            if let Some(v) = filter.max_mileage {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.mileage') <=",
                    Box::new(v),
                ));
            }
            if let Some(v) = filter.min_surface {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.surface_m2') >=",
                    Box::new(v),
                ));
            }
            if let Some(v) = filter.max_surface {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.surface_m2') <=",
                    Box::new(v),
                ));
            }
            if let Some(v) = filter.min_rooms {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.rooms') >=",
                    Box::new(v),
                ));
            }
            if let Some(v) = &filter.property_type {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.property_type') =",
                    Box::new(v.clone()),
                ));
            }
            if let Some(v) = filter.handicap_access {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.handicap_access') =",
                    Box::new(v),
                ));
            }
            if let Some(v) = filter.has_garden {
                conditions.push(bind(
                    &mut values,
                    "json_extract(details, '$.has_garden') =",
                    Box::new(v),
                ));
            }
            if filter.boosted_only {
                conditions.push("is_boosted = 1".into());
                conditions.push(bind(&mut values, "boost_until >", Box::new(now.to_string())));
            }

            let limit_idx = {
                values.push(Box::new(filter.limit));
                values.len()
            };
            let skip_idx = {
                values.push(Box::new(filter.skip));
                values.len()
            };

            let sql = format!(
                "SELECT {LISTING_COLS} FROM listings WHERE {} \
                 ORDER BY is_boosted DESC, boost_until DESC, created_at DESC \
                 LIMIT ?{limit_idx} OFFSET ?{skip_idx}",
                conditions.join(" AND "),
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(values.iter()), listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn boosted_listings(&self, limit: i64, now: &str) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LISTING_COLS} FROM listings \
                 WHERE status = 'approved' AND is_boosted = 1 \
                 AND boost_until > ?1 AND expires_at > ?1 \
                 ORDER BY boost_until DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![now, limit], listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn listings_by_user(&self, user_id: &str) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LISTING_COLS} FROM listings WHERE user_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch fetch preserving no particular order.
    pub fn listings_by_ids(&self, ids: &[String]) -> Result<Vec<ListingRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "SELECT {LISTING_COLS} FROM listings WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let bind: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
            let rows = stmt
                .query_map(bind.as_slice(), listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn pending_listings(&self) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LISTING_COLS} FROM listings WHERE status = 'pending' \
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map([], listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Act on a moderation link. The pending re-check and the status flip are
    /// one guarded UPDATE, so stale or double-clicked links change nothing.
    pub fn resolve_pending_listing(
        &self,
        id: &str,
        new_status: &str,
        rejection_reason: Option<&str>,
        now: &str,
    ) -> Result<ModerationResult> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE listings SET status = ?2, rejection_reason = ?3, validated_at = ?4 \
                 WHERE id = ?1 AND status = 'pending'",
                params![id, new_status, rejection_reason, now],
            )?;

            let mut stmt =
                conn.prepare(&format!("SELECT {LISTING_COLS} FROM listings WHERE id = ?1"))?;
            let row = stmt.query_row([id], listing_from_row).optional()?;

            Ok(match row {
                None => ModerationResult::NotFound,
                Some(l) if n == 1 => ModerationResult::Resolved(l),
                Some(l) => ModerationResult::AlreadyProcessed {
                    status: l.status,
                    title: l.title,
                },
            })
        })
    }

    /// Manual admin-console status change, no pending guard.
    pub fn set_listing_status(
        &self,
        id: &str,
        status: &str,
        rejection_reason: Option<&str>,
        now: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE listings SET status = ?2, rejection_reason = ?3, validated_at = ?4 \
                 WHERE id = ?1",
                params![id, status, rejection_reason, now],
            )?;
            Ok(n == 1)
        })
    }

    pub fn repost_listing(&self, id: &str, now: &str, expires: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE listings SET status = 'pending', expires_at = ?2, last_repost_date = ?3 \
                 WHERE id = ?1",
                params![id, expires, now],
            )?;
            Ok(n == 1)
        })
    }

    pub fn apply_boost(&self, id: &str, until: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE listings SET is_boosted = 1, boost_until = ?2 WHERE id = ?1",
                params![id, until],
            )?;
            Ok(n == 1)
        })
    }

    pub fn set_extra_photos(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE listings SET has_extra_photos = 1 WHERE id = ?1",
                [id],
            )?;
            Ok(n == 1)
        })
    }

    pub fn owner_stats(&self, user_id: &str, now: &str) -> Result<OwnerStats> {
        self.with_conn(|conn| {
            let count = |sql: &str, binds: &[&dyn ToSql]| -> Result<i64> {
                Ok(conn.query_row(sql, binds, |row| row.get(0))?)
            };

            Ok(OwnerStats {
                total_listings: count(
                    "SELECT COUNT(*) FROM listings WHERE user_id = ?1",
                    &[&user_id],
                )?,
                active_listings: count(
                    "SELECT COUNT(*) FROM listings \
                     WHERE user_id = ?1 AND status = 'approved' AND expires_at > ?2",
                    &[&user_id, &now],
                )?,
                pending_listings: count(
                    "SELECT COUNT(*) FROM listings WHERE user_id = ?1 AND status = 'pending'",
                    &[&user_id],
                )?,
                total_views: count(
                    "SELECT COALESCE(SUM(views), 0) FROM listings WHERE user_id = ?1",
                    &[&user_id],
                )?,
                unread_messages: count(
                    "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND is_read = 0",
                    &[&user_id],
                )?,
            })
        })
    }

    pub fn admin_stats(&self, now: &str) -> Result<AdminStats> {
        self.with_conn(|conn| {
            let count = |sql: &str, binds: &[&dyn ToSql]| -> Result<i64> {
                Ok(conn.query_row(sql, binds, |row| row.get(0))?)
            };

            Ok(AdminStats {
                total_users: count("SELECT COUNT(*) FROM users", &[])?,
                verified_users: count(
                    "SELECT COUNT(*) FROM users WHERE identity_verified = 1",
                    &[],
                )?,
                total_listings: count("SELECT COUNT(*) FROM listings", &[])?,
                pending_listings: count(
                    "SELECT COUNT(*) FROM listings WHERE status = 'pending'",
                    &[],
                )?,
                active_listings: count(
                    "SELECT COUNT(*) FROM listings WHERE status = 'approved' AND expires_at > ?1",
                    &[&now],
                )?,
                pending_reports: count(
                    "SELECT COUNT(*) FROM reports WHERE status = 'pending'",
                    &[],
                )?,
            })
        })
    }
}

/// Append a bind value and return the condition with its placeholder index.
fn bind(values: &mut Vec<Box<dyn ToSql>>, cond: &str, value: Box<dyn ToSql>) -> String {
    values.push(value);
    format!("{} ?{}", cond, values.len())
}

#[cfg(test)]
mod tests {
    use super::super::testutil;
    use super::*;
    use crate::models::ModerationResult;
    use crate::{now_ts, ts};
    use chrono::{Duration, Utc};

    fn base_filter() -> ListingFilter {
        ListingFilter {
            limit: 20,
            ..Default::default()
        }
    }

    #[test]
    fn search_excludes_pending_and_expired() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();

        db.insert_listing(&testutil::listing("approved", "u1", "approved"))
            .unwrap();
        db.insert_listing(&testutil::listing("pending", "u1", "pending"))
            .unwrap();
        let mut expired = testutil::listing("expired", "u1", "approved");
        expired.expires_at = ts(Utc::now() - Duration::days(1));
        db.insert_listing(&expired).unwrap();

        let rows = db.search_listings(&base_filter(), &now_ts()).unwrap();
        let ids: Vec<&str> = rows.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["approved"]);
    }

    #[test]
    fn boosted_listings_sort_above_newer_ones() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();

        let mut old_boosted = testutil::listing("boosted", "u1", "approved");
        old_boosted.created_at = ts(Utc::now() - Duration::days(10));
        old_boosted.is_boosted = true;
        old_boosted.boost_until = Some(ts(Utc::now() + Duration::days(14)));
        db.insert_listing(&old_boosted).unwrap();

        db.insert_listing(&testutil::listing("fresh", "u1", "approved"))
            .unwrap();

        let rows = db.search_listings(&base_filter(), &now_ts()).unwrap();
        let ids: Vec<&str> = rows.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["boosted", "fresh"]);
    }

    #[test]
    fn variant_filters_use_the_details_payload() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("peugeot", "u1", "approved"))
            .unwrap();
        let mut renault = testutil::listing("renault", "u1", "approved");
        renault.details = r#"{"category":"vehicle","brand":"Renault","year":2021}"#.into();
        db.insert_listing(&renault).unwrap();

        let mut filter = base_filter();
        filter.brand = Some("renault".into());
        let rows = db.search_listings(&filter, &now_ts()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "renault");

        let mut filter = base_filter();
        filter.min_year = Some(2020);
        let rows = db.search_listings(&filter, &now_ts()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "renault");
    }

    #[test]
    fn moderation_resolution_is_single_use() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "u1", "pending"))
            .unwrap();

        match db
            .resolve_pending_listing("l1", "approved", None, &now_ts())
            .unwrap()
        {
            ModerationResult::Resolved(l) => assert_eq!(l.status, "approved"),
            _ => panic!("first resolution should succeed"),
        }

        match db
            .resolve_pending_listing("l1", "rejected", None, &now_ts())
            .unwrap()
        {
            ModerationResult::AlreadyProcessed { status, .. } => assert_eq!(status, "approved"),
            _ => panic!("second resolution must not change state"),
        }

        match db
            .resolve_pending_listing("missing", "approved", None, &now_ts())
            .unwrap()
        {
            ModerationResult::NotFound => {}
            _ => panic!("unknown listing should report not found"),
        }
    }

    #[test]
    fn repost_resets_lifecycle_fields() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "u1", "rejected"))
            .unwrap();

        let now = now_ts();
        let expires = ts(Utc::now() + Duration::days(30));
        assert!(db.repost_listing("l1", &now, &expires).unwrap());

        let l = db.get_listing("l1").unwrap().unwrap();
        assert_eq!(l.status, "pending");
        assert_eq!(l.expires_at, expires);
        assert_eq!(l.last_repost_date.as_deref(), Some(now.as_str()));
    }

    #[test]
    fn lifecycle_pending_to_approved_to_searchable() {
        // End-to-end store flow: submitted listing is invisible until the
        // moderation link approves it.
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "u1", "pending"))
            .unwrap();

        assert!(db.search_listings(&base_filter(), &now_ts()).unwrap().is_empty());

        db.resolve_pending_listing("l1", "approved", None, &now_ts())
            .unwrap();

        let rows = db.search_listings(&base_filter(), &now_ts()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "l1");
    }

    #[test]
    fn owner_stats_aggregate_views() {
        let db = testutil::db();
        db.create_user(&testutil::user("u1", "a@example.com", "0600000001"))
            .unwrap();
        db.insert_listing(&testutil::listing("l1", "u1", "approved"))
            .unwrap();
        db.increment_views("l1").unwrap();
        db.increment_views("l1").unwrap();

        let stats = db.owner_stats("u1", &now_ts()).unwrap();
        assert_eq!(stats.total_listings, 1);
        assert_eq!(stats.active_listings, 1);
        assert_eq!(stats.total_views, 2);
    }
}
