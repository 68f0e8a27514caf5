use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{CurrentUser, MaybeUser};
use crate::moderation::request_moderation;
use crate::{AppState, blocking};
use kiosk_db::models::ListingRow;
use kiosk_db::queries::ListingFilter;
use kiosk_db::{now_ts, parse_ts, ts};
use kiosk_types::api::{
    CreateListingRequest, ListingResponse, MyStatsResponse, UpdateListingRequest,
};
use kiosk_types::models::{Category, ListingDetails, ListingStatus, PropertyDetails, VehicleDetails};

/// Listings run out 30 days after submission or repost.
pub const LISTING_LIFETIME_DAYS: i64 = 30;
/// Minimum gap between two reposts of the same listing.
pub const REPOST_COOLDOWN_DAYS: i64 = 30;
/// Photo allowance, before and after the extra-photos purchase.
pub const FREE_PHOTO_LIMIT: usize = 5;
pub const EXTRA_PHOTO_LIMIT: usize = 10;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Map a stored row to the wire shape. Corrupt columns are logged and
/// defaulted rather than failing the whole page, matching the read path in
/// the store layer.
pub fn listing_response(row: &ListingRow, user_phone: Option<String>) -> ListingResponse {
    let parse_uuid = |raw: &str, what: &str| {
        Uuid::parse_str(raw).unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", what, raw, e);
            Uuid::nil()
        })
    };

    let details = serde_json::from_str::<ListingDetails>(&row.details).unwrap_or_else(|e| {
        warn!("Corrupt details on listing {}: {}", row.id, e);
        match row.category.parse::<Category>() {
            Ok(Category::Property) => ListingDetails::Property(PropertyDetails::default()),
            _ => ListingDetails::Vehicle(VehicleDetails::default()),
        }
    });

    let photos = serde_json::from_str::<Vec<String>>(&row.photos).unwrap_or_else(|e| {
        warn!("Corrupt photos on listing {}: {}", row.id, e);
        Vec::new()
    });

    let status = row.status.parse::<ListingStatus>().unwrap_or_else(|e| {
        warn!("{}", e);
        ListingStatus::Pending
    });

    ListingResponse {
        id: parse_uuid(&row.id, "listing id"),
        user_id: parse_uuid(&row.user_id, "listing owner id"),
        user_name: row.user_name.clone(),
        user_phone,
        title: row.title.clone(),
        description: row.description.clone(),
        price: row.price,
        sub_category: row.sub_category.clone(),
        location: row.location.clone(),
        latitude: row.latitude,
        longitude: row.longitude,
        photos,
        details,
        status,
        is_boosted: row.is_boosted,
        boost_until: row.boost_until.as_deref().map(parse_ts),
        views: row.views,
        has_extra_photos: row.has_extra_photos,
        created_at: parse_ts(&row.created_at),
        expires_at: parse_ts(&row.expires_at),
        last_repost_date: row.last_repost_date.as_deref().map(parse_ts),
    }
}

/// Days left before a listing may be reposted again, `None` once the
/// cooldown has fully elapsed. Partial days count as a full day of wait.
fn repost_wait_days(last_repost: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    let remaining = REPOST_COOLDOWN_DAYS - (now - last_repost).num_days();
    (remaining > 0).then_some(remaining)
}

fn photo_limit(has_extra_photos: bool) -> usize {
    if has_extra_photos {
        EXTRA_PHOTO_LIMIT
    } else {
        FREE_PHOTO_LIMIT
    }
}

fn validate_common(
    title: &str,
    description: &str,
    price: f64,
    photos: &[String],
    has_extra_photos: bool,
) -> Result<(), ApiError> {
    if title.trim().len() < 3 || title.len() > 100 {
        return Err(ApiError::validation("title must be 3 to 100 characters"));
    }
    if description.trim().len() < 10 {
        return Err(ApiError::validation(
            "description must be at least 10 characters",
        ));
    }
    if !(price > 0.0) || !price.is_finite() {
        return Err(ApiError::validation("price must be a positive amount"));
    }
    let limit = photo_limit(has_extra_photos);
    if photos.len() > limit {
        return Err(ApiError::validation(format!(
            "at most {limit} photos allowed"
        )));
    }
    Ok(())
}

// -- Search --

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub location: Option<String>,
    pub brand: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub vehicle_type: Option<String>,
    pub min_year: Option<i64>,
    pub max_year: Option<i64>,
    pub max_mileage: Option<i64>,
    pub min_surface: Option<i64>,
    pub max_surface: Option<i64>,
    pub min_rooms: Option<i64>,
    pub property_type: Option<String>,
    pub handicap_access: Option<bool>,
    pub has_garden: Option<bool>,
    #[serde(default)]
    pub boosted_only: bool,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl SearchQuery {
    fn into_filter(self) -> Result<ListingFilter, ApiError> {
        if let Some(category) = &self.category {
            category
                .parse::<Category>()
                .map_err(ApiError::validation)?;
        }

        Ok(ListingFilter {
            category: self.category,
            sub_category: self.sub_category,
            min_price: self.min_price,
            max_price: self.max_price,
            location: self.location,
            brand: self.brand,
            fuel_type: self.fuel_type,
            transmission: self.transmission,
            vehicle_type: self.vehicle_type,
            min_year: self.min_year,
            max_year: self.max_year,
            max_mileage: self.max_mileage,
            min_surface: self.min_surface,
            max_surface: self.max_surface,
            min_rooms: self.min_rooms,
            property_type: self.property_type,
            handicap_access: self.handicap_access,
            has_garden: self.has_garden,
            boosted_only: self.boosted_only,
            skip: self.skip.unwrap_or(0).max(0),
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        })
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let filter = query.into_filter()?;
    let rows = blocking(move || state.db.search_listings(&filter, &now_ts())).await?;
    Ok(Json(rows.iter().map(|r| listing_response(r, None)).collect()))
}

#[derive(Debug, Deserialize)]
pub struct BoostedQuery {
    pub limit: Option<i64>,
}

pub async fn boosted(
    State(state): State<AppState>,
    Query(query): Query<BoostedQuery>,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, MAX_PAGE_SIZE);
    let rows = blocking(move || state.db.boosted_listings(limit, &now_ts())).await?;
    Ok(Json(rows.iter().map(|r| listing_response(r, None)).collect()))
}

// -- Detail --

pub async fn get_one(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingResponse>, ApiError> {
    let mut row = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    let is_owner = user.as_ref().is_some_and(|u| u.id.to_string() == row.user_id);
    let is_admin = user.as_ref().is_some_and(|u| u.is_admin);

    // Unapproved listings are invisible to everyone but their owner and
    // the moderators.
    if row.status != "approved" && !is_owner && !is_admin {
        return Err(ApiError::not_found("listing not found"));
    }

    // Every non-owner fetch counts as a view, and the response carries the
    // count it just caused.
    if !is_owner {
        {
            let state = state.clone();
            let listing_id = row.id.clone();
            blocking(move || state.db.increment_views(&listing_id)).await?;
        }
        row.views += 1;
    }

    // Contact details only for signed-in viewers of a live listing.
    let user_phone = if user.is_some() && row.status == "approved" {
        let state = state.clone();
        let owner_id = row.user_id.clone();
        blocking(move || state.db.get_user_by_id(&owner_id))
            .await?
            .map(|owner| owner.phone)
    } else {
        None
    };

    Ok(Json(listing_response(&row, user_phone)))
}

// -- Owner CRUD --

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<ListingResponse>, ApiError> {
    if !user.email_verified {
        return Err(ApiError::forbidden(
            "verify your email address before posting a listing",
        ));
    }
    validate_common(&req.title, &req.description, req.price, &req.photos, false)?;

    let now = Utc::now();
    let row = ListingRow {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.to_string(),
        user_name: user.pseudo.clone(),
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        price: req.price,
        category: req.details.category().as_str().to_string(),
        sub_category: req.sub_category,
        location: req.location,
        latitude: req.latitude,
        longitude: req.longitude,
        photos: serde_json::to_string(&req.photos)
            .map_err(|e| ApiError::Internal(e.into()))?,
        details: serde_json::to_string(&req.details)
            .map_err(|e| ApiError::Internal(e.into()))?,
        status: "pending".to_string(),
        rejection_reason: None,
        is_boosted: false,
        boost_until: None,
        views: 0,
        has_extra_photos: false,
        created_at: ts(now),
        expires_at: ts(now + Duration::days(LISTING_LIFETIME_DAYS)),
        last_repost_date: None,
        validated_at: None,
    };

    let row = {
        let state = state.clone();
        blocking(move || {
            state.db.insert_listing(&row)?;
            Ok(row)
        })
        .await?
    };

    info!("Listing {} submitted by {}", row.id, user.email);
    request_moderation(&state, &row, &user.email);

    Ok(Json(listing_response(&row, None)))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<ListingResponse>, ApiError> {
    let mut row = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if row.user_id != user.id.to_string() && !user.is_admin {
        return Err(ApiError::forbidden("you can only edit your own listings"));
    }

    if let Some(title) = req.title {
        row.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        row.description = description.trim().to_string();
    }
    if let Some(price) = req.price {
        row.price = price;
    }
    if let Some(sub_category) = req.sub_category {
        row.sub_category = sub_category;
    }
    if let Some(location) = req.location {
        row.location = location;
    }
    if let Some(latitude) = req.latitude {
        row.latitude = Some(latitude);
    }
    if let Some(longitude) = req.longitude {
        row.longitude = Some(longitude);
    }
    if let Some(photos) = &req.photos {
        row.photos = serde_json::to_string(photos).map_err(|e| ApiError::Internal(e.into()))?;
    }
    if let Some(details) = &req.details {
        // A listing cannot change category after the fact.
        if details.category().as_str() != row.category {
            return Err(ApiError::validation(
                "details do not match the listing category",
            ));
        }
        row.details = serde_json::to_string(details).map_err(|e| ApiError::Internal(e.into()))?;
    }

    let photos: Vec<String> = serde_json::from_str(&row.photos).unwrap_or_default();
    validate_common(&row.title, &row.description, row.price, &photos, row.has_extra_photos)?;

    // Owner edits go back through review; admin edits do not.
    let needs_review = !user.is_admin;
    if needs_review {
        row.status = "pending".to_string();
    }

    let row = {
        let state = state.clone();
        blocking(move || {
            state.db.update_listing(&row)?;
            Ok(row)
        })
        .await?
    };

    if needs_review {
        request_moderation(&state, &row, &user.email);
    }

    Ok(Json(listing_response(&row, None)))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let row = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if row.user_id != user.id.to_string() && !user.is_admin {
        return Err(ApiError::forbidden("you can only delete your own listings"));
    }

    blocking(move || state.db.delete_listing(&id.to_string())).await?;
    info!("Listing {} deleted by {}", row.id, user.email);
    Ok(Json(json!({ "message": "listing deleted" })))
}

pub async fn my_listings(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let rows = blocking(move || state.db.listings_by_user(&user.id.to_string())).await?;
    Ok(Json(rows.iter().map(|r| listing_response(r, None)).collect()))
}

pub async fn my_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<MyStatsResponse>, ApiError> {
    let stats = blocking(move || state.db.owner_stats(&user.id.to_string(), &now_ts())).await?;
    Ok(Json(MyStatsResponse {
        total_listings: stats.total_listings,
        active_listings: stats.active_listings,
        pending_listings: stats.pending_listings,
        total_views: stats.total_views,
        unread_messages: stats.unread_messages,
    }))
}

pub async fn repost(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingResponse>, ApiError> {
    let row = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if row.user_id != user.id.to_string() {
        return Err(ApiError::forbidden("you can only repost your own listings"));
    }

    if let Some(last) = row.last_repost_date.as_deref()
        && let Some(remaining) = repost_wait_days(parse_ts(last), Utc::now())
    {
        return Err(ApiError::conflict(format!(
            "listing was reposted recently, try again in {remaining} days"
        )));
    }

    let now = Utc::now();
    let row = {
        let state = state.clone();
        let listing_id = row.id.clone();
        blocking(move || {
            state
                .db
                .repost_listing(&listing_id, &ts(now), &ts(now + Duration::days(LISTING_LIFETIME_DAYS)))?;
            Ok(state.db.get_listing(&listing_id)?)
        })
        .await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    info!("Listing {} reposted by {}", row.id, user.email);
    request_moderation(&state, &row, &user.email);

    Ok(Json(listing_response(&row, None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn row() -> ListingRow {
        ListingRow {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            user_name: "marie".into(),
            title: "Peugeot 208".into(),
            description: "Low mileage, serviced".into(),
            price: 9500.0,
            category: "vehicle".into(),
            sub_category: "car".into(),
            location: "Lyon".into(),
            latitude: None,
            longitude: None,
            photos: r#"["a","b"]"#.into(),
            details: r#"{"category":"vehicle","brand":"Peugeot","year":2019}"#.into(),
            status: "approved".into(),
            rejection_reason: None,
            is_boosted: false,
            boost_until: None,
            views: 4,
            has_extra_photos: false,
            created_at: "2026-08-01T10:00:00.000000Z".into(),
            expires_at: "2026-08-31T10:00:00.000000Z".into(),
            last_repost_date: None,
            validated_at: None,
        }
    }

    #[test]
    fn response_carries_variant_fields() {
        let resp = listing_response(&row(), None);
        assert_eq!(resp.photos, vec!["a", "b"]);
        assert_eq!(resp.status, ListingStatus::Approved);
        match resp.details {
            ListingDetails::Vehicle(v) => assert_eq!(v.brand.as_deref(), Some("Peugeot")),
            _ => panic!("expected vehicle details"),
        }
    }

    #[test]
    fn corrupt_columns_default_instead_of_failing() {
        let mut bad = row();
        bad.photos = "not json".into();
        bad.details = "{broken".into();
        bad.status = "limbo".into();

        let resp = listing_response(&bad, None);
        assert!(resp.photos.is_empty());
        assert_eq!(resp.status, ListingStatus::Pending);
        assert!(matches!(resp.details, ListingDetails::Vehicle(_)));
    }

    #[test]
    fn photo_limits_follow_the_paid_option() {
        let six: Vec<String> = (0..6).map(|i| format!("p{i}")).collect();
        assert!(validate_common("Title", "long enough text", 10.0, &six, false).is_err());
        assert!(validate_common("Title", "long enough text", 10.0, &six, true).is_ok());

        let eleven: Vec<String> = (0..11).map(|i| format!("p{i}")).collect();
        assert!(validate_common("Title", "long enough text", 10.0, &eleven, true).is_err());
    }

    #[test]
    fn rejects_bad_prices_and_short_text() {
        assert!(validate_common("ab", "long enough text", 10.0, &[], false).is_err());
        assert!(validate_common("Title", "short", 10.0, &[], false).is_err());
        assert!(validate_common("Title", "long enough text", 0.0, &[], false).is_err());
        assert!(validate_common("Title", "long enough text", f64::NAN, &[], false).is_err());
        assert!(validate_common("Title", "long enough text", 10.0, &[], false).is_ok());
    }

    #[test]
    fn page_size_is_clamped() {
        let filter = SearchQuery {
            limit: Some(10_000),
            skip: Some(-5),
            ..Default::default()
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.limit, MAX_PAGE_SIZE);
        assert_eq!(filter.skip, 0);
    }

    #[test]
    fn unknown_category_filter_is_rejected() {
        let err = SearchQuery {
            category: Some("boat".into()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn repost_wait_counts_partial_days_as_a_full_day() {
        let now = Utc::now();
        assert_eq!(repost_wait_days(now, now), Some(REPOST_COOLDOWN_DAYS));
        assert_eq!(repost_wait_days(now - Duration::days(29), now), Some(1));
        assert_eq!(repost_wait_days(now - Duration::days(30), now), None);
        assert_eq!(repost_wait_days(now - Duration::days(45), now), None);
    }

    #[tokio::test]
    async fn repost_is_refused_one_day_short_of_the_cooldown() {
        let state = testutil::state();
        let owner = testutil::seed_user(&state, "owner@example.com", "0600000001");
        let mut row = testutil::listing_row(&owner);
        row.last_repost_date = Some(ts(Utc::now() - Duration::days(29)));
        state.db.insert_listing(&row).unwrap();

        let err = repost(State(state.clone()), owner, Path(row.id.parse().unwrap()))
            .await
            .unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert!(err.to_string().contains("try again in 1 days"));
        let stored = state.db.get_listing(&row.id).unwrap().unwrap();
        assert_eq!(stored.status, "approved");
    }

    #[tokio::test]
    async fn repost_succeeds_once_thirty_days_have_passed() {
        let state = testutil::state();
        let owner = testutil::seed_user(&state, "owner@example.com", "0600000001");
        let mut row = testutil::listing_row(&owner);
        row.last_repost_date = Some(ts(Utc::now() - Duration::days(30)));
        state.db.insert_listing(&row).unwrap();

        let resp = repost(State(state.clone()), owner, Path(row.id.parse().unwrap()))
            .await
            .unwrap();

        assert_eq!(resp.0.status, ListingStatus::Pending);
        let stored = state.db.get_listing(&row.id).unwrap().unwrap();
        assert_eq!(stored.status, "pending");
        assert!(stored.last_repost_date.unwrap() > ts(Utc::now() - Duration::days(1)));
    }

    #[tokio::test]
    async fn views_count_every_non_owner_fetch() {
        let state = testutil::state();
        let owner = testutil::seed_user(&state, "owner@example.com", "0600000001");
        let mut row = testutil::listing_row(&owner);
        row.status = "pending".into();
        state.db.insert_listing(&row).unwrap();
        let id: Uuid = row.id.parse().unwrap();

        // Owner fetches never count.
        let resp = get_one(State(state.clone()), MaybeUser(Some(owner.clone())), Path(id))
            .await
            .unwrap();
        assert_eq!(resp.0.views, 0);

        // An admin viewing the still-pending listing does, and the response
        // already carries the bumped count.
        let mut admin = testutil::seed_user(&state, "admin@example.com", "0600000002");
        admin.is_admin = true;
        let resp = get_one(State(state.clone()), MaybeUser(Some(admin)), Path(id))
            .await
            .unwrap();
        assert_eq!(resp.0.views, 1);
        assert_eq!(state.db.get_listing(&row.id).unwrap().unwrap().views, 1);
    }
}
