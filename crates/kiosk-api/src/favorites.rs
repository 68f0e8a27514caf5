use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::listings::listing_response;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking};
use kiosk_db::now_ts;
use kiosk_types::api::ListingResponse;

pub async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let inserted = blocking(move || {
        if state.db.get_listing(&listing_id.to_string())?.is_none() {
            return Ok(None);
        }
        let inserted = state.db.add_favorite(
            &Uuid::new_v4().to_string(),
            &user.id.to_string(),
            &listing_id.to_string(),
            &now_ts(),
        )?;
        Ok(Some(inserted))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if !inserted {
        return Err(ApiError::conflict("listing is already in your favorites"));
    }
    Ok(Json(json!({ "message": "added to favorites" })))
}

pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(listing_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let removed = blocking(move || {
        state
            .db
            .remove_favorite(&user.id.to_string(), &listing_id.to_string())
    })
    .await?;

    if !removed {
        return Err(ApiError::not_found("listing is not in your favorites"));
    }
    Ok(Json(json!({ "message": "removed from favorites" })))
}

/// Saved listings, most recently saved first. Deleted listings silently
/// drop out of the list.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let rows = blocking(move || {
        let ids = state.db.favorite_listing_ids(&user.id.to_string())?;
        let mut listings = state.db.listings_by_ids(&ids)?;
        // The batch fetch has no order of its own; restore save order.
        listings.sort_by_key(|l| ids.iter().position(|id| *id == l.id));
        Ok(listings)
    })
    .await?;

    Ok(Json(rows.iter().map(|r| listing_response(r, None)).collect()))
}
