use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking};
use kiosk_db::models::ReportRow;
use kiosk_db::now_ts;
use kiosk_types::api::ReportRequest;

pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ReportRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::validation("a reason is required"));
    }

    let listing = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&req.listing_id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if listing.user_id == user.id.to_string() {
        return Err(ApiError::validation("you cannot report your own listing"));
    }

    let report = ReportRow {
        id: Uuid::new_v4().to_string(),
        listing_id: listing.id.clone(),
        listing_title: listing.title.clone(),
        reporter_id: user.id.to_string(),
        reporter_name: user.pseudo.clone(),
        reason: req.reason.trim().to_string(),
        details: req.details,
        status: "pending".to_string(),
        action: None,
        resolved_at: None,
        created_at: now_ts(),
    };
    let report_id = report.id.clone();

    blocking(move || state.db.insert_report(&report)).await?;

    info!("Listing {} reported by {}", listing.id, user.email);
    Ok(Json(json!({
        "message": "report received, our team will review it",
        "report_id": report_id
    })))
}
