use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::listings::listing_response;
use crate::middleware::AdminUser;
use crate::moderation::notify_owner_approved;
use crate::{AppState, blocking};
use kiosk_db::models::{ReportRow, VerificationRow};
use kiosk_db::{now_ts, parse_ts};
use kiosk_types::api::{
    AdminStatsResponse, ListingResponse, PendingVerificationResponse, ReportResponse,
};

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::nil()
    })
}

pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdminStatsResponse>, ApiError> {
    let stats = blocking(move || state.db.admin_stats(&now_ts())).await?;
    Ok(Json(AdminStatsResponse {
        total_users: stats.total_users,
        verified_users: stats.verified_users,
        total_listings: stats.total_listings,
        pending_listings: stats.pending_listings,
        active_listings: stats.active_listings,
        pending_reports: stats.pending_reports,
    }))
}

// -- Listing review from the console --

pub async fn pending_listings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ListingResponse>>, ApiError> {
    let rows = blocking(move || state.db.pending_listings()).await?;
    Ok(Json(rows.iter().map(|r| listing_response(r, None)).collect()))
}

pub async fn approve_listing(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let listing = {
        let state = state.clone();
        blocking(move || {
            let updated =
                state
                    .db
                    .set_listing_status(&id.to_string(), "approved", None, &now_ts())?;
            if !updated {
                return Ok(None);
            }
            state.db.get_listing(&id.to_string())
        })
        .await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    info!("Listing {} approved by {}", listing.id, admin.0.email);
    notify_owner_approved(&state, &listing);
    Ok(Json(json!({ "message": "listing approved" })))
}

#[derive(Debug, Deserialize, Default)]
pub struct RejectBody {
    pub reason: Option<String>,
}

pub async fn reject_listing(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectBody>,
) -> Result<Json<Value>, ApiError> {
    let reason = body
        .reason
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("rejected by moderation")
        .to_string();

    let updated = blocking(move || {
        state
            .db
            .set_listing_status(&id.to_string(), "rejected", Some(&reason), &now_ts())
    })
    .await?;

    if !updated {
        return Err(ApiError::not_found("listing not found"));
    }
    info!("Listing {} rejected by {}", id, admin.0.email);
    Ok(Json(json!({ "message": "listing rejected" })))
}

// -- Identity checks --

fn verification_response(v: &VerificationRow) -> PendingVerificationResponse {
    PendingVerificationResponse {
        id: parse_uuid(&v.id, "verification id"),
        user_id: parse_uuid(&v.user_id, "user id"),
        user_email: v.user_email.clone(),
        user_name: v.user_name.clone(),
        id_photo_front: v.id_photo_front.clone(),
        id_photo_back: v.id_photo_back.clone(),
        selfie_photo: v.selfie_photo.clone(),
        submitted_at: parse_ts(&v.created_at),
    }
}

pub async fn pending_verifications(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PendingVerificationResponse>>, ApiError> {
    let rows = blocking(move || state.db.pending_verifications()).await?;
    Ok(Json(rows.iter().map(verification_response).collect()))
}

async fn resolve_identity(
    state: AppState,
    user_id: Uuid,
    approved: bool,
) -> Result<Json<Value>, ApiError> {
    let updated =
        blocking(move || state.db.set_identity_verified(&user_id.to_string(), approved)).await?;

    if !updated {
        return Err(ApiError::not_found("user not found"));
    }
    let message = if approved {
        "identity verified"
    } else {
        "identity verification rejected"
    };
    Ok(Json(json!({ "message": message })))
}

pub async fn approve_identity(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    info!("Identity of {} approved by {}", user_id, admin.0.email);
    resolve_identity(state, user_id, true).await
}

pub async fn reject_identity(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    info!("Identity of {} rejected by {}", user_id, admin.0.email);
    resolve_identity(state, user_id, false).await
}

pub async fn promote_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let updated = blocking(move || state.db.make_admin(&user_id.to_string())).await?;
    if !updated {
        return Err(ApiError::not_found("user not found"));
    }
    info!("User {} promoted to admin by {}", user_id, admin.0.email);
    Ok(Json(json!({ "message": "user promoted to admin" })))
}

// -- Reports --

fn report_response(r: &ReportRow) -> ReportResponse {
    ReportResponse {
        id: parse_uuid(&r.id, "report id"),
        listing_id: parse_uuid(&r.listing_id, "listing id"),
        listing_title: r.listing_title.clone(),
        reporter_id: parse_uuid(&r.reporter_id, "reporter id"),
        reporter_name: r.reporter_name.clone(),
        reason: r.reason.clone(),
        details: r.details.clone(),
        status: r.status.clone(),
        created_at: parse_ts(&r.created_at),
    }
}

pub async fn pending_reports(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ReportResponse>>, ApiError> {
    let rows = blocking(move || state.db.pending_reports()).await?;
    Ok(Json(rows.iter().map(report_response).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ResolveReportBody {
    /// `delete_listing` removes the reported listing; `dismiss` keeps it.
    pub action: String,
}

pub async fn resolve_report(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ResolveReportBody>,
) -> Result<Json<Value>, ApiError> {
    let delete_listing = match body.action.as_str() {
        "delete_listing" => true,
        "dismiss" => false,
        _ => {
            return Err(ApiError::validation(
                "action must be delete_listing or dismiss",
            ));
        }
    };

    let resolved = blocking(move || {
        let Some(report) = state.db.resolve_report(&id.to_string(), &body.action, &now_ts())?
        else {
            return Ok(None);
        };
        if delete_listing {
            state.db.delete_listing(&report.listing_id)?;
        }
        Ok(Some(report))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("report not found"))?;

    info!(
        "Report {} resolved ({}) by {}",
        resolved.id,
        resolved.action.as_deref().unwrap_or("?"),
        admin.0.email
    );
    Ok(Json(json!({ "message": "report resolved" })))
}
