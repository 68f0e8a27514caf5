use axum::Json;
use axum::extract::{Query, State};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{AppState, blocking};
use kiosk_db::models::{ListingRow, ModerationResult};
use kiosk_db::now_ts;
use kiosk_types::api::ModerationOutcome;

/// Moderation links stay valid for a week.
const ACTION_TOKEN_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    fn as_status(self) -> &'static str {
        match self {
            ModerationAction::Approve => "approved",
            ModerationAction::Reject => "rejected",
        }
    }
}

/// Claims inside a moderation link. The token is the whole authorization:
/// whoever holds it can act on that one listing, once, until it expires.
#[derive(Debug, Serialize, Deserialize)]
struct ActionClaims {
    listing_id: Uuid,
    action: ModerationAction,
    exp: usize,
}

pub fn issue_action_token(
    listing_id: Uuid,
    action: ModerationAction,
    secret: &str,
) -> Result<String, ApiError> {
    let claims = ActionClaims {
        listing_id,
        action,
        exp: (Utc::now() + Duration::days(ACTION_TOKEN_DAYS)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("action token encoding failed: {e}")))
}

fn verify_action_token(token: &str, secret: &str) -> Option<(Uuid, ModerationAction)> {
    decode::<ActionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| (data.claims.listing_id, data.claims.action))
}

/// Ask the moderator to review a listing: an email with one-click
/// approve/reject links, or a stored notification when mail is off.
/// Best-effort, never fails the calling request.
pub fn request_moderation(state: &AppState, listing: &ListingRow, submitter_email: &str) {
    let Ok(listing_id) = Uuid::parse_str(&listing.id) else {
        warn!("Unroutable listing id {} in moderation request", listing.id);
        return;
    };

    let approve = issue_action_token(listing_id, ModerationAction::Approve, &state.config.jwt_secret);
    let reject = issue_action_token(listing_id, ModerationAction::Reject, &state.config.jwt_secret);
    let (Ok(approve), Ok(reject)) = (approve, reject) else {
        warn!("Failed to build moderation tokens for listing {}", listing.id);
        return;
    };

    let state = state.clone();
    let title = listing.title.clone();
    let price = listing.price;
    let location = listing.location.clone();
    let submitter_name = listing.user_name.clone();
    let submitter_email = submitter_email.to_string();
    let listing_row_id = listing.id.clone();

    tokio::task::spawn_blocking(move || {
        let base = format!("{}/api/admin/listings/action?token=", state.mailer.site_url());
        let sent = state.mailer.send_moderation_request(
            &title,
            price,
            &location,
            &submitter_name,
            &submitter_email,
            &format!("{base}{approve}"),
            &format!("{base}{reject}"),
        );
        if !sent {
            let body = format!("listing '{title}' ({listing_row_id}) awaits review");
            if let Err(e) = state.db.insert_notification(
                &Uuid::new_v4().to_string(),
                "moderation_request",
                None,
                &body,
                &now_ts(),
            ) {
                warn!("Failed to store moderation notification: {:#}", e);
            }
        }
    });
}

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub token: String,
}

/// The endpoint behind the email links. Always answers 200 so the click
/// lands on a page either way; `success` carries the real outcome.
pub async fn listing_action(
    State(state): State<AppState>,
    Query(query): Query<ActionQuery>,
) -> Result<Json<ModerationOutcome>, ApiError> {
    let Some((listing_id, action)) = verify_action_token(&query.token, &state.config.jwt_secret)
    else {
        return Ok(Json(ModerationOutcome {
            success: false,
            message: "invalid or expired moderation link".to_string(),
            listing_title: None,
        }));
    };

    let rejection_reason = match action {
        ModerationAction::Approve => None,
        ModerationAction::Reject => Some("rejected by moderation"),
    };

    let result = {
        let state = state.clone();
        blocking(move || {
            state.db.resolve_pending_listing(
                &listing_id.to_string(),
                action.as_status(),
                rejection_reason,
                &now_ts(),
            )
        })
        .await?
    };

    let outcome = match result {
        ModerationResult::NotFound => ModerationOutcome {
            success: false,
            message: "listing not found, it may have been deleted".to_string(),
            listing_title: None,
        },
        ModerationResult::AlreadyProcessed { status, title } => ModerationOutcome {
            success: false,
            message: format!("listing was already {status}"),
            listing_title: Some(title),
        },
        ModerationResult::Resolved(listing) => {
            info!("Listing {} {} via moderation link", listing.id, listing.status);

            if action == ModerationAction::Approve {
                notify_owner_approved(&state, &listing);
            }

            ModerationOutcome {
                success: true,
                message: match action {
                    ModerationAction::Approve => "listing approved and published".to_string(),
                    ModerationAction::Reject => "listing rejected".to_string(),
                },
                listing_title: Some(listing.title),
            }
        }
    };

    Ok(Json(outcome))
}

pub(crate) fn notify_owner_approved(state: &AppState, listing: &ListingRow) {
    let state = state.clone();
    let owner_id = listing.user_id.clone();
    let title = listing.title.clone();

    tokio::task::spawn_blocking(move || {
        match state.db.get_user_by_id(&owner_id) {
            Ok(Some(owner)) => {
                state
                    .mailer
                    .send_listing_approved(&owner.email, &owner.pseudo, &title);
            }
            Ok(None) => warn!("Owner {} vanished before approval notice", owner_id),
            Err(e) => warn!("Owner lookup failed for approval notice: {:#}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_token_round_trips() {
        let id = Uuid::new_v4();
        let token = issue_action_token(id, ModerationAction::Approve, "secret").unwrap();

        let (decoded_id, action) = verify_action_token(&token, "secret").unwrap();
        assert_eq!(decoded_id, id);
        assert_eq!(action, ModerationAction::Approve);
    }

    #[test]
    fn tampered_or_foreign_tokens_fail() {
        let token = issue_action_token(Uuid::new_v4(), ModerationAction::Reject, "secret").unwrap();

        assert!(verify_action_token(&token, "other-secret").is_none());
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(verify_action_token(&tampered, "secret").is_none());
        assert!(verify_action_token("not-a-token", "secret").is_none());
    }

    #[test]
    fn expired_token_fails() {
        let claims = ActionClaims {
            listing_id: Uuid::new_v4(),
            action: ModerationAction::Approve,
            exp: (Utc::now() - Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(verify_action_token(&token, "secret").is_none());
    }
}
