use axum::Json;
use axum::extract::State;
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking};
use kiosk_db::models::PaymentRow;
use kiosk_db::{now_ts, ts};
use kiosk_types::api::{BoostRequest, BoostResponse, ExtraPhotosRequest, ExtraPhotosResponse};

// Payment is simulated: every attempt settles instantly and the option is
// applied in the same store transaction scope. No provider round-trip.

const PAYMENT_METHODS: &[&str] = &["card", "paypal"];

fn check_method(method: &str) -> Result<(), ApiError> {
    if PAYMENT_METHODS.contains(&method) {
        Ok(())
    } else {
        Err(ApiError::validation("unsupported payment method"))
    }
}

/// The fixed price table, so clients can display the paid options.
pub async fn pricing(State(state): State<AppState>) -> Json<Value> {
    let p = &state.config.pricing;
    Json(json!({
        "currency": "EUR",
        "extra_photos": { "price": p.extra_photos },
        "boost": [
            { "duration_days": 14, "price": p.boost_14_days },
            { "duration_days": 30, "price": p.boost_30_days },
        ],
        "payment_methods": PAYMENT_METHODS,
    }))
}

pub async fn boost(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<BoostRequest>,
) -> Result<Json<BoostResponse>, ApiError> {
    check_method(&req.payment_method)?;
    let amount = state
        .config
        .pricing
        .boost_price(req.duration_days)
        .ok_or_else(|| ApiError::validation("boost duration must be 14 or 30 days"))?;

    let listing = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&req.listing_id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if listing.user_id != user.id.to_string() {
        return Err(ApiError::forbidden("you can only boost your own listings"));
    }

    let payment_id = Uuid::new_v4();
    let boost_until = Utc::now() + Duration::days(req.duration_days);

    {
        let state = state.clone();
        let listing_id = listing.id.clone();
        let payment = PaymentRow {
            id: payment_id.to_string(),
            user_id: user.id.to_string(),
            listing_id: listing_id.clone(),
            kind: "boost".to_string(),
            amount,
            duration_days: Some(req.duration_days),
            method: req.payment_method,
            status: "completed".to_string(),
            created_at: now_ts(),
        };
        blocking(move || {
            state.db.insert_payment(&payment)?;
            state.db.apply_boost(&listing_id, &ts(boost_until))?;
            Ok(())
        })
        .await?;
    }

    info!(
        "Listing {} boosted for {} days by {}",
        listing.id, req.duration_days, user.email
    );

    Ok(Json(BoostResponse {
        payment_id,
        amount,
        boost_until,
    }))
}

pub async fn extra_photos(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ExtraPhotosRequest>,
) -> Result<Json<ExtraPhotosResponse>, ApiError> {
    check_method(&req.payment_method)?;
    let amount = state.config.pricing.extra_photos;

    let listing = {
        let state = state.clone();
        blocking(move || state.db.get_listing(&req.listing_id.to_string())).await?
    }
    .ok_or_else(|| ApiError::not_found("listing not found"))?;

    if listing.user_id != user.id.to_string() {
        return Err(ApiError::forbidden(
            "you can only buy options for your own listings",
        ));
    }
    if listing.has_extra_photos {
        return Err(ApiError::conflict(
            "this listing already has the extra photos option",
        ));
    }

    let payment_id = Uuid::new_v4();
    {
        let state = state.clone();
        let listing_id = listing.id.clone();
        let payment = PaymentRow {
            id: payment_id.to_string(),
            user_id: user.id.to_string(),
            listing_id: listing_id.clone(),
            kind: "extra_photos".to_string(),
            amount,
            duration_days: None,
            method: req.payment_method,
            status: "completed".to_string(),
            created_at: now_ts(),
        };
        blocking(move || {
            state.db.insert_payment(&payment)?;
            state.db.set_extra_photos(&listing_id)?;
            Ok(())
        })
        .await?;
    }

    info!("Extra photos bought for listing {} by {}", listing.id, user.email);

    Ok(Json(ExtraPhotosResponse { payment_id, amount }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn boost_applies_while_the_listing_awaits_review() {
        let state = testutil::state();
        let owner = testutil::seed_user(&state, "owner@example.com", "0600000001");
        let mut row = testutil::listing_row(&owner);
        row.status = "pending".into();
        state.db.insert_listing(&row).unwrap();

        let resp = boost(
            State(state.clone()),
            owner,
            Json(BoostRequest {
                listing_id: row.id.parse().unwrap(),
                duration_days: 14,
                payment_method: "card".into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(resp.0.amount, 19.99);
        let stored = state.db.get_listing(&row.id).unwrap().unwrap();
        assert!(stored.is_boosted);
        assert_eq!(stored.status, "pending");
    }

    #[tokio::test]
    async fn boost_rejects_off_menu_durations_before_charging() {
        let state = testutil::state();
        let owner = testutil::seed_user(&state, "owner@example.com", "0600000001");
        let row = testutil::listing_row(&owner);
        state.db.insert_listing(&row).unwrap();

        let err = boost(
            State(state.clone()),
            owner,
            Json(BoostRequest {
                listing_id: row.id.parse().unwrap(),
                duration_days: 7,
                payment_method: "card".into(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(!state.db.get_listing(&row.id).unwrap().unwrap().is_boosted);
    }

    #[tokio::test]
    async fn pricing_serves_the_full_price_table() {
        let state = testutil::state();
        let Json(body) = pricing(State(state)).await;

        assert_eq!(body["currency"], "EUR");
        assert_eq!(body["extra_photos"]["price"], 3.99);
        assert_eq!(body["boost"][0]["duration_days"], 14);
        assert_eq!(body["boost"][0]["price"], 19.99);
        assert_eq!(body["boost"][1]["duration_days"], 30);
        assert_eq!(body["boost"][1]["price"], 24.99);
        assert_eq!(body["payment_methods"][0], "card");
    }
}
