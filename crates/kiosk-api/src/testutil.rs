//! Handler-test fixtures: an in-memory state and pre-built rows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::{Config, Pricing};
use crate::mailer::Mailer;
use crate::middleware::CurrentUser;
use crate::{AppState, AppStateInner};
use kiosk_db::models::{ListingRow, UserRow};
use kiosk_db::{Database, now_ts, ts};

pub fn state() -> AppState {
    let config = Config {
        jwt_secret: "test-secret".into(),
        db_path: ":memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        site_url: "http://localhost:3000".into(),
        admin_email: "admin@kiosk.example".into(),
        token_days: 30,
        smtp: None,
        pricing: Pricing {
            extra_photos: 3.99,
            boost_14_days: 19.99,
            boost_30_days: 24.99,
        },
    };
    let mailer = Mailer::from_config(&config);
    Arc::new(AppStateInner {
        db: Database::open_in_memory().expect("in-memory database"),
        config,
        mailer,
    })
}

/// Insert a verified account and return it as the authenticated caller.
pub fn seed_user(state: &AppState, email: &str, phone: &str) -> CurrentUser {
    let id = Uuid::new_v4();
    let row = UserRow {
        id: id.to_string(),
        email: email.into(),
        phone: phone.into(),
        password: "unused-hash".into(),
        first_name: "Test".into(),
        last_name: "User".into(),
        pseudo: format!("user {}", &id.to_string()[..8]),
        birth_date: "1990-01-01".into(),
        email_verified: true,
        email_token: None,
        email_token_expires: None,
        identity_verified: false,
        identity_status: None,
        is_admin: false,
        created_at: now_ts(),
    };
    state.db.create_user(&row).expect("seed user");
    CurrentUser::from_row(row).expect("seed user row")
}

/// An approved, unexpired vehicle listing owned by `owner`. Not inserted,
/// so tests can tweak fields first.
pub fn listing_row(owner: &CurrentUser) -> ListingRow {
    ListingRow {
        id: Uuid::new_v4().to_string(),
        user_id: owner.id.to_string(),
        user_name: owner.pseudo.clone(),
        title: "Peugeot 208".into(),
        description: "Low mileage, serviced".into(),
        price: 9500.0,
        category: "vehicle".into(),
        sub_category: "car".into(),
        location: "Lyon".into(),
        latitude: None,
        longitude: None,
        photos: "[]".into(),
        details: r#"{"category":"vehicle","brand":"Peugeot","year":2019}"#.into(),
        status: "approved".into(),
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
