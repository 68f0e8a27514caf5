pub mod admin;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod favorites;
pub mod listings;
pub mod mailer;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod payments;
pub mod reports;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::error;

use crate::config::Config;
use crate::error::ApiError;
use crate::mailer::Mailer;
use kiosk_db::Database;

pub type AppState = Arc<AppStateInner>;

/// Shared per-process state: the store handle, the configuration snapshot
/// taken at startup and the outbound mailer. Constructed once in `main` and
/// cloned into every handler.
pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
    pub mailer: Mailer,
}

/// The full HTTP surface under `/api`. Route protection lives in the
/// handler signatures (`CurrentUser` / `AdminUser` extractors), so public
/// and authenticated routes share one router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/catalog", get(catalog::catalog))
        // auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/verify-email", get(auth::verify_email))
        .route("/api/auth/resend-verification", post(auth::resend_verification))
        .route(
            "/api/auth/verify-identity",
            post(auth::submit_identity_verification),
        )
        .route("/api/init-admin", post(auth::init_admin))
        // listings
        .route("/api/listings", get(listings::search).post(listings::create))
        .route("/api/listings/boosted", get(listings::boosted))
        .route(
            "/api/listings/{id}",
            get(listings::get_one)
                .put(listings::update)
                .delete(listings::delete),
        )
        .route("/api/listings/{id}/repost", post(listings::repost))
        .route("/api/my-listings", get(listings::my_listings))
        .route("/api/my-stats", get(listings::my_stats))
        // messaging
        .route("/api/messages", post(messages::send))
        .route("/api/messages/unread-count", get(messages::unread_count))
        .route("/api/messages/conversations", get(messages::conversations))
        .route(
            "/api/messages/conversations/{id}",
            get(messages::conversation_messages),
        )
        // favorites
        .route("/api/favorites", get(favorites::list))
        .route(
            "/api/favorites/{listing_id}",
            post(favorites::add).delete(favorites::remove),
        )
        // paid options
        .route("/api/payments/pricing", get(payments::pricing))
        .route("/api/payments/boost", post(payments::boost))
        .route("/api/payments/extra-photos", post(payments::extra_photos))
        // reports
        .route("/api/reports", post(reports::submit))
        // admin console and the email moderation links
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/listings/pending", get(admin::pending_listings))
        .route("/api/admin/listings/action", get(moderation::listing_action))
        .route("/api/admin/listings/{id}/approve", post(admin::approve_listing))
        .route("/api/admin/listings/{id}/reject", post(admin::reject_listing))
        .route("/api/admin/verifications", get(admin::pending_verifications))
        .route(
            "/api/admin/verifications/{user_id}/approve",
            post(admin::approve_identity),
        )
        .route(
            "/api/admin/verifications/{user_id}/reject",
            post(admin::reject_identity),
        )
        .route("/api/admin/users/{user_id}/promote", post(admin::promote_user))
        .route("/api/admin/reports", get(admin::pending_reports))
        .route("/api/admin/reports/{id}/resolve", post(admin::resolve_report))
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("background task failed"))
        })?
        .map_err(ApiError::Internal)
}
