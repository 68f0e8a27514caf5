use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ListingDetails, ListingStatus};

// -- JWT Claims --

/// Session claims carried by the bearer token. Only the user id travels in
/// the token; everything else is resolved from the store per request, so a
/// token stays valid until expiry regardless of later account changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub phone: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    /// Public display name shown on listings.
    pub pseudo: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityVerificationRequest {
    /// Base64 images, front/back of the ID document plus a selfie.
    pub id_photo_front: String,
    pub id_photo_back: String,
    pub selfie_photo: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub pseudo: String,
    pub birth_date: String,
    pub email_verified: bool,
    pub identity_verified: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserResponse,
}

// -- Listings --

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub sub_category: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Base64 images. 5 free, 10 with the extra-photos option.
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(flatten)]
    pub details: ListingDetails,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub sub_category: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photos: Option<Vec<String>>,
    /// Full replacement payload; must match the listing's category.
    #[serde(flatten)]
    pub details: Option<ListingDetails>,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    /// Owner phone; only exposed on the authenticated detail route for an
    /// approved listing.
    pub user_phone: Option<String>,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub sub_category: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub photos: Vec<String>,
    #[serde(flatten)]
    pub details: ListingDetails,
    pub status: ListingStatus,
    pub is_boosted: bool,
    pub boost_until: Option<DateTime<Utc>>,
    pub views: i64,
    pub has_extra_photos: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_repost_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MyStatsResponse {
    pub total_listings: i64,
    pub active_listings: i64,
    pub pending_listings: i64,
    pub total_views: i64,
    pub unread_messages: i64,
}

// -- Messaging --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub listing_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub listing_id: Uuid,
    pub listing_title: String,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub receiver_id: Uuid,
    pub receiver_name: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub listing_title: String,
    pub listing_photo: Option<String>,
    pub listing_price: f64,
    pub other_user_id: Uuid,
    pub other_user_name: String,
    pub last_message: String,
    pub last_message_date: DateTime<Utc>,
    pub unread_count: i64,
}

// -- Paid options --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoostRequest {
    pub listing_id: Uuid,
    /// Only 14 or 30 are accepted.
    pub duration_days: i64,
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct BoostResponse {
    pub payment_id: Uuid,
    pub amount: f64,
    pub boost_until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtraPhotosRequest {
    pub listing_id: Uuid,
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct ExtraPhotosResponse {
    pub payment_id: Uuid,
    pub amount: f64,
}

// -- Reports --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportRequest {
    pub listing_id: Uuid,
    pub reason: String,
    pub details: Option<String>,
}

// -- Moderation --

/// Body of the email-link moderation endpoint. Always served with HTTP 200
/// so a browser following the link renders a page instead of an error
/// screen; callers must inspect `success`.
#[derive(Debug, Serialize)]
pub struct ModerationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_title: Option<String>,
}

// -- Admin --

#[derive(Debug, Serialize)]
pub struct AdminStatsResponse {
    pub total_users: i64,
    pub verified_users: i64,
    pub total_listings: i64,
    pub pending_listings: i64,
    pub active_listings: i64,
    pub pending_reports: i64,
}

#[derive(Debug, Serialize)]
pub struct PendingVerificationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub id_photo_front: String,
    pub id_photo_back: String,
    pub selfie_photo: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub listing_title: String,
    pub reporter_id: Uuid,
    pub reporter_name: String,
    pub reason: String,
    pub details: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
