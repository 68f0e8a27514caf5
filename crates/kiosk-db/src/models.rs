//! Database row types, mapping directly to SQLite rows.
//! Distinct from the kiosk-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub pseudo: String,
    pub birth_date: String,
    pub email_verified: bool,
    pub email_token: Option<String>,
    pub email_token_expires: Option<String>,
    pub identity_verified: bool,
    pub identity_status: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

pub struct ListingRow {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub sub_category: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// JSON array of base64 images.
    pub photos: String,
    /// JSON variant payload tagged by `category`.
    pub details: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub is_boosted: bool,
    pub boost_until: Option<String>,
    pub views: i64,
    pub has_extra_photos: bool,
    pub created_at: String,
    pub expires_at: String,
    pub last_repost_date: Option<String>,
    pub validated_at: Option<String>,
}

pub struct ConversationRow {
    pub id: String,
    pub listing_id: String,
    pub participant_low: String,
    pub participant_high: String,
    pub created_at: String,
    pub last_message_at: String,
}

impl ConversationRow {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }
}

/// Message joined with sender/receiver pseudos and the listing title.
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub listing_id: String,
    pub listing_title: String,
    pub sender_id: String,
    pub sender_name: String,
    pub receiver_id: String,
    pub receiver_name: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

/// One conversation as shown in the inbox list, assembled in a single query.
pub struct ConversationSummaryRow {
    pub id: String,
    pub listing_id: String,
    pub listing_title: String,
    pub listing_photo: Option<String>,
    pub listing_price: f64,
    pub other_user_id: String,
    pub other_user_name: String,
    pub last_message: String,
    pub last_message_at: String,
    pub unread_count: i64,
}

pub struct PaymentRow {
    pub id: String,
    pub user_id: String,
    pub listing_id: String,
    pub kind: String,
    pub amount: f64,
    pub duration_days: Option<i64>,
    pub method: String,
    pub status: String,
    pub created_at: String,
}

pub struct ReportRow {
    pub id: String,
    pub listing_id: String,
    pub listing_title: String,
    pub reporter_id: String,
    pub reporter_name: String,
    pub reason: String,
    pub details: Option<String>,
    pub status: String,
    pub action: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

pub struct VerificationRow {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub id_photo_front: String,
    pub id_photo_back: String,
    pub selfie_photo: String,
    pub status: String,
    pub created_at: String,
}

/// Owner-facing dashboard counters.
pub struct OwnerStats {
    pub total_listings: i64,
    pub active_listings: i64,
    pub pending_listings: i64,
    pub total_views: i64,
    pub unread_messages: i64,
}

/// Admin dashboard counters.
pub struct AdminStats {
    pub total_users: i64,
    pub verified_users: i64,
    pub total_listings: i64,
    pub pending_listings: i64,
    pub active_listings: i64,
    pub pending_reports: i64,
}

/// Outcome of inserting a new account: the duplicate checks and the insert
/// run under one connection lock, so two concurrent registrations with the
/// same email cannot both pass the check.
pub enum CreateUserOutcome {
    Created,
    EmailTaken,
    PhoneTaken,
}

/// Outcome of acting on a moderation link: the pending check and the status
/// flip happen in one step, so a second click reports `AlreadyProcessed`.
pub enum ModerationResult {
    NotFound,
    AlreadyProcessed { status: String, title: String },
    Resolved(ListingRow),
}
