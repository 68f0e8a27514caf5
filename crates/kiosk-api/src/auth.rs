use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::Json;
use axum::extract::{Query, State};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, blocking};
use kiosk_db::models::{CreateUserOutcome, UserRow, VerificationRow};
use kiosk_db::{now_ts, parse_ts, ts};
use kiosk_types::api::{
    Claims, IdentityVerificationRequest, LoginRequest, RegisterRequest, ResendVerificationRequest,
    TokenResponse, UserResponse,
};

const MIN_PASSWORD_LEN: usize = 8;
const MIN_AGE_YEARS: i32 = 18;
const EMAIL_TOKEN_HOURS: i64 = 24;

pub fn create_token(user_id: Uuid, secret: &str, token_days: i64) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::days(token_days)).timestamp() as usize;
    let claims = Claims { sub: user_id, exp };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        warn!("Stored password hash is unparseable");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Completed years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Display name cleanup: trimmed, internal runs of whitespace collapsed.
pub fn normalize_pseudo(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pseudos are alphanumeric plus spaces, 2 to 30 characters after cleanup.
pub fn validate_pseudo(pseudo: &str) -> Result<(), ApiError> {
    let count = pseudo.chars().count();
    if !(2..=30).contains(&count) {
        return Err(ApiError::validation("pseudo must be 2 to 30 characters"));
    }
    if !pseudo.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        return Err(ApiError::validation(
            "pseudo may only contain letters, digits and spaces",
        ));
    }
    Ok(())
}

fn random_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

pub fn user_response(row: &UserRow) -> Result<UserResponse, ApiError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id {}: {e}", row.id)))?;
    Ok(UserResponse {
        id,
        email: row.email.clone(),
        phone: row.phone.clone(),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        pseudo: row.pseudo.clone(),
        birth_date: row.birth_date.clone(),
        email_verified: row.email_verified,
        identity_verified: row.identity_verified,
        is_admin: row.is_admin,
        created_at: parse_ts(&row.created_at),
    })
}

impl From<CurrentUser> for UserResponse {
    fn from(user: CurrentUser) -> Self {
        UserResponse {
            id: user.id,
            email: user.email,
            phone: user.phone,
            first_name: user.first_name,
            last_name: user.last_name,
            pseudo: user.pseudo,
            birth_date: user.birth_date,
            email_verified: user.email_verified,
            identity_verified: user.identity_verified,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(String, NaiveDate), ApiError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::validation("invalid email address"));
    }
    if req.phone.trim().len() < 6 {
        return Err(ApiError::validation("invalid phone number"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::validation("first and last name are required"));
    }

    let birth = NaiveDate::parse_from_str(&req.birth_date, "%Y-%m-%d")
        .map_err(|_| ApiError::validation("birth_date must be YYYY-MM-DD"))?;
    if age_on(birth, Utc::now().date_naive()) < MIN_AGE_YEARS {
        return Err(ApiError::validation(format!(
            "you must be at least {MIN_AGE_YEARS} years old"
        )));
    }

    Ok((email, birth))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (email, _) = validate_registration(&req)?;

    let pseudo = normalize_pseudo(&req.pseudo);
    validate_pseudo(&pseudo)?;

    let phone = req.phone.trim().to_string();

    let password_hash = hash_password(&req.password)?;
    let email_token = random_token();
    let user = UserRow {
        id: Uuid::new_v4().to_string(),
        email,
        phone,
        password: password_hash,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        pseudo,
        birth_date: req.birth_date,
        email_verified: false,
        email_token: Some(email_token.clone()),
        email_token_expires: Some(ts(Utc::now() + Duration::hours(EMAIL_TOKEN_HOURS))),
        identity_verified: false,
        identity_status: None,
        is_admin: false,
        created_at: now_ts(),
    };

    // The duplicate checks and the insert share one store call, so two
    // concurrent signups with the same email get a conflict, not a
    // constraint error.
    let (outcome, user) = {
        let state = state.clone();
        blocking(move || {
            let outcome = state.db.create_user_unique(&user)?;
            Ok((outcome, user))
        })
        .await?
    };
    let row = match outcome {
        CreateUserOutcome::Created => user,
        CreateUserOutcome::EmailTaken => {
            return Err(ApiError::conflict("an account already exists for this email"));
        }
        CreateUserOutcome::PhoneTaken => {
            return Err(ApiError::conflict(
                "an account already exists for this phone number",
            ));
        }
    };

    info!("User registered: {}", row.email);

    // Fire and forget; a mail failure must not fail the signup.
    {
        let state = state.clone();
        let to = row.email.clone();
        let first_name = row.first_name.clone();
        tokio::task::spawn_blocking(move || {
            state.mailer.send_verification_email(&to, &first_name, &email_token);
        });
    }

    let user = user_response(&row)?;
    let access_token = create_token(user.id, &state.config.jwt_secret, state.config.token_days)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();

    let row = {
        let state = state.clone();
        blocking(move || state.db.get_user_by_email(&email)).await?
    };

    // Same failure either way, so the response does not reveal which
    // accounts exist.
    let row = row.ok_or_else(|| ApiError::unauthorized("invalid email or password"))?;
    if !verify_password(&req.password, &row.password) {
        return Err(ApiError::unauthorized("invalid email or password"));
    }

    let user = user_response(&row)?;
    let access_token = create_token(user.id, &state.config.jwt_secret, state.config.token_days)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

pub async fn me(user: CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<Value>, ApiError> {
    let verified = {
        let state = state.clone();
        blocking(move || {
            let Some(user) = state.db.get_user_by_email_token(&query.token, &now_ts())? else {
                return Ok(None);
            };
            state.db.mark_email_verified(&user.id)?;
            Ok(Some(user.email))
        })
        .await?
    };

    match verified {
        Some(email) => {
            info!("Email verified: {}", email);
            Ok(Json(json!({
                "success": true,
                "message": "email verified, you can now post listings"
            })))
        }
        None => Err(ApiError::validation("invalid or expired verification link")),
    }
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendVerificationRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = req.email.trim().to_lowercase();

    let row = {
        let state = state.clone();
        let email = email.clone();
        blocking(move || state.db.get_user_by_email(&email)).await?
    }
    .ok_or_else(|| ApiError::not_found("no account for this email"))?;

    if row.email_verified {
        return Err(ApiError::conflict("email is already verified"));
    }

    let token = random_token();
    {
        let state = state.clone();
        let user_id = row.id.clone();
        let token = token.clone();
        blocking(move || {
            let expires = ts(Utc::now() + Duration::hours(EMAIL_TOKEN_HOURS));
            state.db.set_email_token(&user_id, &token, &expires)
        })
        .await?;
    }

    let state2 = state.clone();
    let first_name = row.first_name.clone();
    tokio::task::spawn_blocking(move || {
        state2.mailer.send_verification_email(&email, &first_name, &token);
    });

    Ok(Json(json!({ "message": "verification email sent" })))
}

/// One-time bootstrap of the first admin account. Refused as soon as any
/// admin exists, so the endpoint is inert on a live deployment. The admin
/// account is created fully verified; there is no one to review it.
pub async fn init_admin(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (email, _) = validate_registration(&req)?;
    let pseudo = normalize_pseudo(&req.pseudo);
    validate_pseudo(&pseudo)?;

    let password_hash = hash_password(&req.password)?;
    let user = UserRow {
        id: Uuid::new_v4().to_string(),
        email,
        phone: req.phone.trim().to_string(),
        password: password_hash,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        pseudo,
        birth_date: req.birth_date,
        email_verified: true,
        email_token: None,
        email_token_expires: None,
        identity_verified: true,
        identity_status: Some("approved".to_string()),
        is_admin: true,
        created_at: now_ts(),
    };

    enum Bootstrap {
        Created(UserRow),
        AdminExists,
        Duplicate,
    }

    let outcome = {
        let state = state.clone();
        blocking(move || {
            if state.db.any_admin_exists()? {
                return Ok(Bootstrap::AdminExists);
            }
            match state.db.create_user_unique(&user)? {
                CreateUserOutcome::Created => Ok(Bootstrap::Created(user)),
                CreateUserOutcome::EmailTaken | CreateUserOutcome::PhoneTaken => {
                    Ok(Bootstrap::Duplicate)
                }
            }
        })
        .await?
    };

    let row = match outcome {
        Bootstrap::Created(row) => row,
        Bootstrap::AdminExists => {
            return Err(ApiError::conflict("an admin account already exists"));
        }
        Bootstrap::Duplicate => {
            return Err(ApiError::conflict("email or phone already in use"));
        }
    };

    info!("Admin account bootstrapped: {}", row.email);

    let user = user_response(&row)?;
    let access_token = create_token(user.id, &state.config.jwt_secret, state.config.token_days)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

pub async fn submit_identity_verification(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<IdentityVerificationRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.id_photo_front.is_empty() || req.id_photo_back.is_empty() || req.selfie_photo.is_empty()
    {
        return Err(ApiError::validation(
            "both sides of the ID document and a selfie are required",
        ));
    }
    if user.identity_verified {
        return Err(ApiError::conflict("identity is already verified"));
    }

    let verification = VerificationRow {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.to_string(),
        user_email: user.email.clone(),
        user_name: user.pseudo.clone(),
        id_photo_front: req.id_photo_front,
        id_photo_back: req.id_photo_back,
        selfie_photo: req.selfie_photo,
        status: "pending".to_string(),
        created_at: now_ts(),
    };
    let verification_id = verification.id.clone();

    {
        let state = state.clone();
        blocking(move || state.db.insert_verification(&verification)).await?;
    }

    // Notify the admin; without SMTP the notice lands in the notifications
    // table instead.
    let state2 = state.clone();
    let user_name = user.pseudo.clone();
    let user_email = user.email.clone();
    let vid = verification_id.clone();
    tokio::task::spawn_blocking(move || {
        if !state2
            .mailer
            .send_identity_submission_notice(&user_name, &user_email, &vid)
        {
            let body = format!("identity verification submitted by {user_name} ({user_email})");
            if let Err(e) = state2.db.insert_notification(
                &Uuid::new_v4().to_string(),
                "identity_verification",
                None,
                &body,
                &now_ts(),
            ) {
                warn!("Failed to store admin notification: {:#}", e);
            }
        }
    });

    Ok(Json(json!({
        "message": "documents received, verification usually takes 24 to 48 hours",
        "verification_id": verification_id
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn register_request(email: &str, phone: &str, pseudo: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            phone: phone.into(),
            password: "long enough password".into(),
            first_name: "Jean".into(),
            last_name: "Dupont".into(),
            birth_date: "1990-01-01".into(),
            pseudo: pseudo.into(),
        }
    }

    #[tokio::test]
    async fn duplicate_registration_reports_a_conflict() {
        let state = testutil::state();
        register(
            State(state.clone()),
            Json(register_request("a@example.com", "0600000001", "jean")),
        )
        .await
        .unwrap();

        let err = register(
            State(state.clone()),
            Json(register_request("a@example.com", "0600000002", "autre jean")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);

        let err = register(
            State(state),
            Json(register_request("b@example.com", "0600000001", "autre jean")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_years_only() {
        let birth = date(2000, 6, 15);
        assert_eq!(age_on(birth, date(2018, 6, 14)), 17);
        assert_eq!(age_on(birth, date(2018, 6, 15)), 18);
        assert_eq!(age_on(birth, date(2018, 6, 16)), 18);
        assert_eq!(age_on(birth, date(2000, 6, 15)), 0);
    }

    #[test]
    fn pseudo_whitespace_is_collapsed() {
        assert_eq!(normalize_pseudo("  jean  pierre "), "jean pierre");
        assert_eq!(normalize_pseudo("solo"), "solo");
        assert_eq!(normalize_pseudo("   "), "");
    }

    #[test]
    fn pseudo_charset_and_length_are_enforced() {
        assert!(validate_pseudo("jo").is_ok());
        assert!(validate_pseudo("jean pierre 42").is_ok());
        assert!(validate_pseudo("j").is_err());
        assert!(validate_pseudo(&"x".repeat(31)).is_err());
        assert!(validate_pseudo("jean@pierre").is_err());
        assert!(validate_pseudo("").is_err());
    }

    #[test]
    fn token_round_trips_and_rejects_tampering() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "secret", 30).unwrap();

        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap()
        .claims;
        assert_eq!(claims.sub, user_id);

        assert!(
            decode::<Claims>(
                &token,
                &DecodingKey::from_secret(b"other-secret"),
                &Validation::default(),
            )
            .is_err()
        );
    }

    #[test]
    fn password_hash_verifies_original_only() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong battery", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
