use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{AppState, blocking};
use kiosk_db::models::UserRow;
use kiosk_db::parse_ts;
use kiosk_types::api::Claims;

/// The authenticated caller, resolved from the bearer token. The token only
/// carries the user id; the account row is loaded fresh on every request so
/// flags like `email_verified` are always current.
#[derive(Debug, Clone)]
pub struct CurrentUser {
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

impl CurrentUser {
    pub fn from_row(row: UserRow) -> Result<Self, ApiError> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|_| ApiError::unauthorized("invalid session"))?;
        Ok(CurrentUser {
            id,
            email: row.email,
            phone: row.phone,
            first_name: row.first_name,
            last_name: row.last_name,
            pseudo: row.pseudo,
            birth_date: row.birth_date,
            email_verified: row.email_verified,
            identity_verified: row.identity_verified,
            is_admin: row.is_admin,
            created_at: parse_ts(&row.created_at),
        })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("not authenticated"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("invalid authorization header"))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::unauthorized("invalid or expired token"))?
        .claims;

        let user_id = claims.sub.to_string();
        let state = state.clone();
        let row = blocking(move || state.db.get_user_by_id(&user_id))
            .await?
            .ok_or_else(|| ApiError::unauthorized("account no longer exists"))?;

        CurrentUser::from_row(row)
    }
}

/// Optional authentication for routes that are public but show more to a
/// signed-in caller. A missing or invalid token yields an anonymous request
/// rather than a rejection.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(MaybeUser(None));
        }
        Ok(MaybeUser(
            CurrentUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

/// Admin-only extractor; same resolution as [`CurrentUser`] plus the flag
/// check, so handlers state their requirement in the signature.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::forbidden("admin access required"));
        }
        Ok(AdminUser(user))
    }
}
