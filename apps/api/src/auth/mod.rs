//! Bearer-token authentication: HS256 token issuance, the revocation
//! denylist, and the middleware guarding every protected route.
//!
//! Revocation is a denylist of `jti` values — a token stays valid until it
//! expires or its identifier is recorded in `revoked_tokens`. The denylist
//! is checked on every authenticated request.

pub mod handlers;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// JWT claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

/// The authenticated caller, inserted into request extensions by
/// `require_auth` and extracted by handlers via `Extension<AuthUser>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Claims of the presented token, kept around so logout can revoke its jti.
#[derive(Debug, Clone, Copy)]
pub struct TokenContext {
    pub jti: Uuid,
    pub exp: i64,
}

/// Issues a signed token for a user.
pub fn issue_token(user_id: Uuid, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        jti: Uuid::new_v4(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))
}

/// Decodes and verifies a token's signature and expiry.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Not authorized".to_string()))
}

/// Records a token identifier in the denylist.
pub async fn revoke_jti(pool: &PgPool, jti: Uuid, exp: i64) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO revoked_tokens (jti, exp) VALUES ($1, to_timestamp($2)) ON CONFLICT (jti) DO NOTHING",
    )
    .bind(jti)
    .bind(exp)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn is_revoked(pool: &PgPool, jti: Uuid) -> Result<bool, AppError> {
    let revoked: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
            .bind(jti)
            .fetch_one(pool)
            .await?;
    Ok(revoked)
}

/// Axum middleware for all protected routes: validates the bearer token,
/// rejects revoked identifiers, and injects `AuthUser` + `TokenContext`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .ok_or_else(|| AppError::Unauthorized("Not authorized".to_string()))?;

    let claims = decode_token(&token, &state.config.jwt_secret)?;

    if is_revoked(&state.db, claims.jti).await? {
        warn!("Rejected revoked token jti={}", claims.jti);
        return Err(AppError::Unauthorized("Token revoked".to_string()));
    }

    let known_user: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(claims.sub)
        .fetch_one(&state.db)
        .await?;
    if !known_user {
        return Err(AppError::Unauthorized("Not authorized".to_string()));
    }

    request.extensions_mut().insert(AuthUser { id: claims.sub });
    request.extensions_mut().insert(TokenContext {
        jti: claims.jti,
        exp: claims.exp,
    });
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    header
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}
