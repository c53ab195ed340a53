use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{issue_token, revoke_jti, TokenContext};
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/signup
pub async fn handle_signup(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let email = req.email.trim().to_lowercase();
    validate_credentials(&email, &req.password)?;

    let existing: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;
    if existing {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let user: UserRow = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(map_signup_insert_error)?;

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_secs)?;
    info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": { "code": 201, "message": "Signed up successfully." },
            "data": { "id": user.id, "user": user.email, "token": token }
        })),
    ))
}

/// POST /api/v1/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<([(axum::http::HeaderName, String); 1], Json<Value>), AppError> {
    let email = req.email.trim().to_lowercase();

    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(invalid_credentials)?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid_credentials());
    }

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_secs)?;

    Ok((
        [(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {token}"),
        )],
        Json(json!({
            "status": { "code": 200, "message": "Logged in successfully." },
            "data": { "id": user.id, "user": user.email, "token": token }
        })),
    ))
}

/// DELETE /api/v1/logout
/// Revokes the presented token by recording its jti in the denylist.
pub async fn handle_logout(
    State(state): State<AppState>,
    Extension(token): Extension<TokenContext>,
) -> Result<Json<Value>, AppError> {
    revoke_jti(&state.db, token.jti, token.exp).await?;
    Ok(Json(json!({
        "status": 200,
        "message": "Logged out successfully"
    })))
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}

/// Two concurrent signups for the same email can both pass the exists-check;
/// the loser hits the unique index on `users.email` and must still see a
/// conflict, not a generic database error.
fn map_signup_insert_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Email already registered".to_string())
        }
        _ => AppError::Database(err),
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if !email.contains('@') || email.len() < 3 {
        errors.push("email must be a valid address");
    }
    if password.len() < 8 {
        errors.push("password must be at least 8 characters");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors.join("; ")))
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {e}")))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
