use axum::{extract::State, http::StatusCode, Extension, Json};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::preference::UserPreferenceRow;
use crate::preferences::PreferenceInput;
use crate::state::AppState;

/// GET /api/v1/user_preference
pub async fn handle_show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserPreferenceRow>, AppError> {
    let pref = find_preference(&state, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Preferences not found".to_string()))?;
    Ok(Json(pref))
}

/// POST /api/v1/user_preference
/// A user has at most one preference row; a second create conflicts.
pub async fn handle_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(mut input): Json<PreferenceInput>,
) -> Result<(StatusCode, Json<UserPreferenceRow>), AppError> {
    if find_preference(&state, user.id).await?.is_some() {
        return Err(AppError::Conflict("Preferences already exist".to_string()));
    }

    input.normalize();
    input
        .validate()
        .map_err(|errors| AppError::Validation(errors.join("; ")))?;

    let pref: UserPreferenceRow = sqlx::query_as(
        r#"
        INSERT INTO user_preferences
            (id, user_id, theme, language, industry, niche, template_style,
             tone_of_voice, default_output_format, branding, other)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, 'pdf'), COALESCE($10, '{}'::jsonb), COALESCE($11, '{}'::jsonb))
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(&input.theme)
    .bind(&input.language)
    .bind(&input.industry)
    .bind(&input.niche)
    .bind(&input.template_style)
    .bind(&input.tone_of_voice)
    .bind(&input.default_output_format)
    .bind(&input.branding)
    .bind(&input.other)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(pref)))
}

/// PATCH /api/v1/user_preference
/// Partial update: absent fields keep their stored values.
pub async fn handle_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(mut input): Json<PreferenceInput>,
) -> Result<Json<UserPreferenceRow>, AppError> {
    if find_preference(&state, user.id).await?.is_none() {
        return Err(AppError::NotFound("Preferences not found".to_string()));
    }

    input.normalize();
    input
        .validate()
        .map_err(|errors| AppError::Validation(errors.join("; ")))?;

    let pref: UserPreferenceRow = sqlx::query_as(
        r#"
        UPDATE user_preferences SET
            theme = COALESCE($2, theme),
            language = COALESCE($3, language),
            industry = COALESCE($4, industry),
            niche = COALESCE($5, niche),
            template_style = COALESCE($6, template_style),
            tone_of_voice = COALESCE($7, tone_of_voice),
            default_output_format = COALESCE($8, default_output_format),
            branding = COALESCE($9, branding),
            other = COALESCE($10, other),
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&input.theme)
    .bind(&input.language)
    .bind(&input.industry)
    .bind(&input.niche)
    .bind(&input.template_style)
    .bind(&input.tone_of_voice)
    .bind(&input.default_output_format)
    .bind(&input.branding)
    .bind(&input.other)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(pref))
}

/// DELETE /api/v1/user_preference
pub async fn handle_destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM user_preferences WHERE user_id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Preferences not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn find_preference(
    state: &AppState,
    user_id: Uuid,
) -> Result<Option<UserPreferenceRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UserPreferenceRow>(
            "SELECT * FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?,
    )
}
