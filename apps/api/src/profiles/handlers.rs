use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::profile::UserProfileRow;
use crate::profiles::ProfileInput;
use crate::state::AppState;

/// An uploaded profile image part.
struct ImageUpload {
    data: Bytes,
    content_type: Option<String>,
}

/// GET /api/v1/user_profile
pub async fn handle_show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let profile = find_profile(&state, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    Ok(Json(profile.to_payload(
        &state.config.s3_endpoint,
        &state.config.s3_bucket,
    )))
}

/// POST /api/v1/user_profile (multipart: text fields + optional profile_image)
pub async fn handle_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if find_profile(&state, user.id).await?.is_some() {
        return Err(AppError::Conflict("Profile already exists".to_string()));
    }

    let (mut input, image) = parse_profile_multipart(multipart).await?;
    input.normalize();
    input
        .validate(true)
        .map_err(|errors| AppError::Validation(errors.join("; ")))?;

    let image_key = match image {
        Some(upload) => Some(upload_profile_image(&state, user.id, upload).await?),
        None => None,
    };

    let skills = json!(input.skills.clone().unwrap_or_default());
    let profile: UserProfileRow = sqlx::query_as(
        r#"
        INSERT INTO user_profiles
            (id, user_id, first_name, last_name, full_name, headline, job_title,
             company, location, website, linkedin_url, summary, skills, profile_image_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.full_name)
    .bind(&input.headline)
    .bind(&input.job_title)
    .bind(&input.company)
    .bind(&input.location)
    .bind(&input.website)
    .bind(&input.linkedin_url)
    .bind(&input.summary)
    .bind(&skills)
    .bind(&image_key)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(profile.to_payload(&state.config.s3_endpoint, &state.config.s3_bucket)),
    ))
}

/// PATCH /api/v1/user_profile (multipart; absent fields keep stored values)
pub async fn handle_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let existing = find_profile(&state, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let (mut input, image) = parse_profile_multipart(multipart).await?;
    input.normalize();
    input
        .validate(false)
        .map_err(|errors| AppError::Validation(errors.join("; ")))?;

    let image_key = match image {
        Some(upload) => Some(upload_profile_image(&state, user.id, upload).await?),
        None => None,
    };

    let skills = input.skills.clone().map(|s| json!(s));
    let profile: UserProfileRow = sqlx::query_as(
        r#"
        UPDATE user_profiles SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            full_name = COALESCE($4, full_name),
            headline = COALESCE($5, headline),
            job_title = COALESCE($6, job_title),
            company = COALESCE($7, company),
            location = COALESCE($8, location),
            website = COALESCE($9, website),
            linkedin_url = COALESCE($10, linkedin_url),
            summary = COALESCE($11, summary),
            skills = COALESCE($12, skills),
            profile_image_key = COALESCE($13, profile_image_key),
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.full_name)
    .bind(&input.headline)
    .bind(&input.job_title)
    .bind(&input.company)
    .bind(&input.location)
    .bind(&input.website)
    .bind(&input.linkedin_url)
    .bind(&input.summary)
    .bind(&skills)
    .bind(&image_key)
    .fetch_one(&state.db)
    .await?;

    // The replaced object is orphaned once the row points at the new key.
    if let Some(old_key) = replaced_image_key(existing.profile_image_key.as_deref(), image_key.as_deref())
    {
        delete_profile_image(&state, old_key).await;
    }

    Ok(Json(profile.to_payload(
        &state.config.s3_endpoint,
        &state.config.s3_bucket,
    )))
}

/// The key to delete after an update: the prior key, only when a new upload
/// actually replaced it.
fn replaced_image_key<'a>(old: Option<&'a str>, new: Option<&str>) -> Option<&'a str> {
    match (old, new) {
        (Some(old), Some(new)) if old != new => Some(old),
        _ => None,
    }
}

/// Cleanup of a replaced object. The profile update has already committed,
/// so a failed delete is logged rather than surfaced.
async fn delete_profile_image(state: &AppState, key: &str) {
    if let Err(e) = state
        .s3
        .delete_object()
        .bucket(&state.config.s3_bucket)
        .key(key)
        .send()
        .await
    {
        warn!(
            "Failed to delete replaced profile image s3://{}/{}: {e}",
            state.config.s3_bucket, key
        );
    }
}

/// Collects the text parts into a `ProfileInput` and the image part, if any.
/// Unknown parts are ignored. `skills` may repeat, one part per skill.
async fn parse_profile_multipart(
    mut multipart: Multipart,
) -> Result<(ProfileInput, Option<ImageUpload>), AppError> {
    let mut input = ProfileInput::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "profile_image" => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid image upload: {e}")))?;
                if !data.is_empty() {
                    image = Some(ImageUpload { data, content_type });
                }
            }
            "skills" | "skills[]" => {
                let value = read_text(field).await?;
                input.skills.get_or_insert_with(Vec::new).push(value);
            }
            "first_name" => input.first_name = Some(read_text(field).await?),
            "last_name" => input.last_name = Some(read_text(field).await?),
            "full_name" => input.full_name = Some(read_text(field).await?),
            "headline" => input.headline = Some(read_text(field).await?),
            "job_title" => input.job_title = Some(read_text(field).await?),
            "company" => input.company = Some(read_text(field).await?),
            "location" => input.location = Some(read_text(field).await?),
            "website" => input.website = Some(read_text(field).await?),
            "linkedin_url" => input.linkedin_url = Some(read_text(field).await?),
            "summary" => input.summary = Some(read_text(field).await?),
            _ => {}
        }
    }

    Ok((input, image))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart field: {e}")))
}

/// Uploads the image and returns its object key.
async fn upload_profile_image(
    state: &AppState,
    user_id: Uuid,
    upload: ImageUpload,
) -> Result<String, AppError> {
    let key = format!("profiles/{}/{}", user_id, Uuid::new_v4());

    let mut request = state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&key)
        .body(ByteStream::from(upload.data));
    if let Some(content_type) = upload.content_type {
        request = request.content_type(content_type);
    }
    request
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Profile image upload failed: {e}")))?;

    info!(
        "Uploaded profile image to s3://{}/{}",
        state.config.s3_bucket, key
    );
    Ok(key)
}

async fn find_profile(state: &AppState, user_id: Uuid) -> Result<Option<UserProfileRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UserProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?,
    )
}
