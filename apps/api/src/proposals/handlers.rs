use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::generation::orchestrator::{find_owned_proposal, latest_generated};
use crate::models::proposal::{GeneratedProposalRow, ProposalRow};
use crate::proposals::ProposalInput;
use crate::state::AppState;

/// GET /api/v1/proposals — newest first, summary shape.
pub async fn handle_index(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Value>>, AppError> {
    let proposals: Vec<ProposalRow> =
        sqlx::query_as("SELECT * FROM proposals WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.id)
            .fetch_all(&state.db)
            .await?;

    // One round trip for the latest version of every listed proposal.
    let ids: Vec<Uuid> = proposals.iter().map(|p| p.id).collect();
    let latest_rows: Vec<GeneratedProposalRow> = sqlx::query_as(
        r#"
        SELECT DISTINCT ON (proposal_id) *
        FROM generated_proposals
        WHERE proposal_id = ANY($1)
        ORDER BY proposal_id, version DESC, created_at DESC
        "#,
    )
    .bind(&ids)
    .fetch_all(&state.db)
    .await?;
    let mut latest_by_proposal: HashMap<Uuid, GeneratedProposalRow> = latest_rows
        .into_iter()
        .map(|record| (record.proposal_id, record))
        .collect();

    let summaries = proposals
        .iter()
        .map(|proposal| proposal_summary(proposal, latest_by_proposal.remove(&proposal.id)))
        .collect();

    Ok(Json(summaries))
}

/// Index entry: proposal fields plus latest-version info, when one exists.
fn proposal_summary(proposal: &ProposalRow, latest: Option<GeneratedProposalRow>) -> Value {
    json!({
        "id": proposal.id,
        "client_name": proposal.client_name,
        "scope_of_work": proposal.scope_of_work,
        "timeline": proposal.timeline,
        "pricing": proposal.pricing,
        "status": proposal.status,
        "created_at": proposal.created_at,
        "updated_at": proposal.updated_at,
        "generated": latest.is_some(),
        "latest_generated_proposal": latest.map(|record| json!({
            "id": record.id,
            "version": record.version,
            "selected_template": record.selected_template,
            "created_at": record.created_at,
        })),
    })
}

/// GET /api/v1/proposals/:id — full payload with preference and latest output.
pub async fn handle_show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let proposal = find_owned_proposal(&state.db, id, user.id).await?;
    Ok(Json(full_payload(&state, &proposal).await?))
}

/// POST /api/v1/proposals
pub async fn handle_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<ProposalInput>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    input
        .validate(true)
        .map_err(|errors| AppError::Validation(errors.join("; ")))?;
    check_preference_ownership(&state, user.id, input.user_preference_id.flatten()).await?;

    let proposal: ProposalRow = sqlx::query_as(
        r#"
        INSERT INTO proposals
            (id, user_id, client_name, client_requirements, scope_of_work,
             timeline, pricing, status, user_preference_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, 'draft'), $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(&input.client_name)
    .bind(input.client_requirements.clone().flatten())
    .bind(&input.scope_of_work)
    .bind(input.timeline.clone().flatten())
    .bind(input.pricing.clone().flatten())
    .bind(&input.status)
    .bind(input.user_preference_id.flatten())
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(full_payload(&state, &proposal).await?),
    ))
}

/// PATCH /api/v1/proposals/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProposalInput>,
) -> Result<Json<Value>, AppError> {
    find_owned_proposal(&state.db, id, user.id).await?;
    input
        .validate(false)
        .map_err(|errors| AppError::Validation(errors.join("; ")))?;
    check_preference_ownership(&state, user.id, input.user_preference_id.flatten()).await?;

    // Nullable columns take a presence flag alongside the value so an
    // explicit JSON null clears them, while an absent field keeps the
    // stored value. Required columns stay on COALESCE.
    let proposal: ProposalRow = sqlx::query_as(
        r#"
        UPDATE proposals SET
            client_name = COALESCE($2, client_name),
            client_requirements = CASE WHEN $3 THEN $4 ELSE client_requirements END,
            scope_of_work = COALESCE($5, scope_of_work),
            timeline = CASE WHEN $6 THEN $7 ELSE timeline END,
            pricing = CASE WHEN $8 THEN $9 ELSE pricing END,
            status = COALESCE($10, status),
            user_preference_id = CASE WHEN $11 THEN $12 ELSE user_preference_id END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.client_name)
    .bind(input.client_requirements.is_some())
    .bind(input.client_requirements.clone().flatten())
    .bind(&input.scope_of_work)
    .bind(input.timeline.is_some())
    .bind(input.timeline.clone().flatten())
    .bind(input.pricing.is_some())
    .bind(input.pricing.clone().flatten())
    .bind(&input.status)
    .bind(input.user_preference_id.is_some())
    .bind(input.user_preference_id.flatten())
    .fetch_one(&state.db)
    .await?;

    Ok(Json(full_payload(&state, &proposal).await?))
}

/// DELETE /api/v1/proposals/:id — generated versions cascade.
pub async fn handle_destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    find_owned_proposal(&state.db, id, user.id).await?;
    sqlx::query("DELETE FROM proposals WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A linked preference must belong to the same user.
async fn check_preference_ownership(
    state: &AppState,
    user_id: Uuid,
    preference_id: Option<Uuid>,
) -> Result<(), AppError> {
    let Some(preference_id) = preference_id else {
        return Ok(());
    };
    let owned: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM user_preferences WHERE id = $1 AND user_id = $2)",
    )
    .bind(preference_id)
    .bind(user_id)
    .fetch_one(&state.db)
    .await?;
    if owned {
        Ok(())
    } else {
        Err(AppError::Validation(
            "user_preference_id does not reference your preferences".to_string(),
        ))
    }
}

async fn full_payload(state: &AppState, proposal: &ProposalRow) -> Result<Value, AppError> {
    let preference = match proposal.user_preference_id {
        Some(pref_id) => {
            sqlx::query_as::<_, crate::models::preference::UserPreferenceRow>(
                "SELECT * FROM user_preferences WHERE id = $1",
            )
            .bind(pref_id)
            .fetch_optional(&state.db)
            .await?
        }
        None => None,
    };
    let latest = latest_generated(&state.db, proposal.id).await?;

    Ok(json!({
        "id": proposal.id,
        "user_id": proposal.user_id,
        "client_name": proposal.client_name,
        "client_requirements": proposal.client_requirements,
        "scope_of_work": proposal.scope_of_work,
        "timeline": proposal.timeline,
        "pricing": proposal.pricing,
        "status": proposal.status,
        "user_preference_id": proposal.user_preference_id,
        "created_at": proposal.created_at,
        "updated_at": proposal.updated_at,
        "user_preference": preference,
        "latest_generated_proposal": latest.map(|record| record.to_payload()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn proposal() -> ProposalRow {
        ProposalRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            client_name: "Acme Corp".to_string(),
            client_requirements: None,
            scope_of_work: "Build X".to_string(),
            timeline: None,
            pricing: None,
            status: "draft".to_string(),
            user_preference_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_without_generated_version() {
        let summary = proposal_summary(&proposal(), None);
        assert_eq!(summary["generated"], false);
        assert!(summary["latest_generated_proposal"].is_null());
    }

    #[test]
    fn test_summary_carries_latest_version_info() {
        let proposal = proposal();
        let latest = GeneratedProposalRow {
            id: Uuid::new_v4(),
            proposal_id: proposal.id,
            content_sections: json!({}),
            selected_template: Some("formal".to_string()),
            version: 2,
            fingerprint: Some("abc".to_string()),
            created_at: Utc::now(),
        };
        let summary = proposal_summary(&proposal, Some(latest));
        assert_eq!(summary["generated"], true);
        assert_eq!(summary["latest_generated_proposal"]["version"], 2);
        assert_eq!(
            summary["latest_generated_proposal"]["selected_template"],
            "formal"
        );
    }
}
