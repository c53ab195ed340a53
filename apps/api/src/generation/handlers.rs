use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::generation::orchestrator::{find_owned_proposal, generate_for_proposal};
use crate::models::proposal::GeneratedProposalRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    #[serde(default)]
    pub force: bool,
}

/// POST /api/v1/proposals/:id/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<Value>, AppError> {
    let record =
        generate_for_proposal(&state.db, state.llm.as_ref(), id, user.id, query.force).await?;
    // Re-read: generation flips the proposal status to `generated`.
    let proposal = find_owned_proposal(&state.db, id, user.id).await?;

    Ok(Json(json!({
        "proposal": proposal,
        "generated_proposal": record.to_payload(),
    })))
}

/// GET /api/v1/generated_proposals/:id
pub async fn handle_get_generated(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let record = find_owned_generated(&state, id, user.id).await?;
    Ok(Json(record.to_payload()))
}

#[derive(Debug, Deserialize)]
pub struct GeneratedUpdateRequest {
    pub content_sections: Value,
}

/// PATCH /api/v1/generated_proposals/:id
///
/// Full replace of the content-section map. Accepts either a JSON object or
/// a JSON-encoded string. The stored fingerprint is untouched: it describes
/// the generation inputs, not the (now edited) output.
pub async fn handle_update_generated(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<GeneratedUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let record = find_owned_generated(&state, id, user.id).await?;

    let sections = coerce_sections(req.content_sections)?;

    let updated: GeneratedProposalRow = sqlx::query_as(
        "UPDATE generated_proposals SET content_sections = $1 WHERE id = $2 RETURNING *",
    )
    .bind(sections)
    .bind(record.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(updated.to_payload()))
}

/// Accepts an object as-is; parses a string body into an object. Anything
/// else is rejected before touching the row.
fn coerce_sections(raw: Value) -> Result<Value, AppError> {
    let value = match raw {
        Value::String(encoded) => serde_json::from_str::<Value>(&encoded).map_err(|e| {
            AppError::UnprocessableEntity(format!("Invalid JSON for content_sections: {e}"))
        })?,
        other => other,
    };
    if !value.is_object() {
        return Err(AppError::UnprocessableEntity(
            "content_sections must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Secure lookup: the caller must own the parent proposal.
async fn find_owned_generated(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
) -> Result<GeneratedProposalRow, AppError> {
    sqlx::query_as::<_, GeneratedProposalRow>(
        r#"
        SELECT gp.*
        FROM generated_proposals gp
        JOIN proposals p ON p.id = gp.proposal_id
        WHERE gp.id = $1 AND p.user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Generated proposal {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_sections_passes_object_through() {
        let value = coerce_sections(json!({"project_title": "T"})).unwrap();
        assert_eq!(value["project_title"], "T");
    }

    #[test]
    fn test_coerce_sections_parses_string_payload() {
        let value = coerce_sections(json!("{\"project_title\": \"T\"}")).unwrap();
        assert_eq!(value["project_title"], "T");
    }

    #[test]
    fn test_coerce_sections_rejects_bad_string() {
        assert!(coerce_sections(json!("not json")).is_err());
    }

    #[test]
    fn test_coerce_sections_rejects_non_object() {
        assert!(coerce_sections(json!([1, 2, 3])).is_err());
        assert!(coerce_sections(json!(42)).is_err());
    }

    #[test]
    fn test_generate_query_force_defaults_false() {
        let query: GenerateQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.force);
        let query: GenerateQuery = serde_json::from_str(r#"{"force": true}"#).unwrap();
        assert!(query.force);
    }
}
