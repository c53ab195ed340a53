//! Generation Orchestrator — ties prompt building, the provider call, and
//! response validation together.
//!
//! Flow per request: CheckIdempotence → FirstAttempt → (RetryAttempt) →
//! Persist. Only a parse/schema failure moves to RetryAttempt, with a
//! stricter prompt and clamped sampling. Provider errors, empty responses,
//! and anything on the retry path are terminal. No partial record is ever
//! persisted.

use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::gemini::{GenerationParams, TextGenerator};
use crate::generation::fingerprint::generation_fingerprint;
use crate::generation::parser::parse_sections;
use crate::generation::prompts::{compose_prompt, compose_strict_prompt};
use crate::models::preference::UserPreferenceRow;
use crate::models::proposal::{GeneratedProposalRow, ProposalRow};

/// Moderate creativity for the first attempt.
pub const FIRST_ATTEMPT_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.45,
    top_p: 0.9,
    max_output_tokens: 4000,
};

/// Clamped settings for the single retry: low temperature, tighter output
/// budget, paired with the strict JSON-only prompt.
pub const STRICT_RETRY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.2,
    top_p: 0.9,
    max_output_tokens: 2200,
};

/// Runs the full generation flow for one proposal owned by `user_id`.
///
/// With `force = false` and an unchanged input fingerprint this returns the
/// latest stored version without any outbound call.
pub async fn generate_for_proposal(
    pool: &PgPool,
    llm: &dyn TextGenerator,
    proposal_id: Uuid,
    user_id: Uuid,
    force: bool,
) -> Result<GeneratedProposalRow, AppError> {
    let proposal = find_owned_proposal(pool, proposal_id, user_id).await?;
    let pref = load_preference(pool, &proposal).await?;

    let fingerprint = generation_fingerprint(&proposal, pref.as_ref());
    let latest = latest_generated(pool, proposal.id).await?;

    if let Some(existing) = reuse_existing(force, latest, &fingerprint) {
        // Terminal: inputs unchanged since the last successful generation.
        info!(
            "Skipping generation for proposal {}: fingerprint unchanged",
            proposal.id
        );
        return Ok(existing);
    }

    let sections = run_attempts(llm, &proposal, pref.as_ref()).await?;

    let template = pref
        .as_ref()
        .and_then(|p| p.template_style.clone())
        .unwrap_or_else(|| "formal".to_string());

    let record = persist_generated(pool, &proposal, sections, &template, &fingerprint).await?;
    info!(
        "Generated proposal {} version {} for user {}",
        proposal.id, record.version, user_id
    );
    Ok(record)
}

/// The idempotence decision: returns the stored version to reuse when the
/// caller did not force and the latest version was produced from identical
/// inputs. `force` always regenerates, fingerprint match or not.
fn reuse_existing(
    force: bool,
    latest: Option<GeneratedProposalRow>,
    fingerprint: &str,
) -> Option<GeneratedProposalRow> {
    if force {
        return None;
    }
    latest.filter(|record| record.fingerprint.as_deref() == Some(fingerprint))
}

/// FirstAttempt → RetryAttempt state machine. Exactly one retry, and only
/// when the model's output failed to parse or violated the schema.
async fn run_attempts(
    llm: &dyn TextGenerator,
    proposal: &ProposalRow,
    pref: Option<&UserPreferenceRow>,
) -> Result<Map<String, Value>, AppError> {
    let raw = llm
        .generate(&compose_prompt(proposal, pref), FIRST_ATTEMPT_PARAMS)
        .await
        .map_err(|e| AppError::Generation(e.to_string()))?;

    match parse_sections(&raw) {
        Ok(sections) => Ok(sections),
        Err(parse_err) => {
            warn!(
                "First attempt for proposal {} returned invalid content ({parse_err}); retrying with strict prompt",
                proposal.id
            );
            let raw = llm
                .generate(&compose_strict_prompt(proposal, pref), STRICT_RETRY_PARAMS)
                .await
                .map_err(|e| AppError::Generation(e.to_string()))?;
            parse_sections(&raw)
                .map_err(|e| AppError::Generation(format!("retry attempt failed: {e}")))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Persistence
// ────────────────────────────────────────────────────────────────────────────

/// Inserts the next version inside a transaction. The parent proposal row is
/// locked first so concurrent generations for the same proposal serialize
/// and version numbers stay gap-free.
async fn persist_generated(
    pool: &PgPool,
    proposal: &ProposalRow,
    sections: Map<String, Value>,
    template: &str,
    fingerprint: &str,
) -> Result<GeneratedProposalRow, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM proposals WHERE id = $1 FOR UPDATE")
        .bind(proposal.id)
        .fetch_one(&mut *tx)
        .await?;

    let current_max: Option<i32> =
        sqlx::query_scalar("SELECT MAX(version) FROM generated_proposals WHERE proposal_id = $1")
            .bind(proposal.id)
            .fetch_one(&mut *tx)
            .await?;
    let version = current_max.unwrap_or(0) + 1;

    let record: GeneratedProposalRow = sqlx::query_as(
        r#"
        INSERT INTO generated_proposals
            (id, proposal_id, content_sections, selected_template, version, fingerprint)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(proposal.id)
    .bind(Value::Object(sections))
    .bind(template)
    .bind(version)
    .bind(fingerprint)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE proposals SET status = 'generated', updated_at = NOW() WHERE id = $1")
        .bind(proposal.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(record)
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

pub async fn find_owned_proposal(
    pool: &PgPool,
    proposal_id: Uuid,
    user_id: Uuid,
) -> Result<ProposalRow, AppError> {
    sqlx::query_as::<_, ProposalRow>("SELECT * FROM proposals WHERE id = $1 AND user_id = $2")
        .bind(proposal_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proposal {proposal_id} not found")))
}

/// Highest version for a proposal, ties broken by creation time.
pub async fn latest_generated(
    pool: &PgPool,
    proposal_id: Uuid,
) -> Result<Option<GeneratedProposalRow>, AppError> {
    Ok(sqlx::query_as::<_, GeneratedProposalRow>(
        r#"
        SELECT * FROM generated_proposals
        WHERE proposal_id = $1
        ORDER BY version DESC, created_at DESC
        LIMIT 1
        "#,
    )
    .bind(proposal_id)
    .fetch_optional(pool)
    .await?)
}

/// The preference linked on the proposal wins; otherwise the owner's stored
/// preference, if any.
async fn load_preference(
    pool: &PgPool,
    proposal: &ProposalRow,
) -> Result<Option<UserPreferenceRow>, AppError> {
    if let Some(pref_id) = proposal.user_preference_id {
        return Ok(sqlx::query_as::<_, UserPreferenceRow>(
            "SELECT * FROM user_preferences WHERE id = $1",
        )
        .bind(pref_id)
        .fetch_optional(pool)
        .await?);
    }
    Ok(sqlx::query_as::<_, UserPreferenceRow>(
        "SELECT * FROM user_preferences WHERE user_id = $1",
    )
    .bind(proposal.user_id)
    .fetch_optional(pool)
    .await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiError;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted provider: pops one canned outcome per call and records the
    /// prompt and sampling parameters it was given.
    struct ScriptedGenerator {
        outcomes: Mutex<VecDeque<Result<String, GeminiError>>>,
        calls: Mutex<Vec<(String, GenerationParams)>>,
    }

    impl ScriptedGenerator {
        fn new(outcomes: Vec<Result<String, GeminiError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call(&self, index: usize) -> (String, GenerationParams) {
            self.calls.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            prompt: &str,
            params: GenerationParams,
        ) -> Result<String, GeminiError> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), params));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("generator called more times than scripted")
        }
    }

    fn proposal() -> ProposalRow {
        ProposalRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            client_name: "Acme Corp".to_string(),
            client_requirements: Some("Inventory tracking".to_string()),
            scope_of_work: "Build X".to_string(),
            timeline: None,
            pricing: None,
            status: "draft".to_string(),
            user_preference_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn valid_sections() -> String {
        json!({
            "project_title": "Acme Inventory Platform",
            "introduction": "For Acme Corp.",
            "objectives": ["Deliver MVP"],
            "problem_statement": "Manual tracking.",
            "proposed_system": "Web tracking system.",
            "main_modules": ["Auth Module: login"],
            "expected_outcomes": "Accuracy.",
            "tools_and_technology": "Rust, PostgreSQL"
        })
        .to_string()
    }

    fn generated_row(fingerprint: Option<&str>) -> GeneratedProposalRow {
        GeneratedProposalRow {
            id: Uuid::new_v4(),
            proposal_id: Uuid::new_v4(),
            content_sections: json!({}),
            selected_template: None,
            version: 1,
            fingerprint: fingerprint.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_valid_first_attempt_makes_one_call() {
        let llm = ScriptedGenerator::new(vec![Ok(valid_sections())]);
        let sections = run_attempts(&llm, &proposal(), None).await.unwrap();
        assert_eq!(llm.call_count(), 1);
        assert_eq!(sections["project_title"], "Acme Inventory Platform");
        let (_, params) = llm.call(0);
        assert_eq!(params, FIRST_ATTEMPT_PARAMS);
    }

    #[tokio::test]
    async fn test_prose_wrapped_json_succeeds_without_retry() {
        let llm = ScriptedGenerator::new(vec![Ok(format!(
            "Here you go:\n{}\nThanks",
            valid_sections()
        ))]);
        assert!(run_attempts(&llm, &proposal(), None).await.is_ok());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_then_valid_retries_with_strict_params() {
        let llm = ScriptedGenerator::new(vec![
            Ok("I cannot answer that.".to_string()),
            Ok(valid_sections()),
        ]);
        let sections = run_attempts(&llm, &proposal(), None).await.unwrap();
        assert_eq!(llm.call_count(), 2);
        assert_eq!(sections.len(), 8);

        let (retry_prompt, retry_params) = llm.call(1);
        assert_eq!(retry_params, STRICT_RETRY_PARAMS);
        assert!(retry_prompt.contains("previous response was invalid"));
    }

    #[tokio::test]
    async fn test_schema_violation_triggers_retry() {
        // Parses fine but misses required keys — still a retryable failure.
        let llm = ScriptedGenerator::new(vec![
            Ok(r#"{"project_title": "only this"}"#.to_string()),
            Ok(valid_sections()),
        ]);
        assert!(run_attempts(&llm, &proposal(), None).await.is_ok());
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let llm = ScriptedGenerator::new(vec![Err(GeminiError::Provider {
            status: 503,
            body: "overloaded".to_string(),
        })]);
        let err = run_attempts(&llm, &proposal(), None).await.unwrap_err();
        assert_eq!(llm.call_count(), 1);
        assert!(matches!(err, AppError::Generation(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_empty_response_is_not_retried() {
        let llm = ScriptedGenerator::new(vec![Err(GeminiError::Empty)]);
        assert!(run_attempts(&llm, &proposal(), None).await.is_err());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_second_malformed_response_is_terminal() {
        let llm = ScriptedGenerator::new(vec![
            Ok("not json".to_string()),
            Ok("still not json".to_string()),
        ]);
        let err = run_attempts(&llm, &proposal(), None).await.unwrap_err();
        assert_eq!(llm.call_count(), 2);
        assert!(matches!(err, AppError::Generation(msg) if msg.contains("retry attempt failed")));
    }

    #[tokio::test]
    async fn test_provider_error_on_retry_is_terminal() {
        let llm = ScriptedGenerator::new(vec![
            Ok("not json".to_string()),
            Err(GeminiError::Provider {
                status: 500,
                body: "boom".to_string(),
            }),
        ]);
        assert!(run_attempts(&llm, &proposal(), None).await.is_err());
        assert_eq!(llm.call_count(), 2);
    }

    #[test]
    fn test_matching_fingerprint_reuses_stored_version() {
        let row = generated_row(Some("abc"));
        let reused = reuse_existing(false, Some(row.clone()), "abc").unwrap();
        assert_eq!(reused.id, row.id);
    }

    #[test]
    fn test_force_regenerates_despite_matching_fingerprint() {
        assert!(reuse_existing(true, Some(generated_row(Some("abc"))), "abc").is_none());
    }

    #[test]
    fn test_changed_fingerprint_regenerates() {
        assert!(reuse_existing(false, Some(generated_row(Some("abc"))), "def").is_none());
    }

    #[test]
    fn test_no_stored_version_or_fingerprint_regenerates() {
        assert!(reuse_existing(false, None, "abc").is_none());
        assert!(reuse_existing(false, Some(generated_row(None)), "abc").is_none());
    }
}
