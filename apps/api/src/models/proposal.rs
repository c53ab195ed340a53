use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// Valid proposal lifecycle states. `generated` is set by the generation
/// flow; `completed` only via a client update.
pub const PROPOSAL_STATUSES: &[&str] = &["draft", "generated", "completed"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProposalRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_name: String,
    pub client_requirements: Option<String>,
    pub scope_of_work: String,
    pub timeline: Option<String>,
    pub pricing: Option<String>,
    pub status: String,
    pub user_preference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One versioned AI generation output for a proposal.
///
/// The input fingerprint lives in its own column rather than inside
/// `content_sections`: content is user-editable (full replace), and an edit
/// must not be able to strip or disturb the idempotence marker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedProposalRow {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub content_sections: Value,
    pub selected_template: Option<String>,
    pub version: i32,
    pub fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GeneratedProposalRow {
    /// JSON payload for API responses. The fingerprint is exposed under a
    /// `meta` sub-object so clients see it as metadata, not editable content.
    pub fn to_payload(&self) -> Value {
        json!({
            "id": self.id,
            "proposal_id": self.proposal_id,
            "content_sections": self.content_sections,
            "selected_template": self.selected_template,
            "version": self.version,
            "meta": { "fingerprint": self.fingerprint },
            "created_at": self.created_at,
        })
    }
}
