use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user stored style preferences. Enumerated columns hold lower-cased,
/// underscore-normalized tokens from the closed sets in `preferences`.
/// `branding` is a small allow-listed map; `other` is free-form.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPreferenceRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub theme: Option<String>,
    pub language: Option<String>,
    pub industry: Option<String>,
    pub niche: Option<String>,
    pub template_style: Option<String>,
    pub tone_of_voice: Option<String>,
    pub default_output_format: Option<String>,
    pub branding: Value,
    pub other: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
