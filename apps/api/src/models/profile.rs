use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub headline: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub linkedin_url: Option<String>,
    pub summary: Option<String>,
    pub skills: Value,
    pub profile_image_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfileRow {
    /// JSON payload including the resolved profile image URL, when attached.
    pub fn to_payload(&self, s3_endpoint: &str, s3_bucket: &str) -> Value {
        let image_url = self
            .profile_image_key
            .as_deref()
            .map(|key| format!("{}/{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket, key));
        let mut payload = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        payload["profile_image_url"] = json!(image_url);
        payload
    }
}
