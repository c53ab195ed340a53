use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::gemini::TextGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Provider client behind the `TextGenerator` seam so the generation
    /// flow can be exercised with a mock.
    pub llm: Arc<dyn TextGenerator>,
    pub config: Config,
}
