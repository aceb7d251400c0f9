//! Generation orchestration: validate, generate, store, record

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{BackendKind, GenerationBackend, GenerationParams};
use crate::config::GenerationConfig;
use crate::error::{AppError, GenerationFailure, Result};
use crate::generation::validator::{self, GenerateInput};
use crate::history::{HistoryRecord, HistoryRepository};
use crate::identity::Identity;
use crate::storage::{ArtifactRef, ArtifactStore};

/// Result of a completed generation
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub record: HistoryRecord,
    /// Seconds spent inside the backend call
    pub generation_time: f64,
    pub model_used: String,
}

/// Sequences one generation request end to end.
///
/// Records are only created after their artifact is stored. A failure at any
/// stage leaves no record behind; an insert failure also removes the artifact
/// written for it.
pub struct GenerationOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    artifacts: Arc<dyn ArtifactStore>,
    history: Arc<dyn HistoryRepository>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl GenerationOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        artifacts: Arc<dyn ArtifactStore>,
        history: Arc<dyn HistoryRepository>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            backend,
            artifacts,
            history,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn model_identifier(&self) -> &str {
        self.backend.model_identifier()
    }

    /// Run a generation for `identity`
    pub async fn generate(&self, input: &GenerateInput, identity: &Identity) -> Result<GenerationOutcome> {
        let params = validator::validate(input)?;
        debug!(
            width = params.width,
            height = params.height,
            steps = params.num_inference_steps,
            "Generation request validated"
        );

        let (bytes, elapsed) = self.invoke_backend(&params).await?;
        let generation_time = elapsed.as_secs_f64();

        let artifact = self.artifacts.save(&bytes).await.map_err(|e| {
            error!(error = %e, "Failed to persist generated image");
            AppError::Artifact(e)
        })?;

        let record = HistoryRecord {
            id: Uuid::new_v4(),
            owner: identity.user_id().map(String::from),
            prompt: params.prompt,
            style: params.style,
            image: artifact.path.clone(),
            image_url: Some(artifact.url.clone()),
            created_at: Utc::now(),
            generation_time: Some(generation_time),
            model_used: self.backend.model_identifier().to_string(),
        };

        let record = match self.history.create(record).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, artifact = %artifact.path, "Failed to record generation");
                self.discard_artifact(&artifact).await;
                return Err(AppError::Repository(e));
            }
        };

        info!(
            id = %record.id,
            model = %record.model_used,
            generation_time,
            authenticated = identity.is_authenticated(),
            "Generation recorded"
        );

        Ok(GenerationOutcome {
            model_used: record.model_used.clone(),
            generation_time,
            record,
        })
    }

    /// Call the backend under the concurrency limit and optional deadline.
    /// The returned duration covers only the backend call.
    async fn invoke_backend(&self, params: &GenerationParams) -> Result<(Vec<u8>, Duration)> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::Internal("Generation permits closed".to_string()))?;

        let started = Instant::now();
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.backend.generate(params)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationFailure::new(format!(
                    "Generation timed out after {}s",
                    limit.as_secs()
                ))),
            },
            None => self.backend.generate(params).await,
        };

        match outcome {
            Ok(bytes) => {
                let elapsed = started.elapsed();
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    size = bytes.len(),
                    "Backend returned image"
                );
                Ok((bytes, elapsed))
            }
            Err(failure) => {
                warn!(
                    backend = ?self.backend.kind(),
                    reason = %failure,
                    "Generation backend failed"
                );
                Err(AppError::Generation(failure))
            }
        }
    }

    async fn discard_artifact(&self, artifact: &ArtifactRef) {
        if let Err(e) = self.artifacts.delete(artifact).await {
            warn!(artifact = %artifact.path, error = %e, "Orphaned artifact left in storage");
        }
    }
}
