//! Backend module - Generation trait and its local/remote variants

pub mod local;
pub mod remote;
pub mod traits;

use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::error::Result;

pub use local::{DiffusionPipeline, LocalBackend, PipelineLoader};
pub use remote::RemoteBackend;
pub use traits::{BackendKind, GenerationBackend, GenerationParams};

/// Build the single backend this process serves with, chosen by `local.enabled`
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn GenerationBackend>> {
    if settings.local.enabled {
        info!(model = %settings.local.model_path, "Using local diffusion backend");
        Ok(Arc::new(LocalBackend::from_config(&settings.local)))
    } else {
        info!(
            model = %settings.remote.model,
            configured = settings.hugging_face_configured(),
            "Using hosted inference backend"
        );
        Ok(Arc::new(RemoteBackend::new(&settings.remote)?))
    }
}
