//! Prompt-to-Image Service
//!
//! Accepts text prompts, generates images through a local or hosted diffusion
//! backend, stores the results and keeps a per-user generation history.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod generation;
pub mod history;
pub mod identity;
pub mod middleware;
pub mod storage;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::GenerationBackend;
use generation::GenerationOrchestrator;
use history::HistoryRepository;
use storage::ArtifactStore;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub history: Arc<dyn HistoryRepository>,
}

impl AppState {
    /// Wire the orchestrator from its collaborators
    pub fn new(
        settings: config::Settings,
        backend: Arc<dyn GenerationBackend>,
        artifacts: Arc<dyn ArtifactStore>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            backend,
            artifacts,
            history.clone(),
            &settings.generation,
        ));

        Self {
            settings: Arc::new(settings),
            orchestrator,
            history,
        }
    }
}
