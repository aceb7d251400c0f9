//! In-process diffusion backend
//!
//! The pipeline is expensive to construct, so it is loaded on first use and
//! kept for the life of the backend. The load runs on the blocking pool as a
//! task owned by the backend: requests racing on first use all await that one
//! task, a caller that gives up waiting does not abandon it, and a failed load
//! clears the slot for the next request to retry.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::traits::{BackendKind, GenerationBackend, GenerationParams, GUIDANCE_SCALE};
use crate::config::LocalModelConfig;
use crate::error::GenerationFailure;

/// Tag recorded for images produced by the in-process model
pub const LOCAL_MODEL_IDENTIFIER: &str = "local-stable-diffusion";

/// A loaded diffusion model. Calls block for the full sampling run.
pub trait DiffusionPipeline: Send + Sync {
    fn sample(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        steps: u32,
        guidance_scale: f32,
    ) -> Result<DynamicImage, GenerationFailure>;
}

/// Constructs a pipeline. Blocking and expensive.
pub trait PipelineLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn DiffusionPipeline>, GenerationFailure>;
}

type LoadResult = Result<Arc<dyn DiffusionPipeline>, GenerationFailure>;
type LoadTask = Shared<BoxFuture<'static, LoadResult>>;

enum PipelineSlot {
    Empty,
    Loading { attempt: u64, task: LoadTask },
    Ready(Arc<dyn DiffusionPipeline>),
}

/// Backend running the diffusion model inside this process
pub struct LocalBackend {
    loader: Arc<dyn PipelineLoader>,
    slot: Mutex<PipelineSlot>,
    attempts: AtomicU64,
}

impl LocalBackend {
    pub fn new(loader: Arc<dyn PipelineLoader>) -> Self {
        Self {
            loader,
            slot: Mutex::new(PipelineSlot::Empty),
            attempts: AtomicU64::new(0),
        }
    }

    /// Backend driving a stable-diffusion.cpp executable with the configured checkpoint
    pub fn from_config(config: &LocalModelConfig) -> Self {
        Self::new(Arc::new(SdCppLoader::from_config(config)))
    }

    /// Load the pipeline if it is not loaded yet. A no-op once loaded.
    pub async fn ensure_loaded(&self) -> Result<(), GenerationFailure> {
        self.pipeline().await.map(|_| ())
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.slot.lock(), PipelineSlot::Ready(_))
    }

    async fn pipeline(&self) -> LoadResult {
        let (attempt, task) = {
            let mut slot = self.slot.lock();
            match &*slot {
                PipelineSlot::Ready(pipeline) => return Ok(pipeline.clone()),
                PipelineSlot::Loading { attempt, task } => (*attempt, task.clone()),
                PipelineSlot::Empty => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let task = self.start_load();
                    *slot = PipelineSlot::Loading {
                        attempt,
                        task: task.clone(),
                    };
                    (attempt, task)
                }
            }
        };

        let result = task.await;

        let mut slot = self.slot.lock();
        if matches!(&*slot, PipelineSlot::Loading { attempt: current, .. } if *current == attempt) {
            *slot = match &result {
                Ok(pipeline) => PipelineSlot::Ready(pipeline.clone()),
                Err(_) => PipelineSlot::Empty,
            };
        }
        result
    }

    /// Start loading on the blocking pool right away so the load outlives
    /// any single waiter
    fn start_load(&self) -> LoadTask {
        info!("Loading local diffusion model");
        let loader = self.loader.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let loaded = loader.load();
            match &loaded {
                Ok(_) => info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Local diffusion model loaded"
                ),
                Err(e) => warn!(reason = %e, "Local diffusion model failed to load"),
            }
            loaded
        });

        async move {
            handle
                .await
                .map_err(|e| GenerationFailure::new(format!("Model loading task failed: {}", e)))
                .and_then(|loaded| loaded)
        }
        .boxed()
        .shared()
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    fn model_identifier(&self) -> &str {
        LOCAL_MODEL_IDENTIFIER
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn generate(&self, params: &GenerationParams) -> Result<Vec<u8>, GenerationFailure> {
        let pipeline = self.pipeline().await?;
        let prompt = params.styled_prompt();
        let (width, height, steps) = (params.width, params.height, params.num_inference_steps);

        debug!(width, height, steps, "Sampling on local pipeline");

        let image = tokio::task::spawn_blocking(move || {
            pipeline.sample(&prompt, width, height, steps, GUIDANCE_SCALE)
        })
        .await
        .map_err(|e| GenerationFailure::new(format!("Local generation error: {}", e)))??;

        encode_png(&image)
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, GenerationFailure> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| GenerationFailure::new(format!("Failed to encode PNG: {}", e)))?;
    Ok(bytes)
}

/// Loads a checkpoint for a stable-diffusion.cpp compatible executable
pub struct SdCppLoader {
    executable: String,
    model_path: String,
}

impl SdCppLoader {
    pub fn from_config(config: &LocalModelConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            model_path: config.model_path.trim().to_string(),
        }
    }
}

impl PipelineLoader for SdCppLoader {
    fn load(&self) -> Result<Arc<dyn DiffusionPipeline>, GenerationFailure> {
        let model = PathBuf::from(&self.model_path);
        if self.model_path.is_empty() || !model.exists() {
            return Err(GenerationFailure::new(format!(
                "Model '{}' not found; set LOCAL_MODEL_PATH to a downloaded checkpoint",
                self.model_path
            )));
        }

        let runtime_check = Command::new(&self.executable).arg("--help").output();
        if let Err(e) = runtime_check {
            return Err(GenerationFailure::new(format!(
                "Diffusion runtime '{}' is not available: {}",
                self.executable, e
            )));
        }

        Ok(Arc::new(SdCppPipeline {
            executable: self.executable.clone(),
            model,
        }))
    }
}

struct SdCppPipeline {
    executable: String,
    model: PathBuf,
}

impl SdCppPipeline {
    fn read_output(path: &Path) -> Result<DynamicImage, GenerationFailure> {
        let image = image::open(path)
            .map_err(|e| GenerationFailure::new(format!("Local generation error: {}", e)));
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = ?path, error = %e, "Failed to remove sampler output");
        }
        image
    }
}

impl DiffusionPipeline for SdCppPipeline {
    fn sample(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        steps: u32,
        guidance_scale: f32,
    ) -> Result<DynamicImage, GenerationFailure> {
        let output = std::env::temp_dir().join(format!("sample_{}.png", Uuid::new_v4()));

        let result = Command::new(&self.executable)
            .arg("-m")
            .arg(&self.model)
            .arg("-p")
            .arg(prompt)
            .arg("-W")
            .arg(width.to_string())
            .arg("-H")
            .arg(height.to_string())
            .arg("--steps")
            .arg(steps.to_string())
            .arg("--cfg-scale")
            .arg(guidance_scale.to_string())
            .arg("-o")
            .arg(&output)
            .output()
            .map_err(|e| GenerationFailure::new(format!("Local generation error: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().last().unwrap_or("no output").to_string();
            return Err(GenerationFailure::new(format!(
                "Local generation error: sampler exited with {}: {}",
                result.status, last_line
            )));
        }

        Self::read_output(&output)
    }
}
