//! Common traits and types for image generation backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationFailure;

/// Classifier-free guidance scale applied to every generation
pub const GUIDANCE_SCALE: f32 = 7.5;

/// Validated, normalized generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// The user prompt, without style decoration
    pub prompt: String,

    /// Style tag appended to the prompt
    pub style: String,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Number of sampling steps
    pub num_inference_steps: u32,
}

impl GenerationParams {
    /// Prompt as sent to the model: `"{prompt}, {style} style"`
    pub fn styled_prompt(&self) -> String {
        format!("{}, {} style", self.prompt, self.style)
    }
}

/// Which backend variant is serving this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process diffusion pipeline
    Local,
    /// Hosted inference API
    Remote,
}

/// Trait for image generation backends
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Tag recorded as `model_used` on every record this backend produces
    fn model_identifier(&self) -> &str;

    /// Backend variant
    fn kind(&self) -> BackendKind;

    /// Generate one image, returning its encoded bytes
    async fn generate(&self, params: &GenerationParams) -> Result<Vec<u8>, GenerationFailure>;
}
