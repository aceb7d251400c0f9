//! Hosted inference backend (Hugging Face inference API)

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::{BackendKind, GenerationBackend, GenerationParams, GUIDANCE_SCALE};
use crate::config::RemoteConfig;
use crate::error::{AppError, GenerationFailure, Result};

/// Tag recorded for images produced by the hosted API
pub const REMOTE_MODEL_IDENTIFIER: &str = "huggingface-api";

/// HTTP-based image generation backend
pub struct RemoteBackend {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

/// Request body for the inference API
#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    width: u32,
    height: u32,
    num_inference_steps: u32,
    guidance_scale: f32,
}

/// JSON bodies some deployments return instead of raw image bytes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceJson {
    Images(ApiImagesResponse),
    List(Vec<ApiImageData>),
}

#[derive(Debug, Deserialize)]
struct ApiImagesResponse {
    #[serde(default)]
    images: Vec<ApiImageData>,
    #[serde(default)]
    data: Vec<ApiImageData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiImageData {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default, alias = "generated_image", alias = "image")]
    base64: Option<String>,
}

impl ApiImageData {
    fn payload(self) -> Option<String> {
        self.b64_json.or(self.base64)
    }
}

/// Error body returned on non-success statuses
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
    #[serde(default)]
    estimated_time: Option<f64>,
}

impl RemoteBackend {
    /// Create a new remote backend from configuration
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let api_key = config
            .api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/models/{}",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
        })
    }

    /// Full URL generation requests are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn decode_json(body: &[u8]) -> std::result::Result<Vec<u8>, GenerationFailure> {
        let parsed: InferenceJson = serde_json::from_slice(body).map_err(|e| {
            GenerationFailure::new(format!("Unexpected response payload from inference API: {}", e))
        })?;

        let first = match parsed {
            InferenceJson::Images(resp) => {
                if let Some(error) = resp.error {
                    return Err(GenerationFailure::new(format!("Inference API error: {}", error)));
                }
                resp.images.into_iter().chain(resp.data).find_map(ApiImageData::payload)
            }
            InferenceJson::List(items) => items.into_iter().find_map(ApiImageData::payload),
        };

        let encoded = first.ok_or_else(|| {
            GenerationFailure::new("Inference API response did not contain an image")
        })?;

        // Tolerate data URLs ("data:image/png;base64,...")
        let data = encoded.rsplit(',').next().unwrap_or(&encoded);
        STANDARD
            .decode(data.trim())
            .map_err(|e| GenerationFailure::new(format!("Invalid base64 image data: {}", e)))
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    fn model_identifier(&self) -> &str {
        REMOTE_MODEL_IDENTIFIER
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn generate(&self, params: &GenerationParams) -> std::result::Result<Vec<u8>, GenerationFailure> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GenerationFailure::new("HUGGING_FACE_API_KEY is not configured")
        })?;

        debug!(endpoint = %self.endpoint, "Sending generate request");

        let request = InferenceRequest {
            inputs: params.styled_prompt(),
            parameters: InferenceParameters {
                width: params.width,
                height: params.height,
                num_inference_steps: params.num_inference_steps,
                guidance_scale: GUIDANCE_SCALE,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    warn!(endpoint = %self.endpoint, error = %e, "Inference API unreachable");
                    GenerationFailure::new(format!("Inference API unavailable: {}", e))
                } else {
                    GenerationFailure::new(format!("Inference API request failed: {}", e))
                }
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let body = response
            .bytes()
            .await
            .map_err(|e| GenerationFailure::new(format!("Failed to read inference API response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ApiError>(&body)
                .map(|err| match err.estimated_time {
                    Some(eta) => format!("{} (estimated time {:.0}s)", err.error, eta),
                    None => err.error,
                })
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());

            warn!(status = %status, detail = %detail, "Inference API returned an error");

            let reason = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("Inference API rejected the credentials ({}): {}", status, detail)
                }
                StatusCode::SERVICE_UNAVAILABLE => {
                    format!("Model is currently unavailable ({}): {}", status, detail)
                }
                _ => format!("Inference API returned {}: {}", status, detail),
            };
            return Err(GenerationFailure::new(reason));
        }

        if content_type.starts_with("image/") {
            if body.is_empty() {
                return Err(GenerationFailure::new("Inference API returned an empty image"));
            }
            return Ok(body.to_vec());
        }

        if content_type.contains("json") {
            return Self::decode_json(&body);
        }

        Err(GenerationFailure::new(format!(
            "Unexpected response payload from inference API (content-type '{}')",
            content_type
        )))
    }
}
