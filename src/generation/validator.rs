//! Validation and normalization of generation requests

use serde::Deserialize;
use serde_json::Value;

use crate::backend::GenerationParams;
use crate::error::{FieldErrors, ValidationErrors};

pub const PROMPT_MAX_CHARS: usize = 1000;
pub const STYLE_MAX_CHARS: usize = 100;
pub const DEFAULT_STYLE: &str = "realistic";
pub const DEFAULT_DIMENSION: u32 = 512;
pub const MIN_DIMENSION: i64 = 256;
pub const MAX_DIMENSION: i64 = 1024;
pub const DEFAULT_STEPS: u32 = 20;
pub const MIN_STEPS: i64 = 1;
pub const MAX_STEPS: i64 = 100;

/// Raw request body. Fields stay untyped so type errors are reported per field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateInput {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default, alias = "numInferenceSteps")]
    pub num_inference_steps: Option<Value>,
}

impl GenerateInput {
    /// Convenience constructor for a prompt-only request
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(Value::String(prompt.into())),
            ..Self::default()
        }
    }
}

/// Validate `input`, collecting every violation
pub fn validate(input: &GenerateInput) -> Result<GenerationParams, ValidationErrors> {
    let mut errors = FieldErrors::new();

    let prompt = match input.prompt.as_ref() {
        None => {
            push(&mut errors, "prompt", "This field is required.");
            None
        }
        Some(value) => text_field(&mut errors, "prompt", value, PROMPT_MAX_CHARS),
    };

    let style = match input.style.as_ref() {
        None => Some(DEFAULT_STYLE.to_string()),
        Some(value) => text_field(&mut errors, "style", value, STYLE_MAX_CHARS),
    };

    let width = int_field(&mut errors, "width", input.width.as_ref(), DEFAULT_DIMENSION, MIN_DIMENSION, MAX_DIMENSION);
    let height = int_field(&mut errors, "height", input.height.as_ref(), DEFAULT_DIMENSION, MIN_DIMENSION, MAX_DIMENSION);
    let steps = int_field(
        &mut errors,
        "num_inference_steps",
        input.num_inference_steps.as_ref(),
        DEFAULT_STEPS,
        MIN_STEPS,
        MAX_STEPS,
    );

    match (prompt, style, width, height, steps) {
        (Some(prompt), Some(style), Some(width), Some(height), Some(num_inference_steps))
            if errors.is_empty() =>
        {
            Ok(GenerationParams {
                prompt,
                style,
                width,
                height,
                num_inference_steps,
            })
        }
        _ => Err(ValidationErrors(errors)),
    }
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

fn text_field(errors: &mut FieldErrors, field: &str, value: &Value, max_chars: usize) -> Option<String> {
    let Some(text) = value.as_str() else {
        push(errors, field, "Not a valid string.");
        return None;
    };

    let text = text.trim();
    if text.is_empty() {
        push(errors, field, "This field may not be blank.");
        return None;
    }

    if text.chars().count() > max_chars {
        push(
            errors,
            field,
            format!("Ensure this field has no more than {} characters.", max_chars),
        );
        return None;
    }

    Some(text.to_string())
}

/// Whole-valued floats such as `512.0` count as integers
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// `"512"` or `"512.0"`; any non-zero fraction is rejected
fn parse_integer(s: &str) -> Option<i64> {
    match s.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole.parse().ok(),
        Some(_) => None,
        None => s.parse().ok(),
    }
}

fn int_field(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&Value>,
    default: u32,
    min: i64,
    max: i64,
) -> Option<u32> {
    let Some(value) = value else {
        return Some(default);
    };

    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => parse_integer(s.trim()),
        _ => None,
    };

    let Some(n) = parsed else {
        push(errors, field, "A valid integer is required.");
        return None;
    };

    if n < min {
        push(
            errors,
            field,
            format!("Ensure this value is greater than or equal to {}.", min),
        );
        return None;
    }
    if n > max {
        push(
            errors,
            field,
            format!("Ensure this value is less than or equal to {}.", max),
        );
        return None;
    }

    u32::try_from(n).ok()
}
