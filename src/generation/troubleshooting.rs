//! Operator guidance attached to failed generations

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::backend::BackendKind;

pub const HUGGING_FACE_HINTS: [&str; 3] = [
    "Check if HUGGING_FACE_API_KEY is set in environment",
    "Verify API key is valid and has correct permissions",
    "Try a different model if current one is unavailable",
];

pub const LOCAL_MODEL_HINTS: [&str; 3] = [
    "Install the stable-diffusion runtime and make sure it is on PATH",
    "Ensure adequate GPU memory or use CPU",
    "Check if model path is correct",
];

/// Both hint sets, with the set for the active backend serialized first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Troubleshooting {
    pub active: BackendKind,
}

impl Troubleshooting {
    pub fn for_backend(active: BackendKind) -> Self {
        Self { active }
    }
}

impl Serialize for Troubleshooting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self.active {
            BackendKind::Remote => {
                map.serialize_entry("hugging_face_issues", &HUGGING_FACE_HINTS)?;
                map.serialize_entry("local_model_issues", &LOCAL_MODEL_HINTS)?;
            }
            BackendKind::Local => {
                map.serialize_entry("local_model_issues", &LOCAL_MODEL_HINTS)?;
                map.serialize_entry("hugging_face_issues", &HUGGING_FACE_HINTS)?;
            }
        }
        map.end()
    }
}
