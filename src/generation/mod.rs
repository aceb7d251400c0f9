//! Generation module - Request validation and orchestration

pub mod orchestrator;
pub mod troubleshooting;
pub mod validator;

pub use orchestrator::{GenerationOrchestrator, GenerationOutcome};
pub use troubleshooting::Troubleshooting;
pub use validator::GenerateInput;
