//! Artifact storage module

pub mod artifact;

pub use artifact::{normalize_png, ArtifactRef, ArtifactStore, FileArtifactStore};
