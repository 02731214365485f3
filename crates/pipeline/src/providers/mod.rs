//! External collaborator traits and in-memory test doubles.
//!
//! Every pipeline stage talks to one of these through a trait, so tests and
//! local development run against the in-memory doubles while production
//! wires real HTTP clients.

pub mod assembly;
pub mod ocr;
pub mod solver;
pub mod storage;

use thiserror::Error;

pub use assembly::{AssemblyService, InMemoryAssemblyService};
pub use ocr::{InMemoryOcrProvider, OcrExtraction, OcrProvider};
pub use solver::{InMemorySolutionProvider, SolutionProvider, SolutionSteps};
pub use storage::{FileStorage, InMemoryFileStorage};

/// Error returned by an external collaborator.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Machine-readable error code, e.g. "timeout" or "unavailable".
    pub code: String,
    /// Human-readable diagnostic.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error with the given code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A bounded-timeout expiry, treated as a stage failure.
    pub fn timeout(what: &str) -> Self {
        Self::new("timeout", format!("{what} timed out"))
    }
}
