//! AI solution provider trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderError;

/// Structured solution produced by the AI provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSteps {
    /// Ordered explanation steps, one narration/animation unit each.
    pub steps: Vec<String>,
    /// Final answer in LaTeX or plain text.
    pub answer: String,
}

impl SolutionSteps {
    /// Serializes the solution for storage on the order.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Trait for AI solution generation.
#[async_trait]
pub trait SolutionProvider: Send + Sync {
    /// Generates step-by-step solution content for the extracted problem.
    async fn solve(
        &self,
        problem_text: &str,
        context_hints: &[String],
    ) -> Result<SolutionSteps, ProviderError>;
}

#[derive(Debug, Default)]
struct InMemorySolverState {
    fail_on_solve: bool,
    call_count: u32,
}

/// In-memory solution provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemorySolutionProvider {
    state: Arc<RwLock<InMemorySolverState>>,
}

impl InMemorySolutionProvider {
    /// Creates a new in-memory solution provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to fail on solve calls.
    pub fn set_fail_on_solve(&self, fail: bool) {
        self.state.write().unwrap().fail_on_solve = fail;
    }

    /// Returns how many times solve has been called.
    pub fn call_count(&self) -> u32 {
        self.state.read().unwrap().call_count
    }
}

#[async_trait]
impl SolutionProvider for InMemorySolutionProvider {
    async fn solve(
        &self,
        problem_text: &str,
        _context_hints: &[String],
    ) -> Result<SolutionSteps, ProviderError> {
        let mut state = self.state.write().unwrap();
        state.call_count += 1;

        if state.fail_on_solve {
            return Err(ProviderError::new("unavailable", "solver overloaded"));
        }

        Ok(SolutionSteps {
            steps: vec![
                format!("Restate the problem: {problem_text}"),
                "Isolate the unknown".to_string(),
                "Simplify both sides".to_string(),
            ],
            answer: "x = 2".to_string(),
        })
    }
}
