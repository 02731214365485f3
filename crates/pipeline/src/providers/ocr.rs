//! OCR provider trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::ProviderError;

/// Marker the provider returns for an image with no recognizable content.
pub const EMPTY_MARKER: &str = "[EMPTY]";
/// Marker the provider returns for a document scan rather than a problem photo.
pub const DOC_IMAGE_MARKER: &str = "[DOCIMG]";

/// Result of a successful OCR extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrExtraction {
    /// Extracted problem text (LaTeX or plain).
    pub text: String,
    /// Provider confidence in `[0, 1]`.
    pub confidence: f64,
}

impl OcrExtraction {
    /// Returns true if the text is one of the unreadable-image markers.
    /// Those are a distinguishable failure kind, not a transport error.
    pub fn is_unreadable_marker(&self) -> bool {
        self.text == EMPTY_MARKER || self.text == DOC_IMAGE_MARKER
    }
}

/// Trait for OCR text extraction.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Extracts problem text from an image.
    async fn extract(&self, image: &[u8]) -> Result<OcrExtraction, ProviderError>;
}

#[derive(Debug)]
struct InMemoryOcrState {
    canned_text: String,
    confidence: f64,
    fail_on_extract: bool,
    delay: Option<std::time::Duration>,
    call_count: u32,
}

impl Default for InMemoryOcrState {
    fn default() -> Self {
        Self {
            canned_text: "2x + 1 = 5".to_string(),
            confidence: 0.97,
            fail_on_extract: false,
            delay: None,
            call_count: 0,
        }
    }
}

/// In-memory OCR provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOcrProvider {
    state: Arc<RwLock<InMemoryOcrState>>,
}

impl InMemoryOcrProvider {
    /// Creates a new in-memory OCR provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the text returned by subsequent extract calls.
    pub fn set_canned_text(&self, text: impl Into<String>) {
        self.state.write().unwrap().canned_text = text.into();
    }

    /// Configures the provider to fail on extract calls.
    pub fn set_fail_on_extract(&self, fail: bool) {
        self.state.write().unwrap().fail_on_extract = fail;
    }

    /// Configures an artificial latency for extract calls.
    pub fn set_delay(&self, delay: std::time::Duration) {
        self.state.write().unwrap().delay = Some(delay);
    }

    /// Returns how many times extract has been called.
    pub fn call_count(&self) -> u32 {
        self.state.read().unwrap().call_count
    }
}

#[async_trait]
impl OcrProvider for InMemoryOcrProvider {
    async fn extract(&self, _image: &[u8]) -> Result<OcrExtraction, ProviderError> {
        let (fail, delay, extraction) = {
            let mut state = self.state.write().unwrap();
            state.call_count += 1;
            (
                state.fail_on_extract,
                state.delay,
                OcrExtraction {
                    text: state.canned_text.clone(),
                    confidence: state.confidence,
                },
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(ProviderError::new("unavailable", "OCR service unavailable"));
        }
        Ok(extraction)
    }
}
