//! Video assembly service trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::ProviderError;

/// Trait for final video assembly from rendered clips.
#[async_trait]
pub trait AssemblyService: Send + Sync {
    /// Concatenates video clips with their audio tracks into the final video.
    /// Returns the storage path of the assembled file.
    async fn assemble(
        &self,
        video_clips: &[String],
        audio_clips: &[String],
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Default)]
struct InMemoryAssemblyState {
    fail_on_assemble: bool,
    next_id: u32,
    assembled: Vec<String>,
}

/// In-memory assembly service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssemblyService {
    state: Arc<RwLock<InMemoryAssemblyState>>,
}

impl InMemoryAssemblyService {
    /// Creates a new in-memory assembly service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on assemble calls.
    pub fn set_fail_on_assemble(&self, fail: bool) {
        self.state.write().unwrap().fail_on_assemble = fail;
    }

    /// Returns the number of assembled videos.
    pub fn assembled_count(&self) -> usize {
        self.state.read().unwrap().assembled.len()
    }
}

#[async_trait]
impl AssemblyService for InMemoryAssemblyService {
    async fn assemble(
        &self,
        video_clips: &[String],
        audio_clips: &[String],
    ) -> Result<String, ProviderError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_assemble {
            return Err(ProviderError::new("unavailable", "ffmpeg worker crashed"));
        }
        if video_clips.is_empty() || video_clips.len() != audio_clips.len() {
            return Err(ProviderError::new(
                "invalid_input",
                format!(
                    "clip count mismatch: {} video, {} audio",
                    video_clips.len(),
                    audio_clips.len()
                ),
            ));
        }

        state.next_id += 1;
        let path = format!("mem://videos/final-{:04}.mp4", state.next_id);
        state.assembled.push(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assemble_returns_path() {
        let service = InMemoryAssemblyService::new();

        let path = service
            .assemble(
                &["clip-0.mp4".to_string()],
                &["clip-0.wav".to_string()],
            )
            .await
            .unwrap();

        assert!(path.ends_with(".mp4"));
        assert_eq!(service.assembled_count(), 1);
    }

    #[tokio::test]
    async fn test_clip_count_mismatch_fails() {
        let service = InMemoryAssemblyService::new();

        let result = service
            .assemble(&["clip-0.mp4".to_string()], &[])
            .await;
        assert!(result.is_err());
        assert_eq!(service.assembled_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_on_assemble() {
        let service = InMemoryAssemblyService::new();
        service.set_fail_on_assemble(true);

        let result = service
            .assemble(
                &["clip-0.mp4".to_string()],
                &["clip-0.wav".to_string()],
            )
            .await;
        assert!(result.is_err());
    }
}
