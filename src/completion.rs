//! Remote completion fallback
//!
//! Answers anything the dialog cannot resolve locally by asking a
//! Gemini-shaped HTTP endpoint.

mod error;
mod gemini;

pub use error::{CompletionError, CompletionErrorKind};
pub use gemini::GeminiCompletion;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for completion backends
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce a reply for a single user utterance
    async fn complete(&self, utterance: &str) -> Result<String, CompletionError>;

    /// Where requests go (for logging)
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    async fn complete(&self, utterance: &str) -> Result<String, CompletionError> {
        (**self).complete(utterance).await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Logging wrapper for completion services
pub struct LoggingCompletion {
    inner: Arc<dyn CompletionService>,
    endpoint: String,
}

impl LoggingCompletion {
    pub fn new(inner: Arc<dyn CompletionService>) -> Self {
        let endpoint = inner.endpoint().to_string();
        Self { inner, endpoint }
    }
}

#[async_trait]
impl CompletionService for LoggingCompletion {
    async fn complete(&self, utterance: &str) -> Result<String, CompletionError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(utterance).await;
        let duration = start.elapsed();

        match &result {
            Ok(text) => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    duration_ms = %duration.as_millis(),
                    reply_chars = text.chars().count(),
                    "Completion request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %self.endpoint,
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    status = ?e.status,
                    error = %e.message,
                    "Completion request failed"
                );
            }
        }

        result
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
