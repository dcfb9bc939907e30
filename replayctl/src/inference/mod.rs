//! Inference backends prompts are replayed against.

pub mod openai;

use crate::conversation::RoleMessage;
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use openai::OpenAiCompatibleBackend;

/// The text a backend produced for one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    /// Server-side processing time in seconds, when the backend reports one
    pub reported_total_time: Option<f64>,
}

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Model every call of this backend uses
    fn model(&self) -> &str;

    /// Runs one chat completion with deterministic (temperature 0) sampling.
    async fn complete(&self, messages: &[RoleMessage]) -> Result<Completion>;
}

#[async_trait]
impl<T: InferenceBackend + ?Sized> InferenceBackend for Arc<T> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn complete(&self, messages: &[RoleMessage]) -> Result<Completion> {
        (**self).complete(messages).await
    }
}
