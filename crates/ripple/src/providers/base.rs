use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderResult;
use crate::models::message::Message;
use crate::models::request::ChatRequest;
use crate::protocol::part::StreamPart;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Result of a single-shot generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub message: Message,
    pub usage: Usage,
}

/// Lazy, finite sequence of parts produced for one request
pub type PartStream = BoxStream<'static, ProviderResult<StreamPart>>;

/// Base trait for model adapters that serve chat requests
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short name used in logs and response annotations
    fn name(&self) -> &str;

    /// Generate the whole assistant message at once
    async fn generate(&self, request: &ChatRequest) -> ProviderResult<Generation>;

    /// Generate the assistant message as a stream of protocol parts.
    ///
    /// Errors returned here reject the request before anything streams; errors yielded by
    /// the stream end it after the parts already sent.
    async fn stream(&self, request: &ChatRequest) -> ProviderResult<PartStream>;
}
