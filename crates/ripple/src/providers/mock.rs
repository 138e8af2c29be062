use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::request::ChatRequest;
use crate::models::tool::ToolInvocation;
use crate::protocol::part::StreamPart;
use crate::providers::base::{Generation, PartStream, Provider, Usage};

/// A mock provider that plays back pre-configured part scripts, one per request
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    scripts: Arc<Mutex<VecDeque<Vec<ProviderResult<StreamPart>>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a new mock provider with a sequence of scripts
    pub fn new(scripts: Vec<Vec<ProviderResult<StreamPart>>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            requests: Arc::default(),
        }
    }

    /// A provider whose every script succeeds
    pub fn with_parts(scripts: Vec<Vec<StreamPart>>) -> Self {
        Self::new(
            scripts
                .into_iter()
                .map(|parts| parts.into_iter().map(Ok).collect())
                .collect(),
        )
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    fn next_script(&self, request: &ChatRequest) -> ProviderResult<Vec<ProviderResult<StreamPart>>> {
        request.validate()?;
        lock(&self.requests).push(request.clone());
        // Return an empty response once the scripts run out
        Ok(lock(&self.scripts).pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &ChatRequest) -> ProviderResult<Generation> {
        let mut message = Message::assistant();
        for part in self.next_script(request)? {
            match part? {
                StreamPart::TextDelta(text) => message.content.push_str(&text),
                StreamPart::ToolCallComplete {
                    tool_call_id,
                    tool_name,
                    args,
                } => {
                    message = message.with_tool_invocation(ToolInvocation::call(
                        tool_call_id,
                        tool_name,
                        args,
                    ))
                }
                StreamPart::Error(error) => return Err(ProviderError::Api(error)),
                _ => {}
            }
        }
        Ok(Generation {
            message,
            usage: Usage::default(),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> ProviderResult<PartStream> {
        let script = self.next_script(request)?;
        Ok(futures::stream::iter(script).boxed())
    }
}
