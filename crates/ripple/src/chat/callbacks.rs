use async_trait::async_trait;
use serde_json::Value;

use super::state::ChatState;
use crate::errors::ChatError;
use crate::models::message::Message;
use crate::models::tool::ToolCall;

/// Hooks a [`ChatSession`](super::ChatSession) calls while it processes a request.
///
/// Every hook has a default that does nothing.
#[async_trait]
pub trait ChatCallbacks: Send + Sync {
    /// Handle a tool call on the client as soon as its arguments are complete.
    ///
    /// Returning a value attaches it as the call's result.
    async fn on_tool_call(&self, _call: &ToolCall) -> Option<Value> {
        None
    }

    /// The conversation changed: the optimistic user message, every streamed part folded
    /// into it, a rollback, or an attached tool result
    async fn on_update(&self, _state: &ChatState) {}

    /// The request finished, with the assistant message it produced if any
    async fn on_finish(&self, _message: Option<&Message>) {}

    /// The request failed and the conversation was rolled back
    async fn on_error(&self, _error: &ChatError) {}
}

/// Callbacks that ignore every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl ChatCallbacks for NoCallbacks {}
