use std::collections::HashMap;

use serde_json::Value;

use super::partial_json::parse_partial_json;
use super::state::ChatState;
use crate::errors::ChatError;
use crate::models::message::Message;
use crate::models::tool::{FunctionCall, ToolCall, ToolInvocation, ToolInvocationState};
use crate::protocol::part::{StreamPart, StreamStatus};

/// What the session should do after a part has been folded in
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue,
    /// A tool call just received its complete arguments
    ToolCall(ToolCall),
    /// The server reported a failure, the cycle must be rolled back
    Failed(ChatError),
}

/// Folds the parts of one request cycle into the conversation.
///
/// The assistant message of the cycle is created lazily by the first part that carries
/// content. Once the server signals completion the message stops accepting content.
#[derive(Debug)]
pub struct Reconciler {
    target: Option<usize>,
    streaming: bool,
    args_text: HashMap<String, String>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            target: None,
            streaming: true,
            args_text: HashMap::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Stop accepting content
    pub fn stop(&mut self) {
        self.streaming = false;
    }

    /// The assistant message this cycle writes to, if one has been created
    pub fn target<'a>(&self, state: &'a ChatState) -> Option<&'a Message> {
        self.target.and_then(|index| state.messages.get(index))
    }

    pub fn target_mut<'a>(&self, state: &'a mut ChatState) -> Option<&'a mut Message> {
        self.target.and_then(|index| state.messages.get_mut(index))
    }

    pub fn apply(&mut self, state: &mut ChatState, part: StreamPart) -> Flow {
        match part {
            StreamPart::DataItems(items) => state.data.extend(items),
            StreamPart::ThreadId(thread_id) => state.thread_id = Some(thread_id),
            StreamPart::Status { status, information } => match status {
                StreamStatus::InProgress => {}
                StreamStatus::Complete => {
                    tracing::debug!("server marked the response complete");
                    self.stop();
                }
                StreamStatus::Failed => {
                    return Flow::Failed(ChatError::Provider(
                        information.unwrap_or_else(|| "response failed".to_string()),
                    ))
                }
            },
            StreamPart::Error(message) => return Flow::Failed(ChatError::Provider(message)),
            content if !self.streaming => {
                tracing::debug!(kind = ?content.kind(), "ignoring content after the response completed");
            }
            StreamPart::TextDelta(text) => self.message(state).content.push_str(&text),
            StreamPart::MessageAnnotation(annotation) => self
                .message(state)
                .annotations
                .get_or_insert_with(Vec::new)
                .push(annotation),
            StreamPart::FunctionCallComplete { name, arguments } => {
                self.message(state).function_call = Some(FunctionCall { name, arguments })
            }
            StreamPart::ToolCallStart {
                tool_call_id,
                tool_name,
            } => {
                self.args_text.insert(tool_call_id.clone(), String::new());
                let invocation = self.invocation(state, &tool_call_id, Some(tool_name.as_str()));
                if invocation.state == ToolInvocationState::PartialCall {
                    invocation.tool_name = tool_name;
                }
            }
            StreamPart::ToolCallArgsDelta {
                tool_call_id,
                tool_name,
                args_text_delta,
            } => return self.args_delta(state, tool_call_id, tool_name, &args_text_delta),
            StreamPart::ToolCallComplete {
                tool_call_id,
                tool_name,
                args,
            } => {
                self.args_text.remove(&tool_call_id);
                let invocation = self.invocation(state, &tool_call_id, Some(tool_name.as_str()));
                match invocation.state {
                    ToolInvocationState::PartialCall => {
                        invocation.tool_name = tool_name;
                        invocation.args = args;
                        invocation.state = ToolInvocationState::Call;
                        return Flow::ToolCall(invocation.to_tool_call());
                    }
                    // Already announced when its streamed arguments closed
                    ToolInvocationState::Call => invocation.args = args,
                    ToolInvocationState::Result => {
                        tracing::debug!(%tool_call_id, "tool call already has a result");
                    }
                }
            }
        }
        Flow::Continue
    }

    fn args_delta(
        &mut self,
        state: &mut ChatState,
        tool_call_id: String,
        tool_name: Option<String>,
        delta: &str,
    ) -> Flow {
        let text = self.args_text.entry(tool_call_id.clone()).or_default();
        text.push_str(delta);
        let text = text.clone();

        let invocation = self.invocation(state, &tool_call_id, tool_name.as_deref());
        if invocation.state != ToolInvocationState::PartialCall {
            tracing::debug!(%tool_call_id, "ignoring argument text for a completed tool call");
            return Flow::Continue;
        }
        if let Some(tool_name) = tool_name.filter(|name| !name.is_empty()) {
            invocation.tool_name = tool_name;
        }

        // Only closed objects and arrays are known to be complete
        let complete = serde_json::from_str::<Value>(&text)
            .ok()
            .filter(|args| args.is_object() || args.is_array());
        match complete {
            Some(args) if !invocation.tool_name.is_empty() => {
                invocation.args = args;
                invocation.state = ToolInvocationState::Call;
                Flow::ToolCall(invocation.to_tool_call())
            }
            _ => {
                if let Some(args) = parse_partial_json(&text) {
                    invocation.args = args;
                }
                Flow::Continue
            }
        }
    }

    /// The streaming message, created on first use
    fn message<'a>(&mut self, state: &'a mut ChatState) -> &'a mut Message {
        let index = match self.target {
            Some(index) => index,
            None => {
                state.messages.push(Message::assistant());
                let index = state.messages.len() - 1;
                tracing::debug!(message_id = %state.messages[index].id, "streaming new assistant message");
                self.target = Some(index);
                index
            }
        };
        &mut state.messages[index]
    }

    /// Find the invocation for `tool_call_id` on the streaming message, creating it when the
    /// server mentions an id for the first time
    fn invocation<'a>(
        &mut self,
        state: &'a mut ChatState,
        tool_call_id: &str,
        tool_name: Option<&str>,
    ) -> &'a mut ToolInvocation {
        let message = self.message(state);
        let invocations = message.tool_invocations.get_or_insert_with(Vec::new);
        let position = invocations
            .iter()
            .position(|invocation| invocation.tool_call_id == tool_call_id);
        let index = match position {
            Some(index) => index,
            None => {
                invocations.push(ToolInvocation::partial(
                    tool_call_id,
                    tool_name.unwrap_or_default(),
                ));
                invocations.len() - 1
            }
        };
        &mut invocations[index]
    }
}
