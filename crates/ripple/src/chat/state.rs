use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::models::message::Message;

/// Where a session is in its request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Streaming,
    Finalizing,
}

/// Everything a chat client renders: the conversation and the side-channel data of the
/// current request cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    pub messages: Vec<Message>,
    /// Data items received during the latest request, reset when the next one starts
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl ChatState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
