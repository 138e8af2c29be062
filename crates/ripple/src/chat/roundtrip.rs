use crate::models::message::Message;
use crate::models::role::Role;

/// Decides whether a finished response should be sent back to the server automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundtripController {
    max_roundtrips: usize,
}

impl RoundtripController {
    pub fn new(max_roundtrips: usize) -> Self {
        Self { max_roundtrips }
    }

    pub fn max_roundtrips(&self) -> usize {
        self.max_roundtrips
    }

    /// True when the newest message is an assistant message whose tool calls all carry
    /// results, and the run of trailing assistant messages is still within the bound.
    pub fn should_resubmit(&self, messages: &[Message]) -> bool {
        if self.max_roundtrips == 0 {
            return false;
        }
        match messages.last() {
            Some(last) if last.has_completed_tool_calls() => {
                trailing_assistant_count(messages) <= self.max_roundtrips
            }
            _ => false,
        }
    }
}

/// Number of consecutive assistant messages at the end of the conversation
pub fn trailing_assistant_count(messages: &[Message]) -> usize {
    messages
        .iter()
        .rev()
        .take_while(|message| message.role == Role::Assistant)
        .count()
}
