use super::role::Role;
use super::tool::{FunctionCall, ToolInvocation};
use chrono::Utc;
use serde_json::Value;

/// Generate a short opaque message id
pub fn generate_id() -> String {
    nanoid::nanoid!(12)
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// A message in a conversation
pub struct Message {
    #[serde(default = "generate_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_invocations: Option<Vec<ToolInvocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Value>>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            id: generate_id(),
            role,
            content: String::new(),
            created: Utc::now().timestamp(),
            tool_invocations: None,
            function_call: None,
            annotations: None,
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a new system message with the current timestamp
    pub fn system() -> Self {
        Self::new(Role::System)
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Append text to the message content
    pub fn with_text<S: AsRef<str>>(mut self, text: S) -> Self {
        self.content.push_str(text.as_ref());
        self
    }

    pub fn with_tool_invocation(mut self, invocation: ToolInvocation) -> Self {
        self.tool_invocations
            .get_or_insert_with(Vec::new)
            .push(invocation);
        self
    }

    pub fn with_function_call(mut self, function_call: FunctionCall) -> Self {
        self.function_call = Some(function_call);
        self
    }

    pub fn with_annotation(mut self, annotation: Value) -> Self {
        self.annotations.get_or_insert_with(Vec::new).push(annotation);
        self
    }

    pub fn tool_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.tool_invocations
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|invocation| invocation.tool_call_id == tool_call_id)
    }

    pub fn tool_invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.tool_invocations
            .as_mut()?
            .iter_mut()
            .find(|invocation| invocation.tool_call_id == tool_call_id)
    }

    /// True for an assistant message whose tool calls have all been answered
    pub fn has_completed_tool_calls(&self) -> bool {
        if self.role != Role::Assistant {
            return false;
        }
        match self.tool_invocations.as_deref() {
            Some(invocations) if !invocations.is_empty() => {
                invocations.iter().all(ToolInvocation::has_result)
            }
            _ => false,
        }
    }
}
