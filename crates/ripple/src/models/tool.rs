use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool that the model may call, declared on the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments the tool accepts
    pub parameters: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A complete tool call, as handed to client-side tool handlers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new<I: Into<String>, N: Into<String>>(tool_call_id: I, tool_name: N, args: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// Legacy single function call attached to an assistant message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    /// Arguments are still streaming in; `args` holds a best-effort parse
    PartialCall,
    /// Arguments are complete and the call awaits its result
    Call,
    /// A result has been attached
    Result,
}

/// A tool call tracked on an assistant message, from the first streamed fragment of its
/// arguments until a result is attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub state: ToolInvocationState,
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolInvocation {
    pub fn partial<I: Into<String>, N: Into<String>>(tool_call_id: I, tool_name: N) -> Self {
        Self {
            state: ToolInvocationState::PartialCall,
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args: Value::Null,
            result: None,
        }
    }

    pub fn call<I: Into<String>, N: Into<String>>(tool_call_id: I, tool_name: N, args: Value) -> Self {
        Self {
            state: ToolInvocationState::Call,
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
            result: None,
        }
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.attach_result(result);
        self
    }

    pub fn attach_result(&mut self, result: Value) {
        self.state = ToolInvocationState::Result;
        self.result = Some(result);
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(&self.tool_call_id, &self.tool_name, self.args.clone())
    }
}
