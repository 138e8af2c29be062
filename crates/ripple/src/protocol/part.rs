use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamStatus {
    InProgress,
    Complete,
    Failed,
}

/// One typed event of the data stream protocol
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    TextDelta(String),
    DataItems(Vec<Value>),
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallArgsDelta {
        tool_call_id: String,
        tool_name: Option<String>,
        args_text_delta: String,
    },
    ToolCallComplete {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    MessageAnnotation(Value),
    Status {
        status: StreamStatus,
        information: Option<String>,
    },
    ThreadId(String),
    FunctionCallComplete {
        name: String,
        arguments: Value,
    },
    Error(String),
}

impl StreamPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        StreamPart::TextDelta(text.into())
    }

    pub fn status(status: StreamStatus) -> Self {
        StreamPart::Status {
            status,
            information: None,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        StreamPart::Error(message.into())
    }

    pub fn kind(&self) -> PartKind {
        match self {
            StreamPart::TextDelta(_) => PartKind::Text,
            StreamPart::FunctionCallComplete { .. } => PartKind::FunctionCall,
            StreamPart::DataItems(_) => PartKind::Data,
            StreamPart::Status { .. } | StreamPart::Error(_) => PartKind::Status,
            StreamPart::ThreadId(_) => PartKind::ThreadId,
            StreamPart::ToolCallComplete { .. } => PartKind::ToolCalls,
            StreamPart::MessageAnnotation(_) => PartKind::MessageAnnotations,
            StreamPart::ToolCallStart { .. } | StreamPart::ToolCallArgsDelta { .. } => {
                PartKind::ToolCallDelta
            }
        }
    }
}

/// Line kinds of the wire format, keyed by their prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(strum_macros::EnumIter))]
pub enum PartKind {
    Text,
    FunctionCall,
    Data,
    Status,
    ThreadId,
    ToolCalls,
    MessageAnnotations,
    ToolCallDelta,
}

impl PartKind {
    pub const fn prefix(self) -> &'static str {
        match self {
            PartKind::Text => "0",
            PartKind::FunctionCall => "1",
            PartKind::Data => "2",
            PartKind::Status => "3",
            PartKind::ThreadId => "4",
            PartKind::ToolCalls => "5",
            PartKind::MessageAnnotations => "6",
            PartKind::ToolCallDelta => "7",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "0" => Some(PartKind::Text),
            "1" => Some(PartKind::FunctionCall),
            "2" => Some(PartKind::Data),
            "3" => Some(PartKind::Status),
            "4" => Some(PartKind::ThreadId),
            "5" => Some(PartKind::ToolCalls),
            "6" => Some(PartKind::MessageAnnotations),
            "7" => Some(PartKind::ToolCallDelta),
            _ => None,
        }
    }
}

// Payload shapes for the object-valued lines

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StatusPayload {
    pub status: StreamStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub information: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolCallPayload {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolCallDeltaPayload {
    pub tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_text_delta: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FunctionCallPayload {
    pub function_call: FunctionCallBody,
}

/// `arguments` travels as a JSON-encoded string, as legacy function calling does
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FunctionCallBody {
    pub name: String,
    pub arguments: Value,
}
