use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings for a [`ChatSession`](super::ChatSession)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatOptions {
    /// Endpoint that answers chat requests with a data stream
    pub api: String,
    /// How many automatic roundtrips may follow a response whose tool calls all have results.
    /// Zero disables them.
    pub max_roundtrips: usize,
    /// Extra fields merged into every request body
    pub body: Map<String, Value>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            api: "/api/chat".to_string(),
            max_roundtrips: 0,
            body: Map::new(),
        }
    }
}

impl ChatOptions {
    pub fn with_max_roundtrips(mut self, max_roundtrips: usize) -> Self {
        self.max_roundtrips = max_roundtrips;
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }
}

/// Per-request additions, on top of the session-wide [`ChatOptions`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub data: Option<Value>,
    pub body: Map<String, Value>,
}

impl RequestOptions {
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
