use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::message::Message;
use super::tool::Tool;
use crate::errors::ProviderError;

/// Body of a chat request posted to a data stream endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Legacy function declarations; mutually exclusive with `tools`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<Tool>>,
    /// Extra fields merged into the top level of the body
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Declare tools for the model.
    ///
    /// # Panics
    ///
    /// Panics if legacy `functions` were already declared on this request.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        assert!(
            self.functions.is_none(),
            "a chat request cannot declare both `tools` and `functions`"
        );
        self.tools = Some(tools);
        self
    }

    /// Declare legacy functions for the model.
    ///
    /// # Panics
    ///
    /// Panics if `tools` were already declared on this request.
    pub fn with_functions(mut self, functions: Vec<Tool>) -> Self {
        assert!(
            self.tools.is_none(),
            "a chat request cannot declare both `tools` and `functions`"
        );
        self.functions = Some(functions);
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body.extend(body);
        self
    }

    /// Check a request received over the wire, where both declaration styles may show up
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.tools.is_some() && self.functions.is_some() {
            return Err(ProviderError::UnsupportedSetting {
                setting: "tools and functions together".to_string(),
            });
        }
        Ok(())
    }
}
