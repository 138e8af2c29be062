use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ripple::errors::{ProviderError, ProviderResult};
use ripple::models::message::Message;
use ripple::models::request::ChatRequest;
use ripple::models::role::Role;
use ripple::protocol::StreamPart;
use ripple::providers::{Generation, PartStream, Provider, Usage};

/// Provider that answers with the conversation's last turn, for running the server without
/// a model behind it.
///
/// A user turn is echoed back verbatim. An assistant turn whose tool calls all carry results
/// is answered with a summary of those results, which lets clients exercise roundtrips.
#[derive(Debug, Clone, Default)]
pub struct EchoProvider {
    prefix: String,
    word_delay: Duration,
}

impl EchoProvider {
    pub fn new<S: Into<String>>(prefix: S, word_delay: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            word_delay,
        }
    }

    fn reply(&self, request: &ChatRequest) -> ProviderResult<String> {
        let last = request
            .messages
            .last()
            .ok_or_else(|| ProviderError::InvalidPrompt("no messages to echo".to_string()))?;

        match last.role {
            Role::User => Ok(format!("{}{}", self.prefix, last.content)),
            Role::Assistant if last.has_completed_tool_calls() => {
                let results: Vec<String> = last
                    .tool_invocations
                    .iter()
                    .flatten()
                    .filter_map(|invocation| {
                        let result = invocation.result.as_ref()?;
                        Some(format!("{} returned {}", invocation.tool_name, result))
                    })
                    .collect();
                Ok(format!("{}{}", self.prefix, results.join("; ")))
            }
            role => Err(ProviderError::InvalidPrompt(format!(
                "cannot echo a {role} message"
            ))),
        }
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: &ChatRequest) -> ProviderResult<Generation> {
        let text = self.reply(request)?;
        let words = text.split_whitespace().count() as i32;
        Ok(Generation {
            message: Message::assistant().with_text(text),
            usage: Usage::new(None, Some(words), Some(words)),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> ProviderResult<PartStream> {
        let text = self.reply(request)?;
        let delay = self.word_delay;
        let words: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();

        let stream = async_stream::stream! {
            for word in words {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(StreamPart::text(word));
            }
        };
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use ripple::models::tool::ToolInvocation;
    use serde_json::json;

    #[tokio::test]
    async fn test_echo_streams_words() -> Result<()> {
        let provider = EchoProvider::new("you said: ", Duration::ZERO);
        let request = ChatRequest::new(vec![Message::user().with_text("hello there")]);

        let parts: Vec<StreamPart> = provider
            .stream(&request)
            .await?
            .map(|part| part.unwrap())
            .collect()
            .await;

        assert_eq!(
            parts,
            vec![
                StreamPart::text("you "),
                StreamPart::text("said: "),
                StreamPart::text("hello "),
                StreamPart::text("there"),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_echo_summarizes_tool_results() -> Result<()> {
        let provider = EchoProvider::default();
        let answered = Message::assistant().with_tool_invocation(
            ToolInvocation::call("t1", "weather", json!({"city": "Paris"}))
                .with_result(json!("sunny")),
        );
        let request = ChatRequest::new(vec![Message::user().with_text("Weather?"), answered]);

        let generation = provider.generate(&request).await?;

        assert_eq!(generation.message.content, "weather returned \"sunny\"");
        assert_eq!(generation.message.role, Role::Assistant);
        Ok(())
    }

    #[tokio::test]
    async fn test_echo_rejects_empty_conversation() {
        let provider = EchoProvider::default();

        let result = provider.generate(&ChatRequest::default()).await;

        assert!(matches!(result, Err(ProviderError::InvalidPrompt(_))));
    }
}
