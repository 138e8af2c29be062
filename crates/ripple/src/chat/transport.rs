use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;

use super::options::ChatOptions;
use crate::errors::{ChatError, ChatResult};
use crate::models::request::ChatRequest;

/// Raw response body, chunked however the transport delivers it
pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// Carries a chat request to the server and hands back the streamed response body
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> ChatResult<ByteStream>;
}

/// Posts requests as JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl HttpTransport {
    pub fn new<S: Into<String>>(url: S) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            headers: Vec::new(),
        })
    }

    /// Target the endpoint configured in `options` on the given host
    pub fn for_options(host: &str, options: &ChatOptions) -> ChatResult<Self> {
        Self::new(format!("{}{}", host.trim_end_matches('/'), options.api))
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> ChatResult<ByteStream> {
        let mut builder = self.client.post(&self.url).json(request);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), url = %self.url, "chat request rejected");
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ChatError::from))
            .boxed())
    }
}
