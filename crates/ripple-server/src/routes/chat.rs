use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use ripple::models::message::Message;
use ripple::models::request::ChatRequest;
use ripple::protocol::{encode, merge_data, StreamData, StreamPart, StreamStatus};
use ripple::providers::Usage;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

/// Response body carrying encoded data stream lines
pub struct DataStreamResponse {
    rx: ReceiverStream<String>,
}

impl DataStreamResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for DataStreamResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for DataStreamResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::HeaderName::from_static("x-vercel-ai-data-stream"), "v1"),
            ],
            body,
        )
            .into_response()
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<DataStreamResponse, StatusCode> {
    if let Err(error) = request.validate() {
        tracing::warn!(%error, "rejecting chat request");
        return Err(StatusCode::BAD_REQUEST);
    }

    let parts = state.provider.stream(&request).await.map_err(|error| {
        tracing::error!(%error, provider = state.provider.name(), "failed to start reply stream");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let (data, data_stream) = StreamData::new();
    data.append_message_annotation(json!({"provider": state.provider.name()}));
    data.close();

    let parts = parts.map(|part| part.unwrap_or_else(|error| StreamPart::error(error.to_string())));
    let mut stream = Box::pin(merge_data(parts, data_stream));

    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(async move {
        loop {
            match timeout(Duration::from_millis(500), stream.next()).await {
                Ok(Some(part)) => {
                    let failed = matches!(part, StreamPart::Error(_));
                    if let Err(e) = tx.send(encode(&part)).await {
                        tracing::error!("Error sending part through channel: {}", e);
                        return;
                    }
                    if failed {
                        return;
                    }
                }
                Ok(None) => break,
                // Heartbeat, used to detect disconnected clients and stop generating
                Err(_) => {
                    if tx.is_closed() {
                        tracing::debug!("client disconnected, dropping reply stream");
                        return;
                    }
                }
            }
        }

        let _ = tx
            .send(encode(&StreamPart::status(StreamStatus::Complete)))
            .await;
    });

    Ok(DataStreamResponse::new(ReceiverStream::new(rx)))
}

#[derive(Debug, Deserialize)]
struct CompletionRequest {
    prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompletionResponse {
    completion: String,
    usage: Usage,
}

// single-shot completion, non streaming
async fn completion_handler(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>, StatusCode> {
    let request = ChatRequest::new(vec![Message::user().with_text(request.prompt)]);

    let generation = state.provider.generate(&request).await.map_err(|error| {
        tracing::error!(%error, "completion failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(CompletionResponse {
        completion: generation.message.content,
        usage: generation.usage,
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .route("/api/completion", post(completion_handler))
        .with_state(state)
}
