#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use ripple::chat::{ByteStream, ChatCallbacks, ChatState, ChatTransport, StopHandle};
use ripple::errors::{ChatError, ChatResult};
use ripple::models::message::Message;
use ripple::models::request::ChatRequest;
use ripple::models::tool::ToolCall;
use ripple::protocol::{encode, StreamPart};
use serde_json::Value;

/// One step of a scripted response body
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(Vec<u8>),
    /// The connection breaks
    Fault(ChatError),
    /// Stop the session through its handle, then never produce anything else
    Hang,
    /// Never produce anything else
    Stall,
}

#[derive(Debug, Clone)]
pub enum Response {
    Body(Vec<Step>),
    Reject(ChatError),
}

/// Encode parts into a body with one chunk per line
pub fn body(parts: &[StreamPart]) -> Vec<Step> {
    parts
        .iter()
        .map(|part| Step::Chunk(encode(part).into_bytes()))
        .collect()
}

/// Transport that plays back scripted responses and records every request
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Response>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    stop: Arc<Mutex<Option<StopHandle>>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            ..Default::default()
        }
    }

    pub fn with_bodies(bodies: Vec<Vec<Step>>) -> Self {
        Self::new(bodies.into_iter().map(Response::Body).collect())
    }

    pub fn bind_stop(&self, stop: StopHandle) {
        *self.stop.lock().unwrap() = Some(stop);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, request: &ChatRequest) -> ChatResult<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Response::Body(Vec::new()));
        let steps = match response {
            Response::Reject(error) => return Err(error),
            Response::Body(steps) => steps,
        };

        let stop = self.stop.lock().unwrap().clone();
        let stream = async_stream::stream! {
            for step in steps {
                match step {
                    Step::Chunk(bytes) => yield Ok(Bytes::from(bytes)),
                    Step::Fault(error) => yield Err(error),
                    Step::Hang => {
                        if let Some(stop) = &stop {
                            stop.stop();
                        }
                        futures::future::pending::<()>().await;
                    }
                    Step::Stall => futures::future::pending::<()>().await,
                }
            }
        };
        Ok(stream.boxed())
    }
}

/// Callbacks that record what they see and answer tool calls from a fixed table
#[derive(Clone, Default)]
pub struct Recorder {
    pub answers: Vec<(String, Value)>,
    pub tool_calls: Arc<Mutex<Vec<ToolCall>>>,
    pub finished: Arc<Mutex<Vec<Option<Message>>>>,
    pub errors: Arc<Mutex<Vec<ChatError>>>,
    pub updates: Arc<Mutex<Vec<ChatState>>>,
    /// Stops the session from inside `on_finish`
    pub stop_on_finish: Arc<Mutex<Option<StopHandle>>>,
}

impl Recorder {
    pub fn answering(tool_name: &str, result: Value) -> Self {
        Self {
            answers: vec![(tool_name.to_string(), result)],
            ..Default::default()
        }
    }

    pub fn stop_on_finish(&self, stop: StopHandle) {
        *self.stop_on_finish.lock().unwrap() = Some(stop);
    }

    /// Content of the newest message after each update
    pub fn last_contents(&self) -> Vec<String> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter_map(|state| state.last_message().map(|message| message.content.clone()))
            .collect()
    }
}

#[async_trait]
impl ChatCallbacks for Recorder {
    async fn on_tool_call(&self, call: &ToolCall) -> Option<Value> {
        self.tool_calls.lock().unwrap().push(call.clone());
        self.answers
            .iter()
            .find(|(name, _)| *name == call.tool_name)
            .map(|(_, result)| result.clone())
    }

    async fn on_update(&self, state: &ChatState) {
        self.updates.lock().unwrap().push(state.clone());
    }

    async fn on_finish(&self, message: Option<&Message>) {
        self.finished.lock().unwrap().push(message.cloned());
        let stop = self.stop_on_finish.lock().unwrap().clone();
        if let Some(stop) = stop {
            stop.stop();
        }
    }

    async fn on_error(&self, error: &ChatError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}
