use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::callbacks::{ChatCallbacks, NoCallbacks};
use super::options::{ChatOptions, RequestOptions};
use super::reconcile::{Flow, Reconciler};
use super::roundtrip::RoundtripController;
use super::state::{ChatState, Phase};
use super::transport::ChatTransport;
use crate::errors::ChatResult;
use crate::models::message::Message;
use crate::models::request::ChatRequest;
use crate::models::role::Role;
use crate::protocol::decoder::decode_stream;

/// How a request that did not fail ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The response streamed to the end; `message` is the assistant message it produced
    Finished { message: Option<Message> },
    /// The caller stopped the request, partial content stays in the conversation
    Cancelled,
}

/// Cancels the request a session currently has in flight.
///
/// Cloneable and usable from any task; each request gets a fresh token, so stopping only
/// ever affects the request running at that moment.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.current().cancel();
    }

    fn current(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_stopped(&self) -> bool {
        self.current().is_cancelled()
    }

    fn renew(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }
}

/// Client side of a streamed chat.
///
/// Owns the conversation, sends it through a [`ChatTransport`] and folds the streamed
/// response back into it. Only one request runs at a time; every request method takes
/// `&mut self` and resolves once the request, and any automatic roundtrips after it, end.
/// The conversation as it streams in is published to [`ChatSession::subscribe`] receivers
/// and to [`ChatCallbacks::on_update`].
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    callbacks: Arc<dyn ChatCallbacks>,
    options: ChatOptions,
    controller: RoundtripController,
    state: ChatState,
    phase: Phase,
    stop: StopHandle,
    updates: watch::Sender<ChatState>,
}

impl ChatSession {
    pub fn new<T: ChatTransport + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            callbacks: Arc::new(NoCallbacks),
            options: ChatOptions::default(),
            controller: RoundtripController::default(),
            state: ChatState::default(),
            phase: Phase::Idle,
            stop: StopHandle::default(),
            updates: watch::channel(ChatState::default()).0,
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.controller = RoundtripController::new(options.max_roundtrips);
        self.options = options;
        self
    }

    pub fn with_callbacks<C: ChatCallbacks + 'static>(mut self, callbacks: C) -> Self {
        self.callbacks = Arc::new(callbacks);
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.state.messages = messages;
        self.updates.send_replace(self.state.clone());
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn data(&self) -> &[Value] {
        &self.state.data
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.state.thread_id.as_deref()
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Handle for stopping in-flight requests from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Receiver of the conversation as it changes, usable from another task while a
    /// request is in flight
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.updates.subscribe()
    }

    /// Stop the request in flight, if any
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.recover_abandoned();
        self.state.messages = messages;
        self.updates.send_replace(self.state.clone());
    }

    /// Send a user message with the given text
    pub async fn submit<S: AsRef<str>>(&mut self, text: S) -> ChatResult<Outcome> {
        self.append(Message::user().with_text(text)).await
    }

    /// Append a message to the conversation and request a response
    pub async fn append(&mut self, message: Message) -> ChatResult<Outcome> {
        self.append_with(message, RequestOptions::default()).await
    }

    pub async fn append_with(
        &mut self,
        message: Message,
        options: RequestOptions,
    ) -> ChatResult<Outcome> {
        self.recover_abandoned();
        let snapshot = self.state.clone();
        self.state.messages.push(message);
        self.run(snapshot, options).await
    }

    /// Request a new response to the latest user message, replacing the assistant's last
    /// answer. Returns `None` when there is nothing to reload.
    pub async fn reload(&mut self) -> ChatResult<Option<Outcome>> {
        self.recover_abandoned();
        if self.state.messages.is_empty() {
            return Ok(None);
        }
        let snapshot = self.state.clone();
        if self.state.last_message().map(|message| message.role) == Some(Role::Assistant) {
            self.state.messages.pop();
        }
        self.run(snapshot, RequestOptions::default()).await.map(Some)
    }

    /// Attach the result of a client-side tool call.
    ///
    /// When this answers the last open call of the newest message and the roundtrip bound
    /// allows it, the conversation is sent back right away and the outcome of that request
    /// is returned.
    pub async fn add_tool_result(
        &mut self,
        tool_call_id: &str,
        result: Value,
    ) -> ChatResult<Option<Outcome>> {
        self.recover_abandoned();
        let invocation = self
            .state
            .messages
            .iter_mut()
            .rev()
            .find_map(|message| message.tool_invocation_mut(tool_call_id));
        match invocation {
            Some(invocation) => invocation.attach_result(result),
            None => {
                tracing::warn!(tool_call_id, "no tool invocation with this id");
                return Ok(None);
            }
        }
        publish(&self.updates, self.callbacks.as_ref(), &self.state).await;

        if !self.controller.should_resubmit(&self.state.messages) {
            return Ok(None);
        }
        let snapshot = self.state.clone();
        self.run(snapshot, RequestOptions::default()).await.map(Some)
    }

    /// A request whose future was dropped mid-stream never reached finalization; treat it
    /// as cancelled and keep whatever it had streamed
    fn recover_abandoned(&mut self) {
        if self.phase != Phase::Idle {
            tracing::debug!(phase = %self.phase, "previous request was abandoned, treating it as cancelled");
            self.phase = Phase::Idle;
        }
    }

    fn request(&self, options: &RequestOptions) -> ChatRequest {
        let mut body = self.options.body.clone();
        body.extend(options.body.clone());
        let mut request = ChatRequest::new(self.state.messages.clone()).with_body(body);
        request.data = options.data.clone();
        request
    }

    /// Run one request and the automatic roundtrips that follow it
    async fn run(
        &mut self,
        mut snapshot: ChatState,
        mut options: RequestOptions,
    ) -> ChatResult<Outcome> {
        loop {
            let start_len = self.state.messages.len();
            let outcome = self.cycle(snapshot, &options).await?;

            if outcome == Outcome::Cancelled {
                return Ok(outcome);
            }
            // A stop that landed while the finish hook ran still prevents the next roundtrip
            if self.stop.is_stopped() {
                tracing::debug!("stopped after the request finished, skipping the roundtrip");
                return Ok(outcome);
            }
            let added = self.state.messages.len() > start_len;
            if !(added && self.controller.should_resubmit(&self.state.messages)) {
                return Ok(outcome);
            }

            tracing::debug!(
                max_roundtrips = self.controller.max_roundtrips(),
                "tool results complete, sending the conversation back"
            );
            snapshot = self.state.clone();
            options = RequestOptions {
                data: None,
                body: options.body,
            };
        }
    }

    async fn cycle(&mut self, snapshot: ChatState, options: &RequestOptions) -> ChatResult<Outcome> {
        let token = self.stop.renew();
        let request = self.request(options);
        self.state.data.clear();
        self.phase = Phase::Streaming;
        publish(&self.updates, self.callbacks.as_ref(), &self.state).await;

        let mut reconciler = Reconciler::new();
        let transport = Arc::clone(&self.transport);
        let callbacks = Arc::clone(&self.callbacks);
        let consumed = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = consume(
                transport.as_ref(),
                callbacks.as_ref(),
                &self.updates,
                &request,
                &mut self.state,
                &mut reconciler,
            ) => Some(result),
        };

        self.phase = Phase::Finalizing;
        reconciler.stop();
        let outcome = match consumed {
            None => {
                tracing::debug!("request stopped by the caller");
                Ok(Outcome::Cancelled)
            }
            Some(Err(error)) => {
                tracing::error!(%error, "chat request failed, rolling back");
                self.state = snapshot;
                publish(&self.updates, self.callbacks.as_ref(), &self.state).await;
                self.callbacks.on_error(&error).await;
                Err(error)
            }
            Some(Ok(())) => {
                let message = reconciler.target(&self.state).cloned();
                self.callbacks.on_finish(message.as_ref()).await;
                Ok(Outcome::Finished { message })
            }
        };
        self.phase = Phase::Idle;
        outcome
    }
}

async fn publish(
    updates: &watch::Sender<ChatState>,
    callbacks: &dyn ChatCallbacks,
    state: &ChatState,
) {
    updates.send_replace(state.clone());
    callbacks.on_update(state).await;
}

async fn consume(
    transport: &dyn ChatTransport,
    callbacks: &dyn ChatCallbacks,
    updates: &watch::Sender<ChatState>,
    request: &ChatRequest,
    state: &mut ChatState,
    reconciler: &mut Reconciler,
) -> ChatResult<()> {
    let body = transport.send(request).await?;
    let parts = decode_stream(body);
    futures::pin_mut!(parts);

    while let Some(part) = parts.next().await {
        let flow = reconciler.apply(state, part?);
        publish(updates, callbacks, state).await;
        match flow {
            Flow::Continue => {}
            Flow::ToolCall(call) => {
                tracing::debug!(tool_call_id = %call.tool_call_id, tool_name = %call.tool_name, "tool call ready");
                if let Some(result) = callbacks.on_tool_call(&call).await {
                    if let Some(invocation) = reconciler
                        .target_mut(state)
                        .and_then(|message| message.tool_invocation_mut(&call.tool_call_id))
                    {
                        invocation.attach_result(result);
                        publish(updates, callbacks, state).await;
                    }
                }
            }
            Flow::Failed(error) => return Err(error),
        }
    }
    Ok(())
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
