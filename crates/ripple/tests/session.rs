mod common;

use std::time::Duration;

use anyhow::Result;
use common::{body, Recorder, Response, ScriptedTransport, Step};
use ripple::chat::{ChatOptions, ChatSession, Outcome, Phase, RequestOptions};
use ripple::errors::ChatError;
use ripple::models::message::Message;
use ripple::models::role::Role;
use ripple::models::tool::{ToolCall, ToolInvocationState};
use ripple::protocol::{StreamPart, StreamStatus};
use serde_json::json;

fn tool_call(id: &str, name: &str) -> StreamPart {
    StreamPart::ToolCallComplete {
        tool_call_id: id.to_string(),
        tool_name: name.to_string(),
        args: json!({"city": "Paris"}),
    }
}

fn complete() -> StreamPart {
    StreamPart::status(StreamStatus::Complete)
}

#[tokio::test]
async fn test_streams_hello() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![body(&[
        StreamPart::text("Hel"),
        StreamPart::text("lo"),
        complete(),
    ])]);
    let recorder = Recorder::default();
    let mut session = ChatSession::new(transport.clone()).with_callbacks(recorder.clone());

    let outcome = session.submit("Hi").await?;

    let reply = match outcome {
        Outcome::Finished { message: Some(reply) } => reply,
        other => panic!("expected a finished reply, got {other:?}"),
    };
    assert_eq!(reply.content, "Hello");
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[1], reply);
    assert_eq!(session.phase(), Phase::Idle);
    assert!(!session.is_loading());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].content, "Hi");
    assert_eq!(recorder.finished.lock().unwrap().clone(), vec![Some(reply)]);
    Ok(())
}

#[tokio::test]
async fn test_chunks_split_inside_characters() -> Result<()> {
    let wire = "0:\"Grüße 🌊\"\n3:{\"status\":\"complete\"}\n".as_bytes();
    let steps = wire
        .chunks(3)
        .map(|chunk| Step::Chunk(chunk.to_vec()))
        .collect();
    let mut session = ChatSession::new(ScriptedTransport::with_bodies(vec![steps]));

    session.submit("Hi").await?;
    assert_eq!(session.messages()[1].content, "Grüße 🌊");
    Ok(())
}

#[tokio::test]
async fn test_transport_fault_rolls_back() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        body(&[StreamPart::text("First answer"), complete()]),
        vec![
            Step::Chunk(b"0:\"Half an \"\n".to_vec()),
            Step::Chunk(b"0:\"answer\"\n2:[1]\n".to_vec()),
            Step::Fault(ChatError::Transport("connection reset".to_string())),
        ],
    ]);
    let recorder = Recorder::default();
    let mut session = ChatSession::new(transport).with_callbacks(recorder.clone());
    session.submit("One").await?;
    let before = session.state().clone();

    let result = session.submit("Two").await;

    assert_eq!(
        result,
        Err(ChatError::Transport("connection reset".to_string()))
    );
    assert_eq!(session.state(), &before);
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    // The partial answer was visible before the rollback
    let contents = recorder.last_contents();
    assert!(contents.contains(&"Half an answer".to_string()));
    assert_eq!(contents.last().map(String::as_str), Some("First answer"));
    Ok(())
}

#[tokio::test]
async fn test_failed_status_rolls_back() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![body(&[
        StreamPart::text("Working on it"),
        StreamPart::Status {
            status: StreamStatus::Failed,
            information: Some("quota exceeded".to_string()),
        },
    ])]);
    let mut session = ChatSession::new(transport)
        .with_messages(vec![Message::system().with_text("Be brief")]);
    let before = session.state().clone();

    let result = session.submit("Hi").await;

    assert_eq!(
        result,
        Err(ChatError::Provider("quota exceeded".to_string()))
    );
    assert_eq!(session.state(), &before);
    Ok(())
}

#[tokio::test]
async fn test_rejected_request_rolls_back() {
    let transport = ScriptedTransport::new(vec![Response::Reject(ChatError::Status {
        status: 500,
        body: "overloaded".to_string(),
    })]);
    let mut session = ChatSession::new(transport);

    let result = session.submit("Hi").await;

    assert!(matches!(result, Err(ChatError::Status { status: 500, .. })));
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_stop_keeps_partial_content() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        vec![
            Step::Chunk(b"0:\"Once upon\"\n".to_vec()),
            Step::Chunk(b"5:[{\"toolCallId\":\"t1\",\"toolName\":\"weather\",\"args\":{}}]\n".to_vec()),
            Step::Hang,
        ],
        body(&[StreamPart::text("never requested")]),
    ]);
    let recorder = Recorder::answering("weather", json!("sunny"));
    let mut session = ChatSession::new(transport.clone())
        .with_options(ChatOptions::default().with_max_roundtrips(5))
        .with_callbacks(recorder.clone());
    transport.bind_stop(session.stop_handle());

    let outcome = session.submit("Tell me a story").await?;

    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[1].content, "Once upon");
    assert!(session.messages()[1].has_completed_tool_calls());
    assert_eq!(session.phase(), Phase::Idle);
    // Cancellation skips the roundtrip check and the finish hook
    assert_eq!(transport.requests().len(), 1);
    assert!(recorder.finished.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stop_only_affects_running_request() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![body(&[StreamPart::text("fine"), complete()])]);
    let mut session = ChatSession::new(transport);
    session.stop();

    let outcome = session.submit("Hi").await?;
    assert!(matches!(outcome, Outcome::Finished { .. }));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropped_request_is_treated_as_cancelled() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        vec![Step::Chunk(b"0:\"partial\"\n".to_vec()), Step::Stall],
        body(&[StreamPart::text("next"), complete()]),
    ]);
    let mut session = ChatSession::new(transport);

    let abandoned = tokio::time::timeout(Duration::from_secs(1), session.submit("First")).await;
    assert!(abandoned.is_err());
    assert_eq!(session.phase(), Phase::Streaming);
    assert_eq!(session.messages()[1].content, "partial");

    session.submit("Second").await?;
    assert_eq!(session.phase(), Phase::Idle);
    let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["First", "partial", "Second", "next"]);
    Ok(())
}

#[tokio::test]
async fn test_add_tool_result_resubmits_once() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        body(&[tool_call("t1", "weather"), complete()]),
        body(&[StreamPart::text("It is sunny in Paris"), complete()]),
    ]);
    let mut session = ChatSession::new(transport.clone())
        .with_options(ChatOptions::default().with_max_roundtrips(1));

    session.submit("Weather in Paris?").await?;
    assert_eq!(transport.requests().len(), 1);
    let invocation = session.messages()[1].tool_invocation("t1").unwrap();
    assert_eq!(invocation.state, ToolInvocationState::Call);

    let outcome = session.add_tool_result("t1", json!("sunny")).await?;

    let reply = match outcome {
        Some(Outcome::Finished { message: Some(reply) }) => reply,
        other => panic!("expected a resubmitted reply, got {other:?}"),
    };
    assert_eq!(reply.content, "It is sunny in Paris");
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    let sent = requests[1].messages[1].tool_invocation("t1").unwrap();
    assert_eq!(sent.result, Some(json!("sunny")));
    assert_eq!(session.messages().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_add_tool_result_for_unknown_id() -> Result<()> {
    let transport = ScriptedTransport::default();
    let mut session = ChatSession::new(transport.clone())
        .with_options(ChatOptions::default().with_max_roundtrips(3));
    assert_eq!(session.add_tool_result("missing", json!(1)).await?, None);
    assert!(transport.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_client_tool_calls_roundtrip_within_bound() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        body(&[tool_call("t1", "weather"), complete()]),
        body(&[tool_call("t2", "weather"), complete()]),
        body(&[StreamPart::text("never requested"), complete()]),
    ]);
    let recorder = Recorder::answering("weather", json!("sunny"));
    let mut session = ChatSession::new(transport.clone())
        .with_options(ChatOptions::default().with_max_roundtrips(1))
        .with_callbacks(recorder.clone());

    session.submit("Weather?").await?;

    assert_eq!(transport.requests().len(), 2);
    assert_eq!(
        recorder.tool_calls.lock().unwrap().clone(),
        vec![
            ToolCall::new("t1", "weather", json!({"city": "Paris"})),
            ToolCall::new("t2", "weather", json!({"city": "Paris"})),
        ]
    );
    assert_eq!(session.messages().len(), 3);
    assert!(session.messages()[2].has_completed_tool_calls());
    Ok(())
}

#[tokio::test]
async fn test_zero_bound_never_resubmits() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![body(&[tool_call("t1", "weather"), complete()])]);
    let recorder = Recorder::answering("weather", json!("sunny"));
    let mut session = ChatSession::new(transport.clone()).with_callbacks(recorder);

    session.submit("Weather?").await?;
    assert_eq!(session.add_tool_result("t1", json!("rainy")).await?, None);

    assert_eq!(transport.requests().len(), 1);
    let invocation = session.messages()[1].tool_invocation("t1").unwrap();
    assert_eq!(invocation.result, Some(json!("rainy")));
    Ok(())
}

#[tokio::test]
async fn test_reload_replaces_last_answer() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        body(&[StreamPart::text("Meh"), complete()]),
        body(&[StreamPart::text("Better"), complete()]),
    ]);
    let mut session = ChatSession::new(transport.clone());
    session.submit("Write a haiku").await?;

    let outcome = session.reload().await?;

    assert!(matches!(outcome, Some(Outcome::Finished { .. })));
    let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Write a haiku", "Better"]);
    assert_eq!(transport.requests()[1].messages.len(), 1);

    let mut empty = ChatSession::new(ScriptedTransport::default());
    assert_eq!(empty.reload().await?, None);
    Ok(())
}

#[tokio::test]
async fn test_data_resets_per_request() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        body(&[
            StreamPart::DataItems(vec![json!({"step": 1})]),
            StreamPart::ThreadId("thread_9".to_string()),
            StreamPart::text("a"),
            complete(),
        ]),
        body(&[StreamPart::DataItems(vec![json!({"step": 2})]), StreamPart::text("b")]),
    ]);
    let mut session = ChatSession::new(transport.clone());

    session
        .append_with(
            Message::user().with_text("first"),
            RequestOptions::default().with_data(json!({"source": "test"})),
        )
        .await?;
    assert_eq!(session.data(), &[json!({"step": 1})]);
    assert_eq!(session.thread_id(), Some("thread_9"));
    assert_eq!(transport.requests()[0].data, Some(json!({"source": "test"})));

    session.submit("second").await?;
    assert_eq!(session.data(), &[json!({"step": 2})]);
    assert_eq!(transport.requests()[1].data, None);
    Ok(())
}

#[tokio::test]
async fn test_session_body_is_sent() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![body(&[complete()])]);
    let mut extra = serde_json::Map::new();
    extra.insert("model".to_string(), json!("echo"));
    let mut session =
        ChatSession::new(transport.clone()).with_options(ChatOptions::default().with_body(extra));

    let outcome = session.submit("Hi").await?;

    // Nothing streamed, so no assistant message was created
    assert_eq!(outcome, Outcome::Finished { message: None });
    assert_eq!(session.messages().len(), 1);
    assert_eq!(transport.requests()[0].body.get("model"), Some(&json!("echo")));
    Ok(())
}

#[tokio::test]
async fn test_view_updates_while_streaming() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![vec![
        Step::Chunk(b"0:\"Hel\"\n".to_vec()),
        Step::Chunk(b"0:\"lo\"\n".to_vec()),
        Step::Stall,
    ]]);
    let recorder = Recorder::default();
    let mut session = ChatSession::new(transport).with_callbacks(recorder.clone());
    let mut view = session.subscribe();
    let stop = session.stop_handle();

    let watcher = tokio::spawn(async move {
        let seen = view
            .wait_for(|state| {
                state.messages.get(1).map(|message| message.content.as_str()) == Some("Hello")
            })
            .await
            .map(|state| state.clone());
        stop.stop();
        seen
    });

    // The stream never ends on its own, only the watcher can finish this request
    let outcome = session.submit("Hi").await?;

    assert_eq!(outcome, Outcome::Cancelled);
    let seen = watcher.await??;
    assert_eq!(seen.messages[0].content, "Hi");
    assert_eq!(seen.messages[1].role, Role::Assistant);
    assert_eq!(recorder.last_contents(), vec!["Hi", "Hel", "Hello"]);
    assert_eq!(session.subscribe().borrow().messages, session.messages());
    Ok(())
}

#[tokio::test]
async fn test_stop_during_finish_skips_roundtrip() -> Result<()> {
    let transport = ScriptedTransport::with_bodies(vec![
        body(&[tool_call("t1", "weather"), complete()]),
        body(&[StreamPart::text("never requested"), complete()]),
    ]);
    let recorder = Recorder::answering("weather", json!("sunny"));
    let mut session = ChatSession::new(transport.clone())
        .with_options(ChatOptions::default().with_max_roundtrips(3))
        .with_callbacks(recorder.clone());
    recorder.stop_on_finish(session.stop_handle());

    let outcome = session.submit("Weather?").await?;

    let reply = match outcome {
        Outcome::Finished { message: Some(reply) } => reply,
        other => panic!("expected the first reply, got {other:?}"),
    };
    assert!(reply.has_completed_tool_calls());
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(session.messages().len(), 2);
    Ok(())
}
