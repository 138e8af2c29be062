use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

use super::part::{
    FunctionCallBody, FunctionCallPayload, StatusPayload, StreamPart, ToolCallDeltaPayload,
    ToolCallPayload,
};

/// Serialize a part into one `<prefix>:<json>\n` line
pub fn encode(part: &StreamPart) -> String {
    format!("{}:{}\n", part.kind().prefix(), payload(part))
}

/// Encode a stream of parts into response body chunks, one line per chunk
pub fn encode_stream<S>(parts: S) -> impl Stream<Item = Bytes>
where
    S: Stream<Item = StreamPart>,
{
    parts.map(|part| Bytes::from(encode(&part)))
}

fn payload(part: &StreamPart) -> String {
    match part {
        StreamPart::TextDelta(text) => to_json(text),
        StreamPart::DataItems(items) => to_json(items),
        StreamPart::ToolCallStart {
            tool_call_id,
            tool_name,
        } => to_json(&ToolCallDeltaPayload {
            tool_call_id: tool_call_id.clone(),
            tool_name: Some(tool_name.clone()),
            args_text_delta: None,
        }),
        StreamPart::ToolCallArgsDelta {
            tool_call_id,
            tool_name,
            args_text_delta,
        } => to_json(&ToolCallDeltaPayload {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.clone(),
            args_text_delta: Some(args_text_delta.clone()),
        }),
        StreamPart::ToolCallComplete {
            tool_call_id,
            tool_name,
            args,
        } => to_json(&[ToolCallPayload {
            tool_call_id: tool_call_id.clone(),
            tool_name: tool_name.clone(),
            args: args.clone(),
        }]),
        StreamPart::MessageAnnotation(annotation) => to_json(&[annotation]),
        StreamPart::Status {
            status,
            information,
        } => to_json(&StatusPayload {
            status: *status,
            information: information.clone(),
        }),
        StreamPart::ThreadId(thread_id) => to_json(thread_id),
        StreamPart::FunctionCallComplete { name, arguments } => to_json(&FunctionCallPayload {
            function_call: FunctionCallBody {
                name: name.clone(),
                arguments: Value::String(arguments.to_string()),
            },
        }),
        StreamPart::Error(message) => to_json(message),
    }
}

// Serialized straight from the payload structs so fields keep their declared order.
// These only hold strings and JSON values, which always serialize.
fn to_json<T: serde::Serialize + ?Sized>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string())
}
