use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

use super::part::{
    FunctionCallPayload, PartKind, StatusPayload, StreamPart, ToolCallDeltaPayload,
    ToolCallPayload,
};

/// Incremental decoder for the data stream protocol.
///
/// Bytes may arrive split anywhere, including inside a multi-byte character or in the
/// middle of a line. Complete lines are decoded as soon as their terminator arrives; a
/// partial line waits in the buffer for more bytes. A line with an unknown prefix or a
/// malformed payload is dropped on its own and never fails the stream.
#[derive(Debug, Default)]
pub struct LineDecoder {
    // Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    buffer: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed arbitrary bytes into the decoder and drain the parts of every completed line
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamPart> {
        self.decode_utf8(bytes);

        let mut parts = Vec::new();
        while let Some(end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=end).collect();
            parts.extend(parse_line(line.trim_end_matches(['\n', '\r'])));
        }
        parts
    }

    /// Flush whatever is left once the byte stream has ended.
    ///
    /// A final line that never received its terminator is still decoded.
    pub fn finish(&mut self) -> Vec<StreamPart> {
        if !self.pending.is_empty() {
            self.buffer
                .push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }

        let rest = std::mem::take(&mut self.buffer);
        let mut parts = Vec::new();
        for line in rest.split('\n') {
            parts.extend(parse_line(line.trim_end_matches('\r')));
        }
        parts
    }

    /// True when no partial line or partial character is waiting for more bytes
    pub fn is_empty_buffer(&self) -> bool {
        self.pending.is_empty() && self.buffer.is_empty()
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid = consumed + err.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[consumed..valid]));
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid + len;
                        }
                        // Incomplete sequence at the end, wait for the next chunk
                        None => {
                            consumed = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

/// Decode a single line without its terminator
pub fn parse_line(line: &str) -> Vec<StreamPart> {
    if line.is_empty() {
        return Vec::new();
    }

    let Some((prefix, payload)) = line.split_once(':') else {
        tracing::debug!(line, "dropping stream line without a prefix");
        return Vec::new();
    };
    let Some(kind) = PartKind::from_prefix(prefix) else {
        tracing::debug!(prefix, "dropping stream line with unknown prefix");
        return Vec::new();
    };
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(prefix, error = %err, "dropping stream line with malformed payload");
            return Vec::new();
        }
    };

    let parts = from_payload(kind, value);
    if parts.is_none() {
        tracing::debug!(prefix, "dropping stream line with unexpected payload shape");
    }
    parts.unwrap_or_default()
}

fn from_payload(kind: PartKind, value: Value) -> Option<Vec<StreamPart>> {
    let parts = match kind {
        PartKind::Text => vec![StreamPart::TextDelta(into_string(value)?)],
        PartKind::FunctionCall => {
            let payload: FunctionCallPayload = serde_json::from_value(value).ok()?;
            vec![StreamPart::FunctionCallComplete {
                name: payload.function_call.name,
                arguments: parse_arguments(payload.function_call.arguments),
            }]
        }
        PartKind::Data => vec![StreamPart::DataItems(into_array(value)?)],
        PartKind::Status => match value {
            Value::String(message) => vec![StreamPart::Error(message)],
            value => {
                let payload: StatusPayload = serde_json::from_value(value).ok()?;
                vec![StreamPart::Status {
                    status: payload.status,
                    information: payload.information,
                }]
            }
        },
        PartKind::ThreadId => vec![StreamPart::ThreadId(into_string(value)?)],
        PartKind::ToolCalls => {
            let calls: Vec<ToolCallPayload> = serde_json::from_value(value).ok()?;
            calls
                .into_iter()
                .map(|call| StreamPart::ToolCallComplete {
                    tool_call_id: call.tool_call_id,
                    tool_name: call.tool_name,
                    args: call.args,
                })
                .collect()
        }
        PartKind::MessageAnnotations => into_array(value)?
            .into_iter()
            .map(StreamPart::MessageAnnotation)
            .collect(),
        PartKind::ToolCallDelta => {
            let payload: ToolCallDeltaPayload = serde_json::from_value(value).ok()?;
            match (payload.args_text_delta, payload.tool_name) {
                (Some(args_text_delta), tool_name) => vec![StreamPart::ToolCallArgsDelta {
                    tool_call_id: payload.tool_call_id,
                    tool_name,
                    args_text_delta,
                }],
                (None, Some(tool_name)) => vec![StreamPart::ToolCallStart {
                    tool_call_id: payload.tool_call_id,
                    tool_name,
                }],
                (None, None) => return None,
            }
        }
    };
    Some(parts)
}

fn into_string(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        _ => None,
    }
}

fn into_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

// Legacy function call arguments always travel JSON-encoded inside a string
fn parse_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

/// Adapt a transport body into a stream of decoded parts.
///
/// Parts come out in the order their lines complete; a transport error ends the stream.
pub fn decode_stream<S, E>(body: S) -> impl Stream<Item = Result<StreamPart, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    async_stream::try_stream! {
        let mut decoder = LineDecoder::new();
        futures::pin_mut!(body);
        while let Some(chunk) = body.next().await {
            for part in decoder.feed(&chunk?) {
                yield part;
            }
        }
        for part in decoder.finish() {
            yield part;
        }
    }
}
