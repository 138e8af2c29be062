use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::part::StreamPart;
use crate::streamable::{Revision, ValueReader};

/// Receiving half of a [`StreamData`], merged into an outgoing part stream
pub type DataStream = UnboundedReceiverStream<StreamPart>;

/// Producer-side handle for side-channel data sent next to a response.
///
/// Items appended here travel as `2:` lines and annotations as `6:` lines. The data stream
/// only ends once [`StreamData::close`] is called, so a merged response stays open until then.
#[derive(Debug)]
pub struct StreamData {
    tx: mpsc::UnboundedSender<StreamPart>,
    closed: bool,
}

impl StreamData {
    pub fn new() -> (Self, DataStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, closed: false }, UnboundedReceiverStream::new(rx))
    }

    pub fn append(&self, value: Value) {
        self.send(StreamPart::DataItems(vec![value]));
    }

    pub fn append_message_annotation(&self, annotation: Value) {
        self.send(StreamPart::MessageAnnotation(annotation));
    }

    pub fn close(mut self) {
        self.closed = true;
    }

    fn send(&self, part: StreamPart) {
        if self.tx.send(part).is_err() {
            tracing::debug!("data stream receiver is gone, discarding part");
        }
    }
}

impl Drop for StreamData {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("StreamData dropped without close()");
        }
    }
}

/// Interleave side-channel data with the main part stream.
///
/// The merged stream ends once both sides have ended.
pub fn merge_data<S>(parts: S, data: DataStream) -> impl Stream<Item = StreamPart>
where
    S: Stream<Item = StreamPart>,
{
    futures::stream::select(parts, data)
}

/// Forward a value cell's revisions as data items, starting from the reader's current value.
///
/// A client rebuilds the value by feeding each item to a `ValueSnapshot`.
pub fn pipe_value(mut reader: ValueReader) -> impl Stream<Item = StreamPart> {
    async_stream::stream! {
        if let Some(value) = reader.current().cloned() {
            yield revision_part(&Revision::Value { value });
        }
        while let Some(revision) = reader.next_revision().await {
            yield revision_part(&revision);
        }
    }
}

fn revision_part(revision: &Revision) -> StreamPart {
    StreamPart::DataItems(vec![serde_json::to_value(revision).unwrap_or(Value::Null)])
}
