use std::time::Duration;

use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use super::revision::{Patch, Revision, RevisionTail, ValueSnapshot};
use super::watchdog::DEFAULT_IDLE_WARNING;
use super::Streamed;
use crate::errors::StreamableError;

/// A JSON value that evolves over time and is read incrementally by one consumer.
///
/// The producer publishes revisions with [`update`](Self::update) and closes the cell with
/// [`done`](Self::done) or [`error`](Self::error). String updates that extend the previous
/// string travel as patches carrying only the new suffix.
///
/// # Panics
///
/// Every producer operation panics once the cell is closed.
#[derive(Debug)]
pub struct StreamableValue {
    current: Option<Value>,
    error: Option<StreamableError>,
    tail: RevisionTail<Revision>,
    reader: Option<ValueReader>,
}

impl StreamableValue {
    pub fn new(initial: Option<Value>) -> Self {
        Self::with_idle_warning(initial, DEFAULT_IDLE_WARNING)
    }

    pub fn with_idle_warning(initial: Option<Value>, idle: Duration) -> Self {
        let (tail, rx) = RevisionTail::new("StreamableValue", idle);
        Self {
            reader: Some(ValueReader::new(initial.clone(), rx)),
            current: initial,
            error: None,
            tail,
        }
    }

    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.tail.is_closed()
    }

    pub fn update(&mut self, value: Value) {
        let patch = match (&self.current, &value) {
            (Some(Value::String(old)), Value::String(new)) => Patch::between(old, new),
            _ => None,
        };
        let revision = match patch {
            Some(patch) => Revision::Patch(patch),
            None => Revision::Value {
                value: value.clone(),
            },
        };
        self.tail.push("update", revision);
        self.current = Some(value);
    }

    pub fn error(&mut self, error: StreamableError) {
        self.tail.close(
            "error",
            Revision::Error {
                error: error.clone(),
            },
        );
        self.error = Some(error);
    }

    pub fn done(&mut self, value: Option<Value>) {
        self.tail.close(
            "done",
            Revision::Done {
                value: value.clone(),
            },
        );
        if value.is_some() {
            self.current = value;
        }
    }

    /// Hand the cell over to its reader.
    ///
    /// A cell that closed before anyone subscribed settles immediately; otherwise the reader
    /// starts from the initial value and pulls every revision published since.
    ///
    /// # Panics
    ///
    /// Panics when called a second time, a cell has exactly one reader.
    pub fn value(&mut self) -> Streamed<Option<Value>, ValueReader> {
        let Some(reader) = self.reader.take() else {
            panic!("StreamableValue.value(): the value has already been read");
        };
        if self.is_closed() {
            Streamed::Settled(match &self.error {
                Some(error) => Err(error.clone()),
                None => Ok(self.current.clone()),
            })
        } else {
            Streamed::Live(reader)
        }
    }

    #[cfg(test)]
    pub(crate) fn idle_warnings(&self) -> usize {
        self.tail.idle_warnings()
    }
}

/// Consumer end of a [`StreamableValue`]
#[derive(Debug)]
pub struct ValueReader {
    snapshot: ValueSnapshot,
    rx: mpsc::UnboundedReceiver<Revision>,
}

impl ValueReader {
    fn new(initial: Option<Value>, rx: mpsc::UnboundedReceiver<Revision>) -> Self {
        Self {
            snapshot: ValueSnapshot::new(initial),
            rx,
        }
    }

    pub fn current(&self) -> Option<&Value> {
        self.snapshot.value()
    }

    pub fn is_done(&self) -> bool {
        self.snapshot.is_terminal()
    }

    /// Pull and apply the next raw revision, `None` once the cell has closed
    pub async fn next_revision(&mut self) -> Option<Revision> {
        if self.snapshot.is_terminal() {
            return None;
        }
        match self.rx.recv().await {
            Some(revision) => {
                self.snapshot.apply(revision.clone());
                Some(revision)
            }
            None => {
                // Producer went away without closing
                self.snapshot.apply(Revision::Done { value: None });
                None
            }
        }
    }

    /// Wait for the next value.
    ///
    /// Yields the reconstructed value after every update, the producer's error once, and
    /// `None` after the cell has closed. Repeated calls after that keep returning `None`.
    pub async fn next(&mut self) -> Option<Result<Value, StreamableError>> {
        match self.next_revision().await? {
            Revision::Done { value: None } => None,
            Revision::Error { error } => Some(Err(error)),
            _ => self.snapshot.value().cloned().map(Ok),
        }
    }

    /// Drain every remaining revision and return the final value
    pub async fn finish(mut self) -> Result<Option<Value>, StreamableError> {
        while self.next_revision().await.is_some() {}
        self.snapshot.result()
    }

    pub fn into_stream(mut self) -> impl Stream<Item = Result<Value, StreamableError>> {
        async_stream::stream! {
            while let Some(next) = self.next().await {
                yield next;
            }
        }
    }
}
