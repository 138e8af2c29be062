use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::watchdog::Watchdog;
use crate::errors::StreamableError;

/// String update that extends what the reader already holds.
///
/// The reader keeps the first `offset` bytes of its current string and appends `suffix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub offset: usize,
    pub suffix: String,
}

impl Patch {
    /// The patch turning `old` into `new`, if `new` starts with `old`
    pub fn between(old: &str, new: &str) -> Option<Self> {
        new.strip_prefix(old).map(|suffix| Patch {
            offset: old.len(),
            suffix: suffix.to_string(),
        })
    }

    pub fn apply(&self, base: &str) -> String {
        let mut patched = base.get(..self.offset).unwrap_or(base).to_string();
        patched.push_str(&self.suffix);
        patched
    }
}

/// One step published by a [`StreamableValue`](super::StreamableValue).
///
/// Revisions serialize with a `type` tag so they can travel as data items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Revision {
    Value {
        value: Value,
    },
    Patch(Patch),
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    Error {
        error: StreamableError,
    },
}

impl Revision {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Revision::Done { .. } | Revision::Error { .. })
    }
}

/// A value rebuilt from revisions, on the reading side of a cell or from data items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSnapshot {
    value: Option<Value>,
    error: Option<StreamableError>,
    terminal: bool,
}

impl ValueSnapshot {
    pub fn new(initial: Option<Value>) -> Self {
        Self {
            value: initial,
            ..Default::default()
        }
    }

    pub fn apply(&mut self, revision: Revision) {
        if self.terminal {
            tracing::debug!("ignoring revision received after the value was closed");
            return;
        }

        match revision {
            Revision::Value { value } => self.value = Some(value),
            Revision::Patch(patch) => {
                let base = match &self.value {
                    Some(Value::String(base)) => base.as_str(),
                    _ => {
                        tracing::debug!("applying a string patch to a non-string value");
                        ""
                    }
                };
                self.value = Some(Value::String(patch.apply(base)));
            }
            Revision::Done { value } => {
                if value.is_some() {
                    self.value = value;
                }
                self.terminal = true;
            }
            Revision::Error { error } => {
                self.error = Some(error);
                self.terminal = true;
            }
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// The latest value, or the error the producer closed the cell with
    pub fn result(&self) -> Result<Option<Value>, StreamableError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.value.clone()),
        }
    }
}

/// Producer end of a cell's revision channel.
///
/// Holds the open/closed state shared by both cell kinds: every operation on a closed tail
/// panics, and a tail dropped while still open logs a warning.
#[derive(Debug)]
pub(crate) struct RevisionTail<R> {
    kind: &'static str,
    tx: mpsc::UnboundedSender<R>,
    closed: bool,
    watchdog: Option<Watchdog>,
    idle_warnings: Arc<AtomicUsize>,
}

impl<R> RevisionTail<R> {
    pub fn new(kind: &'static str, idle: Duration) -> (Self, mpsc::UnboundedReceiver<R>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let idle_warnings = Arc::new(AtomicUsize::new(0));
        let watchdog = Watchdog::spawn(kind, idle, Arc::clone(&idle_warnings));
        let tail = Self {
            kind,
            tx,
            closed: false,
            watchdog,
            idle_warnings,
        };
        (tail, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Record activity without publishing anything
    pub fn touch(&self, op: &str) {
        self.assert_open(op);
        if let Some(watchdog) = &self.watchdog {
            watchdog.touch();
        }
    }

    pub fn push(&mut self, op: &str, revision: R) {
        self.touch(op);
        if self.tx.send(revision).is_err() {
            tracing::debug!(kind = self.kind, "reader dropped, discarding revision");
        }
    }

    /// Publish the terminal revision and close the tail
    pub fn close(&mut self, op: &str, revision: R) {
        self.push(op, revision);
        self.closed = true;
        self.watchdog = None;
    }

    pub fn idle_warnings(&self) -> usize {
        self.idle_warnings.load(Ordering::Relaxed)
    }

    fn assert_open(&self, op: &str) {
        if self.closed {
            panic!("{}.{}(): the stream is already closed", self.kind, op);
        }
    }
}

impl<R> Drop for RevisionTail<R> {
    fn drop(&mut self) {
        if !self.closed && !std::thread::panicking() {
            tracing::warn!(kind = self.kind, "streamable dropped without done() or error()");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_extends_previous_string() {
        let cases = [("", "abc"), ("Hel", "Hello"), ("héllo", "héllo wörld"), ("same", "same")];
        for (old, new) in cases {
            let patch = Patch::between(old, new).unwrap();
            assert_eq!(patch.offset, old.len());
            assert_eq!(patch.apply(old), new);
        }
        assert_eq!(Patch::between("abc", "abd"), None);
        assert_eq!(Patch::between("abc", "ab"), None);
    }

    #[test]
    fn test_patch_offset_past_base() {
        let patch = Patch {
            offset: 10,
            suffix: "!".to_string(),
        };
        assert_eq!(patch.apply("hi"), "hi!");
    }

    #[test]
    fn test_revision_wire_shape() {
        let patch = Revision::Patch(Patch {
            offset: 3,
            suffix: "lo".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"type": "patch", "offset": 3, "suffix": "lo"})
        );
        assert_eq!(
            serde_json::to_value(Revision::Done { value: None }).unwrap(),
            json!({"type": "done"})
        );
        let error: Revision =
            serde_json::from_value(json!({"type": "error", "error": {"message": "boom"}})).unwrap();
        assert_eq!(
            error,
            Revision::Error {
                error: StreamableError::new("boom")
            }
        );
    }

    #[test]
    fn test_snapshot_ignores_revisions_after_close() {
        let mut snapshot = ValueSnapshot::new(Some(json!("a")));
        snapshot.apply(Revision::Patch(Patch::between("a", "ab").unwrap()));
        snapshot.apply(Revision::Done { value: None });
        snapshot.apply(Revision::Value { value: json!("late") });
        assert_eq!(snapshot.result(), Ok(Some(json!("ab"))));

        let mut failed = ValueSnapshot::default();
        failed.apply(Revision::Error {
            error: StreamableError::new("boom"),
        });
        assert!(failed.is_terminal());
        assert_eq!(failed.result(), Err(StreamableError::new("boom")));
    }
}
