use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::revision::RevisionTail;
use super::watchdog::DEFAULT_IDLE_WARNING;
use super::Streamed;
use crate::errors::StreamableError;

#[derive(Debug)]
pub enum UiRevision<N> {
    /// Replace the last segment
    Replace(Arc<N>),
    /// Start a new segment after the existing ones
    Append(Arc<N>),
    Done(Option<Arc<N>>),
    Error(StreamableError),
}

// Manual impl, nodes are shared and need not be Clone themselves
impl<N> Clone for UiRevision<N> {
    fn clone(&self) -> Self {
        match self {
            UiRevision::Replace(node) => UiRevision::Replace(Arc::clone(node)),
            UiRevision::Append(node) => UiRevision::Append(Arc::clone(node)),
            UiRevision::Done(node) => UiRevision::Done(node.clone()),
            UiRevision::Error(error) => UiRevision::Error(error.clone()),
        }
    }
}

/// The rendered tree as a list of segments: `append` adds one, `update` replaces the last
#[derive(Debug)]
struct Segments<N> {
    nodes: Vec<Arc<N>>,
    error: Option<StreamableError>,
    terminal: bool,
}

impl<N> Segments<N> {
    fn new(initial: Option<Arc<N>>) -> Self {
        Self {
            nodes: initial.into_iter().collect(),
            error: None,
            terminal: false,
        }
    }

    fn replace_last(&mut self, node: Arc<N>) {
        match self.nodes.last_mut() {
            Some(last) => *last = node,
            None => self.nodes.push(node),
        }
    }

    fn apply(&mut self, revision: UiRevision<N>) {
        if self.terminal {
            return;
        }
        match revision {
            UiRevision::Replace(node) => self.replace_last(node),
            UiRevision::Append(node) => self.nodes.push(node),
            UiRevision::Done(node) => {
                if let Some(node) = node {
                    self.replace_last(node);
                }
                self.terminal = true;
            }
            UiRevision::Error(error) => {
                self.error = Some(error);
                self.terminal = true;
            }
        }
    }

    fn result(&self) -> Result<Vec<Arc<N>>, StreamableError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.nodes.clone()),
        }
    }
}

/// A UI tree that grows while it streams to the rendering layer.
///
/// Nodes are shared through `Arc`; updating with the node that is already current only
/// restarts the idle timer.
///
/// # Panics
///
/// Every producer operation panics once the cell is closed.
#[derive(Debug)]
pub struct StreamableUi<N> {
    segments: Segments<N>,
    tail: RevisionTail<UiRevision<N>>,
    reader: Option<UiReader<N>>,
}

impl<N> StreamableUi<N> {
    pub fn new(initial: Option<N>) -> Self {
        Self::with_idle_warning(initial, DEFAULT_IDLE_WARNING)
    }

    pub fn with_idle_warning(initial: Option<N>, idle: Duration) -> Self {
        let initial = initial.map(Arc::new);
        let (tail, rx) = RevisionTail::new("StreamableUi", idle);
        Self {
            reader: Some(UiReader {
                segments: Segments::new(initial.clone()),
                rx,
            }),
            segments: Segments::new(initial),
            tail,
        }
    }

    pub fn current(&self) -> Option<&Arc<N>> {
        self.segments.nodes.last()
    }

    pub fn is_closed(&self) -> bool {
        self.tail.is_closed()
    }

    pub fn update(&mut self, node: impl Into<Arc<N>>) {
        let node = node.into();
        if self.current().is_some_and(|current| Arc::ptr_eq(current, &node)) {
            self.tail.touch("update");
            return;
        }
        self.tail.push("update", UiRevision::Replace(Arc::clone(&node)));
        self.segments.replace_last(node);
    }

    pub fn append(&mut self, node: impl Into<Arc<N>>) {
        let node = node.into();
        self.tail.push("append", UiRevision::Append(Arc::clone(&node)));
        self.segments.nodes.push(node);
    }

    pub fn error(&mut self, error: StreamableError) {
        self.tail.close("error", UiRevision::Error(error.clone()));
        self.segments.apply(UiRevision::Error(error));
    }

    pub fn done(&mut self, node: Option<N>) {
        let revision = UiRevision::Done(node.map(Arc::new));
        self.tail.close("done", revision.clone());
        self.segments.apply(revision);
    }

    /// Hand the tree over to the rendering layer.
    ///
    /// # Panics
    ///
    /// Panics when called a second time.
    pub fn value(&mut self) -> Streamed<Vec<Arc<N>>, UiReader<N>> {
        let Some(reader) = self.reader.take() else {
            panic!("StreamableUi.value(): the value has already been read");
        };
        if self.is_closed() {
            Streamed::Settled(self.segments.result())
        } else {
            Streamed::Live(reader)
        }
    }
}

/// Consumer end of a [`StreamableUi`]
#[derive(Debug)]
pub struct UiReader<N> {
    segments: Segments<N>,
    rx: mpsc::UnboundedReceiver<UiRevision<N>>,
}

impl<N> UiReader<N> {
    pub fn current(&self) -> &[Arc<N>] {
        &self.segments.nodes
    }

    pub fn is_done(&self) -> bool {
        self.segments.terminal
    }

    /// Wait for the next revision and return the segments it produced.
    ///
    /// Returns `None` once the tree has closed, on every later call too.
    pub async fn next(&mut self) -> Option<Result<Vec<Arc<N>>, StreamableError>> {
        if self.segments.terminal {
            return None;
        }
        let revision = match self.rx.recv().await {
            Some(revision) => revision,
            None => UiRevision::Done(None),
        };
        let closed_empty = matches!(revision, UiRevision::Done(None));
        self.segments.apply(revision);
        if closed_empty {
            return None;
        }
        Some(self.segments.result())
    }

    pub async fn finish(mut self) -> Result<Vec<Arc<N>>, StreamableError> {
        while self.next().await.is_some() {}
        self.segments.result()
    }
}
