//! Values and UI trees that are published incrementally to a single reader.
//!
//! A cell is an unbounded single-producer/single-consumer channel of revisions. The producer
//! never waits on the reader; the reader pulls revisions in the order they were published and
//! rebuilds the current state from them.
pub mod producer;
pub mod revision;
pub mod ui;
pub mod value;
mod watchdog;

pub use producer::{Producer, Streamable};
pub use revision::{Patch, Revision, ValueSnapshot};
pub use ui::{StreamableUi, UiReader, UiRevision};
pub use value::{StreamableValue, ValueReader};
pub use watchdog::DEFAULT_IDLE_WARNING;

use crate::errors::StreamableError;

/// What a reader gets when it asks a cell for its value
#[derive(Debug)]
pub enum Streamed<S, R> {
    /// The cell closed before it was read
    Settled(Result<S, StreamableError>),
    /// The cell is still open; the reader pulls revisions as they arrive
    Live(R),
}
