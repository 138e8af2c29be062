use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::Value;

use super::ui::StreamableUi;
use super::value::StreamableValue;
use crate::errors::StreamableError;

/// Cells a [`Producer`] can render into
pub trait Streamable {
    type Item;

    fn update(&mut self, item: Self::Item);
    fn error(&mut self, error: StreamableError);
    fn done(&mut self, item: Option<Self::Item>);
}

impl Streamable for StreamableValue {
    type Item = Value;

    fn update(&mut self, item: Value) {
        StreamableValue::update(self, item)
    }

    fn error(&mut self, error: StreamableError) {
        StreamableValue::error(self, error)
    }

    fn done(&mut self, item: Option<Value>) {
        StreamableValue::done(self, item)
    }
}

impl<N> Streamable for StreamableUi<N> {
    type Item = Arc<N>;

    fn update(&mut self, item: Arc<N>) {
        StreamableUi::update(self, item)
    }

    fn error(&mut self, error: StreamableError) {
        StreamableUi::error(self, error)
    }

    fn done(&mut self, item: Option<Arc<N>>) {
        if let Some(item) = item {
            StreamableUi::update(self, item);
        }
        StreamableUi::done(self, None)
    }
}

/// The shape of whatever computes a cell's contents
pub enum Producer<T> {
    /// Known up front, the cell closes with it right away
    Value(T),
    /// A finite sequence, each item becomes one update
    Iter(Box<dyn Iterator<Item = T> + Send>),
    /// Items computed asynchronously; an error closes the cell with it
    Stream(BoxStream<'static, Result<T, StreamableError>>),
}

impl<T> Producer<T> {
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Producer::Iter(Box::new(items.into_iter()))
    }

    pub fn stream<S>(items: S) -> Self
    where
        S: Stream<Item = Result<T, StreamableError>> + Send + 'static,
    {
        Producer::Stream(items.boxed())
    }

    /// Drive the producer to completion, always leaving the cell closed
    pub async fn render<C>(self, cell: &mut C)
    where
        C: Streamable<Item = T>,
    {
        match self {
            Producer::Value(item) => cell.done(Some(item)),
            Producer::Iter(items) => {
                for item in items {
                    cell.update(item);
                }
                cell.done(None);
            }
            Producer::Stream(mut items) => {
                while let Some(item) = items.next().await {
                    match item {
                        Ok(item) => cell.update(item),
                        Err(error) => {
                            tracing::debug!(%error, "producer failed, closing cell");
                            cell.error(error);
                            return;
                        }
                    }
                }
                cell.done(None);
            }
        }
    }
}
