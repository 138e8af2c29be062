use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;

/// How long an open cell may go without an operation before it logs a warning
pub const DEFAULT_IDLE_WARNING: Duration = Duration::from_secs(15);

/// Background timer that warns when an open cell stops receiving operations.
///
/// Every producer operation calls [`Watchdog::touch`] to restart the timer. Dropping the
/// watchdog ends the task. Cells created outside a tokio runtime run without one.
#[derive(Debug)]
pub(crate) struct Watchdog {
    touch: watch::Sender<()>,
}

impl Watchdog {
    pub fn spawn(kind: &'static str, idle: Duration, warnings: Arc<AtomicUsize>) -> Option<Self> {
        let handle = Handle::try_current().ok()?;
        let (touch, mut touched) = watch::channel(());

        handle.spawn(async move {
            loop {
                match tokio::time::timeout(idle, touched.changed()).await {
                    Ok(Ok(())) => continue,
                    // Sender dropped, the cell was closed or dropped
                    Ok(Err(_)) => break,
                    Err(_) => {
                        warnings.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            kind,
                            idle_secs = idle.as_secs_f64(),
                            "streamable has not been updated for a while, was done() forgotten?"
                        );
                        if touched.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Some(Self { touch })
    }

    pub fn touch(&self) {
        self.touch.send_replace(());
    }
}
