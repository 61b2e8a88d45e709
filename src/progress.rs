//! Elapsed-time feedback while waiting on the model.
//!
//! A [`ProgressIndicator`] runs on its own tokio task and reports the time since the cycle
//! started to a [`ProgressSink`] at a fixed interval.  Stopping it cancels the task and joins it,
//! so once [`ProgressIndicator::stop`] returns the sink will not be called again.

use std::io;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receives periodic elapsed-time updates.
///
/// An error ends the indicator quietly; it is never propagated.
pub trait ProgressSink: Send + 'static {
    /// Show that `elapsed` has passed since the cycle started.
    fn show_elapsed(&mut self, elapsed: Duration) -> io::Result<()>;
}

/// A sink that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn show_elapsed(&mut self, _: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// A running elapsed-time indicator.
///
/// The cancellation token is the only state shared with the background task.
#[derive(Debug)]
pub struct ProgressIndicator {
    started_at: Instant,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressIndicator {
    /// Spawns the indicator task.  Must be called from within a tokio runtime.
    pub fn start(started_at: Instant, interval: Duration, sink: Box<dyn ProgressSink>) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(started_at, interval, sink, cancel.clone()));
        Self {
            started_at,
            cancel,
            handle: Some(handle),
        }
    }

    /// When the cycle being reported on started.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// True once [`ProgressIndicator::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the indicator and waits for its task to finish.
    ///
    /// Calling this more than once is harmless; only the first call does any work.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    warn!("progress indicator panicked: {err}");
                }
            }
        }
    }
}

impl Drop for ProgressIndicator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    started_at: Instant,
    interval: Duration,
    mut sink: Box<dyn ProgressSink>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if cancel.is_cancelled() {
                    break;
                }
                if let Err(err) = sink.show_elapsed(started_at.elapsed()) {
                    debug!("progress output failed, indicator exiting: {err}");
                    break;
                }
            }
        }
    }
}
