//! # Metric Capture Worker
//!
//! One worker owns one metric for the whole run:
//!
//! ```text
//! Idle ──subscribe ok──► Subscribed ──deadline / cancel / write error──► Unsubscribing ──► Done
//!   │
//!   └──subscribe failed──────────────────────────────────────────────────────────────────► Done
//! ```
//!
//! While subscribed every received event is appended to the metric's log in
//! delivery order.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CaptureResult;
use crate::metric::Metric;
use crate::session::DeviceSession;
use crate::storage::MetricLog;

/// Deadline for windows too long to represent as an [`Instant`]. About 30 years.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Subscribed,
    Unsubscribing,
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::Subscribed => "subscribed",
            WorkerState::Unsubscribing => "unsubscribing",
            WorkerState::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a worker did with its metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub metric: Metric,
    pub events_written: u64,
    pub path: PathBuf,
    /// The window was cut short by the cancellation token.
    pub cancelled: bool,
}

/// Records one metric for one session window.
#[derive(Debug)]
pub struct CaptureWorker {
    metric: Metric,
    log: MetricLog,
    window: Duration,
    cancel: CancellationToken,
}

impl CaptureWorker {
    pub fn new(metric: Metric, log: MetricLog, window: Duration, cancel: CancellationToken) -> Self {
        Self {
            metric,
            log,
            window,
            cancel,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn transition(&self, state: &mut WorkerState, next: WorkerState) {
        tracing::debug!(metric = %self.metric, from = %state, to = %next, "Worker state change");
        *state = next;
    }

    /// Subscribe, record until the window closes or the token is cancelled,
    /// then unsubscribe.
    ///
    /// # Errors
    /// Returns [`CaptureError::Subscription`](crate::CaptureError::Subscription)
    /// if the metric cannot be subscribed, or an I/O error if its log cannot
    /// be written. In the latter case the subscription is cancelled first.
    pub async fn run<S: DeviceSession>(self, session: &S) -> CaptureResult<CaptureSummary> {
        let metric = self.metric;
        let mut state = WorkerState::Idle;

        let mut summary = CaptureSummary {
            metric,
            events_written: 0,
            path: self.log.path().to_path_buf(),
            cancelled: false,
        };

        if self.cancel.is_cancelled() {
            self.transition(&mut state, WorkerState::Done);
            summary.cancelled = true;
            return Ok(summary);
        }

        let subscription = match session.subscribe(metric).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.transition(&mut state, WorkerState::Done);
                return Err(e.for_metric(metric.name()));
            }
        };
        let mut events = subscription.events;
        let mut handle = subscription.handle;

        self.transition(&mut state, WorkerState::Subscribed);
        let deadline = Instant::now()
            .checked_add(self.window)
            .unwrap_or_else(far_future);
        let mut channel_open = true;

        let outcome: CaptureResult<bool> = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break Ok(true),
                () = tokio::time::sleep_until(deadline) => break Ok(false),
                event = events.recv(), if channel_open => match event {
                    Some(event) => {
                        if let Err(e) = self.log.append_blocking(event).await {
                            break Err(e);
                        }
                        summary.events_written += 1;
                    }
                    None => {
                        tracing::debug!(%metric, "Event channel closed before the window ended");
                        channel_open = false;
                    }
                },
            }
        };

        // Events already delivered before the window closed still belong to it.
        let outcome = match outcome {
            Ok(cancelled) => {
                let mut drained = Ok(cancelled);
                while let Ok(event) = events.try_recv() {
                    if let Err(e) = self.log.append_blocking(event).await {
                        drained = Err(e);
                        break;
                    }
                    summary.events_written += 1;
                }
                drained
            }
            Err(e) => Err(e),
        };

        self.transition(&mut state, WorkerState::Unsubscribing);
        if let Err(e) = handle.unsubscribe().await {
            tracing::warn!(%metric, error = %e, "Unsubscribe failed");
        }
        drop(events);
        self.transition(&mut state, WorkerState::Done);

        summary.cancelled = outcome?;
        tracing::info!(
            %metric,
            events = summary.events_written,
            path = %summary.path.display(),
            cancelled = summary.cancelled,
            "Metric capture finished",
        );
        Ok(summary)
    }
}
