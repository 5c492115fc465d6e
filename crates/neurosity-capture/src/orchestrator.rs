//! # Capture Orchestrator
//!
//! Runs one [`CaptureWorker`] per metric against a single authenticated
//! session and collects their outcomes.
//!
//! ```text
//! run_session
//!   ├── SessionDirectory::allocate
//!   ├── DeviceCloud::authenticate ──✗──► abort, nothing subscribed
//!   ├── CaptureOrchestrator::run
//!   │     ├── worker(raw)            ┐
//!   │     ├── worker(raw_unfiltered) │ JoinSet, shared window
//!   │     ├── ...                    │ and cancellation token
//!   │     └── worker(focus)          ┘
//!   └── DeviceSession::close
//! ```
//!
//! A failing worker only costs its own metric.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureSummary, CaptureWorker};
use crate::config::SessionWindow;
use crate::credentials::CaptureProfile;
use crate::error::{CaptureError, CaptureResult};
use crate::metric::Metric;
use crate::session::{DeviceCloud, DeviceSession, SessionInfo};
use crate::storage::SessionDirectory;

/// Result of one metric's worker.
#[derive(Debug)]
pub struct MetricOutcome {
    pub metric: Metric,
    pub result: CaptureResult<CaptureSummary>,
}

impl MetricOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of every worker in a run, in metric order.
#[derive(Debug, Default)]
pub struct CaptureReport {
    pub outcomes: Vec<MetricOutcome>,
}

impl CaptureReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &CaptureSummary> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (Metric, &CaptureError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.metric, e)))
    }

    pub fn total_events(&self) -> u64 {
        self.succeeded().map(|s| s.events_written).sum()
    }

    /// `true` if at least one worker stopped because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.succeeded().any(|s| s.cancelled)
    }

    pub fn outcome(&self, metric: Metric) -> Option<&MetricOutcome> {
        self.outcomes.iter().find(|o| o.metric == metric)
    }
}

/// Fans workers out over a shared session.
pub struct CaptureOrchestrator<S> {
    session: Arc<S>,
    directory: SessionDirectory,
    window: SessionWindow,
    cancel: CancellationToken,
    metrics: Vec<Metric>,
}

impl<S: DeviceSession> CaptureOrchestrator<S> {
    /// Orchestrator for all eight metrics.
    pub fn new(
        session: Arc<S>,
        directory: SessionDirectory,
        window: SessionWindow,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            directory,
            window,
            cancel,
            metrics: Metric::ALL.to_vec(),
        }
    }

    /// Restrict the run to `metrics`. Duplicates are ignored.
    #[must_use]
    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        let mut selected: Vec<Metric> = metrics.into_iter().collect();
        selected.sort();
        selected.dedup();
        self.metrics = selected;
        self
    }

    /// Start every worker and wait for all of them.
    pub async fn run(self) -> CaptureReport {
        let mut tasks = JoinSet::new();
        let window = self.window.total();

        tracing::info!(
            metrics = self.metrics.len(),
            window_secs = window.as_secs(),
            dir = %self.directory.path().display(),
            "Starting capture workers",
        );

        for &metric in &self.metrics {
            let worker = CaptureWorker::new(
                metric,
                self.directory.metric_log(metric),
                window,
                self.cancel.clone(),
            );
            let session = Arc::clone(&self.session);
            tasks.spawn(async move { (metric, worker.run(session.as_ref()).await) });
        }

        let mut outcomes = Vec::with_capacity(self.metrics.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((metric, result)) => {
                    if let Err(e) = &result {
                        tracing::error!(%metric, "{} generated an exception: {}", metric, e);
                    }
                    outcomes.push(MetricOutcome { metric, result });
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Capture task panicked or was aborted");
                }
            }
        }

        // Panicked tasks lose their metric; account for them here.
        for &metric in &self.metrics {
            if !outcomes.iter().any(|o| o.metric == metric) {
                tracing::error!(%metric, "{} generated an exception: worker task died", metric);
                outcomes.push(MetricOutcome {
                    metric,
                    result: Err(CaptureError::TaskFailed {
                        metric: metric.name().to_string(),
                        reason: "worker task panicked".into(),
                    }),
                });
            }
        }

        outcomes.sort_by_key(|o| o.metric);
        CaptureReport { outcomes }
    }
}

/// An authenticated run that has not started capturing yet.
pub struct CaptureRun<S> {
    info: SessionInfo,
    session: Arc<S>,
    directory: SessionDirectory,
    window: SessionWindow,
}

impl<S: DeviceSession> CaptureRun<S> {
    /// Allocate the output directory and authenticate.
    ///
    /// # Errors
    /// Returns an I/O error if the directory cannot be created, or
    /// [`CaptureError::Authentication`] if login fails. Nothing is
    /// subscribed in either case.
    pub async fn start<C>(
        cloud: &C,
        profile: &CaptureProfile,
        window: SessionWindow,
    ) -> CaptureResult<Self>
    where
        C: DeviceCloud<Session = S>,
    {
        let directory = SessionDirectory::allocate(&profile.output_root)?;
        let started_at = Utc::now();

        let session = match cloud.authenticate(&profile.credentials).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Authentication failed, aborting run");
                return Err(e);
            }
        };

        let info = SessionInfo {
            device_id: profile.credentials.device_id.clone(),
            email: profile.credentials.email.clone(),
            started_at,
            duration_minutes: window.duration_minutes,
            buffer_minutes: window.buffer_minutes,
            output_dir: directory.path().to_path_buf(),
        };

        Ok(Self {
            info,
            session: Arc::new(session),
            directory,
            window,
        })
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Capture every metric, then close the session.
    pub async fn capture(self, cancel: CancellationToken) -> CaptureReport {
        let orchestrator = CaptureOrchestrator::new(
            Arc::clone(&self.session),
            self.directory,
            self.window,
            cancel,
        );
        let report = orchestrator.run().await;
        self.session.close().await;

        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            events = report.total_events(),
            "Capture run complete",
        );
        report
    }
}

/// Authenticate, capture every metric for `window`, and close the session.
///
/// # Errors
/// Fails only before capture starts; see [`CaptureRun::start`]. Per-metric
/// failures are reported inside the [`CaptureReport`].
pub async fn run_session<C: DeviceCloud>(
    cloud: &C,
    profile: &CaptureProfile,
    window: SessionWindow,
    cancel: CancellationToken,
) -> CaptureResult<(SessionInfo, CaptureReport)> {
    let run = CaptureRun::start(cloud, profile, window).await?;
    let info = run.info().clone();
    let report = run.capture(cancel).await;
    Ok((info, report))
}
