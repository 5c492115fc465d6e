//! # Device Session
//!
//! The seam between the capture orchestration and the device cloud.
//!
//! - [`DeviceCloud`] performs the single authentication attempt of a run.
//! - [`DeviceSession`] is the authenticated handle; every capture worker
//!   calls [`DeviceSession::subscribe`] on the same shared instance.
//! - A [`Subscription`] pairs the metric's event channel with an
//!   [`UnsubscribeHandle`].
//!
//! The production implementation is [`GatewayCloud`](crate::cloud::GatewayCloud);
//! tests drive the orchestrator with an in-memory implementation.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

use crate::credentials::Credentials;
use crate::error::CaptureResult;
use crate::event::CapturedEvent;
use crate::metric::Metric;

/// Authenticates against the device cloud.
pub trait DeviceCloud: Send + Sync {
    type Session: DeviceSession;

    /// Log in once. No retry is attempted on failure.
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = CaptureResult<Self::Session>> + Send;
}

/// An authenticated handle able to start per-metric subscriptions.
///
/// Implementations must tolerate concurrent `subscribe` calls for
/// different metrics.
pub trait DeviceSession: Send + Sync + 'static {
    /// Start pushing samples of `metric` onto a fresh channel.
    fn subscribe(&self, metric: Metric)
    -> impl Future<Output = CaptureResult<Subscription>> + Send;

    /// End the session after all subscriptions are gone. Best effort.
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

type UnsubscribeFn = Box<dyn FnOnce() -> BoxFuture<'static, CaptureResult<()>> + Send>;

/// Cancels one subscription.
///
/// Idempotent: the first [`unsubscribe`](Self::unsubscribe) contacts the
/// collaborator, later calls return `Ok(())` immediately. Dropping the
/// handle without calling it leaves the subscription active.
pub struct UnsubscribeHandle {
    metric: Metric,
    action: Option<UnsubscribeFn>,
}

impl UnsubscribeHandle {
    pub fn new<F, Fut>(metric: Metric, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CaptureResult<()>> + Send + 'static,
    {
        Self {
            metric,
            action: Some(Box::new(move || Box::pin(action()))),
        }
    }

    /// Handle for a subscription that needs no teardown.
    #[must_use]
    pub fn noop(metric: Metric) -> Self {
        Self {
            metric,
            action: None,
        }
    }

    /// `true` until the first call to [`unsubscribe`](Self::unsubscribe).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.action.is_some()
    }

    /// Cancel the subscription.
    ///
    /// # Errors
    /// Returns the collaborator's error from the first call only.
    pub async fn unsubscribe(&mut self) -> CaptureResult<()> {
        match self.action.take() {
            Some(action) => action().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for UnsubscribeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsubscribeHandle")
            .field("metric", &self.metric)
            .field("active", &self.is_active())
            .finish()
    }
}

/// One active metric subscription.
#[derive(Debug)]
pub struct Subscription {
    pub metric: Metric,
    /// Events in delivery order. Closes when the collaborator stops pushing.
    pub events: mpsc::UnboundedReceiver<CapturedEvent>,
    pub handle: UnsubscribeHandle,
}

/// Immutable description of a run.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub device_id: String,
    pub email: String,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u64,
    pub buffer_minutes: u64,
    pub output_dir: PathBuf,
}
