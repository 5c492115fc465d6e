//! In-memory device cloud that pushes a fixed number of synthetic samples
//! per metric.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use neurosity_capture::{
    AuthFailure, CaptureError, CaptureResult, CapturedEvent, Credentials, DeviceCloud,
    DeviceSession, Metric, Subscription, UnsubscribeHandle,
};
use serde_json::json;
use tokio::sync::mpsc;

/// What the cloud saw during a run.
#[derive(Default)]
pub struct CloudLog {
    pub logins: AtomicUsize,
    pub subscribed: Mutex<Vec<Metric>>,
    pub unsubscribed: Mutex<Vec<Metric>>,
    pub closed: AtomicBool,
    senders: Mutex<Vec<mpsc::UnboundedSender<CapturedEvent>>>,
}

impl CloudLog {
    pub fn subscribed(&self) -> Vec<Metric> {
        let mut metrics = self.subscribed.lock().unwrap().clone();
        metrics.sort();
        metrics
    }

    pub fn unsubscribed(&self) -> Vec<Metric> {
        let mut metrics = self.unsubscribed.lock().unwrap().clone();
        metrics.sort();
        metrics
    }
}

#[derive(Clone, Default)]
pub struct MockCloud {
    log: Arc<CloudLog>,
    reject_login: Option<AuthFailure>,
    failing: HashSet<Metric>,
    panicking: HashSet<Metric>,
    events_per_metric: usize,
}

impl MockCloud {
    pub fn new(events_per_metric: usize) -> Self {
        Self {
            events_per_metric,
            ..Self::default()
        }
    }

    pub fn rejecting_login(mut self, kind: AuthFailure) -> Self {
        self.reject_login = Some(kind);
        self
    }

    pub fn failing(mut self, metric: Metric) -> Self {
        self.failing.insert(metric);
        self
    }

    pub fn panicking(mut self, metric: Metric) -> Self {
        self.panicking.insert(metric);
        self
    }

    pub fn log(&self) -> Arc<CloudLog> {
        Arc::clone(&self.log)
    }
}

impl DeviceCloud for MockCloud {
    type Session = MockSession;

    async fn authenticate(&self, _credentials: &Credentials) -> CaptureResult<MockSession> {
        self.log.logins.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.reject_login {
            return Err(CaptureError::Authentication {
                kind,
                reason: "rejected by mock cloud".into(),
            });
        }
        Ok(MockSession {
            cloud: self.clone(),
        })
    }
}

pub struct MockSession {
    cloud: MockCloud,
}

impl DeviceSession for MockSession {
    async fn subscribe(&self, metric: Metric) -> CaptureResult<Subscription> {
        let log = &self.cloud.log;
        log.subscribed.lock().unwrap().push(metric);

        if self.cloud.panicking.contains(&metric) {
            panic!("mock subscription for {metric} exploded");
        }
        if self.cloud.failing.contains(&metric) {
            return Err(CaptureError::MethodNotFound {
                method: metric.method_name(),
            });
        }

        let count = self.cloud.events_per_metric;
        let (tx, events) = mpsc::unbounded_channel();
        for seq in 0..count {
            tx.send(CapturedEvent::now(
                metric,
                json!({ "metric": metric.name(), "seq": seq }),
            ))
            .unwrap();
        }
        // Keep the channel open like a live subscription.
        log.senders.lock().unwrap().push(tx);

        let log = Arc::clone(log);
        Ok(Subscription {
            metric,
            events,
            handle: UnsubscribeHandle::new(metric, move || async move {
                log.unsubscribed.lock().unwrap().push(metric);
                Ok(())
            }),
        })
    }

    async fn close(&self) {
        self.cloud.log.closed.store(true, Ordering::SeqCst);
    }
}
