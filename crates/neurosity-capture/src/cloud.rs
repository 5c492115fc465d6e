//! [`DeviceCloud`] implementation backed by the gateway WebSocket.

use std::sync::Arc;

use crate::client::CloudClient;
use crate::config::CaptureConfig;
use crate::credentials::Credentials;
use crate::error::{AuthFailure, CaptureError, CaptureResult};
use crate::metric::Metric;
use crate::session::{DeviceCloud, DeviceSession, Subscription, UnsubscribeHandle};

/// Connects to the gateway and logs in on [`authenticate`](DeviceCloud::authenticate).
#[derive(Debug, Clone)]
pub struct GatewayCloud {
    config: CaptureConfig,
}

impl GatewayCloud {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl DeviceCloud for GatewayCloud {
    type Session = GatewaySession;

    async fn authenticate(&self, credentials: &Credentials) -> CaptureResult<GatewaySession> {
        let client = CloudClient::connect(&self.config)
            .await
            .map_err(|e| CaptureError::Authentication {
                kind: AuthFailure::Other,
                reason: e.to_string(),
            })?;

        let token = match client.login(credentials).await {
            Ok(token) => token,
            Err(e) => {
                let _ = client.disconnect().await;
                return Err(e);
            }
        };

        Ok(GatewaySession {
            client: Arc::new(client),
            token,
            device_id: credentials.device_id.clone(),
        })
    }
}

/// A logged-in gateway connection shared by every capture worker.
pub struct GatewaySession {
    client: Arc<CloudClient>,
    token: String,
    device_id: String,
}

impl std::fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySession")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl GatewaySession {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl DeviceSession for GatewaySession {
    async fn subscribe(&self, metric: Metric) -> CaptureResult<Subscription> {
        let (subscription_id, events) = self
            .client
            .subscribe_metric(&self.token, &self.device_id, metric)
            .await?;

        let client = Arc::clone(&self.client);
        let token = self.token.clone();
        let handle = UnsubscribeHandle::new(metric, move || async move {
            client
                .unsubscribe_metric(&token, &subscription_id, metric)
                .await
        });

        Ok(Subscription {
            metric,
            events,
            handle,
        })
    }

    async fn close(&self) {
        if self.client.is_connected() {
            if let Err(e) = self.client.logout(&self.token).await {
                tracing::warn!(error = %e, "Logout failed");
            }
        }
        let _ = self.client.disconnect().await;
    }
}
