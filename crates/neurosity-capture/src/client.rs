//! # Gateway WebSocket JSON-RPC Client
//!
//! Low-level transport for the device-cloud gateway. Handles the WebSocket
//! connection, JSON-RPC request/response correlation, login, and routing of
//! pushed metric samples.
//!
//! ## Architecture
//!
//! The WebSocket connection is split into reader/writer halves so RPC calls
//! and metric delivery share one socket:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    CloudClient                        │
//! │                                                       │
//! │  writer: Arc<Mutex<SplitSink>>  ◄── call()            │
//! │                                                       │
//! │  reader_loop (spawned task):                          │
//! │    SplitStream ─┬─► RPC response → oneshot tx         │
//! │                 ├─► brainwaves_raw frame → raw tx     │
//! │                 ├─► calm frame           → calm tx    │
//! │                 └─► ...                               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Each pushed frame is stamped with the delivery time as it leaves the
//! reader loop, so timestamps within one metric never go backwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::CaptureConfig;
use crate::credentials::Credentials;
use crate::error::{AuthFailure, CaptureError, CaptureResult};
use crate::event::CapturedEvent;
use crate::metric::Metric;
use crate::protocol::constants::Methods;
use crate::protocol::rpc::{EventFrame, RpcRequest, RpcResponse};

/// Type alias for the write half of the WebSocket connection.
type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Type alias for the read half of the WebSocket connection.
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// A pending RPC response awaiting its matching JSON-RPC response by `id`.
type PendingResponse = oneshot::Sender<CaptureResult<serde_json::Value>>;

type PendingMap = Arc<Mutex<HashMap<u64, PendingResponse>>>;

/// Senders for dispatching metric events to capture workers.
/// Unbounded, so no sample is dropped while its metric is subscribed.
type StreamSenders = Arc<std::sync::Mutex<HashMap<Metric, mpsc::UnboundedSender<CapturedEvent>>>>;

/// WebSocket JSON-RPC client for the device-cloud gateway.
///
/// The writer is shared behind `Arc<Mutex>` so that any number of workers
/// can issue calls concurrently. The reader runs in a background task that
/// dispatches:
///
/// - **RPC responses** → matched by `id` to pending `oneshot` channels
/// - **Metric frames** → routed by metric to `mpsc` channels
pub struct CloudClient {
    /// Shared write half of the WebSocket.
    writer: Arc<Mutex<WsWriter>>,

    /// Pending RPC requests awaiting responses, keyed by request ID.
    pending_responses: PendingMap,

    /// Auto-incrementing request ID counter.
    next_id: AtomicU64,

    /// Handle to the background reader loop task.
    reader_handle: std::sync::Mutex<Option<JoinHandle<()>>>,

    /// Whether the reader loop is currently running.
    reader_running: Arc<AtomicBool>,

    /// One sender per subscribed metric.
    stream_senders: StreamSenders,

    /// RPC call timeout (from config).
    rpc_timeout: Duration,
}

impl CloudClient {
    /// Connect to the gateway WebSocket.
    ///
    /// # Errors
    /// Returns [`CaptureError::ConnectionFailed`] if the handshake fails and
    /// [`CaptureError::Timeout`] if it does not complete in time.
    pub async fn connect(config: &CaptureConfig) -> CaptureResult<Self> {
        let url = config.gateway_url.clone();
        let connect_timeout = Duration::from_secs(config.timeouts.connect_timeout_secs);

        #[cfg(feature = "rustls-tls")]
        {
            // Fails only if a provider is already installed, which is fine.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }

        let (ws, response) =
            tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| CaptureError::Timeout {
                    seconds: config.timeouts.connect_timeout_secs,
                })?
                .map_err(|e| CaptureError::ConnectionFailed {
                    url: url.clone(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;

        tracing::info!(url, status = %response.status(), "Connected to device gateway");

        let (writer, reader) = ws.split();

        let pending_responses: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_running = Arc::new(AtomicBool::new(true));
        let stream_senders: StreamSenders = Arc::new(std::sync::Mutex::new(HashMap::new()));

        // The reader must be running before any call so responses can be dispatched.
        let reader_handle = Self::spawn_reader_loop(
            reader,
            Arc::clone(&pending_responses),
            Arc::clone(&reader_running),
            Arc::clone(&stream_senders),
        );

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            pending_responses,
            next_id: AtomicU64::new(1),
            reader_handle: std::sync::Mutex::new(Some(reader_handle)),
            reader_running,
            stream_senders,
            rpc_timeout: Duration::from_secs(config.timeouts.rpc_timeout_secs),
        })
    }

    /// Spawn the background reader loop that dispatches WebSocket messages.
    fn spawn_reader_loop(
        mut reader: WsReader,
        pending_responses: PendingMap,
        running: Arc<AtomicBool>,
        stream_senders: StreamSenders,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut failure: Option<CaptureError> = None;

            while running.load(Ordering::SeqCst) {
                let msg = tokio::select! {
                    msg = reader.next() => msg,
                    () = tokio::time::sleep(Duration::from_millis(100)) => continue,
                };

                match msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(raw = %text.as_str(), "Reader loop received message");

                        let value: serde_json::Value = match serde_json::from_str(&text) {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!("Failed to parse gateway message as JSON: {}", e);
                                continue;
                            }
                        };

                        if let Some(id) = value.get("id").and_then(serde_json::Value::as_u64) {
                            Self::dispatch_response(&pending_responses, id, value).await;
                        } else {
                            Self::dispatch_event(&stream_senders, value);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Gateway WebSocket closed by server");
                        failure = Some(CaptureError::ConnectionLost {
                            reason: "gateway WebSocket closed".into(),
                        });
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        failure = Some(CaptureError::WebSocket(format!("WebSocket error: {e}")));
                        break;
                    }
                    None => {
                        tracing::info!("Gateway WebSocket stream ended");
                        failure = Some(CaptureError::ConnectionLost {
                            reason: "gateway WebSocket stream ended".into(),
                        });
                        break;
                    }
                    // Binary messages, pings, pongs
                    Some(Ok(_)) => {}
                }
            }

            if let Some(err) = failure {
                let reason = err.to_string();
                let mut pending = pending_responses.lock().await;
                for (_, tx) in pending.drain() {
                    let _ = tx.send(Err(CaptureError::ConnectionLost {
                        reason: reason.clone(),
                    }));
                }
            }

            // Dropping the senders closes every metric channel.
            if let Ok(mut senders) = stream_senders.lock() {
                senders.clear();
            }

            tracing::debug!("Reader loop exiting");
            running.store(false, Ordering::SeqCst);
        })
    }

    async fn dispatch_response(pending_responses: &PendingMap, id: u64, value: serde_json::Value) {
        let response: Result<RpcResponse, _> = serde_json::from_value(value);

        let mut pending = pending_responses.lock().await;
        let Some(tx) = pending.remove(&id) else {
            tracing::debug!(id, "Received response for unknown request ID");
            return;
        };

        let result = match response {
            Ok(resp) => {
                if let Some(error) = resp.error {
                    tracing::warn!(
                        id,
                        code = error.code,
                        message = %error.message,
                        "Gateway error in RPC response",
                    );
                    Err(CaptureError::from_api_error(error.code, error.message))
                } else {
                    resp.result.ok_or_else(|| CaptureError::ProtocolError {
                        reason: "Response has no result or error".into(),
                    })
                }
            }
            Err(e) => Err(CaptureError::ProtocolError {
                reason: format!("Failed to parse RPC response: {e}"),
            }),
        };
        let _ = tx.send(result);
    }

    fn dispatch_event(stream_senders: &StreamSenders, value: serde_json::Value) {
        let frame: EventFrame = match serde_json::from_value(value) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("Ignoring message that is neither response nor event: {}", e);
                return;
            }
        };

        let Some(metric) = Metric::from_method_name(&frame.metric) else {
            tracing::debug!(metric = %frame.metric, "Event for unknown metric");
            return;
        };

        let Ok(senders) = stream_senders.lock() else {
            return;
        };
        let Some(tx) = senders.get(&metric) else {
            tracing::trace!(%metric, "Event for metric without subscriber");
            return;
        };

        if tx.send(CapturedEvent::now(metric, frame.data)).is_err() {
            tracing::debug!(%metric, "Event channel closed");
        }
    }

    // ─── Core RPC ───────────────────────────────────────────────────────

    /// Send a JSON-RPC request and wait for the matching response.
    async fn call(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> CaptureResult<serde_json::Value> {
        if !self.is_connected() {
            return Err(CaptureError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest::new(id, method, params);

        let json = serde_json::to_string(&request).map_err(|e| CaptureError::ProtocolError {
            reason: format!("serialize error: {e}"),
        })?;

        // Params may carry the password; only the method is logged.
        tracing::debug!(method, id, "Sending gateway request");

        let (tx, rx) = oneshot::channel();
        self.pending_responses.lock().await.insert(id, tx);

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.send(Message::Text(json.into())).await {
                self.pending_responses.lock().await.remove(&id);
                return Err(CaptureError::WebSocket(format!("Send error: {e}")));
            }
        }

        let timeout_secs = self.rpc_timeout.as_secs();
        let result = match tokio::time::timeout(self.rpc_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CaptureError::ConnectionLost {
                reason: "Response channel dropped (reader loop died)".into(),
            }),
            Err(_) => {
                self.pending_responses.lock().await.remove(&id);
                Err(CaptureError::Timeout {
                    seconds: timeout_secs,
                })
            }
        }?;

        tracing::debug!(method, id, "Gateway RPC succeeded");
        Ok(result)
    }

    // ─── Authentication ─────────────────────────────────────────────────

    /// Log in for `credentials.device_id` and return the session token.
    ///
    /// Every failure is reported as [`CaptureError::Authentication`]; the
    /// kind distinguishes unknown accounts and wrong passwords from
    /// everything else.
    ///
    /// # Errors
    /// Returns [`CaptureError::Authentication`].
    pub async fn login(&self, credentials: &Credentials) -> CaptureResult<String> {
        let result = self
            .call(
                Methods::LOGIN,
                serde_json::json!({
                    "deviceId": credentials.device_id,
                    "email": credentials.email,
                    "password": credentials.password.expose(),
                }),
            )
            .await
            .map_err(|e| match e {
                CaptureError::Authentication { .. } => e,
                CaptureError::ApiError { code, message } => CaptureError::Authentication {
                    kind: AuthFailure::classify(code, &message),
                    reason: message,
                },
                other => CaptureError::Authentication {
                    kind: AuthFailure::Other,
                    reason: other.to_string(),
                },
            })?;

        let token = result
            .get("token")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CaptureError::Authentication {
                kind: AuthFailure::Other,
                reason: "login response missing token".into(),
            })?
            .to_string();

        tracing::info!(device_id = %credentials.device_id, "Logged in to device cloud");
        Ok(token)
    }

    /// Invalidate `token`.
    ///
    /// # Errors
    /// Returns any error produced by the `logout` RPC call.
    pub async fn logout(&self, token: &str) -> CaptureResult<()> {
        self.call(Methods::LOGOUT, serde_json::json!({ "token": token }))
            .await?;
        tracing::debug!("Logged out of device cloud");
        Ok(())
    }

    // ─── Metric Subscriptions ───────────────────────────────────────────

    /// Subscribe to `metric` and return the subscription id plus a receiver
    /// of its events.
    ///
    /// # Errors
    /// Returns [`CaptureError::Subscription`] if the metric already has a
    /// subscriber on this client or the gateway refuses it; transport errors
    /// pass through.
    pub async fn subscribe_metric(
        &self,
        token: &str,
        device_id: &str,
        metric: Metric,
    ) -> CaptureResult<(String, mpsc::UnboundedReceiver<CapturedEvent>)> {
        let rx = self.add_stream_channel(metric)?;

        let result = self
            .call(
                Methods::SUBSCRIBE,
                serde_json::json!({
                    "token": token,
                    "deviceId": device_id,
                    "metric": metric.method_name(),
                }),
            )
            .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                self.remove_stream_channel(metric);
                return Err(e.for_metric(metric.name()));
            }
        };

        let subscription_id = result
            .get("subscriptionId")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| metric.method_name(), str::to_string);

        tracing::info!(%metric, subscription_id, "Subscribed to metric");
        Ok((subscription_id, rx))
    }

    /// Unsubscribe and drop the metric's channel.
    ///
    /// The channel is removed even if the RPC fails.
    ///
    /// # Errors
    /// Returns any error produced by the `unsubscribe` RPC call.
    pub async fn unsubscribe_metric(
        &self,
        token: &str,
        subscription_id: &str,
        metric: Metric,
    ) -> CaptureResult<()> {
        let result = self
            .call(
                Methods::UNSUBSCRIBE,
                serde_json::json!({
                    "token": token,
                    "subscriptionId": subscription_id,
                    "metric": metric.method_name(),
                }),
            )
            .await;
        self.remove_stream_channel(metric);
        result?;

        tracing::info!(%metric, subscription_id, "Unsubscribed from metric");
        Ok(())
    }

    /// Register a channel for `metric`. At most one per metric.
    fn add_stream_channel(
        &self,
        metric: Metric,
    ) -> CaptureResult<mpsc::UnboundedReceiver<CapturedEvent>> {
        let mut senders = self
            .stream_senders
            .lock()
            .map_err(|_| CaptureError::ProtocolError {
                reason: format!("Failed to create {metric} stream channel"),
            })?;
        if senders.contains_key(&metric) {
            return Err(CaptureError::Subscription {
                metric: metric.name().to_string(),
                reason: "metric already has an active subscription".into(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        senders.insert(metric, tx);
        Ok(rx)
    }

    fn remove_stream_channel(&self, metric: Metric) {
        if let Ok(mut senders) = self.stream_senders.lock() {
            senders.remove(&metric);
        }
    }

    // ─── Connection Management ──────────────────────────────────────────

    /// Returns whether the reader loop is still running.
    pub fn is_connected(&self) -> bool {
        self.reader_running.load(Ordering::SeqCst)
    }

    /// Stop the reader loop.
    pub async fn stop_reader(&self) {
        self.reader_running.store(false, Ordering::SeqCst);
        let handle = self
            .reader_handle
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
        }
    }

    /// Close the WebSocket connection.
    ///
    /// # Errors
    /// Never fails today; kept fallible for transport errors on close.
    pub async fn disconnect(&self) -> CaptureResult<()> {
        self.stop_reader().await;

        let mut writer = self.writer.lock().await;
        let _ = writer.close().await;

        Ok(())
    }
}
