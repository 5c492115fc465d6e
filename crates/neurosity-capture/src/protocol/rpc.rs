//! JSON-RPC request/response protocol structures.

use serde::{Deserialize, Serialize};

/// A JSON-RPC 2.0 request to the gateway.
#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub id: u64,
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    /// Create a new request with the given method and params.
    ///
    /// Empty object params are omitted from the wire format.
    pub fn new(id: u64, method: &'static str, params: serde_json::Value) -> Self {
        let params = if params.as_object().is_some_and(serde_json::Map::is_empty) {
            None
        } else {
            Some(params)
        };

        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response from the gateway.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

/// A JSON-RPC 2.0 error payload.
///
/// Use [`CaptureError::from_api_error`](crate::CaptureError::from_api_error)
/// to convert to a semantic error type.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gateway API error {}: {}", self.code, self.message)
    }
}

/// A pushed metric sample. Frames carry no `id`.
///
/// ```json
/// {"metric": "brainwaves_raw", "subscriptionId": "sub-1", "data": {...}}
/// ```
#[derive(Debug, Deserialize)]
pub struct EventFrame {
    /// Collaborator method name of the metric (e.g. `brainwaves_psd`).
    pub metric: String,
    #[serde(rename = "subscriptionId", default)]
    pub subscription_id: Option<String>,
    /// Opaque sample payload.
    pub data: serde_json::Value,
}
