//! Protocol constants for method names and error codes.

/// Known gateway RPC method names.
pub struct Methods;

impl Methods {
    // ─── Authentication ─────────────────────────────────────────────

    /// Log in to the device cloud for a given device and obtain a session token.
    pub const LOGIN: &'static str = "login";

    /// Invalidate the session token.
    pub const LOGOUT: &'static str = "logout";

    // ─── Metrics ────────────────────────────────────────────────────

    /// Start pushing samples of one metric.
    pub const SUBSCRIBE: &'static str = "subscribe";

    /// Stop pushing samples of one metric.
    pub const UNSUBSCRIBE: &'static str = "unsubscribe";
}

// ─── Error Codes ────────────────────────────────────────────────────────

/// Gateway error codes.
pub struct ErrorCodes;

impl ErrorCodes {
    // ─── JSON-RPC standard errors ────────────────────────────────────

    /// The requested method does not exist on this gateway / device.
    pub const METHOD_NOT_FOUND: i32 = -32601;

    // ─── Authentication ──────────────────────────────────────────────

    /// No account registered under this email.
    pub const EMAIL_NOT_FOUND: i32 = -32040;

    /// Password does not match the account.
    pub const INVALID_PASSWORD: i32 = -32041;

    /// Session token missing, expired or revoked.
    pub const INVALID_TOKEN: i32 = -32042;

    /// The device is not claimed by this account.
    pub const DEVICE_NOT_CLAIMED: i32 = -32043;

    // ─── Subscriptions ───────────────────────────────────────────────

    /// The device does not offer this metric.
    pub const UNKNOWN_METRIC: i32 = -32050;

    /// The metric already has an active subscription on this session.
    pub const ALREADY_SUBSCRIBED: i32 = -32051;
}
