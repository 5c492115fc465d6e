//! Captured metric events and their on-disk line format.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metric::Metric;

/// `strftime` layout of `collected_timestamp`: UTC, microsecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H:%M:%S%.6f";

/// One timestamped delivery of a metric's payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub metric: Metric,
    /// Payload exactly as delivered by the collaborator.
    pub payload: serde_json::Value,
    pub captured_at: DateTime<Utc>,
}

/// Serialized shape of one log line.
#[derive(Serialize)]
struct Record<'a> {
    collected: &'a serde_json::Value,
    collected_timestamp: String,
}

impl CapturedEvent {
    /// Stamp `payload` with the current UTC time.
    #[must_use]
    pub fn now(metric: Metric, payload: serde_json::Value) -> Self {
        Self::at(metric, payload, Utc::now())
    }

    #[must_use]
    pub fn at(metric: Metric, payload: serde_json::Value, captured_at: DateTime<Utc>) -> Self {
        Self {
            metric,
            payload,
            captured_at,
        }
    }

    /// Capture time rendered with [`TIMESTAMP_FORMAT`].
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.captured_at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Serialize as one self-contained JSON line, newline included.
    ///
    /// # Errors
    /// Returns a JSON error if the payload cannot be serialized.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let record = Record {
            collected: &self.payload,
            collected_timestamp: self.timestamp(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        Ok(line)
    }
}
