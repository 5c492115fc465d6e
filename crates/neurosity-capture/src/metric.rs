//! # Metric Streams
//!
//! The fixed set of real-time metrics a capture run subscribes to, and the
//! static lookup from each logical name to the collaborator's method name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Prefix used by the collaborator for brain-wave derived metrics.
const BRAINWAVES_PREFIX: &str = "brainwaves_";

/// One real-time metric stream produced by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Filtered raw EEG samples.
    Raw,
    /// Raw EEG samples before filtering.
    RawUnfiltered,
    /// Power spectral density.
    Psd,
    /// Average power per frequency band.
    PowerByBand,
    /// Per-channel signal quality.
    SignalQuality,
    /// Accelerometer readings.
    Accelerometer,
    /// Calm probability score.
    Calm,
    /// Focus probability score.
    Focus,
}

impl Metric {
    /// Every metric, in capture order.
    pub const ALL: [Metric; 8] = [
        Metric::Raw,
        Metric::RawUnfiltered,
        Metric::Psd,
        Metric::PowerByBand,
        Metric::SignalQuality,
        Metric::Accelerometer,
        Metric::Calm,
        Metric::Focus,
    ];

    /// Logical metric name, also used as the log file stem.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Metric::Raw => "raw",
            Metric::RawUnfiltered => "raw_unfiltered",
            Metric::Psd => "psd",
            Metric::PowerByBand => "power_by_band",
            Metric::SignalQuality => "signal_quality",
            Metric::Accelerometer => "accelerometer",
            Metric::Calm => "calm",
            Metric::Focus => "focus",
        }
    }

    /// Whether the collaborator exposes this metric under the
    /// `brainwaves_` family.
    #[must_use]
    pub fn is_brainwave(self) -> bool {
        !matches!(
            self,
            Metric::SignalQuality | Metric::Accelerometer | Metric::Calm | Metric::Focus
        )
    }

    /// Collaborator method name for this metric's subscription.
    #[must_use]
    pub fn method_name(self) -> String {
        if self.is_brainwave() {
            format!("{BRAINWAVES_PREFIX}{}", self.name())
        } else {
            self.name().to_string()
        }
    }

    /// Reverse of [`Metric::method_name`].
    #[must_use]
    pub fn from_method_name(method: &str) -> Option<Self> {
        Metric::ALL.into_iter().find(|m| m.method_name() == method)
    }

    /// File name of this metric's log inside a session directory.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.txt", self.name())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| CaptureError::ConfigError {
                reason: format!("unknown metric '{s}'"),
            })
    }
}
