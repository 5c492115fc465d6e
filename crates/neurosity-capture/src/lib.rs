//! # neurosity-capture
//!
//! Records every real-time metric of a Neurosity headset into per-metric
//! JSON-lines files for a fixed session window.
//!
//! One authenticated session is shared by eight concurrent workers, one per
//! [`Metric`]. Each worker subscribes, appends every delivered sample to
//! `<output root>/session_YYYYMMDD-HHMMSS/<metric>.txt`, and unsubscribes when
//! the window (duration plus buffer) closes or the run is cancelled.
//!
//! ## Quick Start
//!
//! ```ignore
//! use neurosity_capture::{
//!     CaptureConfig, CredentialResolver, GatewayCloud, NoPrompt, run_session,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> neurosity_capture::CaptureResult<()> {
//!     let config = CaptureConfig::discover(None)?;
//!     let profile = CredentialResolver::new(NoPrompt).resolve_profile()?;
//!
//!     let cloud = GatewayCloud::new(config.clone());
//!     let (info, report) = run_session(
//!         &cloud,
//!         &profile,
//!         config.session_window(),
//!         CancellationToken::new(),
//!     )
//!     .await?;
//!
//!     println!("{} events in {}", report.total_events(), info.output_dir.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! | Layer | Type | Role |
//! |-------|------|------|
//! | Transport | [`CloudClient`] | WebSocket JSON-RPC to the device gateway |
//! | Session seam | [`DeviceCloud`] / [`DeviceSession`] | Login and per-metric subscriptions |
//! | Capture | [`CaptureWorker`] | One metric, one window, one file |
//! | Orchestration | [`run_session`] | All metrics, shared session, report |
//!
//! ## Configuration
//!
//! Credentials come from the environment or interactive prompts:
//!
//! ```bash
//! export NEUROSITY_DEVICE_ID="your-device-id"
//! export NEUROSITY_EMAIL="you@example.com"
//! export NEUROSITY_PASSWORD="..."
//! export OUTPUT_SESSION_DIR="./sessions"
//! ```
//!
//! Everything else lives in an optional `neurosity-capture.toml`:
//!
//! ```toml
//! gateway_url = "ws://localhost:8787"
//! duration_minutes = 30
//! buffer_minutes = 10
//! ```

pub mod capture;
pub mod client;
pub mod cloud;
pub mod config;
pub mod credentials;
pub mod dotenv;
pub mod error;
pub mod event;
pub mod metric;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod storage;

// ─── Public re-exports ──────────────────────────────────────────────────

pub use capture::{CaptureSummary, CaptureWorker};
pub use client::CloudClient;
pub use cloud::{GatewayCloud, GatewaySession};
pub use config::{CaptureConfig, SessionWindow};
pub use credentials::{
    CaptureProfile, CredentialResolver, CredentialVar, Credentials, NoPrompt, Prompter, Secret,
};
pub use dotenv::load_dotenv;
pub use error::{AuthFailure, CaptureError, CaptureResult};
pub use event::CapturedEvent;
pub use metric::Metric;
pub use orchestrator::{CaptureOrchestrator, CaptureReport, CaptureRun, MetricOutcome, run_session};
pub use session::{DeviceCloud, DeviceSession, SessionInfo, Subscription, UnsubscribeHandle};
pub use storage::{MetricLog, SessionDirectory};
