//! # Credential Resolver
//!
//! Resolves the device identity, account credentials and output root for a
//! run. Each value is read from its environment variable; when that is
//! missing or empty the user is prompted once through a [`Prompter`] and the
//! answer is cached in the resolver for the rest of the run. The process
//! environment is never written to.
//!
//! | Variable              | Meaning                          |
//! |-----------------------|----------------------------------|
//! | `NEUROSITY_DEVICE_ID` | Device to capture from           |
//! | `NEUROSITY_EMAIL`     | Account email                    |
//! | `NEUROSITY_PASSWORD`  | Account password (hidden prompt) |
//! | `OUTPUT_SESSION_DIR`  | Root for session directories     |

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::error::{CaptureError, CaptureResult};

/// One value the resolver knows how to obtain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialVar {
    DeviceId,
    Email,
    Password,
    OutputDir,
}

impl CredentialVar {
    /// Every variable, in prompt order.
    pub const ALL: [CredentialVar; 4] = [
        CredentialVar::DeviceId,
        CredentialVar::Email,
        CredentialVar::Password,
        CredentialVar::OutputDir,
    ];

    /// Environment variable holding this value.
    #[must_use]
    pub fn env_name(self) -> &'static str {
        match self {
            CredentialVar::DeviceId => "NEUROSITY_DEVICE_ID",
            CredentialVar::Email => "NEUROSITY_EMAIL",
            CredentialVar::Password => "NEUROSITY_PASSWORD",
            CredentialVar::OutputDir => "OUTPUT_SESSION_DIR",
        }
    }

    /// Human-readable prompt label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CredentialVar::DeviceId => "Neurosity device id",
            CredentialVar::Email => "Neurosity email",
            CredentialVar::Password => "Neurosity password",
            CredentialVar::OutputDir => "output session directory",
        }
    }

    /// Whether input must be hidden while typing.
    #[must_use]
    pub fn is_secret(self) -> bool {
        matches!(self, CredentialVar::Password)
    }
}

impl fmt::Display for CredentialVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_name())
    }
}

/// Interactive source of missing values.
pub trait Prompter {
    /// Ask the user for `label`. `hidden` requests no echo.
    ///
    /// # Errors
    /// Returns an I/O error if the terminal is unavailable or input is aborted.
    fn prompt(&self, label: &str, hidden: bool) -> io::Result<String>;
}

impl<P: Prompter + ?Sized> Prompter for &P {
    fn prompt(&self, label: &str, hidden: bool) -> io::Result<String> {
        (**self).prompt(label, hidden)
    }
}

/// Prompter for non-interactive runs: every missing value is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn prompt(&self, label: &str, _hidden: bool) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{label} is not set and prompting is disabled"),
        ))
    }
}

/// A string that never prints its contents.
///
/// `Debug` and `Display` render one `*` per character.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The cleartext value. Do not log it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn masked(&self) -> String {
        "*".repeat(self.0.chars().count())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.masked())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Account and device identity used to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub device_id: String,
    pub email: String,
    pub password: Secret,
}

impl Credentials {
    pub fn new(
        device_id: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            email: email.into(),
            password: Secret::new(password),
        }
    }
}

/// Everything the resolver produces, built once per run.
#[derive(Debug, Clone)]
pub struct CaptureProfile {
    pub credentials: Credentials,
    pub output_root: PathBuf,
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Look `key` up in `primary`, falling back to `fallback` when the primary
/// value is absent or empty.
fn layered(
    primary: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    fallback: HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
    move |key| {
        primary(key)
            .filter(|v| !v.is_empty())
            .or_else(|| fallback.get(key).cloned())
    }
}

/// Environment-first, prompt-second resolver with a per-run cache.
pub struct CredentialResolver<P> {
    prompter: P,
    lookup: Lookup,
    cache: HashMap<CredentialVar, String>,
}

impl<P: Prompter> CredentialResolver<P> {
    /// Resolver reading the process environment.
    pub fn new(prompter: P) -> Self {
        Self::with_lookup(prompter, |key| std::env::var(key).ok())
    }

    /// Resolver reading the process environment, then `dotenv` (entries
    /// parsed from a `.env` file, see [`crate::dotenv::load_dotenv`]).
    pub fn with_dotenv(prompter: P, dotenv: HashMap<String, String>) -> Self {
        Self::with_lookup(prompter, layered(|key| std::env::var(key).ok(), dotenv))
    }

    /// Resolver reading values from `lookup` instead of the environment.
    pub fn with_lookup(
        prompter: P,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            prompter,
            lookup: Box::new(lookup),
            cache: HashMap::new(),
        }
    }

    /// Return the value of `var`, prompting at most once per run.
    ///
    /// # Errors
    /// Returns [`CaptureError::CredentialUnavailable`] if prompting fails or
    /// the user enters an empty value.
    pub fn resolve(&mut self, var: CredentialVar) -> CaptureResult<String> {
        if let Some(value) = self.cache.get(&var) {
            return Ok(value.clone());
        }

        if let Some(value) = (self.lookup)(var.env_name()).filter(|v| !v.is_empty()) {
            tracing::debug!(variable = var.env_name(), "Resolved from environment");
            self.cache.insert(var, value.clone());
            return Ok(value);
        }

        let value = self
            .prompter
            .prompt(var.label(), var.is_secret())
            .map_err(|e| CaptureError::CredentialUnavailable {
                variable: var.env_name().to_string(),
                reason: e.to_string(),
            })?;
        let value = if var.is_secret() {
            value
        } else {
            value.trim().to_string()
        };
        if value.is_empty() {
            return Err(CaptureError::CredentialUnavailable {
                variable: var.env_name().to_string(),
                reason: "empty value entered".into(),
            });
        }

        tracing::debug!(variable = var.env_name(), "Resolved from prompt");
        self.cache.insert(var, value.clone());
        Ok(value)
    }

    /// Resolve all four values into an immutable profile.
    ///
    /// # Errors
    /// Returns the first [`CaptureError::CredentialUnavailable`] encountered.
    pub fn resolve_profile(&mut self) -> CaptureResult<CaptureProfile> {
        let device_id = self.resolve(CredentialVar::DeviceId)?;
        let email = self.resolve(CredentialVar::Email)?;
        let password = self.resolve(CredentialVar::Password)?;
        let output_root = self.resolve(CredentialVar::OutputDir)?;

        Ok(CaptureProfile {
            credentials: Credentials {
                device_id,
                email,
                password: Secret::new(password),
            },
            output_root: PathBuf::from(output_root),
        })
    }
}
