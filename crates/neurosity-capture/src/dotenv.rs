//! `.env` file support for credentials.
//!
//! The file is parsed into a map and layered under the process environment;
//! nothing is ever written into the environment.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{CaptureError, CaptureResult};

/// Name of the file looked up in the working directory.
pub const DOTENV_FILE: &str = ".env";

/// Parse `<dir>/.env` if it exists. A missing file yields an empty map.
///
/// # Errors
/// Returns [`CaptureError::ConfigError`] if the file exists but cannot be read.
pub fn load_dotenv(dir: &Path) -> CaptureResult<HashMap<String, String>> {
    let path = dir.join(DOTENV_FILE);
    if !path.exists() {
        return Ok(HashMap::new());
    }
    tracing::debug!(path = %path.display(), "Parsing .env file");

    let content = std::fs::read_to_string(&path).map_err(|e| CaptureError::ConfigError {
        reason: format!("Failed to read '{}': {}", path.display(), e),
    })?;
    Ok(parse_env(&content))
}

/// Parse `KEY=value` lines. Comments, blank lines and lines without `=` are
/// skipped; an `export ` prefix and matching quotes are stripped.
pub fn parse_env(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            tracing::debug!(line = line_num + 1, "Skipping .env line without '='");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            tracing::debug!(line = line_num + 1, "Skipping .env line with empty key");
            continue;
        }

        let value = value.trim();
        let quoted = value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')));
        let value = if quoted {
            &value[1..value.len() - 1]
        } else {
            value.split(" #").next().unwrap_or("").trim()
        };

        // Values are not logged: the file usually holds the password.
        tracing::trace!(key, "Loaded .env entry");
        vars.insert(key.to_string(), value.to_string());
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_forms() {
        let vars = parse_env(
            "# credentials\n\
             NEUROSITY_EMAIL=ada@example.com\n\
             export NEUROSITY_DEVICE_ID = dev-1 # desk headset\n\
             NEUROSITY_PASSWORD=\"p#ss word\"\n\
             OUTPUT_SESSION_DIR='/data/runs'\n\
             \n\
             garbage line\n\
             =orphan\n",
        );

        assert_eq!(vars["NEUROSITY_EMAIL"], "ada@example.com");
        assert_eq!(vars["NEUROSITY_DEVICE_ID"], "dev-1");
        assert_eq!(vars["NEUROSITY_PASSWORD"], "p#ss word");
        assert_eq!(vars["OUTPUT_SESSION_DIR"], "/data/runs");
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dotenv(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "NEUROSITY_EMAIL=x@y.z\n").unwrap();
        let vars = load_dotenv(dir.path()).unwrap();
        assert_eq!(vars.get("NEUROSITY_EMAIL").map(String::as_str), Some("x@y.z"));
    }
}
