//! Connection options
//!
//! Options can be built in code or loaded from a TOML file:
//!
//! ```toml
//! timeout_ms = 3000
//! debug = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options applied to a connection at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OptionsToml", into = "OptionsToml")]
pub struct RemoteOptions {
    /// Single timeout for connect, send and receive
    pub timeout: Duration,
    /// Mirror raw traffic to the echo sink
    pub debug: bool,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }
}

impl RemoteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse options from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), ?options, "Loaded connection options");
        Ok(options)
    }
}

/// On-disk shape: durations are plain milliseconds
#[derive(Serialize, Deserialize)]
struct OptionsToml {
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    debug: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

impl From<OptionsToml> for RemoteOptions {
    fn from(raw: OptionsToml) -> Self {
        Self {
            timeout: Duration::from_millis(raw.timeout_ms),
            debug: raw.debug,
        }
    }
}

impl From<RemoteOptions> for OptionsToml {
    fn from(options: RemoteOptions) -> Self {
        Self {
            timeout_ms: options.timeout.as_millis() as u64,
            debug: options.debug,
        }
    }
}
