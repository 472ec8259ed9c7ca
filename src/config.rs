//! Session configuration.
//!
//! | Field | Default | Meaning |
//! |-------|---------|---------|
//! | `server_url` | (required) | Base URL; resource URLs are `{server_url}/{type}[/{id}]` |
//! | `mode` | `blocking` | Execution mode, fixed for the lifetime of the session |
//! | `trailing_slash` | `false` | Append `/` to generated resource URLs |

use serde::Deserialize;

use crate::error::Result;

/// How network-touching operations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Operations run to completion on the calling thread (`*_blocking` methods).
    #[default]
    Blocking,
    /// Operations suspend at transport calls (`async fn` methods).
    Cooperative,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Blocking => write!(f, "blocking"),
            ExecutionMode::Cooperative => write!(f, "cooperative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    pub server_url: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub trailing_slash: bool,
}

impl SessionConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            mode: ExecutionMode::default(),
            trailing_slash: false,
        }
    }

    pub fn cooperative(mut self) -> Self {
        self.mode = ExecutionMode::Cooperative;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.mode = ExecutionMode::Blocking;
        self
    }

    pub fn with_trailing_slash(mut self, enabled: bool) -> Self {
        self.trailing_slash = enabled;
        self
    }

    /// Parses a configuration from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
