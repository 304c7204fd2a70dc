//! External tool server configuration.

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Transport kind for an external tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransportType {
    #[default]
    Stdio,
    Http,
    Sse,
}

impl McpTransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            McpTransportType::Stdio => "stdio",
            McpTransportType::Http => "http",
            McpTransportType::Sse => "sse",
        }
    }
}

/// Configuration for a single external tool server.
///
/// String fields may carry `$VAR` / `${VAR}` references; the session config
/// loader expands them before this struct reaches the manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpServerConfig {
    #[serde(rename = "type")]
    pub transport: McpTransportType,
    /// Command to spawn (stdio).
    pub command: String,
    pub args: Vec<String>,
    /// Endpoint (http/sse).
    pub url: String,
    pub env: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub disabled: bool,
}

impl McpServerConfig {
    pub fn validate(&self) -> Result<()> {
        match self.transport {
            McpTransportType::Stdio => {
                if self.command.is_empty() {
                    bail!("command is required for stdio servers");
                }
            }
            McpTransportType::Http | McpTransportType::Sse => {
                if self.url.is_empty() {
                    bail!("url is required for {} servers", self.transport.as_str());
                }
            }
        }
        Ok(())
    }
}
