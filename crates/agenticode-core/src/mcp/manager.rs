//! Client manager: supervises external tool server connections.
//!
//! Per-client state machine: `Disabled → Starting → {Connected, Error}`.
//! Clients in `Error` are never handed to callers. Everything closes on
//! session shutdown via `close_all`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::client::McpClient;
use super::config::{McpServerConfig, McpTransportType};
use super::protocol::{McpToolDef, ToolCallResult};
use super::transport::{HttpTransport, McpTransport, SseTransport, StdioTransport};

const CLIENT_NAME: &str = "agenticode";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Connection state of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Disabled,
    Starting,
    Connected,
    Error,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClientState::Disabled => "disabled",
            ClientState::Starting => "starting",
            ClientState::Connected => "connected",
            ClientState::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Observable status of one client.
#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub name: String,
    pub state: ClientState,
    pub error: Option<String>,
    pub tool_count: usize,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Supervises external tool clients for one session.
pub struct ClientManager {
    clients: RwLock<HashMap<String, Arc<McpClient>>>,
    states: RwLock<HashMap<String, ClientStatus>>,
    working_dir: PathBuf,
}

impl ClientManager {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            working_dir,
        }
    }

    /// Initialize every enabled server concurrently. Individual failures are
    /// recorded per client and never abort the session.
    pub async fn initialize_all(&self, configs: &HashMap<String, McpServerConfig>) {
        let futures: Vec<_> = configs
            .iter()
            .map(|(name, config)| {
                let name = name.clone();
                let config = config.clone();
                async move { (name.clone(), self.initialize(&name, config).await) }
            })
            .collect();

        for (name, result) in join_all(futures).await {
            if let Err(e) = result {
                warn!("failed to initialize external tool server {}: {:#}", name, e);
            }
        }
    }

    /// Create, start, handshake, and catalog one client.
    pub async fn initialize(&self, name: &str, config: McpServerConfig) -> Result<()> {
        if config.disabled {
            self.set_state(name, ClientState::Disabled, None, 0).await;
            return Ok(());
        }
        config.validate()?;

        self.set_state(name, ClientState::Starting, None, 0).await;

        let transport: Arc<dyn McpTransport> = match self.start_transport(&config).await {
            Ok(t) => t,
            Err(e) => {
                self.set_state(name, ClientState::Error, Some(e.to_string()), 0)
                    .await;
                return Err(e);
            }
        };

        let client = McpClient::new(name, transport);

        if let Err(e) = client.initialize(CLIENT_NAME, CLIENT_VERSION).await {
            self.set_state(name, ClientState::Error, Some(e.to_string()), 0)
                .await;
            return Err(e);
        }

        let tool_count = match client.list_tools().await {
            Ok(tools) => tools.len(),
            Err(e) => {
                // Initialized but no catalog; still usable for direct calls.
                warn!("failed to list tools from {}: {}", name, e);
                0
            }
        };

        self.clients
            .write()
            .await
            .insert(name.to_string(), Arc::new(client));
        self.set_state(name, ClientState::Connected, None, tool_count)
            .await;

        info!("external tool server {} connected with {} tools", name, tool_count);
        Ok(())
    }

    async fn start_transport(&self, config: &McpServerConfig) -> Result<Arc<dyn McpTransport>> {
        match config.transport {
            McpTransportType::Stdio => Ok(Arc::new(
                StdioTransport::spawn(
                    &config.command,
                    &config.args,
                    &config.env,
                    &self.working_dir,
                )
                .await?,
            )),
            McpTransportType::Http => Ok(Arc::new(HttpTransport::new(
                config.url.clone(),
                config.headers.clone(),
            ))),
            McpTransportType::Sse => Ok(Arc::new(
                SseTransport::connect(config.url.clone(), config.headers.clone()).await?,
            )),
        }
    }

    /// A connected client, or an error if unknown or errored.
    pub async fn get_client(&self, name: &str) -> Result<Arc<McpClient>> {
        if let Some(status) = self.states.read().await.get(name) {
            if status.state == ClientState::Error {
                return Err(anyhow!(
                    "client {} is in error state: {}",
                    name,
                    status.error.as_deref().unwrap_or("unknown")
                ));
            }
        }
        self.clients
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("client {} not found", name))
    }

    pub async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> Result<ToolCallResult> {
        let client = self.get_client(server).await?;
        client.call_tool(tool, arguments).await
    }

    /// All cataloged tools of all connected clients, as (server, def) pairs.
    pub async fn all_tools(&self) -> Vec<(String, McpToolDef)> {
        let clients = self.clients.read().await;
        let mut tools = Vec::new();
        for (name, client) in clients.iter() {
            for tool in client.cached_tools().await {
                tools.push((name.clone(), tool));
            }
        }
        tools
    }

    pub async fn statuses(&self) -> Vec<ClientStatus> {
        let mut statuses: Vec<ClientStatus> = self.states.read().await.values().cloned().collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Close every client; called on session shutdown.
    pub async fn close_all(&self) {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        clients.clear();
        self.states.write().await.clear();
        if count > 0 {
            info!("closed {} external tool clients", count);
        }
    }

    async fn set_state(
        &self,
        name: &str,
        state: ClientState,
        error: Option<String>,
        tool_count: usize,
    ) {
        let connected_at = if state == ClientState::Connected {
            Some(Utc::now())
        } else {
            None
        };
        self.states.write().await.insert(
            name.to_string(),
            ClientStatus {
                name: name.to_string(),
                state,
                error,
                tool_count,
                connected_at,
            },
        );
    }
}
