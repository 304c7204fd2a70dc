//! Client for one external tool server.
//!
//! The engine drives each server from a single logical caller: tool
//! executions are serial within a turn, so requests to one server never
//! overlap. The client leans on that and performs one locked exchange per
//! request — write the frame, then read frames until the answer with the
//! matching id shows up. Notifications and stale frames encountered
//! mid-exchange are logged and skipped; there is no background task and no
//! per-request wait registry to keep consistent.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::protocol::{
    ClientInfo, InitializeParams, InitializeResult, McpRequest, McpResponse, McpToolDef,
    ToolCallParams, ToolCallResult, ToolsListResult,
};
use super::transport::McpTransport;

const PROTOCOL_VERSION: &str = "2024-11-05";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct McpClient {
    name: String,
    transport: Arc<dyn McpTransport>,
    /// Guards the whole request/response exchange and carries the id counter.
    exchange: Mutex<i64>,
    tools: RwLock<Vec<McpToolDef>>,
}

impl McpClient {
    pub fn new(name: &str, transport: Arc<dyn McpTransport>) -> Self {
        Self {
            name: name.to_string(),
            transport,
            exchange: Mutex::new(0),
            tools: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handshake; must complete before any tool traffic.
    pub async fn initialize(
        &self,
        client_name: &str,
        client_version: &str,
    ) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: ClientInfo {
                name: client_name.to_string(),
                version: client_version.to_string(),
            },
        };

        let result: InitializeResult = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;

        info!(
            server = %self.name,
            protocol = %result.protocol_version,
            "external tool server initialized"
        );

        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// Enumerate and cache the remote tool catalog.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>> {
        let result: ToolsListResult = self.request("tools/list", None).await?;
        info!(server = %self.name, tools = result.tools.len(), "remote catalog loaded");
        *self.tools.write().await = result.tools.clone();
        Ok(result.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let params = ToolCallParams {
            name: name.to_string(),
            arguments: if arguments.is_null() {
                None
            } else {
                Some(arguments)
            },
        };
        self.request("tools/call", Some(serde_json::to_value(params)?))
            .await
    }

    pub async fn cached_tools(&self) -> Vec<McpToolDef> {
        self.tools.read().await.clone()
    }

    pub async fn is_alive(&self) -> bool {
        self.transport.is_alive().await
    }

    /// One full exchange: send the request, then drain incoming frames until
    /// the matching response arrives or the deadline passes.
    async fn request<R: for<'de> serde::Deserialize<'de>>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<R> {
        let mut counter = self.exchange.lock().await;
        *counter += 1;
        let id = *counter;

        let payload = serde_json::to_string(&McpRequest::new(id, method, params))?;
        debug!(server = %self.name, id, method, "sending request");
        self.transport.send(&payload).await?;

        let deadline = tokio::time::Instant::now() + REQUEST_TIMEOUT;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.transport.receive())
                .await
                .map_err(|_| {
                    anyhow!(
                        "server {} did not answer '{}' within {}s",
                        self.name,
                        method,
                        REQUEST_TIMEOUT.as_secs()
                    )
                })??;

            let response: McpResponse = match serde_json::from_str(&frame) {
                Ok(r) => r,
                Err(e) => {
                    warn!(server = %self.name, "discarding unparseable frame: {}", e);
                    continue;
                }
            };

            match response.id {
                Some(frame_id) if frame_id == id => {
                    if let Some(error) = response.error {
                        return Err(anyhow!(
                            "server {} error {}: {}",
                            self.name,
                            error.code,
                            error.message
                        ));
                    }
                    return Ok(serde_json::from_value(
                        response.result.unwrap_or(Value::Null),
                    )?);
                }
                Some(stale) => {
                    // Answer to a request whose caller already timed out.
                    debug!(server = %self.name, stale, "dropping stale response");
                }
                None => {
                    if let Some(method) = &response.method {
                        debug!(server = %self.name, method = %method, "server notification");
                    }
                }
            }
        }
    }

    /// Fire-and-forget notification (no id, no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.transport.send(&notification.to_string()).await
    }
}
