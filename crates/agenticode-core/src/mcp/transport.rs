//! Transports for external tool servers: stdio, streamable HTTP, and SSE.
//!
//! A transport moves one JSON frame at a time in each direction; the client
//! above it owns request/response correlation. All three variants normalize
//! to newline-delimited frames so the client never cares which one it is
//! talking through.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// A bidirectional frame pipe to one server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
    async fn receive(&self) -> Result<String>;
    async fn is_alive(&self) -> bool;
}

// ── stdio ──────────────────────────────────────────────────────────────

/// Spawned child process; frames are newline-delimited JSON on its stdio.
#[derive(Debug)]
pub struct StdioTransport {
    writer: Mutex<ChildStdin>,
    reader: Mutex<Lines<BufReader<ChildStdout>>>,
    child: Mutex<Child>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        working_dir: &Path,
    ) -> Result<Self> {
        tracing::info!(command, ?args, "starting external tool server");

        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    anyhow!("command not found: {}. Is it installed and in PATH?", command)
                }
                _ => anyhow!("could not start '{}': {}", command, e),
            })?;

        let writer = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("child has no stdin pipe"))?;
        let reader = child
            .stdout
            .take()
            .map(|out| BufReader::new(out).lines())
            .ok_or_else(|| anyhow!("child has no stdout pipe"))?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            child: Mutex::new(child),
        })
    }

    /// Explain an EOF on stdout in terms of the child's fate.
    async fn eof_reason(&self) -> anyhow::Error {
        match self.child.lock().await.try_wait() {
            Ok(Some(status)) => anyhow!("server exited with {}", status),
            Ok(None) => anyhow!("server closed stdout but is still running"),
            Err(e) => anyhow!("server state unknown: {}", e),
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send(&self, message: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .context("write to server stdin failed")?;
        writer.flush().await.context("flush to server stdin failed")?;
        Ok(())
    }

    async fn receive(&self) -> Result<String> {
        let mut reader = self.reader.lock().await;
        loop {
            let Some(line) = reader.next_line().await? else {
                return Err(self.eof_reason().await);
            };
            let line = line.trim();
            // Servers occasionally print banners or progress on stdout;
            // only object frames belong to the protocol.
            if line.starts_with('{') {
                return Ok(line.to_owned());
            }
            if !line.is_empty() {
                debug!(line, "ignoring non-protocol stdout line");
            }
        }
    }

    async fn is_alive(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }
}

// ── streamable HTTP ────────────────────────────────────────────────────

/// POSTs each frame to the endpoint; frames in response bodies queue up for
/// `receive`. One body may carry several newline-delimited frames.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    inbox_tx: mpsc::UnboundedSender<String>,
    inbox_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl HttpTransport {
    pub fn new(url: String, headers: HashMap<String, String>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            client: reqwest::Client::new(),
            url,
            headers,
            inbox_tx,
            inbox_rx: Mutex::new(inbox_rx),
        }
    }

    fn apply_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        request
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .apply_headers(self.client.post(&self.url))
            .header("Content-Type", "application/json")
            .body(message.to_string())
            .send()
            .await
            .context("transport POST failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("server returned {}: {}", status, body));
        }

        for line in body.lines() {
            let line = line.trim();
            // Streamable responses may frame messages as SSE data lines.
            let line = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
            if line.starts_with('{') {
                let _ = self.inbox_tx.send(line.to_string());
            }
        }
        Ok(())
    }

    async fn receive(&self) -> Result<String> {
        self.inbox_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| anyhow!("transport closed"))
    }

    async fn is_alive(&self) -> bool {
        true
    }
}

// ── SSE ────────────────────────────────────────────────────────────────

/// Server-sent events: a long-lived GET stream carries server → client
/// frames; client → server frames POST to the same endpoint.
pub struct SseTransport {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    inbox_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl SseTransport {
    /// Connect: opens the GET event stream and starts pumping frames.
    pub async fn connect(url: String, headers: HashMap<String, String>) -> Result<Self> {
        let client = reqwest::Client::new();

        let mut request = client.get(&url).header("Accept", "text/event-stream");
        for (key, value) in &headers {
            request = request.header(key, value);
        }
        let response = request.send().await.context("SSE connect failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("SSE endpoint returned {}", response.status()));
        }

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = stream.next().await {
                let Ok(chunk) = chunk else { break };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data:") {
                        let data = data.trim();
                        if data.starts_with('{') && inbox_tx.send(data.to_string()).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Self {
            client,
            url,
            headers,
            inbox_rx: Mutex::new(inbox_rx),
        })
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn send(&self, message: &str) -> Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        let response = request
            .body(message.to_string())
            .send()
            .await
            .context("SSE POST failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("server returned {}", response.status()));
        }
        Ok(())
    }

    async fn receive(&self) -> Result<String> {
        self.inbox_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| anyhow!("event stream closed"))
    }

    async fn is_alive(&self) -> bool {
        true
    }
}
