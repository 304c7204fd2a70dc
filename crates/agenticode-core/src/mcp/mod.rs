//! External tool servers: out-of-process tool providers reached over
//! stdio, streamable HTTP, or SSE.

pub mod client;
pub mod config;
pub mod manager;
pub mod protocol;
pub mod tool;
pub mod transport;

pub use client::McpClient;
pub use config::{McpServerConfig, McpTransportType};
pub use manager::{ClientManager, ClientState, ClientStatus};
pub use protocol::{McpContent, McpToolDef};
pub use tool::{register_mcp_tools, McpTool};
pub use transport::{HttpTransport, McpTransport, SseTransport, StdioTransport};
