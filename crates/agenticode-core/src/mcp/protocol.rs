//! Wire types for the external-tool protocol (JSON-RPC 2.0).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request.
#[derive(Debug, Serialize)]
pub struct McpRequest {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpRequest {
    pub fn new(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response (or server-initiated notification).
#[derive(Debug, Deserialize)]
pub struct McpResponse {
    pub id: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<McpError>,
    /// Set on notifications.
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
}

/// Remote tool definition from `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Content parts returned by `tools/call`. Only the `text` variant feeds
/// back into the conversation; other kinds are carried for completeness and
/// skipped when assembling tool output.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(default)]
        text: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<McpToolDef>,
}

#[derive(Debug, Serialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<McpContent>,
    #[serde(default)]
    pub is_error: bool,
}

/// Concatenate the `text` parts of a tool reply, newline-separated.
/// Non-text parts (images, resources) do not reach the model.
pub fn text_content(result: &ToolCallResult) -> String {
    result
        .content
        .iter()
        .filter_map(|part| match part {
            McpContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_serialize_as_json_rpc() {
        let request = McpRequest::new(7, "tools/list", None);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "tools/list");
        assert!(json.get("params").is_none());
    }

    #[test]
    fn tool_reply_text_parts_concatenate() {
        let result: ToolCallResult = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "one"}, {"type": "text", "text": "two"}]}"#,
        )
        .unwrap();
        assert_eq!(text_content(&result), "one\ntwo");
        assert!(!result.is_error);
    }

    #[test]
    fn non_text_parts_are_skipped() {
        let result: ToolCallResult = serde_json::from_str(
            r#"{"content": [
                {"type": "text", "text": "caption"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "resource", "uri": "file:///tmp/x"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(text_content(&result), "caption");
    }

    #[test]
    fn error_responses_deserialize() {
        let response: McpResponse =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "no such method"}}"#)
                .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "no such method");
    }
}
