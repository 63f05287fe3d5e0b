//! Wire types for the bridge sidecar.
//!
//! One JSON-RPC 2.0 message per line in both directions.

use crate::error::{ProbeError, Result};
use crate::types::{ConnectionEvent, InboundEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcMessage {
    pub fn request(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::Number(id.into())),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn is_response(&self) -> bool {
        self.id.is_some() && self.method.is_none()
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }

    pub fn id_u64(&self) -> Option<u64> {
        self.id.as_ref()?.as_u64()
    }

    /// Encodes the message as one line, newline included.
    pub fn to_line(&self) -> Result<String> {
        let mut line =
            serde_json::to_string(self).map_err(|e| ProbeError::Serialization(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| ProbeError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct InitializeParams {
    pub headless: bool,
}

#[derive(Debug, Serialize)]
pub struct SendMessageParams<'a> {
    pub to: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenChatParams<'a> {
    pub chat_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SearchChatParams<'a> {
    pub query: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ScanChatListParams<'a> {
    pub hint: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SetZoomParams {
    pub factor: f32,
}

/// Result of `screenshot`: base64-encoded PNG.
#[derive(Debug, Deserialize)]
pub struct ScreenshotResult {
    pub png: String,
}

/// A notification pushed by the sidecar.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Inbound(InboundEvent),
    Connection(ConnectionEvent),
}

#[derive(Deserialize)]
struct QrParams {
    code: String,
}

#[derive(Deserialize)]
struct AuthFailureParams {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct DisconnectedParams {
    #[serde(default)]
    reason: String,
}

impl Notification {
    /// Decodes a notification. Unknown methods yield `Ok(None)`.
    pub fn parse(method: &str, params: Option<Value>) -> Result<Option<Self>> {
        let params = params
            .filter(|p| !p.is_null())
            .unwrap_or_else(|| Value::Object(Default::default()));
        let decode = |e: serde_json::Error| {
            ProbeError::Serialization(format!("bad {method} notification: {e}"))
        };
        let notification = match method {
            "message" => Self::Inbound(serde_json::from_value(params).map_err(decode)?),
            "qr" => {
                let p: QrParams = serde_json::from_value(params).map_err(decode)?;
                Self::Connection(ConnectionEvent::Qr(p.code))
            }
            "ready" => Self::Connection(ConnectionEvent::Ready),
            "authFailure" => {
                let p: AuthFailureParams = serde_json::from_value(params).map_err(decode)?;
                Self::Connection(ConnectionEvent::AuthFailure(p.message))
            }
            "disconnected" => {
                let p: DisconnectedParams = serde_json::from_value(params).map_err(decode)?;
                Self::Connection(ConnectionEvent::Disconnected(p.reason))
            }
            _ => return Ok(None),
        };
        Ok(Some(notification))
    }
}
