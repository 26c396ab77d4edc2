//! Typed host/sandbox message protocol.
//!
//! Every message travels inside an envelope:
//!
//! ```json
//! {"source": "livepane-sandbox", "v": 1, "generation": 3, "type": "rendered", "path": "/"}
//! ```
//!
//! `source` tells our messages apart from anything else posted to the
//! window, `v` is the protocol version, and `generation` identifies the
//! sandbox document that produced or should consume the message. The
//! message body is an internally tagged enum flattened next to those keys.
//!
//! Messages are fire-and-forget. Nothing here waits for a reply.

use crate::error::{PreviewError, RecoveryAction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;
pub const SANDBOX_SOURCE: &str = "livepane-sandbox";
pub const HOST_SOURCE: &str = "livepane-host";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputedStyles {
    pub color: String,
    pub background_color: String,
    pub font_size: String,
    pub font_weight: String,
    pub padding: String,
    pub margin: String,
}

/// Snapshot of a DOM node taken when it was clicked in inspector mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSelection {
    pub tag_name: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub computed_styles: ComputedStyles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

/// Host to sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum HostMessage {
    InspectorMode { enabled: bool },
    EditMode { enabled: bool },
    CaptureScreenshot,
    Navigate { path: String },
}

/// Sandbox to host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum SandboxMessage {
    /// The bridge is installed and listening.
    Ready,
    Rendered { path: String },
    Navigated { path: String },
    ElementSelected(ElementSelection),
    PreviewError(PreviewError),
    TextEdited { old_text: String, new_text: String },
    ScreenshotCaptured { data_url: String },
    ScreenshotFailed { message: String },
    RecoveryRequested { action: RecoveryAction },
}

impl SandboxMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxMessage::Ready => "ready",
            SandboxMessage::Rendered { .. } => "rendered",
            SandboxMessage::Navigated { .. } => "navigated",
            SandboxMessage::ElementSelected(_) => "element-selected",
            SandboxMessage::PreviewError(_) => "preview-error",
            SandboxMessage::TextEdited { .. } => "text-edited",
            SandboxMessage::ScreenshotCaptured { .. } => "screenshot-captured",
            SandboxMessage::ScreenshotFailed { .. } => "screenshot-failed",
            SandboxMessage::RecoveryRequested { .. } => "recovery-requested",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("message from foreign source {0:?}")]
    ForeignSource(String),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u64),
    #[error("message is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<M> {
    pub source: String,
    pub version: u32,
    pub generation: u64,
    pub message: M,
}

impl Envelope<HostMessage> {
    pub fn host(generation: u64, message: HostMessage) -> Self {
        Self {
            source: HOST_SOURCE.to_string(),
            version: PROTOCOL_VERSION,
            generation,
            message,
        }
    }
}

impl Envelope<SandboxMessage> {
    pub fn sandbox(generation: u64, message: SandboxMessage) -> Self {
        Self {
            source: SANDBOX_SOURCE.to_string(),
            version: PROTOCOL_VERSION,
            generation,
            message,
        }
    }
}

impl<M: Serialize> Envelope<M> {
    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        let body = serde_json::to_value(&self.message)
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Value::Object(fields) = body else {
            return Err(ProtocolError::Malformed(
                "message body is not an object".to_string(),
            ));
        };
        let mut out = Map::new();
        out.insert("source".into(), Value::from(self.source.as_str()));
        out.insert("v".into(), Value::from(self.version));
        out.insert("generation".into(), Value::from(self.generation));
        out.extend(fields);
        Ok(Value::Object(out))
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(self.to_value()?.to_string())
    }
}

impl<M: DeserializeOwned> Envelope<M> {
    /// Decodes a message, rejecting anything not sent by `expected_source`
    /// or written for another protocol version.
    pub fn from_value(value: Value, expected_source: &str) -> Result<Self, ProtocolError> {
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::Malformed("expected a JSON object".to_string()));
        };
        let source = match fields.remove("source") {
            Some(Value::String(s)) => s,
            Some(other) => return Err(ProtocolError::ForeignSource(other.to_string())),
            None => return Err(ProtocolError::MissingField("source")),
        };
        if source != expected_source {
            return Err(ProtocolError::ForeignSource(source));
        }
        let version = fields
            .remove("v")
            .and_then(|v| v.as_u64())
            .ok_or(ProtocolError::MissingField("v"))?;
        if version != u64::from(PROTOCOL_VERSION) {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let generation = fields
            .remove("generation")
            .and_then(|v| v.as_u64())
            .ok_or(ProtocolError::MissingField("generation"))?;
        if !fields.contains_key("type") {
            return Err(ProtocolError::MissingField("type"));
        }
        let message = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok(Self {
            source,
            version: PROTOCOL_VERSION,
            generation,
            message,
        })
    }

    pub fn from_json(raw: &str, expected_source: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Self::from_value(value, expected_source)
    }
}
