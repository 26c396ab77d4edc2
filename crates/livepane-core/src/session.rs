//! Host-side state for one preview instance.
//!
//! Inspector and edit toggles live here, per instance, instead of in
//! sandbox globals, so several previews can coexist. The session owns the
//! generation counter: every rebuilt document gets a new generation and
//! messages from older documents are dropped.

use crate::error::{PreviewError, RecoveryAction};
use crate::pages::normalize_route_path;
use crate::protocol::{
    ElementSelection, Envelope, HostMessage, ProtocolError, SANDBOX_SOURCE, SandboxMessage,
};
use serde::Serialize;

/// Per-attempt render state: `Idle -> Loading -> Rendered | Fallback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Loading,
    Rendered { path: String },
    Fallback(PreviewError),
}

/// Outputs forwarded to collaborators (inspector panel, recovery panel,
/// edit commit path, export).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PreviewEvent {
    Selected(ElementSelection),
    Failed(PreviewError),
    TextEdited { old_text: String, new_text: String },
    ScreenshotCaptured { data_url: String },
    ScreenshotFailed { message: String },
    RecoveryRequested { action: RecoveryAction },
    Navigated { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    Event(PreviewEvent),
    Send(Envelope<HostMessage>),
}

#[derive(Debug, Clone)]
pub struct PreviewSession {
    generation: u64,
    state: RenderState,
    inspector_enabled: bool,
    edit_enabled: bool,
    sandbox_ready: bool,
}

impl Default for PreviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewSession {
    pub fn new() -> Self {
        Self {
            generation: 0,
            state: RenderState::Idle,
            inspector_enabled: false,
            edit_enabled: false,
            sandbox_ready: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn inspector_enabled(&self) -> bool {
        self.inspector_enabled
    }

    pub fn edit_enabled(&self) -> bool {
        self.edit_enabled
    }

    pub fn sandbox_ready(&self) -> bool {
        self.sandbox_ready
    }

    /// Starts a new render attempt for a freshly built document.
    pub fn begin_generation(&mut self) -> u64 {
        self.generation += 1;
        self.state = RenderState::Loading;
        self.sandbox_ready = false;
        self.generation
    }

    /// Records a failure detected on the host side (size guard, truncation)
    /// without waiting for the sandbox.
    pub fn fail(&mut self, error: PreviewError) -> PreviewEvent {
        self.state = RenderState::Fallback(error.clone());
        PreviewEvent::Failed(error)
    }

    pub fn set_inspector_mode(&mut self, enabled: bool) -> Envelope<HostMessage> {
        self.inspector_enabled = enabled;
        self.outgoing(HostMessage::InspectorMode { enabled })
    }

    pub fn set_edit_mode(&mut self, enabled: bool) -> Envelope<HostMessage> {
        self.edit_enabled = enabled;
        self.outgoing(HostMessage::EditMode { enabled })
    }

    /// No timeout is kept; the sandbox answers with a capture or a failure.
    pub fn request_screenshot(&self) -> Envelope<HostMessage> {
        self.outgoing(HostMessage::CaptureScreenshot)
    }

    pub fn navigate(&self, path: &str) -> Envelope<HostMessage> {
        self.outgoing(HostMessage::Navigate {
            path: normalize_route_path(path),
        })
    }

    fn outgoing(&self, message: HostMessage) -> Envelope<HostMessage> {
        Envelope::host(self.generation, message)
    }

    pub fn receive(&mut self, envelope: Envelope<SandboxMessage>) -> Vec<SessionOutput> {
        if envelope.generation != self.generation {
            tracing::debug!(
                message_generation = envelope.generation,
                current_generation = self.generation,
                kind = envelope.message.kind(),
                "dropping message from stale sandbox"
            );
            return Vec::new();
        }

        match envelope.message {
            SandboxMessage::Ready => {
                self.sandbox_ready = true;
                let mut replay = Vec::new();
                if self.inspector_enabled {
                    replay.push(SessionOutput::Send(
                        self.outgoing(HostMessage::InspectorMode { enabled: true }),
                    ));
                }
                if self.edit_enabled {
                    replay.push(SessionOutput::Send(
                        self.outgoing(HostMessage::EditMode { enabled: true }),
                    ));
                }
                replay
            }
            SandboxMessage::Rendered { path } => {
                self.state = RenderState::Rendered { path };
                Vec::new()
            }
            SandboxMessage::Navigated { path } => {
                if let RenderState::Rendered { path: current } = &mut self.state {
                    current.clone_from(&path);
                }
                vec![SessionOutput::Event(PreviewEvent::Navigated { path })]
            }
            SandboxMessage::PreviewError(error) => {
                if self.state == RenderState::Fallback(error.clone()) {
                    tracing::debug!(kind = %error.kind, "duplicate preview error ignored");
                    return Vec::new();
                }
                tracing::warn!(kind = %error.kind, line = ?error.line, "preview failed: {}", error.message);
                vec![SessionOutput::Event(self.fail(error))]
            }
            SandboxMessage::ElementSelected(selection) => {
                vec![SessionOutput::Event(PreviewEvent::Selected(selection))]
            }
            SandboxMessage::TextEdited { old_text, new_text } => {
                vec![SessionOutput::Event(PreviewEvent::TextEdited {
                    old_text,
                    new_text,
                })]
            }
            SandboxMessage::ScreenshotCaptured { data_url } => {
                vec![SessionOutput::Event(PreviewEvent::ScreenshotCaptured {
                    data_url,
                })]
            }
            SandboxMessage::ScreenshotFailed { message } => {
                vec![SessionOutput::Event(PreviewEvent::ScreenshotFailed {
                    message,
                })]
            }
            SandboxMessage::RecoveryRequested { action } => {
                vec![SessionOutput::Event(PreviewEvent::RecoveryRequested { action })]
            }
        }
    }

    /// Decodes and handles one raw message. Anything that is not ours, or
    /// not valid, is logged and ignored.
    pub fn receive_json(&mut self, raw: &str) -> Vec<SessionOutput> {
        match Envelope::from_json(raw, SANDBOX_SOURCE) {
            Ok(envelope) => self.receive(envelope),
            Err(ProtocolError::ForeignSource(source)) => {
                tracing::trace!(%source, "ignoring foreign message");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "undecodable sandbox message");
                Vec::new()
            }
        }
    }
}
