use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure categories for a single render attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewErrorKind {
    TransformError,
    RuntimeError,
    ComponentNotFound,
    SizeLimit,
    DependencyLoad,
    Truncated,
}

/// Recovery affordances offered by the fallback panel. They are forwarded
/// to the generation collaborator, never handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryAction {
    ViewSource,
    Regenerate,
    QuickFix,
}

impl RecoveryAction {
    pub fn label(self) -> &'static str {
        match self {
            RecoveryAction::ViewSource => "View code",
            RecoveryAction::Regenerate => "Regenerate",
            RecoveryAction::QuickFix => "Quick fix",
        }
    }
}

impl PreviewErrorKind {
    pub const ALL: [PreviewErrorKind; 6] = [
        PreviewErrorKind::TransformError,
        PreviewErrorKind::RuntimeError,
        PreviewErrorKind::ComponentNotFound,
        PreviewErrorKind::SizeLimit,
        PreviewErrorKind::DependencyLoad,
        PreviewErrorKind::Truncated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PreviewErrorKind::TransformError => "transform-error",
            PreviewErrorKind::RuntimeError => "runtime-error",
            PreviewErrorKind::ComponentNotFound => "component-not-found",
            PreviewErrorKind::SizeLimit => "size-limit",
            PreviewErrorKind::DependencyLoad => "dependency-load",
            PreviewErrorKind::Truncated => "truncated",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PreviewErrorKind::TransformError => "This code could not be compiled",
            PreviewErrorKind::RuntimeError => "This page crashed while rendering",
            PreviewErrorKind::ComponentNotFound => "No component found to render",
            PreviewErrorKind::SizeLimit => "This page is too large to preview",
            PreviewErrorKind::DependencyLoad => "Preview libraries failed to load",
            PreviewErrorKind::Truncated => "The generated code looks incomplete",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            PreviewErrorKind::TransformError => "Edit the code or ask for a quick fix.",
            PreviewErrorKind::RuntimeError => "Edit the code or regenerate the page.",
            PreviewErrorKind::ComponentNotFound => {
                "Regenerate so the page declares a top-level component."
            }
            PreviewErrorKind::SizeLimit => "Ask for a simpler page or split it into sections.",
            PreviewErrorKind::DependencyLoad => "Check the network connection and refresh.",
            PreviewErrorKind::Truncated => {
                "Generation stopped early. Regenerate with a shorter or simpler request."
            }
        }
    }

    pub fn recovery_actions(self) -> &'static [RecoveryAction] {
        use RecoveryAction::*;
        match self {
            PreviewErrorKind::TransformError | PreviewErrorKind::RuntimeError => {
                &[ViewSource, Regenerate, QuickFix]
            }
            PreviewErrorKind::ComponentNotFound | PreviewErrorKind::Truncated => {
                &[ViewSource, Regenerate]
            }
            PreviewErrorKind::SizeLimit => &[ViewSource, Regenerate],
            PreviewErrorKind::DependencyLoad => &[Regenerate],
        }
    }
}

impl fmt::Display for PreviewErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one render attempt. Also travels over the message
/// protocol as the payload of `preview-error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PreviewError {
    pub kind: PreviewErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl PreviewError {
    pub fn new(kind: PreviewErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn size_limit(chars: usize, limit: usize) -> Self {
        Self::new(
            PreviewErrorKind::SizeLimit,
            format!("Source is {chars} characters; the preview limit is {limit}"),
        )
    }

    pub fn component_not_found() -> Self {
        Self::new(
            PreviewErrorKind::ComponentNotFound,
            "no component found: declare a capitalized function or const component",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_kebab_case() {
        for kind in PreviewErrorKind::ALL {
            let json = serde_json::to_string(&kind).expect("serialize kind");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_every_kind_offers_recovery() {
        for kind in PreviewErrorKind::ALL {
            assert!(!kind.recovery_actions().is_empty(), "{kind} has no recovery");
        }
    }

    #[test]
    fn test_line_is_omitted_when_absent() {
        let err = PreviewError::new(PreviewErrorKind::RuntimeError, "boom");
        let json = serde_json::to_value(&err).expect("serialize error");
        assert_eq!(
            json,
            serde_json::json!({"kind": "runtime-error", "message": "boom"})
        );
        assert_eq!(err.to_string(), "runtime-error: boom");
    }
}
