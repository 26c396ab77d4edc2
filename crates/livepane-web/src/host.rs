//! One preview instance on the host side: input, compiled registry, the
//! current document and the session that talks to it.

use crate::config::PreviewConfig;
use crate::document::{SandboxDocument, build_document};
use livepane_core::{
    Envelope, HostMessage, PageRegistry, PageSource, PreviewEvent, PreviewSession, SessionOutput,
};
use serde::{Deserialize, Serialize};

/// What the preview shows. Multi-page input takes precedence whenever it is
/// present, even with a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PreviewInput {
    Single {
        source: String,
    },
    Pages {
        pages: Vec<PageSource>,
        #[serde(default)]
        current_page_id: Option<String>,
    },
}

impl PreviewInput {
    fn page_sources(&self) -> Vec<PageSource> {
        match self {
            Self::Single { source } => vec![PageSource::single(source.clone())],
            Self::Pages { pages, .. } => pages.clone(),
        }
    }

    fn current_page_id(&self) -> Option<&str> {
        match self {
            Self::Single { .. } => None,
            Self::Pages {
                current_page_id, ..
            } => current_page_id.as_deref(),
        }
    }
}

/// Toolbar and API commands from the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ControlCommand {
    InspectorMode { enabled: bool },
    EditMode { enabled: bool },
    CaptureScreenshot,
    Navigate { path: String },
    Refresh,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlOutcome {
    pub send: Vec<Envelope<HostMessage>>,
    /// The document was rebuilt; the frame must reload it.
    pub reload: bool,
    /// Failures detected on the host while rebuilding. The reloaded frame
    /// reports the same error again, which the session drops as a repeat.
    pub events: Vec<PreviewEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveOutcome {
    pub send: Vec<Envelope<HostMessage>>,
    pub events: Vec<PreviewEvent>,
}

pub struct SandboxHost {
    config: PreviewConfig,
    session: PreviewSession,
    input: Option<PreviewInput>,
    registry: PageRegistry,
    document: Option<SandboxDocument>,
}

impl SandboxHost {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            config,
            session: PreviewSession::new(),
            input: None,
            registry: PageRegistry::default(),
            document: None,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Takes effect on the next rebuild. The session and its generation
    /// counter are kept.
    pub fn set_config(&mut self, config: PreviewConfig) {
        self.config = config;
    }

    pub fn session(&self) -> &PreviewSession {
        &self.session
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn document(&self) -> Option<&SandboxDocument> {
        self.document.as_ref()
    }

    /// Replaces the input and rebuilds the whole document under a new
    /// generation. Returns the failure event when the page shown first was
    /// rejected before execution.
    pub fn load(&mut self, input: PreviewInput) -> Option<PreviewEvent> {
        self.input = Some(input);
        self.rebuild()
    }

    /// Rebuilds from the current input, e.g. after a regenerate request.
    pub fn refresh(&mut self) -> Option<PreviewEvent> {
        if self.input.is_none() {
            return None;
        }
        self.rebuild()
    }

    fn rebuild(&mut self) -> Option<PreviewEvent> {
        let input = self.input.as_ref()?;
        let registry = PageRegistry::build(&input.page_sources(), &self.config.compile_options());
        let initial_path = input
            .current_page_id()
            .and_then(|id| registry.path_for_page_id(id))
            .unwrap_or("/")
            .to_string();

        let generation = self.session.begin_generation();
        let document = build_document(&registry, &self.config, generation, &initial_path);
        tracing::info!(
            generation,
            bytes = document.len(),
            pages = document.page_count,
            rejected = document.rejected.len(),
            "sandbox document built"
        );

        let first_error = registry
            .resolve_route(None, Some(&initial_path))
            .and_then(|entry| entry.unit.error().cloned());
        self.registry = registry;
        self.document = Some(document);
        first_error.map(|error| self.session.fail(error))
    }

    pub fn set_inspector_mode(&mut self, enabled: bool) -> Envelope<HostMessage> {
        self.session.set_inspector_mode(enabled)
    }

    pub fn set_edit_mode(&mut self, enabled: bool) -> Envelope<HostMessage> {
        self.session.set_edit_mode(enabled)
    }

    pub fn request_screenshot(&self) -> Envelope<HostMessage> {
        self.session.request_screenshot()
    }

    pub fn navigate(&self, path: &str) -> Envelope<HostMessage> {
        self.session.navigate(path)
    }

    pub fn control(&mut self, command: ControlCommand) -> ControlOutcome {
        match command {
            ControlCommand::InspectorMode { enabled } => ControlOutcome {
                send: vec![self.set_inspector_mode(enabled)],
                ..ControlOutcome::default()
            },
            ControlCommand::EditMode { enabled } => ControlOutcome {
                send: vec![self.set_edit_mode(enabled)],
                ..ControlOutcome::default()
            },
            ControlCommand::CaptureScreenshot => ControlOutcome {
                send: vec![self.request_screenshot()],
                ..ControlOutcome::default()
            },
            ControlCommand::Navigate { path } => ControlOutcome {
                send: vec![self.navigate(&path)],
                ..ControlOutcome::default()
            },
            ControlCommand::Refresh => ControlOutcome {
                reload: self.input.is_some(),
                events: self.refresh().into_iter().collect(),
                ..ControlOutcome::default()
            },
        }
    }

    /// Feeds one raw message from the frame into the session.
    pub fn receive_json(&mut self, raw: &str) -> ReceiveOutcome {
        let mut outcome = ReceiveOutcome::default();
        for output in self.session.receive_json(raw) {
            match output {
                SessionOutput::Send(envelope) => outcome.send.push(envelope),
                SessionOutput::Event(event) => outcome.events.push(event),
            }
        }
        outcome
    }
}
