use crate::SandboxHost;
use crate::host::{ControlCommand, ControlOutcome, ReceiveOutcome};
use crate::host_page::{HostPageUrls, render_host_page};
use axum::extract::State as AxumState;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use livepane_core::{Envelope, HostMessage};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard};

pub const SANDBOX_PATH: &str = "/__livepane/sandbox";
pub const EVENTS_PATH: &str = "/__livepane/events";
pub const CONTROL_PATH: &str = "/__livepane/control";

/// Serves one [`SandboxHost`]: the host page, the sandbox document, and
/// the two JSON endpoints the host page relays messages through.
#[derive(Clone)]
pub struct AxumPreviewAdapter {
    host: Arc<Mutex<SandboxHost>>,
    reload_ws: Option<String>,
}

impl AxumPreviewAdapter {
    pub fn new(host: Arc<Mutex<SandboxHost>>) -> Self {
        Self {
            host,
            reload_ws: None,
        }
    }

    /// Lets the host page reload the frame when the socket reports a new
    /// version.
    pub fn with_reload_socket(mut self, path: impl Into<String>) -> Self {
        self.reload_ws = Some(path.into());
        self
    }

    pub fn host(&self) -> Arc<Mutex<SandboxHost>> {
        Arc::clone(&self.host)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(route_host_page))
            .route(SANDBOX_PATH, get(route_sandbox))
            .route(EVENTS_PATH, post(route_events))
            .route(CONTROL_PATH, post(route_control))
            .with_state(self.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SandboxHost>, Response> {
        self.host.lock().map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to lock preview host",
            )
                .into_response()
        })
    }

    pub fn host_page_response(&self) -> Response {
        let title = match self.lock() {
            Ok(host) => host.config().title.clone(),
            Err(resp) => return resp,
        };
        let urls = HostPageUrls {
            sandbox: SANDBOX_PATH,
            events: EVENTS_PATH,
            control: CONTROL_PATH,
            reload_ws: self.reload_ws.as_deref(),
        };
        Html(render_host_page(&title, &urls)).into_response()
    }

    pub fn sandbox_response(&self) -> Response {
        let host = match self.lock() {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let Some(document) = host.document() else {
            return (StatusCode::NOT_FOUND, "no preview loaded").into_response();
        };
        let mut response = Html(document.html.clone()).into_response();
        let headers = response.headers_mut();
        if let Ok(v) = HeaderValue::from_str(&document.generation.to_string()) {
            headers.insert("x-livepane-generation", v);
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }

    /// Runs one raw frame message through the session.
    pub fn events_response(&self, raw: &str) -> Response {
        let outcome = match self.lock() {
            Ok(mut host) => host.receive_json(raw),
            Err(resp) => return resp,
        };
        for event in &outcome.events {
            tracing::info!(event = ?event, "preview event");
        }
        Json(receive_body(&outcome)).into_response()
    }

    pub fn control_response(&self, command: ControlCommand) -> Response {
        tracing::debug!(command = ?command, "control command");
        let outcome = match self.lock() {
            Ok(mut host) => host.control(command),
            Err(resp) => return resp,
        };
        for event in &outcome.events {
            tracing::info!(event = ?event, "preview event");
        }
        Json(control_body(&outcome)).into_response()
    }
}

async fn route_host_page(AxumState(adapter): AxumState<AxumPreviewAdapter>) -> Response {
    adapter.host_page_response()
}

async fn route_sandbox(AxumState(adapter): AxumState<AxumPreviewAdapter>) -> Response {
    adapter.sandbox_response()
}

async fn route_events(AxumState(adapter): AxumState<AxumPreviewAdapter>, body: String) -> Response {
    adapter.events_response(&body)
}

async fn route_control(
    AxumState(adapter): AxumState<AxumPreviewAdapter>,
    Json(command): Json<ControlCommand>,
) -> Response {
    adapter.control_response(command)
}

fn envelopes(send: &[Envelope<HostMessage>]) -> Vec<Value> {
    send.iter()
        .filter_map(|env| match env.to_value() {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode host message");
                None
            }
        })
        .collect()
}

fn receive_body(outcome: &ReceiveOutcome) -> Value {
    json!({
        "send": envelopes(&outcome.send),
        "events": outcome.events,
    })
}

fn control_body(outcome: &ControlOutcome) -> Value {
    json!({
        "send": envelopes(&outcome.send),
        "reload": outcome.reload,
        "events": outcome.events,
    })
}
