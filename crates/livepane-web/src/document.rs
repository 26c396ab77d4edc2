//! Sandbox document assembly.
//!
//! A document is plain string assembly: head (optional utility CSS CDN and
//! the base/fallback stylesheet), a mount point, then four scripts in a
//! fixed order:
//!
//! 1. bootstrap: `window.__LIVEPANE__ = {...}` with compiled pages, the
//!    dependency manifest and the protocol constants,
//! 2. shims for optional libraries,
//! 3. the message bridge (error capture, inspector, edit mode, screenshots),
//! 4. the runtime (library loading, evaluation, router).
//!
//! Documents are never patched. A change means a new generation and a new
//! document.

use crate::config::{PreviewConfig, TAILWIND_CDN};
use crate::minify::minify_js;
use crate::{SANDBOX_BRIDGE_JS, SANDBOX_RUNTIME_JS, SHIMS_JS};
use livepane_core::protocol::{HOST_SOURCE, PROTOCOL_VERSION, SANDBOX_SOURCE};
use livepane_core::{PageRegistry, PreviewError, PreviewErrorKind};
use serde_json::{Map, Value, json};
use std::hash::{DefaultHasher, Hash, Hasher};

pub const MOUNT_ID: &str = "livepane-root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxDocument {
    pub generation: u64,
    pub html: String,
    pub fingerprint: String,
    pub page_count: usize,
    /// Pages rejected before execution, by path.
    pub rejected: Vec<(String, PreviewError)>,
}

impl SandboxDocument {
    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

fn base_css() -> &'static str {
    r#"
html, body {
  margin: 0;
  padding: 0;
  width: 100%;
  min-height: 100%;
}

#livepane-root {
  min-height: 100vh;
}

.livepane-fallback {
  box-sizing: border-box;
  min-height: 100vh;
  display: flex;
  align-items: center;
  justify-content: center;
  padding: 32px;
  font-family: Inter, system-ui, sans-serif;
  color: #0f172a;
  background: #f8fafc;
}

.livepane-fallback__panel {
  max-width: 520px;
  width: 100%;
  border: 1px solid #e2e8f0;
  border-radius: 14px;
  background: #ffffff;
  padding: 24px;
  box-shadow: 0 10px 30px rgba(15, 23, 42, 0.08);
}

.livepane-fallback__title {
  margin: 0 0 8px;
  font-size: 18px;
  font-weight: 600;
}

.livepane-fallback__message {
  margin: 0 0 8px;
  font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
  font-size: 13px;
  color: #b91c1c;
  white-space: pre-wrap;
  word-break: break-word;
}

.livepane-fallback__hint {
  margin: 0 0 16px;
  color: #64748b;
  font-size: 14px;
}

.livepane-fallback__actions {
  display: flex;
  gap: 8px;
  flex-wrap: wrap;
}

.livepane-fallback__actions button {
  font: inherit;
  font-size: 14px;
  font-weight: 600;
  border: 1px solid #2563eb;
  border-radius: 10px;
  background: #2563eb;
  color: #ffffff;
  padding: 8px 14px;
  cursor: pointer;
}

.livepane-fallback__actions button:hover {
  background: #1d4ed8;
  border-color: #1d4ed8;
}

[data-livepane-hover] {
  outline: 2px dashed #2563eb !important;
  outline-offset: 2px;
  cursor: crosshair !important;
}

[data-livepane-selected] {
  outline: 2px solid #2563eb !important;
  outline-offset: 2px;
}

[data-livepane-editing] {
  outline: 2px solid #16a34a !important;
  outline-offset: 2px;
}
"#
}

/// Titles, hints and recovery actions per error kind, keyed by kind.
fn recovery_table() -> Value {
    let mut table = Map::new();
    for kind in PreviewErrorKind::ALL {
        let actions: Vec<Value> = kind
            .recovery_actions()
            .iter()
            .map(|a| json!({"action": a, "label": a.label()}))
            .collect();
        table.insert(
            kind.as_str().to_string(),
            json!({"title": kind.title(), "hint": kind.hint(), "actions": actions}),
        );
    }
    Value::Object(table)
}

/// Serializes a value for embedding in an inline `<script>`. `<` is escaped
/// so page source can never close the script element.
pub fn script_json(value: &Value) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

pub fn bootstrap_value(
    registry: &PageRegistry,
    config: &PreviewConfig,
    generation: u64,
    initial_path: &str,
) -> Value {
    json!({
        "protocol": {
            "version": PROTOCOL_VERSION,
            "source": SANDBOX_SOURCE,
            "hostSource": HOST_SOURCE,
        },
        "generation": generation,
        "mountId": MOUNT_ID,
        "timeoutMs": config.dependency_timeout_ms,
        "libraries": config.libraries,
        "screenshotLibrary": config.screenshot_library,
        "router": registry.len() > 1,
        "initialPath": initial_path,
        "pages": registry.entries(),
        "recovery": recovery_table(),
    })
}

pub fn build_document(
    registry: &PageRegistry,
    config: &PreviewConfig,
    generation: u64,
    initial_path: &str,
) -> SandboxDocument {
    let bootstrap = bootstrap_value(registry, config, generation, initial_path);
    let scripts = [SHIMS_JS, SANDBOX_BRIDGE_JS, SANDBOX_RUNTIME_JS];

    let mut html = String::with_capacity(64 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<meta name=\"livepane-generation\" content=\"{generation}\">\n"
    ));
    html.push_str(&format!("<title>{}</title>\n", escape_html(&config.title)));
    if config.tailwind {
        html.push_str(&format!("<script src=\"{TAILWIND_CDN}\"></script>\n"));
    }
    html.push_str(&format!("<style>{}</style>\n", base_css()));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<div id=\"{MOUNT_ID}\"></div>\n"));
    html.push_str(&format!(
        "<script>window.__LIVEPANE__ = {};</script>\n",
        script_json(&bootstrap)
    ));
    for script in scripts {
        let body = if config.minify_runtime {
            minify_js(script)
        } else {
            script.to_string()
        };
        html.push_str(&format!("<script>{body}</script>\n"));
    }
    html.push_str("</body>\n</html>\n");

    let mut hasher = DefaultHasher::new();
    html.hash(&mut hasher);
    let fingerprint = format!("{:016x}", hasher.finish());

    let rejected = registry
        .entries()
        .iter()
        .filter_map(|e| e.unit.error().map(|err| (e.path.clone(), err.clone())))
        .collect();

    SandboxDocument {
        generation,
        html,
        fingerprint,
        page_count: registry.len(),
        rejected,
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use livepane_core::{CompileOptions, PageSource};

    fn single(source: &str) -> PageRegistry {
        PageRegistry::build(&[PageSource::single(source)], &CompileOptions::default())
    }

    #[test]
    fn test_script_json_cannot_close_script() {
        let value = json!({"code": "</script><script>alert(1)</script>"});
        let out = script_json(&value);
        assert!(!out.contains("</script>"));
        assert!(out.contains("\\u003c/script>"));
    }

    #[test]
    fn test_recovery_table_covers_every_kind() {
        let table = recovery_table();
        for kind in PreviewErrorKind::ALL {
            let entry = &table[kind.as_str()];
            assert!(entry["title"].is_string());
            assert!(!entry["actions"].as_array().map(Vec::is_empty).unwrap_or(true));
        }
    }

    #[test]
    fn test_title_is_escaped() {
        let config = PreviewConfig {
            title: "<b>Tom & Jerry</b>".to_string(),
            ..PreviewConfig::default()
        };
        let doc = build_document(&single("function App() { return null; }"), &config, 1, "/");
        assert!(doc.html.contains("<title>&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;</title>"));
    }

    #[test]
    fn test_fingerprint_tracks_generation() {
        let registry = single("function App() { return null; }");
        let config = PreviewConfig::default();
        let a = build_document(&registry, &config, 1, "/");
        let b = build_document(&registry, &config, 1, "/");
        let c = build_document(&registry, &config, 2, "/");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 16);
    }

    #[test]
    fn test_tailwind_toggle() {
        let registry = single("function App() { return null; }");
        let on = build_document(&registry, &PreviewConfig::default(), 1, "/");
        assert!(on.html.contains(TAILWIND_CDN));
        let config = PreviewConfig {
            tailwind: false,
            ..PreviewConfig::default()
        };
        let off = build_document(&registry, &config, 1, "/");
        assert!(!off.html.contains(TAILWIND_CDN));
    }
}
