//! A minimal embedding page for local development: a toolbar, the
//! sandboxed frame and an event log. Real hosts embed the sandbox document
//! directly and speak the protocol themselves.

use crate::HOST_PAGE_JS;
use crate::document::escape_html;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPageUrls<'a> {
    pub sandbox: &'a str,
    pub events: &'a str,
    pub control: &'a str,
    /// Version socket; `None` disables automatic reloads.
    pub reload_ws: Option<&'a str>,
}

fn host_css() -> &'static str {
    r#"
* { box-sizing: border-box; }
body {
  margin: 0;
  height: 100vh;
  display: grid;
  grid-template-rows: auto 1fr;
  grid-template-columns: 1fr 320px;
  font-family: Inter, system-ui, sans-serif;
  color: #0f172a;
  background: #f1f5f9;
}
.lp-toolbar {
  grid-column: 1 / -1;
  display: flex;
  gap: 8px;
  align-items: center;
  padding: 10px 14px;
  border-bottom: 1px solid #e2e8f0;
  background: #ffffff;
}
.lp-toolbar h1 {
  font-size: 15px;
  margin: 0 12px 0 0;
}
.lp-toolbar button {
  font: inherit;
  font-size: 13px;
  border: 1px solid #cbd5e1;
  border-radius: 8px;
  background: #ffffff;
  padding: 6px 12px;
  cursor: pointer;
}
.lp-toolbar button[aria-pressed="true"] {
  background: #2563eb;
  border-color: #2563eb;
  color: #ffffff;
}
.lp-frame {
  width: 100%;
  height: 100%;
  border: 0;
  background: #ffffff;
}
.lp-events {
  overflow: auto;
  border-left: 1px solid #e2e8f0;
  background: #ffffff;
  padding: 12px;
  font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
  font-size: 12px;
}
.lp-events pre {
  margin: 0 0 8px;
  white-space: pre-wrap;
  word-break: break-word;
}
.lp-events img {
  max-width: 100%;
  border: 1px solid #e2e8f0;
}
"#
}

pub fn render_host_page(title: &str, urls: &HostPageUrls<'_>) -> String {
    let bootstrap = json!({
        "sandboxUrl": urls.sandbox,
        "eventsUrl": urls.events,
        "controlUrl": urls.control,
        "reloadWs": urls.reload_ws,
    });
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{css}</style>
</head>
<body>
<header class="lp-toolbar">
<h1>{title}</h1>
<button type="button" data-toggle="inspector-mode" aria-pressed="false">Inspector</button>
<button type="button" data-toggle="edit-mode" aria-pressed="false">Edit</button>
<button type="button" data-command="capture-screenshot">Screenshot</button>
<button type="button" data-command="refresh">Refresh</button>
</header>
<iframe id="lp-frame" class="lp-frame" sandbox="allow-scripts allow-popups" src="{sandbox}"></iframe>
<aside id="lp-events" class="lp-events"></aside>
<script>window.__LIVEPANE_HOST__ = {bootstrap};</script>
<script>{script}</script>
</body>
</html>
"#,
        css = host_css(),
        sandbox = escape_html(urls.sandbox),
        bootstrap = crate::document::script_json(&bootstrap),
        script = HOST_PAGE_JS,
    )
}
