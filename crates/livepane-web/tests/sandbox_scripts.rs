//! Runs the shim and bridge scripts in an embedded engine against a small
//! stand-in DOM.

use livepane_core::PreviewErrorKind;
use livepane_core::protocol::{HOST_SOURCE, SANDBOX_SOURCE};
use livepane_web::{PreviewConfig, PreviewInput, SANDBOX_BRIDGE_JS, SHIMS_JS, SandboxHost};
use rquickjs::{CatchResultExt, Context, Runtime};

const DOM: &str = r#"
var window = globalThis;
var posted = [];
var listeners = {};
window.parent = {
  postMessage: function (message) { posted.push(JSON.parse(JSON.stringify(message))); }
};
window.addEventListener = function (type, fn) {
  (listeners[type] = listeners[type] || []).push(fn);
};
window.getComputedStyle = function () { return {}; };
window.React = {
  createElement: function (type, props, children) {
    return { type: type, props: props || {}, children: children };
  }
};

function El(tag) {
  this.tagName = String(tag).toUpperCase();
  this.childNodes = [];
  this.attributes = {};
  this.handlers = {};
  this.style = {};
  this.textContent = "";
  this.parentNode = null;
  this.id = "";
}
El.prototype.appendChild = function (child) {
  child.parentNode = this;
  this.childNodes.push(child);
  return child;
};
El.prototype.removeChild = function (child) {
  this.childNodes.splice(this.childNodes.indexOf(child), 1);
  child.parentNode = null;
  return child;
};
Object.defineProperty(El.prototype, "firstChild", {
  get: function () { return this.childNodes[0] || null; }
});
El.prototype.setAttribute = function (k, v) { this.attributes[k] = String(v); };
El.prototype.getAttribute = function (k) { return k in this.attributes ? this.attributes[k] : null; };
El.prototype.removeAttribute = function (k) { delete this.attributes[k]; };
El.prototype.addEventListener = function (type, fn) { this.handlers[type] = fn; };

function findById(node, id) {
  if (node.id === id) return node;
  for (var i = 0; i < node.childNodes.length; i++) {
    var hit = findById(node.childNodes[i], id);
    if (hit) return hit;
  }
  return null;
}
function findTag(node, tag) {
  var out = node.tagName === tag ? [node] : [];
  node.childNodes.forEach(function (child) { out = out.concat(findTag(child, tag)); });
  return out;
}
function textOf(node) {
  return node ? node.textContent + node.childNodes.map(textOf).join("") : "";
}
function sent(type) {
  return posted.filter(function (m) { return m.type === type; });
}

var body = new El("body");
var mount = body.appendChild(new El("div"));
mount.id = "livepane-root";
var document = {
  body: body,
  head: new El("head"),
  documentElement: new El("html"),
  getElementById: function (id) { return findById(body, id); },
  createElement: function (tag) { return new El(tag); },
  addEventListener: function () {}
};
"#;

struct Frame {
    context: Context,
    _runtime: Runtime,
}

impl Frame {
    fn load(source: &str) -> Self {
        let mut host = SandboxHost::new(PreviewConfig::default());
        host.load(PreviewInput::Single {
            source: source.to_string(),
        });
        let html = host.document().map(|d| d.html.clone()).expect("document built");
        let start = html.find("window.__LIVEPANE__ = ").expect("bootstrap present");
        let end = start + html[start..].find(";</script>").expect("bootstrap end");

        let runtime = Runtime::new().expect("js runtime");
        let context = Context::full(&runtime).expect("js context");
        let frame = Frame {
            context,
            _runtime: runtime,
        };
        frame.exec(DOM);
        frame.exec(&html[start..=end]);
        frame.exec(SHIMS_JS);
        frame.exec(SANDBOX_BRIDGE_JS);
        frame
    }

    fn exec(&self, js: &str) {
        self.context.with(|ctx| {
            ctx.eval::<(), _>(js)
                .catch(&ctx)
                .map_err(|e| e.to_string())
                .expect("script runs")
        });
    }

    fn check(&self, js: &str) -> bool {
        self.context.with(|ctx| {
            ctx.eval::<bool, _>(js)
                .catch(&ctx)
                .map_err(|e| e.to_string())
                .expect("expression evaluates")
        })
    }

    fn count(&self, js: &str) -> i32 {
        self.context.with(|ctx| {
            ctx.eval::<i32, _>(js)
                .catch(&ctx)
                .map_err(|e| e.to_string())
                .expect("expression evaluates")
        })
    }

    fn text(&self, js: &str) -> String {
        self.context.with(|ctx| {
            ctx.eval::<String, _>(js)
                .catch(&ctx)
                .map_err(|e| e.to_string())
                .expect("expression evaluates")
        })
    }
}

fn app() -> Frame {
    Frame::load("function App() { return <p>hi</p>; }")
}

#[test]
fn bridge_announces_ready_for_its_generation() {
    let frame = app();
    assert_eq!(frame.count("sent('ready').length"), 1);
    assert_eq!(frame.count("sent('ready')[0].generation"), 1);
    assert_eq!(frame.text("sent('ready')[0].source"), SANDBOX_SOURCE);
}

#[test]
fn repeated_failures_in_one_attempt_post_one_error() {
    let frame = app();
    frame.exec(
        "var bridge = window.__livepaneBridge;
         bridge.beginAttempt();
         bridge.reportError('runtime-error', 'boom', 3);
         listeners.error.forEach(function (fn) { fn({ error: new Error('boom again'), lineno: 4 }); });
         bridge.reportError('runtime-error', 'third');",
    );
    assert_eq!(frame.count("sent('preview-error').length"), 1);
    assert_eq!(frame.text("sent('preview-error')[0].message"), "boom");
    assert_eq!(frame.count("sent('preview-error')[0].line"), 3);
    assert_eq!(frame.text("sent('preview-error')[0].kind"), "runtime-error");
}

#[test]
fn failure_replaces_blank_mount_with_fallback_panel() {
    let frame = app();
    frame.exec("window.__livepaneBridge.reportError('runtime-error', 'boom');");
    assert!(frame.check("mount.style.display === 'none'"));
    let text = frame.text("textOf(document.getElementById('livepane-fallback'))");
    assert!(text.contains("boom"), "{text}");
    assert!(text.contains(PreviewErrorKind::RuntimeError.title()), "{text}");
    assert!(frame.count("findTag(document.getElementById('livepane-fallback'), 'BUTTON').length") > 0);
}

#[test]
fn fallback_button_requests_recovery() {
    let frame = app();
    frame.exec(
        "window.__livepaneBridge.reportError('runtime-error', 'boom');
         var button = findTag(document.getElementById('livepane-fallback'), 'BUTTON')[0];
         button.handlers.click({ preventDefault: function () {}, stopPropagation: function () {} });",
    );
    assert_eq!(frame.count("sent('recovery-requested').length"), 1);
    assert!(frame.check("typeof sent('recovery-requested')[0].action === 'string'"));
}

#[test]
fn new_attempt_clears_fallback_and_reports_again() {
    let frame = app();
    frame.exec(
        "var bridge = window.__livepaneBridge;
         bridge.reportError('runtime-error', 'first');
         bridge.beginAttempt();",
    );
    assert!(frame.check("document.getElementById('livepane-fallback') === null"));
    assert!(frame.check("mount.style.display === ''"));
    frame.exec("window.__livepaneBridge.reportError('transform-error', 'second');");
    assert_eq!(frame.count("sent('preview-error').length"), 2);
}

#[test]
fn host_messages_from_another_generation_are_ignored() {
    let frame = app();
    let message = |generation: u64| {
        format!(
            "listeners.message.forEach(function (fn) {{
               fn({{ data: {{ source: '{HOST_SOURCE}', v: 1, generation: {generation}, type: 'inspector-mode', enabled: true }} }});
             }});"
        )
    };
    frame.exec(&message(7));
    assert!(frame.check("window.__livepaneBridge.state.inspector === false"));
    frame.exec(&message(1));
    assert!(frame.check("window.__livepaneBridge.state.inspector === true"));
}

#[test]
fn motion_shim_renders_inert_tags() {
    let frame = app();
    frame.exec(
        "var S = window.__livepaneShims;
         var el = S.Motion.motion.div({
           initial: { opacity: 0 }, animate: { opacity: 1 }, whileHover: { scale: 1.1 },
           className: 'hero', children: 'Hi'
         });",
    );
    assert!(frame.check("el.type === 'div' && el.props.className === 'hero' && el.children === 'Hi'"));
    assert!(frame.check("!('animate' in el.props) && !('initial' in el.props) && !('whileHover' in el.props)"));
    assert!(frame.check("S.Motion.motion('section')({}).type === 'section'"));
    assert!(frame.check("S.Motion.motion.div === S.Motion.motion.div"));
    assert!(frame.check("S.Motion.AnimatePresence({ children: 'x' }) === 'x'"));
    assert!(frame.check("S.Motion.useAnimation().start() instanceof Promise"));
    assert_eq!(frame.count("sent('preview-error').length"), 0);
}

#[test]
fn motion_shim_without_runtime_renders_nothing() {
    let frame = app();
    frame.exec("delete window.React;");
    assert!(frame.check("window.__livepaneShims.Motion.motion.span({ animate: {} }) === null"));
}

#[test]
fn any_icon_name_is_a_null_component() {
    let frame = app();
    frame.exec("var S = window.__livepaneShims;");
    assert!(frame.check("S.LucideReact.Sparkles2({ size: 16 }) === null"));
    assert!(frame.check("S.LucideReact.NotARealIcon === S.LucideReact.Sparkles2"));
    assert!(frame.check("S.generic.Chart({}) === null"));
}

#[test]
fn pick_prefers_loaded_library_then_shim() {
    let frame = app();
    frame.exec(
        "var S = window.__livepaneShims;
         var real = { Sparkles: function Sparkles() { return 'real'; } };",
    );
    assert!(frame.check("S.pick(real, 'LucideReact', 'Sparkles') === real.Sparkles"));
    assert!(frame.check("S.pick(real, 'LucideReact', 'Sparkles2')({}) === null"));
    assert!(frame.check("S.pick(null, 'Motion', 'AnimatePresence') === S.Motion.AnimatePresence"));
    assert!(frame.check("S.pick(null, null, 'Chart')({}) === null"));
}

#[test]
fn unbound_elements_skip_declared_components() {
    let frame = app();
    let names = frame.text(
        "JSON.stringify(window.__livepaneShims.unboundElements(
           'function Hero() { return React.createElement(motion.div, null, ' +
           'React.createElement(Sparkles, null), React.createElement(Card, null)); }\\n' +
           'function Card() { return React.createElement(\"p\", null, \"x\"); }'
         ))",
    );
    assert_eq!(names, r#"["motion","Sparkles"]"#);
}
