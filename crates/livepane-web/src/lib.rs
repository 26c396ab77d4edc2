#[cfg(feature = "axum")]
pub mod adapters;
pub mod config;
pub mod document;
pub mod host;
pub mod host_page;
pub mod minify;

#[cfg(feature = "axum")]
pub use adapters::axum::AxumPreviewAdapter;
pub use config::{ConfigError, LibrarySpec, PreviewConfig, default_libraries};
pub use document::{MOUNT_ID, SandboxDocument, build_document, escape_html};
pub use host::{ControlCommand, ControlOutcome, PreviewInput, ReceiveOutcome, SandboxHost};
pub use host_page::{HostPageUrls, render_host_page};
pub use minify::minify_js;

/// Stand-ins for optional libraries that failed to load.
pub const SHIMS_JS: &str = include_str!("js/shims.js");
/// Error capture, fallback panel, inspector, edit mode and screenshots.
pub const SANDBOX_BRIDGE_JS: &str = include_str!("js/sandbox-bridge.js");
/// Library loading, page evaluation and the fragment router.
pub const SANDBOX_RUNTIME_JS: &str = include_str!("js/sandbox-runtime.js");
pub const HOST_PAGE_JS: &str = include_str!("js/host-page.js");
