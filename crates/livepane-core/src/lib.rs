//! livepane core crate.
//!
//! Everything here is pure and I/O free. The crate is layered leaves first:
//!
//! - `lexer`: span lexer shared by every text pass (code vs strings,
//!   templates, comments, regex literals).
//! - `scanner`: truncation detection for fresh output and the strict
//!   validator for hand edits.
//! - `normalize` + `entry`: the ordered rewrite pipeline that makes
//!   generated source runnable without a build step, and the choice of the
//!   component to render.
//! - `pages`: page sources, per-page compilation and the path-keyed
//!   registry with route resolution.
//! - `protocol` + `session`: the typed, versioned host/sandbox messages and
//!   the host-side state machine for one preview instance.
//!
//! Document assembly and the sandbox scripts live in `livepane-web`.

pub mod entry;
pub mod error;
pub mod lexer;
pub mod normalize;
pub mod pages;
pub mod protocol;
pub mod scanner;
pub mod session;

pub use entry::{CONVENTIONAL_NAMES, EntryPoint, find_declared_component, resolve_entry_point};
pub use error::{PreviewError, PreviewErrorKind, RecoveryAction};
pub use normalize::{ImportBinding, collect_imports, normalize};
pub use pages::{
    CompileOptions, DEFAULT_MAX_SOURCE_CHARS, PageRegistry, PageSource, PageUnit, RegistryEntry,
    compile_page, normalize_route_path,
};
pub use protocol::{
    ElementSelection, Envelope, HostMessage, PROTOCOL_VERSION, ProtocolError, SandboxMessage,
};
pub use scanner::{
    EditError, EditValidation, TruncationVerdict, detect_truncation, detect_truncation_with,
    validate_edit,
};
pub use session::{PreviewEvent, PreviewSession, RenderState, SessionOutput};
