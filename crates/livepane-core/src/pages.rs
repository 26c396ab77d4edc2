//! Page sources, per-page compilation, and the path-keyed registry.
//!
//! A single-page preview is a registry of one entry. Route resolution here
//! mirrors the decision the in-sandbox router makes on every fragment
//! change, so it can be tested without a browser.

use crate::entry::{EntryPoint, resolve_entry_point};
use crate::error::{PreviewError, PreviewErrorKind};
use crate::normalize::{ImportBinding, collect_imports, normalize};
use crate::scanner::detect_truncation;
use serde::{Deserialize, Serialize};

/// Sources at or above this many characters are rejected before any
/// transformation.
pub const DEFAULT_MAX_SOURCE_CHARS: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSource {
    pub id: String,
    pub name: String,
    pub path: String,
    pub source_text: String,
}

impl PageSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        path: &str,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: normalize_route_path(path),
            source_text: source_text.into(),
        }
    }

    /// The page used when the collaborator supplies one source string.
    pub fn single(source_text: impl Into<String>) -> Self {
        Self::new("main", "Home", "/", source_text)
    }
}

/// Normalizes a route: leading `/`, no trailing `/`, no empty segments,
/// fragment and query removed. `""`, `"#"` and `"#/"` become `/`.
pub fn normalize_route_path(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_prefix('#').unwrap_or(raw);
    let raw = raw.split(['?', '#']).next().unwrap_or("");
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub max_source_chars: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_source_chars: DEFAULT_MAX_SOURCE_CHARS,
        }
    }
}

/// Result of compiling one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PageUnit {
    Ready {
        code: String,
        entry: EntryPoint,
        imports: Vec<ImportBinding>,
    },
    Rejected {
        error: PreviewError,
    },
}

impl PageUnit {
    pub fn error(&self) -> Option<&PreviewError> {
        match self {
            PageUnit::Ready { .. } => None,
            PageUnit::Rejected { error } => Some(error),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PageUnit::Ready { .. })
    }
}

/// Size guard, truncation check, normalization, entry resolution. The size
/// guard runs first so oversized text never reaches the normalizer.
pub fn compile_page(source: &str, opts: &CompileOptions) -> PageUnit {
    let chars = source.chars().count();
    if chars >= opts.max_source_chars {
        return PageUnit::Rejected {
            error: PreviewError::size_limit(chars, opts.max_source_chars),
        };
    }

    let verdict = detect_truncation(source);
    if verdict.is_truncated {
        return PageUnit::Rejected {
            error: PreviewError::new(PreviewErrorKind::Truncated, verdict.reason),
        };
    }

    let imports = collect_imports(source);
    let code = normalize(source);
    match resolve_entry_point(&code) {
        Ok(entry) => PageUnit::Ready {
            code,
            entry,
            imports,
        },
        Err(error) => PageUnit::Rejected { error },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub page_id: String,
    pub name: String,
    pub path: String,
    pub unit: PageUnit,
}

/// Path-keyed map of compiled pages, in first-registration order. Rebuilt
/// whole on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRegistry {
    entries: Vec<RegistryEntry>,
}

impl PageRegistry {
    /// Compiles every page. A duplicate path replaces the earlier entry in
    /// place, so the last registration wins.
    pub fn build(pages: &[PageSource], opts: &CompileOptions) -> Self {
        let mut entries: Vec<RegistryEntry> = Vec::with_capacity(pages.len());
        for page in pages {
            let path = normalize_route_path(&page.path);
            let entry = RegistryEntry {
                page_id: page.id.clone(),
                name: page.name.clone(),
                unit: compile_page(&page.source_text, opts),
                path,
            };
            match entries.iter_mut().find(|e| e.path == entry.path) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A single page gets no router.
    pub fn is_single(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&RegistryEntry> {
        let path = normalize_route_path(path);
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }

    pub fn path_for_page_id(&self, page_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.page_id == page_id)
            .map(|e| e.path.as_str())
    }

    /// Picks the entry to show for a location fragment: the fragment's path
    /// if registered, else `current`, else `/`, else the first entry.
    pub fn resolve_route(&self, fragment: Option<&str>, current: Option<&str>) -> Option<&RegistryEntry> {
        fragment
            .filter(|f| !f.trim_start_matches('#').is_empty())
            .and_then(|f| self.get(f))
            .or_else(|| current.and_then(|c| self.get(c)))
            .or_else(|| self.get("/"))
            .or_else(|| self.entries.first())
    }
}
