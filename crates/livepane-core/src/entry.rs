//! Entry-point resolution over normalized source.

use crate::error::PreviewError;
use crate::lexer::mask_non_code;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Fallback component names, tried in this order when no capitalized
/// declaration is found.
pub const CONVENTIONAL_NAMES: &[&str] = &[
    "App",
    "Page",
    "Component",
    "Home",
    "HomePage",
    "LandingPage",
    "Main",
    "Index",
    "Website",
    "Landing",
];

static DECLARATION_RE: OnceLock<Option<Regex>> = OnceLock::new();
static CLASS_RE: OnceLock<Option<Regex>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EntryPoint {
    /// A capitalized top-level declaration named in the source.
    Declared { name: String },
    /// No declaration matched; the runtime tries these names in order and
    /// renders the first one that is a function.
    Conventional { candidates: Vec<String> },
}

impl EntryPoint {
    /// Names the runtime should try, in order.
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            EntryPoint::Declared { name } => vec![name.as_str()],
            EntryPoint::Conventional { candidates } => {
                candidates.iter().map(String::as_str).collect()
            }
        }
    }
}

fn declaration_re() -> Option<&'static Regex> {
    DECLARATION_RE
        .get_or_init(|| Regex::new(r"\b(?:function|const|let|var)\s+([A-Z][A-Za-z0-9_$]*)").ok())
        .as_ref()
}

fn class_re() -> Option<&'static Regex> {
    CLASS_RE
        .get_or_init(|| Regex::new(r"\bclass\s+([A-Z][A-Za-z0-9_$]*)").ok())
        .as_ref()
}

/// First `function|const|let|var <Capitalized>` declaration in code.
/// Helpers declared after the main component never win.
pub fn find_declared_component(source: &str) -> Option<String> {
    let masked = mask_non_code(source);
    declaration_re()?
        .captures(&masked)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn resolve_entry_point(source: &str) -> Result<EntryPoint, PreviewError> {
    if let Some(name) = find_declared_component(source) {
        return Ok(EntryPoint::Declared { name });
    }

    let masked = mask_non_code(source);
    if let Some(re) = class_re() {
        for caps in re.captures_iter(&masked) {
            if let Some(name) = caps.get(1).map(|m| m.as_str())
                && CONVENTIONAL_NAMES.contains(&name)
            {
                return Ok(EntryPoint::Declared {
                    name: name.to_string(),
                });
            }
        }
    }

    let candidates: Vec<String> = CONVENTIONAL_NAMES
        .iter()
        .filter(|name| mentions_identifier(&masked, name))
        .map(|name| name.to_string())
        .collect();
    if candidates.is_empty() {
        Err(PreviewError::component_not_found())
    } else {
        Ok(EntryPoint::Conventional { candidates })
    }
}

fn mentions_identifier(masked: &str, name: &str) -> bool {
    masked.match_indices(name).any(|(i, _)| {
        let bytes = masked.as_bytes();
        let before = i.checked_sub(1).map(|j| bytes[j]);
        let after = bytes.get(i + name.len()).copied();
        !before.is_some_and(crate::lexer::is_ident_byte)
            && !after.is_some_and(crate::lexer::is_ident_byte)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreviewErrorKind;

    #[test]
    fn test_first_capitalized_declaration_wins() {
        let src = "function Hero() { return <Badge />; }\nconst Badge = () => null;\nfunction HelperFn() {}";
        assert_eq!(find_declared_component(src).as_deref(), Some("Hero"));
    }

    #[test]
    fn test_first_match_is_independent_of_export() {
        let src = "const Hero = () => <HelperFn />;\nfunction HelperFn() {}\nconst DefaultExport = HelperFn;";
        assert_eq!(
            resolve_entry_point(src),
            Ok(EntryPoint::Declared {
                name: "Hero".into()
            })
        );
    }

    #[test]
    fn test_lowercase_and_string_declarations_are_ignored() {
        let src = "const data = [];\nconst label = 'function Fake() {}';\nfunction Page() {}";
        assert_eq!(find_declared_component(src).as_deref(), Some("Page"));
    }

    #[test]
    fn test_class_component_with_conventional_name() {
        let src = "class App extends React.Component { render() { return null; } }";
        assert_eq!(
            resolve_entry_point(src),
            Ok(EntryPoint::Declared { name: "App".into() })
        );
    }

    #[test]
    fn test_conventional_candidates_in_order() {
        let src = "window.Page = Page; window.App = App;";
        assert_eq!(
            resolve_entry_point(src),
            Ok(EntryPoint::Conventional {
                candidates: vec!["App".into(), "Page".into()]
            })
        );
    }

    #[test]
    fn test_nothing_to_render() {
        let err = resolve_entry_point("const x = 1;\nconsole.log(x);").unwrap_err();
        assert_eq!(err.kind, PreviewErrorKind::ComponentNotFound);
    }

    #[test]
    fn test_entry_point_serializes_with_kind_tag() {
        let entry = EntryPoint::Declared { name: "Hero".into() };
        let json = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(json, serde_json::json!({"kind": "declared", "name": "Hero"}));
    }
}
