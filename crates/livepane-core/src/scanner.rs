//! Balance and heuristic checks over raw generated source.
//!
//! Two checks share [`count_balance`]:
//!
//! - [`detect_truncation`] runs on freshly generated source before it is
//!   rendered. It is tolerant (small imbalances pass) and only decides which
//!   recovery message the preview shows.
//! - [`validate_edit`] runs when a person hand-edits accepted source. It has
//!   zero tolerance and blocks the commit.
//!
//! Both are pattern guesses, not a parser. Thresholds are parameters.

use crate::lexer::{count_balance, mask_non_code};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Net unclosed count tolerated per bracket family before the truncation
/// check fires.
pub const DEFAULT_TRUNCATION_TOLERANCE: i64 = 2;

const CLOSING_KEYWORDS: &[&str] = &[
    "return",
    "const",
    "let",
    "var",
    "function",
    "true",
    "false",
    "null",
    "undefined",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncationVerdict {
    pub is_truncated: bool,
    pub reason: String,
}

impl TruncationVerdict {
    pub fn complete() -> Self {
        Self {
            is_truncated: false,
            reason: String::new(),
        }
    }

    fn truncated(reason: impl Into<String>) -> Self {
        Self {
            is_truncated: true,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Braces,
    Parentheses,
    Brackets,
}

impl Delimiter {
    pub fn as_str(self) -> &'static str {
        match self {
            Delimiter::Braces => "braces",
            Delimiter::Parentheses => "parentheses",
            Delimiter::Brackets => "brackets",
        }
    }

    fn closer(self) -> char {
        match self {
            Delimiter::Braces => '}',
            Delimiter::Parentheses => ')',
            Delimiter::Brackets => ']',
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a nonzero balance: `Missing` closers or `Extra` closers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Imbalance {
    Missing,
    Extra,
}

impl fmt::Display for Imbalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Imbalance::Missing => "missing",
            Imbalance::Extra => "extra",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Unbalanced {delimiter}: {direction} {count} closing '{closer}'", closer = delimiter.closer())]
    Unbalanced {
        delimiter: Delimiter,
        direction: Imbalance,
        count: u64,
    },

    #[error("no component or function found")]
    NoDeclaration,
}

/// Outcome of [`validate_edit`].
#[derive(Debug, Clone)]
pub struct EditValidation {
    pub valid: bool,
    pub errors: Vec<EditError>,
}

impl EditValidation {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn into_result(self) -> Result<(), Vec<EditError>> {
        if self.valid { Ok(()) } else { Err(self.errors) }
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

fn families(source: &str) -> [(Delimiter, i64); 3] {
    let balance = count_balance(source);
    [
        (Delimiter::Braces, balance.braces),
        (Delimiter::Parentheses, balance.parens),
        (Delimiter::Brackets, balance.brackets),
    ]
}

pub fn detect_truncation(source: &str) -> TruncationVerdict {
    detect_truncation_with(source, DEFAULT_TRUNCATION_TOLERANCE)
}

/// Returns the first matching truncation reason, or a complete verdict.
pub fn detect_truncation_with(source: &str, tolerance: i64) -> TruncationVerdict {
    for (delimiter, net) in families(source) {
        if net > tolerance {
            return TruncationVerdict::truncated(format!(
                "Unclosed {delimiter} ({net} unclosed)"
            ));
        }
    }

    let tail = source.trim_end();
    if tail.is_empty() {
        return TruncationVerdict::complete();
    }

    if ends_mid_identifier(tail) {
        return TruncationVerdict::truncated("Code ends mid-identifier");
    }
    if is_match(&UNTERMINATED_ATTRIBUTE_RE, UNTERMINATED_ATTRIBUTE, tail) {
        return TruncationVerdict::truncated("Unterminated attribute value");
    }
    if is_match(&INCOMPLETE_BODY_RE, INCOMPLETE_BODY, tail) {
        return TruncationVerdict::truncated("Incomplete return statement or arrow function body");
    }

    TruncationVerdict::complete()
}

const UNTERMINATED_ATTRIBUTE: &str = r#"[A-Za-z_][\w:.-]*=\s*(?:["'][^"'\n]*)?$"#;
const INCOMPLETE_BODY: &str = r"(?:\breturn|=>)\s*[({]?\s*$";
const COMPLETE_EXPORT_LINE: &str = r"^\s*(?:export\s+default|module\.exports\s*=)\s*[\w$.]+;?$";
const DECLARATION: &str =
    r"\bfunction\b|=>|\b(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*=|\bclass\s+[A-Za-z_$][\w$]*";

static UNTERMINATED_ATTRIBUTE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static INCOMPLETE_BODY_RE: OnceLock<Option<Regex>> = OnceLock::new();
static COMPLETE_EXPORT_LINE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static DECLARATION_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn is_match(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

fn ends_mid_identifier(tail: &str) -> bool {
    let Some(last) = tail.bytes().last() else {
        return false;
    };
    if !(last.is_ascii_alphanumeric() || last == b'_' || last == b'$') {
        return false;
    }

    // Trailing comments and strings are not identifiers.
    let masked = mask_non_code(tail);
    if !masked.ends_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return false;
    }

    let word_start = tail
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let word = &tail[word_start..];
    if CLOSING_KEYWORDS.contains(&word) {
        return false;
    }

    let last_line = tail.rsplit('\n').next().unwrap_or(tail);
    !is_match(&COMPLETE_EXPORT_LINE_RE, COMPLETE_EXPORT_LINE, last_line)
}

/// Zero-tolerance validation for hand-edited source.
pub fn validate_edit(source: &str) -> EditValidation {
    let mut errors = Vec::new();

    for (delimiter, net) in families(source) {
        if net != 0 {
            errors.push(EditError::Unbalanced {
                delimiter,
                direction: if net > 0 {
                    Imbalance::Missing
                } else {
                    Imbalance::Extra
                },
                count: net.unsigned_abs(),
            });
        }
    }

    if !has_declaration(source) {
        errors.push(EditError::NoDeclaration);
    }

    EditValidation {
        valid: errors.is_empty(),
        errors,
    }
}

fn has_declaration(source: &str) -> bool {
    is_match(&DECLARATION_RE, DECLARATION, &mask_non_code(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HERO: &str = r#"import React, { useState } from 'react';

export default function Hero() {
  const [open, setOpen] = useState(false);
  const items = ['a', 'b'];
  return (
    <section className="hero">
      <h1>{open ? 'Open' : 'Closed'}</h1>
      {items.map((item) => <span key={item}>{item}</span>)}
      <button onClick={() => setOpen(!open)}>Toggle</button>
    </section>
  );
}
"#;

    #[test]
    fn test_well_formed_component_is_complete() {
        assert_eq!(detect_truncation(HERO), TruncationVerdict::complete());
    }

    #[test]
    fn test_three_unclosed_braces() {
        let src = "function Foo() { if (a) { if (b) { return <div>{'}'}</div>";
        let verdict = detect_truncation(src);
        assert!(verdict.is_truncated);
        assert!(
            verdict.reason.contains("Unclosed braces (3 unclosed)"),
            "{}",
            verdict.reason
        );
    }

    #[test]
    fn test_small_imbalance_is_tolerated() {
        let src = "function Foo() { return <div>{x}</div>;";
        assert!(!detect_truncation(src).is_truncated);
    }

    #[test]
    fn test_strings_do_not_count() {
        let src = "const s = '{{{{{'; const t = \"(((((\"; const u = `[[[[`;";
        assert!(!detect_truncation(src).is_truncated);
    }

    #[test]
    fn test_ends_mid_identifier() {
        let src = "function A() {\n  return <div className";
        let verdict = detect_truncation(src);
        assert_eq!(verdict.reason, "Code ends mid-identifier");
    }

    #[test]
    fn test_trailing_export_default_is_complete() {
        let src = "function App() { return null; }\n\nexport default App";
        assert!(!detect_truncation(src).is_truncated);
    }

    #[test]
    fn test_closing_keyword_is_not_identifier_truncation() {
        let src = "const ready = true";
        assert!(!detect_truncation(src).is_truncated);
    }

    #[test]
    fn test_unterminated_attribute() {
        let verdict = detect_truncation("function A() { return <img src=\"/hero.png");
        assert_eq!(verdict.reason, "Unterminated attribute value");
        let verdict = detect_truncation("function A() { return <a href=");
        assert_eq!(verdict.reason, "Unterminated attribute value");
    }

    #[test]
    fn test_incomplete_return_and_arrow() {
        let verdict = detect_truncation("function A() {\n  return (");
        assert!(verdict.is_truncated);
        assert_eq!(
            verdict.reason,
            "Incomplete return statement or arrow function body"
        );
        let verdict = detect_truncation("const A = () =>");
        assert_eq!(
            verdict.reason,
            "Incomplete return statement or arrow function body"
        );
    }

    #[test]
    fn test_tolerance_is_tunable() {
        let src = "function A() { {";
        assert!(!detect_truncation(src).is_truncated);
        assert!(detect_truncation_with(src, 0).is_truncated);
    }

    #[test]
    fn test_edit_validator_rejects_single_missing_brace() {
        let result = validate_edit("function A() { return null;");
        assert!(!result.is_valid());
        assert_eq!(
            result.errors,
            vec![EditError::Unbalanced {
                delimiter: Delimiter::Braces,
                direction: Imbalance::Missing,
                count: 1,
            }]
        );
        assert_eq!(
            result.messages(),
            vec!["Unbalanced braces: missing 1 closing '}'".to_string()]
        );
    }

    #[test]
    fn test_edit_validator_reports_extra_closers() {
        let result = validate_edit("const A = () => (null));");
        assert_eq!(
            result.errors,
            vec![EditError::Unbalanced {
                delimiter: Delimiter::Parentheses,
                direction: Imbalance::Extra,
                count: 1,
            }]
        );
    }

    #[test]
    fn test_edit_validator_requires_declaration() {
        let result = validate_edit("<div>hello</div>");
        assert_eq!(result.errors, vec![EditError::NoDeclaration]);
        assert_eq!(result.messages(), vec!["no component or function found"]);
    }

    #[test]
    fn test_edit_validator_ignores_keywords_in_strings() {
        let result = validate_edit("'function () => class X'");
        assert_eq!(result.errors, vec![EditError::NoDeclaration]);
    }

    #[test]
    fn test_edit_validator_accepts_class_component() {
        let src = "class Hero extends React.Component { render() { return null; } }";
        assert!(validate_edit(src).is_valid());
    }

    proptest! {
        #[test]
        fn prop_unclosed_braces_over_tolerance_are_truncated(n in 3usize..40) {
            let src = format!("function Page() {}{}", "{ ".repeat(n), "return x;");
            let verdict = detect_truncation(&src);
            prop_assert!(verdict.is_truncated);
            prop_assert!(verdict.reason.contains("braces"));
            let expected = format!("({} unclosed)", n);
            prop_assert!(verdict.reason.contains(&expected));
        }

        #[test]
        fn prop_edit_validator_rejects_any_nonzero_balance(opens in 0usize..6, closes in 0usize..6) {
            prop_assume!(opens != closes);
            let src = format!("function A() {{ {}{} }}", "[".repeat(opens), "]".repeat(closes));
            prop_assert!(!validate_edit(&src).is_valid());
        }

        #[test]
        fn prop_balanced_nesting_is_complete(depth in 1usize..20) {
            let src = format!(
                "function Page() {{ return ({}<div />{}); }}",
                "<div>{[".repeat(depth),
                "]}</div>".repeat(depth)
            );
            prop_assert!(!detect_truncation(&src).is_truncated);
        }
    }
}
