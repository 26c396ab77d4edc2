//! Minification for the scripts embedded in sandbox documents.
//!
//! Two stages, both driven by the shared span lexer so string, template
//! and regex literals pass through untouched:
//!
//! 1. [`strip_comments`] drops line and block comments.
//! 2. [`collapse_whitespace`] shrinks whitespace runs in code to a single
//!    space where grammar needs one and to nothing elsewhere.
//!
//! A run that contains a newline is kept as `\n` unless the previous
//! character already ends an expression list (`{`, `(`, `,`, `;`, ...), so
//! statements that rely on automatic semicolon insertion keep working.
//!
//! Output is deterministic and never fails; unusual input is emitted
//! unchanged.

use livepane_core::lexer::{SpanKind, tokenize};

/// After these a newline can never end a statement.
const CONTINUES_AFTER: &[char] = &['{', '(', '[', ',', ';', ':', '=', '?', '&', '|', '.'];

const NO_SPACE_AFTER: &[char] = &[
    '(', '[', '{', ',', ';', ':', '=', '+', '-', '*', '/', '%', '&', '|', '^', '!', '~', '<',
    '>', '?', '.',
];

const NO_SPACE_BEFORE: &[char] = &[
    ')', ']', '}', ',', ';', ':', '=', '+', '-', '*', '/', '%', '&', '|', '^', '!', '~', '<',
    '>', '?', '.', '(',
];

pub fn strip_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for span in tokenize(input) {
        match span.kind {
            // Keeps `a/**/b` from fusing into one token.
            SpanKind::BlockComment => output.push(' '),
            SpanKind::LineComment => {}
            _ => output.push_str(span.text(input)),
        }
    }
    output
}

pub fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    // `Some(saw_newline)` while a whitespace run is pending.
    let mut pending: Option<bool> = None;

    for span in tokenize(input) {
        let text = span.text(input);
        if !span.is_code() {
            if let (Some(newline), Some(first)) = (pending.take(), text.chars().next()) {
                push_gap(&mut out, newline, first);
            }
            out.push_str(text);
            continue;
        }
        for ch in text.chars() {
            if ch.is_whitespace() {
                let newline = pending.unwrap_or(false) || ch == '\n';
                pending = Some(newline);
                continue;
            }
            if let Some(newline) = pending.take() {
                push_gap(&mut out, newline, ch);
            }
            out.push(ch);
        }
    }

    out
}

fn push_gap(out: &mut String, newline: bool, next_char: char) {
    let Some(prev_char) = out.chars().last() else {
        return;
    };
    if newline && !CONTINUES_AFTER.contains(&prev_char) {
        out.push('\n');
        return;
    }
    maybe_push_space(out, prev_char, next_char);
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

fn maybe_push_space(out: &mut String, prev_char: char, next_char: char) {
    // Avoid semantic merges like `a+++b` from `a + ++b`, or `a---b`.
    if (prev_char == '+' && next_char == '+') || (prev_char == '-' && next_char == '-') {
        out.push(' ');
        return;
    }

    if NO_SPACE_AFTER.contains(&prev_char) || NO_SPACE_BEFORE.contains(&next_char) {
        return;
    }

    if is_word_char(prev_char) && is_word_char(next_char) {
        out.push(' ');
    }
}

pub fn minify_js(input: &str) -> String {
    collapse_whitespace(&strip_comments(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_block_and_line_comments() {
        let output = strip_comments("/* block comment */ var x = 1; // line comment\nvar y;");
        assert!(!output.contains("block comment"));
        assert!(!output.contains("line comment"));
        assert!(output.contains("var x = 1;"));
        assert!(output.contains("\nvar y;"));
    }

    #[test]
    fn test_preserve_string_and_template_content() {
        let input = r#"var x = "/* not a comment */"; var y = `// nor ${"this"}`;"#;
        let output = strip_comments(input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_collapse_whitespace() {
        let output = collapse_whitespace("function foo ( x ) { return x + 1 ; }");
        assert_eq!(output, "function foo(x){return x+1;}");
    }

    #[test]
    fn test_preserve_spaces_in_strings() {
        let output = collapse_whitespace(r#"var x = "hello   world";"#);
        assert_eq!(output, r#"var x="hello   world";"#);
    }

    #[test]
    fn test_newlines_kept_where_statements_may_end() {
        let output = collapse_whitespace("var a = b\n(c)\nlet d = {\n  e: 1\n}\nf()");
        assert_eq!(output, "var a=b\n(c)\nlet d={e:1\n}\nf()");
    }

    #[test]
    fn test_increment_operators_do_not_merge() {
        assert_eq!(collapse_whitespace("a + ++b - --c"), "a+ ++b- --c");
    }

    #[test]
    fn test_regex_literal_survives() {
        let input = r#"const a = x / y; const ok = /a b/.test("z");"#;
        let output = minify_js(input);
        assert_eq!(output, r#"const a=x/y;const ok=/a b/.test("z");"#);
    }

    #[test]
    fn test_full_minify() {
        let input = r#"
            /* This is a comment */
            function test(x) {
                // inner
                return x + 1;
            }
        "#;
        let output = minify_js(input);
        assert!(!output.contains("This is a comment"));
        assert!(output.contains("function test(x){return x+1;}"), "{output}");
    }
}
