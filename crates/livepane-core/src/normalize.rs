//! Source normalizer.
//!
//! Rewrites generated component source into something the sandbox can run
//! with nothing but an in-browser JSX transform: no bundler, no module
//! loader, no type checker.
//!
//! The work is a fixed, ordered list of pure rewrites ([`PIPELINE`]). Each
//! step re-lexes its input, locates candidates on the code-only mask from
//! [`mask_non_code`], and edits the original text by byte range. Nothing
//! inside string literals, template text or comments is ever touched.
//!
//! Every step only removes syntax the runtime cannot parse. Logic is never
//! restructured, with one exception: `export default <expression>` becomes a
//! `const DefaultExport = <expression>` binding so the value stays reachable.

use crate::lexer::{SpanKind, is_ident_byte, mask_non_code, tokenize};
use serde::{Deserialize, Serialize};

/// Name bound to an anonymous `export default` expression.
pub const DEFAULT_EXPORT_BINDING: &str = "DefaultExport";

/// Hook and factory names whose generic argument lists are stripped.
pub const GENERIC_HOOKS: &[&str] = &[
    "useState",
    "useRef",
    "useMemo",
    "useCallback",
    "useContext",
    "useReducer",
    "createContext",
    "forwardRef",
];

/// Members of the UI runtime namespace that are rewritten to bare names.
/// Any `use*` hook is rewritten as well.
pub const BARE_RUNTIME_MEMBERS: &[&str] = &[
    "Fragment",
    "createContext",
    "forwardRef",
    "memo",
    "lazy",
    "Suspense",
];

const DIRECTIVES: &[&str] = &["use client", "use strict", "use server"];

const PRIMITIVE_TYPES: &[&str] = &[
    "string", "number", "boolean", "any", "unknown", "object", "never",
];

pub type Rewrite = fn(&str) -> String;

/// The rewrite steps in the order [`normalize`] applies them.
pub const PIPELINE: &[(&str, Rewrite)] = &[
    ("directives", strip_directives),
    ("imports", strip_imports),
    ("exports", strip_exports),
    ("type-declarations", strip_type_declarations),
    ("hook-generics", strip_hook_generics),
    ("type-annotations", strip_type_annotations),
    ("runtime-qualifiers", strip_runtime_qualifiers),
];

pub fn normalize(source: &str) -> String {
    PIPELINE
        .iter()
        .fold(source.to_string(), |text, (_, step)| step(&text))
}

/// One binding introduced by an `import` statement. `imported` is
/// `"default"` for default imports and `"*"` for namespace imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub module: String,
    pub imported: String,
    pub local: String,
}

impl ImportBinding {
    pub fn is_namespace(&self) -> bool {
        self.imported == "*"
    }

    pub fn is_default(&self) -> bool {
        self.imported == "default"
    }
}

/// Lists the bindings the stripped `import` statements would have created,
/// so the runtime can supply them from loaded libraries or shims.
/// Type-only imports are skipped.
pub fn collect_imports(source: &str) -> Vec<ImportBinding> {
    let code = Code::new(source);
    let mut out = Vec::new();
    for stmt in import_statements(&code) {
        let clause = stmt.clause.as_str();
        if clause.is_empty() || clause.starts_with("type ") || clause.starts_with("type{") {
            continue;
        }
        parse_import_clause(clause, &stmt.module, &mut out);
    }
    out
}

fn parse_import_clause(clause: &str, module: &str, out: &mut Vec<ImportBinding>) {
    let (head, named) = match clause.find('{') {
        Some(i) => (&clause[..i], clause[i + 1..].split('}').next()),
        None => (clause, None),
    };
    let mut push = |imported: &str, local: &str| {
        if is_identifier(local) {
            out.push(ImportBinding {
                module: module.to_string(),
                imported: imported.to_string(),
                local: local.to_string(),
            });
        }
    };
    for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('*') {
            Some(rest) => {
                let local = rest.trim().strip_prefix("as").map(str::trim).unwrap_or("");
                push("*", local);
            }
            None => push("default", part),
        }
    }
    for part in named.unwrap_or("").split(',').map(str::trim) {
        if part.is_empty() || part.starts_with("type ") {
            continue;
        }
        match part.split_once(" as ") {
            Some((imported, local)) => push(imported.trim(), local.trim()),
            None => push(part, part),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if !b.is_ascii_digit() && is_ident_byte(b) => bytes.all(is_ident_byte),
        _ => false,
    }
}

/// Removes `'use client'`-style directive statements.
pub fn strip_directives(source: &str) -> String {
    let code = Code::new(source);
    let mut edits = Edits::default();
    for span in tokenize(source).iter().filter(|s| s.kind == SpanKind::Str) {
        let body = span.text(source).trim_matches(|c| c == '\'' || c == '"');
        if !DIRECTIVES.contains(&body) || !code.only_ws_before_on_line(span.start) {
            continue;
        }
        let mut end = span.end;
        let after = code.skip_inline_ws(end);
        if code.byte(after) == Some(b';') {
            end = after + 1;
        }
        let rest = code.skip_inline_ws(end);
        if matches!(code.byte(rest), None | Some(b'\n' | b'\r')) {
            edits.remove(span.start, end);
        }
    }
    edits.apply(source)
}

/// Removes top-level static `import` statements. Dynamic `import()` and
/// `import.meta` are left alone.
pub fn strip_imports(source: &str) -> String {
    let code = Code::new(source);
    let mut edits = Edits::default();
    for stmt in import_statements(&code) {
        edits.remove(stmt.start, stmt.end);
    }
    edits.apply(source)
}

/// Removes or unwraps top-level `export` forms.
pub fn strip_exports(source: &str) -> String {
    let code = Code::new(source);
    let depths = code.depths();
    let mut edits = Edits::default();
    for pos in code.words("export") {
        if depths[pos] != 0 || !code.at_statement_start(pos) {
            continue;
        }
        let after = code.skip_ws(pos + "export".len());
        if code.word_at(after, "default") {
            let value = code.skip_ws(after + "default".len());
            if ["function", "class", "async"]
                .iter()
                .any(|w| code.word_at(value, w))
            {
                edits.remove(pos, value);
            } else if let Some(end) = code.bare_identifier_statement(value) {
                edits.remove(pos, end);
            } else {
                edits.replace(pos, value, format!("const {DEFAULT_EXPORT_BINDING} = "));
            }
            continue;
        }
        match code.byte(after) {
            Some(b'{') => {
                let Some(close) = code.matching(after) else {
                    continue;
                };
                let mut end = close + 1;
                let next = code.skip_ws(end);
                if code.word_at(next, "from") {
                    end = code.string_after(next).unwrap_or(end);
                }
                edits.remove(pos, code.eat_semicolon(end));
            }
            Some(b'*') => {
                if let Some(end) = code.string_after(after) {
                    edits.remove(pos, code.eat_semicolon(end));
                }
            }
            _ => {
                let declares = [
                    "const",
                    "let",
                    "var",
                    "function",
                    "class",
                    "async",
                    "interface",
                    "type",
                    "enum",
                ]
                .iter()
                .any(|w| code.word_at(after, w));
                if declares {
                    edits.remove(pos, after);
                }
            }
        }
    }
    edits.apply(source)
}

/// Removes `interface` declarations and `type` aliases.
pub fn strip_type_declarations(source: &str) -> String {
    let code = Code::new(source);
    let depths = code.depths();
    let mut edits = Edits::default();

    for pos in code.words("interface") {
        if depths[pos] != 0 || !code.at_statement_start(pos) {
            continue;
        }
        let name = code.skip_ws(pos + "interface".len());
        let Some(name_end) = code.ident_end(name) else {
            continue;
        };
        let Some(open) = code.find_before(name_end, b'{', b';') else {
            continue;
        };
        if let Some(close) = code.matching(open) {
            edits.remove(pos, code.eat_semicolon(close + 1));
        }
    }

    for pos in code.words("type") {
        if depths[pos] != 0 || !code.at_statement_start(pos) {
            continue;
        }
        let name = code.skip_ws(pos + "type".len());
        if name == pos + "type".len() {
            continue;
        }
        let Some(mut cursor) = code.ident_end(name) else {
            continue;
        };
        cursor = code.skip_ws(cursor);
        if code.byte(cursor) == Some(b'<') {
            let Some(close) = code.matching_angle(cursor) else {
                continue;
            };
            cursor = code.skip_ws(close + 1);
        }
        if code.byte(cursor) != Some(b'=') || matches!(code.byte(cursor + 1), Some(b'=' | b'>')) {
            continue;
        }
        edits.remove(pos, code.type_alias_end(cursor + 1));
    }
    edits.apply(source)
}

/// Drops `<...>` type arguments from calls to well-known hooks, e.g.
/// `useState<string>("")`.
pub fn strip_hook_generics(source: &str) -> String {
    let code = Code::new(source);
    let mut edits = Edits::default();
    for hook in GENERIC_HOOKS {
        for pos in code.members(hook) {
            let open = pos + hook.len();
            if code.byte(open) != Some(b'<') {
                continue;
            }
            let Some(close) = code.matching_angle(open) else {
                continue;
            };
            if code.byte(code.skip_ws(close + 1)) == Some(b'(') {
                edits.remove(open, close + 1);
            }
        }
    }
    edits.apply(source)
}

/// Removes parameter, return, variable and cast annotations.
pub fn strip_type_annotations(source: &str) -> String {
    let code = Code::new(source);
    let mut edits = Edits::default();

    for pos in code.words("function") {
        if !code.function_position(pos) || code.in_jsx_text(pos) {
            continue;
        }
        let mut cursor = code.skip_ws(pos + "function".len());
        if code.byte(cursor) == Some(b'*') {
            cursor = code.skip_ws(cursor + 1);
        }
        if let Some(end) = code.ident_end(cursor) {
            cursor = code.skip_ws(end);
        }
        if code.byte(cursor) == Some(b'<') {
            let Some(close) = code.matching_angle(cursor) else {
                continue;
            };
            edits.remove(cursor, close + 1);
            cursor = code.skip_ws(close + 1);
        }
        if code.byte(cursor) != Some(b'(') {
            continue;
        }
        let Some(close) = code.matching(cursor) else {
            continue;
        };
        code.strip_params(cursor, close, &mut edits);
        let colon = code.skip_ws(close + 1);
        if code.byte(colon) == Some(b':') {
            let body_start = colon + 1;
            let end = code.type_end(body_start, |b, j| {
                b[j] == b'{' && b[body_start..j].iter().any(|c| !c.is_ascii_whitespace())
            });
            if code.byte(end) == Some(b'{') {
                edits.remove(colon, code.trim_back(end));
            }
        }
    }

    for (open, byte) in code.masked.iter().enumerate() {
        if *byte != b'(' {
            continue;
        }
        let Some(close) = code.matching(open) else {
            continue;
        };
        let after = code.skip_ws(close + 1);
        if code.starts_with(after, "=>") {
            if !code.in_jsx_text(open) {
                code.strip_params(open, close, &mut edits);
            }
        } else if code.byte(after) == Some(b':')
            && let Some(arrow) = code.arrow_return_end(after + 1)
            && !code.in_jsx_text(open)
        {
            code.strip_params(open, close, &mut edits);
            edits.remove(after, code.trim_back(arrow));
        }
    }

    for keyword in ["const", "let", "var"] {
        for pos in code.words(keyword) {
            let target = code.skip_ws(pos + keyword.len());
            let pattern_end = match code.byte(target) {
                Some(b'{' | b'[') => code.matching(target).map(|c| c + 1),
                _ => code.ident_end(target),
            };
            let Some(pattern_end) = pattern_end else {
                continue;
            };
            let colon = code.skip_ws(pattern_end);
            if code.byte(colon) != Some(b':') {
                continue;
            }
            let end = code.type_end(colon + 1, |b, j| {
                b[j] == b';' || (b[j] == b'=' && b.get(j + 1) != Some(&b'>'))
            });
            edits.remove(colon, code.trim_back(end));
        }
    }

    for pos in code.words("as") {
        if let Some((start, end)) = code.cast_range(pos) {
            edits.remove(start, end);
        }
    }

    edits.apply(source)
}

/// Rewrites `React.useState` and friends to bare identifiers.
pub fn strip_runtime_qualifiers(source: &str) -> String {
    let code = Code::new(source);
    let mut edits = Edits::default();
    for pos in code.words("React") {
        let member = pos + "React".len();
        if code.byte(member) != Some(b'.') {
            continue;
        }
        let Some(end) = code.ident_end(member + 1) else {
            continue;
        };
        let name = &source[member + 1..end];
        let is_hook = name.len() > 3
            && name.starts_with("use")
            && name.as_bytes()[3].is_ascii_uppercase();
        if is_hook || BARE_RUNTIME_MEMBERS.contains(&name) {
            edits.remove(pos, member + 1);
        }
    }
    edits.apply(source)
}

struct ImportStatement {
    start: usize,
    end: usize,
    clause: String,
    module: String,
}

fn import_statements(code: &Code) -> Vec<ImportStatement> {
    let spans = tokenize(code.text);
    let depths = code.depths();
    let mut out = Vec::new();
    for pos in code.words("import") {
        if depths[pos] != 0 || !code.at_statement_start(pos) {
            continue;
        }
        let keyword_end = pos + "import".len();
        if matches!(code.byte(code.skip_ws(keyword_end)), Some(b'(' | b'.')) {
            continue;
        }
        let Some(spec) = spans
            .iter()
            .find(|s| s.kind == SpanKind::Str && s.start >= keyword_end)
        else {
            continue;
        };
        let clause = &code.masked[keyword_end..spec.start];
        if clause.contains(&b';') {
            continue;
        }
        let clause = String::from_utf8_lossy(clause);
        let clause = clause.trim();
        let clause = clause.strip_suffix("from").unwrap_or(clause).trim();
        out.push(ImportStatement {
            start: pos,
            end: code.eat_semicolon(spec.end),
            clause: clause.to_string(),
            module: spec
                .text(code.text)
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string(),
        });
    }
    out
}

/// Byte-range edits against the original text, applied in one pass.
#[derive(Default)]
struct Edits(Vec<(usize, usize, String)>);

impl Edits {
    fn remove(&mut self, start: usize, end: usize) {
        self.replace(start, end, String::new());
    }

    fn replace(&mut self, start: usize, end: usize, with: String) {
        if end >= start {
            self.0.push((start, end, with));
        }
    }

    /// Overlapping edits keep the one that starts first.
    fn apply(mut self, text: &str) -> String {
        self.0.sort_by_key(|(start, end, _)| (*start, *end));
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end, with) in self.0 {
            if start < cursor
                || end > text.len()
                || !text.is_char_boundary(start)
                || !text.is_char_boundary(end)
            {
                continue;
            }
            out.push_str(&text[cursor..start]);
            out.push_str(&with);
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

/// Original text plus its code-only mask.
struct Code<'a> {
    text: &'a str,
    masked: Vec<u8>,
}

impl<'a> Code<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            masked: mask_non_code(text).into_bytes(),
        }
    }

    fn byte(&self, i: usize) -> Option<u8> {
        self.masked.get(i).copied()
    }

    fn starts_with(&self, i: usize, s: &str) -> bool {
        self.masked
            .get(i..)
            .is_some_and(|rest| rest.starts_with(s.as_bytes()))
    }

    fn skip_ws(&self, mut i: usize) -> usize {
        while self.byte(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        i
    }

    fn skip_inline_ws(&self, mut i: usize) -> usize {
        while matches!(self.byte(i), Some(b' ' | b'\t')) {
            i += 1;
        }
        i
    }

    fn trim_back(&self, mut end: usize) -> usize {
        while end > 0 && self.masked[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        end
    }

    fn prev_non_ws(&self, i: usize) -> Option<u8> {
        self.masked[..i]
            .iter()
            .rev()
            .find(|b| !b.is_ascii_whitespace())
            .copied()
    }

    fn only_ws_before_on_line(&self, i: usize) -> bool {
        self.masked[..i]
            .iter()
            .rev()
            .take_while(|b| **b != b'\n')
            .all(|b| b.is_ascii_whitespace())
    }

    /// `function` where a declaration or a function expression can start.
    fn function_position(&self, i: usize) -> bool {
        let Some(prev) = self.prev_non_ws(i) else {
            return true;
        };
        if self.only_ws_before_on_line(i) {
            return true;
        }
        match prev {
            b'=' | b'(' | b',' | b':' | b';' | b'{' | b'}' | b'!' | b'?' | b'&' | b'|' | b'[' => {
                true
            }
            b'>' => {
                let at = self.trim_back(i) - 1;
                at > 0 && self.masked[at - 1] == b'='
            }
            b if is_ident_byte(b) => {
                let end = self.trim_back(i);
                let mut start = end;
                while start > 0 && is_ident_byte(self.masked[start - 1]) {
                    start -= 1;
                }
                matches!(
                    &self.text[start..end],
                    "export" | "default" | "async" | "return"
                )
            }
            _ => false,
        }
    }

    /// Whether `i` sits in the text children of a JSX element: the nearest
    /// code boundary before it is a tag's closing `>`, and the next tag
    /// follows with only balanced expression containers in between.
    fn in_jsx_text(&self, i: usize) -> bool {
        let b = &self.masked;
        let mut j = i;
        let after_tag = loop {
            if j == 0 {
                break false;
            }
            j -= 1;
            match b[j] {
                b'>' => break j == 0 || b[j - 1] != b'=',
                b'}' => match self.matching_back(j) {
                    Some(open) => j = open,
                    None => break false,
                },
                b';' | b'{' | b'=' => break false,
                _ => {}
            }
        };
        if !after_tag {
            return false;
        }
        let mut depth = 0usize;
        for c in &b[i..] {
            match c {
                b'<' => return depth == 0,
                b'{' => depth += 1,
                b'}' if depth == 0 => return false,
                b'}' => depth -= 1,
                b';' if depth == 0 => return false,
                _ => {}
            }
        }
        false
    }

    fn matching_back(&self, close: usize) -> Option<usize> {
        let mut depth = 0usize;
        for j in (0..=close).rev() {
            match self.masked[j] {
                b'}' => depth += 1,
                b'{' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn at_statement_start(&self, i: usize) -> bool {
        matches!(self.prev_non_ws(i), None | Some(b';' | b'}' | b'{'))
            || self.only_ws_before_on_line(i)
    }

    fn ident_end(&self, i: usize) -> Option<usize> {
        let first = self.byte(i)?;
        if first.is_ascii_digit() || !is_ident_byte(first) {
            return None;
        }
        let mut end = i + 1;
        while self.byte(end).is_some_and(is_ident_byte) {
            end += 1;
        }
        Some(end)
    }

    fn bounded(&self, i: usize, len: usize, allow_member: bool) -> bool {
        let before_ok = i == 0 || {
            let prev = self.masked[i - 1];
            !is_ident_byte(prev) && (allow_member || prev != b'.')
        };
        before_ok && !self.byte(i + len).is_some_and(is_ident_byte)
    }

    fn word_at(&self, i: usize, word: &str) -> bool {
        self.starts_with(i, word) && self.bounded(i, word.len(), false)
    }

    /// Standalone occurrences of `word` in code.
    fn words(&self, word: &str) -> Vec<usize> {
        self.occurrences(word, false)
    }

    /// Occurrences of `word` in code, including as a member (`a.word`).
    fn members(&self, word: &str) -> Vec<usize> {
        self.occurrences(word, true)
    }

    fn occurrences(&self, word: &str, allow_member: bool) -> Vec<usize> {
        let needle = word.as_bytes();
        if needle.is_empty() || self.masked.len() < needle.len() {
            return Vec::new();
        }
        (0..=self.masked.len() - needle.len())
            .filter(|&i| {
                self.masked[i..].starts_with(needle) && self.bounded(i, needle.len(), allow_member)
            })
            .collect()
    }

    /// Brace depth before each byte, plus one trailing entry.
    fn depths(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.masked.len() + 1);
        let mut depth = 0u32;
        for b in &self.masked {
            out.push(depth);
            match b {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        out.push(depth);
        out
    }

    fn matching(&self, open: usize) -> Option<usize> {
        let (o, c) = match self.byte(open)? {
            b'{' => (b'{', b'}'),
            b'(' => (b'(', b')'),
            b'[' => (b'[', b']'),
            _ => return None,
        };
        let mut depth = 0usize;
        for (i, b) in self.masked.iter().enumerate().skip(open) {
            if *b == o {
                depth += 1;
            } else if *b == c {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Matches a `<` to its `>`, skipping the `>` of `=>`. Gives up at a
    /// statement boundary.
    fn matching_angle(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in open..self.masked.len() {
            match self.masked[i] {
                b'<' => depth += 1,
                b'>' if i > 0 && self.masked[i - 1] == b'=' => {}
                b'>' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                b';' => return None,
                _ => {}
            }
        }
        None
    }

    /// First `target` byte at or after `from`, unless `stop` comes first.
    fn find_before(&self, from: usize, target: u8, stop: u8) -> Option<usize> {
        for i in from..self.masked.len() {
            match self.masked[i] {
                b if b == target => return Some(i),
                b if b == stop => return None,
                _ => {}
            }
        }
        None
    }

    /// End of the first string literal after `from`.
    fn string_after(&self, from: usize) -> Option<usize> {
        tokenize(self.text)
            .into_iter()
            .find(|s| s.kind == SpanKind::Str && s.start >= from)
            .map(|s| s.end)
    }

    fn eat_semicolon(&self, end: usize) -> usize {
        let next = self.skip_inline_ws(end);
        if self.byte(next) == Some(b';') {
            next + 1
        } else {
            end
        }
    }

    /// `Name;` or `Name` alone on the rest of its line.
    fn bare_identifier_statement(&self, start: usize) -> Option<usize> {
        let end = self.ident_end(start)?;
        let next = self.skip_inline_ws(end);
        match self.byte(next) {
            Some(b';') => Some(next + 1),
            None | Some(b'\n' | b'\r') => Some(end),
            _ => None,
        }
    }

    /// Scans a type expression starting at `from`. Stops at the first
    /// depth-zero position accepted by `stop`, or at an unmatched closer.
    fn type_end(&self, from: usize, stop: impl Fn(&[u8], usize) -> bool) -> usize {
        let b = &self.masked;
        let mut depth = 0usize;
        let mut i = from;
        while i < b.len() {
            if depth == 0 && stop(b, i) {
                return i;
            }
            match b[i] {
                b'(' | b'[' | b'{' | b'<' => depth += 1,
                b'>' if i > 0 && b[i - 1] == b'=' => {}
                b')' | b']' | b'}' | b'>' => {
                    if depth == 0 {
                        return i;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            i += 1;
        }
        b.len()
    }

    /// End of a `type X = ...` alias body. A newline ends it unless the
    /// union or intersection continues across lines.
    fn type_alias_end(&self, from: usize) -> usize {
        let original = self.text.as_bytes();
        let mut depth = 0usize;
        let mut i = from;
        while i < self.masked.len() {
            match self.masked[i] {
                b';' if depth == 0 => return i + 1,
                b'\n' if depth == 0 => {
                    let before = original[from..i]
                        .iter()
                        .rev()
                        .find(|b| !b.is_ascii_whitespace());
                    let after = self.byte(self.skip_ws(i));
                    let continues = matches!(before, None | Some(b'=' | b'|' | b'&' | b','))
                        || matches!(after, Some(b'|' | b'&'));
                    if !continues {
                        return i;
                    }
                }
                b'(' | b'[' | b'{' | b'<' => depth += 1,
                b'>' if self.masked[i - 1] == b'=' => {}
                b')' | b']' | b'}' | b'>' => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
        self.masked.len()
    }

    /// Removes `: Type` and `?` markers inside the parameter list
    /// `open..close`. Default values are skipped.
    fn strip_params(&self, open: usize, close: usize, edits: &mut Edits) {
        let b = &self.masked;
        let mut depth = 0usize;
        let mut in_default = false;
        let mut i = open + 1;
        while i < close {
            match b[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => in_default = false,
                b'=' if depth == 0 && b.get(i + 1) != Some(&b'>') => in_default = true,
                b':' if depth == 0 && !in_default => {
                    let start = if b[i - 1] == b'?' { i - 1 } else { i };
                    let end = self
                        .type_end(i + 1, |b, j| {
                            b[j] == b',' || (b[j] == b'=' && b.get(j + 1) != Some(&b'>'))
                        })
                        .min(close);
                    edits.remove(start, self.trim_back(end).max(i + 1));
                    i = end;
                    continue;
                }
                b'?' if depth == 0 && !in_default => {
                    let next = self.skip_ws(i + 1);
                    if matches!(self.byte(next), Some(b',' | b')')) {
                        edits.remove(i, i + 1);
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// For `(...): Type =>`, returns the position of `=>`. Only simple type
    /// shapes on one line qualify, which keeps ternaries out.
    fn arrow_return_end(&self, from: usize) -> Option<usize> {
        let mut i = from;
        let mut seen = false;
        while let Some(b) = self.byte(i) {
            match b {
                b'=' if self.byte(i + 1) == Some(b'>') => return seen.then_some(i),
                b' ' | b'\t' => {}
                b'<' | b'>' | b'.' | b',' | b'[' | b']' | b'|' | b'&' => seen = true,
                b if is_ident_byte(b) => seen = true,
                _ => return None,
            }
            i += 1;
        }
        None
    }

    /// Range of ` as Type` / ` as const` starting at the `as` keyword.
    fn cast_range(&self, pos: usize) -> Option<(usize, usize)> {
        let prev = self.prev_non_ws(pos)?;
        if !(is_ident_byte(prev) || matches!(prev, b')' | b']' | b'}')) || self.in_jsx_text(pos) {
            return None;
        }
        let target = self.skip_inline_ws(pos + 2);
        if target == pos + 2 {
            return None;
        }
        let is_const = self.word_at(target, "const");
        let mut end = self.ident_end(target)?;
        let name = &self.text[target..end];
        let is_type = is_const
            || name.as_bytes()[0].is_ascii_uppercase()
            || PRIMITIVE_TYPES.contains(&name);
        if !is_type {
            return None;
        }
        if !is_const {
            loop {
                match self.byte(end) {
                    Some(b'.') => end = self.ident_end(end + 1)?,
                    Some(b'<') => end = self.matching_angle(end)? + 1,
                    Some(b'[') if self.byte(end + 1) == Some(b']') => end += 2,
                    _ => break,
                }
            }
        }
        let follow = self.byte(self.skip_inline_ws(end));
        let closes = match follow {
            None | Some(b')' | b';' | b']' | b'}' | b'\n' | b'\r') => true,
            Some(b',') => is_const,
            _ => false,
        };
        if !closes {
            return None;
        }
        let mut start = pos;
        while start > 0 && matches!(self.masked[start - 1], b' ' | b'\t') {
            start -= 1;
        }
        Some((start, end))
    }
}
