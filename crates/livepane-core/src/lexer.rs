//! Span lexer for generated component source.
//!
//! Splits source text into contiguous spans of code, string literals,
//! template literals, comments and regex literals. It does not tokenize
//! code any further: every consumer (balance scanner, normalizer, entry
//! resolver, runtime minifier) only needs to know which bytes are *code*.
//!
//! Template interpolations (`${ ... }`) are emitted as code spans; the
//! `${` and closing `}` delimiters belong to the surrounding template span.
//!
//! Single and double quoted strings cannot span lines in JavaScript, so an
//! unterminated quote ends at the next newline. This keeps a stray
//! apostrophe in JSX text (`Don't`) from swallowing the rest of the file.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Code,
    Str,
    Template,
    LineComment,
    BlockComment,
    Regex,
}

impl SpanKind {
    pub fn is_comment(self) -> bool {
        matches!(self, SpanKind::LineComment | SpanKind::BlockComment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_code(&self) -> bool {
        self.kind == SpanKind::Code
    }
}

enum State {
    Code,
    Str(char),
    StrEscape(char),
    Template,
    TemplateEscape,
    LineComment,
    BlockComment,
    BlockCommentEnd,
    Regex,
    RegexEscape,
    RegexClass,
    RegexClassEscape,
}

struct Lexer {
    spans: Vec<Span>,
    kind: SpanKind,
    start: usize,
    depth: usize,
    template_stack: Vec<usize>,
    last_significant: Option<char>,
}

impl Lexer {
    fn new() -> Self {
        Self {
            spans: Vec::new(),
            kind: SpanKind::Code,
            start: 0,
            depth: 0,
            template_stack: Vec::new(),
            last_significant: None,
        }
    }

    fn switch(&mut self, at: usize, kind: SpanKind) {
        if at > self.start {
            self.spans.push(Span {
                kind: self.kind,
                start: self.start,
                end: at,
            });
        }
        self.kind = kind;
        self.start = at;
    }

    fn finish(mut self, len: usize) -> Vec<Span> {
        self.switch(len, SpanKind::Code);
        self.spans
    }
}

/// Regex literals may only start where an expression is expected.
fn regex_allowed(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => matches!(
            c,
            '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | ';'
        ),
    }
}

pub fn tokenize(source: &str) -> Vec<Span> {
    let mut lx = Lexer::new();
    let mut state = State::Code;
    let mut chars = source.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        let next_pos = pos + ch.len_utf8();
        match state {
            State::Code => match ch {
                '"' | '\'' => {
                    lx.switch(pos, SpanKind::Str);
                    state = State::Str(ch);
                }
                '`' => {
                    lx.switch(pos, SpanKind::Template);
                    state = State::Template;
                }
                '/' => match chars.peek().map(|(_, c)| *c) {
                    Some('/') => {
                        chars.next();
                        lx.switch(pos, SpanKind::LineComment);
                        state = State::LineComment;
                    }
                    Some('*') => {
                        chars.next();
                        lx.switch(pos, SpanKind::BlockComment);
                        state = State::BlockComment;
                    }
                    _ if regex_allowed(lx.last_significant) => {
                        lx.switch(pos, SpanKind::Regex);
                        state = State::Regex;
                    }
                    _ => lx.last_significant = Some('/'),
                },
                '{' => {
                    lx.depth += 1;
                    lx.last_significant = Some('{');
                }
                '}' => {
                    if lx.template_stack.last() == Some(&lx.depth) {
                        lx.template_stack.pop();
                        lx.switch(pos, SpanKind::Template);
                        state = State::Template;
                    } else {
                        lx.depth = lx.depth.saturating_sub(1);
                        lx.last_significant = Some('}');
                    }
                }
                c if c.is_whitespace() => {}
                c => lx.last_significant = Some(c),
            },
            State::Str(quote) => {
                if ch == '\\' {
                    state = State::StrEscape(quote);
                } else if ch == quote {
                    lx.switch(next_pos, SpanKind::Code);
                    lx.last_significant = Some(quote);
                    state = State::Code;
                } else if ch == '\n' {
                    lx.switch(pos, SpanKind::Code);
                    state = State::Code;
                }
            }
            State::StrEscape(quote) => state = State::Str(quote),
            State::Template => match ch {
                '\\' => state = State::TemplateEscape,
                '`' => {
                    lx.switch(next_pos, SpanKind::Code);
                    lx.last_significant = Some('`');
                    state = State::Code;
                }
                '$' if chars.peek().map(|(_, c)| *c) == Some('{') => {
                    chars.next();
                    lx.template_stack.push(lx.depth);
                    lx.switch(next_pos + 1, SpanKind::Code);
                    lx.last_significant = Some('{');
                    state = State::Code;
                }
                _ => {}
            },
            State::TemplateEscape => state = State::Template,
            State::LineComment => {
                if ch == '\n' {
                    lx.switch(pos, SpanKind::Code);
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if ch == '*' {
                    state = State::BlockCommentEnd;
                }
            }
            State::BlockCommentEnd => {
                if ch == '/' {
                    lx.switch(next_pos, SpanKind::Code);
                    state = State::Code;
                } else if ch != '*' {
                    state = State::BlockComment;
                }
            }
            State::Regex => match ch {
                '\\' => state = State::RegexEscape,
                '[' => state = State::RegexClass,
                '/' => {
                    lx.switch(next_pos, SpanKind::Code);
                    lx.last_significant = Some('/');
                    state = State::Code;
                }
                '\n' => {
                    // Not a regex after all; fold it back into code.
                    lx.kind = SpanKind::Code;
                    state = State::Code;
                }
                _ => {}
            },
            State::RegexEscape => state = State::Regex,
            State::RegexClass => match ch {
                '\\' => state = State::RegexClassEscape,
                ']' => state = State::Regex,
                '\n' => {
                    lx.kind = SpanKind::Code;
                    state = State::Code;
                }
                _ => {}
            },
            State::RegexClassEscape => state = State::RegexClass,
        }
    }

    lx.finish(source.len())
}

/// Returns a copy of `source` where every byte outside code spans is
/// replaced by a space. Byte offsets are preserved, so positions found in
/// the mask can be used to edit the original text.
pub fn mask_non_code(source: &str) -> String {
    let mut bytes = source.as_bytes().to_vec();
    for span in tokenize(source) {
        if span.is_code() {
            continue;
        }
        for b in &mut bytes[span.start..span.end] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    // Code spans always cover whole chars and everything else is ASCII now.
    String::from_utf8(bytes).unwrap_or_default()
}

/// Net open-minus-close counts for the three bracket families, computed
/// over code spans only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub braces: i64,
    pub parens: i64,
    pub brackets: i64,
}

impl Balance {
    pub fn is_balanced(&self) -> bool {
        self.braces == 0 && self.parens == 0 && self.brackets == 0
    }
}

pub fn count_balance(source: &str) -> Balance {
    let mut balance = Balance::default();
    for span in tokenize(source).iter().filter(|s| s.is_code()) {
        for b in span.text(source).bytes() {
            match b {
                b'{' => balance.braces += 1,
                b'}' => balance.braces -= 1,
                b'(' => balance.parens += 1,
                b')' => balance.parens -= 1,
                b'[' => balance.brackets += 1,
                b']' => balance.brackets -= 1,
                _ => {}
            }
        }
    }
    balance
}

pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}
