use thiserror::Error;

use crate::language::LanguageReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
}

/// A name-class token. Operators, literals, comments and whitespace never
/// leave the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Why scanning stopped early. Tokens yielded before the fault stay valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexFault {
    #[error("unterminated string starting on line {line}")]
    UnterminatedString { line: usize },
    #[error("end of input inside an open bracket or replacement field")]
    UnexpectedEof,
    #[error("single '}}' is not allowed in an f-string (line {line})")]
    StrayBrace { line: usize },
    #[error("unexpected character after line continuation on line {line}")]
    LineContinuation { line: usize },
    #[error("invalid number literal on line {line}")]
    InvalidNumber { line: usize },
    #[error("unindent does not match any outer indentation level (line {line})")]
    InconsistentDedent { line: usize },
    #[error("inconsistent use of tabs and spaces in indentation (line {line})")]
    MixedIndentation { line: usize },
}

/// Indentation of one open block: column with tabs to multiples of 8, and
/// column with tabs counted as 1. Both must agree in ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Indent {
    col: usize,
    alt: usize,
}

#[derive(Debug, Clone, Copy)]
struct FStr {
    quote: char,
    triple: bool,
    raw: bool,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Code,
    FString(FStr),
    FormatSpec(FStr),
}

#[derive(Debug, Clone, Copy)]
enum Open {
    Paren,
    Square,
    Curly,
    /// `{` opening an f-string replacement field.
    Field(FStr),
}

enum Step<'a> {
    Token(Token<'a>),
    Continue,
    Done,
    Fault(LexFault),
}

/// Single-pass, left-to-right Python lexer yielding names and keywords.
///
/// The iterator is lazy and finite. Characters that cannot start a token and
/// unmatched closing brackets are dropped. On a fault that the 3.12 tokenizer
/// also rejects (unterminated string, bad indentation, malformed number) it
/// records the fault and stops yielding; callers treat the shortened sequence
/// as a normal end.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    reference: &'a LanguageReference,
    modes: Vec<Mode>,
    brackets: Vec<Open>,
    indents: Vec<Indent>,
    at_line_start: bool,
    fault: Option<LexFault>,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, reference: &'a LanguageReference) -> Self {
        Self {
            src,
            pos: 0,
            reference,
            modes: vec![Mode::Code],
            brackets: Vec::new(),
            indents: vec![Indent::default()],
            at_line_start: true,
            fault: None,
            done: false,
        }
    }

    /// The fault that ended scanning, if any.
    pub fn fault(&self) -> Option<&LexFault> {
        self.fault.as_ref()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn line_at(&self, offset: usize) -> usize {
        self.src[..offset].matches('\n').count() + 1
    }

    fn at_triple(&self, quote: char) -> bool {
        self.peek() == Some(quote) && self.peek_nth(1) == Some(quote) && self.peek_nth(2) == Some(quote)
    }

    /// Measure the indentation of a new logical line and check it against
    /// the open blocks. Blank and comment-only lines are ignored, as are lines
    /// inside brackets.
    fn check_indent(&mut self) -> Result<(), LexFault> {
        self.at_line_start = false;
        if !self.brackets.is_empty() || self.modes.len() > 1 {
            return Ok(());
        }
        let start = self.pos;
        let mut here = Indent::default();
        loop {
            match self.peek() {
                Some(' ') => {
                    here.col += 1;
                    here.alt += 1;
                }
                Some('\t') => {
                    here.col = (here.col / 8 + 1) * 8;
                    here.alt += 1;
                }
                Some('\x0c') => here = Indent::default(),
                Some('\u{feff}') if self.pos == 0 => {}
                _ => break,
            }
            self.bump();
        }
        if matches!(self.peek(), None | Some('#' | '\n' | '\r')) {
            return Ok(());
        }

        let top = self.indents.last().copied().unwrap_or_default();
        if here.col == top.col {
            if here.alt != top.alt {
                return Err(LexFault::MixedIndentation { line: self.line_at(start) });
            }
        } else if here.col > top.col {
            if here.alt <= top.alt {
                return Err(LexFault::MixedIndentation { line: self.line_at(start) });
            }
            self.indents.push(here);
        } else {
            while self.indents.len() > 1 && self.indents.last().is_some_and(|i| here.col < i.col) {
                self.indents.pop();
            }
            let outer = self.indents.last().copied().unwrap_or_default();
            if here.col != outer.col {
                return Err(LexFault::InconsistentDedent { line: self.line_at(start) });
            }
            if here.alt != outer.alt {
                return Err(LexFault::MixedIndentation { line: self.line_at(start) });
            }
        }
        Ok(())
    }

    fn scan_code(&mut self) -> Step<'a> {
        if self.at_line_start {
            if let Err(fault) = self.check_indent() {
                return Step::Fault(fault);
            }
        }
        let Some(c) = self.peek() else {
            if self.brackets.is_empty() && self.modes.len() == 1 {
                return Step::Done;
            }
            return Step::Fault(LexFault::UnexpectedEof);
        };

        match c {
            '\n' | '\r' => {
                self.bump();
                if c == '\n' || self.peek() != Some('\n') {
                    self.at_line_start = true;
                }
                Step::Continue
            }
            ' ' | '\t' | '\x0c' | '\u{feff}' => {
                self.bump();
                Step::Continue
            }
            '#' => {
                while let Some(ch) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
                Step::Continue
            }
            '\\' => {
                self.bump();
                match self.peek() {
                    Some('\n') | Some('\r') => {
                        if self.bump() == Some('\r') && self.peek() == Some('\n') {
                            self.bump();
                        }
                        Step::Continue
                    }
                    // Backslash at the very end of input.
                    None => Step::Continue,
                    Some(_) => Step::Fault(LexFault::LineContinuation {
                        line: self.line_at(self.pos),
                    }),
                }
            }
            '"' | '\'' => self.scan_string(""),
            c if is_id_start(c) => self.scan_name(),
            c if c.is_ascii_digit() => self.number_step(),
            '.' => {
                if self.peek_nth(1).is_some_and(|n| n.is_ascii_digit()) {
                    return self.number_step();
                }
                self.bump();
                Step::Continue
            }
            '(' => self.open(Open::Paren),
            '[' => self.open(Open::Square),
            '{' => self.open(Open::Curly),
            ')' | ']' | '}' => self.close(c),
            ':' => {
                self.bump();
                if let Some(Open::Field(f)) = self.brackets.last().copied() {
                    self.modes.push(Mode::FormatSpec(f));
                }
                Step::Continue
            }
            // Operators, and anything else that cannot start a token (`$`,
            // `?`, backticks, stray non-ASCII), are dropped.
            _ => {
                self.bump();
                Step::Continue
            }
        }
    }

    fn open(&mut self, kind: Open) -> Step<'a> {
        self.bump();
        self.brackets.push(kind);
        Step::Continue
    }

    /// Any closer pops one open bracket, matching or not. Closers with
    /// nothing open are dropped. A `}` always ends the replacement field it
    /// sits in, even past a stray `(` or `[`.
    fn close(&mut self, c: char) -> Step<'a> {
        self.bump();
        match self.brackets.last().copied() {
            Some(Open::Field(_)) if c == '}' => self.close_field(),
            Some(Open::Field(_)) | None => {}
            Some(open) => {
                self.brackets.pop();
                let stray_curly = c == '}' && !matches!(open, Open::Curly);
                if stray_curly && matches!(self.brackets.last(), Some(Open::Field(_))) {
                    self.close_field();
                }
            }
        }
        Step::Continue
    }

    /// Leave a replacement field: drop its `{` and the code mode it opened.
    fn close_field(&mut self) {
        self.brackets.pop();
        self.modes.pop();
    }

    fn scan_name(&mut self) -> Step<'a> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            self.bump();
        }
        let text = &self.src[start..self.pos];

        if matches!(self.peek(), Some('"') | Some('\'')) && is_string_prefix(text) {
            return self.scan_string(text);
        }

        let kind = if self.reference.is_keyword(text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Step::Token(Token { kind, text })
    }

    fn number_step(&mut self) -> Step<'a> {
        match self.scan_number() {
            Ok(()) => Step::Continue,
            Err(fault) => Step::Fault(fault),
        }
    }

    /// Consume one numeric literal. A literal may end right before a name
    /// (`1if`), but malformed digits (`0xg`, `1__0`, `012`) are a fault.
    fn scan_number(&mut self) -> Result<(), LexFault> {
        let start = self.pos;
        if self.peek() == Some('.') {
            self.bump();
            return self.number_fraction(start);
        }
        if self.peek() != Some('0') {
            self.decimal_tail(start)?;
            if self.peek() == Some('.') {
                self.bump();
                return self.number_fraction(start);
            }
            return self.number_exponent(start);
        }

        match self.peek_nth(1) {
            Some('x' | 'X') => return self.radix_digits(start, |c: char| c.is_ascii_hexdigit()),
            Some('o' | 'O') => return self.radix_digits(start, |c: char| matches!(c, '0'..='7')),
            Some('b' | 'B') => return self.radix_digits(start, |c: char| matches!(c, '0' | '1')),
            _ => {}
        }
        self.bump();
        loop {
            if self.peek() == Some('_') {
                self.bump();
                if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(self.invalid_number(start));
                }
            }
            if self.peek() != Some('0') {
                break;
            }
            self.bump();
        }
        let nonzero = self.peek().is_some_and(|c| c.is_ascii_digit());
        if nonzero {
            self.decimal_tail(start)?;
        }
        match self.peek() {
            Some('.') => {
                self.bump();
                self.number_fraction(start)
            }
            Some('e' | 'E') => self.number_exponent(start),
            Some('j' | 'J') => {
                self.bump();
                Ok(())
            }
            // Leading zeros are only allowed on floats and imaginaries.
            _ if nonzero => Err(self.invalid_number(start)),
            _ => Ok(()),
        }
    }

    fn invalid_number(&self, start: usize) -> LexFault {
        LexFault::InvalidNumber {
            line: self.line_at(start),
        }
    }

    /// Digits with single `_` separators between them.
    fn decimal_tail(&mut self, start: usize) -> Result<(), LexFault> {
        loop {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.peek() != Some('_') {
                return Ok(());
            }
            self.bump();
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.invalid_number(start));
            }
        }
    }

    fn number_fraction(&mut self, start: usize) -> Result<(), LexFault> {
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.decimal_tail(start)?;
        }
        self.number_exponent(start)
    }

    fn number_exponent(&mut self, start: usize) -> Result<(), LexFault> {
        if matches!(self.peek(), Some('e' | 'E')) {
            match self.peek_nth(1) {
                Some('+' | '-') => {
                    if !self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()) {
                        return Err(self.invalid_number(start));
                    }
                    self.bump_n(2);
                    self.decimal_tail(start)?;
                }
                Some(c) if c.is_ascii_digit() => {
                    self.bump();
                    self.decimal_tail(start)?;
                }
                // `1else`: the `e` starts a name.
                _ => return Ok(()),
            }
        }
        if matches!(self.peek(), Some('j' | 'J')) {
            self.bump();
        }
        Ok(())
    }

    /// `0x`, `0o` and `0b` literals: at least one digit of the radix, and no
    /// decimal digit outside it right after.
    fn radix_digits(&mut self, start: usize, is_digit: fn(char) -> bool) -> Result<(), LexFault> {
        self.bump_n(2);
        loop {
            if self.peek() == Some('_') {
                self.bump();
            }
            if !self.peek().is_some_and(is_digit) {
                return Err(self.invalid_number(start));
            }
            while self.peek().is_some_and(is_digit) {
                self.bump();
            }
            if self.peek() != Some('_') {
                break;
            }
        }
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.invalid_number(start));
        }
        Ok(())
    }

    /// Scan a string literal whose opening quote is at the cursor. F-strings
    /// only enter their literal mode here; the rest is driven by `next`.
    fn scan_string(&mut self, prefix: &str) -> Step<'a> {
        let start = self.pos;
        let lower = prefix.to_ascii_lowercase();
        let raw = lower.contains('r');
        let Some(quote) = self.bump() else {
            return Step::Continue;
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.bump_n(2);
        }

        if lower.contains('f') {
            self.modes.push(Mode::FString(FStr { quote, triple, raw }));
            return Step::Continue;
        }

        loop {
            match self.peek() {
                None => {
                    return Step::Fault(LexFault::UnterminatedString {
                        line: self.line_at(start),
                    })
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('\n') if !triple => {
                    return Step::Fault(LexFault::UnterminatedString {
                        line: self.line_at(start),
                    })
                }
                Some(q) if q == quote => {
                    if !triple {
                        self.bump();
                        return Step::Continue;
                    }
                    if self.at_triple(quote) {
                        self.bump_n(3);
                        return Step::Continue;
                    }
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn scan_fstring_literal(&mut self, f: FStr) -> Step<'a> {
        loop {
            match self.peek() {
                None => {
                    return Step::Fault(LexFault::UnterminatedString {
                        line: self.line_at(self.pos),
                    })
                }
                Some('\\') => {
                    self.bump();
                    if !f.raw && self.peek() == Some('N') && self.peek_nth(1) == Some('{') {
                        // `\N{NAME}` is an escape, not a replacement field.
                        while let Some(ch) = self.bump() {
                            if ch == '}' {
                                break;
                            }
                        }
                    } else if !matches!(self.peek(), Some('{') | Some('}')) {
                        self.bump();
                    }
                }
                Some('\n') if !f.triple => {
                    return Step::Fault(LexFault::UnterminatedString {
                        line: self.line_at(self.pos),
                    })
                }
                Some(q) if q == f.quote => {
                    if !f.triple {
                        self.bump();
                        self.modes.pop();
                        return Step::Continue;
                    }
                    if self.at_triple(q) {
                        self.bump_n(3);
                        self.modes.pop();
                        return Step::Continue;
                    }
                    self.bump();
                }
                Some('{') => {
                    if self.peek_nth(1) == Some('{') {
                        self.bump_n(2);
                    } else {
                        self.bump();
                        self.brackets.push(Open::Field(f));
                        self.modes.push(Mode::Code);
                        return Step::Continue;
                    }
                }
                Some('}') => {
                    if self.peek_nth(1) == Some('}') {
                        self.bump_n(2);
                    } else {
                        return Step::Fault(LexFault::StrayBrace {
                            line: self.line_at(self.pos),
                        });
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn scan_format_spec(&mut self, f: FStr) -> Step<'a> {
        loop {
            match self.peek() {
                None => return Step::Fault(LexFault::UnexpectedEof),
                Some('\n') if !f.triple => {
                    return Step::Fault(LexFault::UnterminatedString {
                        line: self.line_at(self.pos),
                    })
                }
                Some(q) if q == f.quote && (!f.triple || self.at_triple(q)) => {
                    return Step::Fault(LexFault::UnterminatedString {
                        line: self.line_at(self.pos),
                    })
                }
                Some('{') => {
                    self.bump();
                    self.brackets.push(Open::Field(f));
                    self.modes.push(Mode::Code);
                    return Step::Continue;
                }
                Some('}') => {
                    self.bump();
                    // Pop the format spec, then the field it belongs to.
                    self.modes.pop();
                    self.close_field();
                    return Step::Continue;
                }
                Some('\\') => {
                    self.bump();
                    if !matches!(self.peek(), Some('{') | Some('}')) {
                        self.bump();
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.done {
            return None;
        }
        loop {
            let step = match self.modes.last().copied() {
                Some(Mode::FString(f)) => self.scan_fstring_literal(f),
                Some(Mode::FormatSpec(f)) => self.scan_format_spec(f),
                Some(Mode::Code) | None => self.scan_code(),
            };
            match step {
                Step::Token(t) => return Some(t),
                Step::Continue => continue,
                Step::Done => {
                    self.done = true;
                    return None;
                }
                Step::Fault(fault) => {
                    crate::debug_log!("[keyfreq] lexer stopped: {}", fault);
                    self.fault = Some(fault);
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

fn is_id_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

// Non-ASCII marks (combining vowel signs and the like) continue a name too.
fn is_id_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric() || (!c.is_ascii() && !c.is_whitespace())
}

fn is_string_prefix(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "br" | "rb" | "f" | "fr" | "rf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::py312;

    fn names(src: &str) -> Vec<&str> {
        Lexer::new(src, py312()).map(|t| t.text).collect()
    }

    #[test]
    fn method_body_yields_every_name() {
        let src = "def foo(self): return self.__len__()";
        let toks: Vec<Token> = Lexer::new(src, py312()).collect();
        let texts: Vec<&str> = toks.iter().map(|t| t.text).collect();
        assert_eq!(texts, ["def", "foo", "self", "return", "self", "__len__"]);
        assert_eq!(toks[0].kind, TokenKind::Keyword);
        assert_eq!(toks[1].kind, TokenKind::Identifier);
        assert_eq!(toks[3].kind, TokenKind::Keyword);
    }

    #[test]
    fn strings_and_comments_are_skipped() {
        let src = "x = 'len(y)'  # print(z)\ny = \"\"\"\nclass A:\n  pass\n\"\"\"\n";
        assert_eq!(names(src), ["x", "y"]);
    }

    #[test]
    fn prefixed_strings_do_not_leak_the_prefix() {
        let src = "a = rb'\\d+' + br\"x\" + u'y' + R'z'";
        assert_eq!(names(src), ["a"]);
    }

    #[test]
    fn fstring_fields_are_scanned_as_code() {
        let src = r#"msg = f"{len(items)!r:>{width}} and {{not_a_field}}""#;
        assert_eq!(names(src), ["msg", "len", "items", "r", "width"]);
    }

    #[test]
    fn nested_fstring_with_same_quotes() {
        let src = r#"f"{f"{inner}"} {outer}""#;
        assert_eq!(names(src), ["inner", "outer"]);
    }

    #[test]
    fn named_unicode_escape_is_not_a_field() {
        let src = r#"s = f"\N{BULLET} {value}""#;
        assert_eq!(names(src), ["s", "value"]);
    }

    #[test]
    fn number_followed_by_keyword_splits() {
        assert_eq!(names("x = 1if y else 0x1F"), ["x", "if", "y", "else"]);
        assert_eq!(names("z = 1.5e-3j + .5"), ["z"]);
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(names("größe = naïve_ñ"), ["größe", "naïve_ñ"]);
    }

    #[test]
    fn unterminated_triple_string_keeps_earlier_tokens() {
        let src = "import os\nx = '''never closed\ndef ghost(): pass\n";
        let mut lx = Lexer::new(src, py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["import", "os", "x"]);
        assert_eq!(lx.fault(), Some(&LexFault::UnterminatedString { line: 2 }));
        // Fused after a fault.
        assert!(lx.next().is_none());
    }

    #[test]
    fn unclosed_bracket_at_eof_is_a_fault_after_all_tokens() {
        let src = "call(a, b";
        let mut lx = Lexer::new(src, py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["call", "a", "b"]);
        assert_eq!(lx.fault(), Some(&LexFault::UnexpectedEof));
    }

    #[test]
    fn mismatched_closer_is_dropped_and_scanning_goes_on() {
        let mut lx = Lexer::new("a = (b]\nprint(c)", py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["a", "b", "print", "c"]);
        assert!(lx.fault().is_none());

        assert_eq!(names("x = 1)\ny = 2]\nlen(z)"), ["x", "y", "len", "z"]);
    }

    #[test]
    fn stray_characters_are_skipped() {
        assert_eq!(names("a = b $ c\nprint(d)"), ["a", "b", "c", "print", "d"]);
        assert_eq!(names("x = `repr_me`\ny = z ?? w"), ["x", "repr_me", "y", "z", "w"]);
        assert_eq!(names("a =\u{a0}b"), ["a", "b"]);
    }

    #[test]
    fn inconsistent_dedent_stops_scanning() {
        let src = "if x:\n    pass\n  print(y)\nlen(z)";
        let mut lx = Lexer::new(src, py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["if", "x", "pass"]);
        assert_eq!(lx.fault(), Some(&LexFault::InconsistentDedent { line: 3 }));
    }

    #[test]
    fn tab_and_space_mix_stops_scanning() {
        let src = "if x:\n\tpass\n        pass\nlen(z)";
        let mut lx = Lexer::new(src, py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["if", "x", "pass"]);
        assert_eq!(lx.fault(), Some(&LexFault::MixedIndentation { line: 3 }));
    }

    #[test]
    fn indentation_inside_brackets_and_blank_lines_is_free() {
        let src = "def f():\n    x = (1,\n  2)\n\n        # note\n    return x\nf()\n";
        let mut lx = Lexer::new(src, py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["def", "f", "x", "return", "x", "f"]);
        assert!(lx.fault().is_none());
    }

    #[test]
    fn continuation_line_is_not_indentation() {
        let src = "if a:\n    b = 1 + \\\n  2\n    c = 3\n";
        assert_eq!(names(src), ["if", "a", "b", "c"]);
    }

    #[test]
    fn malformed_numbers_stop_scanning() {
        for src in ["x = 0xg\nlen(y)", "x = 1__0\nlen(y)", "x = 012\nlen(y)", "x = 0o8\nlen(y)", "x = 1e+q\nlen(y)"] {
            let mut lx = Lexer::new(src, py312());
            let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
            assert_eq!(got, ["x"], "{src}");
            assert_eq!(lx.fault(), Some(&LexFault::InvalidNumber { line: 1 }), "{src}");
        }
    }

    #[test]
    fn well_formed_numbers_pass() {
        let src = "n = [0, 00, 0_0, 1_000, 0x_ff, 0o17, 0b1_0, 09.5, 012j, 1e10, 1else 2]";
        let mut lx = Lexer::new(src, py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["n", "else"]);
        assert!(lx.fault().is_none());
    }

    #[test]
    fn backslash_before_code_stops_scanning() {
        let mut lx = Lexer::new("a = 1\nb \\ c", py312());
        let got: Vec<&str> = lx.by_ref().map(|t| t.text).collect();
        assert_eq!(got, ["a", "b"]);
        assert_eq!(lx.fault(), Some(&LexFault::LineContinuation { line: 2 }));
    }

    #[test]
    fn line_continuation_and_crlf() {
        assert_eq!(names("x = a + \\\r\n    b\r\n"), ["x", "a", "b"]);
    }

    #[test]
    fn clean_input_has_no_fault() {
        let mut lx = Lexer::new("match x:\n    case _: pass\n", py312());
        let kinds: Vec<TokenKind> = lx.by_ref().map(|t| t.kind).collect();
        assert!(kinds.iter().filter(|k| **k == TokenKind::Keyword).count() >= 4);
        assert!(lx.fault().is_none());
    }
}
