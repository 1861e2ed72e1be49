//! The eJSON/JSONEE pushdown sub-parser: turns the embedded-expression
//! syntax found in attribute values and text content into a [`VcmNode`]
//! tree.
//!
//! Structured as a byte-scanning lexer (a struct holding the shared
//! reader and a diagnostics sink, `peek`/`bump`/`span_from` helpers, one
//! function per literal kind) generalized from a flat token stream to a
//! tree-building parser, since this sub-parser's contract is "return one
//! expression tree", not "return the next token".

use crate::error::EjsonError;
use base64::Engine;
use purc_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, ErrorKind};
use purc_source::{FileId, Reader, Span};
use purc_vcm::{CjsoneeOp, KeyValue, VcmKind, VcmNode};
use std::cell::Cell;
use std::rc::Rc;

/// Default nesting-depth bound, matching the default
/// `purc_config::ParserConfig::max_ejson_depth` a caller would otherwise
/// wire in.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Parses one eJSON/JSONEE value (and, if followed by `&&`/`||`/`;;`, a
/// CJSONEE sequence of them) from `reader`, stopping before the first
/// character for which `terminator` returns `true`.
///
/// `terminator` never sees characters inside a quoted string or a
/// bracketed construct — only characters that could begin or continue a
/// bare value at the top level. On error, a diagnostic has already been
/// pushed onto `sink`; the returned [`EjsonError`] just names what kind.
pub fn parse_until(
    reader: &mut Reader,
    file: FileId,
    sink: &DiagnosticSink,
    max_depth: u32,
    mut terminator: impl FnMut(char) -> bool,
) -> Result<VcmNode, EjsonError> {
    let mut parser = EjsonParser::new(reader, file, sink, max_depth);
    parser.skip_ws()?;
    let start = parser.pos();
    let operand = parser.parse_top_operand(&mut terminator, start)?;
    parser.maybe_cjsonee(operand, &mut terminator)
}

struct EjsonParser<'a, 'r> {
    reader: &'r mut Reader<'a>,
    file: FileId,
    sink: &'r DiagnosticSink,
    max_depth: u32,
    depth: Rc<Cell<u32>>,
}

struct DepthGuard {
    depth: Rc<Cell<u32>>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

impl<'a, 'r> EjsonParser<'a, 'r> {
    fn new(reader: &'r mut Reader<'a>, file: FileId, sink: &'r DiagnosticSink, max_depth: u32) -> Self {
        Self {
            reader,
            file,
            sink,
            max_depth,
            depth: Rc::new(Cell::new(0)),
        }
    }

    fn pos(&self) -> u32 {
        self.reader.peek_position().offset
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(self.file, start, self.pos())
    }

    fn err(&self, kind: ErrorKind, span: Span) -> EjsonError {
        self.sink
            .emit(Diagnostic::error(DiagnosticCode::new(kind), kind.name(), span));
        EjsonError::new(kind, span)
    }

    fn bump(&mut self) -> Result<Option<char>, EjsonError> {
        match self.reader.read() {
            Ok(c) => Ok(c),
            Err(e) => {
                let span = Span::new(self.file, e.pos, e.pos);
                Err(self.err(ErrorKind::InvalidUtf8Character, span))
            }
        }
    }

    fn peek(&mut self) -> Result<Option<char>, EjsonError> {
        match self.bump()? {
            Some(c) => {
                self.reader.unread();
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    fn unread(&mut self) {
        self.reader.unread();
    }

    fn skip_ws(&mut self) -> Result<(), EjsonError> {
        while let Some(c) = self.peek()? {
            if c.is_whitespace() {
                self.bump()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn enter_scope(&mut self, start: u32) -> Result<DepthGuard, EjsonError> {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        if depth > self.max_depth {
            return Err(self.err(ErrorKind::MaxDepthExceeded, self.span_from(start)));
        }
        Ok(DepthGuard {
            depth: Rc::clone(&self.depth),
        })
    }

    fn scan_word(&mut self) -> Result<String, EjsonError> {
        let mut word = String::new();
        while let Some(c) = self.peek()? {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump()?;
                word.push(c);
            } else {
                break;
            }
        }
        Ok(word)
    }

    // --- top-level dispatch -------------------------------------------------

    /// Lenient entry: anything that isn't a recognized eJSON value form
    /// (a bare word that isn't a keyword, or a character that starts
    /// nothing in particular) degrades to plain text, so `parse_until`
    /// can also be used to scan attribute-value/text-content spans that
    /// are mostly literal characters with the occasional `$`-expression.
    fn parse_top_operand(
        &mut self,
        term: &mut dyn FnMut(char) -> bool,
        start: u32,
    ) -> Result<VcmNode, EjsonError> {
        match self.peek()? {
            None => Ok(VcmNode::new(VcmKind::Str(Rc::from("")), self.span_from(start))),
            Some(c) if term(c) => Ok(VcmNode::new(VcmKind::Str(Rc::from("")), self.span_from(start))),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array_or_set(),
            Some('(') => self.parse_tuple(),
            Some('"') => self.parse_quoted_string('"'),
            Some('\'') => self.parse_quoted_string('\''),
            Some('$') => self.parse_jsonee_chain(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_bare_word_lenient(term, start),
            Some(_) => self.parse_text(term, String::new(), start),
        }
    }

    /// Strict entry used for object values, array/tuple/call elements:
    /// every character must start a recognized value form.
    fn parse_value(&mut self) -> Result<VcmNode, EjsonError> {
        self.skip_ws()?;
        let start = self.pos();
        match self.peek()? {
            None => Err(self.err(ErrorKind::UnexpectedEof, self.span_from(start))),
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array_or_set(),
            Some('(') => self.parse_tuple(),
            Some('"') => self.parse_quoted_string('"'),
            Some('\'') => self.parse_quoted_string('\''),
            Some('$') => self.parse_jsonee_chain(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_bare_word_strict(start),
            Some('}') => Err(self.err(ErrorKind::UnexpectedRightBrace, self.span_from(start))),
            Some(']') => Err(self.err(ErrorKind::UnexpectedRightBracket, self.span_from(start))),
            Some(',') => Err(self.err(ErrorKind::UnexpectedComma, self.span_from(start))),
            Some(_) => Err(self.err(ErrorKind::UnexpectedCharacter, self.span_from(start))),
        }
    }

    fn maybe_cjsonee(
        &mut self,
        first: VcmNode,
        term: &mut dyn FnMut(char) -> bool,
    ) -> Result<VcmNode, EjsonError> {
        let mut operands = vec![first];
        let mut operators = Vec::new();
        loop {
            self.skip_ws()?;
            let op_char = match self.peek()? {
                Some(c @ ('&' | '|' | ';')) if !term(c) => c,
                _ => break,
            };
            self.bump()?;
            if self.peek()? != Some(op_char) {
                return Err(self.err(ErrorKind::BadJsonee, self.span_from(self.pos())));
            }
            self.bump()?;
            operators.push(match op_char {
                '&' => CjsoneeOp::And,
                '|' => CjsoneeOp::Or,
                _ => CjsoneeOp::Semicolon,
            });
            self.skip_ws()?;
            operands.push(self.parse_value()?);
        }
        if operators.is_empty() {
            Ok(operands.pop().expect("at least one operand"))
        } else {
            let span = operands[0].span.merge(operands[operands.len() - 1].span);
            Ok(VcmNode::new(
                VcmKind::Cjsonee { operands, operators },
                span,
            ))
        }
    }

    // --- keywords & byte sequences ------------------------------------------

    fn parse_bare_word_strict(&mut self, start: u32) -> Result<VcmNode, EjsonError> {
        if self.peek()? == Some('b') {
            self.bump()?;
            match self.peek()? {
                Some('x') => {
                    self.bump()?;
                    return self.scan_hex_bytes(start);
                }
                Some('b') => {
                    self.bump()?;
                    return self.scan_bin_bytes(start);
                }
                Some('6') => {
                    self.bump()?;
                    if self.peek()? == Some('4') {
                        self.bump()?;
                        return self.scan_b64_bytes(start);
                    }
                    return Err(self.err(ErrorKind::UnexpectedBase64, self.span_from(start)));
                }
                _ => {
                    let mut word = String::from("b");
                    word.push_str(&self.scan_word()?);
                    return Self::keyword_kind(&word)
                        .map(|kind| VcmNode::new(kind, self.span_from(start)))
                        .ok_or_else(|| self.err(ErrorKind::UnexpectedJsonKeyword, self.span_from(start)));
                }
            }
        }
        let word = self.scan_word()?;
        Self::keyword_kind(&word)
            .map(|kind| VcmNode::new(kind, self.span_from(start)))
            .ok_or_else(|| self.err(ErrorKind::UnexpectedJsonKeyword, self.span_from(start)))
    }

    fn parse_bare_word_lenient(
        &mut self,
        term: &mut dyn FnMut(char) -> bool,
        start: u32,
    ) -> Result<VcmNode, EjsonError> {
        if self.peek()? == Some('b') {
            self.bump()?;
            match self.peek()? {
                Some('x') => {
                    self.bump()?;
                    return self.scan_hex_bytes(start);
                }
                Some('b') => {
                    self.bump()?;
                    return self.scan_bin_bytes(start);
                }
                Some('6') => {
                    self.bump()?;
                    if self.peek()? == Some('4') {
                        self.bump()?;
                        return self.scan_b64_bytes(start);
                    }
                    return self.parse_text(term, String::from("b6"), start);
                }
                _ => {
                    let mut word = String::from("b");
                    word.push_str(&self.scan_word()?);
                    return self.keyword_or_text(word, term, start);
                }
            }
        }
        let word = self.scan_word()?;
        self.keyword_or_text(word, term, start)
    }

    fn keyword_or_text(
        &mut self,
        word: String,
        term: &mut dyn FnMut(char) -> bool,
        start: u32,
    ) -> Result<VcmNode, EjsonError> {
        match Self::keyword_kind(&word) {
            Some(kind) => Ok(VcmNode::new(kind, self.span_from(start))),
            None => self.parse_text(term, word, start),
        }
    }

    fn keyword_kind(word: &str) -> Option<VcmKind> {
        Some(match word {
            "true" => VcmKind::Boolean(true),
            "false" => VcmKind::Boolean(false),
            "null" => VcmKind::Null,
            "undefined" => VcmKind::Undefined,
            "Infinity" => VcmKind::LongDouble(f64::INFINITY),
            "NaN" => VcmKind::LongDouble(f64::NAN),
            _ => return None,
        })
    }

    fn scan_hex_bytes(&mut self, start: u32) -> Result<VcmNode, EjsonError> {
        let mut hex = String::new();
        while let Some(c) = self.peek()? {
            if c.is_ascii_hexdigit() {
                self.bump()?;
                hex.push(c);
            } else {
                break;
            }
        }
        if hex.is_empty() || hex.len() % 2 != 0 {
            return Err(self.err(ErrorKind::UnexpectedCharacter, self.span_from(start)));
        }
        let mut bytes = Vec::with_capacity(hex.len() / 2);
        for chunk in hex.as_bytes().chunks(2) {
            let digits = std::str::from_utf8(chunk).expect("ascii hex digits");
            match u8::from_str_radix(digits, 16) {
                Ok(b) => bytes.push(b),
                Err(_) => return Err(self.err(ErrorKind::UnexpectedCharacter, self.span_from(start))),
            }
        }
        Ok(VcmNode::new(
            VcmKind::ByteSeq(Rc::from(bytes.as_slice())),
            self.span_from(start),
        ))
    }

    fn scan_bin_bytes(&mut self, start: u32) -> Result<VcmNode, EjsonError> {
        let mut bits = String::new();
        while let Some(c) = self.peek()? {
            if c == '0' || c == '1' {
                self.bump()?;
                bits.push(c);
            } else {
                break;
            }
        }
        if bits.is_empty() {
            return Err(self.err(ErrorKind::UnexpectedCharacter, self.span_from(start)));
        }
        let mut bytes = Vec::new();
        for chunk in bits.as_bytes().chunks(8) {
            let mut byte = 0u8;
            for (i, &bit) in chunk.iter().enumerate() {
                if bit == b'1' {
                    byte |= 1 << (7 - i);
                }
            }
            bytes.push(byte);
        }
        Ok(VcmNode::new(
            VcmKind::ByteSeq(Rc::from(bytes.as_slice())),
            self.span_from(start),
        ))
    }

    fn scan_b64_bytes(&mut self, start: u32) -> Result<VcmNode, EjsonError> {
        let mut text = String::new();
        while let Some(c) = self.peek()? {
            if c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' {
                self.bump()?;
                text.push(c);
            } else {
                break;
            }
        }
        match base64::engine::general_purpose::STANDARD.decode(text.as_bytes()) {
            Ok(bytes) => Ok(VcmNode::new(
                VcmKind::ByteSeq(Rc::from(bytes.as_slice())),
                self.span_from(start),
            )),
            Err(_) => Err(self.err(ErrorKind::UnexpectedBase64, self.span_from(start))),
        }
    }

    // --- numbers -------------------------------------------------------------

    fn parse_number(&mut self) -> Result<VcmNode, EjsonError> {
        let start = self.pos();
        let mut buf = String::new();
        if let Some(c @ ('-' | '+')) = self.peek()? {
            self.bump()?;
            buf.push(c);
        }
        let digits_start = buf.len();
        while let Some(c) = self.peek()? {
            if c.is_ascii_digit() {
                self.bump()?;
                buf.push(c);
            } else {
                break;
            }
        }
        if buf.len() == digits_start {
            return Err(self.err(ErrorKind::BadJsonNumber, self.span_from(start)));
        }
        let mut is_float = false;
        if self.peek()? == Some('.') {
            is_float = true;
            self.bump()?;
            buf.push('.');
            let frac_start = buf.len();
            while let Some(c) = self.peek()? {
                if c.is_ascii_digit() {
                    self.bump()?;
                    buf.push(c);
                } else {
                    break;
                }
            }
            if buf.len() == frac_start {
                return Err(self.err(ErrorKind::UnexpectedJsonNumberFraction, self.span_from(start)));
            }
        }
        if let Some(c @ ('e' | 'E')) = self.peek()? {
            is_float = true;
            self.bump()?;
            buf.push(c);
            if let Some(sign @ ('+' | '-')) = self.peek()? {
                self.bump()?;
                buf.push(sign);
            }
            let exp_start = buf.len();
            while let Some(c) = self.peek()? {
                if c.is_ascii_digit() {
                    self.bump()?;
                    buf.push(c);
                } else {
                    break;
                }
            }
            if buf.len() == exp_start {
                return Err(self.err(ErrorKind::UnexpectedJsonNumberExponent, self.span_from(start)));
            }
        }
        if !is_float {
            if self.peek()? == Some('L') {
                self.bump()?;
                return buf
                    .parse::<i64>()
                    .map(|v| VcmNode::new(VcmKind::LongInt(v), self.span_from(start)))
                    .map_err(|_| self.err(ErrorKind::BadJsonNumber, self.span_from(start)));
            }
            if self.peek()? == Some('U') {
                self.bump()?;
                if self.peek()? != Some('L') {
                    return Err(self.err(ErrorKind::UnexpectedJsonNumberInteger, self.span_from(start)));
                }
                self.bump()?;
                return buf
                    .parse::<u64>()
                    .map(|v| VcmNode::new(VcmKind::ULongInt(v), self.span_from(start)))
                    .map_err(|_| self.err(ErrorKind::BadJsonNumber, self.span_from(start)));
            }
            if self.peek()? == Some('n') {
                self.bump()?;
                return buf
                    .parse::<i128>()
                    .map(|v| VcmNode::new(VcmKind::BigInt(v), self.span_from(start)))
                    .map_err(|_| self.err(ErrorKind::BadJsonNumber, self.span_from(start)));
            }
        }
        if self.peek()? == Some('F') {
            self.bump()?;
            if self.peek()? != Some('L') {
                return Err(self.err(ErrorKind::UnexpectedJsonNumber, self.span_from(start)));
            }
            self.bump()?;
            return buf
                .parse::<f64>()
                .map(|v| VcmNode::new(VcmKind::LongDouble(v), self.span_from(start)))
                .map_err(|_| self.err(ErrorKind::BadJsonNumber, self.span_from(start)));
        }
        buf.parse::<f64>()
            .map(|v| VcmNode::new(VcmKind::Number(v), self.span_from(start)))
            .map_err(|_| self.err(ErrorKind::BadJsonNumber, self.span_from(start)))
    }

    // --- containers ------------------------------------------------------------

    fn parse_object(&mut self) -> Result<VcmNode, EjsonError> {
        let start = self.pos();
        self.bump()?;
        let _guard = self.enter_scope(start)?;
        let mut entries = Vec::new();
        self.skip_ws()?;
        if self.peek()? == Some('}') {
            self.bump()?;
            return Ok(VcmNode::new(VcmKind::Object(entries), self.span_from(start)));
        }
        loop {
            self.skip_ws()?;
            let key = self.parse_object_key()?;
            self.skip_ws()?;
            if self.peek()? != Some(':') {
                return Err(self.err(ErrorKind::UnexpectedJsonKeyName, self.span_from(self.pos())));
            }
            self.bump()?;
            self.skip_ws()?;
            let value = self.parse_value()?;
            entries.push(KeyValue { key, value });
            self.skip_ws()?;
            match self.peek()? {
                Some(',') => {
                    self.bump()?;
                }
                Some('}') => {
                    self.bump()?;
                    break;
                }
                Some(_) => return Err(self.err(ErrorKind::UnexpectedComma, self.span_from(self.pos()))),
                None => return Err(self.err(ErrorKind::UnexpectedEof, self.span_from(self.pos()))),
            }
        }
        Ok(VcmNode::new(VcmKind::Object(entries), self.span_from(start)))
    }

    fn parse_object_key(&mut self) -> Result<VcmNode, EjsonError> {
        let start = self.pos();
        match self.peek()? {
            Some('"') => self.parse_quoted_string('"'),
            Some('\'') => self.parse_quoted_string('\''),
            Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                let mut name = String::new();
                while let Some(c) = self.peek()? {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        self.bump()?;
                        name.push(c);
                    } else {
                        break;
                    }
                }
                Ok(VcmNode::new(
                    VcmKind::AtomString(Rc::from(name.as_str())),
                    self.span_from(start),
                ))
            }
            _ => Err(self.err(ErrorKind::UnexpectedJsonKeyName, self.span_from(start))),
        }
    }

    /// `[ ... ]` is an ARRAY; `[! ... ]` is a SET (uniqueness by value —
    /// see `DESIGN.md` for why the literal grammar doesn't expose a
    /// key-field variant).
    fn parse_array_or_set(&mut self) -> Result<VcmNode, EjsonError> {
        let start = self.pos();
        self.bump()?;
        let _guard = self.enter_scope(start)?;
        let is_set = self.peek()? == Some('!');
        if is_set {
            self.bump()?;
        }
        let mut elements = Vec::new();
        self.skip_ws()?;
        if self.peek()? == Some(']') {
            self.bump()?;
            let kind = if is_set { VcmKind::Set(elements) } else { VcmKind::Array(elements) };
            return Ok(VcmNode::new(kind, self.span_from(start)));
        }
        loop {
            self.skip_ws()?;
            elements.push(self.parse_value()?);
            self.skip_ws()?;
            match self.peek()? {
                Some(',') => {
                    self.bump()?;
                }
                Some(']') => {
                    self.bump()?;
                    break;
                }
                Some(_) => return Err(self.err(ErrorKind::UnexpectedComma, self.span_from(self.pos()))),
                None => return Err(self.err(ErrorKind::UnexpectedEof, self.span_from(self.pos()))),
            }
        }
        let kind = if is_set { VcmKind::Set(elements) } else { VcmKind::Array(elements) };
        Ok(VcmNode::new(kind, self.span_from(start)))
    }

    /// `( ... )` at a value position is a TUPLE; the same delimiter after
    /// a JSONEE chain (`$parent(...)`) is a getter/setter call, handled
    /// separately in [`Self::parse_jsonee_chain`].
    fn parse_tuple(&mut self) -> Result<VcmNode, EjsonError> {
        let start = self.pos();
        self.bump()?;
        let _guard = self.enter_scope(start)?;
        let mut elements = Vec::new();
        self.skip_ws()?;
        if self.peek()? == Some(')') {
            self.bump()?;
            return Ok(VcmNode::new(VcmKind::Tuple(elements), self.span_from(start)));
        }
        loop {
            self.skip_ws()?;
            elements.push(self.parse_value()?);
            self.skip_ws()?;
            match self.peek()? {
                Some(',') => {
                    self.bump()?;
                }
                Some(')') => {
                    self.bump()?;
                    break;
                }
                Some(_) => {
                    return Err(self.err(
                        ErrorKind::BadJsoneeUnexpectedParenthesis,
                        self.span_from(self.pos()),
                    ))
                }
                None => return Err(self.err(ErrorKind::UnexpectedEof, self.span_from(self.pos()))),
            }
        }
        Ok(VcmNode::new(VcmKind::Tuple(elements), self.span_from(start)))
    }

    // --- strings ---------------------------------------------------------------

    fn parse_quoted_string(&mut self, quote: char) -> Result<VcmNode, EjsonError> {
        let start = self.pos();
        self.bump()?;
        if quote == '"' && self.peek()? == Some('"') {
            self.bump()?;
            if self.peek()? == Some('"') {
                self.bump()?;
                return self.parse_raw_string(start, '"');
            }
            return Ok(VcmNode::new(VcmKind::Str(Rc::from("")), self.span_from(start)));
        }
        self.parse_escaped_string(start, quote)
    }

    fn parse_escaped_string(&mut self, start: u32, quote: char) -> Result<VcmNode, EjsonError> {
        let mut buffer = String::new();
        let mut parts = Vec::new();
        loop {
            match self.peek()? {
                None => return Err(self.err(ErrorKind::UnexpectedEof, self.span_from(start))),
                Some(c) if c == quote => {
                    self.bump()?;
                    break;
                }
                Some('\\') => {
                    self.bump()?;
                    let ch = self.parse_escape(start)?;
                    buffer.push(ch);
                }
                Some('$') => {
                    if !buffer.is_empty() {
                        parts.push(VcmNode::new(
                            VcmKind::Str(Rc::from(std::mem::take(&mut buffer).as_str())),
                            self.span_from(start),
                        ));
                    }
                    parts.push(self.parse_jsonee_chain()?);
                }
                Some(c) => {
                    self.bump()?;
                    buffer.push(c);
                }
            }
        }
        Ok(Self::finish_text_parts(parts, buffer, self.span_from(start)))
    }

    /// Triple-double-quoted strings: no escape processing, terminated
    /// only by the matching `"""`. Still supports `$` interpolation, the
    /// same as any other JSONEE string.
    fn parse_raw_string(&mut self, start: u32, quote: char) -> Result<VcmNode, EjsonError> {
        let mut buffer = String::new();
        let mut parts = Vec::new();
        loop {
            match self.bump()? {
                None => return Err(self.err(ErrorKind::UnexpectedEof, self.span_from(start))),
                Some(c) if c == quote => {
                    if self.peek()? == Some(quote) {
                        self.bump()?;
                        if self.peek()? == Some(quote) {
                            self.bump()?;
                            break;
                        }
                        buffer.push(quote);
                        buffer.push(quote);
                    } else {
                        buffer.push(quote);
                    }
                }
                Some('$') => {
                    self.unread();
                    if !buffer.is_empty() {
                        parts.push(VcmNode::new(
                            VcmKind::Str(Rc::from(std::mem::take(&mut buffer).as_str())),
                            self.span_from(start),
                        ));
                    }
                    parts.push(self.parse_jsonee_chain()?);
                }
                Some(c) => buffer.push(c),
            }
        }
        Ok(Self::finish_text_parts(parts, buffer, self.span_from(start)))
    }

    fn parse_escape(&mut self, start: u32) -> Result<char, EjsonError> {
        match self.bump()? {
            None => Err(self.err(ErrorKind::UnexpectedEof, self.span_from(start))),
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('b') => Ok('\u{8}'),
            Some('f') => Ok('\u{c}'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('/') => Ok('/'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('$') => Ok('$'),
            Some('u') => self.parse_unicode_escape(start),
            Some(_) => Err(self.err(ErrorKind::BadJsonStringEscapeEntity, self.span_from(start))),
        }
    }

    fn parse_unicode_escape(&mut self, start: u32) -> Result<char, EjsonError> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            match self.bump()? {
                Some(c) if c.is_ascii_hexdigit() => {
                    value = value * 16 + c.to_digit(16).expect("checked hex digit");
                }
                _ => return Err(self.err(ErrorKind::BadJsonStringEscapeEntity, self.span_from(start))),
            }
        }
        char::from_u32(value).ok_or_else(|| self.err(ErrorKind::BadJsonStringEscapeEntity, self.span_from(start)))
    }

    fn parse_text(
        &mut self,
        term: &mut dyn FnMut(char) -> bool,
        mut buffer: String,
        start: u32,
    ) -> Result<VcmNode, EjsonError> {
        let mut parts = Vec::new();
        loop {
            match self.peek()? {
                None => break,
                Some(c) if term(c) => break,
                Some('$') => {
                    if !buffer.is_empty() {
                        parts.push(VcmNode::new(
                            VcmKind::Str(Rc::from(std::mem::take(&mut buffer).as_str())),
                            self.span_from(start),
                        ));
                    }
                    parts.push(self.parse_jsonee_chain()?);
                }
                Some(c) => {
                    self.bump()?;
                    buffer.push(c);
                }
            }
        }
        Ok(Self::finish_text_parts(parts, buffer, self.span_from(start)))
    }

    fn finish_text_parts(mut parts: Vec<VcmNode>, buffer: String, span: Span) -> VcmNode {
        if !buffer.is_empty() || parts.is_empty() {
            parts.push(VcmNode::new(VcmKind::Str(Rc::from(buffer.as_str())), span));
        }
        if parts.len() == 1 {
            parts.pop().expect("one part")
        } else {
            VcmNode::new(VcmKind::ConcatString(parts), span)
        }
    }

    // --- JSONEE expressions ------------------------------------------------------

    fn parse_jsonee_chain(&mut self) -> Result<VcmNode, EjsonError> {
        let start = self.pos();
        self.bump()?; // '$'
        let name = self.scan_identifier()?;
        if name.is_empty() {
            return Err(self.err(ErrorKind::EmptyJsoneeName, self.span_from(start)));
        }
        let mut node = VcmNode::new(VcmKind::Variable(Rc::from(name.as_str())), self.span_from(start));
        loop {
            match self.peek()? {
                Some('.') => {
                    self.bump()?;
                    let prop = self.scan_identifier()?;
                    if prop.is_empty() {
                        return Err(self.err(ErrorKind::EmptyJsoneeName, self.span_from(start)));
                    }
                    let key = VcmNode::synthetic(VcmKind::AtomString(Rc::from(prop.as_str())));
                    node = VcmNode::new(
                        VcmKind::GetAttribute {
                            parent: Box::new(node),
                            key: Box::new(key),
                        },
                        self.span_from(start),
                    );
                }
                Some('[') => {
                    self.bump()?;
                    self.skip_ws()?;
                    let key = self.parse_value()?;
                    self.skip_ws()?;
                    if self.peek()? != Some(']') {
                        return Err(self.err(ErrorKind::UnexpectedRightBracket, self.span_from(self.pos())));
                    }
                    self.bump()?;
                    node = VcmNode::new(
                        VcmKind::GetElement {
                            parent: Box::new(node),
                            key: Box::new(key),
                        },
                        self.span_from(start),
                    );
                }
                Some('(') => {
                    self.bump()?;
                    self.skip_ws()?;
                    let mut is_setter = false;
                    if let Some(c @ ('!' | '?')) = self.peek()? {
                        self.bump()?;
                        is_setter = true;
                        let _ = c;
                    }
                    self.skip_ws()?;
                    let mut args = Vec::new();
                    if self.peek()? != Some(')') {
                        loop {
                            self.skip_ws()?;
                            args.push(self.parse_value()?);
                            self.skip_ws()?;
                            match self.peek()? {
                                Some(',') => {
                                    self.bump()?;
                                }
                                Some(')') => break,
                                _ => {
                                    return Err(self.err(
                                        ErrorKind::BadJsoneeUnexpectedComma,
                                        self.span_from(self.pos()),
                                    ))
                                }
                            }
                        }
                    }
                    self.bump()?; // ')'
                    let kind = if is_setter {
                        VcmKind::CallSetter {
                            parent: Box::new(node),
                            args,
                        }
                    } else {
                        VcmKind::CallGetter {
                            parent: Box::new(node),
                            args,
                        }
                    };
                    node = VcmNode::new(kind, self.span_from(start));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn scan_identifier(&mut self) -> Result<String, EjsonError> {
        let mut name = String::new();
        while let Some(c) = self.peek()? {
            if c.is_alphanumeric() || c == '_' {
                self.bump()?;
                name.push(c);
            } else {
                break;
            }
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use purc_source::FileId;

    fn parse(input: &str) -> Result<VcmNode, EjsonError> {
        let file = FileId::from_raw(0);
        let mut reader = Reader::new(file, input);
        let sink = DiagnosticSink::new();
        parse_until(&mut reader, file, &sink, DEFAULT_MAX_DEPTH, |_| false)
    }

    fn parse_with_depth(input: &str, max_depth: u32) -> Result<VcmNode, EjsonError> {
        let file = FileId::from_raw(0);
        let mut reader = Reader::new(file, input);
        let sink = DiagnosticSink::new();
        parse_until(&mut reader, file, &sink, max_depth, |_| false)
    }

    #[test]
    fn object_literal() {
        let node = parse("{a: 1, b: 'x'}").unwrap();
        match node.kind {
            VcmKind::Object(entries) => {
                assert_eq!(entries.len(), 2);
                assert!(matches!(&entries[0].key.kind, VcmKind::AtomString(k) if &**k == "a"));
                assert!(matches!(entries[0].value.kind, VcmKind::Number(n) if n == 1.0));
                assert!(matches!(&entries[1].value.kind, VcmKind::Str(s) if &**s == "x"));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn empty_object_and_array() {
        assert!(matches!(parse("{}").unwrap().kind, VcmKind::Object(v) if v.is_empty()));
        assert!(matches!(parse("[]").unwrap().kind, VcmKind::Array(v) if v.is_empty()));
    }

    #[test]
    fn array_and_set_literals() {
        assert!(matches!(parse("[1,2,3]").unwrap().kind, VcmKind::Array(v) if v.len() == 3));
        assert!(matches!(parse("[!1,2]").unwrap().kind, VcmKind::Set(v) if v.len() == 2));
    }

    #[test]
    fn tuple_literal() {
        assert!(matches!(parse("(1,2)").unwrap().kind, VcmKind::Tuple(v) if v.len() == 2));
    }

    #[test]
    fn number_suffixes() {
        assert!(matches!(parse("42L").unwrap().kind, VcmKind::LongInt(42)));
        assert!(matches!(parse("7UL").unwrap().kind, VcmKind::ULongInt(7)));
        assert!(matches!(parse("3.5FL").unwrap().kind, VcmKind::LongDouble(v) if v == 3.5));
        assert!(matches!(parse("9n").unwrap().kind, VcmKind::BigInt(9)));
        assert!(matches!(parse("3.14").unwrap().kind, VcmKind::Number(v) if v == 3.14));
    }

    #[test]
    fn byte_sequences() {
        assert!(matches!(
            parse("bx48656c6c6f").unwrap().kind,
            VcmKind::ByteSeq(b) if &*b == b"Hello"
        ));
        assert!(matches!(
            parse("bb01000001").unwrap().kind,
            VcmKind::ByteSeq(b) if &*b == [0x41]
        ));
        assert!(matches!(
            parse("b64SGk=").unwrap().kind,
            VcmKind::ByteSeq(b) if &*b == b"Hi"
        ));
    }

    #[test]
    fn string_escapes() {
        assert!(matches!(
            parse(r#""a\nb""#).unwrap().kind,
            VcmKind::Str(s) if &*s == "a\nb"
        ));
        assert!(matches!(
            parse(r#""A""#).unwrap().kind,
            VcmKind::Str(s) if &*s == "A"
        ));
    }

    #[test]
    fn triple_quoted_raw_string_has_no_escapes() {
        let node = parse(r#""""line1\nline2""""#).unwrap();
        assert!(matches!(node.kind, VcmKind::Str(s) if &*s == "line1\\nline2"));
    }

    #[test]
    fn jsonee_variable_chain() {
        assert!(matches!(parse("$TIMERS").unwrap().kind, VcmKind::Variable(n) if &*n == "TIMERS"));
        assert!(matches!(parse("$obj.prop").unwrap().kind, VcmKind::GetAttribute { .. }));
        assert!(matches!(parse("$obj[0]").unwrap().kind, VcmKind::GetElement { .. }));
        match parse("$obj(1,2)").unwrap().kind {
            VcmKind::CallGetter { args, .. } => assert_eq!(args.len(), 2),
            other => panic!("expected CallGetter, got {other:?}"),
        }
        assert!(matches!(parse("$obj(! 1)").unwrap().kind, VcmKind::CallSetter { .. }));
    }

    #[test]
    fn string_interpolation_produces_concat_string() {
        let node = parse(r#""hello $name!""#).unwrap();
        match node.kind {
            VcmKind::ConcatString(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[0].kind, VcmKind::Str(s) if &**s == "hello "));
                assert!(matches!(&parts[1].kind, VcmKind::Variable(n) if &**n == "name"));
                assert!(matches!(&parts[2].kind, VcmKind::Str(s) if &**s == "!"));
            }
            other => panic!("expected ConcatString, got {other:?}"),
        }
    }

    #[test]
    fn cjsonee_sequencing() {
        match parse("$a && $b").unwrap().kind {
            VcmKind::Cjsonee { operands, operators } => {
                assert_eq!(operands.len(), 2);
                assert_eq!(operators, vec![CjsoneeOp::And]);
            }
            other => panic!("expected Cjsonee, got {other:?}"),
        }
        match parse("$a || $b ;; $c").unwrap().kind {
            VcmKind::Cjsonee { operands, operators } => {
                assert_eq!(operands.len(), 3);
                assert_eq!(operators, vec![CjsoneeOp::Or, CjsoneeOp::Semicolon]);
            }
            other => panic!("expected Cjsonee, got {other:?}"),
        }
    }

    #[test]
    fn max_depth_exceeded() {
        let err = parse_with_depth("[[[1]]]", 2).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
    }

    #[test]
    fn malformed_inputs_report_expected_kinds() {
        assert_eq!(parse("{,}").unwrap_err().kind, ErrorKind::UnexpectedJsonKeyName);
        assert_eq!(parse("1.").unwrap_err().kind, ErrorKind::UnexpectedJsonNumberFraction);
        assert_eq!(parse("[1 2]").unwrap_err().kind, ErrorKind::UnexpectedComma);
        assert_eq!(parse("frue").unwrap_err().kind, ErrorKind::UnexpectedJsonKeyword);
    }

    #[test]
    fn bare_word_is_lenient_text_at_top_level() {
        assert!(matches!(parse("attr2").unwrap().kind, VcmKind::Str(s) if &*s == "attr2"));
        let node = parse("abc$x").unwrap();
        match node.kind {
            VcmKind::ConcatString(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(&parts[0].kind, VcmKind::Str(s) if &**s == "abc"));
                assert!(matches!(&parts[1].kind, VcmKind::Variable(n) if &**n == "x"));
            }
            other => panic!("expected ConcatString, got {other:?}"),
        }
    }

    #[test]
    fn terminator_stops_before_consuming_it() {
        let file = FileId::from_raw(0);
        let mut reader = Reader::new(file, "abc<rest");
        let sink = DiagnosticSink::new();
        let node = parse_until(&mut reader, file, &sink, DEFAULT_MAX_DEPTH, |c| c == '<').unwrap();
        assert!(matches!(node.kind, VcmKind::Str(s) if &*s == "abc"));
        assert_eq!(reader.peek_position().offset, 3);
    }

    #[test]
    fn bare_keyword_words() {
        assert!(matches!(parse("true").unwrap().kind, VcmKind::Boolean(true)));
        assert!(matches!(parse("null").unwrap().kind, VcmKind::Null));
        assert!(matches!(parse("undefined").unwrap().kind, VcmKind::Undefined));
        assert!(matches!(parse("NaN").unwrap().kind, VcmKind::LongDouble(v) if v.is_nan()));
    }
}
