//! The insertion-mode VDOM generator.
//!
//! Structured around a consume/expect/error-and-recover idiom, adapted
//! from a single-pass recursive-descent shape (which would own its whole
//! token vector) to a push-driven state machine, since this generator is
//! fed one [`HvmlToken`] at a time by the caller's tokenize loop.

use purc_common::{atom_for, Atom};
use purc_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, ErrorKind};
use purc_source::Span;
use purc_tokenizer::{HvmlToken, Tokenizer};
use purc_vcm::{VcmKind, VcmNode};

use crate::arena::NodeId;
use crate::node::{Document, NodeKind};

/// The generator's insertion mode: a nine-state machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum InsertionMode {
    Initial,
    BeforeHvml,
    InHvml,
    BeforeHead,
    InHead,
    AfterHead,
    InBody,
    AfterBody,
    AfterAfterBody,
}

/// Builds a [`Document`] from a stream of [`HvmlToken`]s.
pub struct Generator<'r> {
    sink: &'r DiagnosticSink,
    doc: Document,
    mode: InsertionMode,
    open_stack: Vec<NodeId>,
    body: Option<NodeId>,
    hvml: Option<NodeId>,
    fatal: bool,
    done: bool,
}

impl<'r> Generator<'r> {
    /// Creates a generator that reports structural errors to `sink`.
    pub fn new(sink: &'r DiagnosticSink) -> Self {
        Self {
            sink,
            doc: Document::new(),
            mode: InsertionMode::Initial,
            open_stack: Vec::new(),
            body: None,
            hvml: None,
            fatal: false,
            done: false,
        }
    }

    fn recoverable(&self, kind: ErrorKind, span: Span) {
        self.sink.emit(Diagnostic::error(DiagnosticCode::new(kind), kind.name().to_string(), span));
    }

    fn current(&self) -> NodeId {
        self.open_stack.last().copied().unwrap_or_else(|| self.doc.root())
    }

    fn attach_comment(&mut self, text: String, span: Span) {
        let parent = self.current();
        self.doc.append_child(parent, NodeKind::Comment { text }, span);
    }

    fn attach_content(&mut self, vcm: VcmNode, span: Span) {
        let parent = self.current();
        self.doc.append_child(parent, NodeKind::Content { vcm }, span);
    }

    /// Adjacent whitespace-only characters between structural tags are
    /// dropped. A character token counts as whitespace-only when its VCM
    /// tree is a pure-literal concatenation
    /// of strings that trim to nothing — an interpolated child always
    /// keeps the token, since it may produce non-whitespace at evaluation
    /// time.
    fn is_whitespace_only(vcm: &VcmNode) -> bool {
        match &vcm.kind {
            VcmKind::Str(s) => s.trim().is_empty(),
            VcmKind::ConcatString(parts) => parts.iter().all(Self::is_whitespace_only),
            _ => false,
        }
    }

    fn open_element(&mut self, name: Atom, attributes: Vec<purc_tokenizer::Attribute>, self_closing: bool, span: Span) -> NodeId {
        let foreign = !matches!(atom_str(name), "hvml" | "head" | "body");
        let parent = self.current();
        let id = self.doc.append_child(parent, NodeKind::Element { name, attributes, self_closing, foreign }, span);
        if !self_closing {
            self.open_stack.push(id);
        }
        id
    }

    /// Pops the open-element stack down to and including the first
    /// element named `name`, searching from the top. Returns `false`
    /// (leaving the stack untouched) if no such element is open.
    fn close_to_matching(&mut self, name: Atom) -> bool {
        let pos = self.open_stack.iter().rposition(|&id| {
            matches!(&self.doc.node(id).kind, NodeKind::Element { name: n, .. } if *n == name)
        });
        match pos {
            Some(idx) => {
                self.open_stack.truncate(idx);
                true
            }
            None => false,
        }
    }

    /// Consumes one token, possibly switching `tokenizer`'s sub-mode when
    /// a tag name requires it.
    pub fn push_token(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        if self.done {
            self.fatal = true;
            return;
        }
        self.dispatch(tokenizer, token);
    }

    fn dispatch(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        match self.mode {
            InsertionMode::Initial => self.in_initial(tokenizer, token),
            InsertionMode::BeforeHvml => self.in_before_hvml(tokenizer, token),
            InsertionMode::InHvml => self.in_in_hvml(tokenizer, token),
            InsertionMode::BeforeHead => self.in_before_head(tokenizer, token),
            InsertionMode::InHead => self.in_in_head(tokenizer, token),
            InsertionMode::AfterHead => self.in_after_head(tokenizer, token),
            InsertionMode::InBody => self.in_in_body(tokenizer, token),
            InsertionMode::AfterBody => self.in_after_body(tokenizer, token),
            InsertionMode::AfterAfterBody => self.in_after_after_body(token),
        }
    }

    fn in_initial(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        match token {
            HvmlToken::Doctype(_) => {
                self.mode = InsertionMode::BeforeHvml;
            }
            HvmlToken::Character { vcm_root, .. } if Self::is_whitespace_only(&vcm_root) => {}
            HvmlToken::Comment { text, span } => self.attach_comment(text, span),
            HvmlToken::Eof => {}
            other => {
                self.mode = InsertionMode::BeforeHvml;
                self.dispatch(tokenizer, other);
            }
        }
    }

    fn in_before_hvml(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        match token {
            HvmlToken::Character { vcm_root, .. } if Self::is_whitespace_only(&vcm_root) => {}
            HvmlToken::Comment { text, span } => self.attach_comment(text, span),
            HvmlToken::StartTag { name, attributes, self_closing, span, .. } if atom_str(name) == "hvml" => {
                let id = self.open_element(name, attributes, self_closing, span);
                self.hvml = Some(id);
                self.mode = InsertionMode::BeforeHead;
            }
            HvmlToken::EndTag { span, .. } => {
                self.recoverable(ErrorKind::WrongTagNesting, span);
            }
            // Left for `end()` to report once: the mode stays `BeforeHvml`,
            // which `end()` already checks for.
            HvmlToken::Eof => {}
            other => {
                self.recoverable(ErrorKind::MissingRootHvml, other.span());
                let span = other.span();
                let id = self.doc.append_child(
                    self.doc.root(),
                    NodeKind::Element { name: atom_for("hvml"), attributes: Vec::new(), self_closing: false, foreign: false },
                    span,
                );
                self.hvml = Some(id);
                self.open_stack.push(id);
                self.mode = InsertionMode::BeforeHead;
                self.dispatch(tokenizer, other);
            }
        }
    }

    fn in_in_hvml(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        // Reachable only if a second `hvml` open tag or stray token arrives
        // after the root closed prematurely; treat exactly like BEFORE_HEAD.
        self.in_before_head(tokenizer, token);
    }

    fn in_before_head(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        match token {
            HvmlToken::Character { vcm_root, .. } if Self::is_whitespace_only(&vcm_root) => {}
            HvmlToken::Comment { text, span } => self.attach_comment(text, span),
            HvmlToken::StartTag { name, attributes, self_closing, span, .. } if atom_str(name) == "head" => {
                self.open_element(name, attributes, self_closing, span);
                self.mode = InsertionMode::InHead;
            }
            HvmlToken::EndTag { name, span } if atom_str(name) == "head" => {
                self.recoverable(ErrorKind::WrongTagNesting, span);
            }
            HvmlToken::Eof => {}
            other => {
                let span = other.span();
                self.open_element(atom_for("head"), Vec::new(), false, span);
                self.open_stack.pop();
                self.mode = InsertionMode::AfterHead;
                self.dispatch(tokenizer, other);
            }
        }
    }

    fn in_in_head(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        match token {
            HvmlToken::Character { vcm_root, span } if Self::is_whitespace_only(&vcm_root) => {
                self.attach_content(vcm_root, span);
            }
            HvmlToken::Comment { text, span } => self.attach_comment(text, span),
            HvmlToken::EndTag { name, .. } if atom_str(name) == "head" => {
                self.open_stack.pop();
                self.mode = InsertionMode::AfterHead;
            }
            HvmlToken::Eof => {
                self.open_stack.pop();
                self.mode = InsertionMode::AfterHead;
            }
            other => {
                self.open_stack.pop();
                self.mode = InsertionMode::AfterHead;
                self.dispatch(tokenizer, other);
            }
        }
    }

    fn in_after_head(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        match token {
            HvmlToken::Character { vcm_root, .. } if Self::is_whitespace_only(&vcm_root) => {}
            HvmlToken::Comment { text, span } => self.attach_comment(text, span),
            HvmlToken::StartTag { name, attributes, self_closing, span, .. } if atom_str(name) == "body" => {
                let id = self.open_element(name, attributes, self_closing, span);
                self.body = Some(id);
                self.mode = InsertionMode::InBody;
            }
            HvmlToken::Eof => {}
            other => {
                let span = other.span();
                let id = self.open_element(atom_for("body"), Vec::new(), false, span);
                self.body = Some(id);
                self.mode = InsertionMode::InBody;
                self.dispatch(tokenizer, other);
            }
        }
    }

    fn in_in_body(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        let _ = tokenizer;
        match token {
            HvmlToken::Character { vcm_root, span } => {
                if !Self::is_whitespace_only(&vcm_root) {
                    self.attach_content(vcm_root, span);
                }
            }
            HvmlToken::VcmTree { root, span } => self.attach_content(root, span),
            HvmlToken::Comment { text, span } => self.attach_comment(text, span),
            HvmlToken::Doctype(_) => {}
            HvmlToken::StartTag { name, attributes, self_closing, span, .. } => {
                self.open_element(name, attributes, self_closing, span);
            }
            HvmlToken::EndTag { name, span } => {
                if atom_str(name) == "body" {
                    self.close_to_matching(name);
                    self.mode = InsertionMode::AfterBody;
                } else if self.close_to_matching(name) {
                    // matched and closed
                } else {
                    self.recoverable(ErrorKind::UnmatchedEndTag, span);
                }
            }
            HvmlToken::Eof => {}
        }
    }

    fn in_after_body(&mut self, tokenizer: &mut Tokenizer, token: HvmlToken) {
        let _ = tokenizer;
        match token {
            HvmlToken::Character { vcm_root, span } if Self::is_whitespace_only(&vcm_root) => {
                if let Some(body) = self.body {
                    self.doc.append_child(body, NodeKind::Content { vcm: vcm_root }, span);
                }
            }
            HvmlToken::Comment { text, span } => {
                let parent = self.hvml.unwrap_or_else(|| self.doc.root());
                self.doc.append_child(parent, NodeKind::Comment { text }, span);
            }
            HvmlToken::EndTag { name, .. } if atom_str(name) == "hvml" => {
                self.open_stack.clear();
                self.mode = InsertionMode::AfterAfterBody;
            }
            HvmlToken::Eof => {}
            other => {
                self.recoverable(ErrorKind::WrongTagNesting, other.span());
            }
        }
    }

    fn in_after_after_body(&mut self, token: HvmlToken) {
        match token {
            HvmlToken::Character { vcm_root, .. } if Self::is_whitespace_only(&vcm_root) => {}
            HvmlToken::Comment { text, span } => {
                self.doc.append_child(self.doc.root(), NodeKind::Comment { text }, span);
            }
            HvmlToken::Eof => {}
            other => {
                self.recoverable(ErrorKind::WrongTagNesting, other.span());
            }
        }
    }

    /// Flushes any pending state and returns the finished document.
    ///
    /// Any still-open elements are implicitly closed on EOF — their
    /// subtrees are already attached,
    /// so closing is bookkeeping only. Returns `None` only if a fatal,
    /// genuinely impossible sequence of calls occurred (`push_token`
    /// called again after `end()`).
    pub fn end(mut self) -> Option<Document> {
        if self.fatal {
            return None;
        }
        if matches!(self.mode, InsertionMode::Initial | InsertionMode::BeforeHvml) {
            self.recoverable(ErrorKind::MissingRootHvml, Span::DUMMY);
        }
        self.open_stack.clear();
        self.done = true;
        Some(self.doc)
    }
}

fn atom_str(atom: Atom) -> &'static str {
    purc_common::str_for(atom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use purc_diagnostics::DiagnosticSink;
    use purc_source::{FileId, Reader};

    fn build(src: &str) -> (Document, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let file = FileId::from_raw(0);
        let mut reader = Reader::new(file, src);
        let mut gen = Generator::new(&sink);
        {
            let mut tz = Tokenizer::new(&mut reader, file, &sink, 64);
            loop {
                match tz.next_token() {
                    Some(HvmlToken::Eof) => {
                        gen.push_token(&mut tz, HvmlToken::Eof);
                        break;
                    }
                    Some(tok) => gen.push_token(&mut tz, tok),
                    None => break,
                }
            }
        }
        let doc = gen.end().expect("generator should not hit a fatal state");
        (doc, sink)
    }

    #[test]
    fn smallest_valid_document_has_one_childless_hvml_element() {
        let (doc, sink) = build("<hvml></hvml>");
        assert!(!sink.has_errors());
        let hvml = doc.hvml_element().expect("root hvml element");
        assert!(matches!(&doc.node(hvml).kind, NodeKind::Element { name, .. } if atom_str(*name) == "hvml"));
        assert!(doc.node(hvml).children.is_empty());
    }

    #[test]
    fn recoverable_comment_error_still_yields_the_comment() {
        let (doc, sink) = build("<hvml><!-></hvml>");
        assert!(sink.has_errors());
        let hvml = doc.hvml_element().unwrap();
        // The malformed comment is still a comment: BEFORE_HEAD inserts it
        // as a child of `hvml`, same as a well-formed one would be. Its
        // data is "-": the dash that failed to start a real comment can't
        // be pushed back onto the reader, so it's folded into the bogus
        // comment's content instead, same as the DOCTYPE/CDATA mismatch
        // paths do with their partially-matched text.
        assert_eq!(doc.node(hvml).children.len(), 1);
        assert!(matches!(&doc.node(doc.node(hvml).children[0]).kind, NodeKind::Comment { text } if text == "-"));
    }

    #[test]
    fn nested_elements_attach_as_children() {
        let (doc, _sink) = build("<hvml><head></head><body><div></div></body></hvml>");
        let hvml = doc.hvml_element().unwrap();
        assert_eq!(doc.node(hvml).children.len(), 2);
        let body = doc.node(hvml).children[1];
        assert_eq!(doc.node(body).children.len(), 1);
        assert!(matches!(&doc.node(doc.node(body).children[0]).kind, NodeKind::Element { name, foreign, .. }
            if atom_str(*name) == "div" && *foreign));
    }

    #[test]
    fn unmatched_end_tag_is_reported_and_discarded() {
        let (doc, sink) = build("<hvml><body></nonexistent></body></hvml>");
        assert!(sink.has_errors());
        let hvml = doc.hvml_element().unwrap();
        let body = doc.node(hvml).children[0];
        assert!(doc.node(body).children.is_empty());
    }

    #[test]
    fn whitespace_only_text_between_tags_is_dropped() {
        let (doc, _sink) = build("<hvml>\n  <body>\n  </body>\n</hvml>");
        let hvml = doc.hvml_element().unwrap();
        for &child in &doc.node(hvml).children {
            assert!(
                !matches!(&doc.node(child).kind, NodeKind::Content { .. }),
                "whitespace-only text between structural tags should not produce a Content node"
            );
        }
    }
}
