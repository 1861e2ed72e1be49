//! Token and attribute shapes produced by the tokenizer.

use purc_common::Atom;
use purc_source::Span;
use purc_vcm::VcmNode;

/// The assignment operator carried by an attribute.
///
/// HVML extends the ordinary `name="value"` assignment with six
/// operation-element-only variants, triggered by a single extra character
/// immediately before the `=`: `+=`, `-=`, `%=`, `~=`, `^=`, `$=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// Bare `=`.
    Plain,
    /// `+=` — append to the end of an array/object/string.
    Add,
    /// `-=` — remove a matching element.
    Sub,
    /// `%=` — divide-and-assign the remainder (operation-element only).
    Remainder,
    /// `~=` — replace the entire value.
    Replace,
    /// `^=` — prepend to the head.
    HeadPrecede,
    /// `$=` — append to the tail.
    TailAppend,
}

/// One attribute of a start tag.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// The attribute name.
    pub name: Atom,
    /// The assignment operator between name and value.
    pub operator: AttrOperator,
    /// The attribute's value, or `None` for a valueless (bare) attribute.
    pub value: Option<VcmNode>,
    /// `true` if the value was written with a raw (non-JSONEE-delegated)
    /// single `{`/`[`/`$`-free literal quoted string, recorded
    /// per-attribute here since delegation is decided per value.
    pub raw_quote_style: QuoteStyle,
    /// Source span covering the whole `name[op]=value` attribute.
    pub span: Span,
}

/// How an attribute value (or DOCTYPE identifier) was quoted in source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QuoteStyle {
    /// `"..."`.
    Double,
    /// `'...'`.
    Single,
    /// No quotes at all.
    Unquoted,
}

/// The payload of a `DOCTYPE` token.
#[derive(Default)]
pub struct DoctypeData {
    /// The DOCTYPE name, if one was present.
    pub name: Option<String>,
    /// The `PUBLIC` identifier, if present.
    pub public_id: Option<String>,
    /// The `SYSTEM` identifier, if present.
    pub system_id: Option<String>,
    /// Set when the DOCTYPE is malformed enough that the generator should
    /// treat the document as quirks-mode.
    pub force_quirks: bool,
}

/// A token produced by the tokenizer and consumed by the VDOM generator.
pub enum HvmlToken {
    /// `<!DOCTYPE ...>`.
    Doctype(DoctypeData),
    /// `<name attr...>` or `<name attr.../>`.
    StartTag {
        /// The tag name.
        name: Atom,
        /// The tag's attributes, in source order.
        attributes: Vec<Attribute>,
        /// `true` if the tag was closed with `/>`.
        self_closing: bool,
        /// `true` if any attribute's value bypassed JSONEE delegation
        /// (written as a raw quoted literal with no `{`/`[`/`$` content).
        has_raw_attribute: bool,
        /// Span covering `<name ... >`.
        span: Span,
    },
    /// `</name>`.
    EndTag {
        /// The tag name.
        name: Atom,
        /// Span covering `</name>`.
        span: Span,
    },
    /// A run of text/expression content, represented as a concatenation
    /// VCM tree whose literal children are plain text and whose
    /// interpolated children are the embedded `$`/`{`/`[` expressions.
    Character {
        /// The content's expression tree.
        vcm_root: VcmNode,
        /// Span covering the whole run.
        span: Span,
    },
    /// `<!-- text -->`.
    Comment {
        /// The comment's text content.
        text: String,
        /// Span covering `<!-- ... -->`.
        span: Span,
    },
    /// A standalone `{...}`/`[...]`/`$...` expression encountered where a
    /// tag or text run was expected (e.g. as a whole attribute value).
    VcmTree {
        /// The parsed expression tree.
        root: VcmNode,
        /// Span covering the expression.
        span: Span,
    },
    /// End of input.
    Eof,
}

impl HvmlToken {
    /// The span this token was produced from, where one is tracked.
    pub fn span(&self) -> Span {
        match self {
            HvmlToken::Doctype(_) => Span::DUMMY,
            HvmlToken::StartTag { span, .. } => *span,
            HvmlToken::EndTag { span, .. } => *span,
            HvmlToken::Character { span, .. } => *span,
            HvmlToken::Comment { span, .. } => *span,
            HvmlToken::VcmTree { span, .. } => *span,
            HvmlToken::Eof => Span::DUMMY,
        }
    }
}
