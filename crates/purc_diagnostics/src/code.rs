//! The error catalogue: every parse/VDOM error kind grouped into
//! categories, each carrying a short display prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category a diagnostic code belongs to, determining its display
/// prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Character-reader and low-level lexical errors, prefixed `LEX`.
    Lexical,
    /// HTML-like tag/attribute structure errors, prefixed `TAG`.
    TagStructure,
    /// Comment and DOCTYPE errors, prefixed `CMT`.
    CommentDoctype,
    /// Character-reference errors, prefixed `REF`.
    CharRef,
    /// eJSON/JSONEE sub-parser errors, prefixed `EJS`.
    Ejson,
    /// VDOM generator errors, prefixed `DOM`.
    Vdom,
    /// Internal errors — always fatal, never produced by well-formed
    /// input, prefixed `INT`.
    Internal,
}

impl Category {
    /// Returns the short display prefix for this category.
    pub fn prefix(self) -> &'static str {
        match self {
            Category::Lexical => "LEX",
            Category::TagStructure => "TAG",
            Category::CommentDoctype => "CMT",
            Category::CharRef => "REF",
            Category::Ejson => "EJS",
            Category::Vdom => "DOM",
            Category::Internal => "INT",
        }
    }
}

/// Every named error kind in the front end's error catalogue.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ErrorKind {
    // Lexical
    InvalidUtf8Character,
    UnexpectedNullCharacter,
    UnexpectedEof,
    UnexpectedCharacter,
    UnexpectedUnescapedControlCharacter,

    // HTML-like tag structure
    EofBeforeTagName,
    MissingEndTagName,
    InvalidFirstCharacterOfTagName,
    EofInTag,
    UnexpectedEqualsSignBeforeAttributeName,
    UnexpectedCharacterInAttributeName,
    UnexpectedCharacterInUnquotedAttributeValue,
    MissingWhitespaceBetweenAttributes,
    UnexpectedSolidusInTag,
    MissingAttributeValue,

    // Comment / DOCTYPE
    IncorrectlyOpenedComment,
    AbruptClosingOfEmptyComment,
    EofInComment,
    NestedComment,
    IncorrectlyClosedComment,
    EofInDoctype,
    MissingDoctypeName,
    MissingWhitespaceAfterDoctypePublicKeyword,
    MissingDoctypePublicIdentifier,
    AbruptDoctypePublicIdentifier,
    MissingWhitespaceAfterDoctypeSystemKeyword,
    MissingDoctypeSystemIdentifier,
    AbruptDoctypeSystemIdentifier,

    // Character references
    UnknownNamedCharacterReference,
    AbsenceOfDigitsInNumericCharacterReference,
    MissingSemicolonAfterCharacterReference,
    CharacterReferenceOutsideUnicodeRange,
    SurrogateCharacterReference,
    NoncharacterCharacterReference,
    NullCharacterReference,
    ControlCharacterReference,

    // eJSON / JSONEE
    UnexpectedJsonNumberExponent,
    UnexpectedJsonNumberFraction,
    UnexpectedJsonNumberInteger,
    UnexpectedJsonNumber,
    UnexpectedRightBrace,
    UnexpectedRightBracket,
    UnexpectedJsonKeyName,
    UnexpectedComma,
    UnexpectedJsonKeyword,
    UnexpectedBase64,
    BadJsonNumber,
    BadJsonStringEscapeEntity,
    BadJsonee,
    BadJsoneeEscapeEntity,
    BadJsoneeVariableName,
    EmptyJsoneeName,
    BadJsoneeName,
    BadJsoneeKeyword,
    EmptyJsoneeKeyword,
    BadJsoneeUnexpectedComma,
    BadJsoneeUnexpectedParenthesis,
    BadJsoneeUnexpectedLeftAngleBracket,
    MaxDepthExceeded,

    // VDOM
    WrongTagNesting,
    UnmatchedEndTag,
    MissingRootHvml,

    // VCM evaluation
    UndefinedVariable,

    // Internal
    InternalInvariantViolated,
}

impl ErrorKind {
    /// Returns the category this error kind belongs to.
    pub fn category(self) -> Category {
        use ErrorKind::*;
        match self {
            InvalidUtf8Character
            | UnexpectedNullCharacter
            | UnexpectedEof
            | UnexpectedCharacter
            | UnexpectedUnescapedControlCharacter => Category::Lexical,

            EofBeforeTagName
            | MissingEndTagName
            | InvalidFirstCharacterOfTagName
            | EofInTag
            | UnexpectedEqualsSignBeforeAttributeName
            | UnexpectedCharacterInAttributeName
            | UnexpectedCharacterInUnquotedAttributeValue
            | MissingWhitespaceBetweenAttributes
            | UnexpectedSolidusInTag
            | MissingAttributeValue => Category::TagStructure,

            IncorrectlyOpenedComment
            | AbruptClosingOfEmptyComment
            | EofInComment
            | NestedComment
            | IncorrectlyClosedComment
            | EofInDoctype
            | MissingDoctypeName
            | MissingWhitespaceAfterDoctypePublicKeyword
            | MissingDoctypePublicIdentifier
            | AbruptDoctypePublicIdentifier
            | MissingWhitespaceAfterDoctypeSystemKeyword
            | MissingDoctypeSystemIdentifier
            | AbruptDoctypeSystemIdentifier => Category::CommentDoctype,

            UnknownNamedCharacterReference
            | AbsenceOfDigitsInNumericCharacterReference
            | MissingSemicolonAfterCharacterReference
            | CharacterReferenceOutsideUnicodeRange
            | SurrogateCharacterReference
            | NoncharacterCharacterReference
            | NullCharacterReference
            | ControlCharacterReference => Category::CharRef,

            UnexpectedJsonNumberExponent
            | UnexpectedJsonNumberFraction
            | UnexpectedJsonNumberInteger
            | UnexpectedJsonNumber
            | UnexpectedRightBrace
            | UnexpectedRightBracket
            | UnexpectedJsonKeyName
            | UnexpectedComma
            | UnexpectedJsonKeyword
            | UnexpectedBase64
            | BadJsonNumber
            | BadJsonStringEscapeEntity
            | BadJsonee
            | BadJsoneeEscapeEntity
            | BadJsoneeVariableName
            | EmptyJsoneeName
            | BadJsoneeName
            | BadJsoneeKeyword
            | EmptyJsoneeKeyword
            | BadJsoneeUnexpectedComma
            | BadJsoneeUnexpectedParenthesis
            | BadJsoneeUnexpectedLeftAngleBracket
            | MaxDepthExceeded
            | UndefinedVariable => Category::Ejson,

            WrongTagNesting | UnmatchedEndTag | MissingRootHvml => Category::Vdom,

            InternalInvariantViolated => Category::Internal,
        }
    }

    /// Returns the `SCREAMING_SNAKE_CASE` name used in error messages.
    pub fn name(self) -> &'static str {
        use ErrorKind::*;
        match self {
            InvalidUtf8Character => "INVALID_UTF8_CHARACTER",
            UnexpectedNullCharacter => "UNEXPECTED_NULL_CHARACTER",
            UnexpectedEof => "UNEXPECTED_EOF",
            UnexpectedCharacter => "UNEXPECTED_CHARACTER",
            UnexpectedUnescapedControlCharacter => "UNEXPECTED_UNESCAPED_CONTROL_CHARACTER",
            EofBeforeTagName => "EOF_BEFORE_TAG_NAME",
            MissingEndTagName => "MISSING_END_TAG_NAME",
            InvalidFirstCharacterOfTagName => "INVALID_FIRST_CHARACTER_OF_TAG_NAME",
            EofInTag => "EOF_IN_TAG",
            UnexpectedEqualsSignBeforeAttributeName => {
                "UNEXPECTED_EQUALS_SIGN_BEFORE_ATTRIBUTE_NAME"
            }
            UnexpectedCharacterInAttributeName => "UNEXPECTED_CHARACTER_IN_ATTRIBUTE_NAME",
            UnexpectedCharacterInUnquotedAttributeValue => {
                "UNEXPECTED_CHARACTER_IN_UNQUOTED_ATTRIBUTE_VALUE"
            }
            MissingWhitespaceBetweenAttributes => "MISSING_WHITESPACE_BETWEEN_ATTRIBUTES",
            UnexpectedSolidusInTag => "UNEXPECTED_SOLIDUS_IN_TAG",
            MissingAttributeValue => "MISSING_ATTRIBUTE_VALUE",
            IncorrectlyOpenedComment => "INCORRECTLY_OPENED_COMMENT",
            AbruptClosingOfEmptyComment => "ABRUPT_CLOSING_OF_EMPTY_COMMENT",
            EofInComment => "EOF_IN_COMMENT",
            NestedComment => "NESTED_COMMENT",
            IncorrectlyClosedComment => "INCORRECTLY_CLOSED_COMMENT",
            EofInDoctype => "EOF_IN_DOCTYPE",
            MissingDoctypeName => "MISSING_DOCTYPE_NAME",
            MissingWhitespaceAfterDoctypePublicKeyword => {
                "MISSING_WHITESPACE_AFTER_DOCTYPE_PUBLIC_KEYWORD"
            }
            MissingDoctypePublicIdentifier => "MISSING_DOCTYPE_PUBLIC_IDENTIFIER",
            AbruptDoctypePublicIdentifier => "ABRUPT_DOCTYPE_PUBLIC_IDENTIFIER",
            MissingWhitespaceAfterDoctypeSystemKeyword => {
                "MISSING_WHITESPACE_AFTER_DOCTYPE_SYSTEM_KEYWORD"
            }
            MissingDoctypeSystemIdentifier => "MISSING_DOCTYPE_SYSTEM_IDENTIFIER",
            AbruptDoctypeSystemIdentifier => "ABRUPT_DOCTYPE_SYSTEM_IDENTIFIER",
            UnknownNamedCharacterReference => "UNKNOWN_NAMED_CHARACTER_REFERENCE",
            AbsenceOfDigitsInNumericCharacterReference => {
                "ABSENCE_OF_DIGITS_IN_NUMERIC_CHARACTER_REFERENCE"
            }
            MissingSemicolonAfterCharacterReference => "MISSING_SEMICOLON_AFTER_CHARACTER_REFERENCE",
            CharacterReferenceOutsideUnicodeRange => "CHARACTER_REFERENCE_OUTSIDE_UNICODE_RANGE",
            SurrogateCharacterReference => "SURROGATE_CHARACTER_REFERENCE",
            NoncharacterCharacterReference => "NONCHARACTER_CHARACTER_REFERENCE",
            NullCharacterReference => "NULL_CHARACTER_REFERENCE",
            ControlCharacterReference => "CONTROL_CHARACTER_REFERENCE",
            UnexpectedJsonNumberExponent => "UNEXPECTED_JSON_NUMBER_EXPONENT",
            UnexpectedJsonNumberFraction => "UNEXPECTED_JSON_NUMBER_FRACTION",
            UnexpectedJsonNumberInteger => "UNEXPECTED_JSON_NUMBER_INTEGER",
            UnexpectedJsonNumber => "UNEXPECTED_JSON_NUMBER",
            UnexpectedRightBrace => "UNEXPECTED_RIGHT_BRACE",
            UnexpectedRightBracket => "UNEXPECTED_RIGHT_BRACKET",
            UnexpectedJsonKeyName => "UNEXPECTED_JSON_KEY_NAME",
            UnexpectedComma => "UNEXPECTED_COMMA",
            UnexpectedJsonKeyword => "UNEXPECTED_JSON_KEYWORD",
            UnexpectedBase64 => "UNEXPECTED_BASE64",
            BadJsonNumber => "BAD_JSON_NUMBER",
            BadJsonStringEscapeEntity => "BAD_JSON_STRING_ESCAPE_ENTITY",
            BadJsonee => "BAD_JSONEE",
            BadJsoneeEscapeEntity => "BAD_JSONEE_ESCAPE_ENTITY",
            BadJsoneeVariableName => "BAD_JSONEE_VARIABLE_NAME",
            EmptyJsoneeName => "EMPTY_JSONEE_NAME",
            BadJsoneeName => "BAD_JSONEE_NAME",
            BadJsoneeKeyword => "BAD_JSONEE_KEYWORD",
            EmptyJsoneeKeyword => "EMPTY_JSONEE_KEYWORD",
            BadJsoneeUnexpectedComma => "BAD_JSONEE_UNEXPECTED_COMMA",
            BadJsoneeUnexpectedParenthesis => "BAD_JSONEE_UNEXPECTED_PARENTHESIS",
            BadJsoneeUnexpectedLeftAngleBracket => "BAD_JSONEE_UNEXPECTED_LEFT_ANGLE_BRACKET",
            MaxDepthExceeded => "MAX_DEPTH_EXCEEDED",
            WrongTagNesting => "WRONG_TAG_NESTING",
            UnmatchedEndTag => "UNMATCHED_END_TAG",
            MissingRootHvml => "MISSING_ROOT_HVML",
            UndefinedVariable => "UNDEFINED_VARIABLE",
            InternalInvariantViolated => "INTERNAL_INVARIANT_VIOLATED",
        }
    }
}

/// A structured diagnostic code: a category plus a named error kind.
///
/// Displayed as `{prefix}:{NAME}`, e.g. `LEX:INVALID_UTF8_CHARACTER`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The error kind.
    pub kind: ErrorKind,
}

impl DiagnosticCode {
    /// Creates a diagnostic code wrapping the given error kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    /// Returns this code's category.
    pub fn category(self) -> Category {
        self.kind.category()
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category().prefix(), self.kind.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Lexical.prefix(), "LEX");
        assert_eq!(Category::Vdom.prefix(), "DOM");
        assert_eq!(Category::Internal.prefix(), "INT");
    }

    #[test]
    fn display_format() {
        let code = DiagnosticCode::new(ErrorKind::InvalidUtf8Character);
        assert_eq!(format!("{code}"), "LEX:INVALID_UTF8_CHARACTER");
    }

    #[test]
    fn kind_maps_to_expected_category() {
        assert_eq!(ErrorKind::WrongTagNesting.category(), Category::Vdom);
        assert_eq!(ErrorKind::MaxDepthExceeded.category(), Category::Ejson);
        assert_eq!(
            ErrorKind::AbruptClosingOfEmptyComment.category(),
            Category::CommentDoctype
        );
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(ErrorKind::UnmatchedEndTag);
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
