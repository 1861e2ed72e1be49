//! HVML tokenizer.
//!
//! Turns a character stream into a sequence of [`HvmlToken`]s, delegating
//! embedded eJSON/JSONEE expressions to `purc_ejson` wherever a `{`, `[`,
//! or `$` appears in a text or attribute-value state.

#![warn(missing_docs)]

mod text_buffer;
mod token;
mod tokenizer;

pub use text_buffer::TextBuffer;
pub use token::{AttrOperator, Attribute, DoctypeData, HvmlToken, QuoteStyle};
pub use tokenizer::Tokenizer;
