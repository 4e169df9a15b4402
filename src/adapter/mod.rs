//! Parser adapter
//!
//! The bundler never tokenizes JavaScript itself. A Tree-sitter grammar
//! produces the syntax tree and this module turns its error nodes into
//! structured parse errors carrying the module id and position.

pub mod javascript;

pub use javascript::{JavaScriptParser, node_text, validate};
