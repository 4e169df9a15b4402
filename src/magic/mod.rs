//! Mapping-preserving text editing
//!
//! `MagicString` edits one source while remembering where every original
//! byte ended up; `MagicBundle` concatenates several of them and merges
//! their position mappings into a single source map.

pub mod bundle;
pub mod string;

pub use bundle::MagicBundle;
pub use string::{IndentOptions, MagicString, MapOptions, guess_indent};

/// Errors raised by an edit that cannot be expressed on the current text.
///
/// These indicate a defect in the caller (editing text that was already
/// replaced), not bad user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Character {0} is out of bounds")]
    OutOfBounds(usize),

    #[error("Cannot insert at replaced character index: {0}")]
    InsertAtReplaced(usize),

    #[error("Cannot overwrite the same content twice ({start}..{end})")]
    OverwriteTwice { start: usize, end: usize },

    #[error("Invalid range {start}..{end}")]
    InvalidRange { start: usize, end: usize },

    #[error("Cannot use replaced characters as slice anchors ({0})")]
    SliceAnchor(usize),

    #[error("Illegal source: same filename ({0}), different contents")]
    ConflictingSource(String),
}
