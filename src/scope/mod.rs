//! Lexical scopes and references
//!
//! Each top-level statement is analysed on its own: its scopes live in the
//! module's `ScopeGraph` and its references are bound later by the linker.

pub mod analyse;
pub mod graph;

pub use analyse::{Analyser, SideEffects, StatementAnalysis};
pub use graph::{ScopeGraph, ScopeId, ScopeKind};
