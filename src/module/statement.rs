//! Top-level statements

use crate::scope::{ScopeId, SideEffects};
use crate::symbol::Reference;

/// How `export default` was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultForm {
    /// `export default function foo () {}` or `export default class Foo {}`
    Declaration,
    /// `export default function () {}`; `head_end` is the end of the
    /// `function` (or `function*`) keyword.
    AnonymousFunction { head_end: usize },
    /// `export default <expression>`
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Import,
    /// `var`/`let`/`const` with a single declarator
    Variable,
    /// One declarator split out of a multi-declarator declaration. The
    /// shared keyword was removed and is reinserted when rendering.
    Declarator {
        keyword: String,
        name: Option<String>,
        /// End of the `, ` after this declarator, or of the declaration's
        /// `;` for the last one. Never reaches into the next statement.
        separator_end: usize,
        last: bool,
    },
    /// `export function foo () {}`, `export const a = 1`
    ExportDeclaration {
        declaration_start: usize,
        /// Start of the declarator for `export var/let/const`
        declarator_start: Option<usize>,
        name: Option<String>,
    },
    /// `export { a, b as c }`
    ExportClause,
    /// `export { a } from '...'`, `export * from '...'`
    Reexport,
    ExportDefault {
        declaration_start: usize,
        form: DefaultForm,
    },
    Other,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    /// Start including attached leading comments
    pub start: usize,
    pub end: usize,
    /// Start of the following statement; removal runs up to here.
    pub next: usize,
    /// Start of the syntax node itself
    pub node_start: usize,
    /// Root scope, for statements that were analysed
    pub scope: Option<ScopeId>,
    pub references: Vec<Reference>,
    pub string_literal_ranges: Vec<(usize, usize)>,
    pub side_effects: SideEffects,
    /// Set once by the mark phase, never reset.
    pub is_included: bool,
}

impl Statement {
    pub fn new(kind: StatementKind, start: usize, end: usize, node_start: usize) -> Self {
        Self {
            kind,
            start,
            end,
            next: end,
            node_start,
            scope: None,
            references: Vec::new(),
            string_literal_ranges: Vec::new(),
            side_effects: SideEffects::default(),
            is_included: false,
        }
    }

    pub fn is_import(&self) -> bool {
        self.kind == StatementKind::Import
    }

    /// A plain variable declaration, possibly split from a larger one
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, StatementKind::Variable | StatementKind::Declarator { .. })
    }
}
