//! Declarations and references
//!
//! Every binding in the bundle is a `Declaration` in one arena owned by the
//! link graph. The four kinds of binding are variants of one tagged union:
//! - `Local`: a top-level binding written in module source
//! - `SyntheticDefault`: the value of `export default ...`
//! - `SyntheticNamespace`: a module's whole export surface as one object
//! - `External`: a name imported from a module outside the bundle
//!
//! References are use-sites collected per statement and bound to a
//! declaration by the linker.

use std::ops::{Index, IndexMut};

use indexmap::IndexMap;

use crate::scope::ScopeId;

/// Index of a declaration in [`Declarations`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// A module in the bundle graph: one of the parsed modules or an external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKey {
    Internal(usize),
    External(usize),
}

/// A top-level statement of an internal module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementRef {
    pub module: usize,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclarationKind {
    Local,
    /// `export default ...`; `original` is the local binding the default
    /// export names, when it names one.
    SyntheticDefault { original: Option<DeclId> },
    /// Created on first namespace access. `originals` maps every export
    /// name to its traced declaration.
    SyntheticNamespace {
        module: usize,
        originals: IndexMap<String, DeclId>,
        /// The namespace is accessed as a value, so an object literal has
        /// to be rendered for it.
        needs_block: bool,
    },
    External { module: usize, name: String },
}

#[derive(Debug, Clone)]
pub struct Declaration {
    /// Name used when rendering; changed by binding and de-confliction.
    pub name: String,
    pub kind: DeclarationKind,
    /// Statement that has to be included when this declaration is used.
    pub statement: Option<StatementRef>,
    pub is_reassigned: bool,
    pub is_exported: bool,
    pub is_used: bool,
    /// Declarations that must be used whenever this one is.
    pub aliases: Vec<DeclId>,
}

impl Declaration {
    pub fn new(name: impl Into<String>, kind: DeclarationKind, statement: Option<StatementRef>) -> Self {
        Self {
            name: name.into(),
            kind,
            statement,
            is_reassigned: false,
            is_exported: false,
            is_used: false,
            aliases: Vec::new(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.kind, DeclarationKind::External { .. })
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.kind, DeclarationKind::SyntheticNamespace { .. })
    }
}

/// Arena of every declaration in one build.
#[derive(Debug, Default)]
pub struct Declarations {
    items: Vec<Declaration>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, declaration: Declaration) -> DeclId {
        let id = DeclId(self.items.len() as u32);
        self.items.push(declaration);
        id
    }

    pub fn get(&self, id: DeclId) -> Option<&Declaration> {
        self.items.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, declaration)| (DeclId(index as u32), declaration))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Declaration> {
        self.items.iter_mut()
    }
}

impl Index<DeclId> for Declarations {
    type Output = Declaration;

    fn index(&self, id: DeclId) -> &Declaration {
        &self.items[id.0 as usize]
    }
}

impl IndexMut<DeclId> for Declarations {
    fn index_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.items[id.0 as usize]
    }
}

/// A non-computed property access following a reference: the `b` in `a.b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPart {
    pub name: String,
    /// End offset of the property name.
    pub end: usize,
}

/// What a reference was bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    #[default]
    Unbound,
    /// A parameter or nested binding of the statement itself.
    Local,
    Declaration(DeclId),
    /// Nothing in the bundle declares the name.
    Global,
}

/// One use-site of a name.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub start: usize,
    pub end: usize,
    /// Property accesses after the root identifier, outermost last.
    pub parts: Vec<MemberPart>,
    pub scope: ScopeId,
    pub binding: Binding,
    /// Evaluated when the module body runs, not inside a deferred function.
    pub is_immediately_used: bool,
    pub is_reassignment: bool,
    /// `{ foo }`: renaming has to expand the property to `foo: name`.
    pub is_shorthand_property: bool,
}

impl Reference {
    pub fn new(name: impl Into<String>, start: usize, end: usize, scope: ScopeId) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            parts: Vec::new(),
            scope,
            binding: Binding::Unbound,
            is_immediately_used: true,
            is_reassignment: false,
            is_shorthand_property: false,
        }
    }

    pub fn declaration(&self) -> Option<DeclId> {
        match self.binding {
            Binding::Declaration(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_indexing() {
        let mut declarations = Declarations::new();
        let a = declarations.push(Declaration::new("a", DeclarationKind::Local, None));
        let b = declarations.push(Declaration::new(
            "b",
            DeclarationKind::External {
                module: 0,
                name: "b".into(),
            },
            None,
        ));
        declarations[a].aliases.push(b);

        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[a].aliases, vec![b]);
        assert!(declarations[b].is_external());
        assert!(!declarations[a].is_namespace());
        assert_eq!(declarations.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![a, b]);
    }
}
