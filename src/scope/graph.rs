//! Scope arena for one module
//!
//! Every top-level statement gets its own root scope. Function, block,
//! catch and loop scopes nest under it. Names declared at a statement root
//! are the module's top-level declarations.

use indexmap::IndexSet;

/// Unique identifier for a scope within its module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// The kind of scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Root scope of one top-level statement
    Statement,
    /// Function body including its parameters
    Function,
    /// Block, catch clause or loop head
    Block,
}

#[derive(Debug, Clone)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    declarations: IndexSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeGraph {
    scopes: Vec<Scope>,
}

impl ScopeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            kind,
            declarations: IndexSet::new(),
        });
        id
    }

    /// Declare `name`. Function-scoped names (`var`, function declarations)
    /// skip block scopes and land in the nearest function or statement root.
    pub fn add_declaration(&mut self, scope: ScopeId, name: impl Into<String>, block_scoped: bool) {
        let mut target = scope;
        if !block_scoped {
            while self.kind(target) == Some(ScopeKind::Block) {
                match self.parent(target) {
                    Some(parent) => target = parent,
                    None => break,
                }
            }
        }
        if let Some(entry) = self.scopes.get_mut(target.0 as usize) {
            entry.declarations.insert(name.into());
        }
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.0 as usize).and_then(|s| s.parent)
    }

    pub fn kind(&self, scope: ScopeId) -> Option<ScopeKind> {
        self.scopes.get(scope.0 as usize).map(|s| s.kind)
    }

    /// Whether `scope` itself declares `name`
    pub fn declares(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes
            .get(scope.0 as usize)
            .is_some_and(|s| s.declarations.contains(name))
    }

    /// The nearest scope from `scope` upwards that declares `name`
    pub fn find(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if self.declares(s, name) {
                return Some(s);
            }
            current = self.parent(s);
        }
        None
    }

    pub fn contains(&self, scope: ScopeId, name: &str) -> bool {
        self.find(scope, name).is_some()
    }

    /// Like [`contains`](Self::contains) but ignores the statement root,
    /// whose names are module-level declarations rather than locals.
    pub fn contains_local(&self, scope: ScopeId, name: &str) -> bool {
        self.find(scope, name)
            .is_some_and(|s| self.kind(s) != Some(ScopeKind::Statement))
    }

    /// Names declared directly in `scope`, in declaration order
    pub fn names(&self, scope: ScopeId) -> impl Iterator<Item = &str> {
        self.scopes
            .get(scope.0 as usize)
            .into_iter()
            .flat_map(|s| s.declarations.iter().map(String::as_str))
    }
}
