//! Statement liveness
//!
//! Using a declaration includes the statement that declares it, which in
//! turn uses every declaration that statement references. Statements with
//! side effects are included regardless, and because including one can make
//! another statement's assignment observable the side-effect scan repeats
//! until a full pass includes nothing new.

use tracing::debug;

use crate::Result;
use crate::graph::ModuleGraph;
use crate::symbol::{DeclId, DeclarationKind, ModuleKey, StatementRef};

impl ModuleGraph {
    /// Use every export of the entry module, then include side-effecting
    /// statements until nothing changes. Returns the number of passes.
    pub fn mark(&mut self) -> Result<usize> {
        let entry = self.entry;
        for name in self.get_exports(entry) {
            let id = self.trace_export(ModuleKey::Internal(entry), &name, entry)?;
            self.entry_exports.insert(name, id);
            self.declarations[id].is_exported = true;
            if let DeclarationKind::SyntheticNamespace { needs_block, .. } = &mut self.declarations[id].kind {
                if !*needs_block {
                    *needs_block = true;
                    self.internal_namespaces.push(id);
                }
            }
            self.use_declaration(id);
        }

        let mut passes = 0;
        loop {
            passes += 1;
            let mut settled = true;
            for module in 0..self.modules.len() {
                if self.mark_all_side_effects(module)? {
                    settled = false;
                }
            }
            debug!("Side-effect pass {} settled: {}", passes, settled);
            if settled {
                break;
            }
        }
        Ok(passes)
    }

    /// Flag `id` used, include its statement and cascade to aliases.
    pub fn use_declaration(&mut self, id: DeclId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let declaration = &mut self.declarations[id];
            if declaration.is_used {
                continue;
            }
            match &declaration.kind {
                DeclarationKind::External { .. } => continue,
                DeclarationKind::Local => {}
                DeclarationKind::SyntheticDefault { original } => pending.extend(*original),
                DeclarationKind::SyntheticNamespace { originals, .. } => {
                    pending.extend(originals.values().copied());
                }
            }
            declaration.is_used = true;
            pending.extend(declaration.aliases.iter().copied());
            if let Some(statement) = declaration.statement {
                pending.extend(self.include_statement(statement));
            }
        }
    }

    /// Include a statement; returns the declarations it references when it
    /// was not included before.
    fn include_statement(&mut self, statement: StatementRef) -> Vec<DeclId> {
        let statement = &mut self.modules[statement.module].statements[statement.index];
        if statement.is_included {
            return Vec::new();
        }
        statement.is_included = true;
        statement.references.iter().filter_map(|r| r.declaration()).collect()
    }

    /// Include `statement` and use everything it references.
    pub fn mark_statement(&mut self, statement: StatementRef) {
        for id in self.include_statement(statement) {
            self.use_declaration(id);
        }
    }

    fn mark_all_side_effects(&mut self, module: usize) -> Result<bool> {
        let mut has_side_effect = false;
        for index in 0..self.modules[module].statements.len() {
            let statement = StatementRef { module, index };
            if self.modules[module].statements[index].is_included {
                continue;
            }
            if self.has_side_effects(statement)? {
                self.mark_statement(statement);
                has_side_effect = true;
            }
        }
        Ok(has_side_effect)
    }

    /// A call or `new` evaluated at load time, or an assignment whose target
    /// is unknown, external or already part of the bundle.
    pub fn has_side_effects(&mut self, statement: StatementRef) -> Result<bool> {
        let effects = self.modules[statement.module].statements[statement.index]
            .side_effects
            .clone();
        if effects.has_call {
            return Ok(true);
        }
        for target in effects.assignments {
            let Some(name) = target else {
                return Ok(true);
            };
            let Some(id) = self.trace(statement.module, &name)? else {
                return Ok(true);
            };
            let declaration = &self.declarations[id];
            let observable = match declaration.statement {
                _ if declaration.is_external() || declaration.is_namespace() => true,
                Some(owner) => self.modules[owner.module].statements[owner.index].is_included,
                None => true,
            };
            if observable {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every statement's inclusion flag, module by module.
    pub fn included(&self) -> Vec<Vec<bool>> {
        self.modules
            .iter()
            .map(|m| m.statements.iter().map(|s| s.is_included).collect())
            .collect()
    }
}
