//! Cross-module binding
//!
//! Three passes run over every module once the graph is fetched:
//! 1. import specifiers: `export *` sources are bound to their modules
//! 2. aliases: top-level variables that merely copy another binding
//! 3. references: every use-site is bound to a declaration, falling back
//!    to an assumed global
//!
//! `trace` and `trace_export` follow imports and re-exports to the
//! declaration that actually holds a value.

pub mod liveness;

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::graph::ModuleGraph;
use crate::module::StatementKind;
use crate::scope::ScopeKind;
use crate::symbol::{Binding, DeclId, Declaration, DeclarationKind, ModuleKey, Reference};
use crate::{Error, Result, SourceLocation};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LinkStats {
    pub references: usize,
    pub bound: usize,
    pub locals: usize,
    pub globals: usize,
    pub aliases: usize,
}

impl fmt::Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Link Stats:")?;
        writeln!(f, "  Total References: {}", self.references)?;
        writeln!(f, "  Bound: {}", self.bound)?;
        writeln!(f, "  Local: {}", self.locals)?;
        writeln!(f, "  Global: {}", self.globals)?;
        writeln!(f, "  Aliases: {}", self.aliases)
    }
}

impl ModuleGraph {
    /// Run the three binding passes over every module.
    pub fn bind(&mut self) -> Result<LinkStats> {
        let mut stats = LinkStats::default();
        for module in 0..self.modules.len() {
            self.bind_import_specifiers(module);
        }
        for module in 0..self.modules.len() {
            stats.aliases += self.bind_aliases(module)?;
        }
        for module in 0..self.modules.len() {
            self.bind_references(module, &mut stats)?;
        }
        debug!(
            "Bound {} references ({} to declarations, {} global)",
            stats.references, stats.bound, stats.globals
        );
        Ok(stats)
    }

    fn bind_import_specifiers(&mut self, module: usize) {
        let module = &mut self.modules[module];
        module.export_all_modules = module
            .export_all_sources
            .iter()
            .filter_map(|source| module.resolved_ids.get(source).copied())
            .collect();
    }

    /// A top-level variable whose value is a single eagerly-read binding
    /// becomes an alias of that binding, so using the binding uses it too.
    fn bind_aliases(&mut self, module: usize) -> Result<usize> {
        let mut found = Vec::new();
        {
            let m = &self.modules[module];
            for (name, &id) in &m.declarations {
                let declaration = &self.declarations[id];
                if declaration.kind != DeclarationKind::Local {
                    continue;
                }
                let Some(statement_ref) = declaration.statement else {
                    continue;
                };
                let statement = &m.statements[statement_ref.index];
                if !statement.is_variable() {
                    continue;
                }
                let Some(root) = statement.scope else {
                    continue;
                };
                let eager: Vec<&Reference> = statement
                    .references
                    .iter()
                    .filter(|r| r.is_immediately_used && !m.scopes.contains(root, &r.name))
                    .collect();
                if let [single] = eager.as_slice() {
                    found.push((name.clone(), single.name.clone(), id));
                }
            }
        }

        let mut count = 0;
        for (name, referenced, alias) in found {
            if name == referenced {
                continue;
            }
            if let Some(other) = self.trace(module, &referenced)? {
                if other != alias && !self.declarations[other].aliases.contains(&alias) {
                    self.declarations[other].aliases.push(alias);
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn bind_references(&mut self, module: usize, stats: &mut LinkStats) -> Result<()> {
        if let Some(&default) = self.modules[module].declarations.get("default") {
            let identifier = self.modules[module]
                .exports
                .get("default")
                .and_then(|export| export.identifier.clone());
            if let Some(identifier) = identifier {
                if let Some(original) = self.trace(module, &identifier)? {
                    if original != default {
                        self.declarations[default].kind = DeclarationKind::SyntheticDefault {
                            original: Some(original),
                        };
                    }
                }
            }
        }

        let is_entry = module == self.entry;
        for index in 0..self.modules[module].statements.len() {
            if self.modules[module].statements[index].kind == StatementKind::ExportClause && !is_entry {
                continue;
            }
            let mut references = std::mem::take(&mut self.modules[module].statements[index].references);
            let result = self.bind_statement_references(module, &mut references, stats);
            self.modules[module].statements[index].references = references;
            result?;
        }
        Ok(())
    }

    fn bind_statement_references(
        &mut self,
        module: usize,
        references: &mut [Reference],
        stats: &mut LinkStats,
    ) -> Result<()> {
        for reference in references.iter_mut() {
            stats.references += 1;
            let scopes = &self.modules[module].scopes;
            let declaration = match scopes.find(reference.scope, &reference.name) {
                Some(scope) if scopes.kind(scope) != Some(ScopeKind::Statement) => {
                    reference.binding = Binding::Local;
                    stats.locals += 1;
                    continue;
                }
                Some(_) => self.modules[module].declarations.get(&reference.name).copied(),
                None => self.trace(module, &reference.name)?,
            };

            match declaration {
                Some(id) => {
                    self.add_reference(id, reference, module)?;
                    stats.bound += 1;
                }
                None => {
                    reference.binding = Binding::Global;
                    self.assumed_globals.insert(reference.name.clone());
                    stats.globals += 1;
                }
            }
        }
        Ok(())
    }

    /// The declaration `name` refers to at the top level of `module`.
    pub fn trace(&mut self, module: usize, name: &str) -> Result<Option<DeclId>> {
        if let Some(&id) = self.modules[module].declarations.get(name) {
            return Ok(Some(id));
        }
        let Some(import) = self.modules[module].imports.get(name) else {
            return Ok(None);
        };
        let Some(&key) = self.modules[module].resolved_ids.get(&import.source) else {
            return Ok(None);
        };
        let imported = import.name.clone();
        match key {
            ModuleKey::Internal(other) if imported == "*" => self.namespace(other).map(Some),
            _ => self.trace_export(key, &imported, module).map(Some),
        }
    }

    /// The declaration behind export `name` of `key`. Fails when the module
    /// does not export it.
    pub fn trace_export(&mut self, key: ModuleKey, name: &str, importer: usize) -> Result<DeclId> {
        match key {
            ModuleKey::External(external) => Ok(self.external_declaration(external, name)),
            ModuleKey::Internal(module) => {
                let mut visiting = Vec::new();
                self.find_export(module, name, importer, &mut visiting)?
                    .ok_or_else(|| Error::MissingExport {
                        name: name.to_string(),
                        exporter: self.modules[module].id.clone(),
                        importer: self.modules[importer].id.clone(),
                    })
            }
        }
    }

    fn find_export(
        &mut self,
        module: usize,
        name: &str,
        importer: usize,
        visiting: &mut Vec<usize>,
    ) -> Result<Option<DeclId>> {
        if visiting.contains(&module) {
            return Ok(None);
        }
        visiting.push(module);

        if let Some(reexport) = self.modules[module].reexports.get(name).cloned() {
            let Some(&key) = self.modules[module].resolved_ids.get(&reexport.source) else {
                return Ok(None);
            };
            return match key {
                ModuleKey::Internal(source) if reexport.local_name == "*" => self.namespace(source).map(Some),
                _ => self.trace_export(key, &reexport.local_name, module).map(Some),
            };
        }

        if let Some(local_name) = self.modules[module].exports.get(name).map(|e| e.local_name.clone()) {
            return self.trace(module, &local_name);
        }

        if name == "default" {
            return Ok(None);
        }

        let delegates = self.modules[module].export_all_modules.clone();
        for key in &delegates {
            if let ModuleKey::Internal(delegate) = *key {
                if let Some(id) = self.find_export(delegate, name, importer, visiting)? {
                    return Ok(Some(id));
                }
            }
        }
        for key in delegates {
            if let ModuleKey::External(external) = key {
                return Ok(Some(self.external_declaration(external, name)));
            }
        }
        Ok(None)
    }

    /// Declaration for `name` imported from an external module, created on
    /// first use.
    pub fn external_declaration(&mut self, external: usize, name: &str) -> DeclId {
        if name != "default" && name != "*" {
            self.externals[external].exports_names = true;
        }
        if let Some(&id) = self.externals[external].declarations.get(name) {
            return id;
        }
        let id = self.declarations.push(Declaration::new(
            name,
            DeclarationKind::External {
                module: external,
                name: name.to_string(),
            },
            None,
        ));
        self.externals[external].declarations.insert(name.to_string(), id);
        id
    }

    /// The namespace declaration of `module`, created on first access.
    pub fn namespace(&mut self, module: usize) -> Result<DeclId> {
        if let Some(id) = self.modules[module].namespace {
            return Ok(id);
        }
        let id = self.declarations.push(Declaration::new(
            self.modules[module].basename(),
            DeclarationKind::SyntheticNamespace {
                module,
                originals: IndexMap::new(),
                needs_block: false,
            },
            None,
        ));
        self.modules[module].namespace = Some(id);

        let mut traced = IndexMap::new();
        for name in self.get_exports(module) {
            let original = self.trace_export(ModuleKey::Internal(module), &name, module)?;
            traced.insert(name, original);
        }
        if let DeclarationKind::SyntheticNamespace { originals, .. } = &mut self.declarations[id].kind {
            *originals = traced;
        }
        Ok(id)
    }

    /// Every name exported by `module`: own exports, re-exports, then names
    /// reachable through `export *` (never `default`).
    pub fn get_exports(&self, module: usize) -> Vec<String> {
        let mut names = Vec::new();
        let mut visiting = Vec::new();
        self.collect_exports(module, true, &mut visiting, &mut names);
        names
    }

    fn collect_exports(&self, module: usize, include_default: bool, visiting: &mut Vec<usize>, names: &mut Vec<String>) {
        if visiting.contains(&module) {
            return;
        }
        visiting.push(module);
        let m = &self.modules[module];
        for name in m.exports.keys().chain(m.reexports.keys()) {
            if (include_default || name != "default") && !names.contains(name) {
                names.push(name.clone());
            }
        }
        for key in &m.export_all_modules {
            if let ModuleKey::Internal(delegate) = *key {
                self.collect_exports(delegate, false, visiting, names);
            }
        }
    }

    /// Bind `reference` to `id`, narrowing `ns.member` accesses to the
    /// member's own declaration.
    pub fn add_reference(&mut self, id: DeclId, reference: &mut Reference, module: usize) -> Result<()> {
        let mut id = id;
        loop {
            let declaration = &mut self.declarations[id];
            match &mut declaration.kind {
                DeclarationKind::Local => {
                    reference.binding = Binding::Declaration(id);
                    declaration.name = reference.name.clone();
                    if reference.is_reassignment {
                        declaration.is_reassigned = true;
                    }
                }
                DeclarationKind::SyntheticDefault { .. } => {
                    reference.binding = Binding::Declaration(id);
                    if reference.name != "default" {
                        declaration.name = reference.name.clone();
                    }
                }
                DeclarationKind::External { module: external, name } => {
                    reference.binding = Binding::Declaration(id);
                    if name == "default" || name == "*" {
                        let external = *external;
                        self.externals[external].suggest_name(&reference.name);
                    }
                }
                DeclarationKind::SyntheticNamespace {
                    module: exporter,
                    originals,
                    needs_block,
                } => {
                    if !reference.parts.is_empty() {
                        let part = reference.parts.remove(0);
                        let Some(&original) = originals.get(&part.name) else {
                            let exporter = *exporter;
                            let code = &self.modules[module].code;
                            return Err(Error::MissingNamespaceMember {
                                name: part.name,
                                exporter: self.modules[exporter].id.clone(),
                                importer: self.modules[module].id.clone(),
                                location: SourceLocation::from_offset(code, reference.start),
                            });
                        };
                        reference.name = part.name;
                        reference.end = part.end;
                        id = original;
                        continue;
                    }
                    if !*needs_block {
                        *needs_block = true;
                        self.internal_namespaces.push(id);
                    }
                    reference.binding = Binding::Declaration(id);
                    declaration.name = reference.name.clone();
                }
            }
            return Ok(());
        }
    }

    /// The text a declaration renders as. `es6` output keeps external
    /// bindings as imported names and exported bindings as plain names.
    pub fn render_name(&self, id: DeclId, es6: bool) -> String {
        let mut id = id;
        let mut seen = Vec::new();
        loop {
            let declaration = &self.declarations[id];
            match &declaration.kind {
                DeclarationKind::Local => {
                    if !es6 && declaration.is_exported && declaration.is_reassigned {
                        return format!("exports.{}", declaration.name);
                    }
                    return declaration.name.clone();
                }
                DeclarationKind::SyntheticDefault { original: Some(original) }
                    if !self.declarations[*original].is_reassigned && !seen.contains(original) =>
                {
                    seen.push(id);
                    id = *original;
                }
                DeclarationKind::SyntheticDefault { .. } | DeclarationKind::SyntheticNamespace { .. } => {
                    return declaration.name.clone();
                }
                DeclarationKind::External { module, name } => {
                    let external = &self.externals[*module];
                    return match name.as_str() {
                        "*" => external.name.clone(),
                        "default" if !es6 && external.exports_names => format!("{}__default", external.name),
                        "default" => external.name.clone(),
                        _ if es6 => declaration.name.clone(),
                        _ => format!("{}.{}", external.name, name),
                    };
                }
            }
        }
    }

    /// The local declaration a default export stands for, if it names one.
    pub fn default_original(&self, id: DeclId) -> Option<DeclId> {
        match self.declarations[id].kind {
            DeclarationKind::SyntheticDefault { original } => original,
            _ => None,
        }
    }
}
