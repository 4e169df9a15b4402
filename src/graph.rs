//! Module Graph - the modules of one build and their evaluation order
//!
//! Owns every module, external module and declaration of a build. Binding
//! lives in [`crate::linker`]; this file holds the graph itself and the
//! cycle-tolerant ordering of its modules.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::module::{ExternalModule, Module};
use crate::symbol::{Binding, DeclId, Declarations, ModuleKey};

/// Names the output wrappers rely on; user declarations never take them.
const RESERVED_GLOBALS: [&str; 4] = ["module", "exports", "require", "define"];

#[derive(Debug)]
pub struct ModuleGraph {
    /// Internal modules; index 0 is the entry.
    pub modules: Vec<Module>,
    pub externals: Vec<ExternalModule>,
    pub declarations: Declarations,
    pub entry: usize,
    /// Names referenced but declared nowhere in the bundle
    pub assumed_globals: IndexSet<String>,
    /// Namespaces accessed as values, in first-access order
    pub internal_namespaces: Vec<DeclId>,
    /// The entry module's exports, traced when marking
    pub entry_exports: IndexMap<String, DeclId>,
}

/// Dependencies of one module, split by how they are used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Modules supplying a binding that is read when this module loads
    pub strong: Vec<usize>,
    /// Every internal module this module imports from, in source order
    pub weak: Vec<usize>,
}

impl ModuleGraph {
    pub fn new(modules: Vec<Module>, externals: Vec<ExternalModule>, declarations: Declarations) -> Self {
        Self {
            modules,
            externals,
            declarations,
            entry: 0,
            assumed_globals: RESERVED_GLOBALS.iter().map(|name| name.to_string()).collect(),
            internal_namespaces: Vec::new(),
            entry_exports: IndexMap::new(),
        }
    }

    pub fn module_id(&self, key: ModuleKey) -> &str {
        match key {
            ModuleKey::Internal(index) => &self.modules[index].id,
            ModuleKey::External(index) => &self.externals[index].id,
        }
    }

    /// Internal modules imported by `module`, in source order
    pub fn internal_dependencies(&self, module: usize) -> Vec<usize> {
        let module = &self.modules[module];
        let mut dependencies = Vec::new();
        for source in &module.sources {
            if let Some(ModuleKey::Internal(index)) = module.resolved_ids.get(source) {
                if !dependencies.contains(index) {
                    dependencies.push(*index);
                }
            }
        }
        dependencies
    }

    /// External modules imported anywhere, in first-import order
    pub fn external_ids(&self) -> Vec<String> {
        self.externals.iter().map(|external| external.id.clone()).collect()
    }

    pub fn consolidate_dependencies(&self, module: usize) -> Dependencies {
        let weak = self.internal_dependencies(module);
        let mut strong = Vec::new();

        for statement in &self.modules[module].statements {
            for reference in &statement.references {
                let Binding::Declaration(id) = reference.binding else {
                    continue;
                };
                let Some(owner) = self.declarations[id].statement.map(|s| s.module) else {
                    continue;
                };
                if owner != module && reference.is_immediately_used && !strong.contains(&owner) {
                    strong.push(owner);
                }
            }
        }

        Dependencies { strong, weak }
    }

    /// Order modules so that dependencies come first. When the import
    /// graph has cycles, a second pass moves every module's strong
    /// dependencies in front of it unless they strongly depend back on it.
    pub fn sort(&self) -> Vec<usize> {
        let mut sorter = self.visit_all();
        if !sorter.has_cycles {
            return sorter.ordered;
        }

        debug!("Module graph has cycles, reordering by strong dependencies");
        let unordered = std::mem::take(&mut sorter.ordered);
        let mut ordered = IndexSet::new();
        for module in unordered {
            let strong = sorter.strong_deps.get(&module).cloned().unwrap_or_default();
            let mut placing = HashSet::new();
            for dependency in strong {
                sorter.place(dependency, module, &mut ordered, &mut placing);
            }
            ordered.insert(module);
        }
        ordered.into_iter().collect()
    }

    /// Depth-first post-order of every module, noting whether an import
    /// edge leads back to a module still being visited.
    fn visit_all(&self) -> Sorter<'_> {
        let mut sorter = Sorter {
            graph: self,
            seen: HashSet::new(),
            visiting: HashSet::new(),
            ordered: Vec::new(),
            has_cycles: false,
            strong_deps: HashMap::new(),
            strongly_depends_on: HashMap::new(),
        };
        for module in 0..self.modules.len() {
            sorter.visit(module);
        }
        sorter
    }

    pub fn stats(&self) -> GraphStats {
        let statements = self.modules.iter().map(|m| m.statements.len()).sum();
        let included = self
            .modules
            .iter()
            .flat_map(|m| m.statements.iter())
            .filter(|s| s.is_included)
            .count();
        GraphStats {
            modules: self.modules.len(),
            externals: self.externals.len(),
            statements,
            included,
            declarations: self.declarations.len(),
            assumed_globals: self.assumed_globals.len() - RESERVED_GLOBALS.len(),
        }
    }
}

struct Sorter<'a> {
    graph: &'a ModuleGraph,
    seen: HashSet<usize>,
    /// Modules on the current depth-first path
    visiting: HashSet<usize>,
    ordered: Vec<usize>,
    has_cycles: bool,
    strong_deps: HashMap<usize, Vec<usize>>,
    strongly_depends_on: HashMap<usize, HashSet<usize>>,
}

impl Sorter<'_> {
    fn visit(&mut self, module: usize) {
        if !self.seen.insert(module) {
            return;
        }
        self.visiting.insert(module);

        let Dependencies { strong, weak } = self.graph.consolidate_dependencies(module);
        self.strong_deps.insert(module, Vec::new());
        self.strongly_depends_on.insert(module, HashSet::new());

        for imported in strong {
            self.strong_deps.entry(module).or_default().push(imported);
            self.follow(imported);
        }
        for imported in weak {
            self.follow(imported);
        }
        self.visiting.remove(&module);

        // second and further order strong dependencies
        let mut pending = self.strong_deps.get(&module).cloned().unwrap_or_default();
        while let Some(dependency) = pending.pop() {
            let newly_added = self.strongly_depends_on.entry(module).or_default().insert(dependency);
            if newly_added {
                if let Some(next) = self.strong_deps.get(&dependency) {
                    pending.extend(next.iter().copied());
                }
            }
        }

        self.ordered.push(module);
    }

    fn follow(&mut self, imported: usize) {
        if self.visiting.contains(&imported) {
            self.has_cycles = true;
        } else {
            self.visit(imported);
        }
    }

    fn strongly_depends(&self, module: usize, dependency: usize) -> bool {
        self.strongly_depends_on
            .get(&module)
            .is_some_and(|deps| deps.contains(&dependency))
    }

    /// Place `dependency` (and its own strong dependencies) ahead of
    /// `module`, unless the two strongly depend on each other.
    fn place(&self, dependency: usize, module: usize, ordered: &mut IndexSet<usize>, placing: &mut HashSet<usize>) {
        if self.strongly_depends(dependency, module) || ordered.contains(&dependency) {
            return;
        }
        if !placing.insert(dependency) {
            return;
        }
        if let Some(next) = self.strong_deps.get(&dependency) {
            for nested in next.clone() {
                self.place(nested, module, ordered, placing);
            }
        }
        ordered.insert(dependency);
    }
}

/// Statistics about a linked module graph
#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphStats {
    pub modules: usize,
    pub externals: usize,
    pub statements: usize,
    pub included: usize,
    pub declarations: usize,
    pub assumed_globals: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Module Graph Statistics:")?;
        writeln!(f, "  Modules: {} (external: {})", self.modules, self.externals)?;
        writeln!(f, "  Statements: {} (included: {})", self.statements, self.included)?;
        writeln!(f, "  Declarations: {}", self.declarations)?;
        writeln!(f, "  Assumed globals: {}", self.assumed_globals)
    }
}

/// Module ids mapped to their position, for lookups by id.
pub fn index_by_id(modules: &[Module]) -> IndexMap<String, usize> {
    modules
        .iter()
        .enumerate()
        .map(|(index, module)| (module.id.clone(), index))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapter::JavaScriptParser;
    use crate::loader::TransformedSource;

    /// Build and link a graph from `(id, code)` pairs. `./name` resolves to
    /// `/name.js` when such a module is listed, anything else is external.
    pub fn link(sources: &[(&str, &str)]) -> crate::Result<ModuleGraph> {
        let mut parser = JavaScriptParser::new()?;
        let mut declarations = Declarations::new();
        let mut modules = Vec::new();
        for (index, (id, code)) in sources.iter().enumerate() {
            modules.push(Module::new(
                index,
                *id,
                TransformedSource::untransformed(*code),
                &mut declarations,
                &mut parser,
            )?);
        }

        let by_id = index_by_id(&modules);
        let mut externals: Vec<ExternalModule> = Vec::new();
        for module in &mut modules {
            for source in module.sources.clone() {
                let candidate = format!("/{}.js", source.trim_start_matches("./"));
                let key = match by_id.get(&candidate) {
                    Some(index) => ModuleKey::Internal(*index),
                    None => match externals.iter().position(|e| e.id == source) {
                        Some(index) => ModuleKey::External(index),
                        None => {
                            externals.push(ExternalModule::new(source.as_str()));
                            ModuleKey::External(externals.len() - 1)
                        }
                    },
                };
                module.resolved_ids.insert(source, key);
            }
        }

        let mut graph = ModuleGraph::new(modules, externals, declarations);
        graph.bind()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::link;

    #[test]
    fn test_dependencies_come_first() {
        let graph = link(&[
            ("/main.js", "import { a } from './a';\nimport { b } from './b';\nconsole.log(a, b);"),
            ("/a.js", "import { b } from './b';\nexport var a = b + 1;"),
            ("/b.js", "export var b = 1;"),
        ])
        .unwrap();
        assert_eq!(graph.sort(), vec![2, 1, 0]);
    }

    #[test]
    fn test_consolidate_dependencies() {
        let graph = link(&[
            ("/main.js", "import { a } from './a';\nimport { b } from './b';\nexport function f () { return b; }\na();"),
            ("/a.js", "export function a () {}"),
            ("/b.js", "export var b = 1;"),
        ])
        .unwrap();
        let dependencies = graph.consolidate_dependencies(0);
        assert_eq!(dependencies.weak, vec![1, 2]);
        assert_eq!(dependencies.strong, vec![1]);
    }

    #[test]
    fn test_cycle_orders_strong_dependency_first() {
        // main -> a -> b -> a; b reads `a` eagerly, a only uses `b` lazily
        let graph = link(&[
            ("/main.js", "import { a } from './a';\nconsole.log(a);"),
            ("/a.js", "import { b } from './b';\nexport var a = 1;\nexport function getB () { return b; }"),
            ("/b.js", "import { a } from './a';\nexport var b = a + 1;"),
        ])
        .unwrap();
        let order = graph.sort();
        let position = |m: usize| order.iter().position(|&x| x == m).unwrap();
        assert_eq!(order.len(), 3);
        assert!(position(1) < position(2));
        assert!(position(1) < position(0));
    }

    #[test]
    fn test_shared_dependency_is_not_a_cycle() {
        let graph = link(&[
            ("/main.js", "import { a } from './a';\nimport { b } from './b';\nconsole.log(a, b);"),
            ("/a.js", "import { b } from './b';\nexport var a = b + 1;"),
            ("/b.js", "export var b = 1;"),
        ])
        .unwrap();
        assert!(!graph.visit_all().has_cycles);

        let cyclic = link(&[
            ("/main.js", "import { a } from './a';\nconsole.log(a);"),
            ("/a.js", "import { b } from './b';\nexport var a = 1;\nexport function getB () { return b; }"),
            ("/b.js", "import { a } from './a';\nexport var b = a + 1;"),
        ])
        .unwrap();
        assert!(cyclic.visit_all().has_cycles);
    }

    #[test]
    fn test_stats_display() {
        let graph = link(&[("/main.js", "import x from 'ext';\nfoo(x);")]).unwrap();
        let stats = graph.stats();
        assert_eq!(stats.modules, 1);
        assert_eq!(stats.externals, 1);
        assert_eq!(stats.assumed_globals, 1);
        assert!(stats.to_string().contains("Modules: 1 (external: 1)"));
    }
}
