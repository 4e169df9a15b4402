//! Bundle-wide name de-confliction
//!
//! Every module's top-level bindings end up in one scope. Names are handed
//! out first-come in module order, externals first; a taken name gets a
//! `$N` suffix. Assumed globals and the names the wrappers rely on are
//! taken from the start. Named imports from externals only bind a name of
//! their own in `es6` output, so they are named last and never push a
//! bundled declaration aside.

use std::collections::HashMap;

use tracing::debug;

use crate::graph::ModuleGraph;
use crate::symbol::{DeclId, DeclarationKind};

impl ModuleGraph {
    /// Give every rendered declaration and external a unique name. `order`
    /// is the module order of the output. Returns the number of renames.
    pub fn deconflict(&mut self, order: &[usize]) -> usize {
        let mut used: HashMap<String, usize> = self
            .assumed_globals
            .iter()
            .map(|name| (name.clone(), 1))
            .collect();
        let mut renamed = 0;

        for external in &mut self.externals {
            let name = safe_name(&mut used, &external.name);
            if name != external.name {
                renamed += 1;
                external.name = name;
            }
        }

        for &module in order {
            for id in self.rendered_declarations(module) {
                let declaration = &mut self.declarations[id];
                let name = safe_name(&mut used, &declaration.name);
                if name != declaration.name {
                    debug!("Renamed {} to {} in {}", declaration.name, name, self.modules[module].id);
                    renamed += 1;
                    declaration.name = name;
                }
            }
        }

        for external in &self.externals {
            for (imported, &id) in &external.declarations {
                if imported == "default" || imported == "*" {
                    continue;
                }
                let declaration = &mut self.declarations[id];
                let name = safe_name(&mut used, &declaration.name);
                if name != declaration.name {
                    debug!("Imported {} from {} as {}", imported, external.id, name);
                    renamed += 1;
                    declaration.name = name;
                }
            }
        }
        renamed
    }

    /// Declarations of `module` that appear in the output under their own
    /// name.
    fn rendered_declarations(&self, module: usize) -> Vec<DeclId> {
        let m = &self.modules[module];
        let mut ids = Vec::new();
        for (name, &id) in &m.declarations {
            let declaration = &self.declarations[id];
            let included = declaration
                .statement
                .is_some_and(|s| self.modules[s.module].statements[s.index].is_included);
            if !included {
                continue;
            }
            if name == "default" {
                let replaced = self
                    .default_original(id)
                    .is_some_and(|original| !self.declarations[original].is_reassigned);
                if replaced {
                    continue;
                }
            }
            ids.push(id);
        }
        if let Some(namespace) = m.namespace {
            let declaration = &self.declarations[namespace];
            if let DeclarationKind::SyntheticNamespace { needs_block: true, .. } = declaration.kind {
                if declaration.is_used {
                    ids.push(namespace);
                }
            }
        }
        ids
    }
}

fn safe_name(used: &mut HashMap<String, usize>, name: &str) -> String {
    let mut candidate = name.to_string();
    while let Some(count) = used.get_mut(&candidate) {
        let suffix = *count;
        *count += 1;
        candidate = format!("{candidate}${suffix}");
    }
    used.insert(candidate.clone(), 1);
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::link;

    #[test]
    fn test_safe_name_suffixes() {
        let mut used = HashMap::new();
        assert_eq!(safe_name(&mut used, "a"), "a");
        assert_eq!(safe_name(&mut used, "a"), "a$1");
        assert_eq!(safe_name(&mut used, "a"), "a$2");
        assert_eq!(safe_name(&mut used, "a$1"), "a$1$1");
    }

    #[test]
    fn test_same_name_in_two_modules() {
        let mut graph = link(&[
            ("/main.js", "import { get } from './a';\nvar value = 1;\nconsole.log(get(), value);"),
            ("/a.js", "var value = 2;\nexport function get () { return value; }"),
        ])
        .unwrap();
        graph.mark().unwrap();
        let order = graph.sort();
        assert_eq!(graph.deconflict(&order), 1);

        let main_value = graph.modules[0].declarations["value"];
        let a_value = graph.modules[1].declarations["value"];
        assert_eq!(graph.declarations[a_value].name, "value");
        assert_eq!(graph.declarations[main_value].name, "value$1");
    }

    #[test]
    fn test_wrapper_globals_are_never_taken() {
        let mut graph = link(&[("/main.js", "var exports = {};\nvar module = 1;\nconsole.log(exports, module);")]).unwrap();
        graph.mark().unwrap();
        let order = graph.sort();
        graph.deconflict(&order);
        let names: Vec<&str> = graph.modules[0]
            .declarations
            .values()
            .map(|&id| graph.declarations[id].name.as_str())
            .collect();
        assert_eq!(names, vec!["exports$1", "module$1"]);
    }

    #[test]
    fn test_externals_claim_names_first() {
        let mut graph = link(&[
            ("/main.js", "import React from 'react';\nimport { local } from './dep';\nconsole.log(React, local);"),
            ("/dep.js", "var React = 2;\nexport var local = React;"),
        ])
        .unwrap();
        graph.mark().unwrap();
        let order = graph.sort();
        graph.deconflict(&order);
        assert_eq!(graph.externals[0].name, "React");
        let shadowing = graph.modules[1].declarations["React"];
        assert_eq!(graph.declarations[shadowing].name, "React$1");
    }

    #[test]
    fn test_named_external_import_yields_to_bundled_name() {
        let mut graph = link(&[
            ("/main.js", "import { c } from 'ext';
import { get } from './a';
console.log(c, get());"),
            ("/a.js", "var c = 2;
export function get () { return c; }"),
        ])
        .unwrap();
        graph.mark().unwrap();
        let order = graph.sort();
        assert_eq!(graph.deconflict(&order), 1);

        let bundled = graph.modules[1].declarations["c"];
        let imported = graph.externals[0].declarations["c"];
        assert_eq!(graph.declarations[bundled].name, "c");
        assert_eq!(graph.declarations[imported].name, "c$1");
        assert_eq!(graph.render_name(imported, true), "c$1");
        assert_eq!(graph.render_name(imported, false), "ext.c");
    }
}
