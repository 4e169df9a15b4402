//! Per-module rendering
//!
//! Works on a clone of the module's `MagicString` so a build can be
//! generated any number of times in different formats.

use std::collections::HashSet;

use crate::Result;
use crate::graph::ModuleGraph;
use crate::magic::MagicString;
use crate::module::{DefaultForm, Module, Statement, StatementKind};
use crate::symbol::DeclarationKind;

/// Render the included statements of module `index`: drop excluded code,
/// rename references to their bundle-wide names and strip module syntax.
pub fn render_module(graph: &ModuleGraph, index: usize, es6: bool) -> Result<MagicString> {
    let module = &graph.modules[index];
    let mut magic = module.magic.clone();

    for statement in &module.statements {
        if !statement.is_included || replaced_by_original(graph, module, statement) {
            magic.remove(statement.start, statement.next)?;
            continue;
        }
        for &(start, end) in &statement.string_literal_ranges {
            magic.add_indent_exclusion_range(start, end);
        }

        match &statement.kind {
            StatementKind::Import | StatementKind::ExportClause | StatementKind::Reexport => {
                magic.remove(statement.start, statement.next)?;
                continue;
            }
            StatementKind::Declarator {
                keyword,
                name,
                separator_end,
                last,
            } => {
                if !exports_binding(graph, module, name.as_deref(), es6) {
                    magic.insert(statement.start, &format!("{keyword} "))?;
                }
                let terminator = if *last { ";" } else { ";\n" };
                if statement.end == *separator_end {
                    magic.insert(statement.end, terminator)?;
                } else {
                    magic.overwrite(statement.end, *separator_end, terminator, false)?;
                }
            }
            _ => {}
        }

        rewrite_references(graph, module, statement, es6, &mut magic)?;

        match &statement.kind {
            StatementKind::ExportDeclaration {
                declaration_start,
                declarator_start,
                name,
            } => {
                let end = match declarator_start {
                    Some(start) if exports_binding(graph, module, name.as_deref(), es6) => *start,
                    _ => *declaration_start,
                };
                magic.remove(statement.node_start, end)?;
            }
            StatementKind::ExportDefault {
                declaration_start,
                form,
            } => render_default(graph, module, statement, *declaration_start, *form, es6, &mut magic)?,
            _ => {}
        }
    }

    if let Some(block) = namespace_block(graph, module, es6) {
        magic.append(&block);
    }
    magic.trim();
    Ok(magic)
}

/// Outside `es6`, a reassigned export is written through `exports.name`
/// directly instead of a local binding.
fn exports_binding(graph: &ModuleGraph, module: &Module, name: Option<&str>, es6: bool) -> bool {
    if es6 {
        return false;
    }
    name.and_then(|name| module.declarations.get(name))
        .is_some_and(|&id| graph.declarations[id].is_exported && graph.declarations[id].is_reassigned)
}

/// `export default foo` where `foo` is never reassigned renders nothing;
/// every use of the default goes to `foo` itself.
fn replaced_by_original(graph: &ModuleGraph, module: &Module, statement: &Statement) -> bool {
    let StatementKind::ExportDefault { form, .. } = statement.kind else {
        return false;
    };
    if form == DefaultForm::Declaration {
        return false;
    }
    module
        .declarations
        .get("default")
        .and_then(|&id| graph.default_original(id))
        .is_some_and(|original| !graph.declarations[original].is_reassigned)
}

fn rewrite_references(
    graph: &ModuleGraph,
    module: &Module,
    statement: &Statement,
    es6: bool,
    magic: &mut MagicString,
) -> Result<()> {
    let mut rewritten = vec![false; statement.references.len()];
    let mut to_deshadow = HashSet::new();

    for (index, reference) in statement.references.iter().enumerate() {
        let Some(id) = reference.declaration() else {
            continue;
        };
        let name = graph.render_name(id, es6);
        // a narrowed `ns.member` can render as the bare member name
        if reference.name == name && name.len() == reference.end - reference.start {
            continue;
        }
        rewritten[index] = true;

        let identifier = name.split('.').next().unwrap_or(&name);
        if module.scopes.contains_local(reference.scope, identifier) {
            to_deshadow.insert(identifier.to_string());
        }
        if reference.is_shorthand_property {
            magic.insert(reference.end, &format!(": {name}"))?;
        } else {
            magic.overwrite(reference.start, reference.end, &name, true)?;
        }
    }

    if to_deshadow.is_empty() {
        return Ok(());
    }
    for (index, reference) in statement.references.iter().enumerate() {
        if rewritten[index] || !to_deshadow.contains(&reference.name) {
            continue;
        }
        let name = format!("{}$$", reference.name);
        if reference.is_shorthand_property {
            magic.insert(reference.end, &format!(": {name}"))?;
        } else {
            magic.overwrite(reference.start, reference.end, &name, true)?;
        }
    }
    Ok(())
}

fn render_default(
    graph: &ModuleGraph,
    module: &Module,
    statement: &Statement,
    declaration_start: usize,
    form: DefaultForm,
    es6: bool,
    magic: &mut MagicString,
) -> Result<()> {
    if form == DefaultForm::Declaration {
        magic.remove(statement.node_start, declaration_start)?;
        return Ok(());
    }
    let Some(&default) = module.declarations.get("default") else {
        return Ok(());
    };

    let declaration = &graph.declarations[default];
    if !declaration.is_exported && !declaration.is_used {
        // kept for its side effects only
        magic.remove(statement.start, declaration_start)?;
        return Ok(());
    }

    let name = graph.render_name(default, es6);
    match form {
        DefaultForm::AnonymousFunction { head_end } => {
            let head = &module.code[declaration_start..head_end];
            magic.overwrite(statement.node_start, head_end, &format!("{head} {name}"), false)?;
        }
        _ => {
            magic.overwrite(statement.node_start, declaration_start, &format!("var {name} = "), false)?;
        }
    }
    Ok(())
}

/// `var ns = { ... };` for a module whose namespace is used as a value.
/// Members whose binding is reassigned become getters so the object sees
/// later values.
fn namespace_block(graph: &ModuleGraph, module: &Module, es6: bool) -> Option<String> {
    let declaration = &graph.declarations[module.namespace?];
    let DeclarationKind::SyntheticNamespace {
        originals,
        needs_block: true,
        ..
    } = &declaration.kind
    else {
        return None;
    };
    if !declaration.is_used {
        return None;
    }

    let indent = module.magic.indent_string();
    let members: Vec<String> = originals
        .iter()
        .map(|(name, &original)| {
            let value = graph.render_name(original, es6);
            if graph.declarations[original].is_reassigned {
                format!("{indent}get {name} () {{ return {value}; }}")
            } else {
                format!("{indent}{name}: {value}")
            }
        })
        .collect();
    Some(format!(
        "\n\nvar {} = {{\n{}\n}};\n\n",
        declaration.name,
        members.join(",\n")
    ))
}
