//! ES module output: `import` and `export` statements around the code

use super::FinaliseContext;
use crate::Result;
use crate::graph::ModuleGraph;
use crate::magic::MagicBundle;
use crate::module::ExternalModule;

pub fn finalise(mut magic: MagicBundle, ctx: &FinaliseContext<'_>) -> Result<MagicBundle> {
    let import_block = ctx
        .externals()
        .iter()
        .map(|external| import_statement(ctx.graph, external))
        .collect::<Vec<_>>()
        .join("\n");
    if !import_block.is_empty() {
        magic.prepend(&format!("{import_block}\n\n"));
    }

    let graph = ctx.graph;
    let specifiers: Vec<String> = graph
        .entry_exports
        .iter()
        .filter(|(name, _)| name.as_str() != "default")
        .map(|(name, &id)| {
            let local = graph.render_name(id, true);
            if &local == name {
                local
            } else {
                format!("{local} as {name}")
            }
        })
        .collect();

    let mut export_lines = Vec::new();
    if !specifiers.is_empty() {
        export_lines.push(format!("export {{ {} }};", specifiers.join(", ")));
    }
    if let Some(&id) = graph.entry_exports.get("default") {
        export_lines.push(format!("export default {};", graph.render_name(id, true)));
    }
    if !export_lines.is_empty() {
        magic.append(&format!("\n\n{}", export_lines.join("\n")));
    }

    magic.trim();
    Ok(magic)
}

fn import_statement(graph: &ModuleGraph, external: &ExternalModule) -> String {
    let id = &external.id;
    let name = &external.name;
    let named: Vec<String> = external
        .declarations
        .iter()
        .filter(|(key, _)| key.as_str() != "default" && key.as_str() != "*")
        .map(|(key, &decl)| {
            let local = &graph.declarations[decl].name;
            if local == key { local.clone() } else { format!("{key} as {local}") }
        })
        .collect();

    let mut clauses = Vec::new();
    if external.declarations.contains_key("default") {
        clauses.push(name.clone());
    }
    let namespace = external.declarations.contains_key("*").then(|| format!("* as {name}"));
    let named = (!named.is_empty()).then(|| format!("{{ {} }}", named.join(", ")));

    match (namespace, named) {
        // a namespace import cannot share a clause with named imports
        (Some(namespace), Some(named)) => {
            clauses.push(namespace);
            format!("import {} from '{id}';\nimport {named} from '{id}';", clauses.join(", "))
        }
        (namespace, named) => {
            clauses.extend(namespace);
            clauses.extend(named);
            if clauses.is_empty() {
                format!("import '{id}';")
            } else {
                format!("import {} from '{id}';", clauses.join(", "))
            }
        }
    }
}
