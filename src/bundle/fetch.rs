//! Concurrent module fetching
//!
//! Loads and resolutions run as tasks in one `JoinSet`; the coordinating
//! loop parses each module as its text arrives and spawns resolutions for
//! its imports, so sibling branches of the graph are fetched in parallel.
//! Dropping the set on the first error aborts everything still in flight.
//!
//! Arrival order depends on timing, so modules are renumbered afterwards
//! in a depth-first pre-order from the entry. Every later phase sees the
//! same indices regardless of how the fetches interleaved.

use std::collections::{HashMap, HashSet};

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::adapter::JavaScriptParser;
use crate::loader::{Pipeline, ResolvedId, TransformedSource};
use crate::module::{ExternalModule, Module};
use crate::symbol::{Declarations, ModuleKey};
use crate::{Error, Result};

/// Everything fetched for one build, in canonical order.
#[derive(Debug)]
pub struct FetchedGraph {
    pub modules: Vec<Module>,
    pub externals: Vec<ExternalModule>,
    pub declarations: Declarations,
}

enum Fetched {
    Loaded {
        id: String,
        source: TransformedSource,
    },
    Resolved {
        importer: usize,
        source: String,
        resolved: ResolvedId,
    },
}

pub async fn fetch_graph(entry: &str, pipeline: &Pipeline) -> Result<FetchedGraph> {
    let entry_id = match pipeline.resolve(entry, None).await? {
        ResolvedId::Module(id) => id,
        ResolvedId::External(_) => return Err(Error::UnresolvedEntry(entry.to_string())),
    };
    info!("Fetching module graph from {}", entry_id);

    let mut parser = JavaScriptParser::new()?;
    let mut declarations = Declarations::new();
    let mut modules: Vec<Module> = Vec::new();
    let mut resolutions: Vec<HashMap<String, ResolvedId>> = Vec::new();
    let mut requested = HashSet::from([entry_id.clone()]);

    let mut tasks = JoinSet::new();
    spawn_load(&mut tasks, pipeline, entry_id.clone(), None);

    while let Some(joined) = tasks.join_next().await {
        let fetched = joined.map_err(|err| Error::Load {
            id: entry_id.clone(),
            importer: None,
            message: format!("fetch task failed: {err}"),
        })??;

        match fetched {
            Fetched::Loaded { id, source } => {
                let index = modules.len();
                let module = Module::new(index, id, source, &mut declarations, &mut parser)?;
                for source in &module.sources {
                    spawn_resolve(&mut tasks, pipeline, index, source.clone(), module.id.clone());
                }
                modules.push(module);
                resolutions.push(HashMap::new());
            }
            Fetched::Resolved {
                importer,
                source,
                resolved,
            } => {
                if let ResolvedId::Module(id) = &resolved {
                    if *id == modules[importer].id {
                        return Err(Error::SelfImport(id.clone()));
                    }
                    if requested.insert(id.clone()) {
                        spawn_load(&mut tasks, pipeline, id.clone(), Some(modules[importer].id.clone()));
                    }
                }
                resolutions[importer].insert(source, resolved);
            }
        }
    }

    let graph = canonicalize(modules, resolutions, declarations);
    debug!(
        "Fetched {} modules and {} externals",
        graph.modules.len(),
        graph.externals.len()
    );
    Ok(graph)
}

/// Load `id`; a load failure names the module whose import asked for it.
fn spawn_load(tasks: &mut JoinSet<Result<Fetched>>, pipeline: &Pipeline, id: String, importer: Option<String>) {
    let pipeline = pipeline.clone();
    tasks.spawn(async move {
        let source = pipeline.fetch(&id).await.map_err(|err| match err {
            Error::Load { id, message, .. } => Error::Load { id, importer, message },
            other => other,
        })?;
        Ok(Fetched::Loaded { id, source })
    });
}

fn spawn_resolve(
    tasks: &mut JoinSet<Result<Fetched>>,
    pipeline: &Pipeline,
    importer: usize,
    source: String,
    importer_id: String,
) {
    let pipeline = pipeline.clone();
    tasks.spawn(async move {
        let resolved = pipeline.resolve(&source, Some(&importer_id)).await?;
        Ok(Fetched::Resolved {
            importer,
            source,
            resolved,
        })
    });
}

/// Renumber modules in depth-first pre-order from the entry (arrival index
/// 0), fill in `resolved_ids` and create externals in first-import order.
fn canonicalize(
    modules: Vec<Module>,
    resolutions: Vec<HashMap<String, ResolvedId>>,
    mut declarations: Declarations,
) -> FetchedGraph {
    let by_id: HashMap<String, usize> = modules
        .iter()
        .enumerate()
        .map(|(index, module)| (module.id.clone(), index))
        .collect();
    let target = |importer: usize, source: &str| match resolutions[importer].get(source) {
        Some(ResolvedId::Module(id)) => by_id.get(id).copied(),
        _ => None,
    };

    let mut order = Vec::with_capacity(modules.len());
    let mut visited = vec![false; modules.len()];
    let mut stack = vec![0];
    while let Some(index) = stack.pop() {
        if std::mem::replace(&mut visited[index], true) {
            continue;
        }
        order.push(index);
        for source in modules[index].sources.iter().rev() {
            if let Some(dependency) = target(index, source) {
                if !visited[dependency] {
                    stack.push(dependency);
                }
            }
        }
    }

    let mut renumbered = vec![0; modules.len()];
    for (position, &index) in order.iter().enumerate() {
        renumbered[index] = position;
    }

    for declaration in declarations.iter_mut() {
        if let Some(statement) = &mut declaration.statement {
            statement.module = renumbered[statement.module];
        }
    }

    let mut slots: Vec<Option<Module>> = modules.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(order.len());
    let mut externals: Vec<ExternalModule> = Vec::new();
    for &index in &order {
        let Some(mut module) = slots[index].take() else {
            continue;
        };
        module.index = renumbered[index];
        for source in &module.sources {
            let key = match resolutions[index].get(source) {
                Some(ResolvedId::Module(id)) => match by_id.get(id) {
                    Some(&dependency) => ModuleKey::Internal(renumbered[dependency]),
                    None => continue,
                },
                Some(ResolvedId::External(id)) => match externals.iter().position(|e| e.id == *id) {
                    Some(existing) => ModuleKey::External(existing),
                    None => {
                        externals.push(ExternalModule::new(id.as_str()));
                        ModuleKey::External(externals.len() - 1)
                    }
                },
                None => continue,
            };
            module.resolved_ids.insert(source.clone(), key);
        }
        ordered.push(module);
    }

    FetchedGraph {
        modules: ordered,
        externals,
        declarations,
    }
}
