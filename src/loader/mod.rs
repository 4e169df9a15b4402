//! Loading, resolving and transforming module text
//!
//! The bundler never touches the filesystem directly. Every module id goes
//! through a chain of [`Resolver`]s, its text through a chain of
//! [`Loader`]s and then every [`Transform`] in order. Custom collaborators
//! run first; the built-in filesystem loader and default resolver run last.

pub mod fs;
pub mod resolve;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use tree_sitter::Tree;

pub use fs::FsLoader;
pub use resolve::DefaultResolver;

use crate::sourcemap::SourceMap;
use crate::{Error, Result};

/// Where an import leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedId {
    /// A module to load and bundle
    Module(String),
    /// Kept as a dependency of the output
    External(String),
}

/// Text produced by a transform, with the map back to its input.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescription {
    pub code: String,
    pub map: Option<SourceMap>,
}

impl From<String> for SourceDescription {
    fn from(code: String) -> Self {
        Self { code, map: None }
    }
}

/// What a loader hands over for a module. `ast` must be a tree parsed from
/// `code`; `map` leads from `code` back to whatever the loader read.
#[derive(Debug, Clone, Default)]
pub struct LoadedSource {
    pub code: String,
    pub ast: Option<Tree>,
    pub map: Option<SourceMap>,
}

impl From<String> for LoadedSource {
    fn from(code: String) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }
}

impl From<&str> for LoadedSource {
    fn from(code: &str) -> Self {
        code.to_string().into()
    }
}

/// Module text after every transform ran.
#[derive(Debug, Clone)]
pub struct TransformedSource {
    pub code: String,
    /// Text as the loader returned it
    pub original_code: String,
    /// The loader's tree, kept only while no transform changed the text
    pub ast: Option<Tree>,
    /// The loader's map first, then one entry per transform that changed
    /// the text; `None` where a transform produced no map.
    pub sourcemap_chain: Vec<Option<SourceMap>>,
}

impl TransformedSource {
    pub fn untransformed(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            original_code: code.clone(),
            code,
            ast: None,
            sourcemap_chain: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Loader: Send + Sync {
    /// Source of module `id`, or `None` to defer to the next loader.
    async fn load(&self, id: &str) -> Result<Option<LoadedSource>>;
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `importee` as imported by `importer` (`None` for the entry),
    /// or `None` to defer to the next resolver.
    async fn resolve(&self, importee: &str, importer: Option<&str>) -> Result<Option<ResolvedId>>;
}

#[async_trait]
pub trait Transform: Send + Sync {
    /// Rewrite `code` of module `id`, or `None` to leave it unchanged.
    async fn transform(&self, code: &str, id: &str) -> Result<Option<SourceDescription>>;
}

/// The collaborator chains of one build.
#[derive(Clone)]
pub struct Pipeline {
    loaders: Vec<Arc<dyn Loader>>,
    resolvers: Vec<Arc<dyn Resolver>>,
    transforms: Vec<Arc<dyn Transform>>,
}

impl Pipeline {
    /// Chains ending in the built-in `fallback_loader` and `fallback_resolver`.
    pub fn new(
        mut loaders: Vec<Arc<dyn Loader>>,
        mut resolvers: Vec<Arc<dyn Resolver>>,
        transforms: Vec<Arc<dyn Transform>>,
        fallback_loader: Arc<dyn Loader>,
        fallback_resolver: Arc<dyn Resolver>,
    ) -> Self {
        loaders.push(fallback_loader);
        resolvers.push(fallback_resolver);
        Self {
            loaders,
            resolvers,
            transforms,
        }
    }

    pub fn has_transforms(&self) -> bool {
        !self.transforms.is_empty()
    }

    pub async fn resolve(&self, importee: &str, importer: Option<&str>) -> Result<ResolvedId> {
        for resolver in &self.resolvers {
            if let Some(resolved) = resolver.resolve(importee, importer).await? {
                debug!("Resolved {} -> {:?}", importee, resolved);
                return Ok(resolved);
            }
        }
        match importer {
            Some(importer) => Err(Error::Resolve {
                importee: importee.to_string(),
                importer: importer.to_string(),
            }),
            None => Err(Error::UnresolvedEntry(importee.to_string())),
        }
    }

    /// Load module `id` and run every transform over it.
    pub async fn fetch(&self, id: &str) -> Result<TransformedSource> {
        let mut loaded = None;
        for loader in &self.loaders {
            if let Some(source) = loader.load(id).await? {
                loaded = Some(source);
                break;
            }
        }
        let LoadedSource {
            code: original_code,
            mut ast,
            map,
        } = loaded.ok_or_else(|| Error::Load {
            id: id.to_string(),
            importer: None,
            message: "no loader returned any text".to_string(),
        })?;

        let mut code = original_code.clone();
        let mut sourcemap_chain: Vec<Option<SourceMap>> = map.into_iter().map(Some).collect();
        for transform in &self.transforms {
            let Some(description) = transform.transform(&code, id).await? else {
                continue;
            };
            if description.map.is_none() {
                warn!("A transform of {} produced no source map", id);
            }
            if ast.take().is_some() {
                debug!("Dropped the loaded syntax tree of {} after a transform", id);
            }
            code = description.code;
            sourcemap_chain.push(description.map);
        }

        Ok(TransformedSource {
            code,
            original_code,
            ast,
            sourcemap_chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MemoryLoader(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl Loader for MemoryLoader {
        async fn load(&self, id: &str) -> Result<Option<LoadedSource>> {
            Ok(self.0.get(id).map(|&code| code.into()))
        }
    }

    struct Uppercase;

    #[async_trait]
    impl Transform for Uppercase {
        async fn transform(&self, code: &str, _id: &str) -> Result<Option<SourceDescription>> {
            Ok(Some(code.to_uppercase().into()))
        }
    }

    struct Refuse;

    #[async_trait]
    impl Resolver for Refuse {
        async fn resolve(&self, _importee: &str, _importer: Option<&str>) -> Result<Option<ResolvedId>> {
            Ok(None)
        }
    }

    fn pipeline(transforms: Vec<Arc<dyn Transform>>) -> Pipeline {
        let loader = MemoryLoader(HashMap::from([("/a.js", "foo()")]));
        Pipeline::new(Vec::new(), Vec::new(), transforms, Arc::new(loader), Arc::new(Refuse))
    }

    #[tokio::test]
    async fn test_fetch_runs_transforms() {
        let source = pipeline(vec![Arc::new(Uppercase)]).fetch("/a.js").await.unwrap();
        assert_eq!(source.code, "FOO()");
        assert_eq!(source.original_code, "foo()");
        assert_eq!(source.sourcemap_chain, vec![None]);

        let untouched = pipeline(Vec::new()).fetch("/a.js").await.unwrap();
        assert_eq!(untouched.code, "foo()");
        assert_eq!(untouched.original_code, "foo()");
        assert!(untouched.sourcemap_chain.is_empty());
    }

    struct MappedLoader;

    #[async_trait]
    impl Loader for MappedLoader {
        async fn load(&self, _id: &str) -> Result<Option<LoadedSource>> {
            let code = "foo()";
            let mut parser = crate::adapter::JavaScriptParser::new()?;
            Ok(Some(LoadedSource {
                code: code.to_string(),
                ast: Some(parser.parse("/a.js", code)?),
                map: Some(SourceMap {
                    version: 3,
                    file: None,
                    sources: vec![Some("a.ts".into())],
                    sources_content: vec![None],
                    names: Vec::new(),
                    mappings: "AAAA".into(),
                }),
            }))
        }
    }

    #[tokio::test]
    async fn test_loader_map_and_tree_are_kept() {
        let loaded = Pipeline::new(Vec::new(), Vec::new(), Vec::new(), Arc::new(MappedLoader), Arc::new(Refuse))
            .fetch("/a.js")
            .await
            .unwrap();
        assert!(loaded.ast.is_some());
        assert_eq!(loaded.sourcemap_chain.len(), 1);
        assert_eq!(loaded.sourcemap_chain[0].as_ref().map(|m| m.mappings.as_str()), Some("AAAA"));

        let transformed = Pipeline::new(
            Vec::new(),
            Vec::new(),
            vec![Arc::new(Uppercase)],
            Arc::new(MappedLoader),
            Arc::new(Refuse),
        )
        .fetch("/a.js")
        .await
        .unwrap();
        assert!(transformed.ast.is_none());
        assert_eq!(transformed.code, "FOO()");
        assert_eq!(transformed.sourcemap_chain.len(), 2);
    }

    #[tokio::test]
    async fn test_unresolved_errors() {
        let pipeline = pipeline(Vec::new());
        assert!(matches!(
            pipeline.resolve("./x", Some("/a.js")).await,
            Err(Error::Resolve { .. })
        ));
        assert!(matches!(pipeline.resolve("main", None).await, Err(Error::UnresolvedEntry(_))));
        assert!(matches!(pipeline.fetch("/missing.js").await, Err(Error::Load { .. })));
    }
}
