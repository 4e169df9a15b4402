//! Bundle - one build of a module graph
//!
//! `Bundle::build` fetches every module reachable from the entry, binds
//! references, marks live statements, orders the modules and settles
//! top-level names. The resulting bundle is immutable: `generate` renders
//! it in any format as often as needed and `write` puts the result on disk.

pub mod deconflict;
pub mod fetch;
pub mod render;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::finalise::{self, FinaliseContext, Format};
use crate::graph::{GraphStats, ModuleGraph};
use crate::linker::LinkStats;
use crate::loader::{DefaultResolver, FsLoader, Pipeline};
use crate::magic::{MagicBundle, MapOptions};
use crate::options::{BundleOptions, GenerateOptions, IndentOption, SourceMapOption};
use crate::path::{basename, current_dir, dirname, unixize};
use crate::sourcemap::SourceMap;
use crate::sourcemap::collapse::{SourceChain, collapse_sourcemaps};
use crate::{Error, Result};

use fetch::fetch_graph;
use render::render_module;

pub const SOURCEMAP_COMMENT: &str = concat!("//# source", "MappingURL=");

/// Generated code and, when requested, its source map.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub code: String,
    pub map: Option<SourceMap>,
}

#[derive(Debug)]
pub struct Bundle {
    graph: ModuleGraph,
    /// Module indices in output order
    ordered: Vec<usize>,
    stats: BuildStats,
}

impl Bundle {
    pub async fn build(options: BundleOptions) -> Result<Self> {
        let start = Instant::now();
        let cwd = match &options.cwd {
            Some(cwd) => unixize(cwd),
            None => current_dir()?,
        };
        let resolver = DefaultResolver::new(cwd)
            .with_external(&options.external)
            .with_main_fields(&options.main_fields);
        let pipeline = Pipeline::new(
            options.loaders,
            options.resolvers,
            options.transforms,
            Arc::new(FsLoader),
            Arc::new(resolver),
        );

        let fetched = fetch_graph(&options.entry, &pipeline).await?;
        let mut graph = ModuleGraph::new(fetched.modules, fetched.externals, fetched.declarations);
        let link = graph.bind()?;
        let passes = graph.mark()?;
        let ordered = graph.sort();
        let renamed = graph.deconflict(&ordered);

        let stats = BuildStats {
            graph: graph.stats(),
            link,
            passes,
            renamed,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Built {} modules in {}ms ({} of {} statements included)",
            stats.graph.modules, stats.duration_ms, stats.graph.included, stats.graph.statements
        );
        Ok(Self { graph, ordered, stats })
    }

    /// Ids of the external modules the output depends on
    pub fn imports(&self) -> Vec<String> {
        self.graph.external_ids()
    }

    /// Names exported by the entry module
    pub fn exports(&self) -> Vec<String> {
        self.graph.get_exports(self.graph.entry)
    }

    /// Ids of the bundled modules, in output order
    pub fn modules(&self) -> Vec<&str> {
        self.ordered
            .iter()
            .map(|&index| self.graph.modules[index].id.as_str())
            .collect()
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    pub fn generate(&self, options: &GenerateOptions) -> Result<Output> {
        let mode = finalise::check_options(&self.graph, options)?;
        let es6 = options.format == Format::Es6;

        let mut magic = MagicBundle::new("\n\n");
        let mut used_modules = Vec::new();
        for &index in &self.ordered {
            let rendered = render_module(&self.graph, index, es6)?;
            if rendered.is_empty() {
                continue;
            }
            magic.add_source(rendered, Some(self.graph.modules[index].id.clone()))?;
            used_modules.push(index);
        }
        debug!(
            "Rendered {} of {} modules as {}",
            used_modules.len(),
            self.ordered.len(),
            options.format
        );

        if let Some(intro) = &options.intro {
            magic.prepend(&format!("{intro}\n"));
        }
        if let Some(outro) = &options.outro {
            magic.append(&format!("\n{outro}"));
        }

        let guessed_indent = magic.indent_string();
        let indent = match &options.indent {
            IndentOption::Auto => guessed_indent.clone(),
            IndentOption::None => String::new(),
            IndentOption::Literal(indent) => indent.clone(),
        };
        let context = FinaliseContext {
            graph: &self.graph,
            mode,
            indent: &indent,
            guessed_indent: &guessed_indent,
            options,
        };
        magic.trim();
        let mut magic = finalise::finalise(magic, &context)?;

        if let Some(banner) = &options.banner {
            magic.prepend(&format!("{banner}\n"));
        }
        if let Some(footer) = &options.footer {
            magic.append(&format!("\n{footer}"));
        }

        let map = if options.wants_map() {
            Some(self.source_map(&magic, options, &used_modules)?)
        } else {
            None
        };
        Ok(Output {
            code: magic.to_string(),
            map,
        })
    }

    fn source_map(&self, magic: &MagicBundle, options: &GenerateOptions, used_modules: &[usize]) -> Result<SourceMap> {
        let file = options.sourcemap_file.clone().or_else(|| options.dest.clone());
        let mut map = magic.generate_map(&MapOptions {
            file,
            source: None,
            include_content: true,
            hires: false,
        });

        let transformed = used_modules
            .iter()
            .any(|&index| !self.graph.modules[index].sourcemap_chain.is_empty());
        if transformed {
            let chains: Vec<SourceChain<'_>> = used_modules
                .iter()
                .map(|&index| {
                    let module = &self.graph.modules[index];
                    SourceChain {
                        maps: &module.sourcemap_chain,
                        original_code: &module.original_code,
                    }
                })
                .collect();
            map = collapse_sourcemaps(&map, &chains)?;
        }

        map.sources = map
            .sources
            .into_iter()
            .map(|source| source.map(|s| unixize(&s)))
            .collect();
        Ok(map)
    }

    /// Generate and write to `options.dest`, with the source map inline or
    /// in a sibling `.map` file.
    pub async fn write(&self, options: &GenerateOptions) -> Result<Output> {
        let dest = options.dest.as_deref().ok_or(Error::MissingDestination)?;
        let mut output = self.generate(options)?;

        let dir = dirname(dest);
        if dir != "." {
            tokio::fs::create_dir_all(&dir).await?;
        }

        if let Some(map) = &output.map {
            let url = match options.sourcemap {
                SourceMapOption::Inline => map.to_url()?,
                _ => {
                    tokio::fs::write(format!("{dest}.map"), map.to_json()?).await?;
                    format!("{}.map", basename(dest))
                }
            };
            output.code.push_str(&format!("\n{SOURCEMAP_COMMENT}{url}"));
        }

        tokio::fs::write(dest, &output.code).await?;
        info!("Wrote {} ({} bytes)", dest, output.code.len());
        Ok(output)
    }
}

/// Statistics about one build
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildStats {
    pub graph: GraphStats,
    pub link: LinkStats,
    /// Side-effect passes until inclusion settled
    pub passes: usize,
    /// Declarations and externals renamed to avoid collisions
    pub renamed: usize,
    pub duration_ms: u64,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.graph)?;
        write!(f, "{}", self.link)?;
        writeln!(f, "Build Stats:")?;
        writeln!(f, "  Side-effect passes: {}", self.passes)?;
        writeln!(f, "  Renamed: {}", self.renamed)?;
        writeln!(f, "  Duration: {}ms", self.duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadedSource, Loader, ResolvedId, Resolver};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct Memory(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl Loader for Memory {
        async fn load(&self, id: &str) -> Result<Option<LoadedSource>> {
            Ok(self.0.get(id).map(|&code| code.into()))
        }
    }

    #[async_trait]
    impl Resolver for Memory {
        async fn resolve(&self, importee: &str, _importer: Option<&str>) -> Result<Option<ResolvedId>> {
            let id = format!("/{}.js", importee.trim_start_matches("./").trim_end_matches(".js"));
            if self.0.contains_key(id.as_str()) {
                Ok(Some(ResolvedId::Module(id)))
            } else {
                Ok(Some(ResolvedId::External(importee.to_string())))
            }
        }
    }

    async fn bundle(modules: &[(&'static str, &'static str)]) -> Bundle {
        let memory = Arc::new(Memory(modules.iter().copied().collect()));
        let options = BundleOptions::new("main").loader(memory.clone()).resolver(memory);
        Bundle::build(options).await.unwrap()
    }

    #[tokio::test]
    async fn test_build_result_surface() {
        let bundle = bundle(&[
            ("/main.js", "import { a } from './a';\nimport $ from 'jquery';\nexport var b = a + $.x;"),
            ("/a.js", "export var a = 1;"),
        ])
        .await;
        assert_eq!(bundle.imports(), vec!["jquery"]);
        assert_eq!(bundle.exports(), vec!["b"]);
        assert_eq!(bundle.modules(), vec!["/a.js", "/main.js"]);
        assert!(bundle.stats().to_string().contains("Build Stats:"));
    }

    #[tokio::test]
    async fn test_generate_every_format() {
        let bundle = bundle(&[("/main.js", "import $ from 'jquery';\nexport default function () {\n  return $('body');\n}")]).await;

        let es6 = bundle.generate(&GenerateOptions::new(Format::Es6)).unwrap();
        assert_eq!(
            es6.code,
            "import $ from 'jquery';\n\nfunction main () {\n  return $('body');\n}\n\nexport default main;"
        );

        let cjs = bundle.generate(&GenerateOptions::new(Format::Cjs)).unwrap();
        assert_eq!(
            cjs.code,
            "'use strict';\n\nvar $ = require('jquery');\n$ = 'default' in $ ? $['default'] : $;\n\nfunction main () {\n  return $('body');\n}\n\nmodule.exports = main;"
        );

        let mut options = GenerateOptions::new(Format::Iife);
        options.module_name = Some("app".into());
        options.globals.insert("jquery".into(), "jQuery".into());
        let iife = bundle.generate(&options).unwrap();
        assert!(iife.code.starts_with("var app = (function ($) { 'use strict';\n\n"));
        assert!(iife.code.ends_with("\n\n  return main;\n\n})(jQuery);"));

        options.format = Format::Amd;
        let amd = bundle.generate(&options).unwrap();
        assert!(amd.code.starts_with("define(['jquery'], function ($) { 'use strict';\n\n"));
        assert!(amd.code.ends_with("\n\n});"));

        options.format = Format::Umd;
        let umd = bundle.generate(&options).unwrap();
        assert!(umd.code.starts_with("(function (global, factory) {\n  typeof exports === 'object'"));
        assert!(umd.code.contains("module.exports = factory(require('jquery'))"));
        assert!(umd.code.contains("global.app = factory(global.jQuery);"));
        assert!(umd.code.ends_with("}));"));
    }

    #[tokio::test]
    async fn test_banner_footer_and_intro() {
        let bundle = bundle(&[("/main.js", "console.log(1);")]).await;
        let mut options = GenerateOptions::new(Format::Iife);
        options.banner = Some("/* banner */".into());
        options.footer = Some("/* footer */".into());
        options.intro = Some("var DEBUG = false;".into());
        options.indent = IndentOption::Literal("    ".into());
        let output = bundle.generate(&options).unwrap();
        assert_eq!(
            output.code,
            "/* banner */\n(function () { 'use strict';\n\n    var DEBUG = false;\n    console.log(1);\n\n})();\n/* footer */"
        );
    }

    #[tokio::test]
    async fn test_write_requires_destination() {
        let bundle = bundle(&[("/main.js", "console.log(1);")]).await;
        let err = bundle.write(&GenerateOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::MissingDestination));
    }

    #[tokio::test]
    async fn test_write_with_map_file() {
        let bundle = bundle(&[("/main.js", "console.log(1);")]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = crate::path::to_id(&dir.path().join("dist/out.js"));
        let mut options = GenerateOptions::new(Format::Cjs);
        options.dest = Some(dest.clone());
        options.sourcemap = SourceMapOption::File;
        bundle.write(&options).await.unwrap();

        let code = std::fs::read_to_string(&dest).unwrap();
        assert!(code.ends_with(&format!("\n{SOURCEMAP_COMMENT}out.js.map")));
        let map = SourceMap::from_json(&std::fs::read_to_string(format!("{dest}.map")).unwrap()).unwrap();
        assert_eq!(map.file.as_deref(), Some("out.js"));
        assert_eq!(map.sources_content, vec![Some("console.log(1);".to_string())]);
    }
}
