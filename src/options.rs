//! Build and output options

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::finalise::{ExportModeOption, Format};
use crate::loader::resolve::DEFAULT_MAIN_FIELDS;
use crate::loader::{Loader, Resolver, Transform};

/// Options for [`Bundle::build`](crate::Bundle::build).
#[derive(Clone)]
pub struct BundleOptions {
    pub entry: String,
    /// Ids or glob patterns kept out of the bundle
    pub external: Vec<String>,
    /// `package.json` fields naming a package's module entry
    pub main_fields: Vec<String>,
    /// Directory the entry is resolved against; the process working
    /// directory when unset.
    pub cwd: Option<String>,
    pub loaders: Vec<Arc<dyn Loader>>,
    pub resolvers: Vec<Arc<dyn Resolver>>,
    pub transforms: Vec<Arc<dyn Transform>>,
}

impl BundleOptions {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            external: Vec::new(),
            main_fields: DEFAULT_MAIN_FIELDS.iter().map(|f| f.to_string()).collect(),
            cwd: None,
            loaders: Vec::new(),
            resolvers: Vec::new(),
            transforms: Vec::new(),
        }
    }

    pub fn external(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.external.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loaders.push(loader);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }
}

impl fmt::Debug for BundleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleOptions")
            .field("entry", &self.entry)
            .field("external", &self.external)
            .field("main_fields", &self.main_fields)
            .field("cwd", &self.cwd)
            .field("loaders", &self.loaders.len())
            .field("resolvers", &self.resolvers.len())
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

/// Whether and how a source map is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapOption {
    #[default]
    None,
    /// A sibling `.map` file
    File,
    /// A `data:` URI in the trailing comment
    Inline,
}

/// Indentation of wrapped output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IndentOption {
    /// Guessed from the bundled sources, `\t` when undecidable
    #[default]
    Auto,
    None,
    Literal(String),
}

/// Options for [`Bundle::generate`](crate::Bundle::generate) and
/// [`Bundle::write`](crate::Bundle::write).
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub format: Format,
    pub exports: ExportModeOption,
    /// Global variable (`iife`, `umd`) holding the exports
    pub module_name: Option<String>,
    /// Module id passed to `define` (`amd`, `umd`)
    pub module_id: Option<String>,
    /// External id to global variable name (`iife`, `umd`)
    pub globals: IndexMap<String, String>,
    /// Placed before the wrapper
    pub banner: Option<String>,
    /// Placed after the wrapper
    pub footer: Option<String>,
    /// Placed inside the wrapper, before the code
    pub intro: Option<String>,
    /// Placed inside the wrapper, after the code
    pub outro: Option<String>,
    pub indent: IndentOption,
    pub use_strict: bool,
    pub sourcemap: SourceMapOption,
    /// Path the map's `sources` are relative to; defaults to `dest`
    pub sourcemap_file: Option<String>,
    pub dest: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            format: Format::Es6,
            exports: ExportModeOption::Auto,
            module_name: None,
            module_id: None,
            globals: IndexMap::new(),
            banner: None,
            footer: None,
            intro: None,
            outro: None,
            indent: IndentOption::Auto,
            use_strict: true,
            sourcemap: SourceMapOption::None,
            sourcemap_file: None,
            dest: None,
        }
    }
}

impl GenerateOptions {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn wants_map(&self) -> bool {
        self.sourcemap != SourceMapOption::None
    }
}
