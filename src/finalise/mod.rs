//! Output wrappers
//!
//! A finaliser takes the concatenated, indented module code and wraps it
//! for one module system: import and export syntax for `es6`, `require`
//! calls for `cjs`, a `define` factory for `amd`, a self-invoking closure
//! for `iife` and a loader-sniffing closure for `umd`.

pub mod amd;
pub mod cjs;
pub mod es6;
pub mod iife;
pub mod umd;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::ModuleGraph;
use crate::magic::MagicBundle;
use crate::module::ExternalModule;
use crate::options::GenerateOptions;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Es6,
    Cjs,
    Amd,
    Iife,
    Umd,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Es6 => "es6",
            Format::Cjs => "cjs",
            Format::Amd => "amd",
            Format::Iife => "iife",
            Format::Umd => "umd",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "es6" => Ok(Format::Es6),
            "cjs" => Ok(Format::Cjs),
            "amd" => Ok(Format::Amd),
            "iife" => Ok(Format::Iife),
            "umd" => Ok(Format::Umd),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

/// Requested export mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportModeOption {
    #[default]
    Auto,
    Default,
    Named,
    None,
}

impl FromStr for ExportModeOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(ExportModeOption::Auto),
            "default" => Ok(ExportModeOption::Default),
            "named" => Ok(ExportModeOption::Named),
            "none" => Ok(ExportModeOption::None),
            other => Err(Error::InvalidExportMode(other.to_string())),
        }
    }
}

/// How the entry's exports are exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// The default export is the module value
    Default,
    /// Exports are properties of an `exports` object
    Named,
    None,
}

/// Check `option` against the entry's exports and settle `auto`.
pub fn get_export_mode(graph: &ModuleGraph, option: ExportModeOption) -> Result<ExportMode> {
    let entry = &graph.modules[graph.entry];
    let keys: Vec<String> = entry
        .exports
        .keys()
        .chain(entry.reexports.keys())
        .chain(entry.export_all_sources.iter())
        .cloned()
        .collect();
    let only_default = keys.len() == 1 && keys[0] == "default";

    match option {
        ExportModeOption::Default if !only_default => Err(Error::ExportModeMismatch {
            mode: "default",
            exports: keys,
        }),
        ExportModeOption::None if !keys.is_empty() => Err(Error::ExportModeMismatch {
            mode: "none",
            exports: keys,
        }),
        ExportModeOption::Default => Ok(ExportMode::Default),
        ExportModeOption::Named => Ok(ExportMode::Named),
        ExportModeOption::None => Ok(ExportMode::None),
        ExportModeOption::Auto if keys.is_empty() => Ok(ExportMode::None),
        ExportModeOption::Auto if only_default => Ok(ExportMode::Default),
        ExportModeOption::Auto => Ok(ExportMode::Named),
    }
}

/// Settle the export mode and check the options the chosen wrapper needs,
/// before anything is rendered.
pub fn check_options(graph: &ModuleGraph, options: &GenerateOptions) -> Result<ExportMode> {
    let mode = get_export_mode(graph, options.exports)?;
    let label = match options.format {
        Format::Iife if mode != ExportMode::None => Some("IIFE"),
        Format::Umd if mode != ExportMode::None => Some("UMD"),
        Format::Amd if mode == ExportMode::Named => Some("AMD"),
        _ => None,
    };
    match label {
        Some(label) if options.module_name.is_none() => Err(Error::MissingModuleName(label)),
        _ => Ok(mode),
    }
}

/// What a finaliser needs besides the code.
pub struct FinaliseContext<'a> {
    pub graph: &'a ModuleGraph,
    pub mode: ExportMode,
    /// Indentation applied to the wrapped code
    pub indent: &'a str,
    /// Indentation guessed from the sources, used inside wrapper headers
    pub guessed_indent: &'a str,
    pub options: &'a GenerateOptions,
}

impl FinaliseContext<'_> {
    pub fn externals(&self) -> &[ExternalModule] {
        &self.graph.externals
    }

    fn use_strict(&self) -> &'static str {
        if self.options.use_strict { " 'use strict';" } else { "" }
    }

    fn module_name(&self, format: &'static str) -> Result<&str> {
        self.options
            .module_name
            .as_deref()
            .ok_or(Error::MissingModuleName(format))
    }

    /// Global names of externals for closure wrappers
    fn global_names(&self) -> Vec<String> {
        self.externals()
            .iter()
            .map(|external| {
                self.options
                    .globals
                    .get(&external.id)
                    .cloned()
                    .unwrap_or_else(|| external.name.clone())
            })
            .collect()
    }

    fn external_names(&self) -> Vec<String> {
        self.externals().iter().map(|external| external.name.clone()).collect()
    }

    fn quoted_ids(&self) -> Vec<String> {
        self.externals().iter().map(|external| format!("'{}'", external.id)).collect()
    }
}

/// Leading `define` arguments: the module id and the dependency list.
fn define_params(module_id: Option<&str>, deps: &[String]) -> String {
    let mut params = String::new();
    if let Some(id) = module_id {
        params.push_str(&format!("'{id}', "));
    }
    if !deps.is_empty() {
        params.push_str(&format!("[{}], ", deps.join(", ")));
    }
    params
}

pub fn finalise(magic: MagicBundle, ctx: &FinaliseContext<'_>) -> Result<MagicBundle> {
    match ctx.options.format {
        Format::Es6 => es6::finalise(magic, ctx),
        Format::Cjs => cjs::finalise(magic, ctx),
        Format::Amd => amd::finalise(magic, ctx),
        Format::Iife => iife::finalise(magic, ctx),
        Format::Umd => umd::finalise(magic, ctx),
    }
}

/// Normalises the shape of default imports from externals, which may or
/// may not be transpiled ES modules.
pub fn interop_block(graph: &ModuleGraph) -> String {
    graph
        .externals
        .iter()
        .filter_map(interop_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The interop statement for one external, if its default is imported.
pub fn interop_line(external: &ExternalModule) -> Option<String> {
    if !external.declarations.contains_key("default") {
        return None;
    }
    let name = &external.name;
    Some(if external.exports_names {
        format!("var {name}__default = 'default' in {name} ? {name}['default'] : {name};")
    } else {
        format!("{name} = 'default' in {name} ? {name}['default'] : {name};")
    })
}

/// Statements exposing the entry's exports: `mechanism value;` in default
/// mode, one `exports.name = value;` per export in named mode.
pub fn export_block(graph: &ModuleGraph, mode: ExportMode, mechanism: &str) -> String {
    match mode {
        ExportMode::None => String::new(),
        ExportMode::Default => graph
            .entry_exports
            .get("default")
            .map(|&id| format!("{mechanism} {};", graph.render_name(id, false)))
            .unwrap_or_default(),
        ExportMode::Named => graph
            .entry_exports
            .iter()
            .filter_map(|(name, &id)| {
                let property = if name == "default" {
                    "['default']".to_string()
                } else {
                    format!(".{name}")
                };
                let lhs = format!("exports{property}");
                let rhs = graph.render_name(id, false);
                (lhs != rhs).then(|| format!("{lhs} = {rhs};"))
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::link;

    fn marked(sources: &[(&str, &str)]) -> ModuleGraph {
        let mut graph = link(sources).unwrap();
        graph.mark().unwrap();
        graph
    }

    #[test]
    fn test_parse_selectors() {
        assert_eq!("umd".parse::<Format>().unwrap(), Format::Umd);
        assert!(matches!("esm".parse::<Format>(), Err(Error::UnknownFormat(_))));
        assert_eq!("named".parse::<ExportModeOption>().unwrap(), ExportModeOption::Named);
        assert!(matches!(
            "everything".parse::<ExportModeOption>(),
            Err(Error::InvalidExportMode(_))
        ));
    }

    #[test]
    fn test_export_mode_detection() {
        let none = marked(&[("/main.js", "foo();")]);
        assert_eq!(get_export_mode(&none, ExportModeOption::Auto).unwrap(), ExportMode::None);

        let default = marked(&[("/main.js", "export default 1;")]);
        assert_eq!(get_export_mode(&default, ExportModeOption::Auto).unwrap(), ExportMode::Default);

        let named = marked(&[("/main.js", "export var a = 1;\nexport default 2;")]);
        assert_eq!(get_export_mode(&named, ExportModeOption::Auto).unwrap(), ExportMode::Named);
        let err = get_export_mode(&named, ExportModeOption::Default).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'default' was specified for options.exports, but entry module has following exports: a, default"
        );
        assert!(get_export_mode(&named, ExportModeOption::None).is_err());
    }

    #[test]
    fn test_wrappers_require_module_name() {
        let graph = marked(&[("/main.js", "export var a = 1;")]);
        let mut options = GenerateOptions::new(Format::Iife);
        let err = check_options(&graph, &options).unwrap_err();
        assert_eq!(err.to_string(), "You must supply options.moduleName for IIFE bundles");

        options.module_name = Some("lib".into());
        assert_eq!(check_options(&graph, &options).unwrap(), ExportMode::Named);

        let quiet = marked(&[("/main.js", "run();")]);
        assert!(check_options(&quiet, &GenerateOptions::new(Format::Umd)).is_ok());
        assert!(check_options(&graph, &GenerateOptions::new(Format::Cjs)).is_ok());
        assert!(matches!(
            check_options(&graph, &GenerateOptions::new(Format::Amd)),
            Err(Error::MissingModuleName("AMD"))
        ));
    }

    #[test]
    fn test_interop_and_export_blocks() {
        let graph = marked(&[(
            "/main.js",
            "import a from 'a';\nimport b, { helper } from 'b';\nexport var x = a(b, helper);\nexport default x;",
        )]);
        assert_eq!(
            interop_block(&graph),
            "a = 'default' in a ? a['default'] : a;\nvar b__default = 'default' in b ? b['default'] : b;"
        );
        assert_eq!(
            export_block(&graph, ExportMode::Named, "return"),
            "exports.x = x;\nexports['default'] = x;"
        );
    }
}
