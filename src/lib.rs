//! # Shakepack - a tree-shaking JavaScript module bundler
//!
//! Shakepack follows the import/export graph of an entry module, keeps only
//! the top-level statements that are reachable from the entry's exports or
//! that have observable side effects, orders the surviving modules so that
//! eagerly-evaluated dependencies come first, and emits one file in a
//! choice of wrapper formats together with a source map.
//!
//! Shakepack provides:
//! - `MagicString`/`MagicBundle`: mapping-preserving text editing
//! - Tree-sitter based parsing of top-level statements and lexical scopes
//! - Cross-module binding of references to declarations
//! - Statement-level liveness and cycle-tolerant module ordering
//! - `es6`, `cjs`, `amd`, `iife` and `umd` output with source maps

pub mod adapter;
pub mod bundle;
pub mod config;
pub mod finalise;
pub mod graph;
pub mod identifier;
pub mod linker;
pub mod loader;
pub mod magic;
pub mod module;
pub mod options;
pub mod output;
pub mod path;
pub mod scope;
pub mod sourcemap;
pub mod symbol;
pub mod ui;

use std::fmt;

// Re-exports for convenient access
pub use bundle::{Bundle, Output};
pub use finalise::{ExportMode, ExportModeOption, Format};
pub use magic::{MagicBundle, MagicString};
pub use options::{BundleOptions, GenerateOptions, SourceMapOption};
pub use sourcemap::SourceMap;

/// Result type alias for Shakepack operations
pub type Result<T> = std::result::Result<T, Error>;

/// 1-based line and 0-based column of an offset in module text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn from_offset(code: &str, offset: usize) -> Self {
        let offset = offset.min(code.len());
        let before = code.get(..offset).unwrap_or(code);
        let line_start = before.rfind('\n').map_or(0, |index| index + 1);
        Self {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Error types for Shakepack operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{message} in {id} ({location})")]
    Parse {
        id: String,
        message: String,
        offset: usize,
        location: SourceLocation,
    },

    #[error("Could not resolve '{importee}' from {importer}")]
    Resolve { importee: String, importer: String },

    /// Package lookup under `node_modules` failed.
    #[error("{0}")]
    Package(String),

    #[error("Could not resolve entry ({0})")]
    UnresolvedEntry(String),

    #[error("A module cannot import itself ({0})")]
    SelfImport(String),

    #[error("Duplicated import '{name}' ({id} {location})")]
    DuplicateImport {
        id: String,
        name: String,
        location: SourceLocation,
    },

    #[error("A module cannot have multiple exports with the same name ('{name}') ({id} {location})")]
    DuplicateExport {
        id: String,
        name: String,
        location: SourceLocation,
    },

    #[error("Illegal reassignment to import '{name}' ({id} {location})")]
    IllegalReassignment {
        id: String,
        name: String,
        location: SourceLocation,
    },

    #[error("Module {exporter} does not export {name} (imported by {importer})")]
    MissingExport {
        name: String,
        exporter: String,
        importer: String,
    },

    #[error("Export '{name}' is not defined by '{exporter}' (accessed in {importer} {location})")]
    MissingNamespaceMember {
        name: String,
        exporter: String,
        importer: String,
        location: SourceLocation,
    },

    #[error("You must supply options.moduleName for {0} bundles")]
    MissingModuleName(&'static str),

    #[error("'{mode}' was specified for options.exports, but entry module has following exports: {}", .exports.join(", "))]
    ExportModeMismatch {
        mode: &'static str,
        exports: Vec<String>,
    },

    #[error("options.exports must be 'default', 'named', 'none', 'auto', or left unspecified (defaults to 'auto'), got '{0}'")]
    InvalidExportMode(String),

    #[error("You must specify an output type - valid options are amd, cjs, es6, iife, umd (got '{0}')")]
    UnknownFormat(String),

    #[error("You must supply options.dest to bundle.write")]
    MissingDestination,

    #[error("Internal edit error: {0}")]
    Edit(#[from] magic::EditError),

    #[error("Sourcemap error: {0}")]
    SourceMap(String),

    #[error("Could not load {id}{}: {message}", imported_by(.importer))]
    Load {
        id: String,
        /// Module whose import led to `id`; `None` for the entry
        importer: Option<String>,
        message: String,
    },

    #[error("Transform failed for {id}: {message}")]
    Transform { id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse { .. } => "PARSE_ERROR",
            Error::Resolve { .. } | Error::Package(_) => "UNRESOLVED_IMPORT",
            Error::UnresolvedEntry(_) => "UNRESOLVED_ENTRY",
            Error::SelfImport(_) => "SELF_IMPORT",
            Error::DuplicateImport { .. } => "DUPLICATE_IMPORT",
            Error::DuplicateExport { .. } => "DUPLICATE_EXPORT",
            Error::IllegalReassignment { .. } => "ILLEGAL_REASSIGNMENT",
            Error::MissingExport { .. } | Error::MissingNamespaceMember { .. } => "MISSING_EXPORT",
            Error::MissingModuleName(_) => "MISSING_MODULE_NAME",
            Error::ExportModeMismatch { .. } => "EXPORT_MODE_MISMATCH",
            Error::InvalidExportMode(_) => "INVALID_EXPORT_MODE",
            Error::UnknownFormat(_) => "UNKNOWN_FORMAT",
            Error::MissingDestination => "MISSING_DESTINATION",
            Error::Edit(_) | Error::SourceMap(_) => "INTERNAL_ERROR",
            Error::Load { .. } => "LOAD_ERROR",
            Error::Transform { .. } => "TRANSFORM_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}

fn imported_by(importer: &Option<String>) -> String {
    importer
        .as_ref()
        .map(|importer| format!(" (imported by {importer})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_from_offset() {
        let code = "import a from './a';\nfoo(é, bar);\n";
        assert_eq!(SourceLocation::from_offset(code, 0), SourceLocation { line: 1, column: 0 });
        let bar = code.find("bar").unwrap();
        let location = SourceLocation::from_offset(code, bar);
        assert_eq!(location, SourceLocation { line: 2, column: 7 });
        assert_eq!(location.to_string(), "2:7");
    }

    #[test]
    fn test_error_codes() {
        let err = Error::MissingExport {
            name: "x".into(),
            exporter: "/m.js".into(),
            importer: "/main.js".into(),
        };
        assert_eq!(err.code(), "MISSING_EXPORT");
        assert_eq!(err.to_string(), "Module /m.js does not export x (imported by /main.js)");

        let err = Error::ExportModeMismatch {
            mode: "none",
            exports: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "'none' was specified for options.exports, but entry module has following exports: a, b"
        );
    }
}
