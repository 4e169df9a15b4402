//! Modules of the bundle graph
//!
//! A `Module` owns its text, the `MagicString` that renders it, its
//! statements and scopes, and the import/export tables collected when it
//! was parsed. Cross-module links are `ModuleKey`s and `DeclId`s into arenas
//! owned by the link graph.

pub mod external;
mod parse;
pub mod statement;

use std::collections::HashMap;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

pub use external::ExternalModule;
pub use statement::{DefaultForm, Statement, StatementKind};

use crate::Result;
use crate::adapter::{JavaScriptParser, validate};
use crate::identifier::make_legal_identifier;
use crate::loader::TransformedSource;
use crate::magic::MagicString;
use crate::path::{basename, extname};
use crate::scope::{Analyser, ScopeGraph};
use crate::sourcemap::SourceMap;
use crate::symbol::{DeclId, Declaration, DeclarationKind, Declarations, ModuleKey, StatementRef};
use parse::Splitter;

static SOURCEMAPPING_URL_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!("//#\\s+source", "MappingURL=.+\\n?")).expect("valid sourcemap comment pattern")
});

/// `import { name as local } from 'source'`, keyed by the local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    pub source: String,
    /// Imported name: an export name, `default` or `*`
    pub name: String,
    pub start: usize,
}

/// A name exported from this module's own bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpecifier {
    pub local_name: String,
    /// For `export default <identifier>` and named default declarations,
    /// the identifier the default value is bound to.
    pub identifier: Option<String>,
    pub start: usize,
}

/// `export { local as name } from 'source'`, keyed by the exported name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reexport {
    pub source: String,
    /// Name in the source module, `*` for `export * as name`
    pub local_name: String,
    pub start: usize,
}

#[derive(Debug)]
pub struct Module {
    pub index: usize,
    pub id: String,
    /// Transformed text that was parsed
    pub code: String,
    /// Text as the loader returned it
    pub original_code: String,
    pub sourcemap_chain: Vec<Option<SourceMap>>,
    pub magic: MagicString,
    pub statements: Vec<Statement>,
    pub scopes: ScopeGraph,
    pub imports: IndexMap<String, ImportSpecifier>,
    pub exports: IndexMap<String, ExportSpecifier>,
    pub reexports: IndexMap<String, Reexport>,
    pub export_all_sources: Vec<String>,
    /// Import and re-export sources in order of first appearance
    pub sources: Vec<String>,
    pub resolved_ids: HashMap<String, ModuleKey>,
    pub export_all_modules: Vec<ModuleKey>,
    /// Top-level bindings plus `default`
    pub declarations: IndexMap<String, DeclId>,
    /// Created on the first namespace access
    pub namespace: Option<DeclId>,
}

impl Module {
    pub fn new(
        index: usize,
        id: impl Into<String>,
        source: TransformedSource,
        declarations: &mut Declarations,
        parser: &mut JavaScriptParser,
    ) -> Result<Self> {
        let id = id.into();
        let code = source.code;
        let tree = match source.ast {
            Some(tree) if tree.root_node().end_byte() <= code.len() => validate(&id, &code, tree)?,
            _ => parser.parse(&id, &code)?,
        };

        let mut magic = MagicString::new(code.as_str());
        for comment in SOURCEMAPPING_URL_COMMENT.find_iter(&code) {
            magic.remove(comment.start(), comment.end())?;
        }
        add_sourcemap_locations(tree.root_node(), &mut magic);

        let syntax = Splitter::new(&id, &code, &mut magic).split(tree.root_node())?;

        let mut scopes = ScopeGraph::new();
        let mut statements = Vec::with_capacity(syntax.statements.len());
        for (mut statement, node) in syntax.statements {
            if let Some(node) = node {
                let analysis = Analyser::new(&id, &code, &syntax.imports, &mut scopes).analyse(node)?;
                statement.scope = Some(analysis.scope);
                statement.references = analysis.references;
                statement.string_literal_ranges = analysis.string_literal_ranges;
                statement.side_effects = analysis.side_effects;
            }
            statements.push(statement);
        }

        let mut module_declarations = IndexMap::new();
        for (statement_index, statement) in statements.iter().enumerate() {
            let Some(scope) = statement.scope else {
                continue;
            };
            for name in scopes.names(scope) {
                if module_declarations.contains_key(name) {
                    continue;
                }
                let declaration = Declaration::new(
                    name,
                    DeclarationKind::Local,
                    Some(StatementRef {
                        module: index,
                        index: statement_index,
                    }),
                );
                module_declarations.insert(name.to_string(), declarations.push(declaration));
            }
        }

        if let Some(export) = syntax.exports.get("default") {
            let statement_index = statements
                .iter()
                .position(|s| matches!(s.kind, StatementKind::ExportDefault { .. }));
            let name = export
                .identifier
                .clone()
                .unwrap_or_else(|| module_basename(&id));
            let declaration = Declaration::new(
                name,
                DeclarationKind::SyntheticDefault { original: None },
                statement_index.map(|index_in_module| StatementRef {
                    module: index,
                    index: index_in_module,
                }),
            );
            module_declarations.insert("default".to_string(), declarations.push(declaration));
        }

        debug!(
            "Parsed {} ({} statements, {} imports, {} exports)",
            id,
            statements.len(),
            syntax.imports.len(),
            syntax.exports.len() + syntax.reexports.len()
        );

        Ok(Self {
            index,
            id,
            code,
            original_code: source.original_code,
            sourcemap_chain: source.sourcemap_chain,
            magic,
            statements,
            scopes,
            imports: syntax.imports,
            exports: syntax.exports,
            reexports: syntax.reexports,
            export_all_sources: syntax.export_all_sources,
            sources: syntax.sources,
            resolved_ids: HashMap::new(),
            export_all_modules: Vec::new(),
            declarations: module_declarations,
            namespace: None,
        })
    }

    /// File name without extension, as a legal identifier
    pub fn basename(&self) -> String {
        module_basename(&self.id)
    }

    pub fn statement_ref(&self, index: usize) -> StatementRef {
        StatementRef {
            module: self.index,
            index,
        }
    }
}

fn module_basename(id: &str) -> String {
    let base = basename(id);
    let base = base.strip_suffix(extname(id)).unwrap_or(base);
    make_legal_identifier(base)
}

/// Segments always start at node boundaries.
fn add_sourcemap_locations(root: tree_sitter::Node<'_>, magic: &mut MagicString) {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_named() {
            magic.add_sourcemap_location(node.start_byte());
            magic.add_sourcemap_location(node.end_byte());
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(id: &str, code: &str) -> Result<(Module, Declarations)> {
        let mut declarations = Declarations::new();
        let mut parser = JavaScriptParser::new().unwrap();
        let module = Module::new(
            0,
            id,
            TransformedSource::untransformed(code),
            &mut declarations,
            &mut parser,
        )?;
        Ok((module, declarations))
    }

    #[test]
    fn test_supplied_tree_is_used() {
        let code = "export var a = 1;";
        let mut parser = JavaScriptParser::new().unwrap();
        let source = TransformedSource {
            ast: Some(parser.parse("/a.js", code).unwrap()),
            ..TransformedSource::untransformed(code)
        };
        let mut declarations = Declarations::new();
        let module = Module::new(0, "/a.js", source, &mut declarations, &mut parser).unwrap();
        assert_eq!(module.exports.keys().collect::<Vec<_>>(), vec!["a"]);

        // a tree from longer text than the module's is parsed again
        let stale = TransformedSource {
            ast: Some(parser.parse("/a.js", "export var a = 1;\nexport var b = 2;").unwrap()),
            ..TransformedSource::untransformed(code)
        };
        let module = Module::new(0, "/a.js", stale, &mut declarations, &mut parser).unwrap();
        assert_eq!(module.exports.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_top_level_declarations() {
        let code = "import { x } from './x';\nvar a = 1, b = x;\nfunction f () { var inner; }\nclass C {}\n";
        let (module, declarations) = build("/src/main.js", code).unwrap();
        assert_eq!(module.declarations.keys().collect::<Vec<_>>(), vec!["a", "b", "f", "C"]);
        let b = &declarations[module.declarations["b"]];
        assert_eq!(b.statement, Some(StatementRef { module: 0, index: 2 }));
        assert_eq!(module.sources, vec!["./x"]);
    }

    #[test]
    fn test_default_export_names() {
        let (module, declarations) = build("/src/my-lib.js", "export default 42;").unwrap();
        let default = &declarations[module.declarations["default"]];
        assert_eq!(default.name, "myLib");
        assert!(matches!(default.kind, DeclarationKind::SyntheticDefault { original: None }));

        let (module, declarations) = build("/src/lib.js", "function foo () {}\nexport default foo;").unwrap();
        assert_eq!(declarations[module.declarations["default"]].name, "foo");
    }

    #[test]
    fn test_strips_hashbang_and_sourcemap_comments() {
        let code = "#!/usr/bin/env node\nfoo();\n//# sourceMappingURL=foo.js.map\n";
        let (module, _) = build("/src/cli.js", code).unwrap();
        assert_eq!(module.magic.as_str(), "foo();\n");
        assert_eq!(module.statements.len(), 1);
    }
}
