//! Splitting a module into independent top-level statements
//!
//! Multi-declarator declarations become one statement per declarator so
//! that unused declarators can be dropped on their own. Imports and exports
//! are classified here and recorded on the module.

use indexmap::IndexMap;
use tree_sitter::Node;

use super::statement::{DefaultForm, Statement, StatementKind};
use super::{ExportSpecifier, ImportSpecifier, Reexport};
use crate::adapter::node_text;
use crate::magic::MagicString;
use crate::scope::analyse::pattern_names;
use crate::{Error, Result, SourceLocation};

/// The classified top level of a module, with the syntax node each
/// statement is analysed from.
pub(crate) struct ModuleSyntax<'t> {
    pub statements: Vec<(Statement, Option<Node<'t>>)>,
    pub imports: IndexMap<String, ImportSpecifier>,
    pub exports: IndexMap<String, ExportSpecifier>,
    pub reexports: IndexMap<String, Reexport>,
    pub export_all_sources: Vec<String>,
    pub sources: Vec<String>,
}

pub(crate) struct Splitter<'a, 't> {
    id: &'a str,
    code: &'a str,
    magic: &'a mut MagicString,
    syntax: ModuleSyntax<'t>,
}

impl<'a, 't> Splitter<'a, 't> {
    pub fn new(id: &'a str, code: &'a str, magic: &'a mut MagicString) -> Self {
        Self {
            id,
            code,
            magic,
            syntax: ModuleSyntax {
                statements: Vec::new(),
                imports: IndexMap::new(),
                exports: IndexMap::new(),
                reexports: IndexMap::new(),
                export_all_sources: Vec::new(),
                sources: Vec::new(),
            },
        }
    }

    pub fn split(mut self, program: Node<'t>) -> Result<ModuleSyntax<'t>> {
        let mut previous_end: Option<Node<'t>> = None;
        let mut leading_comment: Option<usize> = None;

        let mut cursor = program.walk();
        let children: Vec<Node<'t>> = program.named_children(&mut cursor).collect();
        for node in children {
            match node.kind() {
                "hash_bang_line" => {
                    let end = self.code[node.end_byte()..]
                        .find('\n')
                        .map_or(self.code.len(), |i| node.end_byte() + i + 1);
                    self.magic.remove(node.start_byte(), end)?;
                    previous_end = Some(node);
                    continue;
                }
                "comment" => {
                    let on_later_row = previous_end
                        .is_none_or(|prev| node.start_position().row > prev.end_position().row);
                    if leading_comment.is_none() && on_later_row {
                        leading_comment = Some(node.start_byte());
                    }
                    continue;
                }
                "empty_statement" => continue,
                _ => {}
            }

            let start = leading_comment.take().unwrap_or(node.start_byte());
            self.statement(node, start)?;
            previous_end = Some(node);
        }

        let mut next = self.code.len();
        for (statement, _) in self.syntax.statements.iter_mut().rev() {
            statement.next = next;
            next = statement.start;
        }
        Ok(self.syntax)
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node_text(node, self.code)
    }

    fn location(&self, offset: usize) -> SourceLocation {
        SourceLocation::from_offset(self.code, offset)
    }

    fn push(&mut self, kind: StatementKind, node: Node<'t>, start: usize, analyse: Option<Node<'t>>) {
        let statement = Statement::new(kind, start, node.end_byte(), node.start_byte());
        self.syntax.statements.push((statement, analyse));
    }

    fn statement(&mut self, node: Node<'t>, start: usize) -> Result<()> {
        match node.kind() {
            "import_statement" => {
                self.import(node)?;
                self.push(StatementKind::Import, node, start, None);
            }
            "export_statement" => self.export(node, start)?,
            "lexical_declaration" | "variable_declaration" => {
                if declarators(node).len() > 1 {
                    self.split_declarators(node, node.start_byte(), None)?;
                } else {
                    self.push(StatementKind::Variable, node, start, Some(node));
                }
            }
            _ => self.push(StatementKind::Other, node, start, Some(node)),
        }
        Ok(())
    }

    /// One statement per declarator. The text from `remove_from` up to the
    /// first declarator (keyword, and `export` if any) is removed now.
    fn split_declarators(
        &mut self,
        declaration: Node<'t>,
        remove_from: usize,
        exported: Option<usize>,
    ) -> Result<()> {
        let keyword = declaration
            .child(0)
            .map(|k| self.text(k).to_string())
            .unwrap_or_else(|| "var".to_string());
        let declarators = declarators(declaration);
        if let Some(first) = declarators.first() {
            self.magic.remove(remove_from, first.start_byte())?;
        }

        let count = declarators.len();
        for (index, &declarator) in declarators.iter().enumerate() {
            let last = index + 1 == count;
            let separator_end = match declarators.get(index + 1) {
                Some(following) => following.start_byte(),
                None => declaration.end_byte(),
            };
            let name = declarator
                .child_by_field_name("name")
                .filter(|n| n.kind() == "identifier")
                .map(|n| self.text(n).to_string());
            if let Some(export_start) = exported {
                for name in self.declared_names(declarator) {
                    self.add_export(name.clone(), name, None, export_start)?;
                }
            }
            self.push(
                StatementKind::Declarator {
                    keyword: keyword.clone(),
                    name,
                    separator_end,
                    last,
                },
                declarator,
                declarator.start_byte(),
                Some(declarator),
            );
        }
        Ok(())
    }

    fn declared_names(&self, declarator: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(name) = declarator.child_by_field_name("name") {
            pattern_names(name, &mut names);
        }
        names.into_iter().map(|n| self.text(n).to_string()).collect()
    }

    fn add_source(&mut self, source: &str) {
        if !self.syntax.sources.iter().any(|s| s == source) {
            self.syntax.sources.push(source.to_string());
        }
    }

    fn import(&mut self, node: Node<'t>) -> Result<()> {
        let Some(source) = node.child_by_field_name("source").map(|s| unquote(self.text(s))) else {
            return Ok(());
        };
        self.add_source(&source);

        let mut specifiers: Vec<(String, String, usize)> = Vec::new();
        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            if clause.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = clause.walk();
            for part in clause.named_children(&mut clause_cursor) {
                match part.kind() {
                    "identifier" => {
                        specifiers.push((self.text(part).to_string(), "default".to_string(), part.start_byte()))
                    }
                    "namespace_import" => {
                        if let Some(local) = part.named_child(0) {
                            specifiers.push((self.text(local).to_string(), "*".to_string(), part.start_byte()));
                        }
                    }
                    "named_imports" => {
                        let mut named_cursor = part.walk();
                        for specifier in part.named_children(&mut named_cursor) {
                            if specifier.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(imported) = specifier.child_by_field_name("name") else {
                                continue;
                            };
                            let imported = unquote(self.text(imported));
                            let local = specifier
                                .child_by_field_name("alias")
                                .map(|alias| self.text(alias).to_string())
                                .unwrap_or_else(|| imported.clone());
                            specifiers.push((local, imported, specifier.start_byte()));
                        }
                    }
                    _ => {}
                }
            }
        }

        for (local, name, start) in specifiers {
            if self.syntax.imports.contains_key(&local) {
                return Err(Error::DuplicateImport {
                    id: self.id.to_string(),
                    name: local,
                    location: self.location(start),
                });
            }
            self.syntax.imports.insert(
                local,
                ImportSpecifier {
                    source: source.clone(),
                    name,
                    start,
                },
            );
        }
        Ok(())
    }

    fn add_export(
        &mut self,
        exported: String,
        local_name: String,
        identifier: Option<String>,
        start: usize,
    ) -> Result<()> {
        self.check_duplicate_export(&exported, start)?;
        self.syntax.exports.insert(
            exported,
            ExportSpecifier {
                local_name,
                identifier,
                start,
            },
        );
        Ok(())
    }

    fn add_reexport(&mut self, exported: String, source: &str, local_name: String, start: usize) -> Result<()> {
        self.check_duplicate_export(&exported, start)?;
        self.syntax.reexports.insert(
            exported,
            Reexport {
                source: source.to_string(),
                local_name,
                start,
            },
        );
        Ok(())
    }

    fn check_duplicate_export(&self, exported: &str, start: usize) -> Result<()> {
        if self.syntax.exports.contains_key(exported) || self.syntax.reexports.contains_key(exported) {
            return Err(Error::DuplicateExport {
                id: self.id.to_string(),
                name: exported.to_string(),
                location: self.location(start),
            });
        }
        Ok(())
    }

    fn export(&mut self, node: Node<'t>, start: usize) -> Result<()> {
        let node_start = node.start_byte();

        if let Some(source) = node.child_by_field_name("source").map(|s| unquote(self.text(s))) {
            self.add_source(&source);
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
            let mut is_export_all = true;
            for child in children {
                match child.kind() {
                    "namespace_export" => {
                        is_export_all = false;
                        if let Some(name) = child.named_child(0) {
                            self.add_reexport(unquote(self.text(name)), &source, "*".to_string(), child.start_byte())?;
                        }
                    }
                    "export_clause" => {
                        is_export_all = false;
                        for (local, exported, at) in self.export_specifiers(child) {
                            self.add_reexport(exported, &source, local, at)?;
                        }
                    }
                    _ => {}
                }
            }
            if is_export_all {
                self.syntax.export_all_sources.push(source);
            }
            self.push(StatementKind::Reexport, node, start, None);
            return Ok(());
        }

        let is_default = {
            let mut cursor = node.walk();
            node.children(&mut cursor).any(|child| child.kind() == "default")
        };
        let declaration = node.child_by_field_name("declaration");
        let value = node.child_by_field_name("value");

        if is_default {
            let Some(target) = declaration.or(value) else {
                return Ok(());
            };
            let name = target.child_by_field_name("name").map(|n| self.text(n).to_string());
            let (form, identifier) = match target.kind() {
                _ if declaration.is_some() => (DefaultForm::Declaration, name),
                "function_expression" | "function" | "generator_function" | "class" if name.is_some() => {
                    (DefaultForm::Declaration, name)
                }
                "function_expression" | "function" | "generator_function" => {
                    let mut cursor = target.walk();
                    let head_end = target
                        .children(&mut cursor)
                        .filter(|c| matches!(c.kind(), "function" | "*"))
                        .map(|c| c.end_byte())
                        .max()
                        .unwrap_or(target.start_byte());
                    (DefaultForm::AnonymousFunction { head_end }, None)
                }
                "identifier" => (DefaultForm::Expression, Some(self.text(target).to_string())),
                _ => (DefaultForm::Expression, None),
            };
            self.add_export("default".to_string(), "default".to_string(), identifier, node_start)?;
            self.push(
                StatementKind::ExportDefault {
                    declaration_start: target.start_byte(),
                    form,
                },
                node,
                start,
                Some(node),
            );
            return Ok(());
        }

        if let Some(declaration) = declaration {
            match declaration.kind() {
                "lexical_declaration" | "variable_declaration" => {
                    let declarators = declarators(declaration);
                    if declarators.len() > 1 {
                        return self.split_declarators(declaration, node_start, Some(node_start));
                    }
                    let first = declarators.first().copied();
                    if let Some(first) = first {
                        for name in self.declared_names(first) {
                            self.add_export(name.clone(), name, None, node_start)?;
                        }
                    }
                    let name = first
                        .and_then(|d| d.child_by_field_name("name"))
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| self.text(n).to_string());
                    self.push(
                        StatementKind::ExportDeclaration {
                            declaration_start: declaration.start_byte(),
                            declarator_start: first.map(|d| d.start_byte()),
                            name,
                        },
                        node,
                        start,
                        Some(node),
                    );
                }
                _ => {
                    let name = declaration.child_by_field_name("name").map(|n| self.text(n).to_string());
                    if let Some(name) = &name {
                        self.add_export(name.clone(), name.clone(), None, node_start)?;
                    }
                    self.push(
                        StatementKind::ExportDeclaration {
                            declaration_start: declaration.start_byte(),
                            declarator_start: None,
                            name,
                        },
                        node,
                        start,
                        Some(node),
                    );
                }
            }
            return Ok(());
        }

        let mut cursor = node.walk();
        let clauses: Vec<Node<'t>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "export_clause")
            .collect();
        for clause in clauses {
            for (local, exported, at) in self.export_specifiers(clause) {
                self.add_export(exported, local, None, at)?;
            }
        }
        self.push(StatementKind::ExportClause, node, start, Some(node));
        Ok(())
    }

    /// `(local, exported, start)` for each specifier of an export clause
    fn export_specifiers(&self, clause: Node<'_>) -> Vec<(String, String, usize)> {
        let mut out = Vec::new();
        let mut cursor = clause.walk();
        for specifier in clause.named_children(&mut cursor) {
            if specifier.kind() != "export_specifier" {
                continue;
            }
            let Some(name) = specifier.child_by_field_name("name") else {
                continue;
            };
            let local = unquote(self.text(name));
            let exported = specifier
                .child_by_field_name("alias")
                .map(|alias| unquote(self.text(alias)))
                .unwrap_or_else(|| local.clone());
            out.push((local, exported, specifier.start_byte()));
        }
        out
    }
}

fn declarators(declaration: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = declaration.walk();
    declaration
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "variable_declarator")
        .collect()
}

/// Contents of a string literal, or the text itself for identifiers.
fn unquote(text: &str) -> String {
    let trimmed = text
        .strip_prefix(['\'', '"'])
        .and_then(|t| t.strip_suffix(['\'', '"']));
    trimmed.unwrap_or(text).to_string()
}
