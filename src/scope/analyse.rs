//! Scope and reference analysis of one top-level statement
//!
//! Two passes over the statement's syntax tree:
//! 1. `declare` builds the nested scopes and records every binding, hoisting
//!    `var` and function declarations out of block scopes.
//! 2. `collect` gathers references, string literal ranges that must not be
//!    re-indented, and the facts needed to decide whether the statement has
//!    a side effect.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tree_sitter::Node;

use super::graph::{ScopeGraph, ScopeId, ScopeKind};
use crate::adapter::node_text;
use crate::module::ImportSpecifier;
use crate::symbol::{MemberPart, Reference};
use crate::{Error, Result, SourceLocation};

/// Facts about a statement's evaluation at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideEffects {
    /// A call or `new` outside any deferred function
    pub has_call: bool,
    /// Root name of every eager assignment or update target, `None` when
    /// the target is a pattern, `this` or anything else without a name.
    pub assignments: Vec<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct StatementAnalysis {
    pub scope: ScopeId,
    pub references: Vec<Reference>,
    pub string_literal_ranges: Vec<(usize, usize)>,
    pub side_effects: SideEffects,
}

pub struct Analyser<'a> {
    id: &'a str,
    code: &'a str,
    imports: &'a IndexMap<String, ImportSpecifier>,
    scopes: &'a mut ScopeGraph,
}

#[derive(Default)]
struct Collected {
    node_scopes: HashMap<usize, ScopeId>,
    reassigned: HashSet<usize>,
    references: Vec<Reference>,
    string_literal_ranges: Vec<(usize, usize)>,
    side_effects: SideEffects,
}

impl<'a> Analyser<'a> {
    pub fn new(
        id: &'a str,
        code: &'a str,
        imports: &'a IndexMap<String, ImportSpecifier>,
        scopes: &'a mut ScopeGraph,
    ) -> Self {
        Self {
            id,
            code,
            imports,
            scopes,
        }
    }

    pub fn analyse(&mut self, node: Node<'_>) -> Result<StatementAnalysis> {
        let root = self.scopes.add_scope(None, ScopeKind::Statement);
        let mut collected = Collected::default();
        self.declare(node, root, &mut collected.node_scopes);
        self.collect(node, root, false, &mut collected)?;

        Ok(StatementAnalysis {
            scope: root,
            references: collected.references,
            string_literal_ranges: collected.string_literal_ranges,
            side_effects: collected.side_effects,
        })
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        node_text(node, self.code)
    }

    fn declare(&mut self, node: Node<'_>, scope: ScopeId, node_scopes: &mut HashMap<usize, ScopeId>) {
        let mut scope = scope;
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let text = self.text(name);
                    self.scopes.add_declaration(scope, text, false);
                }
                scope = self.function_scope(node, scope, node_scopes);
            }
            "function_expression" | "function" | "generator_function" => {
                let name = node.child_by_field_name("name");
                if let (Some(name), true) = (name, is_default_export_declaration(node)) {
                    let text = self.text(name);
                    self.scopes.add_declaration(scope, text, false);
                    scope = self.function_scope(node, scope, node_scopes);
                } else {
                    scope = self.function_scope(node, scope, node_scopes);
                    if let Some(name) = name {
                        let text = self.text(name);
                        self.scopes.add_declaration(scope, text, false);
                    }
                }
            }
            "arrow_function" | "method_definition" => {
                scope = self.function_scope(node, scope, node_scopes);
            }
            "class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let text = self.text(name);
                    self.scopes.add_declaration(scope, text, true);
                }
            }
            "class" => {
                if let Some(name) = node.child_by_field_name("name") {
                    if is_default_export_declaration(node) {
                        let text = self.text(name);
                        self.scopes.add_declaration(scope, text, true);
                    } else {
                        scope = self.scopes.add_scope(Some(scope), ScopeKind::Block);
                        let text = self.text(name);
                        self.scopes.add_declaration(scope, text, true);
                        node_scopes.insert(node.id(), scope);
                    }
                }
            }
            "statement_block" if !node.parent().is_some_and(is_function_like) => {
                scope = self.scopes.add_scope(Some(scope), ScopeKind::Block);
                node_scopes.insert(node.id(), scope);
            }
            "catch_clause" => {
                scope = self.scopes.add_scope(Some(scope), ScopeKind::Block);
                node_scopes.insert(node.id(), scope);
                if let Some(parameter) = node.child_by_field_name("parameter") {
                    let mut names = Vec::new();
                    pattern_names(parameter, &mut names);
                    for name in names {
                        let text = self.text(name);
                        self.scopes.add_declaration(scope, text, true);
                    }
                }
            }
            "for_statement" | "for_in_statement" => {
                scope = self.scopes.add_scope(Some(scope), ScopeKind::Block);
                node_scopes.insert(node.id(), scope);
            }
            "variable_declarator" => {
                let block_scoped = node.parent().is_some_and(|p| p.kind() == "lexical_declaration");
                if let Some(name) = node.child_by_field_name("name") {
                    let mut names = Vec::new();
                    pattern_names(name, &mut names);
                    for name in names {
                        let text = self.text(name);
                        self.scopes.add_declaration(scope, text, block_scoped);
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.declare(child, scope, node_scopes);
        }
    }

    /// New function scope holding the parameters of `node`.
    fn function_scope(
        &mut self,
        node: Node<'_>,
        parent: ScopeId,
        node_scopes: &mut HashMap<usize, ScopeId>,
    ) -> ScopeId {
        let scope = self.scopes.add_scope(Some(parent), ScopeKind::Function);
        node_scopes.insert(node.id(), scope);

        let mut names = Vec::new();
        if let Some(parameters) = node.child_by_field_name("parameters") {
            pattern_names(parameters, &mut names);
        }
        if let Some(parameter) = node.child_by_field_name("parameter") {
            pattern_names(parameter, &mut names);
        }
        for name in names {
            let text = self.text(name);
            self.scopes.add_declaration(scope, text, false);
        }
        scope
    }

    fn collect(&mut self, node: Node<'_>, scope: ScopeId, deferred: bool, out: &mut Collected) -> Result<()> {
        let scope = out.node_scopes.get(&node.id()).copied().unwrap_or(scope);
        let deferred = deferred || defers(node);

        match node.kind() {
            "comment" => return Ok(()),
            "string" => {
                if self.text(node).contains('\n') {
                    out.string_literal_ranges
                        .push((node.start_byte() + 1, node.end_byte().saturating_sub(1)));
                }
                return Ok(());
            }
            "template_string" => {
                let mut chunk_start = node.start_byte() + 1;
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "template_substitution" {
                        if child.start_byte() > chunk_start {
                            out.string_literal_ranges.push((chunk_start, child.start_byte()));
                        }
                        chunk_start = child.end_byte();
                    }
                }
                let chunk_end = node.end_byte().saturating_sub(1);
                if chunk_end > chunk_start {
                    out.string_literal_ranges.push((chunk_start, chunk_end));
                }
            }
            "identifier" => {
                // a function declaration's own name belongs to the enclosing scope
                let scope = match node.parent() {
                    Some(parent)
                        if declares_name_outside(parent)
                            && parent.child_by_field_name("name").map(|n| n.id()) == Some(node.id()) =>
                    {
                        self.scopes.parent(scope).unwrap_or(scope)
                    }
                    _ => scope,
                };
                self.push_reference(node, scope, deferred, Vec::new(), false, out);
                return Ok(());
            }
            "shorthand_property_identifier" | "shorthand_property_identifier_pattern" => {
                self.push_reference(node, scope, deferred, Vec::new(), true, out);
                return Ok(());
            }
            "member_expression" => {
                if let Some((root, parts)) = member_chain(node, self.code) {
                    self.push_reference(root, scope, deferred, parts, false, out);
                    return Ok(());
                }
            }
            "export_specifier" => {
                if let Some(name) = node.child_by_field_name("name") {
                    if name.kind() == "identifier" {
                        self.push_reference(name, scope, deferred, Vec::new(), false, out);
                    }
                }
                return Ok(());
            }
            "assignment_expression" | "augmented_assignment_expression" => {
                self.assignment(node.child_by_field_name("left"), scope, deferred, out)?;
            }
            "update_expression" => {
                self.assignment(node.child_by_field_name("argument"), scope, deferred, out)?;
            }
            "call_expression" | "new_expression" if !deferred => {
                out.side_effects.has_call = true;
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.collect(child, scope, deferred, out)?;
        }
        Ok(())
    }

    fn push_reference(
        &self,
        node: Node<'_>,
        scope: ScopeId,
        deferred: bool,
        parts: Vec<MemberPart>,
        is_shorthand_property: bool,
        out: &mut Collected,
    ) {
        let mut reference = Reference::new(self.text(node), node.start_byte(), node.end_byte(), scope);
        reference.parts = parts;
        reference.is_immediately_used = !deferred;
        reference.is_reassignment = out.reassigned.contains(&node.id());
        reference.is_shorthand_property = is_shorthand_property;
        out.references.push(reference);
    }

    /// Record an assignment or update target before its subtree is visited.
    fn assignment(
        &mut self,
        target: Option<Node<'_>>,
        scope: ScopeId,
        deferred: bool,
        out: &mut Collected,
    ) -> Result<()> {
        let Some(target) = target.map(unwrap_parens) else {
            return Ok(());
        };

        let mut subject = target;
        let mut depth = 0;
        while matches!(subject.kind(), "member_expression" | "subscript_expression") {
            let Some(object) = subject.child_by_field_name("object") else {
                break;
            };
            subject = unwrap_parens(object);
            depth += 1;
        }

        let root = match subject.kind() {
            "identifier" => {
                let name = self.text(subject);
                self.check_import_assignment(name, depth, scope, subject.start_byte())?;
                if depth == 0 {
                    out.reassigned.insert(subject.id());
                }
                Some(name.to_string())
            }
            "object_pattern" | "array_pattern" => {
                let mut targets = Vec::new();
                pattern_names(subject, &mut targets);
                for name in targets {
                    self.check_import_assignment(self.text(name), 0, scope, name.start_byte())?;
                    out.reassigned.insert(name.id());
                }
                None
            }
            _ => None,
        };

        if !deferred {
            out.side_effects.assignments.push(root);
        }
        Ok(())
    }

    /// Imports are read-only: `foo = 1` and `ns.foo = 1` are rejected, while
    /// `foo.bar = 1` and `ns.foo.bar = 1` mutate the imported object.
    fn check_import_assignment(&self, name: &str, depth: usize, scope: ScopeId, offset: usize) -> Result<()> {
        if self.scopes.contains(scope, name) {
            return Ok(());
        }
        let Some(import) = self.imports.get(name) else {
            return Ok(());
        };
        let min_depth = if import.name == "*" { 2 } else { 1 };
        if depth < min_depth {
            return Err(Error::IllegalReassignment {
                id: self.id.to_string(),
                name: name.to_string(),
                location: SourceLocation::from_offset(self.code, offset),
            });
        }
        Ok(())
    }
}

fn is_function_like(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_declaration"
            | "generator_function_declaration"
            | "function_expression"
            | "function"
            | "generator_function"
            | "arrow_function"
            | "method_definition"
    )
}

/// `export default function foo () {}` parsed as an expression still
/// declares `foo` at the top level.
fn is_default_export_declaration(node: Node<'_>) -> bool {
    node.child_by_field_name("name").is_some()
        && node.parent().is_some_and(|parent| {
            parent.kind() == "export_statement"
                && parent.child_by_field_name("value").map(|v| v.id()) == Some(node.id())
        })
}

/// Nodes whose `name` is bound in the scope around the node's own scope.
fn declares_name_outside(node: Node<'_>) -> bool {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => true,
        "function_expression" | "function" | "generator_function" => is_default_export_declaration(node),
        _ => false,
    }
}

/// Whether code under `node` runs later rather than when the module loads.
fn defers(node: Node<'_>) -> bool {
    if is_function_like(node) {
        return !is_iife(node);
    }
    if node.kind() == "field_definition" {
        let mut cursor = node.walk();
        let is_static = node.children(&mut cursor).any(|child| child.kind() == "static");
        return !is_static;
    }
    false
}

fn is_iife(node: Node<'_>) -> bool {
    let mut current = node;
    let mut parent = node.parent();
    while let Some(p) = parent {
        if p.kind() != "parenthesized_expression" {
            break;
        }
        current = p;
        parent = p.parent();
    }
    parent.is_some_and(|p| {
        p.kind() == "call_expression" && p.child_by_field_name("function").map(|f| f.id()) == Some(current.id())
    })
}

fn unwrap_parens(mut node: Node<'_>) -> Node<'_> {
    while node.kind() == "parenthesized_expression" {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// `a.b.c` as the root identifier `a` plus the parts `b` and `c`. Chains
/// with computed or private accesses, or a non-identifier root, are `None`.
fn member_chain<'t>(node: Node<'t>, code: &str) -> Option<(Node<'t>, Vec<MemberPart>)> {
    let mut parts = Vec::new();
    let mut current = node;
    while current.kind() == "member_expression" {
        let property = current.child_by_field_name("property")?;
        if property.kind() != "property_identifier" {
            return None;
        }
        parts.push(MemberPart {
            name: node_text(property, code).to_string(),
            end: property.end_byte(),
        });
        current = current.child_by_field_name("object")?;
    }
    if current.kind() != "identifier" {
        return None;
    }
    parts.reverse();
    Some((current, parts))
}

/// Identifier nodes bound by a binding pattern or parameter list.
pub fn pattern_names<'t>(node: Node<'t>, names: &mut Vec<Node<'t>>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => names.push(node),
        "object_pattern" | "array_pattern" | "formal_parameters" => {
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
            for child in children {
                pattern_names(child, names);
            }
        }
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                pattern_names(value, names);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                pattern_names(left, names);
            }
        }
        "rest_pattern" => {
            if let Some(inner) = node.named_child(0) {
                pattern_names(inner, names);
            }
        }
        _ => {}
    }
}
