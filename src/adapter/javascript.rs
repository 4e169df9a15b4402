//! JavaScript parsing via tree-sitter-javascript

use tree_sitter::{Node, Parser, Tree};

use crate::{Error, Result, SourceLocation};

/// A reusable JavaScript parser.
pub struct JavaScriptParser {
    parser: Parser,
}

impl JavaScriptParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| Error::Parse {
                id: String::new(),
                message: format!("Failed to set language: {}", e),
                offset: 0,
                location: SourceLocation { line: 1, column: 0 },
            })?;
        Ok(Self { parser })
    }

    /// Parse module text. Any error or missing node in the tree aborts with
    /// the position of the first one in source order.
    pub fn parse(&mut self, id: &str, code: &str) -> Result<Tree> {
        let tree = self.parser.parse(code, None).ok_or_else(|| Error::Parse {
            id: id.to_string(),
            message: "Failed to parse module".to_string(),
            offset: 0,
            location: SourceLocation { line: 1, column: 0 },
        })?;
        validate(id, code, tree)
    }
}

/// Accept a tree parsed from `code` unless it contains an error or missing
/// node; the first one in source order is reported.
pub fn validate(id: &str, code: &str, tree: Tree) -> Result<Tree> {
    let root = tree.root_node();
    if root.has_error() {
        if let Some(node) = first_error(root) {
            let offset = node.start_byte();
            let message = if node.is_missing() {
                format!("Expected '{}'", node.kind())
            } else {
                match code.get(offset..node.end_byte()).and_then(|t| t.chars().next()) {
                    Some(c) => format!("Unexpected token '{}'", c),
                    None => "Unexpected end of input".to_string(),
                }
            };
            return Err(Error::Parse {
                id: id.to_string(),
                message,
                offset,
                location: SourceLocation::from_offset(code, offset),
            });
        }
    }
    Ok(tree)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Source text of a node.
pub fn node_text<'a>(node: Node<'_>, code: &'a str) -> &'a str {
    code.get(node.start_byte()..node.end_byte()).unwrap_or("")
}
