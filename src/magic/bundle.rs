//! Multi-file composer
//!
//! Concatenates `MagicString`s with separators, an intro and an outro, and
//! merges their mappings into one source map with a stable index per
//! distinct source file.

use std::fmt;

use super::{EditError, IndentOptions, MagicString, MapOptions};
use crate::path::{basename, relative_path};
use crate::sourcemap::{Segment, SourceMap, encode_mappings};

#[derive(Debug, Clone)]
struct BundleSource {
    content: MagicString,
    filename: Option<String>,
    /// Overrides the bundle separator placed before this source.
    separator: Option<String>,
}

#[derive(Debug, Clone)]
struct UniqueSource {
    filename: String,
    content: String,
}

#[derive(Debug, Clone, Default)]
pub struct MagicBundle {
    intro: String,
    outro: String,
    separator: String,
    sources: Vec<BundleSource>,
    unique_sources: Vec<UniqueSource>,
}

impl MagicBundle {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            ..Self::default()
        }
    }

    /// Add a source. Two sources may share a filename only if their
    /// original text is identical.
    pub fn add_source(
        &mut self,
        content: MagicString,
        filename: Option<String>,
    ) -> Result<&mut Self, EditError> {
        if let Some(filename) = &filename {
            match self.unique_sources.iter().find(|u| &u.filename == filename) {
                Some(existing) if existing.content != content.original() => {
                    return Err(EditError::ConflictingSource(filename.clone()));
                }
                Some(_) => {}
                None => self.unique_sources.push(UniqueSource {
                    filename: filename.clone(),
                    content: content.original().to_string(),
                }),
            }
        }
        self.sources.push(BundleSource {
            content,
            filename,
            separator: None,
        });
        Ok(self)
    }

    /// Append unmapped text directly after the last source.
    pub fn append(&mut self, content: &str) -> &mut Self {
        self.sources.push(BundleSource {
            content: MagicString::new(content),
            filename: None,
            separator: Some(String::new()),
        });
        self
    }

    pub fn prepend(&mut self, content: &str) -> &mut Self {
        self.intro.insert_str(0, content);
        self
    }

    /// Filenames of the distinct sources, in source-index order.
    pub fn source_filenames(&self) -> impl Iterator<Item = &str> {
        self.unique_sources.iter().map(|u| u.filename.as_str())
    }

    /// The most common indentation among the sources, `\t` if none is known.
    pub fn indent_string(&self) -> String {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for source in &self.sources {
            let Some(indent) = super::guess_indent(source.content.original()) else {
                continue;
            };
            match counts.iter_mut().find(|(i, _)| *i == indent) {
                Some((_, count)) => *count += 1,
                None => counts.push((indent, 1)),
            }
        }
        let mut best: Option<(String, usize)> = None;
        for (indent, count) in counts {
            if best.as_ref().is_none_or(|(_, best_count)| count > *best_count) {
                best = Some((indent, count));
            }
        }
        best.map(|(indent, _)| indent)
            .unwrap_or_else(|| "\t".to_string())
    }

    pub fn indent(&mut self, indent: &str) -> &mut Self {
        if indent.is_empty() {
            return self;
        }

        let mut trailing_newline = self.intro.is_empty() || self.intro.ends_with('\n');
        for (index, source) in self.sources.iter_mut().enumerate() {
            let separator = source.separator.as_deref().unwrap_or(&self.separator);
            let indent_start = trailing_newline || (index > 0 && separator.ends_with('\n'));
            let options = IndentOptions {
                exclude: source.content.indent_exclusion_ranges().to_vec(),
                indent_start,
            };
            source.content.indent(indent, &options);
            trailing_newline = source.content.as_str().ends_with('\n');
        }

        if !self.intro.is_empty() {
            self.intro = format!("{indent}{}", indent_following_lines(&self.intro, indent));
        }
        self.outro = format!(
            "{}{}",
            if self.outro.starts_with('\n') || self.outro.is_empty() {
                ""
            } else {
                indent
            },
            indent_following_lines(&self.outro, indent)
        );
        self
    }

    pub fn trim(&mut self) -> &mut Self {
        self.trim_start().trim_end()
    }

    pub fn trim_start(&mut self) -> &mut Self {
        self.intro = self.intro.trim_start().to_string();
        if !self.intro.is_empty() {
            return self;
        }
        for source in &mut self.sources {
            source.content.trim_start_matches(char::is_whitespace);
            if !source.content.is_empty() {
                return self;
            }
        }
        self.outro = self.outro.trim_start().to_string();
        self
    }

    pub fn trim_end(&mut self) -> &mut Self {
        self.outro = self.outro.trim_end().to_string();
        if !self.outro.is_empty() {
            return self;
        }
        for source in self.sources.iter_mut().rev() {
            source.content.trim_end_matches(char::is_whitespace);
            if !source.content.is_empty() {
                return self;
            }
        }
        self.intro = self.intro.trim_end().to_string();
        self
    }

    pub fn generate_map(&self, options: &MapOptions) -> SourceMap {
        let mut names: Vec<String> = Vec::new();
        for source in &self.sources {
            for name in source.content.names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let line_count = self.to_string().matches('\n').count() + 1;
        let mut lines: Vec<Vec<Segment>> = vec![Vec::new(); line_count];
        let mut cursor = Cursor::default();
        cursor.advance(&self.intro);

        for (index, source) in self.sources.iter().enumerate() {
            if index > 0 {
                cursor.advance(source.separator.as_deref().unwrap_or(&self.separator));
            }
            let source_index = source.filename.as_ref().and_then(|filename| {
                self.unique_sources
                    .iter()
                    .position(|u| &u.filename == filename)
            });
            if let Some(source_index) = source_index {
                let segments =
                    source
                        .content
                        .line_segments(options.hires, source_index as u32, &names);
                for (offset, line_segments) in segments.into_iter().enumerate() {
                    let column_offset = if offset == 0 { cursor.column } else { 0 };
                    if let Some(line) = lines.get_mut(cursor.line + offset) {
                        line.extend(line_segments.into_iter().map(|segment| Segment {
                            generated_column: segment.generated_column + column_offset,
                            ..segment
                        }));
                    }
                }
            }
            cursor.advance(source.content.as_str());
        }

        SourceMap {
            version: 3,
            file: options.file.as_deref().map(|f| basename(f).to_string()),
            sources: self
                .unique_sources
                .iter()
                .map(|u| {
                    Some(match &options.file {
                        Some(file) => relative_path(file, &u.filename),
                        None => u.filename.clone(),
                    })
                })
                .collect(),
            sources_content: self
                .unique_sources
                .iter()
                .map(|u| options.include_content.then(|| u.content.clone()))
                .collect(),
            names,
            mappings: encode_mappings(&lines),
        }
    }
}

impl fmt::Display for MagicBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.intro)?;
        for (index, source) in self.sources.iter().enumerate() {
            if index > 0 {
                f.write_str(source.separator.as_deref().unwrap_or(&self.separator))?;
            }
            f.write_str(source.content.as_str())?;
        }
        f.write_str(&self.outro)
    }
}

/// Generated line/column reached after emitting some text. Columns count
/// UTF-16 code units.
#[derive(Debug, Default)]
struct Cursor {
    line: usize,
    column: u32,
}

impl Cursor {
    fn advance(&mut self, text: &str) {
        match text.rfind('\n') {
            Some(last) => {
                self.line += text.matches('\n').count();
                self.column = text[last + 1..].encode_utf16().count() as u32;
            }
            None => self.column += text.encode_utf16().count() as u32,
        }
    }
}

/// Indent every non-empty line that follows a newline.
fn indent_following_lines(text: &str, indent: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if previous == Some('\n') && c != '\n' {
            out.push_str(indent);
        }
        out.push(c);
        previous = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::decode_mappings;

    #[test]
    fn test_join_with_separator_and_intro() {
        let mut bundle = MagicBundle::new("\n\n");
        bundle
            .add_source(MagicString::new("var a = 1;"), Some("a.js".into()))
            .unwrap()
            .add_source(MagicString::new("var b = 2;"), Some("b.js".into()))
            .unwrap();
        bundle.prepend("'use strict';\n\n").append("\nexport { a };");
        assert_eq!(
            bundle.to_string(),
            "'use strict';\n\nvar a = 1;\n\nvar b = 2;\nexport { a };"
        );
    }

    #[test]
    fn test_conflicting_source_rejected() {
        let mut bundle = MagicBundle::new("\n");
        bundle
            .add_source(MagicString::new("a"), Some("x.js".into()))
            .unwrap();
        bundle
            .add_source(MagicString::new("a"), Some("x.js".into()))
            .unwrap();
        let err = bundle
            .add_source(MagicString::new("b"), Some("x.js".into()))
            .unwrap_err();
        assert_eq!(err, EditError::ConflictingSource("x.js".into()));
        assert_eq!(bundle.source_filenames().count(), 1);
    }

    #[test]
    fn test_map_offsets_follow_intro_and_separators() {
        let mut bundle = MagicBundle::new("\n\n");
        bundle
            .add_source(MagicString::new("one();"), Some("a.js".into()))
            .unwrap()
            .add_source(MagicString::new("two();\nthree();"), Some("b.js".into()))
            .unwrap();
        bundle.prepend("(function () {\n");
        bundle.indent("\t");
        let code = bundle.to_string();
        assert_eq!(code, "\t(function () {\n\tone();\n\n\ttwo();\n\tthree();");

        let map = bundle.generate_map(&MapOptions {
            file: Some("out/bundle.js".into()),
            include_content: true,
            ..MapOptions::default()
        });
        assert_eq!(
            map.sources,
            vec![Some("../a.js".to_string()), Some("../b.js".to_string())]
        );
        let lines = decode_mappings(&map.mappings).unwrap();
        assert_eq!(lines.len(), 5);
        let three = lines[4][0];
        assert_eq!(three.generated_column, 1);
        assert_eq!((three.source_index, three.source_line, three.source_column), (1, 1, 0));
        let one = lines[1][0];
        assert_eq!((one.generated_column, one.source_index), (1, 0));
    }

    #[test]
    fn test_trim_walks_into_sources() {
        let mut bundle = MagicBundle::new("\n");
        bundle
            .add_source(MagicString::new("   "), Some("a.js".into()))
            .unwrap()
            .add_source(MagicString::new("  b  "), Some("b.js".into()))
            .unwrap();
        bundle.trim();
        assert_eq!(bundle.to_string(), "\nb");
    }

    #[test]
    fn test_indent_string_prefers_most_common() {
        let mut bundle = MagicBundle::new("\n");
        for (name, code) in [("a", "a\n  b"), ("b", "c\n  d"), ("c", "e\n\tf")] {
            bundle
                .add_source(MagicString::new(code), Some(name.into()))
                .unwrap();
        }
        assert_eq!(bundle.indent_string(), "  ");
    }
}
