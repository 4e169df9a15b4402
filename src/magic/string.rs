//! Positional text mapper
//!
//! The original text is never modified. Every edit is applied to a working
//! copy while `mappings[i]` records where original byte `i` currently lives,
//! or `None` once it has been removed or overwritten. Offsets are byte
//! offsets into the original text; callers only ever edit at token
//! boundaries, so they always fall on `char` boundaries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::EditError;
use crate::path::{basename, relative_path};
use crate::sourcemap::{Segment, SourceMap, encode_mappings};

type EditResult<T> = std::result::Result<T, EditError>;

/// Options for [`MagicString::indent`].
#[derive(Debug, Clone)]
pub struct IndentOptions {
    /// Original ranges `[start, end)` whose inner lines must not be indented.
    pub exclude: Vec<(usize, usize)>,
    /// Whether the very first line is indented too.
    pub indent_start: bool,
}

impl Default for IndentOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            indent_start: true,
        }
    }
}

/// Options for [`MagicString::generate_map`] and
/// [`MagicBundle::generate_map`](super::MagicBundle::generate_map).
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    /// Path of the generated file; sources are made relative to it.
    pub file: Option<String>,
    /// Source path recorded for a single string.
    pub source: Option<String>,
    pub include_content: bool,
    /// Emit one segment per character instead of per run.
    pub hires: bool,
}

#[derive(Debug, Clone)]
pub struct MagicString {
    original: String,
    text: String,
    mappings: Vec<Option<usize>>,
    name_locations: BTreeMap<usize, String>,
    sourcemap_locations: BTreeSet<usize>,
    indent_exclusion_ranges: Vec<(usize, usize)>,
}

impl MagicString {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let mappings = (0..original.len()).map(Some).collect();
        Self {
            text: original.clone(),
            original,
            mappings,
            name_locations: BTreeMap::new(),
            sourcemap_locations: BTreeSet::new(),
            indent_exclusion_ranges: Vec::new(),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// The current working text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Flag an original offset so source maps always start a segment there.
    pub fn add_sourcemap_location(&mut self, offset: usize) {
        self.sourcemap_locations.insert(offset);
    }

    /// Protect an original range from [`indent`](Self::indent) when this
    /// string is later indented as part of a bundle.
    pub fn add_indent_exclusion_range(&mut self, start: usize, end: usize) {
        self.indent_exclusion_ranges.push((start, end));
    }

    pub fn indent_exclusion_ranges(&self) -> &[(usize, usize)] {
        &self.indent_exclusion_ranges
    }

    /// Names recorded by `overwrite(.., store_name = true)`, keyed by
    /// original offset.
    pub fn name_locations(&self) -> &BTreeMap<usize, String> {
        &self.name_locations
    }

    /// Current offset of original byte `offset`, if it is still live.
    pub fn locate(&self, offset: usize) -> Option<usize> {
        self.mappings.get(offset).copied().flatten()
    }

    pub fn append(&mut self, content: &str) -> &mut Self {
        self.text.push_str(content);
        self
    }

    pub fn prepend(&mut self, content: &str) -> &mut Self {
        self.text.insert_str(0, content);
        self.shift(0, content.len() as isize);
        self
    }

    /// Insert `content` before original byte `offset`. Inserting at the
    /// original length appends.
    pub fn insert(&mut self, offset: usize, content: &str) -> EditResult<&mut Self> {
        if offset == self.original.len() {
            return Ok(self.append(content));
        }
        if offset > self.original.len() {
            return Err(EditError::OutOfBounds(offset));
        }
        let location = self
            .locate(offset)
            .ok_or(EditError::InsertAtReplaced(offset))?;
        self.text.insert_str(location, content);
        self.shift(offset, content.len() as isize);
        Ok(self)
    }

    /// Replace original `[start, end)` with `content`.
    ///
    /// The replaced span becomes a single unmapped block. With `store_name`
    /// the replaced original text is recorded for the source map's `names`.
    pub fn overwrite(
        &mut self,
        start: usize,
        end: usize,
        content: &str,
        store_name: bool,
    ) -> EditResult<&mut Self> {
        if start >= end {
            return Err(EditError::InvalidRange { start, end });
        }
        if end > self.original.len() {
            return Err(EditError::OutOfBounds(end));
        }
        let (Some(first), Some(last)) = (self.locate(start), self.locate(end - 1)) else {
            return Err(EditError::OverwriteTwice { start, end });
        };
        if !self.text.is_char_boundary(first) || !self.text.is_char_boundary(last + 1) {
            return Err(EditError::InvalidRange { start, end });
        }

        if store_name {
            if let Some(name) = self.original.get(start..end) {
                self.name_locations.insert(start, name.to_string());
            }
        }

        self.text.replace_range(first..=last, content);
        for mapping in &mut self.mappings[start..end] {
            *mapping = None;
        }
        let delta = content.len() as isize - (last + 1 - first) as isize;
        self.shift(end, delta);
        Ok(self)
    }

    /// Delete every live byte whose origin falls in `[start, end)`.
    pub fn remove(&mut self, start: usize, end: usize) -> EditResult<&mut Self> {
        if start > end {
            return Err(EditError::InvalidRange { start, end });
        }
        if end > self.original.len() {
            return Err(EditError::OutOfBounds(end));
        }

        let mut run: Option<(usize, usize)> = None;
        for mapping in &mut self.mappings[start..end] {
            if let Some(location) = mapping.take() {
                run = Some(match run {
                    Some((first, _)) => (first, location + 1),
                    None => (location, location + 1),
                });
            }
        }

        if let Some((first, last)) = run {
            self.text.replace_range(first..last, "");
            self.shift(end, -((last - first) as isize));
        }
        Ok(self)
    }

    /// Working text between the live positions of `start` and `end - 1`.
    pub fn slice(&self, start: usize, end: usize) -> EditResult<&str> {
        if end <= start {
            return Ok("");
        }
        let first = self.locate(start).ok_or(EditError::SliceAnchor(start))?;
        let last = self.locate(end - 1).ok_or(EditError::SliceAnchor(end))? + 1;
        self.text
            .get(first..last)
            .ok_or(EditError::InvalidRange { start, end })
    }

    /// A copy holding only the original range `[start, end)`.
    pub fn snip(&self, start: usize, end: usize) -> EditResult<MagicString> {
        let mut clone = self.clone();
        clone.remove(0, start)?;
        clone.remove(end, self.original.len())?;
        Ok(clone)
    }

    /// Indentation guessed from the original text, `\t` when undecidable.
    pub fn indent_string(&self) -> String {
        guess_indent(&self.original).unwrap_or_else(|| "\t".to_string())
    }

    /// Prefix every non-empty line with `indent`.
    pub fn indent(&mut self, indent: &str, options: &IndentOptions) -> &mut Self {
        if indent.is_empty() {
            return self;
        }

        let excluded: Vec<(usize, usize)> = options
            .exclude
            .iter()
            .filter(|(start, end)| end > start)
            .filter_map(|&(start, end)| Some((self.locate(start)?, self.locate(end - 1)?)))
            .collect();

        let bytes = self.text.as_bytes();
        let mut inserts = Vec::new();
        for (index, &byte) in bytes.iter().enumerate() {
            if byte == b'\n' || byte == b'\r' {
                continue;
            }
            let line_start = index == 0 || matches!(bytes[index - 1], b'\n' | b'\r');
            if !line_start {
                continue;
            }
            if index == 0 {
                if options.indent_start {
                    inserts.push(index);
                }
                continue;
            }
            let previous = index - 1;
            if excluded.iter().any(|&(a, b)| a <= previous && previous <= b) {
                continue;
            }
            inserts.push(index);
        }

        if inserts.is_empty() {
            return self;
        }

        let mut text = String::with_capacity(self.text.len() + inserts.len() * indent.len());
        let mut last = 0;
        for &position in &inserts {
            text.push_str(&self.text[last..position]);
            text.push_str(indent);
            last = position;
        }
        text.push_str(&self.text[last..]);
        self.text = text;

        for location in self.mappings.iter_mut().flatten() {
            let count = inserts.partition_point(|&p| p <= *location);
            *location += count * indent.len();
        }
        self
    }

    pub fn trim(&mut self) -> &mut Self {
        self.trim_start_matches(char::is_whitespace)
            .trim_end_matches(char::is_whitespace)
    }

    /// Trim only line breaks from both ends.
    pub fn trim_lines(&mut self) -> &mut Self {
        let newline = |c: char| c == '\n' || c == '\r';
        self.trim_start_matches(newline).trim_end_matches(newline)
    }

    pub fn trim_start_matches(&mut self, pattern: impl Fn(char) -> bool) -> &mut Self {
        let trimmed = self.text.len() - self.text.trim_start_matches(|c| pattern(c)).len();
        if trimmed == 0 {
            return self;
        }
        self.text.drain(..trimmed);
        for mapping in &mut self.mappings {
            *mapping = match *mapping {
                Some(location) if location >= trimmed => Some(location - trimmed),
                _ => None,
            };
        }
        self
    }

    pub fn trim_end_matches(&mut self, pattern: impl Fn(char) -> bool) -> &mut Self {
        let length = self.text.trim_end_matches(|c| pattern(c)).len();
        if length == self.text.len() {
            return self;
        }
        self.text.truncate(length);
        for mapping in &mut self.mappings {
            if mapping.is_some_and(|location| location >= length) {
                *mapping = None;
            }
        }
        self
    }

    pub fn generate_map(&self, options: &MapOptions) -> SourceMap {
        let names = self.names();
        let lines = self.line_segments(options.hires, 0, &names);
        SourceMap {
            version: 3,
            file: options.file.as_deref().map(|f| basename(f).to_string()),
            sources: vec![options.source.as_deref().map(|source| {
                relative_path(options.file.as_deref().unwrap_or(""), source)
            })],
            sources_content: vec![options.include_content.then(|| self.original.clone())],
            names,
            mappings: encode_mappings(&lines),
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.name_locations.values() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Absolute segments for each line of the working text, with generated
    /// columns relative to the start of that line.
    pub(crate) fn line_segments(
        &self,
        hires: bool,
        source_index: u32,
        names: &[String],
    ) -> Vec<Vec<Segment>> {
        let line_starts = line_starts(&self.original);
        let mut inverse = vec![None; self.text.len()];
        for (origin, location) in self.mappings.iter().enumerate() {
            if let Some(location) = *location {
                inverse[location] = Some(origin);
            }
        }

        let mut lines = Vec::new();
        let mut current = Vec::new();
        let mut column = 0u32;
        // original offset just past the last mapped character
        let mut last_end: Option<usize> = None;

        for (index, ch) in self.text.char_indices() {
            let origin = inverse[index];
            let (location, name) = match (origin, last_end) {
                (None, Some(end)) => (Some(end), self.name_locations.get(&end)),
                (Some(origin), end)
                    if hires
                        || end.is_none_or(|end| origin != end)
                        || self.sourcemap_locations.contains(&origin) =>
                {
                    (Some(origin), None)
                }
                _ => (None, None),
            };

            if let Some(location) = location {
                let (line, line_column) = line_column(&self.original, &line_starts, location);
                current.push(Segment {
                    generated_column: column,
                    source_index,
                    source_line: line,
                    source_column: line_column,
                    name_index: name
                        .and_then(|name| names.iter().position(|n| n == name))
                        .map(|i| i as u32),
                });
            }

            if ch == '\n' {
                lines.push(std::mem::take(&mut current));
                column = 0;
                last_end = None;
            } else {
                column += ch.len_utf16() as u32;
                last_end = origin.map(|origin| origin + ch.len_utf8());
            }
        }
        lines.push(current);
        lines
    }

    fn shift(&mut self, from: usize, delta: isize) {
        for location in self.mappings[from..].iter_mut().flatten() {
            *location = location.saturating_add_signed(delta);
        }
    }
}

impl fmt::Display for MagicString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Guess the indentation unit used by `code`: a tab if tab-indented lines
/// are at least as common as space-indented ones, otherwise the smallest
/// run of two or more spaces.
pub fn guess_indent(code: &str) -> Option<String> {
    let tabbed = code.lines().filter(|line| line.starts_with('\t')).count();
    let spaced: Vec<usize> = code
        .lines()
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .filter(|&spaces| spaces >= 2)
        .collect();

    if tabbed == 0 && spaced.is_empty() {
        return None;
    }
    if tabbed >= spaced.len() {
        return Some("\t".to_string());
    }
    spaced.iter().min().map(|&min| " ".repeat(min))
}

fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Zero-based line and UTF-16 column of a byte offset.
fn line_column(text: &str, line_starts: &[usize], offset: usize) -> (u32, u32) {
    let line = line_starts.partition_point(|&start| start <= offset).saturating_sub(1);
    let start = line_starts[line];
    let column = match text.get(start..offset) {
        Some(prefix) => prefix.encode_utf16().count(),
        None => offset - start,
    };
    (line as u32, column as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::decode_mappings;

    #[test]
    fn test_untouched_ranges_survive_edits() {
        let mut s = MagicString::new("abcdefghijkl");
        s.overwrite(1, 3, "XX", false).unwrap();
        s.remove(5, 7).unwrap();
        s.insert(9, "__").unwrap();
        assert_eq!(s.to_string(), "aXXdehi__jkl");
        assert_eq!(s.slice(3, 5).unwrap(), "de");
        assert_eq!(s.slice(9, 12).unwrap(), "jkl");
        assert_eq!(s.slice(7, 9).unwrap(), "hi");
    }

    #[test]
    fn test_locate_after_edits() {
        let mut s = MagicString::new("var answer = 42;");
        s.overwrite(4, 10, "x", true).unwrap();
        assert_eq!(s.locate(4), None);
        assert_eq!(s.locate(13).map(|i| &s.as_str()[i..i + 2]), Some("42"));
        assert_eq!(s.name_locations().get(&4).map(String::as_str), Some("answer"));
    }

    #[test]
    fn test_overwrite_twice_fails() {
        let mut s = MagicString::new("abcdef");
        s.overwrite(1, 3, "x", false).unwrap();
        assert_eq!(
            s.overwrite(2, 4, "y", false).unwrap_err(),
            EditError::OverwriteTwice { start: 2, end: 4 }
        );
    }

    #[test]
    fn test_insert_into_replaced_fails() {
        let mut s = MagicString::new("abcdef");
        s.remove(1, 3).unwrap();
        assert_eq!(s.insert(2, "z").unwrap_err(), EditError::InsertAtReplaced(2));
        s.insert(6, "!").unwrap();
        assert_eq!(s.to_string(), "adef!");
    }

    #[test]
    fn test_slice_rejects_replaced_anchor() {
        let mut s = MagicString::new("abcdef");
        s.remove(0, 2).unwrap();
        assert!(matches!(s.slice(1, 4), Err(EditError::SliceAnchor(1))));
    }

    #[test]
    fn test_snip() {
        let s = MagicString::new("one two three");
        assert_eq!(s.snip(4, 7).unwrap().to_string(), "two");
    }

    #[test]
    fn test_indent_respects_exclusions() {
        let mut s = MagicString::new("a\nb = `x\ny`\nc\n");
        s.indent(
            "  ",
            &IndentOptions {
                exclude: vec![(5, 10)],
                indent_start: true,
            },
        );
        assert_eq!(s.to_string(), "  a\n  b = `x\ny`\n  c\n");
        assert_eq!(s.slice(2, 3).unwrap(), "b");
    }

    #[test]
    fn test_indent_without_start() {
        let mut s = MagicString::new("a\n\nb");
        s.indent(
            "\t",
            &IndentOptions {
                exclude: Vec::new(),
                indent_start: false,
            },
        );
        assert_eq!(s.to_string(), "a\n\n\tb");
    }

    #[test]
    fn test_trim_updates_mappings() {
        let mut s = MagicString::new("\n\n  abc  \n");
        s.trim();
        assert_eq!(s.to_string(), "abc");
        assert_eq!(s.locate(4), Some(0));
        assert_eq!(s.locate(1), None);
        assert_eq!(s.locate(7), None);
    }

    #[test]
    fn test_trim_lines_keeps_spaces() {
        let mut s = MagicString::new("\n  abc  \n");
        s.trim_lines();
        assert_eq!(s.to_string(), "  abc  ");
    }

    #[test]
    fn test_guess_indent() {
        assert_eq!(guess_indent("a\n\tb\n\tc"), Some("\t".to_string()));
        assert_eq!(guess_indent("a\n    b\n  c"), Some("  ".to_string()));
        assert_eq!(guess_indent("a\nb"), None);
    }

    #[test]
    fn test_map_traces_surviving_characters() {
        let mut s = MagicString::new("var a = 1;\nvar b = 2;\n");
        s.remove(0, 11).unwrap();
        s.prepend("// header\n");
        let map = s.generate_map(&MapOptions {
            file: Some("out.js".into()),
            source: Some("in.js".into()),
            include_content: true,
            hires: false,
        });
        assert_eq!(map.sources, vec![Some("in.js".to_string())]);
        let lines = decode_mappings(&map.mappings).unwrap();
        let segment = lines[1][0];
        assert_eq!(segment.generated_column, 0);
        assert_eq!((segment.source_line, segment.source_column), (1, 0));
    }

    #[test]
    fn test_map_columns_count_utf16_units() {
        let code = "var é = 'ü'; console.log(é);";
        let mut s = MagicString::new(code);
        s.remove(0, code.find("console").unwrap()).unwrap();
        s.prepend("/* ü */ ");
        let map = s.generate_map(&MapOptions::default());
        let lines = decode_mappings(&map.mappings).unwrap();
        let segment = lines[0][0];
        assert_eq!(segment.generated_column, 8);
        assert_eq!((segment.source_line, segment.source_column), (0, 13));
    }

    #[test]
    fn test_map_records_overwritten_names() {
        let mut s = MagicString::new("foo(bar);");
        s.overwrite(4, 7, "baz$1", true).unwrap();
        let map = s.generate_map(&MapOptions::default());
        assert_eq!(map.names, vec!["bar".to_string()]);
        let lines = decode_mappings(&map.mappings).unwrap();
        assert!(lines[0].iter().any(|s| s.generated_column == 4 && s.name_index == Some(0)));
    }
}
