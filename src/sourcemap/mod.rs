//! Source map v3 objects and the `mappings` codec

pub mod collapse;
pub mod vlq;

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use collapse::collapse_sourcemaps;

/// One decoded mapping segment with absolute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub source_index: u32,
    pub source_line: u32,
    pub source_column: u32,
    pub name_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    #[serde(default = "default_version")]
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub sources: Vec<Option<String>>,
    #[serde(default)]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

fn default_version() -> u8 {
    3
}

impl SourceMap {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The map as an inline `data:` URI.
    pub fn to_url(&self) -> Result<String> {
        Ok(format!(
            "data:application/json;charset=utf-8;base64,{}",
            STANDARD.encode(self.to_json()?)
        ))
    }

    pub fn decoded(&self) -> Result<Vec<Vec<Segment>>> {
        decode_mappings(&self.mappings)
    }
}

impl fmt::Display for SourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Encode absolute segments, one vector per generated line.
///
/// The generated column delta restarts on every line; source, line, column
/// and name deltas carry over from the previous segment anywhere in the map.
pub fn encode_mappings(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for (index, segments) in lines.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        let mut generated = 0i64;
        for (position, segment) in segments.iter().enumerate() {
            if position > 0 {
                out.push(',');
            }
            vlq::encode_into(&mut out, segment.generated_column as i64 - generated);
            vlq::encode_into(&mut out, segment.source_index as i64 - source);
            vlq::encode_into(&mut out, segment.source_line as i64 - line);
            vlq::encode_into(&mut out, segment.source_column as i64 - column);
            generated = segment.generated_column as i64;
            source = segment.source_index as i64;
            line = segment.source_line as i64;
            column = segment.source_column as i64;
            if let Some(name_index) = segment.name_index {
                vlq::encode_into(&mut out, name_index as i64 - name);
                name = name_index as i64;
            }
        }
    }
    out
}

/// Decode a `mappings` string into absolute segments per generated line.
/// Segments without a source position carry nothing to trace and are dropped.
pub fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>> {
    let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);
    let mut lines = Vec::new();

    for encoded_line in mappings.split(';') {
        let mut generated = 0i64;
        let mut segments = Vec::new();
        for encoded in encoded_line.split(',').filter(|s| !s.is_empty()) {
            let values = vlq::decode(encoded)?;
            let Some(&column_delta) = values.first() else {
                continue;
            };
            generated += column_delta;
            if values.len() < 4 {
                continue;
            }
            source += values[1];
            line += values[2];
            column += values[3];
            let name_index = match values.get(4) {
                Some(delta) => {
                    name += delta;
                    Some(name as u32)
                }
                None => None,
            };
            segments.push(Segment {
                generated_column: generated as u32,
                source_index: source as u32,
                source_line: line as u32,
                source_column: column as u32,
                name_index,
            });
        }
        lines.push(segments);
    }
    Ok(lines)
}
