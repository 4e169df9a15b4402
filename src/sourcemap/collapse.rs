//! Collapse a bundle map through each module's transform chain so it points
//! at the text the loader produced rather than the transformed text.

use super::{Segment, SourceMap, decode_mappings, encode_mappings};
use crate::{Error, Result};

/// One source of the bundle map: the maps produced by its transforms, in
/// application order, and the pre-transform text.
#[derive(Debug, Clone)]
pub struct SourceChain<'a> {
    pub maps: &'a [Option<SourceMap>],
    pub original_code: &'a str,
}

pub fn collapse_sourcemaps(map: &SourceMap, chains: &[SourceChain<'_>]) -> Result<SourceMap> {
    let decoded_chains = chains
        .iter()
        .map(|chain| {
            chain
                .maps
                .iter()
                .map(|map| match map {
                    Some(map) => decode_mappings(&map.mappings),
                    None => Err(Error::SourceMap(
                        "Cannot generate a sourcemap if non-sourcemap-generating transformers are used"
                            .to_string(),
                    )),
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let lines = decode_mappings(&map.mappings)?
        .into_iter()
        .map(|segments| {
            let mut traced = Vec::new();
            for segment in segments {
                let Some(chain) = decoded_chains.get(segment.source_index as usize) else {
                    return Err(Error::SourceMap(format!(
                        "Segment references unknown source {}",
                        segment.source_index
                    )));
                };
                let mut location = Some((segment.source_line, segment.source_column));
                for transform in chain.iter().rev() {
                    let Some((line, column)) = location else { break };
                    location = trace_segment(transform, line, column)?;
                }
                if let Some((source_line, source_column)) = location {
                    traced.push(Segment {
                        source_line,
                        source_column,
                        name_index: None,
                        ..segment
                    });
                }
            }
            Ok(traced)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SourceMap {
        sources_content: chains
            .iter()
            .map(|chain| Some(chain.original_code.to_string()))
            .collect(),
        names: Vec::new(),
        mappings: encode_mappings(&lines),
        ..map.clone()
    })
}

fn trace_segment(lines: &[Vec<Segment>], line: u32, column: u32) -> Result<Option<(u32, u32)>> {
    let Some(segments) = lines.get(line as usize) else {
        return Ok(None);
    };
    for segment in segments {
        if segment.generated_column > column {
            return Ok(None);
        }
        if segment.generated_column == column {
            if segment.source_index != 0 {
                return Err(Error::SourceMap("Bad sourcemap".to_string()));
            }
            return Ok(Some((segment.source_line, segment.source_column)));
        }
    }
    Ok(None)
}
