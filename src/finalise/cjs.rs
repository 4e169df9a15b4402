//! CommonJS output: `require` calls in, `module.exports`/`exports` out

use super::{FinaliseContext, export_block, interop_line};
use crate::Result;
use crate::magic::MagicBundle;

pub fn finalise(mut magic: MagicBundle, ctx: &FinaliseContext<'_>) -> Result<MagicBundle> {
    let mut intro = if ctx.options.use_strict {
        "'use strict';\n\n".to_string()
    } else {
        String::new()
    };

    let import_block = ctx
        .externals()
        .iter()
        .map(|external| {
            let require = format!("var {} = require('{}');", external.name, external.id);
            match interop_line(external) {
                Some(interop) => format!("{require}\n{interop}"),
                None => require,
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    if !import_block.is_empty() {
        intro.push_str(&import_block);
        intro.push_str("\n\n");
    }
    magic.prepend(&intro);

    let exports = export_block(ctx.graph, ctx.mode, "module.exports =");
    if !exports.is_empty() {
        magic.append(&format!("\n\n{exports}"));
    }
    Ok(magic)
}
