//! AMD output: a `define` factory receiving the externals

use super::{ExportMode, FinaliseContext, define_params, export_block, interop_block};
use crate::Result;
use crate::magic::MagicBundle;

pub fn finalise(mut magic: MagicBundle, ctx: &FinaliseContext<'_>) -> Result<MagicBundle> {
    let mut deps = ctx.quoted_ids();
    let mut args = ctx.external_names();
    if ctx.mode == ExportMode::Named {
        deps.insert(0, "'exports'".to_string());
        args.insert(0, "exports".to_string());
    }

    let params = define_params(ctx.options.module_id.as_deref(), &deps);
    let intro = format!("define({params}function ({}) {{{}\n\n", args.join(", "), ctx.use_strict());

    let interop = interop_block(ctx.graph);
    if !interop.is_empty() {
        magic.prepend(&format!("{interop}\n\n"));
    }
    let exports = export_block(ctx.graph, ctx.mode, "return");
    if !exports.is_empty() {
        magic.append(&format!("\n\n{exports}"));
    }

    magic.indent(ctx.indent).append("\n\n});").prepend(&intro);
    Ok(magic)
}
