//! Browser-global output: a self-invoking closure over the externals'
//! globals

use super::{ExportMode, FinaliseContext, export_block, interop_block};
use crate::Result;
use crate::magic::MagicBundle;

pub fn finalise(mut magic: MagicBundle, ctx: &FinaliseContext<'_>) -> Result<MagicBundle> {
    let mut deps = ctx.global_names();
    let mut args = ctx.external_names();
    let name = match ctx.mode {
        ExportMode::None => None,
        _ => Some(ctx.module_name("IIFE")?),
    };

    if let (ExportMode::Named, Some(name)) = (ctx.mode, name) {
        deps.insert(0, format!("(this.{name} = {{}})"));
        args.insert(0, "exports".to_string());
    }

    let mut intro = format!("(function ({}) {{{}\n\n", args.join(", "), ctx.use_strict());
    let outro = format!("\n\n}})({});", deps.join(", "));
    if let (ExportMode::Default, Some(name)) = (ctx.mode, name) {
        intro.insert_str(0, &format!("var {name} = "));
    }

    let interop = interop_block(ctx.graph);
    if !interop.is_empty() {
        magic.prepend(&format!("{interop}\n\n"));
    }
    let exports = export_block(ctx.graph, ctx.mode, "return");
    if !exports.is_empty() {
        magic.append(&format!("\n\n{exports}"));
    }

    magic.indent(ctx.indent).prepend(&intro).append(&outro);
    Ok(magic)
}
