//! Universal output: picks CommonJS, AMD or a browser global at load time

use super::{ExportMode, FinaliseContext, define_params, export_block, interop_block};
use crate::Result;
use crate::magic::MagicBundle;

pub fn finalise(mut magic: MagicBundle, ctx: &FinaliseContext<'_>) -> Result<MagicBundle> {
    let name = match ctx.mode {
        ExportMode::None => None,
        _ => Some(ctx.module_name("UMD")?),
    };

    let mut amd_deps = ctx.quoted_ids();
    let mut cjs_deps: Vec<String> = ctx
        .externals()
        .iter()
        .map(|external| format!("require('{}')", external.id))
        .collect();
    let mut global_deps: Vec<String> = ctx.global_names().iter().map(|g| format!("global.{g}")).collect();
    let mut args = ctx.external_names();

    if let (ExportMode::Named, Some(name)) = (ctx.mode, name) {
        amd_deps.insert(0, "'exports'".to_string());
        cjs_deps.insert(0, "exports".to_string());
        global_deps.insert(0, format!("(global.{name} = {{}})"));
        args.insert(0, "exports".to_string());
    }

    let amd_params = define_params(ctx.options.module_id.as_deref(), &amd_deps);
    let (cjs_export, default_export) = match (ctx.mode, name) {
        (ExportMode::Default, Some(name)) => ("module.exports = ".to_string(), format!("global.{name} = ")),
        _ => (String::new(), String::new()),
    };

    let i = ctx.guessed_indent;
    let intro = format!(
        "(function (global, factory) {{\n\
         {i}typeof exports === 'object' && typeof module !== 'undefined' ? {cjs_export}factory({cjs}) :\n\
         {i}typeof define === 'function' && define.amd ? define({amd_params}factory) :\n\
         {i}{default_export}factory({globals});\n\
         }}(this, function ({args}) {{{strict}\n\n",
        cjs = cjs_deps.join(", "),
        globals = global_deps.join(", "),
        args = args.join(", "),
        strict = ctx.use_strict(),
    );

    let interop = interop_block(ctx.graph);
    if !interop.is_empty() {
        magic.prepend(&format!("{interop}\n\n"));
    }
    let exports = export_block(ctx.graph, ctx.mode, "return");
    if !exports.is_empty() {
        magic.append(&format!("\n\n{exports}"));
    }

    magic.trim().indent(ctx.indent).append("\n\n}));").prepend(&intro);
    Ok(magic)
}
