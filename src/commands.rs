use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, ValueEnum};
use indicatif::HumanDuration;
use owo_colors::OwoColorize;
use serde::Serialize;

use shakepack::bundle::{BuildStats, SOURCEMAP_COMMENT};
use shakepack::config::{ShakepackConfig, load_config, write_config};
use shakepack::options::IndentOption;
use shakepack::output::{OutputMode, emit_success};
use shakepack::ui::{self, Icons, Spinner, build_stats_table};
use shakepack::{Bundle, ExportModeOption, Format, GenerateOptions, SourceMapOption};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceMapArg {
    /// Write a sibling `.map` file
    File,
    /// Embed the map as a data URI
    Inline,
}

#[derive(Debug, Args)]
pub struct BundleArgs {
    /// Entry module (defaults to `input.entry` from the config)
    pub entry: Option<String>,

    /// Output format: es6, cjs, amd, iife, umd
    #[arg(short, long)]
    pub format: Option<Format>,

    /// Output file; the bundle is printed to stdout when omitted
    #[arg(short, long)]
    pub output: Option<String>,

    /// Global name for iife/umd exports
    #[arg(short, long)]
    pub name: Option<String>,

    /// Module id for amd/umd define
    #[arg(long)]
    pub id: Option<String>,

    /// Export mode: auto, default, named, none
    #[arg(long)]
    pub exports: Option<ExportModeOption>,

    /// Module ids or glob patterns to leave out of the bundle
    #[arg(short, long)]
    pub external: Vec<String>,

    /// Global variable for an external, as `id=Name`
    #[arg(short, long = "global", value_parser = parse_global)]
    pub globals: Vec<(String, String)>,

    /// Emit a source map
    #[arg(short = 'm', long, num_args = 0..=1, default_missing_value = "file")]
    pub sourcemap: Option<SourceMapArg>,

    /// Text placed before the wrapper
    #[arg(long)]
    pub banner: Option<String>,

    /// Text placed after the wrapper
    #[arg(long)]
    pub footer: Option<String>,

    /// Text placed inside the wrapper, before the code
    #[arg(long)]
    pub intro: Option<String>,

    /// Text placed inside the wrapper, after the code
    #[arg(long)]
    pub outro: Option<String>,

    /// Do not indent wrapped code
    #[arg(long)]
    pub no_indent: bool,

    /// Omit 'use strict'
    #[arg(long)]
    pub no_strict: bool,
}

fn parse_global(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((id, name)) if !id.is_empty() && !name.is_empty() => Ok((id.to_string(), name.to_string())),
        _ => Err(format!("expected id=Name, got '{value}'")),
    }
}

impl BundleArgs {
    /// Layer command-line flags over the configured output options.
    fn apply(&self, options: &mut GenerateOptions) {
        if let Some(format) = self.format {
            options.format = format;
        }
        if let Some(exports) = self.exports {
            options.exports = exports;
        }
        if self.output.is_some() {
            options.dest = self.output.clone();
        }
        if self.name.is_some() {
            options.module_name = self.name.clone();
        }
        if self.id.is_some() {
            options.module_id = self.id.clone();
        }
        for (id, name) in &self.globals {
            options.globals.insert(id.clone(), name.clone());
        }
        match self.sourcemap {
            Some(SourceMapArg::File) => options.sourcemap = SourceMapOption::File,
            Some(SourceMapArg::Inline) => options.sourcemap = SourceMapOption::Inline,
            None => {}
        }
        for (slot, value) in [
            (&mut options.banner, &self.banner),
            (&mut options.footer, &self.footer),
            (&mut options.intro, &self.intro),
            (&mut options.outro, &self.outro),
        ] {
            if value.is_some() {
                *slot = value.clone();
            }
        }
        if self.no_indent {
            options.indent = IndentOption::None;
        }
        if self.no_strict {
            options.use_strict = false;
        }
    }
}

#[derive(Debug, Serialize)]
struct BundleReport<'a> {
    entry: &'a str,
    format: Format,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest: Option<&'a str>,
    imports: Vec<String>,
    exports: Vec<String>,
    modules: Vec<&'a str>,
    stats: &'a BuildStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

pub async fn run_bundle(args: BundleArgs, config_path: Option<&Path>, output_mode: OutputMode) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?.unwrap_or_default();
    let entry = args
        .entry
        .clone()
        .or_else(|| config.input.entry.clone())
        .context("no entry module given (pass one or set input.entry in shakepack.toml)")?;

    let build_options = config.input.bundle_options(entry.as_str()).external(args.external.iter().cloned());
    let mut options = GenerateOptions::from(&config.output);
    args.apply(&mut options);
    if options.dest.is_none() && options.sourcemap == SourceMapOption::File {
        return Err(shakepack::Error::MissingDestination.into());
    }

    let spinner = output_mode
        .is_decorated()
        .then(|| Spinner::new(&format!("Bundling {entry}")));

    let built = Bundle::build(build_options).await;
    if let Some(spinner) = &spinner {
        spinner.set_message(&format!("Generating {}", options.format));
    }
    let result = match built {
        Ok(bundle) => emit(&bundle, &options).await.map(|code| (bundle, code)),
        Err(err) => Err(err),
    };
    if let Some(spinner) = &spinner {
        spinner.clear();
    }
    let (bundle, code) = result?;

    if output_mode.is_human() {
        if options.dest.is_none() {
            println!("{code}");
        }
        if output_mode.is_decorated() {
            print_summary(&bundle, &entry, &options, code.len(), start);
        }
        return Ok(());
    }

    let report = BundleReport {
        entry: &entry,
        format: options.format,
        dest: options.dest.as_deref(),
        imports: bundle.imports(),
        exports: bundle.exports(),
        modules: bundle.modules(),
        stats: bundle.stats(),
        code: options.dest.is_none().then_some(code),
    };
    emit_success(output_mode, "bundle", report)
}

/// Write to `dest` when set, otherwise return the code with any inline map
/// comment attached.
async fn emit(bundle: &Bundle, options: &GenerateOptions) -> shakepack::Result<String> {
    if options.dest.is_some() {
        return Ok(bundle.write(options).await?.code);
    }
    let output = bundle.generate(options)?;
    let mut code = output.code;
    if let Some(map) = output.map {
        code.push_str(&format!("\n{SOURCEMAP_COMMENT}{}", map.to_url()?));
    }
    Ok(code)
}

fn print_summary(bundle: &Bundle, entry: &str, options: &GenerateOptions, bytes: usize, start: Instant) {
    eprintln!();
    ui::header(&format!("{} {} ({})", "Bundled".bold(), entry, options.format));
    if let Some(dest) = &options.dest {
        ui::file_written(Icons::FILE, dest, Some(bytes));
        if options.sourcemap == SourceMapOption::File {
            ui::file_written(Icons::MAP, &format!("{dest}.map"), None);
        }
    }
    let imports = bundle.imports();
    if !imports.is_empty() {
        ui::info("External", &imports.join(", "));
    }
    let exports = bundle.exports();
    if !exports.is_empty() {
        ui::info("Exports", &exports.join(", "));
    }

    let stats = bundle.stats();
    let removed = stats.graph.statements.saturating_sub(stats.graph.included);
    if removed > 0 {
        ui::summary_row(Icons::TREE, &format!("{removed} unused statements removed"));
    }
    eprintln!("{}", build_stats_table(stats));
    ui::timing(&format!("Done in {}", HumanDuration(start.elapsed())));
}

pub fn run_init(path: &Path, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let config = ShakepackConfig::starter();
    write_config(path, &config, force)?;
    if output_mode.is_human() {
        ui::success(&format!("Created {}", path.display()));
        ui::summary_row("Next:", "shakepack bundle");
    } else {
        let data = serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global() {
        assert_eq!(parse_global("jquery=$"), Ok(("jquery".to_string(), "$".to_string())));
        assert!(parse_global("jquery").is_err());
        assert!(parse_global("=x").is_err());
    }
}
