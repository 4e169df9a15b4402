//! `shakepack.toml` loading and writing

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::finalise::{ExportModeOption, Format};
use crate::options::{BundleOptions, GenerateOptions, IndentOption, SourceMapOption};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ShakepackConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub entry: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,
    pub main_fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Option<Format>,
    pub dest: Option<String>,
    pub exports: Option<ExportModeOption>,
    pub module_name: Option<String>,
    pub module_id: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub globals: IndexMap<String, String>,
    pub banner: Option<String>,
    pub footer: Option<String>,
    pub intro: Option<String>,
    pub outro: Option<String>,
    pub indent: Option<IndentSetting>,
    pub use_strict: Option<bool>,
    pub sourcemap: Option<SourceMapSetting>,
    pub sourcemap_file: Option<String>,
}

/// `indent = true | false | "  "`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IndentSetting {
    Flag(bool),
    Literal(String),
}

/// `sourcemap = true | false | "inline"`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SourceMapSetting {
    Flag(bool),
    Mode(InlineMap),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum InlineMap {
    #[serde(rename = "inline")]
    Inline,
}

impl From<&IndentSetting> for IndentOption {
    fn from(setting: &IndentSetting) -> Self {
        match setting {
            IndentSetting::Flag(true) => IndentOption::Auto,
            IndentSetting::Flag(false) => IndentOption::None,
            IndentSetting::Literal(indent) => IndentOption::Literal(indent.clone()),
        }
    }
}

impl From<SourceMapSetting> for SourceMapOption {
    fn from(setting: SourceMapSetting) -> Self {
        match setting {
            SourceMapSetting::Flag(false) => SourceMapOption::None,
            SourceMapSetting::Flag(true) => SourceMapOption::File,
            SourceMapSetting::Mode(InlineMap::Inline) => SourceMapOption::Inline,
        }
    }
}

impl ShakepackConfig {
    /// The config written by `shakepack init`
    pub fn starter() -> Self {
        Self {
            input: InputConfig {
                entry: Some("src/main.js".to_string()),
                ..InputConfig::default()
            },
            output: OutputConfig {
                format: Some(Format::Es6),
                dest: Some("dist/bundle.js".to_string()),
                sourcemap: Some(SourceMapSetting::Flag(true)),
                ..OutputConfig::default()
            },
        }
    }
}

impl InputConfig {
    /// Build options for `entry`, with externals and main fields from the
    /// config.
    pub fn bundle_options(&self, entry: impl Into<String>) -> BundleOptions {
        let mut options = BundleOptions::new(entry).external(self.external.iter().cloned());
        if let Some(fields) = &self.main_fields {
            options.main_fields = fields.clone();
        }
        options
    }
}

impl From<&OutputConfig> for GenerateOptions {
    fn from(config: &OutputConfig) -> Self {
        let defaults = GenerateOptions::default();
        Self {
            format: config.format.unwrap_or(defaults.format),
            exports: config.exports.unwrap_or(defaults.exports),
            module_name: config.module_name.clone(),
            module_id: config.module_id.clone(),
            globals: config.globals.clone(),
            banner: config.banner.clone(),
            footer: config.footer.clone(),
            intro: config.intro.clone(),
            outro: config.outro.clone(),
            indent: config.indent.as_ref().map(IndentOption::from).unwrap_or(defaults.indent),
            use_strict: config.use_strict.unwrap_or(defaults.use_strict),
            sourcemap: config.sourcemap.map(SourceMapOption::from).unwrap_or(defaults.sourcemap),
            sourcemap_file: config.sourcemap_file.clone(),
            dest: config.dest.clone(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("shakepack.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ShakepackConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ShakepackConfig = toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("invalid config {}: {}", path.display(), err))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ShakepackConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("shakepack.toml"))).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shakepack.toml");
        std::fs::write(
            &path,
            r#"
[input]
entry = "src/index.js"
external = ["react", "lodash/*"]

[output]
format = "umd"
dest = "dist/lib.js"
module_name = "lib"
indent = "  "
use_strict = false
sourcemap = "inline"

[output.globals]
react = "React"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.input.entry.as_deref(), Some("src/index.js"));
        assert_eq!(config.input.external, vec!["react", "lodash/*"]);

        let options = GenerateOptions::from(&config.output);
        assert_eq!(options.format, Format::Umd);
        assert_eq!(options.module_name.as_deref(), Some("lib"));
        assert_eq!(options.indent, IndentOption::Literal("  ".into()));
        assert!(!options.use_strict);
        assert_eq!(options.sourcemap, SourceMapOption::Inline);
        assert_eq!(options.globals.get("react").map(String::as_str), Some("React"));
    }

    #[test]
    fn test_flag_settings() {
        let config: ShakepackConfig = toml::from_str("[output]\nindent = false\nsourcemap = true\n").unwrap();
        let options = GenerateOptions::from(&config.output);
        assert_eq!(options.indent, IndentOption::None);
        assert_eq!(options.sourcemap, SourceMapOption::File);
        assert_eq!(options.format, Format::Es6);
        assert!(options.use_strict);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shakepack.toml");
        std::fs::write(&path, "[output]\nformat = \"esm\"\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_write_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shakepack.toml");
        write_config(&path, &ShakepackConfig::starter(), false).unwrap();
        assert!(write_config(&path, &ShakepackConfig::starter(), false).is_err());
        write_config(&path, &ShakepackConfig::starter(), true).unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config, ShakepackConfig::starter());
    }

    #[test]
    fn test_input_options() {
        let input = InputConfig {
            entry: None,
            external: vec!["jquery".into()],
            main_fields: Some(vec!["module".into()]),
        };
        let options = input.bundle_options("src/main.js");
        assert_eq!(options.entry, "src/main.js");
        assert_eq!(options.external, vec!["jquery"]);
        assert_eq!(options.main_fields, vec!["module"]);
    }
}
