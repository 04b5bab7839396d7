use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::compiler::{CompileOptions, IdStrategy};

pub const CONFIG_FILE: &str = "puggy.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    /// Startup overrides: variable name -> expression source
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub pretty: bool,
    #[serde(default)]
    pub ids: IdStrategy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            pretty: false,
            ids: IdStrategy::default(),
        }
    }
}

impl BuildConfig {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            pretty: self.pretty,
            ids: self.ids,
        }
    }
}

fn default_source_dir() -> String {
    "src".to_string()
}

fn default_output_dir() -> String {
    "build".to_string()
}

/// Load and parse puggy.toml configuration file
pub fn load_config(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!("could not find `{}` in current directory", path)
            } else {
                anyhow::anyhow!("failed to read `{}`: {}", path, e)
            }
        })?;

    parse_config(&content).map_err(|e| anyhow::anyhow!("failed to parse `{}`: {}", path, e))
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;

    if config.project.name.trim().is_empty() {
        anyhow::bail!("project name must not be empty");
    }

    if normalize_dir(&config.build.output_dir) == normalize_dir(&config.build.source_dir) {
        anyhow::bail!(
            "output_dir '{}' must differ from source_dir '{}'",
            config.build.output_dir,
            config.build.source_dir
        );
    }

    for name in config.variables.keys() {
        validate_variable_name(name)?;
    }

    Ok(config)
}

fn normalize_dir(dir: &str) -> &str {
    let dir = dir.trim_start_matches("./").trim_end_matches('/');
    if dir.is_empty() {
        "."
    } else {
        dir
    }
}

/// Override keys must be names the runtime can declare a setter for
fn validate_variable_name(name: &str) -> Result<()> {
    let first_char = match name.chars().next() {
        Some(c) => c,
        None => anyhow::bail!("Invalid variable name ''. Names must not be empty"),
    };

    if first_char.is_ascii_digit() {
        anyhow::bail!(
            "Invalid variable name '{}'. Names must not start with a digit",
            name
        );
    }

    for ch in name.chars() {
        if !ch.is_alphanumeric() && ch != '_' && ch != '$' {
            anyhow::bail!(
                "Invalid variable name '{}'. Contains invalid character '{}'",
                name,
                ch
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_variable_name_valid() {
        assert!(validate_variable_name("greeting").is_ok());
        assert!(validate_variable_name("user_name").is_ok());
        assert!(validate_variable_name("$count2").is_ok());
    }

    #[test]
    fn test_validate_variable_name_invalid() {
        assert!(validate_variable_name("").is_err());
        assert!(validate_variable_name("2fast").is_err());
        assert!(validate_variable_name("my-var").is_err());
        assert!(validate_variable_name("a b").is_err());
    }

    #[test]
    fn test_default_build_config() {
        let config = BuildConfig::default();
        assert_eq!(config.source_dir, "src");
        assert_eq!(config.output_dir, "build");
        assert!(!config.pretty);
        assert_eq!(config.ids, IdStrategy::Sequential);
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
[project]
name = "site"

[build]
source_dir = "pages"
output_dir = "dist"
pretty = true
ids = "hashed"

[variables]
greeting = "'Hello'"
"#,
        )
        .unwrap();

        assert_eq!(config.project.name, "site");
        assert_eq!(config.build.source_dir, "pages");
        assert!(config.build.compile_options().pretty);
        assert_eq!(config.build.ids, IdStrategy::Hashed);
        assert_eq!(config.variables["greeting"], "'Hello'");
    }

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = parse_config("[project]\nname = \"site\"\n").unwrap();
        assert_eq!(config.build.output_dir, "build");
        assert!(config.variables.is_empty());
    }

    #[test]
    fn test_parse_config_rejects_same_dirs() {
        let err = parse_config("[project]\nname = \"x\"\n[build]\nsource_dir = \"./out/\"\noutput_dir = \"out\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_parse_config_rejects_empty_name() {
        assert!(parse_config("[project]\nname = \" \"\n").is_err());
    }

    #[test]
    fn test_parse_config_rejects_bad_ids() {
        assert!(parse_config("[project]\nname = \"x\"\n[build]\nids = \"random\"\n").is_err());
    }
}
