use std::path::Path;

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = ".cardlens/config.toml";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_PAT_ENV: &str = "ADO_PAT";
const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
const ORG_URL_ENV: &str = "ADO_ORG_URL";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub org_url: Option<String>,
    pub field: Option<String>,
    pub model: Option<String>,
    pub pat_env: Option<String>,
    pub api_key_env: Option<String>,
    pub prompt_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Organization base URL of the source-control platform.
    pub org_url: String,
    /// Work item field that receives the composed report.
    pub field: String,
    /// Generation model name.
    pub model: String,
    /// Env var holding the platform personal access token.
    pub pat_env: String,
    /// Env var holding the generation service key.
    pub api_key_env: String,
    /// Optional directory with prompt template overrides.
    pub prompt_dir: Option<String>,
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self> {
        let file_config = match &cli.config {
            Some(path) => {
                let path = Path::new(path);
                if !path.exists() {
                    return Err(Error::ConfigNotFound(path.to_path_buf()));
                }
                parse_config(&std::fs::read_to_string(path)?)?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    parse_config(&std::fs::read_to_string(path)?)?
                } else {
                    ConfigFile::default()
                }
            }
        };

        let config = merge(file_config, cli);
        validate(&config)?;
        Ok(config)
    }
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

fn validate(config: &Config) -> Result<()> {
    if config.org_url.is_empty() {
        return Err(Error::ConfigValidation(format!(
            "organization URL not set (use --org-url, org_url in the config file, or ${ORG_URL_ENV})"
        )));
    }
    if config.field.is_empty() {
        return Err(Error::ConfigValidation(
            "report field not set (use --field or field in the config file)".to_string(),
        ));
    }
    Ok(())
}

pub fn merge(file: ConfigFile, cli: &Cli) -> Config {
    Config {
        org_url: cli
            .org_url
            .clone()
            .or(file.org_url)
            .or_else(|| std::env::var(ORG_URL_ENV).ok())
            .unwrap_or_default(),
        field: cli.field.clone().or(file.field).unwrap_or_default(),
        model: cli
            .model
            .clone()
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        pat_env: file.pat_env.unwrap_or_else(|| DEFAULT_PAT_ENV.to_string()),
        api_key_env: file
            .api_key_env
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
        prompt_dir: file.prompt_dir,
    }
}

/// Resolve a credential from the named environment variable.
pub fn resolve_secret(env_name: &str, what: &str) -> Result<String> {
    std::env::var(env_name)
        .map_err(|_| Error::ConfigValidation(format!("{what} not found in ${env_name}")))
}
