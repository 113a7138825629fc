use crate::schema::ItineraConfig;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ItineraConfig,
    pub path: PathBuf,
    pub format: ConfigFormat,
}

/// Load configuration from `config_path`, or from the first candidate file
/// found. Without any file the defaults are used. Provider keys missing from
/// the file are filled from the environment in both cases.
pub fn load_config(config_path: Option<&Path>) -> Result<ItineraConfig> {
    let config = match config_path.map(Path::to_path_buf).or_else(find_config_file) {
        Some(path) => load_config_from_file(&path)?.config,
        None => {
            tracing::debug!("no configuration file found, using defaults");
            ItineraConfig::default()
        }
    };

    Ok(apply_env_fallbacks(config, |name| env::var(name).ok()))
}

/// Like [`load_config`] but fails when no file exists.
pub fn resolve_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .or_else(find_config_file)
        .ok_or_else(|| anyhow!("No configuration file found"))?;

    load_config_from_file(&path)
}

pub fn load_config_from_file(path: &Path) -> Result<ResolvedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    let config = parse_config_content(&content, format)?;

    Ok(ResolvedConfig {
        config: expand_env_vars(config),
        path: path.to_path_buf(),
        format,
    })
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<ItineraConfig> {
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}

const CONFIG_CANDIDATES: &[&str] = &[
    "itinera.jsonc",
    "itinera.json",
    "itinera.yml",
    "itinera.yaml",
    ".itinera.jsonc",
    ".itinera.json",
    ".itinera.yml",
    ".itinera.yaml",
];

pub fn find_config_file() -> Option<PathBuf> {
    let global_dir = dirs::home_dir().map(|home| home.join(".config").join("itinera"));
    find_config_file_in(Path::new("."), global_dir.as_deref())
}

fn find_config_file_in(local_dir: &Path, global_dir: Option<&Path>) -> Option<PathBuf> {
    let mut search_dirs = vec![local_dir];
    search_dirs.extend(global_dir);

    search_dirs.into_iter().find_map(|dir| {
        CONFIG_CANDIDATES
            .iter()
            .map(|candidate| dir.join(candidate))
            .find(|path| path.exists())
    })
}

const GEMINI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];
const SERPAPI_KEY_VARS: &[&str] = &["SERPAPI_API_KEY", "SERP_API_KEY"];

fn apply_env_fallbacks(
    mut config: ItineraConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ItineraConfig {
    let first_set = |names: &[&str]| {
        names
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.is_empty())
    };

    if config.providers.gemini.api_key.is_none() {
        config.providers.gemini.api_key = first_set(GEMINI_KEY_VARS);
    }
    if config.providers.serpapi.api_key.is_none() {
        config.providers.serpapi.api_key = first_set(SERPAPI_KEY_VARS);
    }
    config
}

fn expand_env_vars(mut config: ItineraConfig) -> ItineraConfig {
    config.gateway.host = expand_env_string(&config.gateway.host);

    let gemini = &mut config.providers.gemini;
    gemini.api_key = gemini.api_key.as_deref().map(expand_env_string);
    gemini.base_url = expand_env_string(&gemini.base_url);

    let serpapi = &mut config.providers.serpapi;
    serpapi.api_key = serpapi.api_key.as_deref().map(expand_env_string);
    serpapi.base_url = expand_env_string(&serpapi.base_url);

    config
}

fn expand_env_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if chars.peek() == Some(&'{') {
            chars.next();
            let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
            match env::var(&var_name) {
                Ok(value) => result.push_str(&value),
                Err(_) => {
                    result.push_str("${");
                    result.push_str(&var_name);
                    result.push('}');
                }
            }
            continue;
        }

        // Stop at the first character that cannot be part of a name so the
        // delimiter stays in the output.
        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        match env::var(&var_name) {
            Ok(value) if !var_name.is_empty() => result.push_str(&value),
            _ => {
                result.push('$');
                result.push_str(&var_name);
            }
        }
    }

    result
}
