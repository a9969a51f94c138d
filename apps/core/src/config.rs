use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::expression::CommandExpression;
use crate::keys::parse_key;
use crate::manager::PriorityOverride;

const APP_DIR_NAME: &str = "quasimode";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io failed for '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse failed for '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityOverrideConfig {
    pub trigger: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trigger_key: String,
    pub cancel_keys: Vec<String>,
    pub modal: bool,
    pub min_autocomplete_chars: usize,
    pub max_suggestions: usize,
    pub suggestion_reveal_delay_ms: u64,
    pub double_tap_window_ms: u64,
    pub double_tap_prefix: Option<String>,
    /// Command text tried when nothing matched, e.g. `"search {text}"`.
    pub no_match_fallback: Option<String>,
    pub min_not_a_command_length: usize,
    pub calculator_prefix: Option<String>,
    pub fallback_prefix: Option<String>,
    pub backfill_with_fallback: bool,
    pub priority_overrides: Vec<PriorityOverrideConfig>,
    pub command_manifest_paths: Vec<PathBuf>,
    pub log_level: String,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger_key: "CapsLock".to_string(),
            cancel_keys: vec!["Escape".to_string()],
            modal: false,
            min_autocomplete_chars: 2,
            max_suggestions: 6,
            suggestion_reveal_delay_ms: 400,
            double_tap_window_ms: 300,
            double_tap_prefix: Some("open ".to_string()),
            no_match_fallback: None,
            min_not_a_command_length: 2,
            calculator_prefix: Some("calculate ".to_string()),
            fallback_prefix: None,
            backfill_with_fallback: true,
            priority_overrides: Vec::new(),
            command_manifest_paths: Vec::new(),
            log_level: "info".to_string(),
            config_path: stable_app_data_dir().join(CONFIG_FILE_NAME),
        }
    }
}

impl Config {
    pub fn priority_overrides(&self) -> Vec<PriorityOverride> {
        self.priority_overrides
            .iter()
            .map(|rule| PriorityOverride {
                trigger: rule.trigger.clone(),
                expression: CommandExpression::parse(&rule.expression)
                    .map(|expression| expression.to_string())
                    .unwrap_or_else(|_| rule.expression.clone()),
            })
            .collect()
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("QUASIMODE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }

    #[cfg(target_os = "windows")]
    let base = std::env::var_os("APPDATA").map(PathBuf::from);
    #[cfg(not(target_os = "windows"))]
    let base = std::env::var_os("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")));

    base.unwrap_or_else(std::env::temp_dir).join(APP_DIR_NAME)
}

pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| stable_app_data_dir().join(CONFIG_FILE_NAME));

    if !path.exists() {
        return Ok(Config {
            config_path: path,
            ..Config::default()
        });
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let mut cfg = parse(&path, &raw)?;
    cfg.config_path = path;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    let path = &cfg.config_path;
    let encoded = match extension(path).as_str() {
        "toml" => toml::to_string_pretty(cfg).map_err(|e| parse_error(path, e))?,
        _ => serde_json::to_string_pretty(cfg).map_err(|e| parse_error(path, e))?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, encoded).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })
}

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.trigger_key.trim().is_empty() {
        return Err(ConfigError::Invalid("trigger_key is required".into()));
    }
    let trigger = parse_key(&cfg.trigger_key).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    for name in &cfg.cancel_keys {
        let key = parse_key(name).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if key == trigger {
            return Err(ConfigError::Invalid(format!(
                "cancel key '{name}' is also the trigger key"
            )));
        }
    }

    if !(1..=50).contains(&cfg.max_suggestions) {
        return Err(ConfigError::Invalid("max_suggestions out of range".into()));
    }

    for rule in &cfg.priority_overrides {
        CommandExpression::parse(&rule.expression).map_err(|e| {
            ConfigError::Invalid(format!("priority override for '{}': {e}", rule.trigger))
        })?;
    }

    if let Some(template) = &cfg.no_match_fallback {
        if !template.contains("{text}") {
            return Err(ConfigError::Invalid(
                "no_match_fallback must contain {text}".into(),
            ));
        }
    }

    for (field, value) in [
        ("calculator_prefix", &cfg.calculator_prefix),
        ("fallback_prefix", &cfg.fallback_prefix),
        ("double_tap_prefix", &cfg.double_tap_prefix),
    ] {
        if value.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Invalid(format!("{field} must not be empty")));
        }
    }

    Ok(())
}

fn parse(path: &Path, raw: &str) -> Result<Config, ConfigError> {
    match extension(path).as_str() {
        "toml" => toml::from_str(raw).map_err(|e| parse_error(path, e)),
        "json" | "json5" => json5::from_str(raw).map_err(|e| parse_error(path, e)),
        other => Err(ConfigError::Invalid(format!(
            "unsupported config extension '{other}'"
        ))),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn parse_error(path: &Path, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}
