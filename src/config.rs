//! Configuration for stepscript.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (STEPSCRIPT_HOME, STEPSCRIPT_DESCRIBER, STEPSCRIPT_BASE_URL)
//! 2. Config file (.stepscript/config.yaml)
//! 3. Defaults (~/.stepscript)
//!
//! Config file discovery:
//! - Searches current directory and parents for .stepscript/config.yaml
//! - `paths.home` is relative to the .stepscript/ directory

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compiler::emitter::{
    EmitOptions, DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_PLACEHOLDER_URL,
};

pub const ENV_HOME: &str = "STEPSCRIPT_HOME";
pub const ENV_DESCRIBER: &str = "STEPSCRIPT_DESCRIBER";
pub const ENV_BASE_URL: &str = "STEPSCRIPT_BASE_URL";

const CONFIG_DIR: &str = ".stepscript";
const CONFIG_FILE: &str = "config.yaml";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub emitter: Option<EmitterConfig>,
    #[serde(default)]
    pub describer: Option<DescriberConfig>,
    #[serde(default)]
    pub reachability: Option<ReachabilityConfig>,
    #[serde(default)]
    pub audit: Option<AuditConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .stepscript/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmitterConfig {
    pub action_timeout_ms: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
    pub placeholder_url: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriberConfig {
    pub backend: Option<String>,
    pub fabric_binary: Option<String>,
    pub pattern: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReachabilityConfig {
    pub enabled: Option<bool>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    pub fatal: Option<bool>,
}

/// Which describer produces intent text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DescriberBackend {
    /// Deterministic templates
    #[default]
    Rules,
    /// The fabric CLI
    Fabric,
}

impl FromStr for DescriberBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rules" | "template" => Ok(Self::Rules),
            "fabric" => Ok(Self::Fabric),
            other => anyhow::bail!("Unknown describer backend '{}' (expected rules or fabric)", other),
        }
    }
}

impl std::fmt::Display for DescriberBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rules => f.write_str("rules"),
            Self::Fabric => f.write_str("fabric"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriberSettings {
    pub backend: DescriberBackend,
    /// Explicit binary; detected on PATH when absent
    pub fabric_binary: Option<String>,
    pub pattern: String,
    pub timeout_seconds: u64,
}

impl Default for DescriberSettings {
    fn default() -> Self {
        Self {
            backend: DescriberBackend::Rules,
            fabric_binary: None,
            pattern: crate::adapters::fabric::DEFAULT_PATTERN.to_string(),
            timeout_seconds: 30,
        }
    }
}

impl DescriberSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReachabilitySettings {
    pub enabled: bool,
    pub timeout_seconds: u64,
}

impl Default for ReachabilitySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_seconds: 10,
        }
    }
}

impl ReachabilitySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// State directory (runs, index)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub emitter: EmitOptions,
    /// Initial URL override for emitted scripts
    pub base_url: Option<String>,
    pub describer: DescriberSettings,
    pub reachability: ReachabilitySettings,
    pub audit_fatal: bool,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge file values, environment and defaults
fn resolve(
    file: ConfigFile,
    config_path: Option<PathBuf>,
    default_home: PathBuf,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let config_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let home = match (env(ENV_HOME), &file.paths.home) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home_path)) => resolve_path(&config_dir, home_path),
        (None, None) => default_home,
    };

    let emitter_file = file.emitter.unwrap_or_default();
    let emitter = EmitOptions {
        action_timeout_ms: emitter_file
            .action_timeout_ms
            .unwrap_or(DEFAULT_ACTION_TIMEOUT_MS),
        navigation_timeout_ms: emitter_file
            .navigation_timeout_ms
            .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT_MS),
        placeholder_url: emitter_file
            .placeholder_url
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER_URL.to_string()),
    };
    let base_url = env(ENV_BASE_URL)
        .or(emitter_file.base_url)
        .filter(|u| !u.trim().is_empty());

    let describer_file = file.describer.unwrap_or_default();
    let defaults = DescriberSettings::default();
    let backend = match env(ENV_DESCRIBER).or(describer_file.backend) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid describer backend '{}'", value))?,
        None => defaults.backend,
    };
    let describer = DescriberSettings {
        backend,
        fabric_binary: describer_file.fabric_binary,
        pattern: describer_file.pattern.unwrap_or(defaults.pattern),
        timeout_seconds: describer_file
            .timeout_seconds
            .unwrap_or(defaults.timeout_seconds),
    };

    let reachability_file = file.reachability.unwrap_or_default();
    let reachability_defaults = ReachabilitySettings::default();
    let reachability = ReachabilitySettings {
        enabled: reachability_file
            .enabled
            .unwrap_or(reachability_defaults.enabled),
        timeout_seconds: reachability_file
            .timeout_seconds
            .unwrap_or(reachability_defaults.timeout_seconds),
    };

    let audit_fatal = file.audit.and_then(|a| a.fatal).unwrap_or(false);

    Ok(ResolvedConfig {
        home,
        config_file: config_path,
        emitter,
        base_url,
        describer,
        reachability,
        audit_fatal,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_path = find_config_file();
    let file = match config_path {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_path, default_home, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the stepscript home directory
pub fn stepscript_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the runs directory ($STEPSCRIPT_HOME/runs)
pub fn runs_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("runs"))
}

/// Get the step index path ($STEPSCRIPT_HOME/index.json)
pub fn index_path() -> Result<PathBuf> {
    Ok(config()?.home.join("index.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(
            ConfigFile::default(),
            None,
            PathBuf::from("/home/u/.stepscript"),
            no_env,
        )
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/home/u/.stepscript"));
        assert!(config.config_file.is_none());
        assert_eq!(config.emitter, EmitOptions::default());
        assert_eq!(config.describer.backend, DescriberBackend::Rules);
        assert!(!config.reachability.enabled);
        assert!(!config.audit_fatal);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./state
emitter:
  action_timeout_ms: 8000
  base_url: https://staging.test/
describer:
  backend: fabric
  pattern: describe_step
reachability:
  enabled: true
audit:
  fatal: true
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        let config = resolve(parsed, Some(config_path), PathBuf::from("/unused"), no_env).unwrap();

        assert_eq!(config.home, config_dir.join("state"));
        assert_eq!(config.emitter.action_timeout_ms, 8000);
        assert_eq!(config.emitter.navigation_timeout_ms, DEFAULT_NAVIGATION_TIMEOUT_MS);
        assert_eq!(config.base_url.as_deref(), Some("https://staging.test/"));
        assert_eq!(config.describer.backend, DescriberBackend::Fabric);
        assert_eq!(config.describer.pattern, "describe_step");
        assert!(config.reachability.enabled);
        assert!(config.audit_fatal);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            (ENV_HOME, "/tmp/override"),
            (ENV_DESCRIBER, "rules"),
            (ENV_BASE_URL, "https://env.test/"),
        ]
        .into_iter()
        .collect();

        let file = ConfigFile {
            paths: PathsConfig {
                home: Some("./state".into()),
            },
            describer: Some(DescriberConfig {
                backend: Some("fabric".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = resolve(file, None, PathBuf::from("/unused"), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/tmp/override"));
        assert_eq!(config.describer.backend, DescriberBackend::Rules);
        assert_eq!(config.base_url.as_deref(), Some("https://env.test/"));
    }

    #[test]
    fn test_invalid_backend() {
        let file = ConfigFile {
            describer: Some(DescriberConfig {
                backend: Some("gpt".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(resolve(file, None, PathBuf::from("/x"), no_env).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(&base, "../sibling"),
            PathBuf::from("/home/user/project/../sibling")
        );
    }
}
