//! Configuration for docflow paths and backends.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DOCFLOW_HOME, DOCFLOW_OUTPUT_DIR)
//! 2. Config file (.docflow/config.yaml)
//! 3. Defaults (~/.docflow, artifacts under ~/.docflow/artifacts)
//!
//! Config file discovery:
//! - Searches current directory and parents for .docflow/config.yaml
//! - `paths.home` is relative to the .docflow/ directory
//! - `paths.output` is relative to the project root (parent of .docflow/)

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::CollisionPolicy;

/// Environment variable overriding the home directory
pub const ENV_HOME: &str = "DOCFLOW_HOME";
/// Environment variable overriding the artifact output directory
pub const ENV_OUTPUT_DIR: &str = "DOCFLOW_OUTPUT_DIR";

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub capability: Option<CapabilityConfig>,
    #[serde(default)]
    pub artifacts: Option<ArtifactsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .docflow/)
    pub home: Option<String>,
    /// Artifact output directory (relative to the project root)
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapabilityConfig {
    pub backend: Option<Backend>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub fabric_binary: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<u32>,
    /// Role -> Fabric pattern or system instruction
    #[serde(default)]
    pub roles: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactsConfig {
    pub collision: Option<CollisionPolicy>,
}

/// Text generation backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Fabric CLI subprocess
    #[default]
    Fabric,
    /// Anthropic Messages API
    Anthropic,
    /// Offline echo, for dry runs
    Echo,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fabric => "fabric",
            Self::Anthropic => "anthropic",
            Self::Echo => "echo",
        };
        f.write_str(name)
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fabric" => Ok(Self::Fabric),
            "anthropic" => Ok(Self::Anthropic),
            "echo" => Ok(Self::Echo),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Resolved backend settings
#[derive(Debug, Clone)]
pub struct CapabilitySettings {
    pub backend: Backend,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub fabric_binary: Option<String>,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub roles: HashMap<String, String>,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            fabric_binary: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            max_tokens: DEFAULT_MAX_TOKENS,
            roles: HashMap::new(),
        }
    }
}

impl CapabilitySettings {
    fn from_file(config: CapabilityConfig) -> Self {
        let defaults = Self::default();
        Self {
            backend: config.backend.unwrap_or(defaults.backend),
            model: config.model.unwrap_or(defaults.model),
            base_url: config.base_url,
            api_key_env: config.api_key_env.unwrap_or(defaults.api_key_env),
            fabric_binary: config.fabric_binary,
            timeout: config
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_tokens: config.max_tokens.unwrap_or(defaults.max_tokens),
            roles: config.roles,
        }
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("Environment variable {} is not set", self.api_key_env))
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to docflow home
    pub home: PathBuf,
    /// Directory artifacts are written to
    pub output_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Backend settings
    pub capability: CapabilitySettings,
    /// What to do when an artifact path already exists
    pub collision: CollisionPolicy,
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".docflow").join("config.yaml");
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

/// Resolve a path that may be relative to `base`
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

/// Resolve configuration from an optional config file and an environment lookup
fn resolve(
    default_home: PathBuf,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let (home, output_dir, capability, collision) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // .docflow/ and the project root above it
        let docflow_dir = config_path.parent().unwrap_or(Path::new("."));
        let base_dir = docflow_dir.parent().unwrap_or(Path::new("."));

        let home = if let Some(env_home) = env(ENV_HOME) {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            resolve_path(docflow_dir, home_path)
        } else {
            default_home
        };

        let output_dir = if let Some(env_output) = env(ENV_OUTPUT_DIR) {
            PathBuf::from(env_output)
        } else if let Some(ref output_path) = config.paths.output {
            resolve_path(base_dir, output_path)
        } else {
            home.join("artifacts")
        };

        let capability = config
            .capability
            .map(CapabilitySettings::from_file)
            .unwrap_or_default();

        let collision = config
            .artifacts
            .and_then(|a| a.collision)
            .unwrap_or_default();

        (home, output_dir, capability, collision)
    } else {
        let home = env(ENV_HOME).map(PathBuf::from).unwrap_or(default_home);
        let output_dir = env(ENV_OUTPUT_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("artifacts"));

        (
            home,
            output_dir,
            CapabilitySettings::default(),
            CollisionPolicy::default(),
        )
    };

    Ok(ResolvedConfig {
        home,
        output_dir,
        config_file,
        capability,
        collision,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".docflow");

    let config_file = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_file(&cwd));

    resolve(default_home, config_file, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
