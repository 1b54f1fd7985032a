//! Run configuration.
//!
//! Layered lowest to highest: built-in defaults, a TOML file, environment
//! variables, command-line flags. Built once in `organize` and passed down
//! by reference.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "PODCAST_ORGANIZER_CONFIG";
const CONFIG_FILE_NAME: &str = ".podcast-organizer.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[serde(alias = "claude")]
    #[value(alias = "claude")]
    Anthropic,
    Openai,
    /// No remote calls; categories and tags come from the local fallback.
    Offline,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Openai => "openai",
            Provider::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub fetching: FetchingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[ai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: Provider,
    /// Provider default when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, skip_serializing)]
    pub anthropic_api_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_base_url: Option<String>,
    #[serde(default)]
    pub openai_base_url: Option<String>,
    /// Upper bound on any single backend call.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            anthropic_api_key: None,
            openai_api_key: None,
            anthropic_base_url: None,
            openai_base_url: None,
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// `[fetching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchingConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for FetchingConfig {
    fn default() -> Self {
        Self { timeout_secs: default_fetch_timeout(), max_concurrent: default_max_concurrent() }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_file")]
    pub default_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { default_file: default_output_file() }
    }
}

fn default_backend_timeout() -> u64 { 120 }
fn default_fetch_timeout() -> u64 { 30 }
fn default_max_concurrent() -> usize { 10 }
fn default_output_file() -> PathBuf { PathBuf::from("podcasts.md") }

/// Command-line values that win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub output: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults, then the first config file found, then the environment.
    pub fn resolve<F>(explicit: Option<&Path>, lookup: F) -> Result<(Self, Option<PathBuf>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => discover(&lookup),
        };
        let mut cfg = match &path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env(lookup);
        Ok((cfg, path))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(v) = get("ANTHROPIC_API_KEY") { self.ai.anthropic_api_key = Some(v); }
        if let Some(v) = get("OPENAI_API_KEY") { self.ai.openai_api_key = Some(v); }
        if let Some(v) = get("ANTHROPIC_BASE_URL") { self.ai.anthropic_base_url = Some(v); }
        if let Some(v) = get("OPENAI_BASE_URL") { self.ai.openai_base_url = Some(v); }
    }

    pub fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(p) = o.provider { self.ai.provider = p; }
        if let Some(m) = &o.model { self.ai.model = Some(m.clone()); }
        if let Some(t) = o.timeout_secs { self.fetching.timeout_secs = t; }
        if let Some(n) = o.max_concurrent { self.fetching.max_concurrent = n; }
        if let Some(path) = &o.output { self.output.default_file = path.clone(); }
    }

    /// Every problem at once, so one run reports them all.
    pub fn validate(&self, require_ai: bool) -> Vec<String> {
        let mut problems = Vec::new();
        if self.fetching.timeout_secs == 0 {
            problems.push("fetching.timeout_secs must be greater than zero".to_string());
        }
        if self.fetching.max_concurrent == 0 {
            problems.push("fetching.max_concurrent must be greater than zero".to_string());
        }
        if !require_ai { return problems; }

        if self.ai.timeout_secs == 0 {
            problems.push("ai.timeout_secs must be greater than zero".to_string());
        }
        match self.ai.provider {
            Provider::Anthropic if self.ai.anthropic_api_key.is_none() => {
                problems.push("ANTHROPIC_API_KEY is not set (provider anthropic)".to_string());
            }
            Provider::Openai if self.ai.openai_api_key.is_none() => {
                problems.push("OPENAI_API_KEY is not set (provider openai)".to_string());
            }
            _ => {}
        }
        problems
    }
}

fn discover<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(p) = lookup(CONFIG_ENV).filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(p));
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() { return Some(local); }
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME)).filter(|p| p.is_file())
}
