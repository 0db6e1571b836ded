//! Configuration loading and resolution for Phylo.
//!
//! The config file lives at `~/.phylo/config.toml` unless `PHYLO_CONFIG`
//! points elsewhere. Every section and field is optional:
//!
//! ```toml
//! [service]
//! url = "http://localhost:8000"
//! connect_timeout_secs = 30
//!
//! [analysis]
//! outgroup = "uncisetus"
//! tree_tool = "iqtree"      # skip | fasttree | iqtree
//! bootstrap = 1000
//!
//! [timing]
//! poll_interval_ms = 500
//! min_progress_visible_ms = 1200
//! selection_interval_ms = 200
//! ```
//!
//! String values may reference environment variables as `${NAME}`.
//! [`PhyloConfig`] mirrors the file; [`ResolvedConfig`] is the validated
//! result every other crate consumes.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use phylo_types::{
    AnalysisParams, DEFAULT_BOOTSTRAP_REPLICATES, Outgroup, Timings, TimingsError, TreeTool,
    UnknownTreeTool,
};

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const CONFIG_PATH_ENV: &str = "PHYLO_CONFIG";

#[derive(Debug, Default, Deserialize)]
pub struct PhyloConfig {
    pub service: Option<ServiceConfig>,
    pub analysis: Option<AnalysisConfig>,
    pub timing: Option<TimingConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceConfig {
    pub url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisConfig {
    pub outgroup: Option<String>,
    pub tree_tool: Option<String>,
    pub bootstrap: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimingConfig {
    pub poll_interval_ms: Option<u64>,
    pub min_progress_visible_ms: Option<u64>,
    pub selection_interval_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid service url '{value}': {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },
    #[error(transparent)]
    TreeTool(#[from] UnknownTreeTool),
    #[error(transparent)]
    Timings(#[from] TimingsError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }
}

/// Fully validated settings.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub service_url: Url,
    pub connect_timeout: Duration,
    pub outgroup: Outgroup,
    pub analysis: AnalysisParams,
    pub timings: Timings,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        // Resolving an empty config only touches compile-time defaults.
        PhyloConfig::default()
            .resolve()
            .unwrap_or_else(|e| unreachable!("built-in defaults are valid: {e}"))
    }
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl PhyloConfig {
    /// Load the config from its default location. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Validate and fill in defaults.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let service = self.service.as_ref();
        let raw_url = service
            .and_then(|s| s.url.as_deref())
            .map_or_else(|| DEFAULT_SERVICE_URL.to_string(), expand_env_vars);
        let service_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            value: raw_url.clone(),
            source,
        })?;
        let connect_timeout = Duration::from_secs(
            service
                .and_then(|s| s.connect_timeout_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        );

        let analysis = self.analysis.as_ref();
        let outgroup_raw = analysis
            .and_then(|a| a.outgroup.as_deref())
            .map(expand_env_vars);
        let outgroup = Outgroup::or_default(outgroup_raw.as_deref());
        let tool = match analysis.and_then(|a| a.tree_tool.as_deref()) {
            Some(raw) => expand_env_vars(raw).parse::<TreeTool>()?,
            None => TreeTool::default(),
        };
        let bootstrap = analysis
            .and_then(|a| a.bootstrap)
            .unwrap_or(DEFAULT_BOOTSTRAP_REPLICATES);

        let defaults = Timings::default();
        let timing = self.timing.as_ref();
        let ms = |pick: fn(&TimingConfig) -> Option<u64>, fallback: Duration| {
            timing
                .and_then(pick)
                .map_or(fallback, Duration::from_millis)
        };
        let timings = Timings::new(
            ms(|t| t.poll_interval_ms, defaults.poll_interval()),
            ms(|t| t.min_progress_visible_ms, defaults.min_progress_visible()),
            ms(|t| t.selection_interval_ms, defaults.selection_interval()),
        )?;

        Ok(ResolvedConfig {
            service_url,
            connect_timeout,
            outgroup,
            analysis: AnalysisParams::new(tool, bootstrap),
            timings,
        })
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var(CONFIG_PATH_ENV)
        && !custom.trim().is_empty()
    {
        return Some(PathBuf::from(custom));
    }
    dirs::home_dir().map(|home| home.join(".phylo").join("config.toml"))
}
