//! Configuration file support for weave.
//!
//! weave reads two configuration file locations:
//! - Global: `~/.weave/config.toml` - User-wide defaults
//! - Project: `.weave/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default file extension of module sources.
pub const DEFAULT_EXTENSION: &str = "pxs";

/// weave configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Self-assembly settings
    pub assembly: AssemblyConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum number of modules compiled at once (None = available parallelism)
    pub max_parallel: Option<usize>,

    /// Number of compiler engines kept for reuse (None = same as max_parallel)
    pub engine_pool_size: Option<usize>,
}

/// Self-assembly configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Directories searched for referenced modules, in order
    pub search_paths: Vec<PathBuf>,

    /// Modules every assembled module depends on (e.g. `sys/1.0`)
    pub standard_library: Vec<String>,

    /// Source file extension (None = `pxs`)
    pub extension: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Search paths and standard library entries are appended rather than
    /// replaced, so project settings extend the global ones.
    pub fn merge(&mut self, other: Config) {
        if other.build.max_parallel.is_some() {
            self.build.max_parallel = other.build.max_parallel;
        }
        if other.build.engine_pool_size.is_some() {
            self.build.engine_pool_size = other.build.engine_pool_size;
        }

        for path in other.assembly.search_paths {
            if !self.assembly.search_paths.contains(&path) {
                self.assembly.search_paths.push(path);
            }
        }
        for module in other.assembly.standard_library {
            if !self.assembly.standard_library.contains(&module) {
                self.assembly.standard_library.push(module);
            }
        }
        if other.assembly.extension.is_some() {
            self.assembly.extension = other.assembly.extension;
        }
    }

    /// Effective compile parallelism.
    pub fn max_parallel(&self) -> usize {
        self.build
            .max_parallel
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
    }

    /// Effective engine pool size.
    pub fn engine_pool_size(&self) -> usize {
        self.build
            .engine_pool_size
            .filter(|&n| n > 0)
            .unwrap_or_else(|| self.max_parallel())
    }

    /// Effective source extension, without a leading dot.
    pub fn extension(&self) -> &str {
        self.assembly
            .extension
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .unwrap_or(DEFAULT_EXTENSION)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.weave/config.toml)
/// 2. Global config (~/.weave/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global weave config directory (~/.weave).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".weave"))
}

/// Get the global config path (~/.weave/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.weave/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".weave").join("config.toml")
}

/// Load the configuration that applies to `project_root`.
pub fn load_for_project(project_root: &Path) -> Config {
    let project = project_config_path(project_root);
    match global_config_path() {
        Some(global) => load_config(&global, &project),
        None => Config::load_or_default(&project),
    }
}
