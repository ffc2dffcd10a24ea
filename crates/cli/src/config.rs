//! Configuration management for the CLI

use crate::Cli;
use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use ktop_lib::{DisplayMode, MetricKey, TopConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings read from the config file and `KTOP_*` environment variables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Ranking metric (`cpu` or `memory`)
    pub metric: Option<String>,
    pub top_k: Option<usize>,
    pub refresh_ms: Option<u64>,
    pub poll_secs: Option<u64>,
    /// Display mode (`nodes` or `pods`)
    pub mode: Option<String>,
    pub jitter_ms: Option<u64>,
    pub bar_width: Option<usize>,
    pub pod_cpu_ceiling_cores: Option<f64>,
    pub pod_memory_ceiling_mib: Option<f64>,
}

impl FileConfig {
    /// Load from `path`, or from the default location when it exists,
    /// then apply `KTOP_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    fn load_from(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).format(FileFormat::Json));
            }
            None => {
                if let Some(default) = Self::config_path() {
                    builder = builder.add_source(
                        File::from(default)
                            .format(FileFormat::Json)
                            .required(false),
                    );
                }
            }
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("KTOP")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Get the default configuration file path
    fn config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("ktop").join("config.json"))
    }
}

/// Merge defaults, file/environment settings and flags, then validate
pub fn resolve(file: &FileConfig, cli: &Cli) -> Result<TopConfig> {
    let mut top = TopConfig::default();

    if let Some(metric) = &file.metric {
        top.metric_key = metric.parse()?;
    }
    if let Some(mode) = &file.mode {
        top.display_mode = mode.parse()?;
    }
    if let Some(top_k) = file.top_k {
        top.top_k = top_k;
    }
    if let Some(ms) = file.refresh_ms {
        top.refresh_period = Duration::from_millis(ms);
    }
    if let Some(secs) = file.poll_secs {
        top.poll_period = Duration::from_secs(secs);
    }
    if let Some(ms) = file.jitter_ms {
        top.jitter_max = Duration::from_millis(ms);
    }
    if let Some(width) = file.bar_width {
        top.bar_width = width;
    }
    if let Some(cores) = file.pod_cpu_ceiling_cores {
        top.pod_cpu_ceiling_cores = cores;
    }
    if let Some(mib) = file.pod_memory_ceiling_mib {
        top.pod_memory_ceiling_mib = mib;
    }

    if cli.pods {
        top.display_mode = DisplayMode::Pods;
    }
    if let Some(count) = cli.count {
        top.top_k = count;
    }
    if let Some(metric) = cli.sort {
        top.metric_key = metric;
    }
    if let Some(ms) = cli.refresh_ms {
        top.refresh_period = Duration::from_millis(ms);
    }
    if let Some(secs) = cli.poll_secs {
        top.poll_period = Duration::from_secs(secs);
    }
    if let Some(ms) = cli.jitter_ms {
        top.jitter_max = Duration::from_millis(ms);
    }
    if let Some(width) = cli.bar_width {
        top.bar_width = width;
    }

    top.validate()?;
    Ok(top)
}

/// Get kubeconfig path.
///
/// Returns `None` when no kubeconfig file is available, in which case the
/// client falls back to in-cluster configuration.
pub fn kubeconfig_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    let default = dirs_next::home_dir()?.join(".kube").join("config");
    default.exists().then_some(default)
}
