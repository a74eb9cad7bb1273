use std::{env, fs, path::PathBuf};

use crate::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 10;
pub const DEFAULT_FLAGS_ENV_VAR: &str = "NODE_OPTIONS";
pub const DEFAULT_TRACE_CATEGORIES: &str = "v8";

/// Persistent configuration for the perf-doctor CLI.
///
/// Stored at `~/.config/perf-doctor/config.yaml` (XDG aware). Every field can be overridden
/// from the command line.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DoctorConfig {
    /// Sampling cadence of the injected sampler, in milliseconds
    pub sample_interval: u64,
    /// Module preloaded into the target to write the process-stat samples
    pub sampler: Option<PathBuf>,
    /// Environment variable the target runtime reads its extra command line flags from
    pub flags_env_var: String,
    pub trace_categories: String,
    /// Directory under which new captures are created, defaults to the working directory
    pub output_dir: Option<PathBuf>,
    /// Overrides the bundled client script of the report
    pub assets_dir: Option<PathBuf>,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL_MS,
            sampler: None,
            flags_env_var: DEFAULT_FLAGS_ENV_VAR.into(),
            trace_categories: DEFAULT_TRACE_CATEGORIES.into(),
            output_dir: None,
            assets_dir: None,
        }
    }
}

/// Get the path to the configuration file, following the XDG Base Directory Specification
/// at https://specifications.freedesktop.org/basedir-spec/basedir-spec-latest.html
///
/// If config_name is None, returns ~/.config/perf-doctor/config.yaml (default)
/// If config_name is Some, returns ~/.config/perf-doctor/{config_name}.yaml
fn get_configuration_file_path(config_name: Option<&str>) -> Result<PathBuf> {
    let config_dir = match env::var("XDG_CONFIG_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = env::var("HOME").context("HOME env variable not set")?;
            PathBuf::from(home).join(".config")
        }
    };
    let config_dir = config_dir.join("perf-doctor");

    Ok(match config_name {
        Some(name) => config_dir.join(format!("{name}.yaml")),
        None => config_dir.join("config.yaml"),
    })
}

impl DoctorConfig {
    /// Load the configuration. If it does not exist, return a default configuration.
    pub fn load(config_name: Option<&str>) -> Result<Self> {
        let config_path = get_configuration_file_path(config_name)?;

        let config = match fs::read(&config_path) {
            Ok(config_str) => {
                let config: DoctorConfig = serde_yaml::from_slice(&config_str).context(format!(
                    "Failed to parse perf-doctor config at {}",
                    config_path.display()
                ))?;
                debug!("Config loaded from {}", config_path.display());
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file not found at {}", config_path.display());
                DoctorConfig::default()
            }
            Err(e) => bail!("Failed to load config: {e}"),
        };

        Ok(config.expand_paths())
    }

    /// Expands a leading `~` in every configured path, config files are rarely shell expanded.
    fn expand_paths(mut self) -> Self {
        let expand = |path: PathBuf| PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
        self.sampler = self.sampler.map(expand);
        self.output_dir = self.output_dir.map(expand);
        self.assets_dir = self.assets_dir.map(expand);
        self
    }
}
