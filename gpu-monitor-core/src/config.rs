use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpuMonitorConfig {
    #[serde(default)]
    pub backends: BackendConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Program names (or paths) probed and invoked for each vendor backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_nvidia_smi")]
    pub nvidia_smi: String,

    #[serde(default = "default_rocm_smi")]
    pub rocm_smi: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset. Logs go to stderr, which also carries
    /// the failure document, so this stays `off` unless asked for.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            nvidia_smi: default_nvidia_smi(),
            rocm_smi: default_rocm_smi(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl GpuMonitorConfig {
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(Self::config_path())
    }

    pub fn load_from(config_path: PathBuf) -> crate::error::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&GpuMonitorConfig::default())?)
            .add_source(
                config::File::from(config_path)
                    .required(false)
            )
            .add_source(
                config::Environment::with_prefix("GPU_MONITOR")
                    .prefix_separator("_")
                    .separator("__")
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gpu-monitor")
            .join("config.toml")
    }
}

fn default_nvidia_smi() -> String { "nvidia-smi".to_string() }
fn default_rocm_smi() -> String { "rocm-smi".to_string() }
fn default_log_filter() -> String { "off".to_string() }
