pub mod amd;
pub mod nvidia;

pub use amd::RocmSmiMonitor;
pub use nvidia::NvidiaSmiMonitor;

use crate::{command::CommandRunner, config::BackendConfig, error::Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Nvidia,
    Amd,
    None,
    Error,
}

/// One GPU as reported by the vendor tool. Values are passed through as
/// reported, without range checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuRecord {
    pub index: i64,
    pub util: f64,
    /// MiB
    pub mem_used: i64,
    /// MiB
    pub mem_total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub backend: Backend,
    /// In the vendor tool's reporting order.
    pub gpus: Vec<GpuRecord>,
}

impl QueryResult {
    pub fn new(backend: Backend, gpus: Vec<GpuRecord>) -> Self {
        Self { backend, gpus }
    }

    /// No vendor tooling present. Not an error.
    pub fn no_backend() -> Self {
        Self::new(Backend::None, Vec::new())
    }
}

/// Failure document written to stderr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub backend: Backend,
    pub error: String,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            backend: Backend::Error,
            error: error.into(),
        }
    }
}

/// Vendor backends that can serve a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuMonitorBackend {
    Nvidia,
    Amd,
}

impl GpuMonitorBackend {
    /// Probe order. The first available candidate wins.
    pub const PRIORITY: [GpuMonitorBackend; 2] = [Self::Nvidia, Self::Amd];

    pub fn program<'a>(&self, config: &'a BackendConfig) -> &'a str {
        match self {
            Self::Nvidia => &config.nvidia_smi,
            Self::Amd => &config.rocm_smi,
        }
    }

    pub fn is_available(&self, runner: &dyn CommandRunner, config: &BackendConfig) -> bool {
        runner.is_available(self.program(config))
    }

    pub fn detect(runner: &dyn CommandRunner, config: &BackendConfig) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|backend| backend.is_available(runner, config))
    }

    pub fn collect(&self, runner: &dyn CommandRunner, config: &BackendConfig) -> Result<QueryResult> {
        let program = self.program(config);
        match self {
            Self::Nvidia => Ok(QueryResult::new(
                Backend::Nvidia,
                NvidiaSmiMonitor::collect_metrics(runner, program)?,
            )),
            Self::Amd => Ok(QueryResult::new(
                Backend::Amd,
                RocmSmiMonitor::collect_metrics(runner, program)?,
            )),
        }
    }
}

/// Picks the first available backend and runs exactly that one.
pub fn query_gpu_stats(runner: &dyn CommandRunner, config: &BackendConfig) -> Result<QueryResult> {
    match GpuMonitorBackend::detect(runner, config) {
        Some(backend) => {
            info!("Using {:?} backend ({})", backend, backend.program(config));
            backend.collect(runner, config)
        }
        None => {
            info!("No GPU tooling found");
            Ok(QueryResult::no_backend())
        }
    }
}
