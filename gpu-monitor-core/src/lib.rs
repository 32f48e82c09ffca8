pub mod command;
pub mod config;
pub mod error;
pub mod gpu;
pub mod output;

pub use command::{CommandRunner, SystemCommandRunner, ToolInvocation};
pub use config::GpuMonitorConfig;
pub use error::{GpuMonitorError, Result};
pub use gpu::{query_gpu_stats, Backend, GpuRecord, QueryResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr; stdout carries only the result document.
pub fn init_logging(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter))
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
        )
        .init();
}
