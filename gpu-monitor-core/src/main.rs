use gpu_monitor_core::{
    init_logging, output, query_gpu_stats, GpuMonitorConfig, QueryResult, SystemCommandRunner,
};
use std::process::ExitCode;
use tracing::{debug, warn};

fn run(config: &GpuMonitorConfig) -> anyhow::Result<QueryResult> {
    let result = query_gpu_stats(&SystemCommandRunner, &config.backends)?;
    debug!("Collected {} GPU record(s) from {:?}", result.gpus.len(), result.backend);
    Ok(result)
}

fn main() -> ExitCode {
    let (config, load_error) = match GpuMonitorConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (GpuMonitorConfig::default(), Some(e)),
    };

    init_logging(&config.logging.filter);

    if let Some(e) = load_error {
        warn!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
    }

    let outcome = run(&config);

    match output::emit(outcome, &mut std::io::stdout().lock(), &mut std::io::stderr().lock()) {
        Ok(code) => ExitCode::from(code as u8),
        Err(_) => ExitCode::FAILURE,
    }
}
