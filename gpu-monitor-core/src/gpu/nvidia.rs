use super::GpuRecord;
use crate::command::{CommandRunner, ToolInvocation};
use crate::error::{GpuMonitorError, RecordError, Result};
use tracing::debug;

const NVIDIA_SMI_ARGS: [&str; 2] = [
    "--query-gpu=index,utilization.gpu,memory.used,memory.total",
    "--format=csv,noheader,nounits",
];

const FIELD_COUNT: usize = 4;

/// GPU metrics from the `nvidia-smi` CSV query interface.
pub struct NvidiaSmiMonitor;

impl NvidiaSmiMonitor {
    pub fn invocation(program: &str) -> ToolInvocation {
        ToolInvocation::new(program, &NVIDIA_SMI_ARGS)
    }

    pub fn collect_metrics(runner: &dyn CommandRunner, program: &str) -> Result<Vec<GpuRecord>> {
        let output = runner.run(&Self::invocation(program))?;
        Self::parse_output(&output)
    }

    /// Rows with the wrong number of fields are dropped; the rest keep their
    /// order. A well-shaped row with an unreadable value fails the query.
    pub fn parse_output(output: &str) -> Result<Vec<GpuRecord>> {
        let mut records = Vec::new();

        for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let fields = match split_row(line) {
                Ok(fields) => fields,
                Err(e) => {
                    debug!("Skipping nvidia-smi row {:?}: {}", line, e);
                    continue;
                }
            };
            records.push(Self::parse_nvidia_smi_fields(fields)?);
        }

        Ok(records)
    }

    fn parse_nvidia_smi_fields(fields: [&str; FIELD_COUNT]) -> Result<GpuRecord> {
        let [index, util, mem_used, mem_total] = fields;

        Ok(GpuRecord {
            index: parse_field("index", index)?,
            util: parse_field("utilization.gpu", util)?,
            mem_used: parse_field("memory.used", mem_used)?,
            mem_total: parse_field("memory.total", mem_total)?,
        })
    }
}

fn split_row(line: &str) -> std::result::Result<[&str; FIELD_COUNT], RecordError> {
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();

    <[&str; FIELD_COUNT]>::try_from(parts).map_err(|parts| RecordError::FieldCount {
        expected: FIELD_COUNT,
        found: parts.len(),
    })
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        GpuMonitorError::FormatError(format!(
            "nvidia-smi field `{}` has unparsable value `{}`",
            field, value
        ))
    })
}
