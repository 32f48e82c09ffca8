use super::GpuRecord;
use crate::command::{CommandRunner, ToolInvocation};
use crate::error::{GpuMonitorError, RecordError, Result};
use serde_json::{Map, Value};
use tracing::debug;

const ROCM_SMI_ARGS: [&str; 4] = ["--showuse", "--showmeminfo", "vram", "--json"];

const UTILIZATION_KEY: &str = "GPU use (%)";
const VRAM_TOTAL_KEY: &str = "VRAM Total Memory (B)";
const VRAM_USED_KEY: &str = "VRAM Total Used Memory (B)";

const BYTES_PER_MIB: i64 = 1024 * 1024;

/// GPU metrics from the `rocm-smi` JSON report.
///
/// rocm-smi may print warnings ahead of the JSON body, and reports every
/// value as a string keyed by a human readable label, one object per card:
///
/// ```text
/// WARNING: ...
/// {"card0": {"GPU use (%)": "10", "VRAM Total Memory (B)": "17163091968", ...}}
/// ```
pub struct RocmSmiMonitor;

impl RocmSmiMonitor {
    pub fn invocation(program: &str) -> ToolInvocation {
        ToolInvocation::new(program, &ROCM_SMI_ARGS)
    }

    pub fn collect_metrics(runner: &dyn CommandRunner, program: &str) -> Result<Vec<GpuRecord>> {
        let output = runner.run(&Self::invocation(program))?;
        Self::parse_output(&output)
    }

    pub fn parse_output(output: &str) -> Result<Vec<GpuRecord>> {
        let body = extract_json_body(output)?;

        let devices: Map<String, Value> = match serde_json::from_str(body) {
            Ok(Value::Object(devices)) => devices,
            Ok(other) => {
                return Err(GpuMonitorError::FormatError(format!(
                    "rocm-smi JSON is not an object: {}",
                    other
                )))
            }
            Err(e) => {
                return Err(GpuMonitorError::FormatError(format!(
                    "invalid rocm-smi JSON: {}",
                    e
                )))
            }
        };

        let records = devices
            .iter()
            .filter_map(|(key, entry)| match Self::parse_device(key, entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping rocm-smi entry {:?}: {}", key, e);
                    None
                }
            })
            .collect();

        Ok(records)
    }

    fn parse_device(key: &str, entry: &Value) -> std::result::Result<GpuRecord, RecordError> {
        let fields = entry.as_object().ok_or(RecordError::NotAnObject)?;

        let util = match fields.get(UTILIZATION_KEY) {
            Some(value) => float_value(UTILIZATION_KEY, value)?,
            None => 0.0,
        };
        let mem_total = match fields.get(VRAM_TOTAL_KEY) {
            Some(value) => integer_value(VRAM_TOTAL_KEY, value)?,
            None => 0,
        };
        let mem_used = match fields.get(VRAM_USED_KEY) {
            Some(value) => integer_value(VRAM_USED_KEY, value)?,
            None => 0,
        };

        Ok(GpuRecord {
            index: device_index(key)?,
            util,
            mem_used: bytes_to_mib(mem_used),
            mem_total: bytes_to_mib(mem_total),
        })
    }
}

/// Drops everything ahead of the first `{`.
fn extract_json_body(output: &str) -> Result<&str> {
    match output.find('{') {
        Some(start) => Ok(&output[start..]),
        None => Err(GpuMonitorError::FormatError(format!(
            "no JSON object found in rocm-smi output: {:?}",
            output
        ))),
    }
}

/// Digits of the key, concatenated in order: `card1` is 1, `card1x2` is 12.
/// A key without digits maps to 0, so distinct keys can share an index.
fn device_index(key: &str) -> std::result::Result<i64, RecordError> {
    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse()
        .map_err(|_| RecordError::InvalidIndex(key.to_string()))
}

/// Floor division, so a negative count stays negative.
fn bytes_to_mib(bytes: i64) -> i64 {
    bytes.div_euclid(BYTES_PER_MIB)
}

fn float_value(field: &'static str, value: &Value) -> std::result::Result<f64, RecordError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(field, value))
}

fn integer_value(field: &'static str, value: &Value) -> std::result::Result<i64, RecordError> {
    let parsed = match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(field, value))
}

fn invalid(field: &'static str, value: &Value) -> RecordError {
    RecordError::InvalidField {
        field,
        value: value.to_string(),
    }
}
