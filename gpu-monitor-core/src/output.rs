//! Writes the single JSON document a query produces.

use crate::error::GpuMonitorError;
use crate::gpu::{ErrorReport, QueryResult};
use std::io::Write;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Writes a result to `stdout` or an error report to `stderr`, one compact
/// JSON line either way, and returns the process exit status.
pub fn emit(
    outcome: anyhow::Result<QueryResult>,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> std::io::Result<i32> {
    match outcome {
        Ok(result) => {
            write_line(stdout, &result)?;
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            write_line(stderr, &ErrorReport::new(failure_message(&e)))?;
            Ok(EXIT_FAILURE)
        }
    }
}

/// Tool failures report the captured output as is; anything else reports its
/// full context chain.
pub fn failure_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<GpuMonitorError>() {
        Some(e) => e.report_message(),
        None => format!("{:#}", error),
    }
}

fn write_line<T: serde::Serialize>(writer: &mut impl Write, document: &T) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, document)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
