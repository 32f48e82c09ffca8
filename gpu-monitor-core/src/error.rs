use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpuMonitorError {
    #[error("{program} failed: {output}")]
    ExecutionError { program: String, output: String },

    #[error("Unexpected tool output: {0}")]
    FormatError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GpuMonitorError {
    /// Text reported in the `error` field of the failure document.
    ///
    /// A failed tool invocation reports exactly what the tool printed.
    pub fn report_message(&self) -> String {
        match self {
            Self::ExecutionError { output, .. } => output.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GpuMonitorError>;

/// Failure to turn a single row or device entry into a record.
///
/// Adapters log and drop these; they never reach the caller.
#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field `{field}` has unparsable value `{value}`")]
    InvalidField { field: &'static str, value: String },

    #[error("device entry is not an object")]
    NotAnObject,

    #[error("cannot derive an index from device key `{0}`")]
    InvalidIndex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_reports_captured_output() {
        let err = GpuMonitorError::ExecutionError {
            program: "nvidia-smi".to_string(),
            output: "NVIDIA-SMI has failed\n".to_string(),
        };
        assert_eq!(err.report_message(), "NVIDIA-SMI has failed\n");
        assert_eq!(err.to_string(), "nvidia-smi failed: NVIDIA-SMI has failed\n");
    }

    #[test]
    fn test_format_error_reports_display_text() {
        let err = GpuMonitorError::FormatError("no JSON object found".to_string());
        assert_eq!(err.report_message(), "Unexpected tool output: no JSON object found");
    }
}
