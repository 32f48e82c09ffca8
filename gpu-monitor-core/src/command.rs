//! Running vendor diagnostic tools as external processes.

use crate::error::{GpuMonitorError, Result};
use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use tracing::debug;

/// One vendor tool call: program name or path plus fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Whether `program` resolves to an executable. Absence is not an error.
    fn is_available(&self, program: &str) -> bool;

    /// Runs the tool to completion and returns stdout and stderr as one text.
    fn run(&self, invocation: &ToolInvocation) -> Result<String>;
}

/// Runs tools on the host through the executable search path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn run(&self, invocation: &ToolInvocation) -> Result<String> {
        debug!("Running {}", invocation);

        // Both streams share one pipe so warnings stay in front of the body
        // they precede.
        let (mut reader, writer) = std::io::pipe()?;
        let spawned = {
            let mut command = Command::new(&invocation.program);
            command
                .args(&invocation.args)
                .stdin(Stdio::null())
                .stdout(writer.try_clone()?)
                .stderr(writer);
            command.spawn()
        };

        let mut child = spawned.map_err(|e| GpuMonitorError::ExecutionError {
            program: invocation.program.clone(),
            output: e.to_string(),
        })?;

        let mut captured = Vec::new();
        let read = reader.read_to_end(&mut captured);
        let status = child.wait()?;
        read?;

        let output = String::from_utf8_lossy(&captured).into_owned();

        if !status.success() {
            debug!("{} exited with {}", invocation.program, status);
            return Err(GpuMonitorError::ExecutionError {
                program: invocation.program.clone(),
                output,
            });
        }

        Ok(output)
    }
}
