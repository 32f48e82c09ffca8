#![cfg(unix)]

use gpu_monitor_core::{Backend, GpuRecord, QueryResult};
use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

// Writing a script while another test forks can leave the script busy for
// exec, so the tests take turns.
static SERIAL: Mutex<()> = Mutex::new(());

fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn run_monitor(home: &TempDir, nvidia_smi: &Path, rocm_smi: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gpu-monitor"))
        .env_remove("RUST_LOG")
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("GPU_MONITOR_BACKENDS__NVIDIA_SMI", nvidia_smi)
        .env("GPU_MONITOR_BACKENDS__ROCM_SMI", rocm_smi)
        .output()
        .unwrap()
}

fn stdout_result(output: &Output) -> QueryResult {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn stderr_report(output: &Output) -> Value {
    serde_json::from_slice(&output.stderr).unwrap()
}

#[test]
fn test_no_tooling_reports_none() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();

    let output = run_monitor(&dir, &dir.path().join("nvidia-smi"), &dir.path().join("rocm-smi"));

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "{\"backend\":\"none\",\"gpus\":[]}\n");
    assert!(output.stderr.is_empty());
}

#[test]
fn test_nvidia_csv_is_reported() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let nvidia = fake_tool(dir.path(), "nvidia-smi", "printf '0, 45, 2048, 8192\\nNo data\\n1, 3, 512, 24576\\n'");

    let output = run_monitor(&dir, &nvidia, &dir.path().join("rocm-smi"));

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout_result(&output),
        QueryResult::new(
            Backend::Nvidia,
            vec![
                GpuRecord { index: 0, util: 45.0, mem_used: 2048, mem_total: 8192 },
                GpuRecord { index: 1, util: 3.0, mem_used: 512, mem_total: 24576 },
            ],
        )
    );
}

#[test]
fn test_nvidia_unreadable_value_is_an_error() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let nvidia = fake_tool(dir.path(), "nvidia-smi", "printf '0, 45, 2048, 8192\\n1, [N/A], 0, 0\\n'");

    let output = run_monitor(&dir, &nvidia, &dir.path().join("rocm-smi"));

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let report = stderr_report(&output);
    assert_eq!(report["backend"], "error");
    let message = report["error"].as_str().unwrap();
    assert!(message.contains("utilization.gpu"));
    assert!(message.contains("[N/A]"));
}

#[test]
fn test_nvidia_preferred_over_amd() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let nvidia = fake_tool(dir.path(), "nvidia-smi", "echo '0, 1, 2, 3'");
    let rocm = fake_tool(dir.path(), "rocm-smi", "echo ran > \"$0.ran\"; echo '{}'");

    let output = run_monitor(&dir, &nvidia, &rocm);

    assert_eq!(stdout_result(&output).backend, Backend::Nvidia);
    assert!(!dir.path().join("rocm-smi.ran").exists());
}

#[test]
fn test_amd_warning_preamble_on_stderr() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let rocm = fake_tool(
        dir.path(),
        "rocm-smi",
        r#"echo 'WARN: x' >&2
echo '{"card0":{"GPU use (%)":"10","VRAM Total Memory (B)":"1048576","VRAM Total Used Memory (B)":"524288"}}'"#,
    );

    let output = run_monitor(&dir, &dir.path().join("nvidia-smi"), &rocm);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout_result(&output),
        QueryResult::new(
            Backend::Amd,
            vec![GpuRecord { index: 0, util: 10.0, mem_used: 0, mem_total: 1 }],
        )
    );
}

#[test]
fn test_failed_tool_reports_captured_output() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let nvidia = fake_tool(
        dir.path(),
        "nvidia-smi",
        "echo \"NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver.\"; exit 9",
    );

    let output = run_monitor(&dir, &nvidia, &dir.path().join("rocm-smi"));

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let report = stderr_report(&output);
    assert_eq!(report["backend"], "error");
    assert_eq!(
        report["error"],
        "NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver.\n"
    );
    assert!(report.get("gpus").is_none());
}

#[test]
fn test_amd_without_json_is_an_error() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempdir().unwrap();
    let rocm = fake_tool(dir.path(), "rocm-smi", "echo 'ERROR: No AMD GPUs specified'");

    let output = run_monitor(&dir, &dir.path().join("nvidia-smi"), &rocm);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let report = stderr_report(&output);
    assert_eq!(report["backend"], "error");
    let message = report["error"].as_str().unwrap();
    assert!(message.contains("no JSON object found"));
    assert!(message.contains("No AMD GPUs specified"));
}
