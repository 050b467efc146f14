use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::bridge::parse::parse_list_targets;
use crate::app::bridge::runner::{run_command_to_end, run_command_with_timeout, CommandOutput};
use crate::app::error::AppError;

pub const EXECUTE_TIMEOUT: Duration = Duration::from_secs(60);

/// One invocation of the bridge tool: either a device shell line or bridge-level
/// arguments such as `file send` / `file recv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Shell(String),
    Transfer(Vec<String>),
}

impl BridgeCommand {
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell(command.into())
    }

    pub fn send(local: &Path, remote: &str) -> Self {
        Self::Transfer(vec![
            "file".to_string(),
            "send".to_string(),
            local.to_string_lossy().to_string(),
            remote.to_string(),
        ])
    }

    pub fn recv(remote: &str, local: &Path) -> Self {
        Self::Transfer(vec![
            "file".to_string(),
            "recv".to_string(),
            remote.to_string(),
            local.to_string_lossy().to_string(),
        ])
    }
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(command) => write!(f, "shell {command}"),
            Self::Transfer(args) => write!(f, "{}", args.join(" ")),
        }
    }
}

/// Seam between device routines and the process that talks to the device.
pub trait DeviceBridge: Send + Sync {
    /// Fire-and-log; bounded by [`EXECUTE_TIMEOUT`].
    fn execute(&self, command: &BridgeCommand, trace_id: &str) -> Result<(), AppError>;

    /// Runs to completion and returns the combined output text.
    fn execute_capture(&self, command: &BridgeCommand, trace_id: &str) -> Result<String, AppError>;
}

#[derive(Debug, Clone)]
pub struct DeviceChannel {
    program: String,
    device_id: Option<String>,
}

impl DeviceChannel {
    pub fn new(program: impl Into<String>, device_id: &str) -> Self {
        let device_id = Some(device_id.trim().to_string()).filter(|id| !id.is_empty());
        Self {
            program: program.into(),
            device_id,
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn build_args(&self, command: &BridgeCommand) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(device_id) = &self.device_id {
            args.push("-t".to_string());
            args.push(device_id.clone());
        }
        match command {
            BridgeCommand::Shell(line) => {
                args.push("shell".to_string());
                args.push(line.clone());
            }
            BridgeCommand::Transfer(rest) => args.extend(rest.iter().cloned()),
        }
        args
    }

    /// `hdc list targets`, unscoped by device id.
    pub fn list_targets(&self, trace_id: &str) -> Result<Vec<String>, AppError> {
        let args = vec!["list".to_string(), "targets".to_string()];
        let output = run_command_with_timeout(&self.program, &args, EXECUTE_TIMEOUT, trace_id)?;
        if !output.success() {
            return Err(AppError::dependency(
                format!("list targets failed: {}", output.stderr.trim()),
                trace_id,
            ));
        }
        Ok(parse_list_targets(&output.stdout))
    }

    fn log_output(&self, command: &BridgeCommand, output: &CommandOutput, trace_id: &str) {
        info!(trace_id = %trace_id, output = %output.stdout.trim_end(), "bridge output");
        if !output.success() || !output.stderr.trim().is_empty() {
            warn!(
                trace_id = %trace_id,
                command = %command,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim_end(),
                "bridge command reported an error"
            );
        }
    }
}

impl DeviceBridge for DeviceChannel {
    fn execute(&self, command: &BridgeCommand, trace_id: &str) -> Result<(), AppError> {
        let args = self.build_args(command);
        info!(trace_id = %trace_id, command = %command, "execute");
        let output = run_command_with_timeout(&self.program, &args, EXECUTE_TIMEOUT, trace_id)?;
        self.log_output(command, &output, trace_id);
        Ok(())
    }

    fn execute_capture(&self, command: &BridgeCommand, trace_id: &str) -> Result<String, AppError> {
        let args = self.build_args(command);
        info!(trace_id = %trace_id, command = %command, "execute_capture");
        let output = run_command_to_end(&self.program, &args, trace_id)?;
        self.log_output(command, &output, trace_id);
        Ok(output.combined())
    }
}
