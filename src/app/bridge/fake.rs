use std::path::Path;
use std::sync::Mutex;

use crate::app::bridge::channel::{BridgeCommand, DeviceBridge};
use crate::app::error::AppError;

/// Records every command; answers shell lines by substring and writes files on `file recv`.
#[derive(Default)]
pub struct RecordingBridge {
    pub commands: Mutex<Vec<BridgeCommand>>,
    replies: Mutex<Vec<(String, String)>>,
    recv_payload: Mutex<Option<String>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, needle: &str, output: &str) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((needle.to_string(), output.to_string()));
        self
    }

    pub fn recv_writes(self, payload: &str) -> Self {
        *self.recv_payload.lock().unwrap_or_else(|p| p.into_inner()) = Some(payload.to_string());
        self
    }

    pub fn fail_on(self, needle: &str) -> Self {
        *self.fail_on.lock().unwrap_or_else(|p| p.into_inner()) = Some(needle.to_string());
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|command| command.to_string())
            .collect()
    }

    fn handle(&self, command: &BridgeCommand, trace_id: &str) -> Result<String, AppError> {
        self.commands
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(command.clone());
        let rendered = command.to_string();
        if let Some(needle) = self.fail_on.lock().unwrap_or_else(|p| p.into_inner()).as_ref() {
            if rendered.contains(needle.as_str()) {
                return Err(AppError::system(format!("fake failure on {rendered}"), trace_id));
            }
        }
        if let BridgeCommand::Transfer(args) = command {
            if args.get(1).map(String::as_str) == Some("recv") {
                let payload = self.recv_payload.lock().unwrap_or_else(|p| p.into_inner()).clone();
                if let (Some(payload), Some(local)) = (payload, args.get(3)) {
                    let local = Path::new(local);
                    if let Some(parent) = local.parent() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                    let _ = std::fs::write(local, payload);
                }
            }
        }
        let replies = self.replies.lock().unwrap_or_else(|p| p.into_inner());
        Ok(replies
            .iter()
            .find(|(needle, _)| rendered.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

impl DeviceBridge for RecordingBridge {
    fn execute(&self, command: &BridgeCommand, trace_id: &str) -> Result<(), AppError> {
        self.handle(command, trace_id).map(|_| ())
    }

    fn execute_capture(&self, command: &BridgeCommand, trace_id: &str) -> Result<String, AppError> {
        self.handle(command, trace_id)
    }
}
