//! Fixed command sequences that put the device into a known state before and between passes.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::info;

use crate::app::bridge::channel::{BridgeCommand, DeviceBridge};
use crate::app::bridge::paths::DEVICE_HILOG_DIR;
use crate::app::config::{BenchConfig, FrequencySettings, UnlockSettings};
use crate::app::error::AppError;

pub const REMOUNT_ROOT: &str = "mount -o rw,remount /";
const SOC_PERF_DIR: &str = "/vendor/etc/soc_perf";

pub fn remount_commands() -> Vec<BridgeCommand> {
    vec![BridgeCommand::shell(REMOUNT_ROOT)]
}

/// Enables the UI test/debug switches; the trailing reboot applies them.
pub fn uitest_commands() -> Vec<BridgeCommand> {
    [
        "mount -o remount,rw /",
        "param set persist.ace.testmode.enabled 1",
        "param set persist.ace.debug.enabled 1",
        "reboot",
    ]
    .into_iter()
    .map(BridgeCommand::shell)
    .collect()
}

pub fn unlock_commands(unlock: &UnlockSettings) -> Vec<BridgeCommand> {
    vec![
        BridgeCommand::shell("power-shell wakeup"),
        BridgeCommand::shell(format!(
            "uinput -T -m {} {} {} {} {}",
            unlock.start_x, unlock.start_y, unlock.end_x, unlock.end_y, unlock.swipe_speed
        )),
        BridgeCommand::shell("power-shell setmode 602"),
        BridgeCommand::shell("power-shell display -s 50"),
    ]
}

pub fn hilog_setup_commands() -> Vec<BridgeCommand> {
    ["hilog -r", "hilog -b D", "hilog -G 512M", "hilog -Q pidoff", "hilog -p off"]
        .into_iter()
        .map(BridgeCommand::shell)
        .collect()
}

pub fn delete_hilog_command() -> BridgeCommand {
    BridgeCommand::shell(format!("rm -rf {DEVICE_HILOG_DIR}/*"))
}

/// Backs up and empties the vendor governor configs; ends with a reboot.
pub fn soc_perf_clear_commands(backup_dir: &Path) -> Vec<BridgeCommand> {
    vec![
        BridgeCommand::shell(REMOUNT_ROOT),
        BridgeCommand::shell("mount /vendor -o remount,rw"),
        BridgeCommand::recv(SOC_PERF_DIR, backup_dir),
        BridgeCommand::shell(format!("truncate -s 0 {SOC_PERF_DIR}/*.xml")),
        BridgeCommand::shell("reboot"),
    ]
}

pub fn frequency_lock_commands(frequency: &FrequencySettings) -> Vec<BridgeCommand> {
    let mut commands = Vec::new();
    for core in &frequency.cpu_cores {
        let base = format!("/sys/devices/system/cpu/cpu{core}/cpufreq");
        // max, min, max: the second max write sticks whichever bound was lower before.
        for node in ["scaling_max_freq", "scaling_min_freq", "scaling_max_freq"] {
            commands.push(BridgeCommand::shell(format!(
                "echo {} > {base}/{node}",
                frequency.cpu_freq_khz
            )));
        }
    }
    for core in &frequency.cpu_cores {
        commands.push(BridgeCommand::shell(format!(
            "echo {} > /sys/devices/system/cpu/cpu{core}/cpufreq/scaling_governor",
            frequency.cpu_governor
        )));
    }
    for core in &frequency.offline_cores {
        commands.push(BridgeCommand::shell(format!(
            "echo 0 > /sys/devices/system/cpu/cpu{core}/online"
        )));
    }
    if !frequency.gpu_devfreq.trim().is_empty() {
        let base = format!("/sys/class/devfreq/{}", frequency.gpu_devfreq.trim());
        for node in ["max_freq", "min_freq", "max_freq"] {
            commands.push(BridgeCommand::shell(format!(
                "echo {} > {base}/{node}",
                frequency.gpu_freq_hz
            )));
        }
    }
    commands
}

fn run_sequence(
    bridge: &dyn DeviceBridge,
    commands: &[BridgeCommand],
    capture: bool,
    trace_id: &str,
) -> Result<(), AppError> {
    for command in commands {
        if capture {
            bridge.execute_capture(command, trace_id)?;
        } else {
            bridge.execute(command, trace_id)?;
        }
    }
    Ok(())
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

pub fn remount(bridge: &dyn DeviceBridge, trace_id: &str) -> Result<(), AppError> {
    run_sequence(bridge, &remount_commands(), true, trace_id)
}

pub fn start_uitest(bridge: &dyn DeviceBridge, wait: Duration, trace_id: &str) -> Result<(), AppError> {
    run_sequence(bridge, &uitest_commands(), false, trace_id)?;
    info!(trace_id = %trace_id, wait_secs = wait.as_secs(), "waiting for device reboot");
    pause(wait);
    Ok(())
}

pub fn unlock(
    bridge: &dyn DeviceBridge,
    settings: &UnlockSettings,
    settle: Duration,
    trace_id: &str,
) -> Result<(), AppError> {
    run_sequence(bridge, &unlock_commands(settings), false, trace_id)?;
    pause(settle);
    Ok(())
}

pub fn reboot_and_unlock(bridge: &dyn DeviceBridge, config: &BenchConfig, trace_id: &str) -> Result<(), AppError> {
    start_uitest(bridge, config.wait(), trace_id)?;
    unlock(bridge, &config.unlock, config.pacing.unlock(), trace_id)
}

pub fn set_hilog(bridge: &dyn DeviceBridge, trace_id: &str) -> Result<(), AppError> {
    run_sequence(bridge, &hilog_setup_commands(), true, trace_id)
}

pub fn delete_hilog(bridge: &dyn DeviceBridge, trace_id: &str) -> Result<(), AppError> {
    bridge.execute_capture(&delete_hilog_command(), trace_id)?;
    Ok(())
}

pub fn clear_soc_perf(bridge: &dyn DeviceBridge, config: &BenchConfig, trace_id: &str) -> Result<(), AppError> {
    if !config.clear_soc_perf {
        return Ok(());
    }
    for command in soc_perf_clear_commands(&config.work_dir) {
        let is_reboot = command == BridgeCommand::shell("reboot");
        bridge.execute_capture(&command, trace_id)?;
        if is_reboot {
            pause(config.wait());
            unlock(bridge, &config.unlock, config.pacing.unlock(), trace_id)?;
        }
    }
    Ok(())
}

pub fn lock_core_frequency(bridge: &dyn DeviceBridge, config: &BenchConfig, trace_id: &str) -> Result<(), AppError> {
    info!(
        trace_id = %trace_id,
        cores = ?config.frequency.cpu_cores,
        cpu_freq_khz = config.frequency.cpu_freq_khz,
        offline = ?config.frequency.offline_cores,
        gpu_freq_hz = config.frequency.gpu_freq_hz,
        "locking cpu/gpu frequency"
    );
    clear_soc_perf(bridge, config, trace_id)?;
    run_sequence(bridge, &frequency_lock_commands(&config.frequency), true, trace_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::bridge::fake::RecordingBridge;
    use crate::app::config::PacingSettings;

    fn quick_config() -> BenchConfig {
        BenchConfig {
            wait_time: 0,
            pacing: PacingSettings::immediate(),
            ..BenchConfig::default()
        }
    }

    #[test]
    fn default_frequency_lock_sequence() {
        let commands = frequency_lock_commands(&FrequencySettings::default());
        // 4 cores * 3 freq writes + 4 governors + 3 offline + 3 gpu writes
        assert_eq!(commands.len(), 22);
        assert_eq!(
            commands[0],
            BridgeCommand::shell("echo 1992000 > /sys/devices/system/cpu/cpu0/cpufreq/scaling_max_freq")
        );
        assert_eq!(
            commands[1],
            BridgeCommand::shell("echo 1992000 > /sys/devices/system/cpu/cpu0/cpufreq/scaling_min_freq")
        );
        assert_eq!(
            commands[12],
            BridgeCommand::shell("echo performance > /sys/devices/system/cpu/cpu0/cpufreq/scaling_governor")
        );
        assert_eq!(
            commands[16],
            BridgeCommand::shell("echo 0 > /sys/devices/system/cpu/cpu1/online")
        );
        assert_eq!(
            commands[21],
            BridgeCommand::shell("echo 800000000 > /sys/class/devfreq/fde60000.gpu/max_freq")
        );
    }

    #[test]
    fn unlock_swipes_with_configured_geometry() {
        let commands = unlock_commands(&UnlockSettings::default());
        assert_eq!(commands[0], BridgeCommand::shell("power-shell wakeup"));
        assert_eq!(commands[1], BridgeCommand::shell("uinput -T -m 350 1000 350 600 200"));
        assert_eq!(commands.len(), 4);
    }

    #[test]
    fn reboot_and_unlock_runs_uitest_then_unlock_in_order() {
        let bridge = RecordingBridge::new();
        reboot_and_unlock(&bridge, &quick_config(), "t").expect("reboot");
        let lines = bridge.lines();
        assert_eq!(
            lines,
            vec![
                "shell mount -o remount,rw /",
                "shell param set persist.ace.testmode.enabled 1",
                "shell param set persist.ace.debug.enabled 1",
                "shell reboot",
                "shell power-shell wakeup",
                "shell uinput -T -m 350 1000 350 600 200",
                "shell power-shell setmode 602",
                "shell power-shell display -s 50",
            ]
        );
    }

    #[test]
    fn soc_perf_is_skipped_unless_enabled() {
        let bridge = RecordingBridge::new();
        lock_core_frequency(&bridge, &quick_config(), "t").expect("lock");
        assert!(!bridge.lines().iter().any(|line| line.contains("soc_perf")));
        assert_eq!(bridge.lines().len(), 22);

        let bridge = RecordingBridge::new();
        let config = BenchConfig {
            clear_soc_perf: true,
            ..quick_config()
        };
        lock_core_frequency(&bridge, &config, "t").expect("lock");
        let lines = bridge.lines();
        assert_eq!(lines[2], "file recv /vendor/etc/soc_perf .");
        assert_eq!(lines[3], "shell truncate -s 0 /vendor/etc/soc_perf/*.xml");
        assert_eq!(lines[4], "shell reboot");
        assert_eq!(lines[5], "shell power-shell wakeup");
        assert_eq!(lines.len(), 5 + 4 + 22);
    }

    #[test]
    fn hilog_routines() {
        let bridge = RecordingBridge::new();
        set_hilog(&bridge, "t").expect("set");
        delete_hilog(&bridge, "t").expect("delete");
        let lines = bridge.lines();
        assert_eq!(lines.first().map(String::as_str), Some("shell hilog -r"));
        assert_eq!(lines.last().map(String::as_str), Some("shell rm -rf /data/log/hilog/*"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn bridge_failure_stops_the_sequence() {
        let bridge = RecordingBridge::new().fail_on("hilog -G");
        let err = set_hilog(&bridge, "trace-f").unwrap_err();
        assert_eq!(err.trace_id, "trace-f");
        assert_eq!(bridge.lines().len(), 3);
    }
}
