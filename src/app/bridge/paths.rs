use std::path::{Path, PathBuf};

pub const DEVICE_TMP_DIR: &str = "/data/local/tmp";
pub const DEVICE_HILOG_DIR: &str = "/data/log/hilog";

pub fn sanitize_filename_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Final component of a host path, as it will be named once pushed to the device.
pub fn host_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

pub fn device_tmp_path(file_name: &str) -> String {
    format!("{DEVICE_TMP_DIR}/{file_name}")
}

pub fn device_hilog_path(file_name: &str) -> String {
    format!("{DEVICE_HILOG_DIR}/{file_name}")
}

pub fn mode_report_dir(work_dir: &Path, mode: &str) -> PathBuf {
    work_dir.join("reports").join(sanitize_filename_component(mode))
}

pub fn api_report_dir(work_dir: &Path, mode: &str, api_name: &str) -> PathBuf {
    mode_report_dir(work_dir, mode).join(sanitize_filename_component(api_name))
}

/// `{mode}_{api}_{run}` with a 1-based run index.
pub fn run_artifact_name(mode: &str, api_name: &str, run_index: usize) -> String {
    format!(
        "{}_{}_{}",
        sanitize_filename_component(mode),
        sanitize_filename_component(api_name),
        run_index + 1
    )
}
