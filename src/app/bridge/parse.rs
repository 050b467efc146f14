/// Device ids from `hdc list targets`; the bridge prints `[Empty]` when nothing is attached.
pub fn parse_list_targets(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.eq_ignore_ascii_case("[empty]"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Newest hilog file whose name contains `api_name`. Hilog names carry an increasing
/// sequence and timestamp, so the lexically greatest match is the newest.
pub fn pick_hilog_file(ls_output: &str, api_name: &str) -> Option<String> {
    if api_name.trim().is_empty() {
        return None;
    }
    ls_output
        .split_whitespace()
        .filter(|name| name.contains(api_name))
        .max()
        .map(str::to_string)
}

/// Pid of the first `ps -ef` row mentioning `name`, skipping the grep itself.
pub fn parse_pid(ps_output: &str, name: &str) -> Option<u32> {
    ps_output
        .lines()
        .filter(|line| line.contains(name))
        .filter(|line| !line.contains("grep "))
        .find_map(|line| line.split_whitespace().nth(1)?.parse::<u32>().ok())
}
