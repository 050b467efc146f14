use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use tracing::info;

use crate::app::error::AppError;

pub const API_NAME_COLUMN: &str = "api name";

pub fn status_column(mode: &str) -> String {
    format!("{mode} test status")
}

fn find_column(header: &[String], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|cell| cell.trim().eq_ignore_ascii_case(name))
}

/// API names end up inside device shell lines, so only identifier characters are allowed.
pub fn validate_api_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("api name is required".to_string());
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(format!("api name '{name}' contains invalid character {bad:?}"));
    }
    Ok(())
}

/// APIs marked `yes` for `mode`, in sheet order. The first row is the header.
pub fn select_apis(rows: &[Vec<String>], mode: &str) -> Result<Vec<String>, String> {
    let header = rows.first().ok_or_else(|| "api list sheet is empty".to_string())?;
    let status_name = status_column(mode);
    let api_col = find_column(header, API_NAME_COLUMN)
        .ok_or_else(|| format!("missing '{API_NAME_COLUMN}' column"))?;
    let status_col = find_column(header, &status_name)
        .ok_or_else(|| format!("missing '{status_name}' column"))?;

    let mut selected = Vec::new();
    for (index, row) in rows.iter().enumerate().skip(1) {
        let api = row.get(api_col).map(|cell| cell.trim()).unwrap_or_default();
        if api.is_empty() {
            continue;
        }
        let status = row.get(status_col).map(|cell| cell.trim()).unwrap_or_default();
        if status.eq_ignore_ascii_case("yes") {
            validate_api_name(api).map_err(|message| format!("row {}: {message}", index + 1))?;
            selected.push(api.to_string());
        }
    }
    Ok(selected)
}

pub fn read_api_list(path: &Path, sheet: &str, mode: &str, trace_id: &str) -> Result<Vec<String>, AppError> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|err| {
        AppError::io(format!("Failed to open api list {}: {err}", path.display()), trace_id)
    })?;
    let range = workbook.worksheet_range(sheet).map_err(|err| {
        AppError::validation(format!("Failed to read sheet '{sheet}': {err}"), trace_id)
    })?;
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    let apis = select_apis(&rows, mode).map_err(|message| AppError::validation(message, trace_id))?;
    info!(trace_id = %trace_id, count = apis.len(), apis = ?apis, "test api list");
    Ok(apis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn selects_yes_rows_for_mode() {
        let sheet = rows(&[
            &["id", "api name", "drawing test status", "skia test status"],
            &["1", "OH_Drawing_CanvasDrawRect", "yes", "no"],
            &["2", "OH_Drawing_CanvasDrawLine", "no", "yes"],
            &["3", "OH_Drawing_CanvasDrawPath", " YES ", "yes"],
            &["4", "", "yes", "yes"],
        ]);
        assert_eq!(
            select_apis(&sheet, "drawing").expect("apis"),
            vec!["OH_Drawing_CanvasDrawRect", "OH_Drawing_CanvasDrawPath"]
        );
        assert_eq!(
            select_apis(&sheet, "skia").expect("apis"),
            vec!["OH_Drawing_CanvasDrawLine", "OH_Drawing_CanvasDrawPath"]
        );
    }

    #[test]
    fn blank_api_names_are_skipped() {
        let sheet = rows(&[
            &["api name", "drawing test status"],
            &["", "yes"],
            &["   ", "yes"],
            &["OH_Drawing_CanvasDrawRect", "yes"],
        ]);
        assert_eq!(select_apis(&sheet, "drawing").expect("apis"), vec!["OH_Drawing_CanvasDrawRect"]);
    }

    #[test]
    fn shell_unsafe_api_names_are_rejected() {
        for name in ["DrawRect; reboot", "Draw Rect", "$(id)", "a|b", "x`y`"] {
            let sheet = rows(&[&["api name", "drawing test status"], &[name, "yes"]]);
            let err = select_apis(&sheet, "drawing").unwrap_err();
            assert!(err.starts_with("row 2:"), "{err}");
        }
        // unselected rows never reach the device
        let sheet = rows(&[&["api name", "drawing test status"], &["rm -rf /", "no"]]);
        assert!(select_apis(&sheet, "drawing").expect("apis").is_empty());
        assert!(validate_api_name("OH_Drawing_FontSetTextSize.v2-b").is_ok());
    }

    #[test]
    fn missing_columns_are_reported() {
        let sheet = rows(&[&["api name"], &["x"]]);
        assert!(select_apis(&sheet, "drawing").unwrap_err().contains("drawing test status"));
        assert!(select_apis(&[], "drawing").is_err());
    }

    #[test]
    fn reads_input_workbook() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("oh_drawing_api.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("oh_drawing_api").expect("name");
        sheet.write_row(0, 0, ["api name", "drawing test status"]).expect("header");
        sheet.write_row(1, 0, ["OH_Drawing_CanvasDrawRect", "yes"]).expect("row");
        sheet.write_row(2, 0, ["OH_Drawing_CanvasDrawLine", "no"]).expect("row");
        workbook.save(&path).expect("save");

        let apis = read_api_list(&path, "oh_drawing_api", "drawing", "t").expect("apis");
        assert_eq!(apis, vec!["OH_Drawing_CanvasDrawRect"]);

        let err = read_api_list(&path, "missing", "drawing", "t").unwrap_err();
        assert_eq!(err.code, "ERR_VALIDATION");
    }
}
