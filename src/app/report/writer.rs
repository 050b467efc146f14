use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatPattern, Workbook, XlsxError};
use tracing::info;

use crate::app::error::AppError;
use crate::app::models::{TestRunRecord, RESULT_HEADER};

pub const HEADER_FILL: u32 = 0x99CCFF;
pub const FONT_NAME: &str = "Microsoft YaHei";
pub const FONT_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStyle {
    pub fill: Option<u32>,
    pub bold: bool,
    pub font_size: f64,
    pub centered: bool,
}

/// Column widths and per-cell styles for the whole sheet, header row first.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub column_widths: Vec<f64>,
    pub styles: Vec<Vec<CellStyle>>,
}

impl SheetLayout {
    pub fn row_count(&self) -> usize {
        self.styles.len()
    }
}

/// Workbook of per-run and average rows. Every write re-renders and re-saves the whole sheet.
pub struct ResultWriter {
    path: PathBuf,
    jsonl_path: PathBuf,
    sheet_name: String,
    rows: Vec<TestRunRecord>,
}

impl ResultWriter {
    pub fn create(path: &Path, sheet_name: &str, trace_id: &str) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::io(format!("Failed to create {}: {err}", parent.display()), trace_id)
            })?;
        }
        if path.exists() {
            fs::remove_file(path).map_err(|err| {
                AppError::io(format!("Failed to remove {}: {err}", path.display()), trace_id)
            })?;
        }
        let writer = Self {
            path: path.to_path_buf(),
            jsonl_path: path.with_extension("jsonl"),
            sheet_name: sheet_name.to_string(),
            rows: Vec::new(),
        };
        fs::write(&writer.jsonl_path, b"").map_err(|err| {
            AppError::io(format!("Failed to create {}: {err}", writer.jsonl_path.display()), trace_id)
        })?;
        writer.save(trace_id)?;
        info!(trace_id = %trace_id, path = %path.display(), "result workbook created");
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    pub fn records(&self) -> &[TestRunRecord] {
        &self.rows
    }

    pub fn write_records(&mut self, records: &[TestRunRecord], trace_id: &str) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }
        self.append_jsonl(records, trace_id)?;
        self.rows.extend_from_slice(records);
        self.save(trace_id)?;
        info!(
            trace_id = %trace_id,
            written = records.len(),
            total = self.rows.len(),
            "results written"
        );
        Ok(())
    }

    fn append_jsonl(&self, records: &[TestRunRecord], trace_id: &str) -> Result<(), AppError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.jsonl_path)
            .map_err(|err| AppError::io(format!("Failed to open {}: {err}", self.jsonl_path.display()), trace_id))?;
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|err| AppError::system(format!("Failed to serialize record: {err}"), trace_id))?;
            writeln!(file, "{line}")
                .map_err(|err| AppError::io(format!("Failed to append record: {err}"), trace_id))?;
        }
        Ok(())
    }

    pub fn layout(&self) -> SheetLayout {
        let mut column_widths: Vec<f64> = RESULT_HEADER.iter().map(|h| h.chars().count() as f64).collect();
        for record in &self.rows {
            for (index, cell) in record.cells().iter().enumerate() {
                let len = cell.chars().count() as f64;
                if len > column_widths[index] {
                    column_widths[index] = len;
                }
            }
        }
        let column_widths = column_widths.into_iter().map(|width| width + 2.0).collect();

        let header = CellStyle {
            fill: Some(HEADER_FILL),
            bold: true,
            font_size: FONT_SIZE,
            centered: true,
        };
        let body = CellStyle {
            fill: None,
            bold: false,
            ..header
        };
        let mut styles = vec![vec![header; RESULT_HEADER.len()]];
        styles.extend(self.rows.iter().map(|_| vec![body; RESULT_HEADER.len()]));

        SheetLayout { column_widths, styles }
    }

    fn save(&self, trace_id: &str) -> Result<(), AppError> {
        self.render()
            .map_err(|err| AppError::io(format!("Failed to save {}: {err}", self.path.display()), trace_id))
    }

    fn render(&self) -> Result<(), XlsxError> {
        let layout = self.layout();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name)?;

        let header_format = to_format(&layout.styles[0][0]);
        for (col, title) in RESULT_HEADER.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        }
        for (index, record) in self.rows.iter().enumerate() {
            let row = (index + 1) as u32;
            let format = to_format(&layout.styles[index + 1][0]);
            sheet.write_string_with_format(row, 0, &record.api_name, &format)?;
            let numbers = [record.api_time, record.total_count, record.instructions, record.cycles];
            for (offset, value) in numbers.into_iter().enumerate() {
                sheet.write_number_with_format(row, (offset + 1) as u16, value, &format)?;
            }
        }
        for (col, width) in layout.column_widths.iter().enumerate() {
            sheet.set_column_width(col as u16, *width)?;
        }
        workbook.save(&self.path)?;
        Ok(())
    }
}

fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new()
        .set_font_name(FONT_NAME)
        .set_font_size(style.font_size);
    if style.bold {
        format = format.set_bold();
    }
    if style.centered {
        format = format
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
    }
    if let Some(fill) = style.fill {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(fill));
    }
    format
}
