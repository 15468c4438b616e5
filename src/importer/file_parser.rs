// ==========================================
// 订单导入系统 - 文件解析器实现
// ==========================================
// 阶段 0: 文件读取与解析
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 表头 + 行记录（列名 → CellValue），空行跳过
// ==========================================

use crate::domain::order::{RawRow, RawSheet};
use crate::domain::types::CellValue;
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::order_import_trait::FileParser;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::debug;

fn ensure_exists(path: &Path) -> ImporterResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn is_blank(row: &RawRow) -> bool {
    row.values().all(CellValue::is_empty)
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_sheet(&self, file_path: &Path) -> ImporterResult<RawSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if !ext.is_empty() && ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row = RawRow::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    let value = value.trim();
                    let cell = if value.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(value.to_string())
                    };
                    row.insert(header.clone(), cell);
                }
            }

            if is_blank(&row) {
                continue;
            }
            rows.push(row);
        }

        debug!(file = %file_path.display(), rows = rows.len(), "CSV 解析完成");

        Ok(RawSheet {
            file_name: file_name_of(file_path),
            headers,
            rows,
        })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

/// calamine 单元格 → CellValue（日期单元格保留序列号，交给日期转换处理）
fn cell_value_from(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            let s = s.trim();
            if s.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.to_string())
            }
        }
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::Error(_) => CellValue::Empty,
    }
}

impl FileParser for ExcelParser {
    fn parse_sheet(&self, file_path: &Path) -> ImporterResult<RawSheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let mut range_rows = range.rows();
        let header_row = range_rows
            .next()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无数据行".to_string()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for data_row in range_rows {
            let mut row = RawRow::new();

            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    if header.is_empty() {
                        continue;
                    }
                    row.insert(header.clone(), cell_value_from(cell));
                }
            }

            if is_blank(&row) {
                continue;
            }
            rows.push(row);
        }

        debug!(file = %file_path.display(), sheet = %sheet_name, rows = rows.len(), "Excel 解析完成");

        Ok(RawSheet {
            file_name: file_name_of(file_path),
            headers,
            rows,
        })
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImporterResult<RawSheet> {
        let path = file_path.as_ref();
        ensure_exists(path)?;

        match extension_of(path).as_str() {
            "csv" => CsvParser.parse_sheet(path),
            "xlsx" | "xls" => ExcelParser.parse_sheet(path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}
