//! 表格拆解 - 业务能力层
//!
//! 把上传的工作簿拆成按工作表、按行排列的问题列表。
//! 纯转换，不做任何 IO。

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::question::{QueryItem, SheetQueries, WorkbookQueries};

/// 表格读取器
///
/// `query_start_row` 和 `query_column` 均从 0 开始。
/// 产出的 `row` 是相对 `query_start_row` 的偏移，空行留下的缺口会保留。
#[derive(Debug, Clone, Copy)]
pub struct SheetReader {
    query_start_row: u32,
    query_column: u32,
}

impl SheetReader {
    pub fn new(query_start_row: u32, query_column: u32) -> Self {
        Self {
            query_start_row,
            query_column,
        }
    }

    /// 读取所有工作表中的问题
    pub fn read(&self, bytes: &[u8]) -> AppResult<WorkbookQueries> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| AppError::Format(format!("无法打开工作簿: {}", e)))?;

        let mut sheets = Vec::new();
        for sheet_name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(|e| AppError::Format(format!("无法读取工作表 {}: {}", sheet_name, e)))?;

            let mut items = Vec::new();
            if let Some((last_row, _)) = range.end() {
                for row in self.query_start_row..=last_row {
                    let query = range
                        .get_value((row, self.query_column))
                        .and_then(cell_text);
                    if let Some(query) = query {
                        items.push(QueryItem {
                            row: row - self.query_start_row,
                            query,
                        });
                    }
                }
            }

            debug!("工作表 {}: {} 个问题", sheet_name, items.len());
            sheets.push(SheetQueries {
                sheet: sheet_name,
                column: self.query_column,
                items,
            });
        }

        Ok(WorkbookQueries { sheets })
    }
}

/// 单元格文本；空白单元格返回 `None`
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}
