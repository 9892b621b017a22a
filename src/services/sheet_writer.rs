//! 表格回填 - 业务能力层
//!
//! 在源工作簿上原地修改：只把每道题的答案写到问题单元格右侧一列，
//! 公式、数字格式、样式、列宽与合并单元格都保持原样。
//! 人工反馈非空时优先于生成答案。

use std::io::Cursor;
use tracing::{debug, warn};
use umya_spreadsheet::{reader, writer};

use crate::error::{AppError, AppResult};
use crate::models::question::{group_by_sheet, Question};

/// 回填结果
#[derive(Debug, Clone)]
pub struct AssembledWorkbook {
    pub bytes: Vec<u8>,
    /// 实际写入的答案数量
    pub answers_written: usize,
    /// 工作表在源文件中不存在而被跳过的题目数量
    pub orphaned: usize,
}

/// 表格回填器，参数与 `SheetReader` 保持一致
#[derive(Debug, Clone, Copy)]
pub struct SheetWriter {
    query_start_row: u32,
    /// 答案列（从 0 开始）
    response_column: u32,
}

impl SheetWriter {
    pub fn new(query_start_row: u32, query_column: u32) -> AppResult<Self> {
        let response_column = query_column
            .checked_add(1)
            .ok_or_else(|| AppError::Format(format!("答案列超出范围: {}", query_column)))?;
        Ok(Self {
            query_start_row,
            response_column,
        })
    }

    /// 读入源工作簿，只改写答案单元格后重新保存
    pub fn write(&self, source: &[u8], questions: &[Question]) -> AppResult<AssembledWorkbook> {
        let mut book = reader::xlsx::read_reader(Cursor::new(source.to_vec()), true)
            .map_err(|e| AppError::Format(format!("无法打开源工作簿: {}", e)))?;

        let groups = group_by_sheet(questions);
        let mut answers_written = 0usize;
        let mut orphaned = 0usize;

        for (sheet_name, sheet_questions) in &groups {
            let Some(worksheet) = book.get_sheet_by_name_mut(sheet_name) else {
                warn!("⚠️ 源工作簿中没有工作表 {}，跳过 {} 道题目", sheet_name, sheet_questions.len());
                orphaned += sheet_questions.len();
                continue;
            };

            for question in sheet_questions {
                let response = question.effective_response();
                if response.is_empty() {
                    continue;
                }
                // 坐标从 1 开始，顺序为 (列, 行)
                let row = question.row + self.query_start_row + 1;
                let col = self.response_column + 1;
                worksheet.get_cell_mut((col, row)).set_value_string(response);
                answers_written += 1;
            }
        }

        let mut output = Cursor::new(Vec::new());
        writer::xlsx::write_writer(&book, &mut output)
            .map_err(|e| AppError::Format(format!("保存工作簿失败: {}", e)))?;
        debug!("回填完成: 写入 {} 个答案, 跳过 {} 道题目", answers_written, orphaned);

        Ok(AssembledWorkbook {
            bytes: output.into_inner(),
            answers_written,
            orphaned,
        })
    }
}
