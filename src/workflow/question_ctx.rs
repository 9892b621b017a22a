//! 题目处理上下文
//!
//! 封装"我正在处理哪个会话、哪张工作表的第几题"这一信息

use std::fmt::Display;

/// 题目处理上下文
///
/// 包含处理单个题目所需的所有上下文信息
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 会话ID
    pub session_id: String,

    /// 用户ID
    pub user_id: String,

    /// 工作表名
    pub sheet: String,

    /// 相对起始行的偏移
    pub row: u32,

    /// 题目在本次批量中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次批量的题目总数
    pub total: usize,
}

impl QuestionCtx {
    /// 创建新的题目上下文
    pub fn new(
        session_id: String,
        user_id: String,
        sheet: String,
        row: u32,
        index: usize,
        total: usize,
    ) -> Self {
        Self {
            session_id,
            user_id,
            sheet,
            row,
            index,
            total,
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[会话 {} 工作表#{} 行#{} 题目 {}/{}]",
            self.session_id, self.sheet, self.row, self.index, self.total
        )
    }
}
