use serde::{Deserialize, Serialize};

/// 题目记录：表格中的一行问题
///
/// 存储主键为 (QuestionId, SessionId)，另有以 SessionId 为键的二级索引。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Question {
    pub question_id: String,
    pub session_id: String,
    pub sheet: String,
    /// 相对起始行的偏移
    pub row: u32,
    pub query: String,
    #[serde(default)]
    pub generated_response: String,
    #[serde(default)]
    pub feedback_response: String,
}

impl Question {
    /// 新建题目，答案字段为空
    ///
    /// 题目ID由 (会话ID, 工作表, 行) 确定，同一消息重复投递时会覆盖原记录。
    pub fn new(
        session_id: impl Into<String>,
        sheet: impl Into<String>,
        row: u32,
        query: impl Into<String>,
    ) -> Self {
        let session_id = session_id.into();
        let sheet = sheet.into();
        Self {
            question_id: question_id_for(&session_id, &sheet, row),
            session_id,
            sheet,
            row,
            query: query.into(),
            generated_response: String::new(),
            feedback_response: String::new(),
        }
    }

    /// 导出时写入的答案：人工反馈优先于生成答案
    pub fn effective_response(&self) -> &str {
        if self.feedback_response.is_empty() {
            &self.generated_response
        } else {
            &self.feedback_response
        }
    }
}

/// 单元格对应的稳定题目ID
pub fn question_id_for(session_id: &str, sheet: &str, row: u32) -> String {
    let session_ns = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, session_id.as_bytes());
    // 工作表名可含任意字符，带上长度避免拼接歧义
    let name = format!("{}:{}#{}", sheet.len(), sheet, row);
    uuid::Uuid::new_v5(&session_ns, name.as_bytes()).to_string()
}

/// 单行问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryItem {
    /// 相对起始行的偏移
    pub row: u32,
    pub query: String,
}

/// 单个工作表中的全部问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetQueries {
    pub sheet: String,
    pub column: u32,
    pub items: Vec<QueryItem>,
}

/// 整个工作簿的问题列表，工作表顺序与行顺序都有意义
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookQueries {
    pub sheets: Vec<SheetQueries>,
}

impl WorkbookQueries {
    pub fn total_items(&self) -> usize {
        self.sheets.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}

/// `QUESTIONS` 事件中单个工作表的已持久化题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSheet {
    pub session_id: String,
    pub sheet: String,
    #[serde(rename = "colno")]
    pub column: u32,
    #[serde(rename = "sessiontitle")]
    pub session_title: String,
    #[serde(rename = "startrowno")]
    pub start_row: u32,
    pub queries: Vec<Question>,
}

/// 按工作表分组题目：保持首次出现的工作表顺序，表内按行排序
pub fn group_by_sheet(questions: &[Question]) -> Vec<(String, Vec<&Question>)> {
    let mut groups: Vec<(String, Vec<&Question>)> = Vec::new();
    for question in questions {
        match groups.iter_mut().find(|(sheet, _)| *sheet == question.sheet) {
            Some((_, items)) => items.push(question),
            None => groups.push((question.sheet.clone(), vec![question])),
        }
    }
    for (_, items) in groups.iter_mut() {
        items.sort_by_key(|q| q.row);
    }
    groups
}
