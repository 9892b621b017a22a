use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// 批量问卷会话的类型标签
pub const BATCH_SESSION_KIND: &str = "rfp";
/// 自由对话会话的类型标签
pub const CHAT_SESSION_KIND: &str = "chatbot";

/// 生成复合排序键 `类型#会话ID`
pub fn compound_key(kind: &str, session_id: &str) -> String {
    format!("{}#{}", kind, session_id)
}

/// 按用户查询时使用的类型前缀
pub fn kind_prefix(kind: &str) -> String {
    format!("{}#", kind)
}

/// 会话记录
///
/// 存储主键为 (UserId, SessionType)，其中 SessionType 是 `类型#会话ID`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Session {
    pub user_id: String,
    /// 复合键 `类型#会话ID`
    pub session_type: String,
    pub session_id: String,
    #[serde(default)]
    pub session_title: String,
    /// 上传的源文件对象键（仅批量模式）
    #[serde(rename = "S3ObjectKey", default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, kind: &str, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self {
            user_id: user_id.into(),
            session_type: compound_key(kind, &session_id),
            session_id,
            session_title: String::new(),
            source_key: None,
            start_time: Utc::now(),
            history: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.session_title = title.into();
        self
    }

    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// 复合键中的类型部分
    pub fn kind(&self) -> &str {
        self.session_type
            .split_once('#')
            .map(|(kind, _)| kind)
            .unwrap_or(&self.session_type)
    }

    /// 会话标题；对话模式下取第一条历史消息
    pub fn display_title(&self) -> String {
        if !self.session_title.is_empty() {
            return self.session_title.clone();
        }
        self.history
            .first()
            .map(|entry| entry.content.clone())
            .unwrap_or_else(|| "<no title>".to_string())
    }
}

/// 对话历史中的一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// `human` 或 `ai`
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl HistoryEntry {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            kind: "human".to_string(),
            content: content.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn ai(content: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            kind: "ai".to_string(),
            content: content.into(),
            metadata,
        }
    }
}

/// 会话详情：批量会话附带全部题目
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: String,
    pub title: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
}

impl SessionDetail {
    pub fn from_session(session: Session, questions: Option<Vec<Question>>) -> Self {
        Self {
            id: session.session_id.clone(),
            title: session.display_title(),
            start_time: format!(
                "{}Z",
                session.start_time.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f")
            ),
            source_key: session.source_key,
            history: session.history,
            questions,
        }
    }
}

/// 删除会话的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}
