//! 队列消息
//!
//! 外层信封 `{"Message": "<json字符串>"}`，内层为 `{action, userId, data}`。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};

/// 队列中的一条原始记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub message_id: String,
    pub body: String,
}

impl QueueRecord {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
        }
    }

    /// 用内层消息构造一条带信封的记录
    pub fn wrap(message_id: impl Into<String>, detail: &JsonValue) -> Self {
        let envelope = serde_json::json!({ "Message": detail.to_string() });
        Self::new(message_id, envelope.to_string())
    }
}

/// 一批队列记录
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records")]
    pub records: Vec<QueueRecord>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Message")]
    message: String,
}

/// 消息动作
pub const ACTION_RUN: &str = "run";
pub const ACTION_HEARTBEAT: &str = "heartbeat";

/// 解码后的内层消息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub action: String,
    pub user_id: String,
    #[serde(default)]
    pub data: JsonValue,
}

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `run` 且没有附件：对话模式
    SimpleRun,
    /// `run` 且带附件：批量问卷
    BatchRun,
    Heartbeat,
    /// 其他动作，不做处理
    Unknown,
}

impl InboundMessage {
    /// 拆开外层信封并解析内层消息
    pub fn decode(body: &str) -> AppResult<Self> {
        let envelope: Envelope = serde_json::from_str(body)
            .map_err(|e| AppError::MalformedMessage(format!("外层信封: {}", e)))?;
        serde_json::from_str(&envelope.message)
            .map_err(|e| AppError::MalformedMessage(format!("内层消息: {}", e)))
    }

    pub fn classify(&self) -> MessageKind {
        match self.action.as_str() {
            ACTION_RUN if self.has_files() => MessageKind::BatchRun,
            ACTION_RUN => MessageKind::SimpleRun,
            ACTION_HEARTBEAT => MessageKind::Heartbeat,
            _ => MessageKind::Unknown,
        }
    }

    fn has_files(&self) -> bool {
        self.data
            .get("files")
            .and_then(|files| files.as_array())
            .is_some_and(|files| !files.is_empty())
    }

    /// 消息中携带的会话ID（空字符串视为没有）
    pub fn session_id(&self) -> Option<&str> {
        self.data
            .get("sessionId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// 负载里没有会话ID时生成一个写回负载，返回这条消息最终使用的会话ID
    ///
    /// 负载不是 JSON 对象时无法写回，返回 `None`。
    pub fn ensure_session_id(&mut self) -> Option<String> {
        if let Some(existing) = self.session_id() {
            return Some(existing.to_string());
        }
        let data = self.data.as_object_mut()?;
        let minted = uuid::Uuid::new_v4().to_string();
        data.insert("sessionId".to_string(), JsonValue::String(minted.clone()));
        Some(minted)
    }

    /// 解析 `run` 动作的负载
    pub fn run_data(&self) -> AppResult<RunData> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| AppError::MalformedMessage(format!("run 负载: {}", e)))
    }
}

/// `run` 动作的负载
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub provider: String,
    pub model_name: String,
    #[serde(default)]
    pub mode: String,
    /// 对话模式下是用户输入，批量模式下作为会话标题
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub model_kwargs: JsonValue,
}

impl RunData {
    /// 已有会话ID则沿用，否则新生成
    pub fn resolve_session_id(&self) -> String {
        self.session_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

/// 上传文件引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub key: String,
}

/// 从原始消息体中尽力恢复 (userId, sessionId)，用于失败上报
pub fn recover_identity(body: &str) -> (String, String) {
    let detail: Option<JsonValue> = serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|envelope| serde_json::from_str(&envelope.message).ok());

    let user_id = detail
        .as_ref()
        .and_then(|d| d.get("userId"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let session_id = detail
        .as_ref()
        .and_then(|d| d.get("data"))
        .and_then(|d| d.get("sessionId"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    (user_id, session_id)
}
