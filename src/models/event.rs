//! 推送给客户端的进度事件

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::models::question::{Question, QuestionSheet};

/// 事件动作名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventAction {
    #[serde(rename = "STARTED")]
    Started,
    #[serde(rename = "QUESTIONS")]
    Questions,
    #[serde(rename = "ANSWER")]
    Answer,
    #[serde(rename = "FINAL_RESPONSE")]
    FinalResponse,
    #[serde(rename = "HEARTBEAT")]
    Heartbeat,
    #[serde(rename = "LLM_NEW_TOKEN")]
    LlmNewToken,
    #[serde(rename = "error")]
    Error,
}

/// 进度事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: EventAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub user_id: String,
    pub timestamp: String,
    pub data: JsonValue,
}

impl ProgressEvent {
    fn new(action: EventAction, user_id: &str, data: JsonValue) -> Self {
        Self {
            kind: "text".to_string(),
            action,
            direction: None,
            user_id: user_id.to_string(),
            timestamp: chrono::Utc::now().timestamp().to_string(),
            data,
        }
    }

    pub fn started(user_id: &str, session_id: &str) -> Self {
        Self::new(
            EventAction::Started,
            user_id,
            json!({ "sessionId": session_id, "type": "text", "content": "process started" }),
        )
    }

    pub fn questions(user_id: &str, session_id: &str, sheets: &[QuestionSheet]) -> Self {
        Self::new(
            EventAction::Questions,
            user_id,
            json!({ "sessionId": session_id, "type": "text", "content": sheets }),
        )
    }

    pub fn answer(user_id: &str, question: &Question, answer: &str) -> Self {
        Self::new(
            EventAction::Answer,
            user_id,
            json!({
                "sessionId": question.session_id,
                "type": "text",
                "content": answer,
                "QuestionId": question.question_id,
                "sheet": question.sheet,
            }),
        )
    }

    pub fn final_response(user_id: &str, session_id: &str, content: &str) -> Self {
        Self::new(
            EventAction::FinalResponse,
            user_id,
            json!({ "sessionId": session_id, "type": "text", "content": content }),
        )
    }

    pub fn heartbeat(user_id: &str, session_id: &str) -> Self {
        Self::new(EventAction::Heartbeat, user_id, json!({ "sessionId": session_id }))
    }

    pub fn token(
        user_id: &str,
        session_id: &str,
        run_id: &str,
        sequence: u64,
        value: &str,
    ) -> Self {
        Self::new(
            EventAction::LlmNewToken,
            user_id,
            json!({
                "sessionId": session_id,
                "token": { "runId": run_id, "sequenceNumber": sequence, "value": value },
            }),
        )
    }

    pub fn error(user_id: &str, session_id: &str, cause: &str) -> Self {
        let mut event = Self::new(
            EventAction::Error,
            user_id,
            json!({ "sessionId": session_id, "content": cause, "type": "text" }),
        );
        event.direction = Some("OUT".to_string());
        event
    }

    /// 事件所属的会话ID
    pub fn session_id(&self) -> Option<&str> {
        self.data.get("sessionId").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(ProgressEvent::started("u", "s")).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["action"], "STARTED");
        assert_eq!(value["userId"], "u");
        assert_eq!(value["data"]["sessionId"], "s");
        assert!(value.get("direction").is_none());
    }

    #[test]
    fn test_error_event_is_outbound() {
        let event = ProgressEvent::error("u", "s", "boom");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "error");
        assert_eq!(value["direction"], "OUT");
        assert_eq!(value["data"]["content"], "boom");
        assert_eq!(event.session_id(), Some("s"));
    }
}
