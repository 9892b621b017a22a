//! 会话服务 - 业务能力层
//!
//! 按用户列出、查看、删除会话。批量问卷会话（`rfp`）附带其全部题目。

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::store::{QuestionStore, SessionStore};
use crate::models::question::Question;
use crate::models::session::{
    compound_key, DeleteResult, Session, SessionDetail, BATCH_SESSION_KIND,
};
use crate::services::pagination::{list_questions_by_session, list_sessions_by_user};

pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    questions: Arc<dyn QuestionStore>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionStore>, questions: Arc<dyn QuestionStore>) -> Self {
        Self { sessions, questions }
    }

    /// 用户下某类型的全部会话，按开始时间倒序
    pub async fn list_sessions(&self, user_id: &str, kind: &str) -> AppResult<Vec<SessionDetail>> {
        let mut sessions = list_sessions_by_user(self.sessions.as_ref(), user_id, kind).await?;
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let mut details = Vec::with_capacity(sessions.len());
        for session in sessions {
            let questions = self.questions_for(&session).await?;
            details.push(SessionDetail::from_session(session, questions));
        }
        Ok(details)
    }

    /// 查看单个会话；不存在时返回 `None`
    pub async fn get_session(
        &self,
        user_id: &str,
        kind: &str,
        session_id: &str,
    ) -> AppResult<Option<SessionDetail>> {
        let Some(session) = self
            .sessions
            .get(user_id, &compound_key(kind, session_id))
            .await?
        else {
            return Ok(None);
        };
        let questions = self.questions_for(&session).await?;
        Ok(Some(SessionDetail::from_session(session, questions)))
    }

    /// 删除单个会话；存储报错时 `deleted` 为 false
    pub async fn delete_session(
        &self,
        user_id: &str,
        kind: &str,
        session_id: &str,
    ) -> DeleteResult {
        let deleted = match self
            .sessions
            .delete(user_id, &compound_key(kind, session_id))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("[会话 {}] ⚠️ 删除失败: {}", session_id, e);
                false
            }
        };
        DeleteResult {
            id: session_id.to_string(),
            deleted,
        }
    }

    /// 删除用户下某类型的全部会话
    pub async fn delete_user_sessions(
        &self,
        user_id: &str,
        kind: &str,
    ) -> AppResult<Vec<DeleteResult>> {
        let sessions = list_sessions_by_user(self.sessions.as_ref(), user_id, kind).await?;
        let mut results = Vec::with_capacity(sessions.len());
        for session in sessions {
            results.push(self.delete_session(user_id, kind, &session.session_id).await);
        }
        info!("🗑️ 用户 {} 的 {} 会话已处理 {} 个", user_id, kind, results.len());
        Ok(results)
    }

    async fn questions_for(&self, session: &Session) -> AppResult<Option<Vec<Question>>> {
        if session.kind() != BATCH_SESSION_KIND {
            return Ok(None);
        }
        let mut questions =
            list_questions_by_session(self.questions.as_ref(), &session.session_id).await?;
        questions.sort_by(|a, b| a.sheet.cmp(&b.sheet).then(a.row.cmp(&b.row)));
        Ok(Some(questions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::{InMemoryQuestionStore, InMemorySessionStore};
    use crate::models::session::CHAT_SESSION_KIND;

    fn service_with(
        sessions: Arc<InMemorySessionStore>,
        questions: Arc<InMemoryQuestionStore>,
    ) -> SessionService {
        SessionService::new(sessions, questions)
    }

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let service = service_with(Arc::default(), Arc::default());
        let detail = service.get_session("u", BATCH_SESSION_KIND, "nope").await.unwrap();
        assert!(detail.is_none());
    }

    #[tokio::test]
    async fn test_delete_user_sessions_with_none() {
        let service = service_with(Arc::default(), Arc::default());
        let results = service.delete_user_sessions("u", BATCH_SESSION_KIND).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_batch_session_detail_includes_questions() {
        let sessions = Arc::new(InMemorySessionStore::new(1));
        let questions = Arc::new(InMemoryQuestionStore::new(1));
        sessions
            .put(&Session::new("u", BATCH_SESSION_KIND, "s1").with_title("RFP 1"))
            .await
            .unwrap();
        sessions.put(&Session::new("u", CHAT_SESSION_KIND, "c1")).await.unwrap();
        for row in [2u32, 0, 1] {
            questions.put(&Question::new("s1", "Sheet1", row, format!("q{}", row))).await.unwrap();
        }

        let service = service_with(sessions, questions);
        let detail = service.get_session("u", BATCH_SESSION_KIND, "s1").await.unwrap().unwrap();
        assert_eq!(detail.title, "RFP 1");
        let rows: Vec<u32> = detail.questions.unwrap().iter().map(|q| q.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);

        let chat = service.get_session("u", CHAT_SESSION_KIND, "c1").await.unwrap().unwrap();
        assert!(chat.questions.is_none());

        let listed = service.list_sessions("u", BATCH_SESSION_KIND).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "s1");
    }

    #[tokio::test]
    async fn test_delete_user_sessions_only_touches_kind() {
        let sessions = Arc::new(InMemorySessionStore::new(2));
        for id in ["a", "b", "c"] {
            sessions.put(&Session::new("u", BATCH_SESSION_KIND, id)).await.unwrap();
        }
        sessions.put(&Session::new("u", CHAT_SESSION_KIND, "keep")).await.unwrap();

        let service = service_with(sessions.clone(), Arc::default());
        let results = service.delete_user_sessions("u", BATCH_SESSION_KIND).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.deleted));

        let left = sessions.snapshot().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].session_id, "keep");
    }
}
