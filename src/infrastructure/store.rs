//! 会话/题目存储接口
//!
//! 只暴露分页查询能力，完整扫描由 `services::pagination` 负责。
//! 内存实现用于本地运行和测试，分页大小可配置。

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::question::Question;
use crate::models::session::Session;

/// 一页查询结果
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 为 `None` 表示没有更多数据
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// 题目存储
#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn put(&self, question: &Question) -> AppResult<()>;

    async fn update_answer(&self, question_id: &str, session_id: &str, text: &str) -> AppResult<()>;

    async fn update_feedback(
        &self,
        question_id: &str,
        session_id: &str,
        text: &str,
    ) -> AppResult<()>;

    /// 按会话二级索引查询一页
    async fn query_by_session(
        &self,
        session_id: &str,
        token: Option<String>,
    ) -> AppResult<Page<Question>>;
}

/// 会话存储
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: &Session) -> AppResult<()>;

    /// `compound_key` 为 `类型#会话ID`
    async fn get(&self, user_id: &str, compound_key: &str) -> AppResult<Option<Session>>;

    async fn delete(&self, user_id: &str, compound_key: &str) -> AppResult<()>;

    /// 查询用户下复合键以 `type_prefix` 开头的会话
    async fn query_by_user(
        &self,
        user_id: &str,
        type_prefix: &str,
        token: Option<String>,
    ) -> AppResult<Page<Session>>;
}

/// 把偏移量编码成续传令牌，对匹配结果切一页
fn paginate<T: Clone>(
    matches: Vec<&T>,
    token: Option<String>,
    page_size: usize,
) -> AppResult<Page<T>> {
    let start = match token {
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| AppError::store_read("page", format!("无效的续传令牌: {}", token)))?,
        None => 0,
    };
    let end = start.saturating_add(page_size.max(1)).min(matches.len());
    let items = matches
        .get(start..end)
        .unwrap_or_default()
        .iter()
        .map(|item| (*item).clone())
        .collect();
    let next_token = (end < matches.len()).then(|| end.to_string());
    Ok(Page { items, next_token })
}

/// 内存题目存储
pub struct InMemoryQuestionStore {
    items: RwLock<Vec<Question>>,
    page_size: usize,
}

impl InMemoryQuestionStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            page_size,
        }
    }

    /// 当前全部记录（测试用）
    pub async fn snapshot(&self) -> Vec<Question> {
        self.items.read().await.clone()
    }

    async fn update_field(
        &self,
        question_id: &str,
        session_id: &str,
        apply: impl FnOnce(&mut Question),
    ) -> AppResult<()> {
        let mut items = self.items.write().await;
        let question = items
            .iter_mut()
            .find(|q| q.question_id == question_id && q.session_id == session_id)
            .ok_or_else(|| {
                AppError::store_write("question", format!("题目不存在: {}/{}", session_id, question_id))
            })?;
        apply(question);
        Ok(())
    }
}

impl Default for InMemoryQuestionStore {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl QuestionStore for InMemoryQuestionStore {
    async fn put(&self, question: &Question) -> AppResult<()> {
        let mut items = self.items.write().await;
        match items
            .iter_mut()
            .find(|q| q.question_id == question.question_id && q.session_id == question.session_id)
        {
            Some(existing) => *existing = question.clone(),
            None => items.push(question.clone()),
        }
        Ok(())
    }

    async fn update_answer(
        &self,
        question_id: &str,
        session_id: &str,
        text: &str,
    ) -> AppResult<()> {
        self.update_field(question_id, session_id, |q| q.generated_response = text.to_string())
            .await
    }

    async fn update_feedback(
        &self,
        question_id: &str,
        session_id: &str,
        text: &str,
    ) -> AppResult<()> {
        self.update_field(question_id, session_id, |q| q.feedback_response = text.to_string())
            .await
    }

    async fn query_by_session(
        &self,
        session_id: &str,
        token: Option<String>,
    ) -> AppResult<Page<Question>> {
        let items = self.items.read().await;
        let matches: Vec<&Question> = items.iter().filter(|q| q.session_id == session_id).collect();
        paginate(matches, token, self.page_size)
    }
}

/// 内存会话存储
pub struct InMemorySessionStore {
    items: RwLock<Vec<Session>>,
    page_size: usize,
}

impl InMemorySessionStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            page_size,
        }
    }

    /// 当前全部记录（测试用）
    pub async fn snapshot(&self) -> Vec<Session> {
        self.items.read().await.clone()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: &Session) -> AppResult<()> {
        let mut items = self.items.write().await;
        match items
            .iter_mut()
            .find(|s| s.user_id == session.user_id && s.session_type == session.session_type)
        {
            Some(existing) => *existing = session.clone(),
            None => items.push(session.clone()),
        }
        Ok(())
    }

    async fn get(&self, user_id: &str, compound_key: &str) -> AppResult<Option<Session>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .find(|s| s.user_id == user_id && s.session_type == compound_key)
            .cloned())
    }

    async fn delete(&self, user_id: &str, compound_key: &str) -> AppResult<()> {
        let mut items = self.items.write().await;
        items.retain(|s| !(s.user_id == user_id && s.session_type == compound_key));
        Ok(())
    }

    async fn query_by_user(
        &self,
        user_id: &str,
        type_prefix: &str,
        token: Option<String>,
    ) -> AppResult<Page<Session>> {
        let items = self.items.read().await;
        let matches: Vec<&Session> = items
            .iter()
            .filter(|s| s.user_id == user_id && s.session_type.starts_with(type_prefix))
            .collect();
        paginate(matches, token, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{compound_key, BATCH_SESSION_KIND, CHAT_SESSION_KIND};

    #[tokio::test]
    async fn test_question_pages_follow_tokens() {
        let store = InMemoryQuestionStore::new(2);
        for row in 0..5 {
            store.put(&Question::new("s", "Sheet1", row, format!("q{}", row))).await.unwrap();
        }
        store.put(&Question::new("other", "Sheet1", 0, "x")).await.unwrap();

        let first = store.query_by_session("s", None).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let last = store.query_by_session("s", Some("4".to_string())).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(last.next_token.is_none());
    }

    #[tokio::test]
    async fn test_huge_token_yields_empty_last_page() {
        let store = InMemoryQuestionStore::new(usize::MAX);
        store.put(&Question::new("s", "Sheet1", 0, "q0")).await.unwrap();

        let page = store
            .query_by_session("s", Some(usize::MAX.to_string()))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_token.is_none());

        let err = store.query_by_session("s", Some("x".to_string())).await.unwrap_err();
        assert!(matches!(err, AppError::StoreRead { .. }));
    }

    #[tokio::test]
    async fn test_update_unknown_question_fails() {
        let store = InMemoryQuestionStore::default();
        let err = store.update_answer("nope", "s", "a").await.unwrap_err();
        assert!(matches!(err, AppError::StoreWrite { .. }));
    }

    #[tokio::test]
    async fn test_session_prefix_query() {
        let store = InMemorySessionStore::default();
        store.put(&Session::new("u", BATCH_SESSION_KIND, "a")).await.unwrap();
        store.put(&Session::new("u", CHAT_SESSION_KIND, "b")).await.unwrap();
        store.put(&Session::new("v", BATCH_SESSION_KIND, "c")).await.unwrap();

        let page = store.query_by_user("u", "rfp#", None).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].session_id, "a");

        assert!(store.get("u", &compound_key(CHAT_SESSION_KIND, "b")).await.unwrap().is_some());
        assert!(store.get("v", &compound_key(CHAT_SESSION_KIND, "b")).await.unwrap().is_none());
    }
}
