//! 分页读取 - 业务能力层
//!
//! 所有完整扫描都必须循环到存储不再返回续传令牌为止，
//! 只读第一页会让题目多的会话被静默截断。

use std::future::Future;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::{Page, QuestionStore, SessionStore};
use crate::models::question::Question;
use crate::models::session::{kind_prefix, Session};

/// 反复查询直到没有续传令牌，累积全部结果
pub async fn collect_all_pages<T, F, Fut>(entity: &str, mut fetch: F) -> AppResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = AppResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch(token.clone()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_token {
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                return Err(AppError::store_read(
                    entity,
                    format!("续传令牌未前进: {}", next),
                ));
            }
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!("{}: 共读取 {} 页, {} 条", entity, pages, items.len());
    Ok(items)
}

/// 会话下的全部题目
pub async fn list_questions_by_session(
    store: &dyn QuestionStore,
    session_id: &str,
) -> AppResult<Vec<Question>> {
    collect_all_pages("question", |token| store.query_by_session(session_id, token)).await
}

/// 用户下某类型的全部会话
pub async fn list_sessions_by_user(
    store: &dyn SessionStore,
    user_id: &str,
    kind: &str,
) -> AppResult<Vec<Session>> {
    let prefix = kind_prefix(kind);
    collect_all_pages("session", |token| store.query_by_user(user_id, &prefix, token)).await
}
