//! 对话流程 - 流程层
//!
//! 处理不带附件的 `run` 消息：单轮问答，追加到 `chatbot` 会话历史。

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::notifier::{notify_best_effort, ProgressNotifier};
use crate::infrastructure::store::SessionStore;
use crate::models::event::ProgressEvent;
use crate::models::message::InboundMessage;
use crate::models::session::{compound_key, HistoryEntry, Session, CHAT_SESSION_KIND};
use crate::services::adapter_registry::{AdapterRegistry, AnswerContext};
use crate::utils::logging::truncate_text;
use crate::workflow::question_flow::invoke_adapter;
use crate::workflow::token_sink::NotifierTokenSink;

/// 对话模式处理器
#[async_trait]
pub trait ConversationHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> AppResult<()>;
}

/// 默认对话流程
pub struct ChatFlow {
    registry: Arc<AdapterRegistry>,
    sessions: Arc<dyn SessionStore>,
    notifier: Arc<dyn ProgressNotifier>,
    company_name: String,
    adapter_timeout: Duration,
    stream_tokens: bool,
}

impl ChatFlow {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn ProgressNotifier>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            sessions,
            notifier,
            company_name: config.company_name.clone(),
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
            stream_tokens: config.stream_tokens,
        }
    }
}

#[async_trait]
impl ConversationHandler for ChatFlow {
    async fn handle(&self, message: &InboundMessage) -> AppResult<()> {
        let data = message.run_data()?;
        let session_id = data.resolve_session_id();
        let user_id = message.user_id.as_str();

        let adapter = self.registry.resolve(&data.provider, &data.model_name)?;
        info!("[会话 {}] 💬 对话模式，模型: {}", session_id, adapter.model_id());

        let mut session = self
            .sessions
            .get(user_id, &compound_key(CHAT_SESSION_KIND, &session_id))
            .await?
            .unwrap_or_else(|| Session::new(user_id, CHAT_SESSION_KIND, session_id.clone()));

        let ctx = AnswerContext {
            user_id: user_id.to_string(),
            session_id: session_id.clone(),
            workspace_id: data.workspace_id.clone(),
            company_name: self.company_name.clone(),
            mode: data.mode.clone(),
            model_kwargs: data.model_kwargs.clone(),
        };
        let tokens = NotifierTokenSink::new(
            self.notifier.clone(),
            user_id,
            &session_id,
            self.stream_tokens,
        );

        let answer =
            invoke_adapter(adapter.as_ref(), &data.text, &ctx, &tokens, self.adapter_timeout)
                .await?;
        info!("[会话 {}] ✓ 回答: {}", session_id, truncate_text(&answer, 80));

        session.history.push(HistoryEntry::human(data.text.clone()));
        session.history.push(HistoryEntry::ai(
            answer.clone(),
            json!({ "modelId": adapter.model_id(), "mode": data.mode, "sessionId": session_id }),
        ));
        self.sessions.put(&session).await?;

        notify_best_effort(
            self.notifier.as_ref(),
            &ProgressEvent::final_response(user_id, &session_id, &answer),
        )
        .await;
        Ok(())
    }
}
