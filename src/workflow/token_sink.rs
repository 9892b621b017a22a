//! 流式 token 推送
//!
//! 每条消息持有一个计数器，同一消息内的所有适配器调用共用，序号单调递增。

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::infrastructure::notifier::{notify_best_effort, ProgressNotifier};
use crate::models::event::ProgressEvent;
use crate::services::adapter_registry::TokenSink;

/// 把 token 作为 `LLM_NEW_TOKEN` 事件推给客户端
#[derive(Clone)]
pub struct NotifierTokenSink {
    notifier: Arc<dyn ProgressNotifier>,
    user_id: String,
    session_id: String,
    run_id: String,
    sequence: Arc<AtomicU64>,
    enabled: bool,
}

impl NotifierTokenSink {
    /// 为一条消息创建新的 sink，序号从 0 开始
    pub fn new(
        notifier: Arc<dyn ProgressNotifier>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            notifier,
            user_id: user_id.into(),
            session_id: session_id.into(),
            run_id: uuid::Uuid::new_v4().to_string(),
            sequence: Arc::new(AtomicU64::new(0)),
            enabled,
        }
    }

    /// 同一消息内的另一次调用：换 runId，共用计数器
    pub fn for_run(&self, run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..self.clone()
        }
    }

    /// 已推送的 token 数
    pub fn emitted(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSink for NotifierTokenSink {
    async fn on_token(&self, token: &str) {
        if !self.enabled || token.is_empty() {
            return;
        }
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let event = ProgressEvent::token(
            &self.user_id,
            &self.session_id,
            &self.run_id,
            sequence,
            token,
        );
        notify_best_effort(self.notifier.as_ref(), &event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::notifier::RecordingNotifier;
    use crate::models::event::EventAction;

    #[tokio::test]
    async fn test_sequence_is_shared_across_runs() {
        let notifier = Arc::new(RecordingNotifier::new());
        let sink = NotifierTokenSink::new(notifier.clone(), "u", "s", true);

        let first = sink.for_run("q1");
        first.on_token("Hel").await;
        first.on_token("").await;
        first.on_token("lo").await;
        sink.for_run("q2").on_token("!").await;

        let events = notifier.events_of(EventAction::LlmNewToken).await;
        let sequences: Vec<u64> = events
            .iter()
            .map(|e| e.data["token"]["sequenceNumber"].as_u64().unwrap())
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(events[2].data["token"]["runId"], "q2");
        assert_eq!(sink.emitted(), 3);
    }

    #[tokio::test]
    async fn test_fresh_sink_restarts_counter() {
        let notifier = Arc::new(RecordingNotifier::new());
        NotifierTokenSink::new(notifier.clone(), "u", "a", true).on_token("x").await;
        NotifierTokenSink::new(notifier.clone(), "u", "b", true).on_token("y").await;

        let events = notifier.events().await;
        assert!(events.iter().all(|e| e.data["token"]["sequenceNumber"] == 0));
    }

    #[tokio::test]
    async fn test_disabled_sink_emits_nothing() {
        let notifier = Arc::new(RecordingNotifier::new());
        let sink = NotifierTokenSink::new(notifier.clone(), "u", "s", false);
        sink.on_token("ignored").await;
        assert!(notifier.events().await.is_empty());
        assert_eq!(sink.emitted(), 0);
    }
}
