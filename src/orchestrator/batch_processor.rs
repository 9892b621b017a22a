//! 批次处理器 - 编排层
//!
//! ## 职责
//!
//! 消费一批队列记录，逐条驱动消息状态机：
//!
//! ```text
//! RECEIVED → CLASSIFIED → {SIMPLE_RUN | BATCH_RUN | HEARTBEAT} → COMPLETED | FAILED
//! ```
//!
//! ## 设计特点
//!
//! - **顺序处理**：一次只处理一条消息
//! - **失败隔离**：每条消息在独立任务中运行，错误或 panic 在批次边界捕获，后续消息照常处理
//! - **失败上报**：循环结束后每条失败消息恰好推送一条 `error` 事件
//! - **向下委托**：批量问卷交给 `run_processor`，对话交给 `ConversationHandler`

use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::notifier::notify_best_effort;
use crate::models::event::ProgressEvent;
use crate::models::message::{recover_identity, InboundMessage, MessageKind, QueueRecord};
use crate::orchestrator::run_processor::process_run;
use crate::orchestrator::PipelineDeps;
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::{ChatFlow, ConversationHandler};

/// 单条消息的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageState {
    Received,
    Classified,
    SimpleRun,
    BatchRun,
    Heartbeat,
    Completed,
    Failed,
}

/// 单条消息的处理结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResult {
    pub message_id: String,
    pub state: MessageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 失败的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// 批次处理结果
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub results: Vec<MessageResult>,
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.state == MessageState::Completed)
            .count()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}

/// 单条消息的失败：错误本身，加上处理中确定下来的会话ID
struct RecordFailure {
    error: AppError,
    session_id: Option<String>,
}

impl From<AppError> for RecordFailure {
    fn from(error: AppError) -> Self {
        Self {
            error,
            session_id: None,
        }
    }
}

/// 批次处理器
pub struct BatchProcessor {
    deps: PipelineDeps,
    config: Config,
    conversation: Arc<dyn ConversationHandler>,
}

impl BatchProcessor {
    /// 使用默认的对话流程
    pub fn new(deps: PipelineDeps, config: Config) -> Self {
        let conversation = Arc::new(ChatFlow::new(
            deps.registry.clone(),
            deps.sessions.clone(),
            deps.notifier.clone(),
            &config,
        ));
        Self {
            deps,
            config,
            conversation,
        }
    }

    /// 替换对话模式处理器
    pub fn with_conversation_handler(mut self, handler: Arc<dyn ConversationHandler>) -> Self {
        self.conversation = handler;
        self
    }

    /// 处理一批记录
    pub async fn process(&self, records: Vec<QueueRecord>) -> BatchResponse {
        let total = records.len();
        log_batch_start(total);

        let mut response = BatchResponse::default();
        let mut failed: Vec<(&QueueRecord, String, Option<String>)> = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            let message_index = idx + 1;
            let deps = self.deps.clone();
            let config = self.config.clone();
            let conversation = self.conversation.clone();
            let record_clone = record.clone();

            let handle = tokio::spawn(async move {
                let conversation = conversation.as_ref();
                process_record(&deps, &config, conversation, &record_clone, message_index).await
            });

            let cause = match handle.await {
                Ok(Ok(())) => None,
                Ok(Err(failure)) => Some((failure.error.to_string(), failure.session_id)),
                Err(e) if e.is_panic() => Some((
                    format!("处理过程中发生 panic: {}", panic_message(e.into_panic().as_ref())),
                    None,
                )),
                Err(e) => Some((format!("任务执行失败: {}", e), None)),
            };

            match cause {
                None => {
                    debug!(
                        "[消息 {}] {:?} → {:?}",
                        message_index,
                        record.message_id,
                        MessageState::Completed
                    );
                    response.results.push(MessageResult {
                        message_id: record.message_id.clone(),
                        state: MessageState::Completed,
                        error: None,
                    });
                }
                Some((cause, session_id)) => {
                    error!("[消息 {}] ❌ {} 处理失败: {}", message_index, record.message_id, cause);
                    response.results.push(MessageResult {
                        message_id: record.message_id.clone(),
                        state: MessageState::Failed,
                        error: Some(cause.clone()),
                    });
                    response.batch_item_failures.push(BatchItemFailure {
                        item_identifier: record.message_id.clone(),
                    });
                    failed.push((record, cause, session_id));
                }
            }
        }

        // 每条失败消息恰好一条 error 事件
        for (record, cause, resolved_session) in &failed {
            let (user_id, recovered_session) = recover_identity(&record.body);
            let session_id = resolved_session.clone().unwrap_or(recovered_session);
            notify_best_effort(
                self.deps.notifier.as_ref(),
                &ProgressEvent::error(&user_id, &session_id, cause),
            )
            .await;
        }

        log_batch_complete(response.succeeded(), failed.len(), total);
        response
    }
}

/// 单条消息：解码、分类、分派
async fn process_record(
    deps: &PipelineDeps,
    config: &Config,
    conversation: &dyn ConversationHandler,
    record: &QueueRecord,
    message_index: usize,
) -> Result<(), RecordFailure> {
    debug!("[消息 {}] {:?}", message_index, MessageState::Received);
    let mut message = InboundMessage::decode(&record.body)?;

    let kind = message.classify();
    debug!("[消息 {}] {:?}: {:?}", message_index, MessageState::Classified, kind);

    match kind {
        MessageKind::Heartbeat => {
            debug!("[消息 {}] {:?}", message_index, MessageState::Heartbeat);
            let session_id = message.session_id().unwrap_or_default();
            notify_best_effort(
                deps.notifier.as_ref(),
                &ProgressEvent::heartbeat(&message.user_id, session_id),
            )
            .await;
        }
        MessageKind::SimpleRun => {
            debug!("[消息 {}] {:?}", message_index, MessageState::SimpleRun);
            let session_id = message.ensure_session_id();
            conversation
                .handle(&message)
                .await
                .map_err(|error| RecordFailure { error, session_id })?;
        }
        MessageKind::BatchRun => {
            debug!("[消息 {}] {:?}", message_index, MessageState::BatchRun);
            let session_id = message.ensure_session_id();
            process_run(deps, &message, message_index, config)
                .await
                .map_err(|error| RecordFailure { error, session_id })?;
        }
        MessageKind::Unknown => {
            info!("[消息 {}] 忽略未知动作: {}", message_index, message.action);
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知错误".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::infrastructure::notifier::RecordingNotifier;
    use crate::infrastructure::object_storage::InMemoryObjectStorage;
    use crate::infrastructure::store::{InMemoryQuestionStore, InMemorySessionStore};
    use crate::models::event::EventAction;
    use crate::services::adapter_registry::AdapterRegistry;
    use async_trait::async_trait;
    use serde_json::json;

    struct PanickingHandler;

    #[async_trait]
    impl ConversationHandler for PanickingHandler {
        async fn handle(&self, message: &InboundMessage) -> AppResult<()> {
            if message.user_id == "boom" {
                panic!("handler exploded");
            }
            Ok(())
        }
    }

    struct RejectingHandler;

    #[async_trait]
    impl ConversationHandler for RejectingHandler {
        async fn handle(&self, _message: &InboundMessage) -> AppResult<()> {
            Err(AppError::adapter("m", "backend down"))
        }
    }

    fn deps(notifier: Arc<RecordingNotifier>) -> PipelineDeps {
        PipelineDeps {
            sessions: Arc::new(InMemorySessionStore::default()),
            questions: Arc::new(InMemoryQuestionStore::default()),
            storage: Arc::new(InMemoryObjectStorage::new()),
            notifier,
            registry: Arc::new(AdapterRegistry::new()),
        }
    }

    fn heartbeat(id: &str) -> QueueRecord {
        QueueRecord::wrap(
            id,
            &json!({"action": "heartbeat", "userId": "u", "data": {"sessionId": "s"}}),
        )
    }

    fn chat(id: &str, user: &str) -> QueueRecord {
        QueueRecord::wrap(
            id,
            &json!({
                "action": "run",
                "userId": user,
                "data": {"provider": "p", "modelName": "m", "text": "hi", "sessionId": "c"},
            }),
        )
    }

    #[tokio::test]
    async fn test_malformed_message_is_isolated() {
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = BatchProcessor::new(deps(notifier.clone()), Config::default());

        let records = vec![
            heartbeat("m1"),
            QueueRecord::new("m2", "{not json"),
            heartbeat("m3"),
            QueueRecord::wrap("m4", &json!({"action": "something_else", "userId": "u"})),
        ];
        let response = processor.process(records).await;

        assert_eq!(response.succeeded(), 3);
        assert_eq!(response.failed_ids(), vec!["m2"]);
        assert_eq!(response.results[1].state, MessageState::Failed);

        let errors = notifier.events_of(EventAction::Error).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].user_id, "");
        assert_eq!(notifier.events_of(EventAction::Heartbeat).await.len(), 2);
    }

    #[tokio::test]
    async fn test_panic_is_caught_at_batch_boundary() {
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = BatchProcessor::new(deps(notifier.clone()), Config::default())
            .with_conversation_handler(Arc::new(PanickingHandler));

        let response = processor
            .process(vec![chat("m1", "boom"), chat("m2", "fine")])
            .await;

        assert_eq!(response.failed_ids(), vec!["m1"]);
        assert_eq!(response.results[1].state, MessageState::Completed);
        assert!(response.results[0].error.as_deref().unwrap().contains("handler exploded"));

        let errors = notifier.events_of(EventAction::Error).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].user_id, "boom");
        assert_eq!(errors[0].session_id(), Some("c"));
    }

    #[tokio::test]
    async fn test_error_events_follow_the_loop() {
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = BatchProcessor::new(deps(notifier.clone()), Config::default())
            .with_conversation_handler(Arc::new(RejectingHandler));

        let response = processor
            .process(vec![chat("m1", "a"), heartbeat("m2"), chat("m3", "b")])
            .await;
        assert_eq!(response.failed_ids(), vec!["m1", "m3"]);

        // 心跳在前，两条 error 事件在批次末尾
        let actions: Vec<EventAction> = notifier.events().await.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![EventAction::Heartbeat, EventAction::Error, EventAction::Error]
        );
    }

    /// 记录收到的会话ID后失败
    #[derive(Default)]
    struct SessionCapturingHandler {
        seen: tokio::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConversationHandler for SessionCapturingHandler {
        async fn handle(&self, message: &InboundMessage) -> AppResult<()> {
            let data = message.run_data()?;
            self.seen.lock().await.push(data.resolve_session_id());
            Err(AppError::adapter("m", "backend down"))
        }
    }

    #[tokio::test]
    async fn test_error_event_carries_minted_session_id() {
        let notifier = Arc::new(RecordingNotifier::new());
        let handler = Arc::new(SessionCapturingHandler::default());
        let processor = BatchProcessor::new(deps(notifier.clone()), Config::default())
            .with_conversation_handler(handler.clone());

        let record = QueueRecord::wrap(
            "m1",
            &json!({
                "action": "run",
                "userId": "u",
                "data": {"provider": "p", "modelName": "m", "text": "hi"},
            }),
        );
        let response = processor.process(vec![record]).await;
        assert_eq!(response.failed_ids(), vec!["m1"]);

        let seen = handler.seen.lock().await.clone();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].is_empty());

        let errors = notifier.events_of(EventAction::Error).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].session_id(), Some(seen[0].as_str()));
    }

    #[test]
    fn test_response_wire_shape() {
        let response = BatchResponse {
            results: vec![],
            batch_item_failures: vec![BatchItemFailure {
                item_identifier: "m1".to_string(),
            }],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["batchItemFailures"][0]["itemIdentifier"], "m1");
    }
}
