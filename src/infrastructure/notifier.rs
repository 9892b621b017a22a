//! 进度通知通道
//!
//! 对流水线而言只写不读，推送失败由调用方记录日志后忽略。

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::event::{EventAction, ProgressEvent};

#[async_trait]
pub trait ProgressNotifier: Send + Sync {
    async fn send(&self, event: &ProgressEvent) -> AppResult<()>;
}

/// 推送事件，失败只记日志
pub async fn notify_best_effort(notifier: &dyn ProgressNotifier, event: &ProgressEvent) {
    if let Err(e) = notifier.send(event).await {
        warn!(
            "[会话 {}] ⚠️ 推送 {:?} 事件失败: {}",
            event.session_id().unwrap_or("-"),
            event.action,
            e
        );
    }
}

/// 以 JSON POST 推送到客户端通道
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    /// 每次推送最多等待 `timeout`，超时按推送失败处理
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ProgressNotifier for HttpNotifier {
    async fn send(&self, event: &ProgressEvent) -> AppResult<()> {
        let response = self.client.post(&self.endpoint).json(event).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Notify(format!(
                "{} 返回状态 {}",
                self.endpoint,
                response.status()
            )));
        }
        Ok(())
    }
}

/// 只写日志，本地运行时使用
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl ProgressNotifier for LogNotifier {
    async fn send(&self, event: &ProgressEvent) -> AppResult<()> {
        match event.action {
            EventAction::LlmNewToken => debug!("📨 [{}] {:?}", event.user_id, event.data),
            _ => info!(
                "📨 [{}] {:?} {}",
                event.user_id,
                event.action,
                crate::utils::logging::truncate_text(&event.data.to_string(), 200)
            ),
        }
        Ok(())
    }
}

/// 把事件记在内存里
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }

    /// 指定动作的事件
    pub async fn events_of(&self, action: EventAction) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProgressNotifier for RecordingNotifier {
    async fn send(&self, event: &ProgressEvent) -> AppResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
