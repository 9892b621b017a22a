use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::{
    HttpNotifier, InMemoryQuestionStore, InMemorySessionStore, LocalObjectStorage, LogNotifier,
    ProgressNotifier,
};
use crate::models::load_batch_file;
use crate::orchestrator::{BatchProcessor, BatchResponse, PipelineDeps};
use crate::services::{register_openai, AdapterRegistry, FeedbackService, SessionService};
use crate::utils::logging::log_startup;

/// 应用主结构
pub struct App {
    config: Config,
    deps: PipelineDeps,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let notifier: Arc<dyn ProgressNotifier> = match &config.notifier_endpoint {
            Some(endpoint) => {
                info!("📡 进度事件推送到: {}", endpoint);
                let timeout = Duration::from_secs(config.notifier_timeout_secs);
                Arc::new(HttpNotifier::new(endpoint.clone(), timeout)?)
            }
            None => {
                warn!("⚠️ 未配置 NOTIFIER_ENDPOINT，进度事件只写日志");
                Arc::new(LogNotifier)
            }
        };

        let mut registry = AdapterRegistry::new();
        register_openai(&mut registry, &config);

        let deps = PipelineDeps {
            sessions: Arc::new(InMemorySessionStore::new(config.store_page_size)),
            questions: Arc::new(InMemoryQuestionStore::new(config.store_page_size)),
            storage: Arc::new(LocalObjectStorage::new(&config.object_root)),
            notifier,
            registry: Arc::new(registry),
        };

        Ok(Self::with_deps(config, deps))
    }

    /// 使用外部提供的协作方
    pub fn with_deps(config: Config, deps: PipelineDeps) -> Self {
        Self { config, deps }
    }

    /// 运行应用主逻辑：处理一个批次文件并返回批次结果
    pub async fn run(&self, batch_path: impl AsRef<Path>) -> Result<BatchResponse> {
        info!("\n📁 正在加载批次文件...");
        let records = load_batch_file(batch_path.as_ref()).await?;

        if records.is_empty() {
            warn!("⚠️ 批次文件中没有消息，程序结束");
            return Ok(BatchResponse::default());
        }

        let processor = BatchProcessor::new(self.deps.clone(), self.config.clone());
        Ok(processor.process(records).await)
    }

    /// 会话查询/删除服务
    pub fn session_service(&self) -> SessionService {
        SessionService::new(self.deps.sessions.clone(), self.deps.questions.clone())
    }

    /// 反馈/导出服务
    pub fn feedback_service(&self) -> Result<FeedbackService> {
        FeedbackService::new(
            self.deps.sessions.clone(),
            self.deps.questions.clone(),
            self.deps.storage.clone(),
            &self.config,
        )
        .context("无法创建导出服务")
    }
}
