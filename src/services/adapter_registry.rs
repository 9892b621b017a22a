//! 答案适配器注册表 - 业务能力层
//!
//! 启动时显式登记 (provider, 模型前缀) → 构造函数。
//! 查找规则：provider 与模型名都转小写去空白，provider 精确匹配，
//! 模型名取能匹配的最长前缀；空前缀表示该 provider 下的兜底项。

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// 调用适配器时的上下文
#[derive(Debug, Clone, Default)]
pub struct AnswerContext {
    pub user_id: String,
    pub session_id: String,
    pub workspace_id: Option<String>,
    pub company_name: String,
    pub mode: String,
    pub model_kwargs: JsonValue,
}

/// 流式 token 回调，在最终答案返回前可被调用零次或多次
#[async_trait]
pub trait TokenSink: Send + Sync {
    async fn on_token(&self, token: &str);
}

/// 丢弃所有 token
pub struct NoopTokenSink;

#[async_trait]
impl TokenSink for NoopTokenSink {
    async fn on_token(&self, _token: &str) {}
}

/// 答案生成后端
#[async_trait]
pub trait AnswerAdapter: Send + Sync {
    fn model_id(&self) -> &str;

    async fn run(
        &self,
        query: &str,
        ctx: &AnswerContext,
        tokens: &dyn TokenSink,
    ) -> AppResult<String>;
}

/// 构造适配器所需的参数
#[derive(Debug, Clone)]
pub struct AdapterTarget {
    pub provider: String,
    pub model_id: String,
}

pub type AdapterFactory =
    Arc<dyn Fn(&AdapterTarget) -> AppResult<Arc<dyn AnswerAdapter>> + Send + Sync>;

struct Registration {
    provider: String,
    model_prefix: String,
    factory: AdapterFactory,
}

/// 适配器注册表
#[derive(Default)]
pub struct AdapterRegistry {
    entries: Vec<Registration>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个构造函数；同一 (provider, 前缀) 重复登记时后者覆盖前者
    pub fn register<F>(&mut self, provider: &str, model_prefix: &str, factory: F)
    where
        F: Fn(&AdapterTarget) -> AppResult<Arc<dyn AnswerAdapter>> + Send + Sync + 'static,
    {
        let provider = normalize(provider);
        let model_prefix = normalize(model_prefix);
        info!("登记适配器: {}.{}*", provider, model_prefix);

        self.entries
            .retain(|e| !(e.provider == provider && e.model_prefix == model_prefix));
        self.entries.push(Registration {
            provider,
            model_prefix,
            factory: Arc::new(factory),
        });
    }

    /// 按 (provider, 模型) 解析适配器
    pub fn resolve(&self, provider: &str, model_id: &str) -> AppResult<Arc<dyn AnswerAdapter>> {
        let wanted_provider = normalize(provider);
        let wanted_model = normalize(model_id);

        let registration = self
            .entries
            .iter()
            .filter(|e| e.provider == wanted_provider && wanted_model.starts_with(&e.model_prefix))
            .max_by_key(|e| e.model_prefix.len())
            .ok_or_else(|| AppError::AdapterNotFound {
                provider: provider.to_string(),
                model: model_id.to_string(),
            })?;

        debug!(
            "解析适配器 {}.{} → 前缀 {:?}",
            wanted_provider, wanted_model, registration.model_prefix
        );

        (registration.factory)(&AdapterTarget {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
