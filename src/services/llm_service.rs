//! LLM 服务 - 业务能力层
//!
//! 只负责"根据问题生成答案"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行流式调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::adapter_registry::{
    AdapterRegistry, AdapterTarget, AnswerAdapter, AnswerContext, TokenSink,
};

/// OpenAI 兼容接口在注册表中的 provider 名
pub const OPENAI_PROVIDER: &str = "openai";

/// 无法回答时的固定答复
pub const UNABLE_TO_ANSWER: &str =
    "Unable to answer: No Information available to answer with the current information available";

/// LLM 服务
///
/// 职责：
/// - 以问答模式调用兼容 OpenAI 的接口
/// - 把流式返回的每个片段交给 TokenSink
/// - 只处理单道题目
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config, model_name: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.into(),
        }
    }

    /// 构建问答的系统消息
    ///
    /// 以公司口吻作答，禁止编造上下文之外的信息。
    fn build_system_message(&self, ctx: &AnswerContext) -> String {
        let company = if ctx.company_name.is_empty() {
            "our company"
        } else {
            ctx.company_name.as_str()
        };
        let workspace = ctx
            .workspace_id
            .as_deref()
            .map(|id| format!("\nKnowledge workspace: {}", id))
            .unwrap_or_default();

        format!(
            "Play the role of the {company} RFP FAQ bot.{workspace}\n\
             Use active voice. Instead of \"I\", say \"we at {company}\".\n\
             Do not use phrases like \"based on the context provided\".\n\
             Do not invent actions, statistics or metrics that you were not given, \
             and do not reuse numbers from the question.\n\
             If the question cannot be answered, respond exactly with: {UNABLE_TO_ANSWER} to the question."
        )
    }

    /// 从 modelKwargs 读取采样参数
    fn sampling(kwargs: &JsonValue) -> (f32, u32, Option<f32>) {
        let temperature = kwargs
            .get("temperature")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .unwrap_or(0.3);
        let max_tokens = kwargs
            .get("maxTokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(1024);
        let top_p = kwargs.get("topP").and_then(|v| v.as_f64()).map(|v| v as f32);
        (temperature, max_tokens, top_p)
    }
}

/// 登记 `openai` provider：任意模型名都交给 LlmService
pub fn register_openai(registry: &mut AdapterRegistry, config: &Config) {
    let config = config.clone();
    registry.register(OPENAI_PROVIDER, "", move |target: &AdapterTarget| {
        Ok(Arc::new(LlmService::new(&config, target.model_id.clone())) as Arc<dyn AnswerAdapter>)
    });
}

#[async_trait]
impl AnswerAdapter for LlmService {
    fn model_id(&self) -> &str {
        &self.model_name
    }

    async fn run(
        &self,
        query: &str,
        ctx: &AnswerContext,
        tokens: &dyn TokenSink,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("问题长度: {} 字符", query.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(self.build_system_message(ctx))
            .build()
            .map_err(|e| AppError::adapter(&self.model_name, e))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(query)
            .build()
            .map_err(|e| AppError::adapter(&self.model_name, e))?;

        let (temperature, max_tokens, top_p) = Self::sampling(&ctx.model_kwargs);
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(temperature)
            .max_tokens(max_tokens)
            .stream(true);
        if let Some(top_p) = top_p {
            request.top_p(top_p);
        }
        let request = request.build().map_err(|e| AppError::adapter(&self.model_name, e))?;

        let mut stream = self.client.chat().create_stream(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::adapter(&self.model_name, e)
        })?;

        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                warn!("LLM 流式响应中断: {}", e);
                AppError::adapter(&self.model_name, e)
            })?;
            for choice in chunk.choices {
                if let Some(content) = choice.delta.content {
                    if content.is_empty() {
                        continue;
                    }
                    tokens.on_token(&content).await;
                    answer.push_str(&content);
                }
            }
        }

        debug!("LLM API 调用成功");

        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(AppError::adapter(&self.model_name, "LLM 返回内容为空"));
        }
        Ok(answer)
    }
}
