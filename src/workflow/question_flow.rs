//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. 调用适配器生成答案（带超时，token 流式推送）
//! 2. 推送 ANSWER 事件
//! 3. 写回生成答案（失败只记录，不中断）

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::notifier::{notify_best_effort, ProgressNotifier};
use crate::infrastructure::store::QuestionStore;
use crate::models::event::ProgressEvent;
use crate::models::question::Question;
use crate::services::adapter_registry::{AnswerAdapter, AnswerContext, TokenSink};
use crate::utils::logging::truncate_text;
use crate::workflow::question_ctx::QuestionCtx;

/// 题目处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionOutcome {
    /// 答案已生成并写回
    Answered,
    /// 答案已生成并推送，但写回存储失败
    AnswerNotPersisted { error: String },
}

/// 带超时地调用适配器
pub async fn invoke_adapter(
    adapter: &dyn AnswerAdapter,
    query: &str,
    ctx: &AnswerContext,
    tokens: &dyn TokenSink,
    timeout: Duration,
) -> AppResult<String> {
    match tokio::time::timeout(timeout, adapter.run(query, ctx, tokens)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::AdapterTimeout {
            model: adapter.model_id().to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// 题目处理流程
///
/// - 编排单道题目的处理流程
/// - 不持有适配器，由调用方按消息解析后传入
/// - 只依赖业务能力（services）和基础设施接口
pub struct QuestionFlow {
    questions: Arc<dyn QuestionStore>,
    notifier: Arc<dyn ProgressNotifier>,
    adapter_timeout: Duration,
    verbose_logging: bool,
}

impl QuestionFlow {
    /// 创建新的题目处理流程
    pub fn new(
        questions: Arc<dyn QuestionStore>,
        notifier: Arc<dyn ProgressNotifier>,
        config: &Config,
    ) -> Self {
        Self {
            questions,
            notifier,
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
            verbose_logging: config.verbose_logging,
        }
    }

    /// 处理一道题目
    ///
    /// 适配器失败或超时返回 `Err`，由上层终止整条消息；
    /// 写回失败只体现在返回的 `QuestionOutcome` 中。
    pub async fn run(
        &self,
        adapter: &dyn AnswerAdapter,
        question: &Question,
        answer_ctx: &AnswerContext,
        ctx: &QuestionCtx,
        tokens: &dyn TokenSink,
    ) -> AppResult<QuestionOutcome> {
        self.log_query(ctx, &question.query);

        let timeout = self.adapter_timeout;
        let answer = invoke_adapter(adapter, &question.query, answer_ctx, tokens, timeout)
            .await
            .map_err(|e| {
                error!("{} ❌ 生成答案失败: {}", ctx, e);
                e
            })?;

        if self.verbose_logging {
            info!("{} 答案: {}", ctx, truncate_text(&answer, 120));
        }

        notify_best_effort(
            self.notifier.as_ref(),
            &ProgressEvent::answer(&ctx.user_id, question, &answer),
        )
        .await;

        match self
            .questions
            .update_answer(&question.question_id, &question.session_id, &answer)
            .await
        {
            Ok(()) => {
                info!("{} ✓ 答案已保存", ctx);
                Ok(QuestionOutcome::Answered)
            }
            Err(e) => {
                warn!("{} ⚠️ 答案写回失败，继续处理下一题: {}", ctx, e);
                Ok(QuestionOutcome::AnswerNotPersisted {
                    error: e.to_string(),
                })
            }
        }
    }

    // ========== 日志辅助方法 ==========

    /// 显示问题预览
    fn log_query(&self, ctx: &QuestionCtx, query: &str) {
        info!("{} 问题: {}", ctx, truncate_text(query, 80));
    }
}
