//! 单个批量问卷处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理一条带附件的 `run` 消息，是问卷级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **建会话**：沿用或新建会话ID，写入 `rfp` 会话并记录源文件对象键
//! 2. **解析适配器**：按 (provider, model) 查注册表
//! 3. **拆解工作簿**：读取源文件，逐题落库，推送 `QUESTIONS` 作为恢复检查点
//! 4. **逐题处理**：按工作表、行顺序委托 `QuestionFlow`
//! 5. **统计输出**：记录成功/写回失败数量，推送 `FINAL_RESPONSE`

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::notifier::notify_best_effort;
use crate::models::event::ProgressEvent;
use crate::models::message::InboundMessage;
use crate::models::question::{Question, QuestionSheet};
use crate::models::session::{Session, BATCH_SESSION_KIND};
use crate::orchestrator::PipelineDeps;
use crate::services::adapter_registry::AnswerContext;
use crate::services::sheet_reader::SheetReader;
use crate::workflow::{NotifierTokenSink, QuestionCtx, QuestionFlow, QuestionOutcome};

/// 批量问卷处理完成时推送的内容
pub const PROCESS_COMPLETE: &str = "process complete";

/// 题目处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub session_id: String,
    pub sheets: usize,
    pub total: usize,
    pub answered: usize,
    pub not_persisted: usize,
}

/// 处理单个批量问卷
///
/// # 参数
/// - `deps`: 外部协作方
/// - `message`: 已解码的 `run` 消息（至少带一个附件）
/// - `message_index`: 消息在批次中的序号（用于日志）
/// - `config`: 配置
///
/// # 返回
/// 返回本次问卷的统计信息；适配器失败会终止整条消息
pub async fn process_run(
    deps: &PipelineDeps,
    message: &InboundMessage,
    message_index: usize,
    config: &Config,
) -> AppResult<RunStats> {
    let data = message.run_data()?;
    let user_id = message.user_id.as_str();
    let file = data
        .files
        .first()
        .ok_or_else(|| AppError::MalformedMessage("run 消息没有附件".to_string()))?;

    // ========== 1-2. 会话 ==========
    let session_id = data.resolve_session_id();
    let source_key = config.object_key(&file.key);
    let title = if data.text.trim().is_empty() {
        file.key.clone()
    } else {
        data.text.clone()
    };
    let session = Session::new(user_id, BATCH_SESSION_KIND, session_id.clone())
        .with_title(title.clone())
        .with_source_key(source_key.clone());
    deps.sessions.put(&session).await?;

    log_run_start(message_index, &session_id, &source_key);

    // ========== 3. 适配器 ==========
    let adapter = deps.registry.resolve(&data.provider, &data.model_name)?;

    // ========== 4. STARTED ==========
    notify_best_effort(deps.notifier.as_ref(), &ProgressEvent::started(user_id, &session_id)).await;

    // ========== 5. 拆解工作簿 ==========
    let bytes = deps.storage.get_object(&config.files_bucket, &source_key).await?;
    let workbook = SheetReader::new(config.query_start_row, config.query_column).read(&bytes)?;
    info!(
        "[会话 {}] 📊 共 {} 个工作表, {} 道题目",
        session_id,
        workbook.sheets.len(),
        workbook.total_items()
    );

    // ========== 6. 题目落库 ==========
    let mut question_sheets = Vec::with_capacity(workbook.sheets.len());
    for sheet in &workbook.sheets {
        let mut queries = Vec::with_capacity(sheet.items.len());
        for item in &sheet.items {
            let question = Question::new(
                session_id.clone(),
                sheet.sheet.clone(),
                item.row,
                item.query.clone(),
            );
            deps.questions.put(&question).await?;
            queries.push(question);
        }
        question_sheets.push(QuestionSheet {
            session_id: session_id.clone(),
            sheet: sheet.sheet.clone(),
            column: sheet.column,
            session_title: title.clone(),
            start_row: config.query_start_row,
            queries,
        });
    }

    // ========== 7. QUESTIONS ==========
    notify_best_effort(
        deps.notifier.as_ref(),
        &ProgressEvent::questions(user_id, &session_id, &question_sheets),
    )
    .await;

    // ========== 8. 逐题处理 ==========
    let question_flow = QuestionFlow::new(deps.questions.clone(), deps.notifier.clone(), config);
    let tokens = NotifierTokenSink::new(
        deps.notifier.clone(),
        user_id,
        &session_id,
        config.stream_tokens,
    );
    let answer_ctx = AnswerContext {
        user_id: user_id.to_string(),
        session_id: session_id.clone(),
        workspace_id: data.workspace_id.clone(),
        company_name: config.company_name.clone(),
        mode: data.mode.clone(),
        model_kwargs: data.model_kwargs.clone(),
    };

    let mut stats = RunStats {
        session_id: session_id.clone(),
        sheets: question_sheets.len(),
        total: workbook.total_items(),
        ..Default::default()
    };

    let mut index = 0usize;
    for sheet in &question_sheets {
        for question in &sheet.queries {
            index += 1;
            let ctx = QuestionCtx::new(
                session_id.clone(),
                user_id.to_string(),
                sheet.sheet.clone(),
                question.row,
                index,
                stats.total,
            );

            let outcome = question_flow
                .run(
                    adapter.as_ref(),
                    question,
                    &answer_ctx,
                    &ctx,
                    &tokens.for_run(question.question_id.clone()),
                )
                .await?;
            match outcome {
                QuestionOutcome::Answered => stats.answered += 1,
                QuestionOutcome::AnswerNotPersisted { .. } => stats.not_persisted += 1,
            }
        }
    }

    // ========== 9. FINAL_RESPONSE ==========
    notify_best_effort(
        deps.notifier.as_ref(),
        &ProgressEvent::final_response(user_id, &session_id, PROCESS_COMPLETE),
    )
    .await;

    log_run_complete(message_index, &stats);
    Ok(stats)
}

// ========== 日志辅助函数 ==========

fn log_run_start(message_index: usize, session_id: &str, source_key: &str) {
    info!("\n{}", "─".repeat(60));
    info!("[消息 {}] 🚀 开始处理批量问卷", message_index);
    info!("[会话 {}] 📄 源文件: {}", session_id, source_key);
    info!("{}", "─".repeat(60));
}

fn log_run_complete(message_index: usize, stats: &RunStats) {
    info!("\n{}", "─".repeat(60));
    info!("[消息 {}] ✓ 批量问卷处理完成", message_index);
    info!(
        "[会话 {}] 📊 成功: {}/{}",
        stats.session_id, stats.answered, stats.total
    );
    if stats.not_persisted > 0 {
        warn!(
            "[会话 {}] ⚠️ 答案写回失败: {}",
            stats.session_id, stats.not_persisted
        );
    }
    info!("{}", "─".repeat(60));
}
