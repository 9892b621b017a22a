//! 反馈与导出 - 业务能力层
//!
//! 人工反馈覆盖生成答案；导出时读取会话全部题目，回填到源工作簿后写回原对象键。

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::object_storage::ObjectStorage;
use crate::infrastructure::store::{QuestionStore, SessionStore};
use crate::models::session::{compound_key, BATCH_SESSION_KIND};
use crate::services::pagination::list_questions_by_session;
use crate::services::sheet_writer::SheetWriter;

/// 导出结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportResult {
    pub id: String,
    pub key: String,
}

pub struct FeedbackService {
    sessions: Arc<dyn SessionStore>,
    questions: Arc<dyn QuestionStore>,
    storage: Arc<dyn ObjectStorage>,
    bucket: String,
    writer: SheetWriter,
}

impl FeedbackService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        questions: Arc<dyn QuestionStore>,
        storage: Arc<dyn ObjectStorage>,
        config: &Config,
    ) -> AppResult<Self> {
        Ok(Self {
            sessions,
            questions,
            storage,
            bucket: config.files_bucket.clone(),
            writer: SheetWriter::new(config.query_start_row, config.query_column)?,
        })
    }

    /// 写入人工反馈
    pub async fn add_feedback(
        &self,
        session_id: &str,
        question_id: &str,
        text: &str,
    ) -> AppResult<()> {
        self.questions.update_feedback(question_id, session_id, text).await?;
        info!("[会话 {}] ✓ 题目 {} 已记录反馈", session_id, question_id);
        Ok(())
    }

    /// 回填并写回源对象键
    pub async fn export_workbook(
        &self,
        session_id: &str,
        source_key: Option<&str>,
    ) -> AppResult<ExportResult> {
        let key = source_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::MissingSource {
                session_id: session_id.to_string(),
            })?;

        let questions = list_questions_by_session(self.questions.as_ref(), session_id).await?;
        let source = self.storage.get_object(&self.bucket, key).await?;
        let assembled = self.writer.write(&source, &questions)?;

        self.storage.put_object(&self.bucket, key, assembled.bytes).await?;
        info!(
            "[会话 {}] 📤 已导出 {} 个答案到 {}",
            session_id, assembled.answers_written, key
        );

        Ok(ExportResult {
            id: session_id.to_string(),
            key: key.to_string(),
        })
    }

    /// 从会话记录中取源对象键后导出
    pub async fn export_session_workbook(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> AppResult<ExportResult> {
        let session = self
            .sessions
            .get(user_id, &compound_key(BATCH_SESSION_KIND, session_id))
            .await?;
        let source_key = session.and_then(|s| s.source_key);
        self.export_workbook(session_id, source_key.as_deref()).await
    }
}
