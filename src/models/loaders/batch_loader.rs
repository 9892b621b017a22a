use crate::models::message::{QueueBatch, QueueRecord};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 JSON 文件加载一批队列记录
///
/// 文件格式：`{"Records": [{"messageId": "...", "body": "..."}]}`
pub async fn load_batch_file(batch_file_path: &Path) -> Result<Vec<QueueRecord>> {
    if !batch_file_path.exists() {
        anyhow::bail!("批次文件不存在: {}", batch_file_path.display());
    }

    let content = fs::read_to_string(batch_file_path)
        .await
        .with_context(|| format!("无法读取批次文件: {}", batch_file_path.display()))?;

    let batch: QueueBatch = serde_json::from_str(&content)
        .with_context(|| format!("无法解析批次文件: {}", batch_file_path.display()))?;

    tracing::info!(
        "已加载 {}: {} 条消息",
        batch_file_path.file_name().unwrap_or_default().to_string_lossy(),
        batch.records.len()
    );

    Ok(batch.records)
}
