//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责消费队列批次和调度流程，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批次处理器
//! - 逐条解码队列消息并按动作分类
//! - 心跳直接回推，对话交给 `ConversationHandler`，批量问卷交给 `run_processor`
//! - 在批次边界捕获单条消息的错误和 panic，互不影响
//! - 循环结束后为每条失败消息推送一条 `error` 事件
//!
//! ### `run_processor` - 单个批量问卷处理器
//! - 建会话、解析适配器、拆解工作簿、落库题目
//! - 按工作表、行顺序逐题委托 `QuestionFlow`
//! - 输出单个问卷的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<QueueRecord>)
//!     ↓
//! run_processor (处理 WorkbookQueries)
//!     ↓
//! workflow::QuestionFlow (处理单个 Question)
//!     ↓
//! services (能力层：拆解 / 适配器 / 回填)
//!     ↓
//! infrastructure (基础设施：存储 / 对象存储 / 通知)
//! ```

pub mod batch_processor;
pub mod run_processor;

use std::sync::Arc;

use crate::infrastructure::notifier::ProgressNotifier;
use crate::infrastructure::object_storage::ObjectStorage;
use crate::infrastructure::store::{QuestionStore, SessionStore};
use crate::services::adapter_registry::AdapterRegistry;

// 重新导出主要类型
pub use batch_processor::{
    BatchItemFailure, BatchProcessor, BatchResponse, MessageResult, MessageState,
};
pub use run_processor::{process_run, RunStats};

/// 流水线依赖的外部协作方
#[derive(Clone)]
pub struct PipelineDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub questions: Arc<dyn QuestionStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub notifier: Arc<dyn ProgressNotifier>,
    pub registry: Arc<AdapterRegistry>,
}
