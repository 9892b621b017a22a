//! # RFP Batch Answer
//!
//! 一个把问卷表格批量交给大模型作答的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `QuestionStore` / `SessionStore` - 分页查询的会话、题目存储
//! - `ObjectStorage` - 源工作簿与导出工作簿的读写
//! - `ProgressNotifier` - 向客户端推送进度事件
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个对象
//! - `SheetReader` / `SheetWriter` - 工作簿拆解与回填
//! - `AdapterRegistry` / `LlmService` - 按 (provider, model) 选择答案后端
//! - `SessionService` / `FeedbackService` - 会话查询、人工反馈与导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"和"一轮对话"的完整处理流程
//! - `QuestionCtx` - 上下文封装（会话 + 工作表 + 行）
//! - `QuestionFlow` - 流程编排（生成答案 → 推送 → 写回）
//! - `ChatFlow` - 对话模式（生成答案 → 追加历史）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 队列批次处理器，隔离单条消息的失败
//! - `orchestrator/run_processor` - 单个批量问卷处理器，遍历全部题目
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::question::Question;
pub use orchestrator::{BatchProcessor, BatchResponse, PipelineDeps};
pub use workflow::{QuestionCtx, QuestionFlow, QuestionOutcome};
