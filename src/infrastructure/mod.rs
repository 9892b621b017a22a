//! 基础设施层（Infrastructure）
//!
//! 持有外部资源（存储、对象存储、通知通道），只暴露能力，不含业务流程。

pub mod notifier;
pub mod object_storage;
pub mod store;

pub use notifier::{
    notify_best_effort, HttpNotifier, LogNotifier, ProgressNotifier, RecordingNotifier,
};
pub use object_storage::{InMemoryObjectStorage, LocalObjectStorage, ObjectStorage};
pub use store::{InMemoryQuestionStore, InMemorySessionStore, Page, QuestionStore, SessionStore};
