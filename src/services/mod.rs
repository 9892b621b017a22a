pub mod adapter_registry;
pub mod feedback_service;
pub mod llm_service;
pub mod pagination;
pub mod session_service;
pub mod sheet_reader;
pub mod sheet_writer;

pub use adapter_registry::{
    AdapterRegistry, AdapterTarget, AnswerAdapter, AnswerContext, NoopTokenSink, TokenSink,
};
pub use feedback_service::{ExportResult, FeedbackService};
pub use llm_service::{register_openai, LlmService};
pub use session_service::SessionService;
pub use sheet_reader::SheetReader;
pub use sheet_writer::{AssembledWorkbook, SheetWriter};
