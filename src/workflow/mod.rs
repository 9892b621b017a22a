pub mod chat_flow;
pub mod question_ctx;
pub mod question_flow;
pub mod token_sink;

pub use chat_flow::{ChatFlow, ConversationHandler};
pub use question_ctx::QuestionCtx;
pub use question_flow::{invoke_adapter, QuestionFlow, QuestionOutcome};
pub use token_sink::NotifierTokenSink;
