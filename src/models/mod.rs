pub mod event;
pub mod loaders;
pub mod message;
pub mod question;
pub mod session;

pub use event::{EventAction, ProgressEvent};
pub use loaders::load_batch_file;
pub use message::{InboundMessage, MessageKind, QueueBatch, QueueRecord, RunData};
pub use question::{Question, QuestionSheet, QueryItem, SheetQueries, WorkbookQueries};
pub use session::{DeleteResult, HistoryEntry, Session, SessionDetail};
