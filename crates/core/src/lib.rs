pub mod message;
pub mod settings;
pub mod status;

pub use message::{ChatMessage, ChatRole, SourceChunk};
pub use settings::{ChatOverrides, ChatSettings, ContextExpansion, RetrievalMode};
pub use status::{DocumentStatus, DocumentStatusSnapshot};
