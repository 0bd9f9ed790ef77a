//! Question answering on top of the inference provider and the RAG pipeline.

mod manager;

pub use manager::{Answer, AnswerStatus, ChatManager, ConversationTurn, ToolCallRecord, NO_RESPONSE_CONTENT};
