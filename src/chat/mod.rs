//! Chat answering: intent classification, owner-scoped retrieval, and answer
//! generation in single-shot or streaming form.

mod prompts;
mod service;
mod stream;

pub use prompts::{NO_STUDY_CONTEXT_ANSWER, NO_WEB_CONTEXT_ANSWER};
pub use service::{
    AnswerMode, ChatError, ChatRequest, ChatResponse, ChatService, Retrieval, SearchContext,
};
pub use stream::{EventSource, StreamEvent};
