//! Retrieval-augmented MCQ generation: context retrieval, prompt assembly,
//! the language-model client and the per-topic retry orchestration.

pub mod extract;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;

pub use llm::{LanguageModel, OllamaClient};
pub use orchestrator::{
    AttemptOutcome, GenerationAttempt, GenerationReport, Orchestrator, RetryReason, TopicReport,
    TopicStatus,
};
pub use retriever::Retriever;
