pub mod chat;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod intents;
pub mod models;
pub mod openai;
pub mod similarity;
pub mod summary;

pub use chat::{
    ChatBackend, ChatError, ChatMessage, CompletionRequest, OpenAiChatClient, Role, UnconfiguredChat,
};
pub use config::TextsimConfig;
pub use embeddings::{
    EmbeddingBackend, EmbeddingError, OpenAiEmbeddingClient, UnconfiguredEmbeddings,
};
pub use error::TextsimError;
pub use intents::{IntentError, IntentGenerator};
pub use models::{SessionRecord, TextPair};
pub use openai::ClientSettings;
pub use similarity::{SimilarityOutcome, SimilarityScorer};
pub use summary::Summarizer;
