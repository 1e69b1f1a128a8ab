pub mod api;
pub mod config;
pub mod errors;
pub mod explanation_service;
pub mod history_log;
pub mod llm_providers;
pub mod logging;
pub mod models;
pub mod quiz_session;
pub mod quiz_state;
pub mod trivia_client;

pub use config::Config;
pub use errors::*;
pub use explanation_service::ExplanationService;
pub use history_log::HistoryLog;
pub use llm_providers::{LLMProvider, LLMProviderFactory, LLMProviderType};
pub use models::*;
pub use quiz_session::{QuizPhase, QuizSession};
pub use quiz_state::QuizState;
pub use trivia_client::TriviaClient;
