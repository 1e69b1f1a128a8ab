use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Failures raised by the quiz services and carried through `anyhow`
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Missing API key! Add OPENAI_API_KEY to the environment, a .env file or {secrets_file}")]
    MissingCredential { secrets_file: String },

    #[error("Network failure while calling {service}: {source}")]
    NetworkFailure {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned an error: {message}")]
    UpstreamError {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned a malformed response: {message}")]
    MalformedResponse {
        service: &'static str,
        message: String,
    },

    #[error("History file '{}' is not valid JSON: {source}", path.display())]
    MalformedPersistedHistory {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("History file I/O error: {0}")]
    HistoryIo(#[from] std::io::Error),

    #[error("Quiz session '{0}' not found")]
    SessionNotFound(Uuid),

    #[error("Quiz is already complete; start a new quiz")]
    QuizComplete,

    #[error("Finish the current quiz before starting a new one")]
    QuizInProgress,

    #[error("Next question available in {seconds_remaining} seconds")]
    AwaitingNextQuestion { seconds_remaining: i64 },

    #[error("'{0}' is not one of the options for this question")]
    InvalidChoice(String),

    #[error("Question {0} was already answered")]
    AlreadyAnswered(usize),
}

impl QuizError {
    pub fn network(service: &'static str, source: reqwest::Error) -> Self {
        QuizError::NetworkFailure { service, source }
    }
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(
                        context
                            .user_friendly_message
                            .unwrap_or_else(|| format!("{} not found", context.resource_type)),
                    )),
                )
            }
            ApiError::ValidationError(message) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(message.clone())),
                )
            }
            ApiError::Conflict(message) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Conflicting request"
                );
                (StatusCode::CONFLICT, Json(ApiResponse::error(message.clone())))
            }
            ApiError::UpstreamError(message) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Upstream service error"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ApiResponse::error(
                        context.user_friendly_message.unwrap_or_else(|| message.clone()),
                    )),
                )
            }
            ApiError::InternalError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Internal server error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "An internal error occurred. Please try again.".to_string(),
                    )),
                )
            }
        }
    }

    /// Simple conversion without context
    pub fn to_response(self) -> (StatusCode, Json<ApiResponse<()>>) {
        let context = ErrorContext::new("unknown", "resource");
        self.to_response_with_context(context)
    }
}

/// Map a service failure onto the HTTP error it should surface as
pub fn classify_quiz_error(error: anyhow::Error) -> ApiError {
    let quiz_error = match error.downcast::<QuizError>() {
        Ok(quiz_error) => quiz_error,
        Err(other) => return ApiError::InternalError(other),
    };

    match quiz_error {
        QuizError::SessionNotFound(_) => ApiError::NotFound(quiz_error.to_string()),
        QuizError::InvalidChoice(_) => ApiError::ValidationError(quiz_error.to_string()),
        QuizError::QuizComplete
        | QuizError::QuizInProgress
        | QuizError::AwaitingNextQuestion { .. }
        | QuizError::AlreadyAnswered(_) => ApiError::Conflict(quiz_error.to_string()),
        QuizError::NetworkFailure { .. }
        | QuizError::UpstreamError { .. }
        | QuizError::MalformedResponse { .. } => ApiError::UpstreamError(quiz_error.to_string()),
        QuizError::MissingCredential { .. }
        | QuizError::MalformedPersistedHistory { .. }
        | QuizError::HistoryIo(_) => ApiError::InternalError(quiz_error.into()),
    }
}
