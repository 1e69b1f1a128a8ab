use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::{Config, QuizConfig},
    errors::{ErrorContext, QuizError, classify_quiz_error},
    explanation_service::ExplanationService,
    history_log::HistoryLog,
    models::*,
    quiz_session::{PendingAnswer, QuizSession, evict_sessions},
    trivia_client::TriviaClient,
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub trivia_client: TriviaClient,
    pub explanation_service: ExplanationService,
    pub history: Arc<Mutex<HistoryLog>>,
    pub quiz_sessions: Arc<Mutex<HashMap<Uuid, QuizSession>>>,
    pub quiz_config: QuizConfig,
}

impl AppState {
    pub fn new(
        trivia_client: TriviaClient,
        explanation_service: ExplanationService,
        history: HistoryLog,
        quiz_config: QuizConfig,
    ) -> Self {
        Self {
            trivia_client,
            explanation_service,
            history: Arc::new(Mutex::new(history)),
            quiz_sessions: Arc::new(Mutex::new(HashMap::new())),
            quiz_config,
        }
    }

    pub fn from_config(config: &Config, history: HistoryLog) -> Self {
        Self::new(
            TriviaClient::from_config(&config.trivia),
            ExplanationService::from_config(&config.llm),
            history,
            config.quiz.clone(),
        )
    }

    fn pause(&self) -> Duration {
        Duration::seconds(self.quiz_config.pause_seconds)
    }

    fn session_idle_ttl(&self) -> Duration {
        Duration::minutes(self.quiz_config.session_idle_minutes)
    }
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

fn error_response(
    operation: &str,
    session_id: Option<Uuid>,
    error: anyhow::Error,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let mut context = ErrorContext::new(operation, "quiz_session");
    if let Some(id) = session_id {
        context = context.with_id(&id.to_string());
    }
    classify_quiz_error(error).to_response_with_context(context)
}

// Quiz endpoints
pub async fn start_quiz(State(state): State<AppState>) -> ApiResult<SessionView> {
    log_api_start!("start_quiz");

    let questions = match state
        .trivia_client
        .fetch_questions(state.quiz_config.question_count)
        .await
    {
        Ok(questions) => questions,
        Err(e) => {
            log_api_error!("start_quiz", error = e, "could not fetch questions");
            return Err(error_response("start_quiz", None, e));
        }
    };

    let session = QuizSession::new(questions);
    let session_id = session.id();
    let view = session.view(Utc::now(), state.quiz_config.shuffle_options);

    info!(
        session_id = %session_id,
        question_count = session.state().len(),
        created_at = %session.created_at(),
        "Quiz session started"
    );

    let mut sessions = state.quiz_sessions.lock().await;
    let evicted = evict_sessions(
        &mut sessions,
        Utc::now(),
        state.session_idle_ttl(),
        state.quiz_config.max_sessions,
    );
    if evicted > 0 {
        debug!(evicted, remaining = sessions.len(), "Evicted stale quiz sessions");
    }
    sessions.insert(session_id, session);

    Ok(Json(ApiResponse::success(view)))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionView> {
    log_api_start!("get_quiz", session_id = session_id);

    let mut sessions = state.quiz_sessions.lock().await;
    match sessions.get_mut(&session_id) {
        Some(session) => {
            let now = Utc::now();
            session.touch(now);
            let view = session.view(now, state.quiz_config.shuffle_options);
            debug!(session_id = %session_id, stats = ?view.stats, "Rendered quiz view");
            Ok(Json(ApiResponse::success(view)))
        }
        None => {
            log_api_warn!("get_quiz", session_id = session_id, "session not found");
            Err(error_response(
                "get_quiz",
                Some(session_id),
                QuizError::SessionNotFound(session_id).into(),
            ))
        }
    }
}

pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SubmitAnswerRequest>,
) -> ApiResult<AnswerFeedback> {
    log_api_start!("submit_answer", session_id = session_id);

    // Validate against the current question without holding the lock over the LLM call
    let pending = {
        let sessions = state.quiz_sessions.lock().await;
        let prepared = sessions
            .get(&session_id)
            .ok_or(QuizError::SessionNotFound(session_id))
            .and_then(|session| session.prepare_answer(&request.choice, Utc::now()));

        match prepared {
            Ok(pending) => pending,
            Err(e) => {
                log_api_warn!("submit_answer", session_id = session_id, e.to_string());
                return Err(error_response("submit_answer", Some(session_id), e.into()));
            }
        }
    };

    info!(
        session_id = %session_id,
        question_number = pending.question_index + 1,
        is_correct = (pending.choice == pending.question.correct_answer),
        "Answer received, requesting explanation"
    );

    let explanation = match state
        .explanation_service
        .explain(&pending.question.text, &pending.question.correct_answer)
        .await
    {
        Ok(explanation) => explanation,
        Err(e) => {
            log_api_error!("submit_answer", session_id = session_id, error = e, "explanation request failed");
            return Err(error_response("submit_answer", Some(session_id), e));
        }
    };

    // History appends are serialized; the session map is only locked for the
    // checks on either side of the file write
    let mut history = state.history.lock().await;

    if let Err(e) = check_still_pending(&state, session_id, &pending).await {
        log_api_warn!("submit_answer", session_id = session_id, e.to_string());
        return Err(error_response("submit_answer", Some(session_id), e.into()));
    }

    let entry = pending.history_entry(&explanation);
    if let Err(e) = history.append(entry).await {
        log_api_error!("submit_answer", session_id = session_id, error = e, "could not persist history");
        return Err(error_response("submit_answer", Some(session_id), e));
    }

    let recorded = {
        let mut sessions = state.quiz_sessions.lock().await;
        sessions
            .get_mut(&session_id)
            .ok_or(QuizError::SessionNotFound(session_id))
            .and_then(|session| session.record_answer(pending, explanation, state.pause(), Utc::now()))
    };
    drop(history);

    match recorded {
        Ok(feedback) => {
            log_api_success!(
                "submit_answer",
                session_id = session_id,
                format!(
                    "question {} answered {}",
                    feedback.question_number,
                    if feedback.is_correct { "correctly" } else { "incorrectly" }
                )
            );
            Ok(Json(ApiResponse::success(feedback)))
        }
        Err(e) => {
            log_api_warn!("submit_answer", session_id = session_id, e.to_string());
            Err(error_response("submit_answer", Some(session_id), e.into()))
        }
    }
}

async fn check_still_pending(
    state: &AppState,
    session_id: Uuid,
    pending: &PendingAnswer,
) -> Result<(), QuizError> {
    let sessions = state.quiz_sessions.lock().await;
    sessions
        .get(&session_id)
        .ok_or(QuizError::SessionNotFound(session_id))
        .and_then(|session| session.check_pending(pending))
}

pub async fn restart_quiz(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionView> {
    log_api_start!("restart_quiz", session_id = session_id);

    let restartable = state
        .quiz_sessions
        .lock()
        .await
        .get(&session_id)
        .ok_or(QuizError::SessionNotFound(session_id))
        .and_then(|session| session.ensure_restartable(Utc::now()));
    if let Err(e) = restartable {
        log_api_warn!("restart_quiz", session_id = session_id, e.to_string());
        return Err(error_response("restart_quiz", Some(session_id), e.into()));
    }

    let questions = match state
        .trivia_client
        .fetch_questions(state.quiz_config.question_count)
        .await
    {
        Ok(questions) => questions,
        Err(e) => {
            log_api_error!("restart_quiz", session_id = session_id, error = e, "could not fetch questions");
            return Err(error_response("restart_quiz", Some(session_id), e));
        }
    };

    let now = Utc::now();
    let mut sessions = state.quiz_sessions.lock().await;
    let restarted = sessions
        .get_mut(&session_id)
        .ok_or(QuizError::SessionNotFound(session_id))
        .and_then(|session| {
            session.restart(questions, now)?;
            Ok(session.view(now, state.quiz_config.shuffle_options))
        });

    match restarted {
        Ok(view) => {
            log_api_success!("restart_quiz", session_id = session_id, "fresh batch loaded");
            Ok(Json(ApiResponse::success(view)))
        }
        Err(e) => Err(error_response("restart_quiz", Some(session_id), e.into())),
    }
}

// History endpoints
pub async fn get_history(State(state): State<AppState>) -> Json<ApiResponse<Vec<HistoryEntry>>> {
    let history = state.history.lock().await;
    log_api_success!("get_history", count = history.len(), "history returned");
    Json(ApiResponse::success(history.entries().to_vec()))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Quiz session routes
        .route("/api/quiz/start", post(start_quiz))
        .route("/api/quiz/:id", get(get_quiz))
        .route("/api/quiz/:id/answer", post(submit_answer))
        .route("/api/quiz/:id/restart", post(restart_quiz))

        // History routes
        .route("/api/history", get(get_history))

        .route("/health", get(health))
        .with_state(state)
}
