use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::QuizError;
use crate::models::{
    AnswerFeedback, HistoryEntry, Question, QuestionView, QuizView, SessionView,
};
use crate::quiz_state::QuizState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    InProgress,
    /// Showing feedback for the last answer until `next_question_at`
    Reviewing,
    Complete,
}

/// An answer that passed validation and is waiting for its explanation
#[derive(Debug, Clone)]
pub struct PendingAnswer {
    pub batch: u64,
    pub question_index: usize,
    pub question: Question,
    pub choice: String,
}

impl PendingAnswer {
    pub fn history_entry(&self, explanation: &str) -> HistoryEntry {
        HistoryEntry {
            question_text: self.question.text.clone(),
            user_answer: self.choice.clone(),
            correct_answer: self.question.correct_answer.clone(),
            explanation: explanation.to_string(),
        }
    }
}

/// One player's quiz: the question batch, progress, and the timed hand-off
/// between an answered question and the next one.
///
/// `batch` counts restarts so an answer prepared against an earlier batch can
/// never be scored against a later one.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: Uuid,
    state: QuizState,
    batch: u64,
    last_answer: Option<AnswerFeedback>,
    next_question_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: QuizState::new(questions),
            batch: 0,
            last_answer: None,
            next_question_at: None,
            created_at: now,
            last_active: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &QuizState {
        &self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = self.last_active.max(now);
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_ttl: Duration) -> bool {
        now - self.last_active >= idle_ttl
    }

    pub fn phase(&self, now: DateTime<Utc>) -> QuizPhase {
        match self.next_question_at {
            Some(at) if at > now => QuizPhase::Reviewing,
            _ if self.state.is_complete() => QuizPhase::Complete,
            _ => QuizPhase::InProgress,
        }
    }

    /// Render the session as the page should currently show it
    pub fn view(&self, now: DateTime<Utc>, shuffle_options: bool) -> SessionView {
        let view = match (self.phase(now), &self.last_answer, self.state.current_question()) {
            (QuizPhase::Reviewing, Some(feedback), _) => QuizView::Reviewing {
                feedback: feedback.clone(),
                seconds_remaining: seconds_until(feedback.next_question_at, now),
            },
            (QuizPhase::InProgress, _, Some(question)) => QuizView::InProgress {
                question: QuestionView {
                    number: self.state.current_index() + 1,
                    total: self.state.len(),
                    text: question.text.clone(),
                    category: question.category.clone(),
                    difficulty: question.difficulty.clone(),
                    options: display_options(question, shuffle_options),
                },
            },
            _ => QuizView::Complete {
                summary: self.state.summary(),
            },
        };

        SessionView {
            session_id: self.id,
            view,
            stats: self.state.stats(),
            last_answer: self.last_answer.clone(),
        }
    }

    /// Validate `choice` against the question currently on screen
    pub fn prepare_answer(&self, choice: &str, now: DateTime<Utc>) -> Result<PendingAnswer, QuizError> {
        match self.phase(now) {
            QuizPhase::Complete => return Err(QuizError::QuizComplete),
            QuizPhase::Reviewing => {
                let at = self.next_question_at.unwrap_or(now);
                return Err(QuizError::AwaitingNextQuestion {
                    seconds_remaining: seconds_until(at, now),
                });
            }
            QuizPhase::InProgress => {}
        }

        let question = self
            .state
            .current_question()
            .ok_or(QuizError::QuizComplete)?;

        if !question.has_option(choice) {
            return Err(QuizError::InvalidChoice(choice.to_string()));
        }

        Ok(PendingAnswer {
            batch: self.batch,
            question_index: self.state.current_index(),
            question: question.clone(),
            choice: choice.to_string(),
        })
    }

    /// Make sure the question `pending` was prepared for is still the current one
    pub fn check_pending(&self, pending: &PendingAnswer) -> Result<(), QuizError> {
        let same_question = pending.batch == self.batch
            && self.state.current_index() == pending.question_index
            && self.state.current_question() == Some(&pending.question);

        if !same_question {
            return Err(QuizError::AlreadyAnswered(pending.question_index + 1));
        }
        Ok(())
    }

    /// Score the answer and schedule the move to the next question
    pub fn record_answer(
        &mut self,
        pending: PendingAnswer,
        explanation: String,
        pause: Duration,
        now: DateTime<Utc>,
    ) -> Result<AnswerFeedback, QuizError> {
        self.check_pending(&pending)?;

        let outcome = self
            .state
            .submit(&pending.choice)
            .ok_or(QuizError::QuizComplete)?;

        let next_question_at = now + pause;
        let feedback = AnswerFeedback {
            question_number: outcome.question_index + 1,
            question: pending.question.text,
            user_answer: pending.choice,
            correct_answer: outcome.correct_answer,
            is_correct: outcome.is_correct,
            explanation,
            next_question_at,
        };

        self.next_question_at = Some(next_question_at);
        self.last_answer = Some(feedback.clone());
        self.touch(now);

        Ok(feedback)
    }

    /// A new batch may only replace one that has been played to the end
    pub fn ensure_restartable(&self, now: DateTime<Utc>) -> Result<(), QuizError> {
        match self.phase(now) {
            QuizPhase::Complete => Ok(()),
            QuizPhase::InProgress | QuizPhase::Reviewing => Err(QuizError::QuizInProgress),
        }
    }

    /// Start over with a fresh batch at question one
    pub fn restart(&mut self, questions: Vec<Question>, now: DateTime<Utc>) -> Result<(), QuizError> {
        self.ensure_restartable(now)?;

        self.state.initialize(questions);
        self.batch += 1;
        self.last_answer = None;
        self.next_question_at = None;
        self.touch(now);
        Ok(())
    }
}

/// Drop idle sessions, then the least recently active ones until there is
/// room for one more. Returns how many were removed.
pub fn evict_sessions(
    sessions: &mut HashMap<Uuid, QuizSession>,
    now: DateTime<Utc>,
    idle_ttl: Duration,
    max_sessions: usize,
) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_idle(now, idle_ttl));

    while !sessions.is_empty() && sessions.len() >= max_sessions {
        let oldest = sessions
            .values()
            .min_by_key(|session| session.last_active())
            .map(|session| session.id());
        match oldest {
            Some(id) => {
                sessions.remove(&id);
            }
            None => break,
        }
    }

    before - sessions.len()
}

fn display_options(question: &Question, shuffle: bool) -> Vec<String> {
    let mut options = question.options.clone();
    if shuffle {
        options.shuffle(&mut rand::thread_rng());
    }
    options
}

/// Whole seconds left until `at`, rounded up
fn seconds_until(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (at - now).num_milliseconds();
    if millis <= 0 { 0 } else { (millis + 999) / 1000 }
}
