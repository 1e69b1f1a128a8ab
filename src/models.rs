use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized multiple-choice trivia question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub correct_answer: String,
    pub options: Vec<String>, // incorrect answers followed by the correct one
    pub category: String,
    pub difficulty: String,
}

impl Question {
    pub fn has_option(&self, choice: &str) -> bool {
        self.options.iter().any(|option| option == choice)
    }
}

/// One persisted record of an answered question.
///
/// Field names on disk match the log format written by earlier versions of the quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "question")]
    pub question_text: String,
    #[serde(rename = "your_answer")]
    pub user_answer: String,
    pub correct_answer: String,
    pub explanation: String,
}

/// Result of scoring a single submission against the quiz state
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub question_index: usize,
    pub is_correct: bool,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub question_number: usize,
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: String,
    pub next_question_at: DateTime<Utc>,
}

/// Question as shown to the player; options may be reordered for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub number: usize,
    pub total: usize,
    pub text: String,
    pub category: String,
    pub difficulty: String,
    pub options: Vec<String>,
}

/// Footer counters: questions in the batch, correct and wrong answers so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizStats {
    pub questions: usize,
    pub correct: usize,
    pub wrong: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
    pub score_display: String,
    pub percentage_display: String,
}

impl QuizSummary {
    pub fn new(score: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            score as f64 / total as f64 * 100.0
        };

        Self {
            score,
            total,
            percentage,
            score_display: format!("{} / {}", score, total),
            percentage_display: format!("{:.0}%", percentage),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum QuizView {
    InProgress {
        question: QuestionView,
    },
    Reviewing {
        feedback: AnswerFeedback,
        seconds_remaining: i64,
    },
    Complete {
        summary: QuizSummary,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: uuid::Uuid,
    #[serde(flatten)]
    pub view: QuizView,
    pub stats: QuizStats,
    pub last_answer: Option<AnswerFeedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub choice: String,
}
