use serde::{Deserialize, Serialize};

use crate::models::{AnswerOutcome, Question, QuizStats, QuizSummary};

/// Progress through one batch of questions.
///
/// `current_index` runs from 0 to `questions.len()`; reaching the length means
/// the quiz is complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizState {
    questions: Vec<Question>,
    current_index: usize,
    score: usize,
    given_answers: Vec<String>,
}

impl QuizState {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            current_index: 0,
            score: 0,
            given_answers: Vec::new(),
        }
    }

    /// Reset every field for a fresh batch
    pub fn initialize(&mut self, questions: Vec<Question>) {
        *self = Self::new(questions);
    }

    /// Score `choice` against the current question and move to the next one.
    ///
    /// Returns `None` once the quiz is complete.
    pub fn submit(&mut self, choice: &str) -> Option<AnswerOutcome> {
        let question = self.questions.get(self.current_index)?;

        let is_correct = choice == question.correct_answer;
        let outcome = AnswerOutcome {
            question_index: self.current_index,
            is_correct,
            correct_answer: question.correct_answer.clone(),
        };

        if is_correct {
            self.score += 1;
        }
        self.given_answers.push(choice.to_string());
        self.current_index += 1;

        Some(outcome)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn given_answers(&self) -> &[String] {
        &self.given_answers
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn stats(&self) -> QuizStats {
        QuizStats {
            questions: self.questions.len(),
            correct: self.score,
            wrong: self.given_answers.len() - self.score,
        }
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary::new(self.score, self.questions.len())
    }
}
