//! Competency quiz content and scoring
//!
//! The bank is loaded once at startup and shared read-only. The rendered
//! page scores answers in the browser and reports a count; [`QuizBank::score`]
//! exists for submissions that send the chosen indices instead.

use serde::{Deserialize, Serialize};

use crate::error::{GuildgateError, Result};

/// Options every question must offer.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Default number of correct answers required to pass.
pub const DEFAULT_PASSING_SCORE: usize = 4;

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Question text
    pub prompt: String,
    /// Exactly four answer options, in display order
    pub options: Vec<String>,
    /// 0-based index of the correct option
    pub correct_index: usize,
}

impl QuizQuestion {
    fn new(prompt: &str, options: [&str; OPTIONS_PER_QUESTION], correct_index: usize) -> Self {
        Self {
            prompt: prompt.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
        }
    }
}

/// The full question set plus the passing threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizBank {
    /// Questions in presentation order
    pub questions: Vec<QuizQuestion>,
    /// Minimum correct answers to pass
    pub passing_score: usize,
}

impl QuizBank {
    /// Builds a bank after checking it is well formed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the bank is empty, a question does
    /// not have exactly four options, a correct index is out of range, or the
    /// threshold is zero or above the question count.
    pub fn new(questions: Vec<QuizQuestion>, passing_score: usize) -> Result<Self> {
        let bank = Self {
            questions,
            passing_score,
        };
        bank.validate()?;
        Ok(bank)
    }

    /// Checks the invariants described on [`QuizBank::new`].
    pub fn validate(&self) -> Result<()> {
        if self.questions.is_empty() {
            return Err(
                GuildgateError::Config("quiz must contain at least one question".to_string())
                    .into(),
            );
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.options.len() != OPTIONS_PER_QUESTION {
                return Err(GuildgateError::Config(format!(
                    "quiz question {} has {} options, expected {}",
                    i + 1,
                    q.options.len(),
                    OPTIONS_PER_QUESTION
                ))
                .into());
            }
            if q.correct_index >= q.options.len() {
                return Err(GuildgateError::Config(format!(
                    "quiz question {} has correct_index {} out of range",
                    i + 1,
                    q.correct_index
                ))
                .into());
            }
        }
        if self.passing_score == 0 || self.passing_score > self.questions.len() {
            return Err(GuildgateError::Config(format!(
                "quiz passing_score must be between 1 and {}",
                self.questions.len()
            ))
            .into());
        }
        Ok(())
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank has no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Whether `correct` meets the threshold.
    pub fn passes(&self, correct: usize) -> bool {
        correct >= self.passing_score
    }

    /// Counts correct answers from chosen option indices.
    ///
    /// Returns `None` unless exactly one answer per question is given.
    pub fn score(&self, answers: &[usize]) -> Option<usize> {
        if answers.len() != self.questions.len() {
            return None;
        }
        Some(
            self.questions
                .iter()
                .zip(answers)
                .filter(|(q, a)| q.correct_index == **a)
                .count(),
        )
    }
}

impl Default for QuizBank {
    /// Five introductory questions about version control and open source.
    fn default() -> Self {
        Self {
            questions: vec![
                QuizQuestion::new(
                    "What is the primary purpose of version control systems?",
                    [
                        "To design websites",
                        "To track and manage source code changes",
                        "To create databases",
                        "To manage server configurations",
                    ],
                    1,
                ),
                QuizQuestion::new(
                    "What does Git stand for?",
                    [
                        "Global Information Tracker",
                        "Git is not an acronym",
                        "Graphic Interface Tool",
                        "General Integration Technique",
                    ],
                    1,
                ),
                QuizQuestion::new(
                    "What is a pull request in GitHub?",
                    [
                        "A way to download code",
                        "A method to merge code changes",
                        "A type of Git command",
                        "A server configuration",
                    ],
                    1,
                ),
                QuizQuestion::new(
                    "What is open-source software?",
                    [
                        "Software that costs nothing",
                        "Software with source code available to modify and distribute",
                        "A type of operating system",
                        "A programming language",
                    ],
                    1,
                ),
                QuizQuestion::new(
                    "What is a repository in GitHub?",
                    [
                        "A type of database",
                        "A project's file storage and version history",
                        "A coding standard",
                        "A type of server",
                    ],
                    1,
                ),
            ],
            passing_score: DEFAULT_PASSING_SCORE,
        }
    }
}
