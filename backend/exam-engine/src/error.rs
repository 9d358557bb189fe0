use thiserror::Error;

/// Failures that stop a session from being created or addressed.
///
/// Submission never fails from the caller's point of view, so there is no
/// variant for it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Quiz not found: {0}")]
    QuizNotFound(String),

    #[error("Quiz {quiz_id} could not be loaded")]
    QuizUnavailable {
        quiz_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid quiz descriptor: {0}")]
    InvalidQuiz(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl EngineError {
    pub fn quiz_unavailable(quiz_id: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        EngineError::QuizUnavailable {
            quiz_id: quiz_id.into(),
            source: source.into(),
        }
    }
}
