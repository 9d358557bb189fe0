use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod integrity;
pub mod quiz;
pub mod submission;
pub mod timer;

/// Lifecycle of a single question inside an exam session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionStatus {
    NotVisited,
    UnAnswered,
    Answered,
    Review,
    ReviewWithAnswer,
}

impl QuestionStatus {
    pub fn has_answer(self) -> bool {
        matches!(self, QuestionStatus::Answered | QuestionStatus::ReviewWithAnswer)
    }

    pub fn is_flagged(self) -> bool {
        matches!(self, QuestionStatus::Review | QuestionStatus::ReviewWithAnswer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionState {
    InProgress,
    Submitting,
    Submitted,
}

/// Which trigger source won the race to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitReason {
    Manual,
    Timeout,
    IntegrityViolation,
}

impl SubmitReason {
    pub fn as_label(self) -> &'static str {
        match self {
            SubmitReason::Manual => "manual",
            SubmitReason::Timeout => "timeout",
            SubmitReason::IntegrityViolation => "integrity-violation",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateExamSessionRequest {
    pub quiz_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateExamSessionResponse {
    pub session_id: String,
    pub quiz: quiz::QuizSummary,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SelectOptionRequest {
    pub index: usize,
    pub option_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionIndexRequest {
    pub index: usize,
}

/// Read-only projection of a session for the front end.
#[derive(Debug, Clone, Serialize)]
pub struct ExamSessionView {
    pub session_id: String,
    pub quiz_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub state: SubmissionState,
    pub reason: Option<SubmitReason>,
    pub current_index: usize,
    pub statuses: Vec<QuestionStatus>,
    pub remaining_seconds: u64,
    pub violation_count: u32,
    pub integrity: integrity::IntegrityState,
    pub results_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnloadGuard {
    pub confirm: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionActionResponse {
    pub applied: bool,
    pub session: ExamSessionView,
}
