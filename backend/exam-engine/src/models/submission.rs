use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{QuestionStatus, SubmitReason};

/// Body POSTed to the scoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub answers: BTreeMap<String, AnswerPayload>,
    pub time_spent_total_seconds: u64,
    pub per_question_time_seconds: BTreeMap<String, u64>,
    pub submit_reason: SubmitReason,
    pub violation_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub selected_option: Option<String>,
    pub status: QuestionStatus,
}

/// What the session hands back once its single submission has completed.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub reason: SubmitReason,
    pub delivered: bool,
    pub results_url: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum TriggerOutcome {
    Submitted(SubmissionReceipt),
    /// Another trigger already won; nothing happened.
    Ignored,
}

impl TriggerOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, TriggerOutcome::Submitted(_))
    }
}
