use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;

use crate::metrics::{SCORING_REQUESTS_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::quiz::QuizDescriptor;
use crate::models::submission::{AnswerPayload, SubmissionPayload, SubmissionReceipt};
use crate::models::{QuestionStatus, SubmissionState, SubmitReason};

use super::deadline_controller::DeadlineController;
use super::exam_session::SessionState;
use super::scoring_client::ScoringClient;
use super::status_machine::QuestionStatusMachine;
use super::time_tracker::TimeTracker;

/// Status reported to the scorer for one question of a frozen session.
pub fn payload_status(selected: bool, flagged: bool, touched: bool) -> QuestionStatus {
    match (selected, flagged) {
        (true, false) => QuestionStatus::Answered,
        (true, true) => QuestionStatus::ReviewWithAnswer,
        (false, true) => QuestionStatus::Review,
        (false, false) if touched => QuestionStatus::UnAnswered,
        (false, false) => QuestionStatus::NotVisited,
    }
}

pub fn assemble_payload(
    quiz: &QuizDescriptor,
    statuses: &QuestionStatusMachine,
    timing: &TimeTracker,
    reason: SubmitReason,
    violation_count: u32,
) -> SubmissionPayload {
    let ledger = statuses.ledger();
    let mut answers = BTreeMap::new();
    let mut per_question_time_seconds = BTreeMap::new();

    for (index, question) in quiz.questions.iter().enumerate() {
        let selected_option = ledger.selected(index).map(str::to_string);
        let touched = statuses.is_visited(index) || ledger.get(index).is_some();
        let status = payload_status(
            selected_option.is_some(),
            statuses.is_flagged(index),
            touched,
        );

        answers.insert(
            question.id.clone(),
            AnswerPayload {
                selected_option,
                status,
            },
        );
        per_question_time_seconds.insert(question.id.clone(), timing.seconds(index));
    }

    SubmissionPayload {
        answers,
        time_spent_total_seconds: timing.total_seconds(),
        per_question_time_seconds,
        submit_reason: reason,
        violation_count,
    }
}

/// Turns the three trigger sources into one submission.
///
/// [`begin`] is the race-breaking check-and-set and must run under the session
/// lock; [`deliver`] runs after the lock is released.
///
/// [`begin`]: SubmissionCoordinator::begin
/// [`deliver`]: SubmissionCoordinator::deliver
pub struct SubmissionCoordinator {
    scoring: Arc<dyn ScoringClient>,
    results_base_url: String,
}

impl SubmissionCoordinator {
    pub fn new(scoring: Arc<dyn ScoringClient>, results_base_url: impl Into<String>) -> Self {
        Self {
            scoring,
            results_base_url: results_base_url.into(),
        }
    }

    /// Moves the session to `Submitting` and freezes it. Returns `None` when
    /// another trigger got there first.
    pub fn begin(
        &self,
        state: &mut SessionState,
        quiz: &QuizDescriptor,
        reason: SubmitReason,
        deadline: &DeadlineController,
        now: Instant,
    ) -> Option<SubmissionPayload> {
        if state.submission != SubmissionState::InProgress || state.torn_down {
            tracing::debug!(
                quiz_id = %quiz.id,
                reason = reason.as_label(),
                "Submission trigger ignored"
            );
            return None;
        }
        state.submission = SubmissionState::Submitting;
        state.reason = Some(reason);

        deadline.stop();
        state.timing.finalize(now);
        state.statuses.freeze();

        SUBMISSIONS_TOTAL
            .with_label_values(&[reason.as_label()])
            .inc();
        tracing::info!(
            quiz_id = %quiz.id,
            reason = reason.as_label(),
            "Submission started"
        );

        Some(assemble_payload(
            quiz,
            &state.statuses,
            &state.timing,
            reason,
            state.integrity.violation_count(),
        ))
    }

    /// Best-effort POST. A failure is logged and reported in the receipt, it
    /// never keeps the user in the exam.
    pub async fn deliver(
        &self,
        quiz_id: &str,
        reason: SubmitReason,
        payload: &SubmissionPayload,
    ) -> SubmissionReceipt {
        let delivered = match self.scoring.submit(quiz_id, payload).await {
            Ok(()) => {
                SCORING_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
                true
            }
            Err(e) => {
                SCORING_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!(
                    "Scoring submission failed for quiz {}, continuing to results: {:#}",
                    quiz_id,
                    e
                );
                false
            }
        };

        SubmissionReceipt {
            reason,
            delivered,
            results_url: self.results_url(quiz_id),
            submitted_at: Utc::now(),
        }
    }

    pub fn results_url(&self, quiz_id: &str) -> String {
        format!("{}/{}", self.results_base_url.trim_end_matches('/'), quiz_id)
    }
}
