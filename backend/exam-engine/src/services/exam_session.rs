use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use uuid::Uuid;

use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::models::integrity::{IntegrityOutcome, Visibility};
use crate::models::quiz::QuizDescriptor;
use crate::models::submission::{SubmissionPayload, SubmissionReceipt, TriggerOutcome};
use crate::models::timer::TimerEvent;
use crate::models::{
    ExamSessionView, QuestionStatus, SubmissionState, SubmitReason, UnloadGuard,
};
use crate::utils::time::{ceil_seconds, wall_clock_after};

use super::deadline_controller::DeadlineController;
use super::integrity_monitor::IntegrityMonitor;
use super::status_machine::QuestionStatusMachine;
use super::submission_coordinator::SubmissionCoordinator;
use super::time_tracker::TimeTracker;

pub const UNLOAD_WARNING: &str = "Your exam is still in progress. Leaving now will lose your progress.";

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub tick_interval: Duration,
    pub min_transition: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            min_transition: super::time_tracker::DEFAULT_MIN_TRANSITION,
        }
    }
}

/// Everything a session mutates, guarded by one lock.
#[derive(Debug)]
pub struct SessionState {
    pub(crate) submission: SubmissionState,
    pub(crate) reason: Option<SubmitReason>,
    pub(crate) statuses: QuestionStatusMachine,
    pub(crate) timing: TimeTracker,
    pub(crate) integrity: IntegrityMonitor,
    pub(crate) current: usize,
    pub(crate) receipt: Option<SubmissionReceipt>,
    pub(crate) torn_down: bool,
}

impl SessionState {
    pub fn new(question_count: usize, started_at: Instant, min_transition: Duration) -> Self {
        Self {
            submission: SubmissionState::InProgress,
            reason: None,
            statuses: QuestionStatusMachine::new(question_count),
            timing: TimeTracker::new(question_count, started_at, min_transition),
            integrity: IntegrityMonitor::new(),
            current: 0,
            receipt: None,
            torn_down: false,
        }
    }

    fn accepts_input(&self) -> bool {
        self.submission == SubmissionState::InProgress && !self.torn_down
    }
}

/// One timed attempt at a quiz.
///
/// User events, the deadline tick and the integrity monitor all go through
/// this type. The check-and-set that picks the single submission happens
/// while `state` is locked, and the lock is never held across an await.
pub struct ExamSession {
    id: String,
    quiz: QuizDescriptor,
    state: Mutex<SessionState>,
    deadline: DeadlineController,
    coordinator: SubmissionCoordinator,
    submitted: watch::Sender<bool>,
    started_at: DateTime<Utc>,
    deadline_at: DateTime<Utc>,
}

impl ExamSession {
    /// Creates the session and starts its countdown. Must be called inside a
    /// tokio runtime.
    pub fn start(
        quiz: QuizDescriptor,
        coordinator: SubmissionCoordinator,
        settings: SessionSettings,
    ) -> Arc<Self> {
        let id = Uuid::new_v4().to_string();
        let duration = Duration::from_secs(quiz.duration_seconds);
        let started_at = Utc::now();
        let state = SessionState::new(
            quiz.question_count(),
            Instant::now(),
            settings.min_transition,
        );

        let (submitted, _) = watch::channel(false);

        let session = Arc::new(Self {
            deadline: DeadlineController::new(id.clone(), settings.tick_interval),
            id,
            quiz,
            state: Mutex::new(state),
            coordinator,
            submitted,
            started_at,
            deadline_at: wall_clock_after(started_at, duration),
        });

        let weak: Weak<Self> = Arc::downgrade(&session);
        session.deadline.start(duration, move || async move {
            if let Some(session) = weak.upgrade() {
                session.trigger(SubmitReason::Timeout).await;
            }
        });

        SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        SESSIONS_ACTIVE.inc();
        tracing::info!(
            "Exam session started: {} for quiz {} ({} questions, {}s)",
            session.id,
            session.quiz.id,
            session.quiz.question_count(),
            session.quiz.duration_seconds
        );

        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn quiz(&self) -> &QuizDescriptor {
        &self.quiz
    }

    pub fn deadline_at(&self) -> DateTime<Utc> {
        self.deadline_at
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn select(&self, index: usize, option_id: &str) -> bool {
        let mut state = self.lock();
        state.accepts_input() && state.statuses.on_select(index, option_id)
    }

    pub fn clear(&self, index: usize) -> bool {
        let mut state = self.lock();
        state.accepts_input() && state.statuses.on_clear(index)
    }

    pub fn mark_for_review(&self, index: usize) -> bool {
        let mut state = self.lock();
        state.accepts_input() && state.statuses.on_mark_for_review(index)
    }

    /// Moves to `index`, crediting time to the question being left.
    pub fn navigate(&self, index: usize) -> bool {
        self.navigate_at(index, Instant::now())
    }

    pub fn navigate_at(&self, index: usize, now: Instant) -> bool {
        let mut state = self.lock();
        if !state.accepts_input() || index >= state.statuses.len() {
            return false;
        }
        let from = state.current;
        if from != index {
            state.timing.record_transition(from, index, now);
            state.current = index;
        }
        state.statuses.on_navigate(index)
    }

    pub async fn visibility_changed(&self, visibility: Visibility) -> IntegrityOutcome {
        let (outcome, payload) = {
            let mut state = self.lock();
            if !state.accepts_input() {
                return IntegrityOutcome::Ignored;
            }
            let outcome = state.integrity.on_visibility(visibility);
            // The second strike submits in the same critical section that
            // counted it.
            let payload = match outcome {
                IntegrityOutcome::Violation { .. } => self.coordinator.begin(
                    &mut state,
                    &self.quiz,
                    SubmitReason::IntegrityViolation,
                    &self.deadline,
                    Instant::now(),
                ),
                _ => None,
            };
            (outcome, payload)
        };

        if let Some(payload) = payload {
            self.finish(SubmitReason::IntegrityViolation, payload).await;
        }
        outcome
    }

    pub async fn submit(&self) -> TriggerOutcome {
        self.trigger(SubmitReason::Manual).await
    }

    /// Single entry point for every submit trigger. The first caller wins;
    /// later callers get [`TriggerOutcome::Ignored`].
    pub async fn trigger(&self, reason: SubmitReason) -> TriggerOutcome {
        let payload = {
            let mut state = self.lock();
            self.coordinator
                .begin(&mut state, &self.quiz, reason, &self.deadline, Instant::now())
        };

        match payload {
            Some(payload) => TriggerOutcome::Submitted(self.finish(reason, payload).await),
            None => TriggerOutcome::Ignored,
        }
    }

    async fn finish(&self, reason: SubmitReason, payload: SubmissionPayload) -> SubmissionReceipt {
        let receipt = self.coordinator.deliver(&self.quiz.id, reason, &payload).await;

        let mut state = self.lock();
        state.submission = SubmissionState::Submitted;
        state.receipt = Some(receipt.clone());
        self.submitted.send_replace(true);
        SESSIONS_TOTAL.with_label_values(&["submitted"]).inc();
        tracing::info!(
            "Exam session submitted: {} reason={} delivered={}",
            self.id,
            reason.as_label(),
            receipt.delivered
        );
        receipt
    }

    /// Releases the timer. Any later trigger or input is ignored.
    pub fn teardown(&self) {
        self.deadline.stop();
        let mut state = self.lock();
        if state.torn_down {
            return;
        }
        state.torn_down = true;
        state.statuses.freeze();
        SESSIONS_ACTIVE.dec();
        SESSIONS_TOTAL.with_label_values(&["torn_down"]).inc();
        tracing::info!(
            "Exam session torn down: {} (state={:?})",
            self.id,
            state.submission
        );
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.lock().submission
    }

    pub fn submit_reason(&self) -> Option<SubmitReason> {
        self.lock().reason
    }

    pub fn receipt(&self) -> Option<SubmissionReceipt> {
        self.lock().receipt.clone()
    }

    pub fn statuses(&self) -> Vec<QuestionStatus> {
        self.lock().statuses.statuses().to_vec()
    }

    pub fn violation_count(&self) -> u32 {
        self.lock().integrity.violation_count()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline
            .remaining(Instant::now())
            .unwrap_or(Duration::ZERO)
    }

    pub fn subscribe_timer(&self) -> broadcast::Receiver<TimerEvent> {
        self.deadline.subscribe()
    }

    /// Flips to `true` once the submission has been delivered (or given up
    /// on). Closes when the session is dropped.
    pub fn subscribe_submitted(&self) -> watch::Receiver<bool> {
        self.submitted.subscribe()
    }

    pub fn unload_guard(&self) -> UnloadGuard {
        if self.lock().accepts_input() {
            UnloadGuard {
                confirm: true,
                message: Some(UNLOAD_WARNING.to_string()),
            }
        } else {
            UnloadGuard {
                confirm: false,
                message: None,
            }
        }
    }

    pub fn view(&self) -> ExamSessionView {
        let remaining = self.remaining();
        let state = self.lock();
        let remaining_seconds = if state.submission == SubmissionState::InProgress {
            ceil_seconds(remaining)
        } else {
            0
        };

        ExamSessionView {
            session_id: self.id.clone(),
            quiz_id: self.quiz.id.clone(),
            title: self.quiz.title.clone(),
            started_at: self.started_at,
            state: state.submission,
            reason: state.reason,
            current_index: state.current,
            statuses: state.statuses.statuses().to_vec(),
            remaining_seconds,
            violation_count: state.integrity.violation_count(),
            integrity: state.integrity.state(),
            results_url: state.receipt.as_ref().map(|r| r.results_url.clone()),
        }
    }
}

impl Drop for ExamSession {
    fn drop(&mut self) {
        let torn_down = self
            .state
            .get_mut()
            .map(|state| state.torn_down)
            .unwrap_or(true);
        if !torn_down {
            SESSIONS_ACTIVE.dec();
        }
    }
}
