use crate::models::QuestionStatus;

use super::answer_ledger::AnswerLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    Navigate,
    Select,
    Clear,
    MarkForReview,
}

/// Transition table for a single question.
///
/// A review flag is never removed: clearing a flagged answer lands on `Review`.
pub fn next_status(current: QuestionStatus, event: StatusEvent) -> QuestionStatus {
    use QuestionStatus as S;

    match (current, event) {
        (S::NotVisited, StatusEvent::Navigate) => S::UnAnswered,
        (_, StatusEvent::Navigate) => current,

        (S::NotVisited | S::UnAnswered | S::Answered, StatusEvent::Select) => S::Answered,
        (S::Review | S::ReviewWithAnswer, StatusEvent::Select) => S::ReviewWithAnswer,

        (S::NotVisited | S::Answered, StatusEvent::Clear) => S::UnAnswered,
        (S::ReviewWithAnswer, StatusEvent::Clear) => S::Review,
        (S::UnAnswered | S::Review, StatusEvent::Clear) => current,

        (S::NotVisited | S::UnAnswered, StatusEvent::MarkForReview) => S::Review,
        (S::Answered, StatusEvent::MarkForReview) => S::ReviewWithAnswer,
        (S::Review | S::ReviewWithAnswer, StatusEvent::MarkForReview) => current,
    }
}

/// Per-question status bookkeeping for one session.
///
/// Owns the [`AnswerLedger`] so that a status can only reach `Answered` or
/// `ReviewWithAnswer` together with a stored selection.
#[derive(Debug, Clone)]
pub struct QuestionStatusMachine {
    statuses: Vec<QuestionStatus>,
    review: Vec<bool>,
    visited: Vec<bool>,
    ledger: AnswerLedger,
    frozen: bool,
}

impl QuestionStatusMachine {
    pub fn new(question_count: usize) -> Self {
        let mut statuses = vec![QuestionStatus::NotVisited; question_count];
        let mut visited = vec![false; question_count];
        if let Some(first) = statuses.first_mut() {
            *first = QuestionStatus::UnAnswered;
            visited[0] = true;
        }

        Self {
            statuses,
            review: vec![false; question_count],
            visited,
            ledger: AnswerLedger::new(),
            frozen: false,
        }
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn status(&self, index: usize) -> Option<QuestionStatus> {
        self.statuses.get(index).copied()
    }

    pub fn statuses(&self) -> &[QuestionStatus] {
        &self.statuses
    }

    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    pub fn is_flagged(&self, index: usize) -> bool {
        self.review.get(index).copied().unwrap_or(false)
    }

    pub fn is_visited(&self, index: usize) -> bool {
        self.visited.get(index).copied().unwrap_or(false)
    }

    /// Rejects every further transition.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn on_select(&mut self, index: usize, option_id: impl Into<String>) -> bool {
        if !self.accepts(index) {
            return false;
        }
        self.ledger.set(index, option_id);
        self.apply(index, StatusEvent::Select);
        true
    }

    pub fn on_clear(&mut self, index: usize) -> bool {
        if !self.accepts(index) {
            return false;
        }
        self.ledger.clear(index);
        self.apply(index, StatusEvent::Clear);
        true
    }

    pub fn on_mark_for_review(&mut self, index: usize) -> bool {
        if !self.accepts(index) {
            return false;
        }
        self.review[index] = true;
        self.apply(index, StatusEvent::MarkForReview);
        true
    }

    pub fn on_navigate(&mut self, index: usize) -> bool {
        if !self.accepts(index) {
            return false;
        }
        self.apply(index, StatusEvent::Navigate);
        true
    }

    fn accepts(&self, index: usize) -> bool {
        !self.frozen && index < self.statuses.len()
    }

    fn apply(&mut self, index: usize, event: StatusEvent) {
        self.visited[index] = true;
        let current = self.statuses[index];
        let next = next_status(current, event);
        if next != current {
            tracing::trace!(index, ?current, ?next, ?event, "question status transition");
        }
        self.statuses[index] = next;
    }
}
