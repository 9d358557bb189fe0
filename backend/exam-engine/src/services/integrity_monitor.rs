use crate::metrics::INTEGRITY_VIOLATIONS_TOTAL;
use crate::models::integrity::{IntegrityOutcome, IntegrityState, Visibility};

pub const FIRST_STRIKE_WARNING: &str =
    "Leaving the exam window is not allowed. Leaving again will submit your attempt.";

/// Edge-triggered focus/visibility monitor with two-strike escalation.
///
/// `Visible` only re-arms the edge latch; the violation count never goes down.
#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    state: IntegrityState,
    violations: u32,
    hidden: bool,
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrityMonitor {
    pub fn new() -> Self {
        Self {
            state: IntegrityState::Ok,
            violations: 0,
            hidden: false,
        }
    }

    pub fn state(&self) -> IntegrityState {
        self.state
    }

    pub fn violation_count(&self) -> u32 {
        self.violations
    }

    pub fn on_visibility(&mut self, visibility: Visibility) -> IntegrityOutcome {
        match visibility {
            Visibility::Visible => {
                if !self.hidden {
                    return IntegrityOutcome::Ignored;
                }
                self.hidden = false;
                IntegrityOutcome::Rearmed
            }
            Visibility::Hidden => {
                if self.hidden {
                    return IntegrityOutcome::Ignored;
                }
                self.hidden = true;
                self.violations += 1;
                self.escalate()
            }
        }
    }

    fn escalate(&mut self) -> IntegrityOutcome {
        let violation_count = self.violations;
        if violation_count >= 2 {
            self.state = IntegrityState::Violated;
            INTEGRITY_VIOLATIONS_TOTAL
                .with_label_values(&["submitted"])
                .inc();
            tracing::warn!(violation_count, "Integrity violation, forcing submission");
            IntegrityOutcome::Violation { violation_count }
        } else {
            self.state = IntegrityState::Warned;
            INTEGRITY_VIOLATIONS_TOTAL
                .with_label_values(&["warned"])
                .inc();
            tracing::warn!(violation_count, "Exam window lost visibility, warning issued");
            IntegrityOutcome::Warning {
                violation_count,
                message: FIRST_STRIKE_WARNING.to_string(),
            }
        }
    }
}
