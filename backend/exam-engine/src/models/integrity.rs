use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Two-strike escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityState {
    Ok,
    Warned,
    Violated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntegrityOutcome {
    /// Not an edge, or the session is no longer running.
    Ignored,
    /// Visibility restored; the next hide will count.
    Rearmed,
    /// First strike: non-blocking warning.
    Warning { violation_count: u32, message: String },
    /// Second strike: the session has been submitted.
    Violation { violation_count: u32 },
}

#[derive(Debug, Deserialize)]
pub struct VisibilityChangeRequest {
    pub visibility: Visibility,
}

