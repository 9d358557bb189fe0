use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Countdown events of one exam session, relayed over SSE.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    Tick(CountdownTick),
    DeadlineReached(DeadlineReached),
    Stopped(CountdownStopped),
}

/// Remaining time is derived from the absolute deadline, never decremented.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CountdownTick {
    pub session_id: String,
    pub remaining_seconds: u64,
    pub elapsed_seconds: u64,
    pub duration_seconds: u64,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeadlineReached {
    pub session_id: String,
    pub deadline: DateTime<Utc>,
}

/// The countdown was cancelled before the deadline (submit or teardown).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CountdownStopped {
    pub session_id: String,
    pub remaining_seconds: u64,
    pub stopped_at: DateTime<Utc>,
}

impl TimerEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            TimerEvent::Tick(_) => "tick",
            TimerEvent::DeadlineReached(_) => "deadline-reached",
            TimerEvent::Stopped(_) => "stopped",
        }
    }

    /// Whether no further events follow this one.
    pub fn is_final(&self) -> bool {
        !matches!(self, TimerEvent::Tick(_))
    }
}
