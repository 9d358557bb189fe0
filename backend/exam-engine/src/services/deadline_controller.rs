use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep_until, Instant};

use crate::metrics::DEADLINE_TICKS_TOTAL;
use crate::models::timer::{CountdownStopped, CountdownTick, DeadlineReached, TimerEvent};
use crate::utils::time::{ceil_seconds, wall_clock_after};

const EVENT_BUFFER: usize = 64;
/// Stand-in deadline when `now + duration` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy)]
struct DeadlineWindow {
    started_at: Instant,
    deadline: Instant,
    wall_deadline: DateTime<Utc>,
    total: Duration,
}

/// Wall-clock countdown for one session.
///
/// The deadline is absolute and computed once. Every tick recomputes the
/// remaining time from it, so a delayed or throttled tick never drifts.
pub struct DeadlineController {
    session_id: String,
    tick_interval: Duration,
    window: OnceLock<DeadlineWindow>,
    stop: Arc<watch::Sender<bool>>,
    events: broadcast::Sender<TimerEvent>,
}

impl DeadlineController {
    pub fn new(session_id: impl Into<String>, tick_interval: Duration) -> Self {
        let (stop, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            session_id: session_id.into(),
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            window: OnceLock::new(),
            stop: Arc::new(stop),
            events,
        }
    }

    /// Computes the deadline and spawns the tick task. `on_expire` runs at
    /// most once, when the remaining time reaches zero before [`stop`].
    ///
    /// Calling `start` again returns the deadline of the first call.
    ///
    /// [`stop`]: DeadlineController::stop
    pub fn start<F, Fut>(&self, duration: Duration, on_expire: F) -> Instant
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        let mut fresh = false;
        let window = *self.window.get_or_init(|| {
            fresh = true;
            DeadlineWindow {
                started_at: now,
                deadline: now
                    .checked_add(duration)
                    .unwrap_or_else(|| now + FAR_FUTURE),
                wall_deadline: wall_clock_after(Utc::now(), duration),
                total: duration,
            }
        });

        if !fresh {
            tracing::debug!(session_id = %self.session_id, "deadline already started");
            return window.deadline;
        }
        if *self.stop.borrow() {
            return window.deadline;
        }

        tracing::info!(
            session_id = %self.session_id,
            duration_secs = duration.as_secs(),
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Deadline controller started"
        );

        let session_id = self.session_id.clone();
        let tick_interval = self.tick_interval;
        let stop = Arc::clone(&self.stop);
        let mut stop_rx = self.stop.subscribe();
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                let now = Instant::now();
                let remaining = window.deadline.saturating_duration_since(now);
                DEADLINE_TICKS_TOTAL.inc();

                let _ = events.send(TimerEvent::Tick(CountdownTick {
                    session_id: session_id.clone(),
                    remaining_seconds: ceil_seconds(remaining),
                    elapsed_seconds: now.saturating_duration_since(window.started_at).as_secs(),
                    duration_seconds: window.total.as_secs(),
                    deadline: window.wall_deadline,
                }));

                if remaining.is_zero() {
                    // Whoever flips the flag first owns the expiry.
                    if stop.send_replace(true) {
                        break;
                    }
                    tracing::info!(session_id = %session_id, "Deadline reached");
                    let _ = events.send(TimerEvent::DeadlineReached(DeadlineReached {
                        session_id: session_id.clone(),
                        deadline: window.wall_deadline,
                    }));
                    on_expire().await;
                    break;
                }

                let wake = std::cmp::min(now + tick_interval, window.deadline);
                tokio::select! {
                    biased;
                    _ = stop_rx.wait_for(|stopped| *stopped) => break,
                    _ = sleep_until(wake) => {}
                }
            }
            tracing::debug!(session_id = %session_id, "Deadline tick task finished");
        });

        window.deadline
    }

    /// Cancels the tick. Idempotent.
    pub fn stop(&self) {
        if self.stop.send_replace(true) {
            return;
        }
        tracing::debug!(session_id = %self.session_id, "Deadline controller stopped");
        let remaining = self.remaining(Instant::now()).unwrap_or(Duration::ZERO);
        let _ = self.events.send(TimerEvent::Stopped(CountdownStopped {
            session_id: self.session_id.clone(),
            remaining_seconds: ceil_seconds(remaining),
            stopped_at: Utc::now(),
        }));
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.window.get().map(|window| window.deadline)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }
}

impl Drop for DeadlineController {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}
