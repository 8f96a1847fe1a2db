//! One-second countdown running as a spawned task.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

const TICK: Duration = Duration::from_secs(1);

/// Handle to a running countdown. Dropping it stops the ticks.
#[derive(Debug)]
pub struct Countdown {
    task: JoinHandle<()>,
}

impl Countdown {
    /// Starts counting down `duration`, calling `on_tick` once per second
    /// with the whole seconds left.
    ///
    /// The task ends after reporting zero or when `on_tick` breaks.
    pub fn start<F>(duration: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(u64) -> ControlFlow<()> + Send + 'static,
    {
        let started = Instant::now();
        let deadline = started + duration;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(started + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let remaining = remaining_secs(deadline, Instant::now());
                if on_tick(remaining).is_break() || remaining == 0 {
                    break;
                }
            }
        });

        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Whole seconds until `deadline`, rounded up so a late tick still
/// reports the second it belongs to.
fn remaining_secs(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

/// Renders seconds as `MM:SS`.
pub fn format_countdown(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
