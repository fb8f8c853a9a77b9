//! Live "ends in HH:MM:SS" countdowns.
//!
//! Each [`Countdown`] owns one timer task that publishes the remaining time
//! on a watch channel once per tick. The last value published is always
//! [`Remaining::ZERO`]; after that the channel closes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::trace;

use crate::clock::Clock;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Remaining time split for display. Hours are not wrapped into days.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Remaining {
    pub hours: u64,
    pub minutes: u8,
    pub seconds: u8,
}

impl Remaining {
    pub const ZERO: Remaining = Remaining {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    pub fn new(hours: u64, minutes: u8, seconds: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// Time left until `target`, clamped at zero.
    ///
    /// Partial seconds round up so that `00:00:00` only ever shows once the
    /// target has actually been reached.
    pub fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let millis = (target - now).num_milliseconds();
        if millis <= 0 {
            return Self::ZERO;
        }
        Self::from_total_seconds((millis as u64).div_ceil(1000))
    }

    pub fn from_total_seconds(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: ((total % 3600) / 60) as u8,
            seconds: (total % 60) as u8,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}

/// Hands out independent countdowns that share a clock and tick length.
#[derive(Clone, Debug)]
pub struct CountdownEngine {
    clock: Arc<dyn Clock>,
    tick: Duration,
}

impl CountdownEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Starts a countdown towards `target`. A `None` target never runs.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(&self, target: Option<DateTime<Utc>>) -> Countdown {
        let mut countdown = Countdown {
            clock: Arc::clone(&self.clock),
            tick: self.tick,
            target: None,
            updates: None,
            task: None,
        };
        countdown.retarget(target);
        countdown
    }
}

/// One running countdown. Dropping it stops the timer.
pub struct Countdown {
    clock: Arc<dyn Clock>,
    tick: Duration,
    target: Option<DateTime<Utc>>,
    updates: Option<watch::Receiver<Remaining>>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Countdown")
            .field("target", &self.target)
            .field("tick", &self.tick)
            .field("current", &self.current())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Countdown {
    pub fn target(&self) -> Option<DateTime<Utc>> {
        self.target
    }

    /// Replaces the target, discarding the previous timer.
    pub fn retarget(&mut self, target: Option<DateTime<Utc>>) {
        self.stop();
        self.target = target;

        let Some(target) = target else {
            return;
        };

        let (tx, rx) = watch::channel(Remaining::until(target, self.clock.now()));
        let clock = Arc::clone(&self.clock);
        let tick = self.tick;
        self.task = Some(tokio::spawn(run_countdown(clock, tick, target, tx)));
        self.updates = Some(rx);
    }

    /// Stops the timer. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.updates = None;
    }

    /// Last published value, if the countdown has a target.
    pub fn current(&self) -> Option<Remaining> {
        self.updates.as_ref().map(|rx| *rx.borrow())
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the next tick. `None` once the countdown reached zero, was
    /// stopped, or never had a target.
    pub async fn next(&mut self) -> Option<Remaining> {
        let updates = self.updates.as_mut()?;
        match updates.changed().await {
            Ok(()) => Some(*updates.borrow_and_update()),
            Err(_) => None,
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_countdown(
    clock: Arc<dyn Clock>,
    tick: Duration,
    target: DateTime<Utc>,
    tx: watch::Sender<Remaining>,
) {
    let mut ticker = interval(tick.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let remaining = Remaining::until(target, clock.now());
        if tx.send(remaining).is_err() {
            break;
        }
        if remaining.is_zero() {
            trace!(%target, "countdown reached zero");
            break;
        }
    }
}
