//! Typed job options: when a job becomes due and whether it repeats.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// When a job becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScheduleRepr", into = "ScheduleRepr")]
pub enum Schedule {
    /// Due at an absolute point in time.
    At(DateTime<Utc>),
    /// Due after a delay, measured from the moment the status entry is built.
    Delay(Duration),
}

impl Schedule {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }

    pub fn after(delay: Duration) -> Self {
        Self::Delay(delay)
    }

    /// Resolve the descriptor into a concrete due time.
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::At(at) => *at,
            Schedule::Delay(delay) => TimeDelta::from_std(*delay)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ScheduleRepr {
    At(DateTime<Utc>),
    DelayMs(u64),
}

impl From<ScheduleRepr> for Schedule {
    fn from(value: ScheduleRepr) -> Self {
        match value {
            ScheduleRepr::At(at) => Schedule::At(at),
            ScheduleRepr::DelayMs(ms) => Schedule::Delay(Duration::from_millis(ms)),
        }
    }
}

impl From<Schedule> for ScheduleRepr {
    fn from(value: Schedule) -> Self {
        match value {
            Schedule::At(at) => ScheduleRepr::At(at),
            Schedule::Delay(delay) => ScheduleRepr::DelayMs(duration_millis(delay)),
        }
    }
}

/// Fixed-delay repeat: after each execution a successor job is due after `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RepeatRepr", into = "RepeatRepr")]
pub struct Repeat {
    interval: Duration,
}

impl Repeat {
    /// A zero interval is rejected; it would re-run the job in a tight loop.
    pub fn every(interval: Duration) -> CoreResult<Self> {
        if interval.is_zero() {
            return Err(CoreError::validation("repeat interval must be greater than zero"));
        }
        Ok(Self { interval })
    }

    pub fn from_millis(ms: u64) -> CoreResult<Self> {
        Self::every(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepeatRepr {
    delay_ms: u64,
}

impl TryFrom<RepeatRepr> for Repeat {
    type Error = CoreError;

    fn try_from(value: RepeatRepr) -> Result<Self, Self::Error> {
        Repeat::from_millis(value.delay_ms)
    }
}

impl From<Repeat> for RepeatRepr {
    fn from(value: Repeat) -> Self {
        Self {
            delay_ms: duration_millis(value.interval),
        }
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Options recognized on a job.
///
/// Immutable per job instance: a repeat cycle creates a new job carrying
/// [`JobOptions::repeat_cycle`] instead of mutating these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }

    /// Options stored on a repeat successor: only `repeat` carries over.
    pub fn repeat_cycle(&self) -> Option<JobOptions> {
        self.repeat.map(|repeat| JobOptions {
            schedule: None,
            repeat: Some(repeat),
        })
    }

    /// Schedule a repeat successor's `enqueued` entry is resolved from.
    pub fn next_cycle_schedule(&self) -> Option<Schedule> {
        self.repeat.map(|repeat| Schedule::Delay(repeat.interval()))
    }
}
