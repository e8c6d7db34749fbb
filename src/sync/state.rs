//! Generation bookkeeping for refresh cycles.
//!
//! Each refresh class has a strictly increasing generation counter and at most
//! one cycle that is "current". A periodic tick is skipped while the current
//! cycle is unresolved; a manual trigger always starts a new generation and
//! supersedes whatever is in flight. A result may only be applied if its
//! generation is still the current one for its class, so the last *started*
//! cycle wins regardless of completion order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshClass {
    /// Sensor directory with online/offline status
    Status,
    LatestSnapshot,
    History,
    Aggregate,
    Dates,
    Devices,
}

impl RefreshClass {
    pub const ALL: [Self; 6] = [
        Self::Status,
        Self::LatestSnapshot,
        Self::History,
        Self::Aggregate,
        Self::Dates,
        Self::Devices,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::LatestSnapshot => "latest_snapshot",
            Self::History => "history",
            Self::Aggregate => "aggregate",
            Self::Dates => "dates",
            Self::Devices => "devices",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Timer tick; skipped if the class already has a cycle in flight
    Tick,
    /// User action; always starts a new generation
    Manual,
}

/// Token handed to a fetch and presented back when applying its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshCycle {
    pub class: RefreshClass,
    pub generation: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ClassState {
    generation: u64,
    in_flight: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    classes: BTreeMap<RefreshClass, ClassState>,
}

impl SchedulerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cycle, or `None` if a tick arrives while one is still in flight.
    pub fn begin(
        &mut self,
        class: RefreshClass,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Option<RefreshCycle> {
        let state = self.classes.entry(class).or_default();
        if trigger == Trigger::Tick && state.in_flight {
            return None;
        }

        state.generation += 1;
        state.in_flight = true;

        Some(RefreshCycle {
            class,
            generation: state.generation,
            started_at: now,
        })
    }

    #[must_use]
    pub fn is_current(&self, cycle: &RefreshCycle) -> bool {
        self.current_generation(cycle.class) == cycle.generation
    }

    /// Resolve a cycle. Returns `true` if its result may be applied; a
    /// superseded cycle returns `false` and leaves the newer one in flight.
    pub fn complete(&mut self, cycle: &RefreshCycle) -> bool {
        let state = self.classes.entry(cycle.class).or_default();
        if state.generation != cycle.generation {
            return false;
        }
        state.in_flight = false;
        true
    }

    /// Release a cycle that will never complete, e.g. because its future was
    /// dropped. Only the current generation is released; returns `true` if
    /// the class was still waiting on it.
    pub fn abandon(&mut self, cycle: &RefreshCycle) -> bool {
        let Some(state) = self.classes.get_mut(&cycle.class) else {
            return false;
        };
        if state.generation != cycle.generation || !state.in_flight {
            return false;
        }
        state.in_flight = false;
        true
    }

    #[must_use]
    pub fn current_generation(&self, class: RefreshClass) -> u64 {
        self.classes.get(&class).map_or(0, |s| s.generation)
    }

    #[must_use]
    pub fn in_flight(&self, class: RefreshClass) -> bool {
        self.classes.get(&class).is_some_and(|s| s.in_flight)
    }
}
