//! Cancelable timers driven by shell ticks.
//!
//! The core never sleeps. The shell delivers `Event::Tick` on a short cadence
//! and [`Scheduler::take_due`] reports which timers expired since the previous
//! tick. Each [`TimerKind`] has at most one live timer; arming it again
//! replaces the previous one and bumps its generation, so a retained
//! [`TimerHandle`] from an earlier arming can no longer cancel it.

use std::collections::HashMap;

use crate::UnixTimeMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKind {
    Poll,
    PollResume,
    LoadWindow,
    Heartbeat,
    ProcessedSweep,
    QueueRelease,
    DismissTransition,
    UserStopCooldown,
    AudioWatchdog,
    AudioSafetyStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    kind: TimerKind,
    generation: u64,
}

impl TimerHandle {
    #[must_use]
    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    deadline: UnixTimeMs,
    period_ms: Option<u64>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerKind, Timer>,
    next_generation: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(
        &mut self,
        kind: TimerKind,
        now: UnixTimeMs,
        after_ms: u64,
    ) -> TimerHandle {
        self.arm(kind, now.add_millis(after_ms), None)
    }

    /// Arms a one-shot timer at an absolute instant.
    pub fn schedule_at(&mut self, kind: TimerKind, deadline: UnixTimeMs) -> TimerHandle {
        self.arm(kind, deadline, None)
    }

    /// Arms a periodic timer whose first beat is one period from `now`.
    /// A zero period is clamped to one millisecond.
    pub fn schedule_every(
        &mut self,
        kind: TimerKind,
        now: UnixTimeMs,
        period_ms: u64,
    ) -> TimerHandle {
        let period_ms = period_ms.max(1);
        self.arm(kind, now.add_millis(period_ms), Some(period_ms))
    }

    fn arm(
        &mut self,
        kind: TimerKind,
        deadline: UnixTimeMs,
        period_ms: Option<u64>,
    ) -> TimerHandle {
        self.next_generation = self.next_generation.wrapping_add(1);
        let generation = self.next_generation;
        self.timers.insert(
            kind,
            Timer {
                deadline,
                period_ms,
                generation,
            },
        );
        TimerHandle { kind, generation }
    }

    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.timers.remove(&kind).is_some()
    }

    /// Cancels only if the handle still refers to the live timer.
    pub fn cancel_handle(&mut self, handle: TimerHandle) -> bool {
        match self.timers.get(&handle.kind) {
            Some(timer) if timer.generation == handle.generation => {
                self.timers.remove(&handle.kind);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }

    #[must_use]
    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.timers
            .get(&handle.kind)
            .is_some_and(|t| t.generation == handle.generation)
    }

    #[must_use]
    pub fn deadline(&self, kind: TimerKind) -> Option<UnixTimeMs> {
        self.timers.get(&kind).map(|t| t.deadline)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    /// Removes expired one-shots, re-arms expired periodic timers, and returns
    /// the expired kinds ordered by deadline.
    ///
    /// A periodic timer that missed several beats fires once and its next
    /// deadline is one period after `now`.
    pub fn take_due(&mut self, now: UnixTimeMs) -> Vec<TimerKind> {
        let mut due: Vec<(UnixTimeMs, TimerKind)> = self
            .timers
            .iter()
            .filter(|(_, t)| !t.deadline.is_after(now))
            .map(|(kind, t)| (t.deadline, *kind))
            .collect();
        due.sort();

        for (_, kind) in &due {
            let rearm = self.timers.get(kind).and_then(|t| t.period_ms);
            match rearm {
                Some(period_ms) => {
                    if let Some(timer) = self.timers.get_mut(kind) {
                        timer.deadline = now.add_millis(period_ms);
                    }
                }
                None => {
                    self.timers.remove(kind);
                }
            }
        }

        due.into_iter().map(|(_, kind)| kind).collect()
    }
}
