use std::collections::HashSet;

use tracing::debug;

use crate::api::AlertId;
use crate::scheduler::{Scheduler, TimerHandle, TimerKind};
use crate::UnixTimeMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Fetch,
    SkipUnmounted,
    SkipPaused,
    SkipNoCredential,
}

/// Fixed-cadence alert polling. A pause only suppresses requests; the
/// interval keeps beating and picks up again once the pause lapses.
#[derive(Debug, Default)]
pub struct Poller {
    interval: Option<TimerHandle>,
    paused: bool,
    camera_checks: HashSet<AlertId>,
    polls_issued: u64,
}

impl Poller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, sched: &mut Scheduler, now: UnixTimeMs, interval_ms: u64) {
        self.interval = Some(sched.schedule_every(TimerKind::Poll, now, interval_ms));
    }

    pub fn stop(&mut self, sched: &mut Scheduler) {
        if let Some(handle) = self.interval.take() {
            sched.cancel_handle(handle);
        }
        sched.cancel(TimerKind::PollResume);
        self.paused = false;
    }

    #[must_use]
    pub fn is_running(&self, sched: &Scheduler) -> bool {
        self.interval.is_some_and(|h| sched.is_live(h))
    }

    /// Re-pausing restarts the countdown.
    pub fn pause(&mut self, sched: &mut Scheduler, now: UnixTimeMs, duration_ms: u64) {
        self.paused = true;
        sched.schedule_once(TimerKind::PollResume, now, duration_ms);
        debug!(duration_ms, "polling paused");
    }

    pub fn resume(&mut self) {
        if std::mem::take(&mut self.paused) {
            debug!("polling resumed");
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn decide(&self, mounted: bool, has_credential: bool) -> PollDecision {
        if !mounted {
            PollDecision::SkipUnmounted
        } else if self.paused {
            PollDecision::SkipPaused
        } else if !has_credential {
            PollDecision::SkipNoCredential
        } else {
            PollDecision::Fetch
        }
    }

    pub fn record_poll(&mut self) {
        self.polls_issued += 1;
    }

    #[must_use]
    pub fn polls_issued(&self) -> u64 {
        self.polls_issued
    }

    /// Returns `false` when a lookup for this alert is already in flight.
    pub fn begin_camera_check(&mut self, id: &AlertId) -> bool {
        self.camera_checks.insert(id.clone())
    }

    pub fn finish_camera_check(&mut self, id: &AlertId) -> bool {
        self.camera_checks.remove(id)
    }

    #[must_use]
    pub fn is_checking(&self, id: &AlertId) -> bool {
        self.camera_checks.contains(id)
    }

    pub fn reset(&mut self, sched: &mut Scheduler) {
        self.stop(sched);
        self.camera_checks.clear();
        self.polls_issued = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_order() {
        let mut poller = Poller::new();
        let mut sched = Scheduler::new();

        assert_eq!(poller.decide(false, true), PollDecision::SkipUnmounted);
        assert_eq!(poller.decide(true, false), PollDecision::SkipNoCredential);
        assert_eq!(poller.decide(true, true), PollDecision::Fetch);

        poller.pause(&mut sched, UnixTimeMs(0), 5_000);
        assert_eq!(poller.decide(true, true), PollDecision::SkipPaused);
        poller.resume();
        assert_eq!(poller.decide(true, true), PollDecision::Fetch);
    }

    #[test]
    fn test_start_arms_interval() {
        let mut poller = Poller::new();
        let mut sched = Scheduler::new();
        poller.start(&mut sched, UnixTimeMs(1_000), 5_000);

        assert!(poller.is_running(&sched));
        assert_eq!(sched.deadline(TimerKind::Poll), Some(UnixTimeMs(6_000)));
    }

    #[test]
    fn test_pause_keeps_interval_and_arms_resume() {
        let mut poller = Poller::new();
        let mut sched = Scheduler::new();
        poller.start(&mut sched, UnixTimeMs(0), 5_000);
        poller.pause(&mut sched, UnixTimeMs(2_000), 5_000);

        assert!(poller.is_running(&sched));
        assert_eq!(sched.deadline(TimerKind::PollResume), Some(UnixTimeMs(7_000)));
    }

    #[test]
    fn test_stop_cancels_timers() {
        let mut poller = Poller::new();
        let mut sched = Scheduler::new();
        poller.start(&mut sched, UnixTimeMs(0), 5_000);
        poller.pause(&mut sched, UnixTimeMs(0), 5_000);
        poller.stop(&mut sched);

        assert!(!poller.is_running(&sched));
        assert_eq!(sched.active_count(), 0);
        assert!(!poller.is_paused());
    }

    #[test]
    fn test_camera_check_single_flight() {
        let mut poller = Poller::new();
        let id = AlertId::new("A1");

        assert!(poller.begin_camera_check(&id));
        assert!(!poller.begin_camera_check(&id));
        assert!(poller.is_checking(&id));
        assert!(poller.finish_camera_check(&id));
        assert!(poller.begin_camera_check(&id));
    }
}
