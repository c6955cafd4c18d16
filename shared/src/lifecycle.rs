use tracing::{debug, info};

use crate::scheduler::{Scheduler, TimerKind};
use crate::UnixTimeMs;

/// Mount-scoped guards: the app-just-loaded suppression window and reload
/// detection through the heartbeat slot.
#[derive(Debug, Default)]
pub struct LifecycleGuard {
    mounted: bool,
    app_just_loaded: bool,
    reload_detected: bool,
    heartbeat_checked: bool,
    mounted_at: UnixTimeMs,
}

impl LifecycleGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the suppression window for `load_window_ms`.
    pub fn mount(&mut self, now: UnixTimeMs, sched: &mut Scheduler, load_window_ms: u64) {
        *self = Self {
            mounted: true,
            app_just_loaded: true,
            reload_detected: false,
            heartbeat_checked: false,
            mounted_at: now,
        };
        sched.schedule_once(TimerKind::LoadWindow, now, load_window_ms);
        debug!(%now, load_window_ms, "mounted");
    }

    /// Evaluates the heartbeat left by the previous page. A beat younger than
    /// `detection_ms` at mount time means this mount is a reload, and the
    /// window is stretched to `reload_window_ms` from mount unless an
    /// interaction already closed it. Returns whether a reload was detected.
    pub fn on_heartbeat_loaded(
        &mut self,
        previous: Option<UnixTimeMs>,
        sched: &mut Scheduler,
        detection_ms: u64,
        reload_window_ms: u64,
    ) -> bool {
        if !self.mounted || self.heartbeat_checked {
            return false;
        }
        self.heartbeat_checked = true;

        let Some(previous) = previous else {
            return false;
        };
        if self.mounted_at.elapsed_since(previous) >= detection_ms {
            return false;
        }

        self.reload_detected = true;
        if self.app_just_loaded {
            sched.schedule_at(TimerKind::LoadWindow, self.mounted_at.add_millis(reload_window_ms));
        }
        info!(heartbeat = %previous, "page reload detected");
        true
    }

    /// The load-window timer fired.
    pub fn end_window(&mut self) -> bool {
        std::mem::replace(&mut self.app_just_loaded, false)
    }

    /// Returns `true` only for the interaction that closed the window.
    pub fn on_user_interaction(&mut self, sched: &mut Scheduler) -> bool {
        if !self.mounted || !self.app_just_loaded {
            return false;
        }
        self.app_just_loaded = false;
        sched.cancel(TimerKind::LoadWindow);
        debug!("first interaction closed the load window");
        true
    }

    pub fn unmount(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[must_use]
    pub fn app_just_loaded(&self) -> bool {
        self.app_just_loaded
    }

    #[must_use]
    pub fn reload_detected(&self) -> bool {
        self.reload_detected
    }

    #[must_use]
    pub fn heartbeat_checked(&self) -> bool {
        self.heartbeat_checked
    }

    #[must_use]
    pub fn mounted_at(&self) -> UnixTimeMs {
        self.mounted_at
    }
}
