use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{Alert, AlertId};
use crate::UnixTimeMs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationState {
    #[default]
    Hidden,
    Visible,
    Dismissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedAlert {
    pub alert: Alert,
    pub ready_at: UnixTimeMs,
}

/// One displayed alert plus a FIFO backlog. The displayed alert is never in
/// the backlog and an id appears at most once across both.
#[derive(Debug, Default)]
pub struct Presenter {
    state: PresentationState,
    current: Option<Alert>,
    backlog: VecDeque<QueuedAlert>,
}

impl Presenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> PresentationState {
        self.state
    }

    #[must_use]
    pub fn current(&self) -> Option<&Alert> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.state == PresentationState::Visible
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.backlog.len()
    }

    #[must_use]
    pub fn contains(&self, id: &AlertId) -> bool {
        self.current.as_ref().is_some_and(|a| &a.id == id)
            || self.backlog.iter().any(|q| &q.alert.id == id)
    }

    /// Returns `false` if the id is already displayed or queued.
    pub fn enqueue(&mut self, alert: Alert, ready_at: UnixTimeMs) -> bool {
        if self.contains(&alert.id) {
            warn!(alert_id = %alert.id, "duplicate alert not queued");
            return false;
        }
        debug!(alert_id = %alert.id, %ready_at, backlog = self.backlog.len(), "alert queued");
        self.backlog.push_back(QueuedAlert { alert, ready_at });
        true
    }

    /// Shows the backlog head when nothing is on screen and the head is due.
    pub fn promote_next(&mut self, now: UnixTimeMs) -> Option<&Alert> {
        if self.state != PresentationState::Hidden {
            return None;
        }
        if self.backlog.front()?.ready_at.is_after(now) {
            return None;
        }
        let next = self.backlog.pop_front()?;
        self.state = PresentationState::Visible;
        self.current = Some(next.alert);
        self.current.as_ref()
    }

    /// When the backlog head becomes eligible, if it is still waiting.
    #[must_use]
    pub fn next_ready_at(&self, now: UnixTimeMs) -> Option<UnixTimeMs> {
        self.backlog
            .front()
            .map(|q| q.ready_at)
            .filter(|ready_at| ready_at.is_after(now))
    }

    pub fn begin_dismiss(&mut self) -> bool {
        if self.state != PresentationState::Visible {
            return false;
        }
        self.state = PresentationState::Dismissing;
        true
    }

    /// Completes the exit transition and hands back the alert that was shown.
    pub fn finish_dismiss(&mut self) -> Option<Alert> {
        if self.state != PresentationState::Dismissing {
            return None;
        }
        self.state = PresentationState::Hidden;
        self.current.take()
    }

    /// Hides without an exit transition.
    pub fn dismiss_immediately(&mut self) -> Option<Alert> {
        self.state = PresentationState::Hidden;
        self.current.take()
    }

    pub fn remove_queued(&mut self, id: &AlertId) -> bool {
        let before = self.backlog.len();
        self.backlog.retain(|q| &q.alert.id != id);
        before != self.backlog.len()
    }

    pub fn reset(&mut self) {
        self.state = PresentationState::Hidden;
        self.current = None;
        self.backlog.clear();
    }
}
