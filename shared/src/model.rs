use secrecy::{ExposeSecret, SecretString};

use crate::api::{ActivitySort, Alert, AlertId};
use crate::audio::AudioController;
use crate::capabilities::{ApiBase, PermissionState};
use crate::config::AlertConfig;
use crate::filter::DedupFilter;
use crate::lifecycle::LifecycleGuard;
use crate::persistence::SlotGate;
use crate::poller::Poller;
use crate::presenter::Presenter;
use crate::scheduler::Scheduler;
use crate::{Clock, ToastMessage, ACTIVITY_PAGE_SIZE, ACTIVITY_PAGE_SIZES};

/// Reviewed-activity list as last fetched from the backend, paged for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityFeed {
    pub alerts: Vec<Alert>,
    pub sort: ActivitySort,
    pub is_loading: bool,
    page: usize,
    page_size: usize,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self {
            alerts: Vec::new(),
            sort: ActivitySort::default(),
            is_loading: false,
            page: 1,
            page_size: ACTIVITY_PAGE_SIZE,
        }
    }
}

impl ActivityFeed {
    pub fn replace(&mut self, mut alerts: Vec<Alert>) {
        self.sort.apply(&mut alerts);
        self.alerts = alerts;
        self.is_loading = false;
        self.clamp_page();
    }

    pub fn resort(&mut self, sort: ActivitySort) {
        self.sort = sort;
        self.sort.apply(&mut self.alerts);
    }

    pub fn remove(&mut self, id: &AlertId) -> bool {
        let before = self.alerts.len();
        self.alerts.retain(|a| &a.id != id);
        self.clamp_page();
        before != self.alerts.len()
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// At least one page, even when empty.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.alerts.len().div_ceil(self.page_size).max(1)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
        self.clamp_page();
    }

    /// Accepts only the offered sizes. A new size starts again at page one.
    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        if !ACTIVITY_PAGE_SIZES.contains(&page_size) {
            return false;
        }
        self.page_size = page_size;
        self.page = 1;
        true
    }

    #[must_use]
    pub fn current_page(&self) -> &[Alert] {
        let start = (self.page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.alerts.len());
        self.alerts.get(start..end).unwrap_or_default()
    }

    fn clamp_page(&mut self) {
        self.page = self.page.clamp(1, self.page_count());
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub clock: Clock,
    pub config: AlertConfig,
    pub api: ApiBase,
    pub credential: Option<SecretString>,
    pub guard: LifecycleGuard,
    pub poller: Poller,
    pub filter: DedupFilter,
    pub presenter: Presenter,
    pub audio: AudioController,
    pub scheduler: Scheduler,
    pub storage: SlotGate,
    pub unreviewed_count: u64,
    pub activity: ActivityFeed,
    pub toast: Option<ToastMessage>,
    pub notification_permission: PermissionState,
}

impl Model {
    /// Fresh per-mount state built from a validated config.
    #[must_use]
    pub fn mounted_with(config: AlertConfig, api: ApiBase, clock: Clock) -> Self {
        Self {
            clock,
            filter: DedupFilter::new(config.cooldown_ms),
            audio: AudioController::new(config.sound_path.clone(), config.safety_stop_ms),
            api,
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|c| !c.expose_secret().is_empty())
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.credential
            .as_ref()
            .map(|c| c.expose_secret().as_str())
            .filter(|t| !t.is_empty())
    }

    pub fn set_credential(&mut self, token: Option<&str>) {
        self.credential = token
            .filter(|t| !t.trim().is_empty())
            .map(|t| SecretString::new(t.to_owned()));
    }
}
