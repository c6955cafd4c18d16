// lib.rs - StoreWatch live alert core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod audio;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod filter;
pub mod lifecycle;
pub mod model;
pub mod persistence;
pub mod poller;
pub mod presenter;
pub mod scheduler;

use serde::{Deserialize, Serialize};

pub use api::{ActivitySort, Alert, AlertId, CameraId};
pub use app::App;
pub use audio::AudioState;
pub use capabilities::{Capabilities, Effect};
pub use config::AlertConfig;
pub use event::{Event, Secret};
pub use model::Model;
pub use presenter::PresentationState;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";
pub const ALERT_SOUND_PATH: &str = "/alert-sound.mp3";

pub const POLL_INTERVAL_MS: u64 = 5_000;
pub const POLL_PAUSE_MS: u64 = 5_000;
pub const ALERT_COOLDOWN_MS: u64 = 30_000;
pub const DISMISS_TRANSITION_MS: u64 = 300;
pub const USER_STOP_COOLDOWN_MS: u64 = 1_000;
pub const AUDIO_WATCHDOG_MS: u64 = 2_000;
pub const AUDIO_SAFETY_STOP_MS: u64 = 30_000;
pub const PROCESSED_SWEEP_MS: u64 = 60_000;
pub const PROCESSED_SWEEP_THRESHOLD: usize = 100;
pub const PROCESSED_SWEEP_KEEP: usize = 50;
pub const PERSISTED_ID_CAP: usize = 500;
pub const HEARTBEAT_INTERVAL_MS: u64 = 1_000;
pub const RELOAD_DETECTION_MS: u64 = 3_000;
pub const LOAD_WINDOW_MS: u64 = 5_000;
pub const RELOAD_WINDOW_MS: u64 = 10_000;
pub const TOAST_DURATION_MS: u64 = 3_000;
pub const ACTIVITY_PAGE_SIZE: usize = 10;
pub const ACTIVITY_PAGE_SIZES: [usize; 4] = [5, 10, 20, 25];

pub const LIVE_CAMERA_ROUTE: &str = "/shoplifting-detection";
pub const ACTIVITY_REVIEW_ROUTE: &str = "/recent-activity";
pub const ALERT_HEADLINE: &str = "SHOPLIFTING ALERT!!";
pub const SYSTEM_NOTIFICATION_TITLE: &str = "Shoplifting Alert!";

/// Explicit timestamp unit. Every instant the core reasons about comes from the shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub fn elapsed_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    #[must_use]
    pub fn add_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    #[must_use]
    pub fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }

    #[must_use]
    pub fn is_after(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl std::fmt::Display for UnixTimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Monotonic view of shell time. Ticks that go backwards are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    now: UnixTimeMs,
}

impl Clock {
    #[must_use]
    pub fn starting_at(now: UnixTimeMs) -> Self {
        Self { now }
    }

    #[must_use]
    pub fn now(&self) -> UnixTimeMs {
        self.now
    }

    /// Returns `false` when the reading was older than the current time.
    pub fn advance_to(&mut self, reading: UnixTimeMs) -> bool {
        if reading.is_before(self.now) {
            return false;
        }
        self.now = reading;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToastKind {
    Success,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at: UnixTimeMs,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind, now: UnixTimeMs) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at: now,
            duration_ms: TOAST_DURATION_MS,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: UnixTimeMs) -> bool {
        now.elapsed_since(self.created_at) >= self.duration_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastView {
    pub message: String,
    pub kind: String,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertAnimation {
    SlideIn,
    SlideOut,
}

impl AlertAnimation {
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::SlideIn => "animate-slide-in-right",
            Self::SlideOut => "animate-slide-out-right",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCard {
    pub id: String,
    pub headline: String,
    pub message: String,
    pub camera_name: String,
    pub thumbnail: Option<String>,
    pub timestamp: String,
    pub animation: AlertAnimation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: String,
    pub camera_name: String,
    pub timestamp: String,
    pub thumbnail: Option<String>,
    pub video_clip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFeedView {
    /// Items on the current page only.
    pub items: Vec<ActivityItem>,
    pub sort: ActivitySort,
    pub is_loading: bool,
    pub total_items: usize,
    /// One-based.
    pub page: usize,
    pub page_count: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    pub presentation: PresentationState,
    pub alert: Option<AlertCard>,
    pub queued_count: usize,
    pub unreviewed_count: u64,
    pub audio: AudioState,
    pub polling_paused: bool,
    pub activity: ActivityFeedView,
    pub toast: Option<ToastView>,
}
