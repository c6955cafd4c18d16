use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::api::{
    ActivitySort, Alert, AlertId, AlertListResponse, CameraStatusResponse, CheckForAlertsResponse,
    FetchResult, StatusResponse,
};
use crate::audio::{InterruptCause, PlaybackOutcome, PlaybackSession};
use crate::capabilities::PermissionState;
use crate::config::AlertConfig;
use crate::persistence::{StorageError, StorageSlot};
use crate::UnixTimeMs;

// --- Secret wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// --- Event enum: large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle (shell)
    Mounted {
        now: UnixTimeMs,
        config: Option<Box<AlertConfig>>,
        credential: Option<Secret>,
    },
    Unmounted,
    Tick {
        now: UnixTimeMs,
    },
    CredentialChanged {
        credential: Option<Secret>,
    },
    RouteChanged {
        path: String,
    },

    // User
    UserInteracted,
    KeyPressed {
        key: String,
    },
    DismissRequested,
    ViewCameraRequested,
    ViewEvidenceRequested,
    MarkReviewedRequested {
        alert_id: AlertId,
    },
    ActivityRequested,
    ActivitySortChanged {
        sort: ActivitySort,
    },
    /// One-based page number; out-of-range values are clamped.
    ActivityPageChanged {
        page: usize,
    },
    ActivityPageSizeChanged {
        page_size: usize,
    },

    // Backend responses
    AlertsChecked(Box<FetchResult<CheckForAlertsResponse>>),
    CameraStatusChecked {
        alert: Box<Alert>,
        result: FetchResult<CameraStatusResponse>,
    },
    AlertMarkedReviewed {
        alert_id: AlertId,
        result: FetchResult<StatusResponse>,
    },
    ActivityLoaded(Box<FetchResult<AlertListResponse>>),

    // Storage
    StorageLoaded {
        slot: StorageSlot,
        result: Result<Option<Vec<u8>>, StorageError>,
    },
    StorageWritten {
        slot: StorageSlot,
        result: Result<(), StorageError>,
    },

    // Alarm
    PlaybackSettled {
        session: PlaybackSession,
        outcome: PlaybackOutcome,
    },
    /// Sent by the shell when a live element ends or errors on its own.
    PlaybackInterrupted {
        session: PlaybackSession,
        cause: InterruptCause,
    },
    PlaybackChecked {
        session: PlaybackSession,
        active: bool,
    },
    NotificationPermission(PermissionState),
}

impl Event {
    /// Events that count as a user interaction for the load window.
    #[must_use]
    pub fn is_user_interaction(&self) -> bool {
        matches!(
            self,
            Self::UserInteracted
                | Self::KeyPressed { .. }
                | Self::DismissRequested
                | Self::ViewCameraRequested
                | Self::ViewEvidenceRequested
                | Self::MarkReviewedRequested { .. }
                | Self::ActivitySortChanged { .. }
                | Self::ActivityPageChanged { .. }
                | Self::ActivityPageSizeChanged { .. }
        )
    }
}
