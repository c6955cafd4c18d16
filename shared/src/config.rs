use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::capabilities::{ApiBase, HttpError};
use crate::{
    ALERT_COOLDOWN_MS, ALERT_SOUND_PATH, AUDIO_SAFETY_STOP_MS, AUDIO_WATCHDOG_MS,
    DEFAULT_API_BASE_URL, DISMISS_TRANSITION_MS, HEARTBEAT_INTERVAL_MS, LOAD_WINDOW_MS,
    POLL_INTERVAL_MS, POLL_PAUSE_MS, PROCESSED_SWEEP_MS, RELOAD_DETECTION_MS, RELOAD_WINDOW_MS,
    TOAST_DURATION_MS, USER_STOP_COOLDOWN_MS,
};

/// Runtime tuning handed over by the shell on mount. Every duration is in
/// milliseconds; missing fields take the crate defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub api_base_url: String,
    pub sound_path: String,
    pub poll_interval_ms: u64,
    pub poll_pause_ms: u64,
    pub cooldown_ms: u64,
    pub dismiss_transition_ms: u64,
    pub user_stop_cooldown_ms: u64,
    pub watchdog_interval_ms: u64,
    pub safety_stop_ms: u64,
    pub sweep_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub reload_detection_ms: u64,
    pub load_window_ms: u64,
    pub reload_window_ms: u64,
    pub toast_duration_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            sound_path: ALERT_SOUND_PATH.to_string(),
            poll_interval_ms: POLL_INTERVAL_MS,
            poll_pause_ms: POLL_PAUSE_MS,
            cooldown_ms: ALERT_COOLDOWN_MS,
            dismiss_transition_ms: DISMISS_TRANSITION_MS,
            user_stop_cooldown_ms: USER_STOP_COOLDOWN_MS,
            watchdog_interval_ms: AUDIO_WATCHDOG_MS,
            safety_stop_ms: AUDIO_SAFETY_STOP_MS,
            sweep_interval_ms: PROCESSED_SWEEP_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            reload_detection_ms: RELOAD_DETECTION_MS,
            load_window_ms: LOAD_WINDOW_MS,
            reload_window_ms: RELOAD_WINDOW_MS,
            toast_duration_ms: TOAST_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid API base URL: {0}")]
    ApiBase(#[from] HttpError),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("sound path '{path}' must be an absolute path")]
    SoundPath { path: String },

    #[error("reload window ({reload_ms}ms) is shorter than the load window ({load_ms}ms)")]
    WindowOrder { load_ms: u64, reload_ms: u64 },
}

impl AlertConfig {
    pub fn validate(&self) -> Result<ApiBase, ConfigError> {
        let base = ApiBase::new(self.api_base_url.as_str())?;

        let durations = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("poll_pause_ms", self.poll_pause_ms),
            ("dismiss_transition_ms", self.dismiss_transition_ms),
            ("user_stop_cooldown_ms", self.user_stop_cooldown_ms),
            ("watchdog_interval_ms", self.watchdog_interval_ms),
            ("safety_stop_ms", self.safety_stop_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("reload_detection_ms", self.reload_detection_ms),
            ("load_window_ms", self.load_window_ms),
            ("toast_duration_ms", self.toast_duration_ms),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroDuration { field });
        }

        if !self.sound_path.starts_with('/') {
            return Err(ConfigError::SoundPath {
                path: self.sound_path.clone(),
            });
        }

        if self.reload_window_ms < self.load_window_ms {
            return Err(ConfigError::WindowOrder {
                load_ms: self.load_window_ms,
                reload_ms: self.reload_window_ms,
            });
        }

        Ok(base)
    }

    /// Validated config and API base; anything invalid falls back to the defaults.
    pub fn resolve(candidate: Option<Self>) -> (Self, ApiBase) {
        let candidate = candidate.unwrap_or_default();
        match candidate.validate() {
            Ok(base) => (candidate, base),
            Err(e) => {
                error!(error = %e, "invalid alert config, using defaults");
                let fallback = Self::default();
                let base = fallback.default_base();
                (fallback, base)
            }
        }
    }

    fn default_base(&self) -> ApiBase {
        match ApiBase::new(self.api_base_url.as_str()) {
            Ok(base) => base,
            Err(e) => {
                error!(error = %e, "default API base rejected");
                ApiBase::default()
            }
        }
    }
}
