use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

// --- Opaque ids: the backend sends numbers or strings, both decode the same ---

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Serialize, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Text(String),
                    Signed(i64),
                    Unsigned(u64),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Text(s) => Self(s),
                    Raw::Signed(n) => Self(n.to_string()),
                    Raw::Unsigned(n) => Self(n.to_string()),
                })
            }
        }
    };
}

opaque_id!(AlertId);
opaque_id!(CameraId);

/// A server-reported candidate security event. Never mutated by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(default)]
    pub camera_id: CameraId,
    #[serde(default)]
    pub camera_name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub video_clip: Option<String>,
}

pub const STATUS_SUCCESS: &str = "success";
pub const CAMERA_ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckForAlertsResponse {
    pub status: String,
    #[serde(default)]
    pub unreviewed_count: u64,
    #[serde(default)]
    pub latest_alert: Option<Alert>,
}

impl CheckForAlertsResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraStatusResponse {
    pub status: String,
}

impl CameraStatusResponse {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == CAMERA_ACTIVE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertListResponse {
    pub status: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl AlertListResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivitySort {
    #[default]
    Newest,
    Oldest,
}

impl ActivitySort {
    /// Orders by the instant in the server timestamp, ties broken by id so
    /// the order is total.
    pub fn apply(self, alerts: &mut [Alert]) {
        alerts.sort_by(|a, b| {
            let ord = instant_key(&a.timestamp)
                .cmp(&instant_key(&b.timestamp))
                .then_with(|| a.id.cmp(&b.id));
            match self {
                Self::Oldest => ord,
                Self::Newest => ord.reverse(),
            }
        });
    }
}

/// Splits `YYYY-MM-DDTHH:MM:SS[.fff][Z]` into its whole-second text and the
/// fraction in nanoseconds. Anything shorter compares as plain text.
fn instant_key(timestamp: &str) -> (&str, u32) {
    let (Some(whole), Some(rest)) = (timestamp.get(..19), timestamp.get(19..)) else {
        return (timestamp, 0);
    };
    let nanos = rest.strip_prefix('.').map_or(0, |fraction| {
        let digits: String = fraction
            .chars()
            .take_while(char::is_ascii_digit)
            .take(9)
            .collect();
        format!("{digits:0<9}").parse().unwrap_or(0)
    });
    (whole, nanos)
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("HTTP error {status}")]
    Status { status: u16 },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
