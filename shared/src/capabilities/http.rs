use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::api::{AlertId, CameraId, FetchError, FetchResult};
use crate::UnixTimeMs;

pub const MAX_URL_LENGTH: usize = 2048;

/// Backend API root. Always absolute `http(s)` with a trailing slash so
/// endpoint paths join underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiBase {
    url: String,
}

impl ApiBase {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let mut url = url.into();
        Self::validate(&url)?;
        if !url.ends_with('/') {
            url.push('/');
        }

        let parsed = Url::parse(&url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(&url),
            reason: e.to_string(),
        })?;

        if parsed.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(&url),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self {
            url: parsed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn check_for_alerts(&self, now: UnixTimeMs) -> Result<String, HttpError> {
        self.endpoint("check-for-alerts/", Some(now))
    }

    pub fn camera_status(&self, camera_id: &CameraId) -> Result<String, HttpError> {
        Self::validate_segment(camera_id.as_str())?;
        self.endpoint(&format!("check-camera-status/{camera_id}/"), None)
    }

    pub fn mark_reviewed(&self, alert_id: &AlertId) -> Result<String, HttpError> {
        Self::validate_segment(alert_id.as_str())?;
        self.endpoint(&format!("mark-alert-as-reviewed/{alert_id}/"), None)
    }

    pub fn alert_list(&self, now: UnixTimeMs) -> Result<String, HttpError> {
        self.endpoint("shoplifting-alerts/", Some(now))
    }

    fn endpoint(&self, path: &str, cache_buster: Option<UnixTimeMs>) -> Result<String, HttpError> {
        let base = Url::parse(&self.url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(&self.url),
            reason: e.to_string(),
        })?;
        let mut url = base.join(path).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(path),
            reason: e.to_string(),
        })?;
        if let Some(now) = cache_buster {
            url.query_pairs_mut().append_pair("t", &now.0.to_string());
        }
        Ok(url.to_string())
    }

    fn validate(url: &str) -> Result<(), HttpError> {
        if url.trim().is_empty() {
            return Err(HttpError::InvalidUrl {
                url: url.to_string(),
                reason: "URL cannot be empty".to_string(),
            });
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(url),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme().to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        if parsed.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "URL must have a host".to_string(),
            });
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "API base cannot carry a query or fragment".to_string(),
            });
        }

        Ok(())
    }

    // Ids are opaque server values; anything that would escape the path is refused.
    fn validate_segment(segment: &str) -> Result<(), HttpError> {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains(['/', '\\', '?', '#'])
            || segment.chars().any(char::is_control)
        {
            return Err(HttpError::InvalidPathSegment {
                segment: segment.chars().take(50).collect(),
            });
        }
        Ok(())
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            url.to_string()
        } else {
            let cut = (0..=100).rev().find(|i| url.is_char_boundary(*i)).unwrap_or(0);
            format!("{}...", &url[..cut])
        }
    }
}

impl Default for ApiBase {
    fn default() -> Self {
        Self {
            url: crate::DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

#[must_use]
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Folds a crux_http outcome into the domain result the update loop consumes.
pub fn into_fetch_result<T>(
    result: crux_http::Result<crux_http::Response<T>>,
) -> FetchResult<T> {
    match result {
        Ok(mut response) => {
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.into(),
                });
            }
            response.take_body().ok_or_else(|| FetchError::InvalidResponse {
                reason: "empty response body".to_string(),
            })
        }
        Err(e) => Err(FetchError::transport(e.to_string())),
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid path segment '{segment}'")]
    InvalidPathSegment { segment: String },
}
