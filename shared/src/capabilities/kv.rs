use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use thiserror::Error;

pub const MAX_KEY_LENGTH: usize = 512;
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    key: String,
}

impl KvKey {
    pub fn new(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        let key = key.into();
        Self::validate_key(&key)?;
        Ok(Self { namespace, key })
    }

    pub fn raw(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.key)
    }

    pub fn namespace(&self) -> KeyNamespace {
        self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn validate_key(key: &str) -> Result<(), KvError> {
        if key.trim().is_empty() {
            return Err(KvError::InvalidKey {
                key: key.to_string(),
                reason: "key cannot be empty".to_string(),
            });
        }

        if key.len() > MAX_KEY_LENGTH {
            return Err(KvError::InvalidKey {
                key: key.chars().take(50).collect::<String>() + "...",
                reason: format!("key exceeds maximum length of {MAX_KEY_LENGTH} bytes"),
            });
        }

        if key.contains(':') {
            return Err(KvError::InvalidKey {
                key: key.to_string(),
                reason: "key cannot contain the namespace separator".to_string(),
            });
        }

        if key.chars().any(char::is_control) {
            return Err(KvError::InvalidKey {
                key: key.escape_default().to_string(),
                reason: "key contains invalid control characters".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    Alerts,
    Session,
}

impl KeyNamespace {
    pub fn prefix(self) -> &'static str {
        match self {
            KeyNamespace::Alerts => "alerts",
            KeyNamespace::Session => "session",
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("serialization error for {key}: {message}")]
    Serialization { message: String, key: String },
}

/// JSON codec bound to one key.
#[derive(Debug, Clone)]
pub struct TypedKvSlot<T> {
    key: KvKey,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> TypedKvSlot<T> {
    pub fn new(key: KvKey) -> Self {
        Self {
            key,
            _phantom: PhantomData,
        }
    }

    pub fn key(&self) -> &KvKey {
        &self.key
    }

    pub fn encode(&self, value: &T) -> Result<Vec<u8>, KvError> {
        let data = serde_json::to_vec(value).map_err(|e| KvError::Serialization {
            message: e.to_string(),
            key: self.key.raw(),
        })?;
        if data.len() > MAX_VALUE_SIZE {
            return Err(KvError::ValueTooLarge {
                size: data.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        Ok(data)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<T, KvError> {
        serde_json::from_slice(bytes).map_err(|e| KvError::Serialization {
            message: e.to_string(),
            key: self.key.raw(),
        })
    }
}
