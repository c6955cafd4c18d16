//! Best-effort persisted state. Values are JSON; a missing, unreadable or
//! corrupt slot reads as its default.

use std::collections::HashSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::api::AlertId;
use crate::capabilities::{KeyNamespace, KvError, KvKey, TypedKvSlot};
use crate::UnixTimeMs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageSlot {
    LastAlertId,
    LastAlertTime,
    ShownIds,
    ProcessedIds,
    Heartbeat,
}

impl StorageSlot {
    pub const ALL: [Self; 5] = [
        Self::LastAlertId,
        Self::LastAlertTime,
        Self::ShownIds,
        Self::ProcessedIds,
        Self::Heartbeat,
    ];

    /// Slots read once on mount to rebuild the dedup state.
    pub const RESTORED_ON_MOUNT: [Self; 4] = [
        Self::LastAlertId,
        Self::LastAlertTime,
        Self::ShownIds,
        Self::ProcessedIds,
    ];

    const fn location(self) -> (KeyNamespace, &'static str) {
        match self {
            Self::LastAlertId => (KeyNamespace::Alerts, "last_alert_id"),
            Self::LastAlertTime => (KeyNamespace::Alerts, "last_alert_time"),
            Self::ShownIds => (KeyNamespace::Alerts, "shown_ids"),
            Self::ProcessedIds => (KeyNamespace::Alerts, "processed_ids"),
            Self::Heartbeat => (KeyNamespace::Session, "heartbeat"),
        }
    }

    pub fn key(self) -> Result<KvKey, KvError> {
        let (namespace, key) = self.location();
        KvKey::new(namespace, key)
    }

    /// Decodes what the shell returned. Missing means default; corrupt data
    /// is logged and also reads as default.
    #[must_use]
    pub fn decode(self, bytes: Option<&[u8]>) -> StoredValue {
        let empty = StoredValue::empty(self);
        let Some(bytes) = bytes else {
            return empty;
        };
        match self.try_decode(bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(slot = ?self, error = %e, "discarding corrupt stored value");
                empty
            }
        }
    }

    fn try_decode(self, bytes: &[u8]) -> Result<StoredValue, StorageError> {
        let key = self.key()?;
        let value = match self {
            Self::LastAlertId => {
                StoredValue::LastAlertId(TypedKvSlot::<Option<AlertId>>::new(key).decode(bytes)?)
            }
            Self::LastAlertTime => StoredValue::LastAlertTime(
                TypedKvSlot::<Option<u64>>::new(key).decode(bytes)?.map(UnixTimeMs),
            ),
            Self::ShownIds => {
                StoredValue::ShownIds(TypedKvSlot::<Vec<AlertId>>::new(key).decode(bytes)?)
            }
            Self::ProcessedIds => {
                StoredValue::ProcessedIds(TypedKvSlot::<Vec<AlertId>>::new(key).decode(bytes)?)
            }
            Self::Heartbeat => StoredValue::Heartbeat(
                TypedKvSlot::<Option<u64>>::new(key).decode(bytes)?.map(UnixTimeMs),
            ),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    LastAlertId(Option<AlertId>),
    LastAlertTime(Option<UnixTimeMs>),
    ShownIds(Vec<AlertId>),
    ProcessedIds(Vec<AlertId>),
    Heartbeat(Option<UnixTimeMs>),
}

impl StoredValue {
    #[must_use]
    pub fn empty(slot: StorageSlot) -> Self {
        match slot {
            StorageSlot::LastAlertId => Self::LastAlertId(None),
            StorageSlot::LastAlertTime => Self::LastAlertTime(None),
            StorageSlot::ShownIds => Self::ShownIds(Vec::new()),
            StorageSlot::ProcessedIds => Self::ProcessedIds(Vec::new()),
            StorageSlot::Heartbeat => Self::Heartbeat(None),
        }
    }

    #[must_use]
    pub fn slot(&self) -> StorageSlot {
        match self {
            Self::LastAlertId(_) => StorageSlot::LastAlertId,
            Self::LastAlertTime(_) => StorageSlot::LastAlertTime,
            Self::ShownIds(_) => StorageSlot::ShownIds,
            Self::ProcessedIds(_) => StorageSlot::ProcessedIds,
            Self::Heartbeat(_) => StorageSlot::Heartbeat,
        }
    }

    /// Raw key and JSON bytes ready for the key-value capability.
    pub fn encode(&self) -> Result<(String, Vec<u8>), StorageError> {
        let key = self.slot().key()?;
        let raw = key.raw();
        let bytes = match self {
            Self::LastAlertId(id) => TypedKvSlot::new(key).encode(id)?,
            Self::LastAlertTime(at) | Self::Heartbeat(at) => {
                TypedKvSlot::new(key).encode(&at.map(|t| t.0))?
            }
            Self::ShownIds(ids) | Self::ProcessedIds(ids) => TypedKvSlot::new(key).encode(ids)?,
        };
        Ok((raw, bytes))
    }
}

/// Tracks which slots have been read back since mount. A slot is only
/// written once its stored contents are merged in; earlier writes are
/// held back and replayed after the read.
#[derive(Debug, Default)]
pub struct SlotGate {
    restored: HashSet<StorageSlot>,
    deferred: HashSet<StorageSlot>,
}

impl SlotGate {
    #[must_use]
    pub fn is_restored(&self, slot: StorageSlot) -> bool {
        self.restored.contains(&slot)
    }

    /// Whether a write to `slot` may go out now. If not, the write is
    /// remembered for [`SlotGate::mark_restored`].
    pub fn admit(&mut self, slot: StorageSlot) -> bool {
        if self.is_restored(slot) {
            return true;
        }
        self.deferred.insert(slot);
        false
    }

    /// Records the read of `slot`. Returns whether a write was held back.
    pub fn mark_restored(&mut self, slot: StorageSlot) -> bool {
        self.restored.insert(slot);
        self.deferred.remove(&slot)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageError {
    #[error("reading {slot:?} failed: {message}")]
    Read { slot: StorageSlot, message: String },

    #[error("writing {slot:?} failed: {message}")]
    Write { slot: StorageSlot, message: String },

    #[error(transparent)]
    Codec(#[from] KvError),
}

/// Normalizes a key-value read into the bytes it produced, keeping the
/// shell's error text.
pub fn read_outcome<E: Display>(
    slot: StorageSlot,
    result: Result<Option<Vec<u8>>, E>,
) -> Result<Option<Vec<u8>>, StorageError> {
    result.map_err(|e| StorageError::Read {
        slot,
        message: e.to_string(),
    })
}

pub fn write_outcome<T, E: Display>(
    slot: StorageSlot,
    result: Result<T, E>,
) -> Result<(), StorageError> {
    result.map(|_| ()).map_err(|e| StorageError::Write {
        slot,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_keys() {
        let keys: Vec<String> = StorageSlot::ALL
            .iter()
            .map(|s| s.key().unwrap().raw())
            .collect();
        assert_eq!(
            keys,
            vec![
                "alerts:last_alert_id",
                "alerts:last_alert_time",
                "alerts:shown_ids",
                "alerts:processed_ids",
                "session:heartbeat",
            ]
        );
    }

    #[test]
    fn test_missing_reads_as_default() {
        for slot in StorageSlot::ALL {
            assert_eq!(slot.decode(None), StoredValue::empty(slot));
        }
    }

    #[test]
    fn test_corrupt_reads_as_default() {
        assert_eq!(
            StorageSlot::ProcessedIds.decode(Some(b"{not json".as_slice())),
            StoredValue::ProcessedIds(Vec::new())
        );
        assert_eq!(
            StorageSlot::Heartbeat.decode(Some(b"\"yesterday\"".as_slice())),
            StoredValue::Heartbeat(None)
        );
    }

    #[test]
    fn test_processed_ids_accept_numbers() {
        assert_eq!(
            StorageSlot::ProcessedIds.decode(Some(br#"[12, "13"]"#.as_slice())),
            StoredValue::ProcessedIds(vec![AlertId::new("12"), AlertId::new("13")])
        );
    }

    #[test]
    fn test_encode_heartbeat() {
        let (key, bytes) = StoredValue::Heartbeat(Some(UnixTimeMs(1_700_000_000_000)))
            .encode()
            .unwrap();
        assert_eq!(key, "session:heartbeat");
        assert_eq!(bytes, b"1700000000000");
        assert_eq!(
            StorageSlot::Heartbeat.decode(Some(bytes.as_slice())),
            StoredValue::Heartbeat(Some(UnixTimeMs(1_700_000_000_000)))
        );
    }

    #[test]
    fn test_null_last_id_reads_as_default() {
        assert_eq!(
            StorageSlot::LastAlertId.decode(Some(b"null".as_slice())),
            StoredValue::LastAlertId(None)
        );
    }

    #[test]
    fn test_gate_holds_writes_until_read() {
        let mut gate = SlotGate::default();
        assert!(!gate.admit(StorageSlot::ProcessedIds));
        assert!(!gate.admit(StorageSlot::ProcessedIds));
        assert!(!gate.is_restored(StorageSlot::ProcessedIds));

        assert!(gate.mark_restored(StorageSlot::ProcessedIds));
        assert!(gate.admit(StorageSlot::ProcessedIds));
        assert!(!gate.admit(StorageSlot::ShownIds));
    }

    #[test]
    fn test_gate_read_without_pending_write() {
        let mut gate = SlotGate::default();
        assert!(!gate.mark_restored(StorageSlot::Heartbeat));
        assert!(gate.is_restored(StorageSlot::Heartbeat));
        // A repeated read does not replay anything.
        assert!(!gate.mark_restored(StorageSlot::Heartbeat));
    }

    #[test]
    fn test_outcome_helpers_keep_error_text() {
        let read: Result<Option<Vec<u8>>, &str> = Err("quota");
        assert_eq!(
            read_outcome(StorageSlot::ShownIds, read),
            Err(StorageError::Read {
                slot: StorageSlot::ShownIds,
                message: "quota".into()
            })
        );
        assert_eq!(
            write_outcome::<Option<Vec<u8>>, &str>(StorageSlot::Heartbeat, Ok(None)),
            Ok(())
        );
    }
}
