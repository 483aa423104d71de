//! Sensor-clock to video-clock alignment.
//!
//! Each trip has one base offset `offsetSeconds = dataStart - videoStart`,
//! derived from the 14-digit datetime prefixes of the trip folder and its
//! video file. A per-trip override shadows it:
//!
//! ```text
//! effective = override ?? base
//! t_video   = t_data + effective
//! ```
//!
//! Series are shifted once at load time. Changing the override must go
//! through a full reload so that axis and filter state keyed to the old
//! time base is discarded.

use crate::error::{Result, TripError};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, warn};
use tripsync_env::TripId;

/// Length of the `YYYYMMDDhhmmss` prefix on dataset folder and video names.
const DATETIME_PREFIX_LEN: usize = 14;

/// Offset actually applied to a trip.
pub fn effective_offset(base: f64, override_seconds: Option<f64>) -> f64 {
    override_seconds.unwrap_or(base)
}

/// Parses the leading `YYYYMMDDhhmmss` of a folder or file name.
pub fn parse_datetime_prefix(name: &str) -> Option<NaiveDateTime> {
    let prefix = name.get(..DATETIME_PREFIX_LEN)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(prefix, "%Y%m%d%H%M%S").ok()
}

/// Base offset from the trip folder name and its video file name.
///
/// Falls back to 0 when either name lacks a valid datetime prefix.
pub fn offset_from_names(folder_name: &str, video_name: Option<&str>) -> f64 {
    let data_start = parse_datetime_prefix(folder_name);
    let video_start = video_name.and_then(parse_datetime_prefix);
    match (data_start, video_start) {
        (Some(data), Some(video)) => (data - video).num_milliseconds() as f64 / 1000.0,
        _ => 0.0,
    }
}

/// Per-trip sync override storage.
///
/// A stored value that is not finite reads back as absent.
pub trait SyncOverrideStore: Send + Sync {
    /// Current override for a trip, if any.
    fn get(&self, trip: &TripId) -> Option<f64>;

    /// Stores an override; `None` clears it.
    fn set(&self, trip: &TripId, value: Option<f64>) -> Result<()>;
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Process-local override store.
#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    entries: RwLock<HashMap<TripId, f64>>,
}

impl MemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncOverrideStore for MemoryOverrideStore {
    fn get(&self, trip: &TripId) -> Option<f64> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        finite(entries.get(trip).copied())
    }

    fn set(&self, trip: &TripId, value: Option<f64>) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match value {
            Some(v) => entries.insert(trip.clone(), v),
            None => entries.remove(trip),
        };
        Ok(())
    }
}

/// Sled-backed persistent override store.
///
/// Keys are trip id bytes, values are little-endian `f64`.
pub struct SledOverrideStore {
    db: sled::Db,
}

impl SledOverrideStore {
    /// Open a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| TripError::storage(format!("Failed to open sled DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Create a temporary store, removed on drop
    pub fn open_temp() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| TripError::storage(format!("Failed to open temp DB: {}", e)))?;
        Ok(Self { db })
    }

    /// Number of stored overrides.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl SyncOverrideStore for SledOverrideStore {
    fn get(&self, trip: &TripId) -> Option<f64> {
        let bytes = match self.db.get(trip.as_str().as_bytes()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(trip = %trip, error = %e, "sync override lookup failed");
                return None;
            }
        };
        let raw: [u8; 8] = bytes.as_ref().try_into().ok()?;
        finite(Some(f64::from_le_bytes(raw)))
    }

    fn set(&self, trip: &TripId, value: Option<f64>) -> Result<()> {
        let key = trip.as_str().as_bytes();
        match value {
            Some(v) => {
                self.db
                    .insert(key, v.to_le_bytes().to_vec())
                    .map_err(|e| TripError::storage(format!("Insert failed: {}", e)))?;
            }
            None => {
                self.db
                    .remove(key)
                    .map_err(|e| TripError::storage(format!("Remove failed: {}", e)))?;
            }
        }
        self.db
            .flush()
            .map_err(|e| TripError::storage(format!("Flush failed: {}", e)))?;
        debug!(trip = %trip, ?value, "sync override stored");
        Ok(())
    }
}

/// Built-in per-trip overrides, matched by substring of the trip id.
///
/// Consulted only when the backing store has no entry for the trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultOverrides {
    rules: Vec<(String, f64)>,
}

impl DefaultOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults shipped with the viewer for known mis-stamped recordings.
    pub fn builtin() -> Self {
        Self::new().with("20151111125233-24km-D1-AGGRESSIVE-MOTORWAY", 0.0)
    }

    pub fn with(mut self, pattern: impl Into<String>, seconds: f64) -> Self {
        self.rules.push((pattern.into(), seconds));
        self
    }

    pub fn lookup(&self, trip: &TripId) -> Option<f64> {
        self.rules
            .iter()
            .find(|(pattern, _)| trip.as_str().contains(pattern.as_str()))
            .map(|(_, seconds)| *seconds)
    }
}

/// Override store layered over built-in defaults.
pub struct LayeredOverrideStore<S> {
    store: S,
    defaults: DefaultOverrides,
}

impl<S: SyncOverrideStore> LayeredOverrideStore<S> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn defaults(&self) -> &DefaultOverrides {
        &self.defaults
    }
}

/// Wraps a store so lookups fall back to `defaults`.
pub fn with_defaults<S: SyncOverrideStore>(store: S, defaults: DefaultOverrides) -> LayeredOverrideStore<S> {
    LayeredOverrideStore { store, defaults }
}

impl<S: SyncOverrideStore> SyncOverrideStore for LayeredOverrideStore<S> {
    fn get(&self, trip: &TripId) -> Option<f64> {
        self.store.get(trip).or_else(|| self.defaults.lookup(trip))
    }

    fn set(&self, trip: &TripId, value: Option<f64>) -> Result<()> {
        self.store.set(trip, value)
    }
}
