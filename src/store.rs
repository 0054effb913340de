//! Saved-look persistence: upsert, full scan, delete by id.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::OutfitRecord;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts or replaces the record stored under `record.id`.
    async fn put(&self, record: &OutfitRecord) -> Result<(), StoreError>;

    /// Every stored record, newest `saved_at` first.
    async fn list_all(&self) -> Result<Vec<OutfitRecord>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;
}

/// Newest first; unstamped records go last. Stable, so equal stamps keep key order.
pub fn sort_newest_first(records: &mut [OutfitRecord]) {
    records.sort_by(|a, b| b.saved_at.unwrap_or(i64::MIN).cmp(&a.saved_at.unwrap_or(i64::MIN)));
}

/// Issues strictly increasing millisecond stamps, even for saves landing in
/// the same millisecond.
#[derive(Debug, Default)]
pub struct SaveClock {
    last: AtomicI64,
}

impl SaveClock {
    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self.last.compare_exchange_weak(prev, candidate, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Copy of a run record ready to persist: re-keyed to `<run id>-<stamp>` so
/// saves from different runs never collide.
pub fn prepare_for_save(record: &OutfitRecord, saved_at: i64) -> OutfitRecord {
    let mut saved = record.clone();
    saved.id = format!("{}-{}", record.id, saved_at);
    saved.saved_at = Some(saved_at);
    saved
}

pub struct SledRecordStore {
    db: sled::Db,
}

impl SledRecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .path(path.as_ref())
            .mode(sled::Mode::HighThroughput)
            .flush_every_ms(Some(1000))
            .open()?;
        info!(path = %path.as_ref().display(), records = db.len(), "Opened saved-look store");
        Ok(Self { db })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(sled::Db) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(db))
            .await
            .map_err(|e| StoreError(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl RecordStore for SledRecordStore {
    async fn put(&self, record: &OutfitRecord) -> Result<(), StoreError> {
        let key = record.id.clone();
        let json = serde_json::to_vec(record)?;
        self.blocking(move |db| {
            db.insert(key.as_bytes(), json)?;
            db.flush()?;
            debug!(id = %key, "Stored record");
            Ok(())
        }).await
    }

    async fn list_all(&self) -> Result<Vec<OutfitRecord>, StoreError> {
        let mut records = self.blocking(|db| {
            db.iter()
                .values()
                .map(|value| -> Result<OutfitRecord, StoreError> { Ok(serde_json::from_slice(&value?)?) })
                .collect::<Result<Vec<_>, StoreError>>()
        }).await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let key = id.to_string();
        self.blocking(move |db| {
            let removed = db.remove(key.as_bytes())?.is_some();
            if removed {
                db.flush()?;
            }
            Ok(removed)
        }).await
    }
}

/// Process-local store; contents vanish with the process.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, OutfitRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: &OutfitRecord) -> Result<(), StoreError> {
        self.records.write().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<OutfitRecord>, StoreError> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutfitConcept;

    #[test]
    fn save_clock_is_strictly_increasing() {
        let clock = SaveClock::default();
        let stamps: Vec<i64> = (0..100).map(|_| clock.next()).collect();
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn prepare_for_save_rekeys_and_stamps() {
        let record = OutfitRecord::materialize(OutfitConcept::Casual, None, "look".into(), vec![], "AAAA");
        let saved = prepare_for_save(&record, 1_700_000_000_123);
        assert_eq!(saved.id, "1-1700000000123");
        assert_eq!(saved.saved_at, Some(1_700_000_000_123));
        assert_eq!(saved.source_image, record.source_image);
        assert_eq!(record.id, "1");
    }
}
