//! In-memory [`StatsStore`] with snapshot rollback.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VecnodeError};
use crate::stats::{Bm25Stats, StatsStore};

/// Keyed by `(collection, output field)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StatsTables {
    fields: BTreeMap<(String, String), Bm25Stats>,
}

impl StatsTables {
    fn entry(&mut self, collection: &str, field: &str) -> &mut Bm25Stats {
        self.fields
            .entry((collection.to_string(), field.to_string()))
            .or_default()
    }

    fn get(&self, collection: &str, field: &str) -> Option<&Bm25Stats> {
        self.fields
            .get(&(collection.to_string(), field.to_string()))
    }
}

/// Statistics kept in process memory.
///
/// `begin` snapshots the tables and `rollback` restores the snapshot, so one
/// transaction may be open at a time.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    tables: RwLock<StatsTables>,
    snapshot: Mutex<Option<StatsTables>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write every table to `path` with bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(&*self.tables.read())?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a store written by [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        let tables: StatsTables = bincode::deserialize(&bytes)?;
        Ok(MemoryStatsStore {
            tables: RwLock::new(tables),
            snapshot: Mutex::new(None),
        })
    }
}

impl StatsStore for MemoryStatsStore {
    fn begin(&self) -> Result<()> {
        let mut snapshot = self.snapshot.lock();
        if snapshot.is_some() {
            return Err(VecnodeError::internal("stats transaction already open"));
        }
        *snapshot = Some(self.tables.read().clone());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.snapshot
            .lock()
            .take()
            .map(|_| ())
            .ok_or_else(|| VecnodeError::internal("no stats transaction to commit"))
    }

    fn rollback(&self) -> Result<()> {
        let saved = self
            .snapshot
            .lock()
            .take()
            .ok_or_else(|| VecnodeError::internal("no stats transaction to roll back"))?;
        warn!("rolling back bm25 stats transaction");
        *self.tables.write() = saved;
        Ok(())
    }

    fn add_token_doc(
        &self,
        collection: &str,
        field: &str,
        token_infos: &BTreeMap<u32, i64>,
    ) -> Result<()> {
        self.tables
            .write()
            .entry(collection, field)
            .add_token_docs(token_infos);
        Ok(())
    }

    fn delete_token_doc(
        &self,
        collection: &str,
        field: &str,
        token_infos: &BTreeMap<u32, i64>,
    ) -> Result<()> {
        self.tables
            .write()
            .entry(collection, field)
            .remove_token_docs(token_infos);
        Ok(())
    }

    fn add_bm25_stats(
        &self,
        collection: &str,
        field: &str,
        token_num: i64,
        doc_num: i64,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let stats = tables.entry(collection, field);
        stats.token_num += token_num;
        stats.doc_num += doc_num;
        debug!(
            "bm25 stats {collection}.{field}: token_num={} doc_num={}",
            stats.token_num, stats.doc_num
        );
        Ok(())
    }

    fn delete_bm25_stats(
        &self,
        collection: &str,
        field: &str,
        token_num: i64,
        doc_num: i64,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let stats = tables.entry(collection, field);
        stats.token_num -= token_num;
        stats.doc_num -= doc_num;
        if stats.token_num < 0 || stats.doc_num < 0 {
            return Err(VecnodeError::internal(format!(
                "bm25 stats of {collection}.{field} went negative"
            )));
        }
        Ok(())
    }

    fn get_token_doc_count(&self, collection: &str, field: &str, token: u32) -> Result<i64> {
        Ok(self
            .tables
            .read()
            .get(collection, field)
            .map_or(0, |stats| stats.doc_count(token)))
    }

    fn get_token_num_and_doc_num(&self, collection: &str, field: &str) -> Result<(i64, i64)> {
        Ok(self
            .tables
            .read()
            .get(collection, field)
            .map_or((0, 0), |stats| (stats.token_num, stats.doc_num)))
    }

    fn drop_collection_stats(&self, collection: &str) -> Result<()> {
        self.tables
            .write()
            .fields
            .retain(|(name, _), _| name != collection);
        Ok(())
    }

    fn stats(&self, collection: &str, field: &str) -> Result<Bm25Stats> {
        Ok(self
            .tables
            .read()
            .get(collection, field)
            .cloned()
            .unwrap_or_default())
    }
}
