//! BM25 corpus statistics.
//!
//! Per (collection, output field) the store keeps the total number of tokens,
//! the number of documents, and for every token the number of documents that
//! contain it. Inserts add a batch's [`Bm25Stats`] delta and deletes subtract
//! the delta recomputed from the deleted rows, so an insert followed by a
//! delete of the same rows leaves every counter where it started.

pub mod memory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::function::sparse::{SparseVector, decode_sparse};

pub use memory::MemoryStatsStore;

/// Token and document counters of one BM25 output field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bm25Stats {
    pub token_num: i64,
    pub doc_num: i64,
    pub token_doc_count: BTreeMap<u32, i64>,
}

impl Bm25Stats {
    /// Delta contributed by a batch of encoded sparse rows, one per document.
    pub fn from_rows<B: AsRef<[u8]>>(rows: &[B]) -> Result<Self> {
        let mut stats = Bm25Stats {
            doc_num: rows.len() as i64,
            ..Default::default()
        };
        for row in rows {
            for (token, count) in decode_sparse(row.as_ref())? {
                *stats.token_doc_count.entry(token).or_insert(0) += 1;
                stats.token_num += count as i64;
            }
        }
        Ok(stats)
    }

    pub fn doc_count(&self, token: u32) -> i64 {
        self.token_doc_count.get(&token).copied().unwrap_or(0)
    }

    /// Average document length, 0 for an empty corpus.
    pub fn avgdl(&self) -> f64 {
        if self.doc_num <= 0 {
            0.0
        } else {
            self.token_num as f64 / self.doc_num as f64
        }
    }

    /// `freq * ln(1 + (N - n + 0.5) / (n + 0.5))`.
    pub fn idf_weight(&self, token: u32, freq: f32) -> f32 {
        let n = self.doc_count(token) as f64;
        let total = self.doc_num as f64;
        let idf = (1.0 + (total - n + 0.5) / (n + 0.5)).ln();
        (f64::from(freq) * idf) as f32
    }

    /// Weight every term of a query vector by its IDF.
    pub fn apply_idf(&self, query: &[(u32, f32)]) -> SparseVector {
        query
            .iter()
            .map(|&(token, freq)| (token, self.idf_weight(token, freq)))
            .collect()
    }

    pub(crate) fn merge(&mut self, delta: &Bm25Stats) {
        self.token_num += delta.token_num;
        self.doc_num += delta.doc_num;
        self.add_token_docs(&delta.token_doc_count);
    }

    pub(crate) fn add_token_docs(&mut self, counts: &BTreeMap<u32, i64>) {
        for (&token, &count) in counts {
            *self.token_doc_count.entry(token).or_insert(0) += count;
        }
    }

    /// Subtract per-token counts; tokens that reach zero are dropped.
    pub(crate) fn remove_token_docs(&mut self, counts: &BTreeMap<u32, i64>) {
        for (&token, &count) in counts {
            let entry = self.token_doc_count.entry(token).or_insert(0);
            *entry -= count;
            if *entry == 0 {
                self.token_doc_count.remove(&token);
            }
        }
    }
}

/// Transactional store of BM25 statistics.
///
/// Mutations between [`begin`](StatsStore::begin) and
/// [`commit`](StatsStore::commit) are discarded by
/// [`rollback`](StatsStore::rollback).
pub trait StatsStore: Send + Sync + std::fmt::Debug {
    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    /// Increment the doc count of every token by its count in `token_infos`.
    fn add_token_doc(
        &self,
        collection: &str,
        field: &str,
        token_infos: &BTreeMap<u32, i64>,
    ) -> Result<()>;

    fn delete_token_doc(
        &self,
        collection: &str,
        field: &str,
        token_infos: &BTreeMap<u32, i64>,
    ) -> Result<()>;

    fn add_bm25_stats(&self, collection: &str, field: &str, token_num: i64, doc_num: i64)
    -> Result<()>;

    fn delete_bm25_stats(
        &self,
        collection: &str,
        field: &str,
        token_num: i64,
        doc_num: i64,
    ) -> Result<()>;

    /// Documents containing `token`; 0 if unknown.
    fn get_token_doc_count(&self, collection: &str, field: &str, token: u32) -> Result<i64>;

    /// `(token_num, doc_num)`; zeros if the field has no stats yet.
    fn get_token_num_and_doc_num(&self, collection: &str, field: &str) -> Result<(i64, i64)>;

    fn drop_collection_stats(&self, collection: &str) -> Result<()>;

    /// Full copy of one field's statistics.
    fn stats(&self, collection: &str, field: &str) -> Result<Bm25Stats>;

    /// Apply a batch delta (insert side).
    fn apply_insert(&self, collection: &str, field: &str, delta: &Bm25Stats) -> Result<()> {
        self.add_bm25_stats(collection, field, delta.token_num, delta.doc_num)?;
        self.add_token_doc(collection, field, &delta.token_doc_count)
    }

    /// Revert a batch delta (delete side).
    fn apply_delete(&self, collection: &str, field: &str, delta: &Bm25Stats) -> Result<()> {
        self.delete_bm25_stats(collection, field, delta.token_num, delta.doc_num)?;
        self.delete_token_doc(collection, field, &delta.token_doc_count)
    }
}

/// Run `f` inside a stats transaction, committing on success and rolling
/// back on failure.
pub fn with_transaction<S, T, F>(store: &S, f: F) -> Result<T>
where
    S: StatsStore + ?Sized,
    F: FnOnce() -> Result<T>,
{
    store.begin()?;
    match f() {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            store.rollback()?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::sparse::encode_sparse;

    fn row(pairs: &[(u32, f32)]) -> Vec<u8> {
        encode_sparse(&pairs.iter().copied().collect())
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![row(&[(1, 2.0), (2, 1.0)]), row(&[(1, 1.0)])];
        let stats = Bm25Stats::from_rows(&rows).unwrap();
        assert_eq!(stats.doc_num, 2);
        assert_eq!(stats.token_num, 4);
        assert_eq!(stats.doc_count(1), 2);
        assert_eq!(stats.doc_count(2), 1);
        assert_eq!(stats.doc_count(3), 0);
        assert_eq!(stats.avgdl(), 2.0);
    }

    #[test]
    fn test_idf_weight() {
        let stats = Bm25Stats {
            token_num: 10,
            doc_num: 4,
            token_doc_count: [(7, 1)].into_iter().collect(),
        };
        let expected = 2.0 * (1.0f64 + (4.0 - 1.0 + 0.5) / 1.5).ln();
        assert!((stats.idf_weight(7, 2.0) as f64 - expected).abs() < 1e-6);

        // Rare tokens outweigh common ones.
        let query = stats.apply_idf(&[(7, 1.0), (8, 1.0)]);
        assert!(query[&8] > query[&7]);
    }

    #[test]
    fn test_merge_and_remove_are_symmetric() {
        let before = Bm25Stats::from_rows(&[row(&[(1, 1.0)])]).unwrap();
        let delta = Bm25Stats::from_rows(&[row(&[(1, 3.0), (9, 1.0)])]).unwrap();

        let mut stats = before.clone();
        stats.merge(&delta);
        assert_eq!(stats.doc_count(1), 2);

        stats.token_num -= delta.token_num;
        stats.doc_num -= delta.doc_num;
        stats.remove_token_docs(&delta.token_doc_count);
        assert_eq!(stats, before);
    }
}
