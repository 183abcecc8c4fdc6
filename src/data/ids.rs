//! Primary key columns.

use std::fmt;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VecnodeError};
use crate::schema::DataType;

/// A single primary key value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimaryKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(v) => write!(f, "{v}"),
            PrimaryKey::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Primary keys of a result set, in engine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ids {
    Int(Vec<i64>),
    Str(Vec<String>),
}

impl Default for Ids {
    fn default() -> Self {
        Ids::Int(Vec::new())
    }
}

impl Ids {
    /// Empty id column matching a primary key type.
    pub fn empty_for(pk_type: DataType) -> Result<Self> {
        match pk_type {
            DataType::Int64 => Ok(Ids::Int(Vec::new())),
            DataType::VarChar | DataType::String => Ok(Ids::Str(Vec::new())),
            other => Err(VecnodeError::illegal_schema(format!(
                "unsupported primary key type {other}"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Ids::Int(v) => v.len(),
            Ids::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<PrimaryKey> {
        match self {
            Ids::Int(v) => v.get(index).map(|id| PrimaryKey::Int(*id)),
            Ids::Str(v) => v.get(index).map(|id| PrimaryKey::Str(id.clone())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = PrimaryKey> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Same kind of column holding `keys`. Keys of the other kind are rejected.
    pub fn with_keys(&self, keys: Vec<PrimaryKey>) -> Result<Self> {
        let mismatch = |key: &PrimaryKey| {
            VecnodeError::internal(format!("primary key {key} does not match id column type"))
        };
        match self {
            Ids::Int(_) => keys
                .into_iter()
                .map(|key| match key {
                    PrimaryKey::Int(v) => Ok(v),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Ids::Int),
            Ids::Str(_) => keys
                .into_iter()
                .map(|key| match key {
                    PrimaryKey::Str(v) => Ok(v),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Ids::Str),
        }
    }

    /// Copy the ids at `indexes`, in that order.
    pub fn pick(&self, indexes: &[usize]) -> Result<Self> {
        let len = self.len();
        if let Some(bad) = indexes.iter().find(|&&i| i >= len) {
            return Err(VecnodeError::internal(format!(
                "id index {bad} out of range for {len} ids"
            )));
        }
        Ok(match self {
            Ids::Int(v) => Ids::Int(indexes.iter().map(|&i| v[i]).collect()),
            Ids::Str(v) => Ids::Str(indexes.iter().map(|&i| v[i].clone()).collect()),
        })
    }

    /// Concatenate `(start, len)` ranges.
    pub fn slice(&self, ranges: &[(usize, usize)]) -> Result<Self> {
        let indexes: Vec<usize> = ranges
            .iter()
            .flat_map(|&(start, len)| start..start + len)
            .collect();
        self.pick(&indexes)
    }

    /// Positions of the first occurrence of every distinct id.
    pub fn dedup_indexes(&self) -> Vec<usize> {
        fn first_seen<T: std::hash::Hash + Eq>(values: &[T]) -> Vec<usize> {
            let mut seen = AHashSet::with_capacity(values.len());
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| seen.insert(*v))
                .map(|(i, _)| i)
                .collect()
        }
        match self {
            Ids::Int(v) => first_seen(v),
            Ids::Str(v) => first_seen(v),
        }
    }

    /// `pk in [...]` filter selecting exactly these ids.
    pub fn in_filter(&self, pk_name: &str) -> String {
        let values: Vec<String> = match self {
            Ids::Int(v) => v.iter().map(|id| id.to_string()).collect(),
            Ids::Str(v) => v
                .iter()
                .map(|id| format!("'{}'", id.replace('\\', "\\\\").replace('\'', "\\'")))
                .collect(),
        };
        format!("{pk_name} in [{}]", values.join(","))
    }
}
