//! Search placeholders: the query vectors (or texts) of a search request.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecnodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceholderType {
    None,
    BinaryVector,
    FloatVector,
    Float16Vector,
    BFloat16Vector,
    SparseFloatVector,
    Int64,
    VarChar,
}

/// One batch of query values. Each entry of `values` is one query, encoded
/// in the layout of `placeholder_type` (UTF-8 text for `VarChar`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    pub tag: String,
    pub placeholder_type: PlaceholderType,
    pub values: Vec<Vec<u8>>,
}

impl Placeholder {
    pub fn new<S: Into<String>>(tag: S, placeholder_type: PlaceholderType) -> Self {
        Placeholder {
            tag: tag.into(),
            placeholder_type,
            values: Vec::new(),
        }
    }

    /// Text placeholder holding one query per string.
    pub fn texts<S: Into<String>, T: AsRef<str>>(tag: S, texts: &[T]) -> Self {
        Placeholder {
            tag: tag.into(),
            placeholder_type: PlaceholderType::VarChar,
            values: texts.iter().map(|t| t.as_ref().as_bytes().to_vec()).collect(),
        }
    }

    /// Dense float placeholder holding one query per vector.
    pub fn float_vectors<S: Into<String>>(tag: S, vectors: &[Vec<f32>]) -> Self {
        Placeholder {
            tag: tag.into(),
            placeholder_type: PlaceholderType::FloatVector,
            values: vectors
                .iter()
                .map(|v| v.iter().flat_map(|x| x.to_le_bytes()).collect())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderGroup {
    pub placeholders: Vec<Placeholder>,
}

impl PlaceholderGroup {
    pub fn single(placeholder: Placeholder) -> Self {
        PlaceholderGroup {
            placeholders: vec![placeholder],
        }
    }

    /// Number of queries in the first placeholder.
    pub fn nq(&self) -> usize {
        self.placeholders.first().map_or(0, |p| p.values.len())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| VecnodeError::parameter_invalid(format!("Parse placeholder failed: {e}")))
    }
}
