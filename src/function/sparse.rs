//! Sparse float vector byte layout: repeated little-endian `(u32 index, f32 value)`
//! pairs in ascending index order.

use std::collections::BTreeMap;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, VecnodeError};

/// Token id to weight. Ordered so encoding is ascending by construction.
pub type SparseVector = BTreeMap<u32, f32>;

const PAIR_BYTES: usize = 8;

pub fn encode_sparse(vector: &SparseVector) -> Vec<u8> {
    let mut buf = Vec::with_capacity(vector.len() * PAIR_BYTES);
    for (&index, &value) in vector {
        // Writes into a Vec cannot fail.
        let _ = buf.write_u32::<LittleEndian>(index);
        let _ = buf.write_f32::<LittleEndian>(value);
    }
    buf
}

pub fn decode_sparse(bytes: &[u8]) -> Result<Vec<(u32, f32)>> {
    if bytes.len() % PAIR_BYTES != 0 {
        return Err(VecnodeError::internal(format!(
            "sparse vector of {} bytes is not a whole number of pairs",
            bytes.len()
        )));
    }
    let mut cursor = Cursor::new(bytes);
    let mut pairs = Vec::with_capacity(bytes.len() / PAIR_BYTES);
    for _ in 0..bytes.len() / PAIR_BYTES {
        let index = cursor.read_u32::<LittleEndian>()?;
        let value = cursor.read_f32::<LittleEndian>()?;
        pairs.push((index, value));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_little_endian_pairs() {
        let vector: SparseVector = [(2, 1.0), (1, 3.0)].into_iter().collect();
        let bytes = encode_sparse(&vector);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &3.0f32.to_le_bytes());
        assert_eq!(decode_sparse(&bytes).unwrap(), vec![(1, 3.0), (2, 1.0)]);
    }

    #[test]
    fn test_truncated_bytes() {
        assert!(decode_sparse(&[0; 12]).is_err());
        assert!(decode_sparse(&[]).unwrap().is_empty());
    }
}
