//! Rank parameter parsing.

use serde_json::Value;

use crate::config::{DEFAULT_RRF_K, TOPK_LIMIT};
use crate::error::{Result, VecnodeError};
use crate::schema::KeyValuePair;
use crate::task::params::{LIMIT_KEY, OFFSET_KEY, ROUND_DECIMAL_KEY, parse_param};

pub const RANK_TYPE_KEY: &str = "strategy";
pub const RANK_PARAMS_KEY: &str = "params";
pub const RRF_K_KEY: &str = "k";
pub const WEIGHTS_KEY: &str = "weights";

pub const RRF_RANK_TYPE: &str = "rrf";
pub const WEIGHTED_RANK_TYPE: &str = "weighted";

/// How sub-search scores are turned into fusable scores.
#[derive(Debug, Clone, PartialEq)]
pub enum RankStrategy {
    Rrf { k: f64 },
    Weighted { weights: Vec<f32> },
}

impl Default for RankStrategy {
    fn default() -> Self {
        RankStrategy::Rrf { k: DEFAULT_RRF_K }
    }
}

impl RankStrategy {
    /// Parse the `strategy` and `params` keys for `request_count` sub-searches.
    pub fn parse(params: &[KeyValuePair], request_count: usize) -> Result<Self> {
        let mut rank_type = None;
        let mut rank_params = None;
        for param in params {
            match param.key.as_str() {
                RANK_TYPE_KEY => rank_type = Some(param.value.trim().to_lowercase()),
                RANK_PARAMS_KEY => rank_params = Some(param.value.as_str()),
                _ => {}
            }
        }

        let Some(rank_type) = rank_type else {
            return Ok(RankStrategy::default());
        };
        let rank_params: Value = match rank_params {
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                VecnodeError::parameter_invalid(format!("parse rerank params failed, err: {e}"))
            })?,
            None => Value::Null,
        };

        match rank_type.as_str() {
            RRF_RANK_TYPE => {
                let k = rank_params
                    .get(RRF_K_KEY)
                    .ok_or_else(|| {
                        VecnodeError::parameter_invalid(format!(
                            "{RRF_K_KEY} not found in rank_params"
                        ))
                    })?
                    .as_f64()
                    .ok_or_else(|| {
                        VecnodeError::parameter_invalid(format!(
                            "The type of rank param {RRF_K_KEY} should be float"
                        ))
                    })?;
                if k <= 0.0 || k >= TOPK_LIMIT as f64 {
                    return Err(VecnodeError::parameter_invalid(format!(
                        "The rank params k should be in range (0, {TOPK_LIMIT}), but got {k}"
                    )));
                }
                Ok(RankStrategy::Rrf { k })
            }
            WEIGHTED_RANK_TYPE => {
                let raw = rank_params
                    .get(WEIGHTS_KEY)
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        VecnodeError::parameter_invalid(format!(
                            "{WEIGHTS_KEY} not found in rank_params"
                        ))
                    })?;
                let weights = raw
                    .iter()
                    .map(|w| {
                        let weight = w.as_f64().ok_or_else(|| {
                            VecnodeError::parameter_invalid(format!(
                                "The type of rank param weight should be float, but got {w}"
                            ))
                        })?;
                        if !(0.0..=1.0).contains(&weight) {
                            return Err(VecnodeError::parameter_invalid(format!(
                                "rank param weight should be in range [0, 1], but got {weight}"
                            )));
                        }
                        Ok(weight as f32)
                    })
                    .collect::<Result<Vec<_>>>()?;
                if weights.len() != request_count {
                    return Err(VecnodeError::parameter_invalid(format!(
                        "the length of weights param mismatch with ann search requests: invalid parameter[expected={request_count}][actual={}]",
                        weights.len()
                    )));
                }
                Ok(RankStrategy::Weighted { weights })
            }
            other => Err(VecnodeError::parameter_invalid(format!(
                "unsupported rank type {other}"
            ))),
        }
    }
}

/// Pagination of a fused result.
#[derive(Debug, Clone, PartialEq)]
pub struct RankParams {
    pub limit: i64,
    pub offset: i64,
    pub round_decimal: i64,
}

impl RankParams {
    pub fn parse(params: &[KeyValuePair]) -> Result<Self> {
        let mut rank = RankParams {
            limit: 0,
            offset: 0,
            round_decimal: -1,
        };
        for param in params {
            let value = param.value.as_str();
            match param.key.as_str() {
                LIMIT_KEY => rank.limit = parse_param(LIMIT_KEY, value)?,
                OFFSET_KEY => rank.offset = parse_param(OFFSET_KEY, value)?,
                ROUND_DECIMAL_KEY => rank.round_decimal = parse_param(ROUND_DECIMAL_KEY, value)?,
                _ => {}
            }
        }

        if rank.offset < 0 {
            return Err(VecnodeError::parameter_invalid(format!(
                "{OFFSET_KEY} {} is invalid, should be gte than 0",
                rank.offset
            )));
        }
        if rank.limit <= 0 {
            return Err(VecnodeError::parameter_invalid(format!(
                "{LIMIT_KEY} {} is invalid, should be greater than 0",
                rank.limit
            )));
        }
        let depth = rank.offset + rank.limit;
        if depth <= 0 || depth > TOPK_LIMIT {
            return Err(VecnodeError::parameter_invalid(format!(
                "(offset+limit) should be in range [1, {TOPK_LIMIT}], but got {depth}"
            )));
        }
        Ok(rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> Vec<KeyValuePair> {
        pairs.iter().map(|(k, v)| KeyValuePair::new(*k, *v)).collect()
    }

    #[test]
    fn test_default_is_rrf() {
        assert_eq!(
            RankStrategy::parse(&[], 2).unwrap(),
            RankStrategy::Rrf { k: DEFAULT_RRF_K }
        );
    }

    #[test]
    fn test_rrf_k() {
        let params = kv(&[("strategy", "RRF"), ("params", r#"{"k": 20}"#)]);
        assert_eq!(RankStrategy::parse(&params, 3).unwrap(), RankStrategy::Rrf { k: 20.0 });

        let params = kv(&[("strategy", "rrf"), ("params", r#"{"k": 0}"#)]);
        assert!(RankStrategy::parse(&params, 1).is_err());

        let params = kv(&[("strategy", "rrf"), ("params", "{}")]);
        let err = RankStrategy::parse(&params, 1).unwrap_err();
        assert!(err.to_string().contains("k not found"));
    }

    #[test]
    fn test_weights() {
        let params = kv(&[("strategy", "weighted"), ("params", r#"{"weights": [0.2, 0.8]}"#)]);
        assert_eq!(
            RankStrategy::parse(&params, 2).unwrap(),
            RankStrategy::Weighted { weights: vec![0.2, 0.8] }
        );

        let err = RankStrategy::parse(&params, 3).unwrap_err();
        assert!(err.to_string().contains("[expected=3][actual=2]"));

        let params = kv(&[("strategy", "weighted"), ("params", r#"{"weights": [1.5]}"#)]);
        assert!(RankStrategy::parse(&params, 1).is_err());

        let params = kv(&[("strategy", "max")]);
        let err = RankStrategy::parse(&params, 1).unwrap_err();
        assert!(err.to_string().contains("unsupported rank type max"));
    }

    #[test]
    fn test_rank_params() {
        let rank = RankParams::parse(&kv(&[("limit", "10"), ("offset", "5")])).unwrap();
        assert_eq!((rank.limit, rank.offset, rank.round_decimal), (10, 5, -1));

        let err = RankParams::parse(&kv(&[("offset", "-1"), ("limit", "1")])).unwrap_err();
        assert!(err.to_string().contains("offset -1 is invalid, should be gte than 0"));

        let err = RankParams::parse(&kv(&[])).unwrap_err();
        assert!(err.to_string().contains("limit 0 is invalid, should be greater than 0"));

        let err = RankParams::parse(&kv(&[("limit", "16384"), ("offset", "1")])).unwrap_err();
        assert!(err.to_string().contains("(offset+limit) should be in range [1, 16384], but got 16385"));
    }
}
