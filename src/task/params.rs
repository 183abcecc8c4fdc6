//! Request parameter keys and parsing.

use std::str::FromStr;

use crate::error::{Result, VecnodeError};
use crate::schema::KeyValuePair;

pub const TOPK_KEY: &str = "topk";
pub const SEARCH_PARAMS_KEY: &str = "params";
pub const OFFSET_KEY: &str = "offset";
pub const LIMIT_KEY: &str = "limit";
pub const ROUND_DECIMAL_KEY: &str = "round_decimal";
pub const GROUP_BY_FIELD_KEY: &str = "group_by_field";
pub const ANNS_FIELD_KEY: &str = "anns_field";
pub use crate::schema::field::METRIC_TYPE_KEY;

/// Parse a numeric parameter, naming the key and raw value on failure.
pub fn parse_param<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        VecnodeError::parameter_invalid(format!("Parse {key} failed, {key}: {value}"))
    })
}

/// Every pair whose key is not `key`.
pub fn without_key(params: &[KeyValuePair], key: &str) -> Vec<KeyValuePair> {
    params.iter().filter(|kv| kv.key != key).cloned().collect()
}
