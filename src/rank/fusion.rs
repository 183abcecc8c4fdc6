//! Cross-sub-search score fusion.

use std::collections::BTreeMap;

use log::debug;

use crate::data::{PrimaryKey, SearchResultData};
use crate::error::{Result, VecnodeError};
use crate::rank::params::RankParams;
use crate::rank::rescorer::ReScorer;

/// Sum the scores of every id per query across `results`.
pub fn accumulate(results: &[SearchResultData], nq: usize) -> Result<Vec<BTreeMap<PrimaryKey, f32>>> {
    let mut accumulated = vec![BTreeMap::new(); nq];
    for result in results {
        for (query, (start, len)) in result.query_ranges().into_iter().take(nq).enumerate() {
            for i in start..start + len {
                let id = result.ids.get(i).ok_or_else(|| {
                    VecnodeError::internal(format!("hit {i} has no id"))
                })?;
                let score = result.scores.get(i).copied().ok_or_else(|| {
                    VecnodeError::internal(format!("hit {i} has no score"))
                })?;
                *accumulated[query].entry(id).or_insert(0.0) += score;
            }
        }
    }
    Ok(accumulated)
}

fn round_score(score: f32, round_decimal: i64) -> f32 {
    if round_decimal < 0 {
        return score;
    }
    let factor = 10f64.powi(round_decimal as i32);
    ((f64::from(score) * factor).round() / factor) as f32
}

/// Fuse already rescored sub-search results.
///
/// Every query keeps the ids ranked `[offset, offset + limit)` by summed
/// score; ties keep ascending id order. A query with fewer than `offset`
/// distinct ids gets no hits.
pub fn fuse(results: &[SearchResultData], nq: usize, rank: &RankParams) -> Result<SearchResultData> {
    let template = results.first().map(|r| r.ids.clone()).unwrap_or_default();
    let offset = usize::try_from(rank.offset).unwrap_or(0);
    let limit = usize::try_from(rank.limit).unwrap_or(0);

    let mut fused = SearchResultData {
        num_queries: nq as i64,
        top_k: rank.limit,
        ..Default::default()
    };
    let mut keys = Vec::new();

    for id_scores in accumulate(results, nq)? {
        if id_scores.len() < offset {
            fused.topks.push(0);
            continue;
        }
        let mut sorted: Vec<(PrimaryKey, f32)> = id_scores.into_iter().collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

        let page: Vec<_> = sorted.into_iter().skip(offset).take(limit).collect();
        fused.topks.push(page.len() as i64);
        for (id, score) in page {
            fused.scores.push(round_score(score, rank.round_decimal));
            keys.push(id);
        }
    }

    fused.ids = template.with_keys(keys)?;
    debug!(
        "fused {} sub-results into {} hits",
        results.len(),
        fused.ids.len()
    );
    Ok(fused)
}

/// Rescore each result with its scorer, then [`fuse`].
pub fn rescore_and_fuse(
    mut results: Vec<SearchResultData>,
    scorers: &[Box<dyn ReScorer>],
    nq: usize,
    rank: &RankParams,
) -> Result<SearchResultData> {
    if results.len() != scorers.len() {
        return Err(VecnodeError::internal(format!(
            "{} sub-results for {} scorers",
            results.len(),
            scorers.len()
        )));
    }
    for (result, scorer) in results.iter_mut().zip(scorers) {
        scorer.rescore(result);
    }
    fuse(&results, nq, rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Ids;
    use crate::rank::params::RankStrategy;
    use crate::rank::rescorer::new_rescorers;

    fn result(ids: Vec<i64>, scores: Vec<f32>, topks: Vec<i64>) -> SearchResultData {
        SearchResultData {
            num_queries: topks.len() as i64,
            topks,
            scores,
            ids: Ids::Int(ids),
            ..Default::default()
        }
    }

    fn rank(limit: i64, offset: i64) -> RankParams {
        RankParams {
            limit,
            offset,
            round_decimal: -1,
        }
    }

    #[test]
    fn test_raw_sum_ties_break_by_id() {
        let a = result(vec![1, 2], vec![0.4, 0.1], vec![2]);
        let b = result(vec![1, 2], vec![0.2, 0.5], vec![2]);
        let sums = accumulate(&[a.clone(), b.clone()], 1).unwrap();
        assert!((sums[0][&PrimaryKey::Int(1)] - 0.6).abs() < 1e-6);
        assert!((sums[0][&PrimaryKey::Int(2)] - 0.6).abs() < 1e-6);

        let fused = fuse(&[a, b], 1, &rank(10, 0)).unwrap();
        assert_eq!(fused.topks, vec![2]);
        assert_eq!(fused.top_k, 10);
        assert_eq!(fused.ids, Ids::Int(vec![1, 2]));
        assert_eq!(fused.scores[0], fused.scores[1]);

        // Listing id 2 first does not change the tie order.
        let a = result(vec![2, 1], vec![0.1, 0.4], vec![2]);
        let b = result(vec![2, 1], vec![0.5, 0.2], vec![2]);
        let fused = fuse(&[a, b], 1, &rank(10, 0)).unwrap();
        assert_eq!(fused.ids, Ids::Int(vec![1, 2]));
        assert_eq!(fused.scores[0], fused.scores[1]);
    }

    #[test]
    fn test_offset_and_limit_per_query() {
        let a = result(vec![1, 2, 3, 7], vec![0.9, 0.8, 0.7, 0.5], vec![3, 1]);
        let fused = fuse(&[a], 2, &rank(1, 1)).unwrap();
        assert_eq!(fused.topks, vec![1, 0]);
        assert_eq!(fused.ids, Ids::Int(vec![2]));
        assert_eq!(fused.scores, vec![0.8]);

        let a = result(vec![1, 7], vec![0.9, 0.5], vec![1, 1]);
        let fused = fuse(&[a], 2, &rank(5, 2)).unwrap();
        assert_eq!(fused.topks, vec![0, 0]);
    }

    #[test]
    fn test_rrf_fusion() {
        let a = result(vec![1, 2, 3], vec![0.9, 0.8, 0.1], vec![3]);
        let b = result(vec![3, 2], vec![0.9, 0.2], vec![2]);
        let scorers = new_rescorers(2, &RankStrategy::Rrf { k: 60.0 });
        let fused = rescore_and_fuse(vec![a, b], &scorers, 1, &rank(2, 0)).unwrap();
        // 1/61 + 1/63 edges out 2/62.
        assert_eq!(fused.ids, Ids::Int(vec![3, 2]));
        assert_eq!(fused.topks, vec![2]);
    }

    #[test]
    fn test_round_decimal() {
        let a = result(vec![1], vec![0.123456], vec![1]);
        let fused = fuse(
            &[a],
            1,
            &RankParams {
                limit: 1,
                offset: 0,
                round_decimal: 2,
            },
        )
        .unwrap();
        assert_eq!(fused.scores, vec![0.12]);
    }

    #[test]
    fn test_string_ids() {
        let a = SearchResultData {
            num_queries: 1,
            topks: vec![2],
            scores: vec![0.1, 0.2],
            ids: Ids::Str(vec!["x".into(), "y".into()]),
            ..Default::default()
        };
        let fused = fuse(&[a], 1, &rank(1, 0)).unwrap();
        assert_eq!(fused.ids, Ids::Str(vec!["y".into()]));
    }
}
