// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::{ChunkSimilarityResult, ReportScore};
use std::collections::HashMap;

/// Score one chunk match contributes to its report. Expects squared L2.
pub fn contribution(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// 按报告汇总分块相似度
///
/// Sums `1 / (1 + distance)` per report id and orders descending. Reports tied
/// on score keep the order in which they were first seen.
pub fn aggregate(chunk_results: &[ChunkSimilarityResult]) -> Vec<ReportScore> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut scores: Vec<ReportScore> = Vec::new();

    for chunk in chunk_results {
        for m in &chunk.matches {
            let position = *positions.entry(m.report_id.as_str()).or_insert_with(|| {
                scores.push(ReportScore {
                    report_id: m.report_id.clone(),
                    score: 0.0,
                });
                scores.len() - 1
            });
            scores[position].score += contribution(m.distance);
        }
    }

    // sort_by is stable
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkMatch;

    fn result(matches: &[(&str, f32)]) -> ChunkSimilarityResult {
        ChunkSimilarityResult {
            query_chunk: "q".to_string(),
            matches: matches
                .iter()
                .map(|(id, d)| ChunkMatch {
                    report_id: id.to_string(),
                    chunk_index: 0,
                    distance: *d,
                })
                .collect(),
        }
    }

    #[test]
    fn test_scores_are_non_increasing() {
        let ranking = aggregate(&[
            result(&[("b", 2.0), ("a", 0.0)]),
            result(&[("c", 0.5), ("a", 1.0)]),
        ]);

        assert!(ranking.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranking[0].report_id, "a");
        assert!((ranking[0].score - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_contributions_are_conserved() {
        let input = [
            result(&[("a", 0.1), ("b", 0.7)]),
            result(&[("b", 0.3), ("c", 3.0)]),
        ];
        let expected: f32 = input
            .iter()
            .flat_map(|r| r.matches.iter())
            .map(|m| contribution(m.distance))
            .sum();
        let total: f32 = aggregate(&input).iter().map(|s| s.score).sum();

        assert!((total - expected).abs() < 1e-5);
    }

    #[test]
    fn test_reports_without_matches_are_absent() {
        let ranking = aggregate(&[result(&[("a", 1.0)]), result(&[])]);
        assert_eq!(ranking.len(), 1);
        assert!(ranking.iter().all(|s| s.report_id != "z"));
    }

    #[test]
    fn test_ties_keep_first_encounter_order() {
        let ranking = aggregate(&[result(&[("second", 1.0), ("first", 1.0)])]);
        let ids: Vec<&str> = ranking.iter().map(|s| s.report_id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_zero_distance_contributes_one() {
        assert_eq!(contribution(0.0), 1.0);
    }
}
