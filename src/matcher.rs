use serde::Serialize;
use std::collections::HashMap;

use crate::config::{FingerprintConfig, Scoring};
use crate::database::FingerprintDatabase;
use crate::fingerprint::AnchoredFingerprint;

/// Outcome of a successful recognition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub track_id: String,
    pub score: usize,
    /// Stored minus query anchor time, in time bins, for the dominant
    /// alignment. `None` under collision-count scoring.
    pub offset_bins: Option<i64>,
}

impl MatchResult {
    /// Position of the query clip inside the matched track, in seconds.
    pub fn offset_seconds(&self, cfg: &FingerprintConfig, sample_rate: u32) -> Option<f64> {
        self.offset_bins
            .map(|bins| bins as f64 * cfg.seconds_per_bin(sample_rate))
    }
}

/// Collisions gathered for one track.
struct Candidate {
    track: u32,
    /// `stored_offset - query_anchor_time` for every collision.
    deltas: Vec<i64>,
}

impl Candidate {
    fn score(&self, scoring: Scoring) -> (usize, Option<i64>) {
        match scoring {
            Scoring::CollisionCount => (self.deltas.len(), None),
            Scoring::OffsetHistogram => {
                let mut histogram: HashMap<i64, usize> = HashMap::new();
                let mut best = (0, None);
                for &delta in &self.deltas {
                    let count = histogram.entry(delta).or_default();
                    *count += 1;
                    if *count > best.0 {
                        best = (*count, Some(delta));
                    }
                }
                best
            }
        }
    }
}

/// Tally collisions per track, in the order each track is first hit.
fn accumulate(db: &FingerprintDatabase, query: &[AnchoredFingerprint]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut slots: HashMap<u32, usize> = HashMap::new();

    for print in query {
        for posting in db.postings(&print.fingerprint) {
            let slot = *slots.entry(posting.track).or_insert_with(|| {
                candidates.push(Candidate {
                    track: posting.track,
                    deltas: Vec::new(),
                });
                candidates.len() - 1
            });
            candidates[slot]
                .deltas
                .push(posting.offset as i64 - print.anchor_time as i64);
        }
    }

    candidates
}

fn to_result(db: &FingerprintDatabase, candidate: &Candidate, score: usize, offset: Option<i64>) -> MatchResult {
    MatchResult {
        track_id: db.track_name(candidate.track).to_string(),
        score,
        offset_bins: offset,
    }
}

/// Highest scoring track for `query`.
///
/// Candidates are scanned in first-hit order and only a strictly higher
/// score replaces the current best, so the earliest candidate wins ties.
/// Returns `None` when nothing reaches `min_score`.
pub fn best_match(db: &FingerprintDatabase, query: &[AnchoredFingerprint]) -> Option<MatchResult> {
    let matching = &db.config().matching;
    let candidates = accumulate(db, query);

    let mut best: Option<(&Candidate, usize, Option<i64>)> = None;
    for candidate in &candidates {
        let (score, offset) = candidate.score(matching.scoring);
        if best.map_or(true, |(_, best_score, _)| score > best_score) {
            best = Some((candidate, score, offset));
        }
    }

    let result = best
        .filter(|&(_, score, _)| score > 0 && score >= matching.min_score)
        .map(|(candidate, score, offset)| to_result(db, candidate, score, offset));

    log::debug!(
        "Matched {} query fingerprints against {} candidates: {:?}",
        query.len(),
        candidates.len(),
        result
    );
    result
}

/// All candidates reaching `min_score`, best first; ties keep first-hit order.
pub fn rank(db: &FingerprintDatabase, query: &[AnchoredFingerprint]) -> Vec<MatchResult> {
    let matching = &db.config().matching;
    let mut results: Vec<MatchResult> = accumulate(db, query)
        .iter()
        .filter_map(|candidate| {
            let (score, offset) = candidate.score(matching.scoring);
            (score > 0 && score >= matching.min_score).then(|| to_result(db, candidate, score, offset))
        })
        .collect();
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;

    fn print(anchor_freq: u32, target_freq: u32, time_delta: u32, anchor_time: u32) -> AnchoredFingerprint {
        AnchoredFingerprint {
            fingerprint: Fingerprint { anchor_freq, target_freq, time_delta },
            anchor_time,
        }
    }

    fn db_with(scoring: Scoring) -> FingerprintDatabase {
        let mut config = FingerprintConfig::default();
        config.matching.scoring = scoring;
        FingerprintDatabase::new(config).unwrap()
    }

    #[test]
    fn empty_database_never_matches() {
        let db = FingerprintDatabase::default();
        assert_eq!(best_match(&db, &[print(1, 2, 3, 0)]), None);
        assert!(rank(&db, &[print(1, 2, 3, 0)]).is_empty());
    }

    #[test]
    fn empty_query_never_matches() {
        let mut db = FingerprintDatabase::default();
        db.insert_fingerprints("a", 8000, &[print(1, 2, 3, 0)]).unwrap();
        assert_eq!(best_match(&db, &[]), None);
    }

    #[test]
    fn tie_goes_to_first_candidate_hit() {
        for scoring in [Scoring::OffsetHistogram, Scoring::CollisionCount] {
            let mut db = db_with(scoring);
            let prints = vec![print(1, 2, 3, 0), print(4, 5, 6, 1), print(7, 8, 9, 2)];
            db.insert_fingerprints("first", 8000, &prints).unwrap();
            db.insert_fingerprints("second", 8000, &prints).unwrap();

            let result = best_match(&db, &prints).unwrap();
            assert_eq!(result.track_id, "first");
            assert_eq!(result.score, 3);

            let ranked = rank(&db, &prints);
            assert_eq!(ranked.len(), 2);
            assert_eq!(ranked[0].track_id, "first");
            assert_eq!(ranked[1].track_id, "second");
        }
    }

    #[test]
    fn histogram_prefers_time_coherent_track() {
        let mut db = db_with(Scoring::OffsetHistogram);
        // "scattered" shares all four hashes but at unrelated times.
        db.insert_fingerprints(
            "scattered",
            8000,
            &[print(1, 1, 1, 0), print(2, 2, 2, 40), print(3, 3, 3, 7), print(4, 4, 4, 90)],
        )
        .unwrap();
        // "aligned" shares three hashes, all shifted by the same 10 bins.
        db.insert_fingerprints(
            "aligned",
            8000,
            &[print(1, 1, 1, 10), print(2, 2, 2, 11), print(3, 3, 3, 12)],
        )
        .unwrap();

        let query = [print(1, 1, 1, 0), print(2, 2, 2, 1), print(3, 3, 3, 2), print(4, 4, 4, 3)];
        let result = best_match(&db, &query).unwrap();
        assert_eq!(result.track_id, "aligned");
        assert_eq!(result.score, 3);
        assert_eq!(result.offset_bins, Some(10));
    }

    #[test]
    fn collision_count_ignores_alignment() {
        let mut db = db_with(Scoring::CollisionCount);
        db.insert_fingerprints(
            "scattered",
            8000,
            &[print(1, 1, 1, 0), print(2, 2, 2, 40), print(3, 3, 3, 7), print(4, 4, 4, 90)],
        )
        .unwrap();
        db.insert_fingerprints(
            "aligned",
            8000,
            &[print(1, 1, 1, 10), print(2, 2, 2, 11), print(3, 3, 3, 12)],
        )
        .unwrap();

        let query = [print(1, 1, 1, 0), print(2, 2, 2, 1), print(3, 3, 3, 2), print(4, 4, 4, 3)];
        let result = best_match(&db, &query).unwrap();
        assert_eq!(result.track_id, "scattered");
        assert_eq!(result.score, 4);
        assert_eq!(result.offset_bins, None);
    }

    #[test]
    fn collision_count_counts_every_stored_entry() {
        let mut db = db_with(Scoring::CollisionCount);
        let key = print(5, 6, 1, 0);
        db.insert_fingerprints("a", 8000, &[key, key]).unwrap();
        let result = best_match(&db, &[key, key]).unwrap();
        assert_eq!(result.score, 4);
    }

    #[test]
    fn min_score_filters_weak_candidates() {
        let mut config = FingerprintConfig::default();
        config.matching.min_score = 3;
        let mut db = FingerprintDatabase::new(config).unwrap();
        db.insert_fingerprints("a", 8000, &[print(1, 2, 3, 0), print(4, 5, 6, 1)]).unwrap();

        let query = [print(1, 2, 3, 0), print(4, 5, 6, 1)];
        assert_eq!(best_match(&db, &query), None);
        assert!(rank(&db, &query).is_empty());
    }

    #[test]
    fn offset_seconds_uses_hop_size() {
        let result = MatchResult {
            track_id: "a".into(),
            score: 1,
            offset_bins: Some(16),
        };
        let cfg = FingerprintConfig::default();
        // 16 bins * 512 / 8192 Hz = 1 s
        assert_eq!(result.offset_seconds(&cfg, 8192), Some(1.0));
    }
}
