//! End-to-end indexing and recognition on synthetic clips.

use peakprint::fingerprint::{constellation_map, fingerprint_samples};
use peakprint::{FingerprintConfig, FingerprintDatabase, FingerprintError, Scoring, SharedDatabase};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};

const SAMPLE_RATE: u32 = 22050;

fn sine(freq: f32, seconds: f32) -> Vec<f32> {
    let len = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
        .collect()
}

fn noise(seed: u64, seconds: f32) -> Vec<f32> {
    let len = (SAMPLE_RATE as f32 * seconds) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-0.5f32..0.5)).collect()
}

#[test]
fn sine_recognizes_itself_with_full_score() {
    let mut db = FingerprintDatabase::default();
    let clip = sine(440.0, 2.0);
    let indexed = db.add_song("sine_a", &clip, SAMPLE_RATE).unwrap();
    assert!(indexed > 0);

    let result = db.recognize(&clip, SAMPLE_RATE).unwrap().unwrap();
    assert_eq!(result.track_id, "sine_a");
    assert_eq!(result.score, indexed);
    assert_eq!(result.offset_bins, Some(0));
}

#[test]
fn unrelated_noise_scores_far_below_self_match() {
    let mut db = FingerprintDatabase::default();
    let clip = sine(440.0, 2.0);
    let self_score = db.add_song("sine_a", &clip, SAMPLE_RATE).unwrap();

    match db.recognize(&noise(7, 2.0), SAMPLE_RATE).unwrap() {
        None => {}
        Some(hit) => assert!(
            hit.score * 4 < self_score,
            "noise scored {} against self score {}",
            hit.score,
            self_score
        ),
    }
}

#[test]
fn empty_database_returns_none() {
    let db = FingerprintDatabase::default();
    assert_eq!(db.recognize(&sine(440.0, 1.0), SAMPLE_RATE).unwrap(), None);
    assert_eq!(db.recognize(&noise(1, 1.0), SAMPLE_RATE).unwrap(), None);
}

#[test]
fn silent_query_returns_none() {
    let mut db = FingerprintDatabase::default();
    db.add_song("sine_a", &sine(440.0, 2.0), SAMPLE_RATE).unwrap();
    db.add_song("noise", &noise(3, 2.0), SAMPLE_RATE).unwrap();

    let silence = vec![0.0; SAMPLE_RATE as usize];
    assert!(fingerprint_samples(&silence, SAMPLE_RATE, db.config()).unwrap().is_empty());
    assert_eq!(db.recognize(&silence, SAMPLE_RATE).unwrap(), None);
}

#[test]
fn invalid_queries_are_rejected_not_unmatched() {
    let mut db = FingerprintDatabase::default();
    db.add_song("sine_a", &sine(440.0, 1.0), SAMPLE_RATE).unwrap();

    assert!(matches!(db.recognize(&[], SAMPLE_RATE), Err(FingerprintError::InvalidInput(_))));
    assert!(matches!(
        db.recognize(&[0.0, f32::NAN, 0.0], SAMPLE_RATE),
        Err(FingerprintError::InvalidInput(_))
    ));
    assert!(matches!(db.recognize(&[0.1; 100], 0), Err(FingerprintError::InvalidInput(_))));
}

#[test]
fn pipeline_is_deterministic() {
    let cfg = FingerprintConfig::default();
    let clip = noise(11, 1.5);
    assert_eq!(constellation_map(&clip, &cfg), constellation_map(&clip, &cfg));
    assert_eq!(
        fingerprint_samples(&clip, SAMPLE_RATE, &cfg).unwrap(),
        fingerprint_samples(&clip, SAMPLE_RATE, &cfg).unwrap()
    );
}

#[test]
fn time_delta_never_exceeds_bound() {
    let mut cfg = FingerprintConfig::default();
    let clip = noise(5, 2.0);
    let prints = fingerprint_samples(&clip, SAMPLE_RATE, &cfg).unwrap();
    assert!(!prints.is_empty());
    assert!(prints.iter().all(|p| p.fingerprint.time_delta <= 200));

    cfg.hashing.max_time_delta = 0;
    let prints = fingerprint_samples(&clip, SAMPLE_RATE, &cfg).unwrap();
    assert!(prints.iter().all(|p| p.fingerprint.time_delta == 0));
}

#[test]
fn excerpt_is_found_at_its_offset() {
    let mut db = FingerprintDatabase::default();
    let track_a = noise(100, 4.0);
    let track_b = noise(200, 4.0);
    db.add_song("a", &track_a, SAMPLE_RATE).unwrap();
    db.add_song("b", &track_b, SAMPLE_RATE).unwrap();

    let hop = db.config().spectrogram.hop_size;
    let skip_bins = 30;
    let start = skip_bins * hop;
    let excerpt = &track_b[start..start + 2 * SAMPLE_RATE as usize];

    let result = db.recognize(excerpt, SAMPLE_RATE).unwrap().unwrap();
    assert_eq!(result.track_id, "b");
    assert_eq!(result.offset_bins, Some(skip_bins as i64));

    let offset = result.offset_seconds(db.config(), SAMPLE_RATE).unwrap();
    assert!((offset - start as f64 / SAMPLE_RATE as f64).abs() < 1e-9);

    let ranked = db.rank(excerpt, SAMPLE_RATE).unwrap();
    assert_eq!(ranked[0].track_id, "b");
    if let Some(other) = ranked.get(1) {
        assert!(other.score * 4 < ranked[0].score);
    }
}

#[test]
fn identical_tracks_tie_in_favour_of_first_indexed() {
    let mut db = FingerprintDatabase::default();
    let clip = sine(440.0, 1.0);
    db.add_song("first", &clip, SAMPLE_RATE).unwrap();
    db.add_song("second", &clip, SAMPLE_RATE).unwrap();

    let result = db.recognize(&clip, SAMPLE_RATE).unwrap().unwrap();
    assert_eq!(result.track_id, "first");

    let ranked = db.rank(&clip, SAMPLE_RATE).unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].score, ranked[1].score);
}

#[test]
fn collision_count_scoring_counts_raw_hits() {
    let mut config = FingerprintConfig::default();
    config.matching.scoring = Scoring::CollisionCount;
    let mut db = FingerprintDatabase::new(config).unwrap();
    let clip = sine(440.0, 2.0);
    let indexed = db.add_song("sine_a", &clip, SAMPLE_RATE).unwrap();

    let result = db.recognize(&clip, SAMPLE_RATE).unwrap().unwrap();
    assert_eq!(result.track_id, "sine_a");
    assert!(result.score >= indexed);
    assert_eq!(result.offset_bins, None);
}

#[test]
fn shared_database_readers_never_see_a_partial_track() {
    let shared = SharedDatabase::default();
    let clip = sine(440.0, 2.0);
    let n = shared.add_song("first", &clip, SAMPLE_RATE).unwrap();
    assert!(n > 0);
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    let mut observed = 0;
                    loop {
                        let finished = done.load(Ordering::Acquire);

                        // "second" is the same clip, so it shares every key with "first".
                        let entries = shared.read().stats().entries;
                        assert!(
                            entries == n || entries == 2 * n,
                            "saw {} of {} entries",
                            entries,
                            2 * n
                        );

                        let ranked = shared.rank(&clip, SAMPLE_RATE).unwrap();
                        match ranked.as_slice() {
                            [only] => {
                                assert_eq!((only.track_id.as_str(), only.score), ("first", n))
                            }
                            [a, b] => {
                                assert_eq!((a.track_id.as_str(), a.score), ("first", n));
                                assert_eq!((b.track_id.as_str(), b.score), ("second", n));
                            }
                            other => panic!("unexpected ranking {:?}", other),
                        }
                        observed += 1;

                        if finished {
                            assert_eq!(entries, 2 * n);
                            assert_eq!(ranked.len(), 2);
                            return observed;
                        }
                    }
                })
            })
            .collect();

        let added = shared.add_song("second", &clip, SAMPLE_RATE).unwrap();
        assert_eq!(added, n);
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
    });

    let db = shared.read();
    assert_eq!(db.stats().tracks, 2);
    assert_eq!(db.stats().entries, 2 * n);
}
