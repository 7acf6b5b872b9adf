//! Inverted index from fingerprint to the tracks that produced it.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use crate::audio::signal;
use crate::config::FingerprintConfig;
use crate::error::{FingerprintError, Result};
use crate::fingerprint::{self, AnchoredFingerprint, Fingerprint};
use crate::matcher::{self, MatchResult};

const SNAPSHOT_VERSION: u32 = 1;

/// One stored occurrence of a fingerprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatabaseEntry<'a> {
    pub track_id: &'a str,
    /// Anchor time bin within the indexed track.
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Posting {
    pub(crate) track: u32,
    pub(crate) offset: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub tracks: usize,
    pub fingerprints: usize,
    pub entries: usize,
}

/// Reference track index.
///
/// Track ids are interned; entries for a key keep insertion order. The
/// database fixes its analysis config at construction and its sample rate
/// at the first insertion, so every stored bin index is comparable with
/// every query.
#[derive(Debug)]
pub struct FingerprintDatabase {
    config: FingerprintConfig,
    sample_rate: Option<u32>,
    tracks: Vec<Option<String>>,
    track_index: HashMap<String, u32>,
    index: HashMap<Fingerprint, Vec<Posting>>,
}

impl Default for FingerprintDatabase {
    fn default() -> Self {
        Self::with_valid_config(FingerprintConfig::default())
    }
}

impl FingerprintDatabase {
    pub fn new(config: FingerprintConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: FingerprintConfig) -> Self {
        Self {
            config,
            sample_rate: None,
            tracks: Vec::new(),
            track_index: HashMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Sample rate of the indexed tracks, if any are indexed.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.track_index.is_empty()
    }

    pub fn contains_track(&self, track_id: &str) -> bool {
        self.track_index.contains_key(track_id)
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().flatten().map(String::as_str)
    }

    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            tracks: self.track_index.len(),
            fingerprints: self.index.len(),
            entries: self.index.values().map(Vec::len).sum(),
        }
    }

    /// Run the analysis pipeline with this database's config.
    pub fn fingerprint(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<AnchoredFingerprint>> {
        self.check_sample_rate(sample_rate)?;
        fingerprint::fingerprint_samples(samples, sample_rate, &self.config)
    }

    /// Fingerprint `samples` and store every fingerprint under `track_id`.
    ///
    /// Adding the same track twice appends a second copy of its entries.
    /// Returns the number of fingerprints stored.
    pub fn add_song(&mut self, track_id: &str, samples: &[f32], sample_rate: u32) -> Result<usize> {
        let prints = self.fingerprint(samples, sample_rate)?;
        self.insert_fingerprints(track_id, sample_rate, &prints)?;
        Ok(prints.len())
    }

    /// Store an already computed fingerprint batch under `track_id`.
    pub fn insert_fingerprints(
        &mut self,
        track_id: &str,
        sample_rate: u32,
        prints: &[AnchoredFingerprint],
    ) -> Result<()> {
        if sample_rate == 0 {
            return Err(FingerprintError::InvalidInput("sample rate must be positive".into()));
        }
        self.check_sample_rate(sample_rate)?;
        self.sample_rate = Some(sample_rate);

        let track = self.intern(track_id);
        for print in prints {
            self.index.entry(print.fingerprint).or_default().push(Posting {
                track,
                offset: print.anchor_time,
            });
        }

        log::info!("Indexed track '{}' ({} fingerprints)", track_id, prints.len());
        Ok(())
    }

    /// Entries stored for an exact fingerprint, in insertion order.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Vec<DatabaseEntry<'_>> {
        self.postings(fingerprint)
            .iter()
            .map(|p| DatabaseEntry {
                track_id: self.track_name(p.track),
                offset: p.offset,
            })
            .collect()
    }

    /// Best matching track for a query clip, or `None` when nothing matches.
    pub fn recognize(&self, samples: &[f32], sample_rate: u32) -> Result<Option<MatchResult>> {
        let query = self.fingerprint(samples, sample_rate)?;
        Ok(matcher::best_match(self, &query))
    }

    /// Every candidate track for a query clip, best first.
    pub fn rank(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<MatchResult>> {
        let query = self.fingerprint(samples, sample_rate)?;
        Ok(matcher::rank(self, &query))
    }

    /// Drop every entry stored for `track_id`. Returns whether it was present.
    pub fn remove_track(&mut self, track_id: &str) -> bool {
        let Some(track) = self.track_index.remove(track_id) else {
            return false;
        };
        self.tracks[track as usize] = None;
        self.index.retain(|_, postings| {
            postings.retain(|p| p.track != track);
            !postings.is_empty()
        });
        while self.tracks.last().is_some_and(Option::is_none) {
            self.tracks.pop();
        }
        if self.track_index.is_empty() {
            self.sample_rate = None;
        }
        log::info!("Removed track '{}'", track_id);
        true
    }

    pub(crate) fn postings(&self, fingerprint: &Fingerprint) -> &[Posting] {
        self.index.get(fingerprint).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn track_name(&self, track: u32) -> &str {
        self.tracks
            .get(track as usize)
            .and_then(|t| t.as_deref())
            .unwrap_or_default()
    }

    fn intern(&mut self, track_id: &str) -> u32 {
        if let Some(&track) = self.track_index.get(track_id) {
            return track;
        }
        // Slots freed by remove_track are reused before the table grows.
        let track = match self.tracks.iter().position(Option::is_none) {
            Some(free) => {
                self.tracks[free] = Some(track_id.to_string());
                free as u32
            }
            None => {
                self.tracks.push(Some(track_id.to_string()));
                (self.tracks.len() - 1) as u32
            }
        };
        self.track_index.insert(track_id.to_string(), track);
        track
    }

    fn check_sample_rate(&self, sample_rate: u32) -> Result<()> {
        match self.sample_rate {
            Some(indexed) if indexed != sample_rate => Err(FingerprintError::InvalidInput(format!(
                "sample rate {}Hz does not match indexed rate {}Hz",
                sample_rate, indexed
            ))),
            _ => Ok(()),
        }
    }

    /// Write the database as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            sample_rate: self.sample_rate,
            tracks: self.tracks.clone(),
            index: self
                .index
                .iter()
                .map(|(fp, postings)| (*fp, postings.clone()))
                .collect(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &snapshot)?;
        log::info!("Saved database to {}", path.display());
        Ok(())
    }

    /// Read a database written by [`FingerprintDatabase::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(snapshot_error(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        snapshot.config.validate()?;

        let mut track_index = HashMap::new();
        for (i, name) in snapshot.tracks.iter().enumerate() {
            if let Some(name) = name {
                track_index.insert(name.clone(), i as u32);
            }
        }
        let known = |p: &Posting| {
            snapshot
                .tracks
                .get(p.track as usize)
                .is_some_and(Option::is_some)
        };
        if snapshot.index.values().flatten().any(|p| !known(p)) {
            return Err(snapshot_error("entry refers to an unknown track".into()));
        }

        let db = Self {
            config: snapshot.config,
            sample_rate: snapshot.sample_rate,
            tracks: snapshot.tracks,
            track_index,
            index: snapshot.index.into_iter().collect(),
        };
        let stats = db.stats();
        log::info!(
            "Loaded database from {} ({} tracks, {} fingerprints)",
            path.display(),
            stats.tracks,
            stats.fingerprints
        );
        Ok(db)
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    config: FingerprintConfig,
    sample_rate: Option<u32>,
    tracks: Vec<Option<String>>,
    #[serde(with = "index_rows")]
    index: BTreeMap<Fingerprint, Vec<Posting>>,
}

/// JSON object keys must be strings, so the index is written as rows of
/// `[fingerprint, postings]`.
mod index_rows {
    use super::{Fingerprint, Posting};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        index: &BTreeMap<Fingerprint, Vec<Posting>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(index.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Fingerprint, Vec<Posting>>, D::Error> {
        let rows = Vec::<(Fingerprint, Vec<Posting>)>::deserialize(deserializer)?;
        Ok(rows.into_iter().collect())
    }
}

fn snapshot_error(msg: String) -> FingerprintError {
    FingerprintError::Snapshot(<serde_json::Error as serde::de::Error>::custom(msg))
}

/// Database handle shared between indexing and recognition threads.
///
/// Fingerprints for a new track are computed without holding any lock; the
/// finished batch is merged under the write lock, so readers observe either
/// none or all of a track's entries.
#[derive(Clone, Debug, Default)]
pub struct SharedDatabase {
    inner: Arc<RwLock<FingerprintDatabase>>,
}

impl SharedDatabase {
    pub fn new(db: FingerprintDatabase) -> Self {
        Self {
            inner: Arc::new(RwLock::new(db)),
        }
    }

    pub fn add_song(&self, track_id: &str, samples: &[f32], sample_rate: u32) -> Result<usize> {
        let prints = self.fingerprint_unlocked(samples, sample_rate)?;
        self.inner
            .write()
            .insert_fingerprints(track_id, sample_rate, &prints)?;
        Ok(prints.len())
    }

    /// Like [`FingerprintDatabase::recognize`], but the query is analysed
    /// before the read lock is taken, so a queued writer only waits for the
    /// index scan.
    pub fn recognize(&self, samples: &[f32], sample_rate: u32) -> Result<Option<MatchResult>> {
        let query = self.fingerprint_unlocked(samples, sample_rate)?;
        let db = self.inner.read();
        db.check_sample_rate(sample_rate)?;
        Ok(matcher::best_match(&db, &query))
    }

    pub fn rank(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<MatchResult>> {
        let query = self.fingerprint_unlocked(samples, sample_rate)?;
        let db = self.inner.read();
        db.check_sample_rate(sample_rate)?;
        Ok(matcher::rank(&db, &query))
    }

    pub fn remove_track(&self, track_id: &str) -> bool {
        self.inner.write().remove_track(track_id)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, FingerprintDatabase> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, FingerprintDatabase> {
        self.inner.write()
    }

    /// The lock is held only long enough to copy the config.
    fn fingerprint_unlocked(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<AnchoredFingerprint>> {
        signal::validate(samples, sample_rate)?;
        let config = {
            let db = self.inner.read();
            db.check_sample_rate(sample_rate)?;
            db.config().clone()
        };
        fingerprint::fingerprint_samples(samples, sample_rate, &config)
    }
}
