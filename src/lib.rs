//! Constellation-map audio fingerprinting.
//!
//! Reference tracks are reduced to spectral peak pairs and stored in an
//! inverted index. A query clip goes through the same pipeline and is
//! matched by counting time-aligned hash collisions per track.
//!
//! ```no_run
//! use peakprint::FingerprintDatabase;
//!
//! # fn main() -> peakprint::Result<()> {
//! # let (song, clip): (Vec<f32>, Vec<f32>) = (vec![0.0; 44100], vec![0.0; 44100]);
//! let mut db = FingerprintDatabase::default();
//! db.add_song("song", &song, 44100)?;
//! if let Some(hit) = db.recognize(&clip, 44100)? {
//!     println!("{} (score {})", hit.track_id, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod database;
pub mod error;
pub mod fingerprint;
pub mod matcher;

pub use audio::AudioSignal;
pub use config::{FingerprintConfig, Scoring};
pub use database::{DatabaseEntry, DatabaseStats, FingerprintDatabase, SharedDatabase};
pub use error::{FingerprintError, Result};
pub use fingerprint::{AnchoredFingerprint, ConstellationPoint, Fingerprint};
pub use matcher::MatchResult;
