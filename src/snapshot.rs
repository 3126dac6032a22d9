//! Immutable, load-once view of the Mixxx data plus its cache.
//!
//! Everything an analysis needs is read in one pass and never mutated
//! afterwards: the party sets in date order, their tracks, the canonical
//! library-artist baseline and the full-history repetition records. Analyses
//! borrow the snapshot; the cache hands out shared `Arc`s and rebuilds only when
//! the source fingerprint changes.

use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::aggregate::{self, AggregateFilter};
use crate::models::{AggregateResult, LoadStats, PartySet, RepetitionRecord, SetId, SetProfile, Track};
use crate::normalize::ArtistNormalizer;
use crate::profile;
use crate::progress::{create_progress_bar, create_spinner, format_duration, log_progress};
use crate::repetition::compute_repetition_from;
use crate::source::{SourceFingerprint, TrackSource};

const LOG_INTERVAL: u64 = 50;

#[derive(Debug)]
pub struct LibrarySnapshot {
    sets: Vec<PartySet>, // party sets only, chronological
    tracks: FxHashMap<SetId, Vec<Track>>,
    library_artists: BTreeSet<String>,
    repetition: Vec<RepetitionRecord>,
    normalizer: ArtistNormalizer,
    stats: LoadStats,
}

impl LibrarySnapshot {
    pub fn load(source: &dyn TrackSource, normalizer: &ArtistNormalizer) -> Result<Self> {
        let start = Instant::now();
        let mut stats = LoadStats::default();

        let playlists = source.list_sets().context("Failed to list playlists")?;
        stats.playlists_seen = playlists.len();
        let mut sets: Vec<PartySet> = playlists.into_iter().filter(|s| s.is_party_set()).collect();
        sets.sort_by_key(|s| s.date);
        stats.party_sets = sets.len();
        stats.undated_skipped = stats.playlists_seen - stats.party_sets;

        let pb = create_progress_bar(sets.len() as u64, "Reading sets");
        let mut tracks = FxHashMap::default();
        for (i, set) in sets.iter().enumerate() {
            let set_tracks = source
                .tracks_for_set(set.id)
                .with_context(|| format!("Failed to read tracks of set '{}'", set.name))?;
            stats.tracks_loaded += set_tracks.len();
            tracks.insert(set.id, set_tracks);
            pb.inc(1);
            log_progress("sets", i as u64 + 1, sets.len() as u64, LOG_INTERVAL);
        }
        pb.finish_with_message(format!("Read {} sets ({} tracks)", sets.len(), stats.tracks_loaded));

        let spinner = create_spinner("Normalizing library artists");
        let library = source.library_songs().context("Failed to read library")?;
        stats.library_songs = library.len();
        let library_artists: BTreeSet<String> = library
            .par_iter()
            .flat_map_iter(|song| normalizer.normalize(song.artist.as_deref()))
            .collect::<Vec<_>>()
            .into_iter()
            .collect();
        stats.library_artists = library_artists.len();
        spinner.finish_with_message(format!(
            "Normalized {} library songs into {} artists",
            stats.library_songs, stats.library_artists
        ));

        let repetition = compute_repetition_from(sets.iter().map(|s| {
            let set_tracks = tracks.get(&s.id).map(Vec::as_slice).unwrap_or(&[]);
            (s, set_tracks)
        }));
        stats.repetition_records = repetition.len();

        stats.elapsed_secs = start.elapsed().as_secs_f64();
        eprintln!("Snapshot loaded in {}", format_duration(start.elapsed()));

        Ok(Self {
            sets,
            tracks,
            library_artists,
            repetition,
            normalizer: normalizer.clone(),
            stats,
        })
    }

    /// Party sets in chronological order
    pub fn sets(&self) -> &[PartySet] {
        &self.sets
    }

    pub fn tracks(&self, set_id: SetId) -> &[Track] {
        self.tracks.get(&set_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn library_artists(&self) -> &BTreeSet<String> {
        &self.library_artists
    }

    /// Full-history repetition records, one per party set
    pub fn repetition(&self) -> &[RepetitionRecord] {
        &self.repetition
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn find_set(&self, set_id: SetId) -> Option<&PartySet> {
        self.sets.iter().find(|s| s.id == set_id)
    }

    pub fn compute_aggregate(&self, filter: &AggregateFilter) -> AggregateResult {
        let selected: Vec<(&PartySet, &[Track])> = self
            .sets
            .iter()
            .filter(|s| filter.accepts(s))
            .map(|s| (s, self.tracks(s.id)))
            .collect();
        aggregate::compute_aggregate(&selected, &self.normalizer, &self.library_artists, &self.repetition)
    }

    pub fn set_profile(&self, set_id: SetId) -> Result<SetProfile> {
        let Some(set) = self.find_set(set_id) else {
            bail!("No party set with id {}", set_id);
        };
        Ok(profile::set_profile(set, self.tracks(set_id)))
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Holds the current snapshot keyed by the source fingerprint it was built from.
#[derive(Default)]
pub struct SnapshotCache {
    normalizer: ArtistNormalizer,
    entry: RwLock<Option<(SourceFingerprint, Arc<LibrarySnapshot>)>>,
}

impl SnapshotCache {
    pub fn new(normalizer: ArtistNormalizer) -> Self {
        Self {
            normalizer,
            entry: RwLock::new(None),
        }
    }

    /// Cached snapshot if the source has not changed, otherwise a fresh one.
    pub fn get(&self, source: &dyn TrackSource) -> Result<Arc<LibrarySnapshot>> {
        let fingerprint = source.fingerprint().context("Failed to fingerprint source")?;

        {
            let guard = self.entry.read().map_err(|_| anyhow!("Snapshot cache lock poisoned"))?;
            if let Some((cached, snapshot)) = guard.as_ref() {
                if *cached == fingerprint {
                    return Ok(Arc::clone(snapshot));
                }
            }
        }

        let snapshot = Arc::new(LibrarySnapshot::load(source, &self.normalizer)?);
        let mut guard = self.entry.write().map_err(|_| anyhow!("Snapshot cache lock poisoned"))?;
        *guard = Some((fingerprint, Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next `get` rebuilds.
    pub fn invalidate(&self) -> Result<()> {
        let mut guard = self.entry.write().map_err(|_| anyhow!("Snapshot cache lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrateRow, LibrarySong};
    use chrono::NaiveDate;
    use std::cell::Cell;

    /// In-memory source with a settable fingerprint and a load counter
    struct FakeSource {
        sets: Vec<PartySet>,
        tracks: Vec<(SetId, Vec<Track>)>,
        library: Vec<LibrarySong>,
        version: Cell<i64>,
        loads: Cell<usize>,
    }

    impl TrackSource for FakeSource {
        fn list_sets(&self) -> Result<Vec<PartySet>> {
            self.loads.set(self.loads.get() + 1);
            Ok(self.sets.clone())
        }

        fn tracks_for_set(&self, set_id: SetId) -> Result<Vec<Track>> {
            Ok(self
                .tracks
                .iter()
                .find(|(id, _)| *id == set_id)
                .map(|(_, t)| t.clone())
                .unwrap_or_default())
        }

        fn library_songs(&self) -> Result<Vec<LibrarySong>> {
            Ok(self.library.clone())
        }

        fn crate_song_counts(&self) -> Result<Vec<CrateRow>> {
            Ok(Vec::new())
        }

        fn songs_without_crate(&self) -> Result<Vec<LibrarySong>> {
            Ok(Vec::new())
        }

        fn fingerprint(&self) -> Result<SourceFingerprint> {
            Ok(SourceFingerprint {
                counts: vec![("Playlists".to_string(), self.version.get(), 0)],
                ..Default::default()
            })
        }
    }

    fn track(artist: &str, title: &str) -> Track {
        Track {
            artist: artist.to_string(),
            title: title.to_string(),
            album: String::new(),
            bpm: Some(180.0),
            duration: Some(200.0),
            rating: None,
            position: 1,
        }
    }

    fn library_song(id: i64, artist: Option<&str>) -> LibrarySong {
        LibrarySong {
            id,
            artist: artist.map(str::to_string),
            title: None,
            album: None,
            bpm: None,
            duration: None,
            rating: None,
        }
    }

    fn fake() -> FakeSource {
        FakeSource {
            sets: vec![
                PartySet {
                    id: 2,
                    name: "2/1/2024 - Blues".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 2, 1),
                },
                PartySet {
                    id: 1,
                    name: "1/1/2024 - Lindy".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 1),
                },
                PartySet {
                    id: 3,
                    name: "Favorites".to_string(),
                    date: None,
                },
            ],
            tracks: vec![
                (1, vec![track("Count Basie", "Shiny Stockings")]),
                (2, vec![track("Count Basie", "Shiny Stockings")]),
            ],
            library: vec![
                library_song(1, Some("Count Basie")),
                library_song(2, Some("Chick Webb & Ella Fitzgerald")),
                library_song(3, None),
            ],
            version: Cell::new(1),
            loads: Cell::new(0),
        }
    }

    #[test]
    fn test_load_sorts_sets_and_skips_undated() {
        let snapshot = LibrarySnapshot::load(&fake(), &ArtistNormalizer::new()).unwrap();
        let ids: Vec<SetId> = snapshot.sets().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(snapshot.stats().undated_skipped, 1);
        assert_eq!(snapshot.stats().tracks_loaded, 2);
        assert_eq!(snapshot.repetition()[1].second, 1);
        let artists: Vec<&str> = snapshot.library_artists().iter().map(String::as_str).collect();
        assert_eq!(artists, vec!["Chick Webb", "Count Basie", "Ella Fitzgerald"]);
    }

    #[test]
    fn test_aggregate_uses_full_history_repetition() {
        let snapshot = LibrarySnapshot::load(&fake(), &ArtistNormalizer::new()).unwrap();
        let filter = AggregateFilter {
            styles: Some(vec!["blues".to_string()]),
            ..Default::default()
        };
        let result = snapshot.compute_aggregate(&filter);
        assert_eq!(result.set_count, 1);
        assert_eq!(result.repetition.len(), 1);
        assert_eq!(result.repetition[0].record.pct_second, 100.0);
        assert_eq!(result.unplayed_artists, vec!["Chick Webb", "Ella Fitzgerald"]);
    }

    #[test]
    fn test_set_profile_unknown_set() {
        let snapshot = LibrarySnapshot::load(&fake(), &ArtistNormalizer::new()).unwrap();
        assert!(snapshot.set_profile(3).is_err());
        assert_eq!(snapshot.set_profile(1).unwrap().total_minutes, 200.0 / 60.0);
    }

    #[test]
    fn test_cache_reuses_until_fingerprint_changes() {
        let source = fake();
        let cache = SnapshotCache::new(ArtistNormalizer::new());

        let first = cache.get(&source).unwrap();
        let second = cache.get(&source).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.loads.get(), 1);

        source.version.set(2);
        let third = cache.get(&source).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(source.loads.get(), 2);

        cache.invalidate().unwrap();
        cache.get(&source).unwrap();
        assert_eq!(source.loads.get(), 3);
    }
}
