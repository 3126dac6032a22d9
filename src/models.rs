//! Core data models for set statistics.
//!
//! This module contains the records read from the Mixxx library and the
//! result types produced by the aggregate, repetition and crate analyses.

use chrono::NaiveDate;
use serde::Serialize;

// ============================================================================
// Type Aliases
// ============================================================================

/// Playlist identifier as stored in `Playlists.id`
pub type SetId = i64;

/// Song identity for play counting: (artist as stored, title as stored).
/// Normalization never touches this key.
pub type SongKey = (String, String);

// ============================================================================
// Library Models
// ============================================================================

/// A playlist. Only playlists whose name starts with a parseable date are
/// party sets and take part in chronological analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartySet {
    pub id: SetId,
    pub name: String,
    pub date: Option<NaiveDate>,
}

impl PartySet {
    pub fn is_party_set(&self) -> bool {
        self.date.is_some()
    }

    /// Style token: the second " - " segment of the name, lower-cased.
    /// "3/14/2024 - Blues - Friday" → Some("blues")
    pub fn style(&self) -> Option<String> {
        self.name
            .split(" - ")
            .nth(1)
            .map(|s| s.trim().to_lowercase())
    }

    /// Style filter: keeps the set when its token contains any requested style.
    pub fn matches_style(&self, styles: &[String]) -> bool {
        match self.style() {
            Some(token) => styles
                .iter()
                .any(|s| !s.is_empty() && token.contains(&s.to_lowercase())),
            None => false,
        }
    }
}

/// Track row inside a set, in position order.
/// Text columns are never NULL (coalesced to ""); numeric columns that are
/// missing or unparseable are `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Track {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub bpm: Option<f64>,
    pub duration: Option<f64>, // seconds
    pub rating: Option<i64>,
    pub position: i64,
}

impl Track {
    pub fn song_key(&self) -> SongKey {
        (self.artist.clone(), self.title.clone())
    }
}

/// Library row used for the unplayed-artist baseline and the library overview
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LibrarySong {
    pub id: i64,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub bpm: Option<f64>,
    pub duration: Option<f64>,
    pub rating: Option<i64>,
}

/// Crate with the number of visible songs it holds
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrateRow {
    pub id: i64,
    pub name: String,
    pub song_count: u64,
}

// ============================================================================
// Repetition Models
// ============================================================================

/// Classification of one play against the history before its set started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepetitionBucket {
    First,
    Second,
    ThirdPlus,
}

impl RepetitionBucket {
    pub fn from_prior_plays(count: u32) -> Self {
        match count {
            0 => RepetitionBucket::First,
            1 => RepetitionBucket::Second,
            _ => RepetitionBucket::ThirdPlus,
        }
    }
}

/// Per-set repetition breakdown. Percentages sum to 100 for non-empty sets
/// and are all zero for empty sets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RepetitionRecord {
    pub set_id: SetId,
    pub name: String,
    pub date: NaiveDate,
    pub total: usize,
    pub first: usize,
    pub second: usize,
    pub third_plus: usize,
    pub pct_first: f64,
    pub pct_second: f64,
    pub pct_third_plus: f64,
}

// ============================================================================
// Aggregate Models
// ============================================================================

/// A single track picked as fastest or slowest
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TempoPick {
    pub artist: String,
    pub title: String,
    pub bpm: f64,
}

/// Per-song play statistics (played-songs table)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SongPlayStats {
    pub rank: usize,
    pub artist: String,
    pub title: String,
    pub times_played: usize,
    pub dates: String, // sorted YYYY-MM-DD, comma separated
    pub rating: Option<i64>,
}

/// Per-canonical-artist play statistics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArtistPlayStats {
    pub rank: usize,
    pub artist: String,
    pub plays: usize,
    pub distinct_songs: usize,
    /// distinct_songs / plays: near 1.0 = rarely repeated, near 0 = few songs on heavy rotation
    pub ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Five-number BPM summary for one set (box plot)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BpmSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetBpmSummary {
    pub set_order: usize,
    pub set_id: SetId,
    pub name: String,
    pub date: NaiveDate,
    pub style: Option<String>,
    pub tracks_with_bpm: usize,
    pub summary: Option<BpmSummary>,
}

/// Repetition record positioned in the chronological sequence of filtered sets
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderedRepetition {
    pub set_order: usize,
    #[serde(flatten)]
    pub record: RepetitionRecord,
}

/// Every statistic of the aggregate view. `Default` is the empty-input state:
/// zeros, `None` for textual picks, empty tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    pub set_count: usize,
    pub style_counts: Vec<(String, usize)>,
    pub total_tracks: usize,
    pub unique_songs: usize,
    pub unique_artists: usize,
    pub avg_bpm: f64,
    pub avg_duration: f64, // seconds
    pub fastest: Option<TempoPick>,
    pub slowest: Option<TempoPick>,
    pub top_song: Option<(SongKey, usize)>,
    pub top_artist: Option<(String, usize)>,
    pub bpm_histogram: Vec<HistogramBin>,
    pub set_bpm: Vec<SetBpmSummary>,
    pub repetition: Vec<OrderedRepetition>,
    pub played_songs: Vec<SongPlayStats>,
    pub artists: Vec<ArtistPlayStats>,
    pub unplayed_artists: Vec<String>,
}

// ============================================================================
// Crate Models
// ============================================================================

/// Node of the crate hierarchy. Intermediate prefixes without a crate of
/// their own are synthesized (`explicit == false`).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrateNode {
    pub path: String, // "Swing / Fast / Uptempo"
    pub segments: Vec<String>,
    pub explicit: bool,
    pub is_leaf: bool,
    pub own_songs: u64,
    pub cumulative_songs: u64,
}

// ============================================================================
// Individual Set / Library Models
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfilePoint {
    pub position: i64,
    pub artist: String,
    pub title: String,
    pub bpm: Option<f64>,
    pub rating: Option<i64>,
    pub duration: Option<f64>,
    /// Minutes elapsed at the end of this track; `None` when its duration is unknown
    pub cumulative_minutes: Option<f64>,
}

/// BPM against elapsed time for a single set
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetProfile {
    pub set_id: SetId,
    pub name: String,
    pub total_minutes: f64,
    pub points: Vec<ProfilePoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LibraryOverview {
    pub total_songs: usize,
    pub rating_counts: Vec<(i64, usize)>, // ratings 1..=5 that occur, ascending
    pub songs_without_crate: Vec<LibrarySong>,
}

// ============================================================================
// Load Statistics
// ============================================================================

/// Counters collected while a snapshot is loaded
#[derive(Clone, Debug, Default, Serialize)]
pub struct LoadStats {
    pub playlists_seen: usize,
    pub party_sets: usize,
    pub undated_skipped: usize,
    pub tracks_loaded: usize,
    pub library_songs: usize,
    pub library_artists: usize,
    pub repetition_records: usize,
    pub elapsed_secs: f64,
}

impl LoadStats {
    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
