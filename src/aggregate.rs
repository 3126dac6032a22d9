//! Aggregate statistics over the tracks of a filtered collection of sets.
//!
//! Track-level statistics (counts, tempo and duration means, fastest and
//! slowest, top song) use one row per play. Artist statistics use the
//! exploded collection: one row per canonical artist of each play's credit.
//!
//! Ties are always resolved in favour of the first-encountered row or group.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    AggregateResult, ArtistPlayStats, BpmSummary, HistogramBin, OrderedRepetition, PartySet,
    RepetitionRecord, SetBpmSummary, SetId, SongPlayStats, TempoPick, Track,
};
use crate::normalize::ArtistNormalizer;

pub const HISTOGRAM_BINS: usize = 20;
pub const TOP_ARTISTS: usize = 10;

/// Placeholder for textual statistics with no value
pub const PLACEHOLDER: &str = "-";

// ============================================================================
// Filters
// ============================================================================

/// Which party sets take part in an aggregate run. `None` means "no filter"
/// for every field.
#[derive(Clone, Debug, Default)]
pub struct AggregateFilter {
    pub set_ids: Option<Vec<SetId>>,
    pub styles: Option<Vec<String>>,
    pub start: Option<NaiveDate>, // inclusive
    pub end: Option<NaiveDate>,   // inclusive
}

impl AggregateFilter {
    pub fn accepts(&self, set: &PartySet) -> bool {
        let Some(date) = set.date else {
            return false;
        };
        if let Some(ids) = &self.set_ids {
            if !ids.contains(&set.id) {
                return false;
            }
        }
        if let Some(styles) = &self.styles {
            if !set.matches_style(styles) {
                return false;
            }
        }
        if self.start.is_some_and(|start| date < start) {
            return false;
        }
        if self.end.is_some_and(|end| date > end) {
            return false;
        }
        true
    }
}

// ============================================================================
// Grouping Helpers
// ============================================================================

struct SongGroup<'a> {
    artist: &'a str,
    title: &'a str,
    count: usize,
    dates: Vec<NaiveDate>, // one entry per play
    rating: Option<i64>,
}

struct ArtistGroup<'a> {
    name: String,
    plays: usize,
    titles: FxHashSet<&'a str>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Linear-interpolation quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn bpm_summary(values: &[f64]) -> Option<BpmSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(BpmSummary {
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

/// Equal-width histogram between the smallest and largest value.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for v in values {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

// ============================================================================
// Aggregate
// ============================================================================

/// Compute every aggregate statistic.
///
/// `sets` must already be filtered and in chronological order. `library_artists`
/// is the canonical-artist baseline of the whole library; `repetition` holds
/// the full-history records, of which only the selected sets are reported.
/// Empty input gives `AggregateResult::default()`.
pub fn compute_aggregate(
    sets: &[(&PartySet, &[Track])],
    normalizer: &ArtistNormalizer,
    library_artists: &BTreeSet<String>,
    repetition: &[RepetitionRecord],
) -> AggregateResult {
    let total_tracks: usize = sets.iter().map(|(_, tracks)| tracks.len()).sum();
    if total_tracks == 0 {
        return AggregateResult::default();
    }

    let plays: Vec<(&PartySet, &Track)> = sets
        .iter()
        .flat_map(|(set, tracks)| tracks.iter().map(move |t| (*set, t)))
        .collect();

    // ---- track-level statistics ----
    let unique_songs = plays
        .iter()
        .map(|(_, t)| (t.artist.as_str(), t.album.as_str(), t.title.as_str()))
        .collect::<FxHashSet<_>>()
        .len();
    let avg_bpm = mean(plays.iter().filter_map(|(_, t)| t.bpm));
    let avg_duration = mean(plays.iter().filter_map(|(_, t)| t.duration));

    let mut fastest: Option<&Track> = None;
    let mut slowest: Option<&Track> = None;
    for &(_, t) in &plays {
        let Some(bpm) = t.bpm else { continue };
        if fastest.and_then(|f| f.bpm).map_or(true, |best| bpm > best) {
            fastest = Some(t);
        }
        if slowest.and_then(|s| s.bpm).map_or(true, |best| bpm < best) {
            slowest = Some(t);
        }
    }

    // ---- per-song groups, first-encountered order ----
    let mut song_index: FxHashMap<(&str, &str), usize> = FxHashMap::default();
    let mut songs: Vec<SongGroup> = Vec::new();
    for &(set, t) in &plays {
        let idx = *song_index
            .entry((t.artist.as_str(), t.title.as_str()))
            .or_insert_with(|| {
                songs.push(SongGroup {
                    artist: &t.artist,
                    title: &t.title,
                    count: 0,
                    dates: Vec::new(),
                    rating: None,
                });
                songs.len() - 1
            });
        let group = &mut songs[idx];
        group.count += 1;
        if let Some(date) = set.date {
            group.dates.push(date);
        }
        group.rating = match (group.rating, t.rating) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    let mut top_song: Option<&SongGroup> = None;
    for group in &songs {
        if top_song.map_or(true, |best| group.count > best.count) {
            top_song = Some(group);
        }
    }
    let top_song = top_song.map(|g| ((g.artist.to_string(), g.title.to_string()), g.count));

    let mut played_songs: Vec<SongPlayStats> = songs
        .iter()
        .map(|g| SongPlayStats {
            rank: 0,
            artist: g.artist.to_string(),
            title: g.title.to_string(),
            times_played: g.count,
            dates: sorted_dates(&g.dates)
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>()
                .join(", "),
            rating: g.rating,
        })
        .collect();
    played_songs.sort_by(|a, b| b.times_played.cmp(&a.times_played));
    for (i, row) in played_songs.iter_mut().enumerate() {
        row.rank = i + 1;
    }

    // ---- exploded per-artist groups ----
    let mut credit_cache: FxHashMap<&str, Vec<String>> = FxHashMap::default();
    let mut artist_index: FxHashMap<String, usize> = FxHashMap::default();
    let mut artist_groups: Vec<ArtistGroup> = Vec::new();
    for &(_, t) in &plays {
        let names = credit_cache
            .entry(t.artist.as_str())
            .or_insert_with(|| normalizer.normalize(Some(&t.artist)));
        for name in names.iter() {
            let idx = match artist_index.get(name) {
                Some(&idx) => idx,
                None => {
                    artist_groups.push(ArtistGroup {
                        name: name.clone(),
                        plays: 0,
                        titles: FxHashSet::default(),
                    });
                    artist_index.insert(name.clone(), artist_groups.len() - 1);
                    artist_groups.len() - 1
                }
            };
            let group = &mut artist_groups[idx];
            group.plays += 1;
            group.titles.insert(t.title.as_str());
        }
    }

    let mut artists: Vec<ArtistPlayStats> = artist_groups
        .iter()
        .map(|g| ArtistPlayStats {
            rank: 0,
            artist: g.name.clone(),
            plays: g.plays,
            distinct_songs: g.titles.len(),
            ratio: g.titles.len() as f64 / g.plays as f64,
        })
        .collect();
    artists.sort_by(|a, b| b.plays.cmp(&a.plays));
    for (i, row) in artists.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    let top_artist = artists.first().map(|a| (a.artist.clone(), a.plays));

    let played_artists: BTreeSet<&str> = artist_groups.iter().map(|g| g.name.as_str()).collect();
    let unplayed_artists: Vec<String> = library_artists
        .iter()
        .filter(|a| !played_artists.contains(a.as_str()))
        .cloned()
        .collect();

    // ---- distributions ----
    let bpms: Vec<f64> = plays.iter().filter_map(|(_, t)| t.bpm).collect();
    let bpm_histogram = histogram(&bpms, HISTOGRAM_BINS);

    let set_bpm: Vec<SetBpmSummary> = sets
        .iter()
        .filter_map(|(set, tracks)| set.date.map(|date| (set, tracks, date)))
        .enumerate()
        .map(|(i, (set, tracks, date))| {
            let values: Vec<f64> = tracks.iter().filter_map(|t| t.bpm).collect();
            SetBpmSummary {
                set_order: i + 1,
                set_id: set.id,
                name: set.name.clone(),
                date,
                style: set.style(),
                tracks_with_bpm: values.len(),
                summary: bpm_summary(&values),
            }
        })
        .collect();

    let mut style_counts: BTreeMap<String, usize> = BTreeMap::new();
    for (set, _) in sets {
        if let Some(style) = set.style() {
            *style_counts.entry(style).or_insert(0) += 1;
        }
    }

    let selected: FxHashSet<SetId> = sets.iter().map(|(s, _)| s.id).collect();
    let repetition: Vec<OrderedRepetition> = repetition
        .iter()
        .filter(|r| selected.contains(&r.set_id))
        .enumerate()
        .map(|(i, r)| OrderedRepetition {
            set_order: i + 1,
            record: r.clone(),
        })
        .collect();

    AggregateResult {
        set_count: sets.len(),
        style_counts: style_counts.into_iter().collect(),
        total_tracks,
        unique_songs,
        unique_artists: artist_groups.len(),
        avg_bpm,
        avg_duration,
        fastest: fastest.and_then(tempo_pick),
        slowest: slowest.and_then(tempo_pick),
        top_song,
        top_artist,
        bpm_histogram,
        set_bpm,
        repetition,
        played_songs,
        artists,
        unplayed_artists,
    }
}

fn sorted_dates(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut dates = dates.to_vec();
    dates.sort();
    dates
}

fn tempo_pick(t: &Track) -> Option<TempoPick> {
    Some(TempoPick {
        artist: t.artist.clone(),
        title: t.title.clone(),
        bpm: t.bpm?,
    })
}

// ============================================================================
// Display
// ============================================================================

/// Whole seconds as HH:MM:SS (fractions truncated, negatives clamp to zero)
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

impl AggregateResult {
    pub fn top_artists(&self) -> &[ArtistPlayStats] {
        &self.artists[..self.artists.len().min(TOP_ARTISTS)]
    }

    pub fn top_song_label(&self) -> String {
        match &self.top_song {
            Some(((artist, title), n)) => format!("{} – {} ({})", artist, title, n),
            None => PLACEHOLDER.to_string(),
        }
    }

    pub fn top_artist_label(&self) -> String {
        match &self.top_artist {
            Some((artist, _)) => artist.clone(),
            None => PLACEHOLDER.to_string(),
        }
    }

    fn tempo_label(pick: &Option<TempoPick>) -> String {
        match pick {
            Some(p) => format!("({:.1} BPM) {} – {}", p.bpm, p.title, p.artist),
            None => PLACEHOLDER.to_string(),
        }
    }

    pub fn fastest_label(&self) -> String {
        Self::tempo_label(&self.fastest)
    }

    pub fn slowest_label(&self) -> String {
        Self::tempo_label(&self.slowest)
    }

    /// Headline statistics as "Label: value" lines
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Sets: {}", self.set_count),
            format!("Total Songs: {}", self.total_tracks),
        ];
        for (style, n) in &self.style_counts {
            lines.push(format!("{} Sets: {}", crate::normalize::title_case(style), n));
        }
        lines.extend([
            format!("Unique Songs: {}", self.unique_songs),
            format!("Unique Artists: {}", self.unique_artists),
            format!("Avg BPM: {:.1}", self.avg_bpm),
            format!("Top Played Artist: {}", self.top_artist_label()),
            format!("Top Played Song: {}", self.top_song_label()),
            format!("Avg Duration: {}", format_hms(self.avg_duration)),
            format!("Fastest Song: {}", self.fastest_label()),
            format!("Slowest Song: {}", self.slowest_label()),
        ]);
        lines
    }
}
