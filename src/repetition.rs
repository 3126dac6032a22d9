//! First / second / third-plus play classification across chronological sets.
//!
//! Each set is classified against the play counts as of the moment the set
//! started: plays inside the same set never influence each other, and the
//! counter is only bumped once the whole set has been classified.

use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::models::{PartySet, RepetitionBucket, RepetitionRecord, SongKey, Track};
use crate::source::TrackSource;

/// Cumulative per-song play counter for one analysis run.
/// Counts only ever grow; build a fresh tracker for every run.
#[derive(Debug, Default)]
pub struct RepetitionTracker {
    song_counts: FxHashMap<SongKey, u32>,
}

impl RepetitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plays recorded for a song so far (0 = never seen)
    pub fn prior_plays(&self, artist: &str, title: &str) -> u32 {
        self.song_counts
            .get(&(artist.to_string(), title.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn distinct_songs(&self) -> usize {
        self.song_counts.len()
    }

    /// Classify every track of `set` against the snapshot at set start, then
    /// add the set's plays to the history.
    pub fn record_set(&mut self, set: &PartySet, tracks: &[Track]) -> Option<RepetitionRecord> {
        let date = set.date?;

        let mut first = 0;
        let mut second = 0;
        let mut third_plus = 0;
        let mut played: FxHashMap<SongKey, u32> = FxHashMap::default();

        for track in tracks {
            let key = track.song_key();
            let prior = self.song_counts.get(&key).copied().unwrap_or(0);
            match RepetitionBucket::from_prior_plays(prior) {
                RepetitionBucket::First => first += 1,
                RepetitionBucket::Second => second += 1,
                RepetitionBucket::ThirdPlus => third_plus += 1,
            }
            *played.entry(key).or_insert(0) += 1;
        }

        for (key, n) in played {
            *self.song_counts.entry(key).or_insert(0) += n;
        }

        let total = tracks.len();
        Some(RepetitionRecord {
            set_id: set.id,
            name: set.name.clone(),
            date,
            total,
            first,
            second,
            third_plus,
            pct_first: percentage(first, total),
            pct_second: percentage(second, total),
            pct_third_plus: percentage(third_plus, total),
        })
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

/// Order party sets by date. The sort is stable so sets sharing a date keep
/// their source order. Undated playlists are dropped.
pub fn chronological(sets: &[PartySet]) -> Vec<&PartySet> {
    let mut dated: Vec<&PartySet> = sets.iter().filter(|s| s.is_party_set()).collect();
    dated.sort_by_key(|s| s.date);
    dated
}

/// Full-history scan over sets whose tracks are already in memory.
/// Sets are put in date order first; output follows that order.
pub fn compute_repetition_from<'a, I>(sets: I) -> Vec<RepetitionRecord>
where
    I: IntoIterator<Item = (&'a PartySet, &'a [Track])>,
{
    let mut ordered: Vec<(&PartySet, &[Track])> =
        sets.into_iter().filter(|(s, _)| s.is_party_set()).collect();
    ordered.sort_by_key(|(s, _)| s.date);

    let mut tracker = RepetitionTracker::new();
    ordered
        .into_iter()
        .filter_map(|(set, tracks)| tracker.record_set(set, tracks))
        .collect()
}

/// Full-history scan fetching each set's tracks from the source.
pub fn compute_repetition(sets: &[PartySet], source: &dyn TrackSource) -> Result<Vec<RepetitionRecord>> {
    let mut tracker = RepetitionTracker::new();
    let mut records = Vec::new();
    for set in chronological(sets) {
        let tracks = source.tracks_for_set(set.id)?;
        if let Some(record) = tracker.record_set(set, &tracks) {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn set(id: i64, day: u32) -> PartySet {
        PartySet {
            id,
            name: format!("1/{}/2024 - Lindy", day),
            date: NaiveDate::from_ymd_opt(2024, 1, day),
        }
    }

    fn track(artist: &str, title: &str) -> Track {
        Track {
            artist: artist.to_string(),
            title: title.to_string(),
            album: String::new(),
            bpm: None,
            duration: None,
            rating: None,
            position: 0,
        }
    }

    #[test]
    fn test_same_song_twice_in_debut_set_is_first_twice() {
        let s1 = set(1, 1);
        let tracks = vec![track("A", "Song"), track("A", "Song")];
        let records = compute_repetition_from(vec![(&s1, tracks.as_slice())]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first, 2);
        assert_eq!(records[0].pct_first, 100.0);
        assert_eq!(records[0].pct_second, 0.0);
    }

    #[test]
    fn test_counts_accumulate_across_sets() {
        let (s1, s2, s3) = (set(1, 1), set(2, 8), set(3, 15));
        let t1 = vec![track("A", "X"), track("A", "X"), track("B", "Y")];
        let t2 = vec![track("A", "X"), track("B", "Y"), track("C", "Z")];
        let t3 = vec![track("A", "X"), track("B", "Y"), track("C", "Z"), track("D", "W")];
        let records = compute_repetition_from(vec![
            (&s1, t1.as_slice()),
            (&s2, t2.as_slice()),
            (&s3, t3.as_slice()),
        ]);

        // set 2: X seen twice before → third+, Y once → second, Z new
        assert_eq!((records[1].first, records[1].second, records[1].third_plus), (1, 1, 1));
        // set 3: X 3 plays, Y 2 plays, Z 1 play, W new
        assert_eq!((records[2].first, records[2].second, records[2].third_plus), (1, 1, 2));
        assert_eq!(records[2].pct_third_plus, 50.0);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let (s1, s2) = (set(1, 1), set(2, 8));
        let t1 = vec![track("A", "X")];
        let t2 = vec![track("A", "X")];
        let forward = compute_repetition_from(vec![(&s1, t1.as_slice()), (&s2, t2.as_slice())]);
        let backward = compute_repetition_from(vec![(&s2, t2.as_slice()), (&s1, t1.as_slice())]);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].set_id, 1);
        assert_eq!(forward[1].second, 1);
    }

    #[test]
    fn test_rerun_is_identical() {
        let (s1, s2) = (set(1, 1), set(2, 2));
        let t1 = vec![track("A", "X"), track("B", "Y")];
        let t2 = vec![track("B", "Y"), track("C", "Z"), track("A", "X")];
        let input = vec![(&s1, t1.as_slice()), (&s2, t2.as_slice())];
        assert_eq!(
            compute_repetition_from(input.clone()),
            compute_repetition_from(input)
        );
    }

    #[test]
    fn test_empty_set_is_all_zero() {
        let s1 = set(1, 1);
        let records = compute_repetition_from(vec![(&s1, &[][..])]);
        assert_eq!(records[0].total, 0);
        assert_eq!(records[0].pct_first, 0.0);
        assert_eq!(records[0].pct_second, 0.0);
        assert_eq!(records[0].pct_third_plus, 0.0);
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let (s1, s2) = (set(1, 1), set(2, 2));
        let t1 = vec![track("A", "X"), track("B", "Y"), track("C", "Z")];
        let t2 = vec![track("A", "X"), track("D", "V"), track("E", "U")];
        for r in compute_repetition_from(vec![(&s1, t1.as_slice()), (&s2, t2.as_slice())]) {
            let sum = r.pct_first + r.pct_second + r.pct_third_plus;
            assert!((sum - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_undated_sets_skipped() {
        let undated = PartySet {
            id: 9,
            name: "Warmup ideas".to_string(),
            date: None,
        };
        let t = vec![track("A", "X")];
        assert!(compute_repetition_from(vec![(&undated, t.as_slice())]).is_empty());
    }

    #[test]
    fn test_identity_uses_raw_artist() {
        let mut tracker = RepetitionTracker::new();
        let s1 = set(1, 1);
        tracker.record_set(&s1, &[track("Ella Fitzgerald & Louis Armstrong", "Cheek to Cheek")]);
        assert_eq!(tracker.prior_plays("Ella Fitzgerald & Louis Armstrong", "Cheek to Cheek"), 1);
        assert_eq!(tracker.prior_plays("Ella Fitzgerald", "Cheek to Cheek"), 0);
        assert_eq!(tracker.distinct_songs(), 1);
    }
}
