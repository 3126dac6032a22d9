//! Library-wide overview: size, rating distribution and uncrated songs.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::models::{LibraryOverview, LibrarySong};
use crate::source::TrackSource;

/// Ratings shown in the distribution; 0 means "unrated" in Mixxx
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

pub fn rating_counts(songs: &[LibrarySong]) -> Vec<(i64, usize)> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for rating in songs.iter().filter_map(|s| s.rating) {
        if RATING_RANGE.contains(&rating) {
            *counts.entry(rating).or_insert(0) += 1;
        }
    }
    counts.into_iter().collect()
}

pub fn library_overview(source: &dyn TrackSource) -> Result<LibraryOverview> {
    let songs = source.library_songs()?;
    Ok(LibraryOverview {
        total_songs: songs.len(),
        rating_counts: rating_counts(&songs),
        songs_without_crate: source.songs_without_crate()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: i64, rating: Option<i64>) -> LibrarySong {
        LibrarySong {
            id,
            artist: None,
            title: None,
            album: None,
            bpm: None,
            duration: None,
            rating,
        }
    }

    #[test]
    fn test_rating_counts() {
        let songs = vec![
            song(1, Some(5)),
            song(2, Some(0)),
            song(3, None),
            song(4, Some(5)),
            song(5, Some(2)),
            song(6, Some(7)),
        ];
        assert_eq!(rating_counts(&songs), vec![(2, 1), (5, 2)]);
        assert!(rating_counts(&[]).is_empty());
    }
}
