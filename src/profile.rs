//! Tempo over elapsed time for a single set.

use crate::models::{PartySet, ProfilePoint, SetProfile, Track};

/// Build the profile of one set. Tracks keep their position order; a track
/// with unknown duration adds nothing to the running total and gets no
/// cumulative value of its own.
pub fn set_profile(set: &PartySet, tracks: &[Track]) -> SetProfile {
    let mut elapsed = 0.0;
    let mut ordered: Vec<&Track> = tracks.iter().collect();
    ordered.sort_by_key(|t| t.position);

    let points = ordered
        .into_iter()
        .map(|t| {
            let cumulative_minutes = t.duration.map(|d| {
                elapsed += d;
                elapsed / 60.0
            });
            ProfilePoint {
                position: t.position,
                artist: t.artist.clone(),
                title: t.title.clone(),
                bpm: t.bpm,
                rating: t.rating,
                duration: t.duration,
                cumulative_minutes,
            }
        })
        .collect();

    SetProfile {
        set_id: set.id,
        name: set.name.clone(),
        total_minutes: elapsed / 60.0,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(position: i64, duration: Option<f64>) -> Track {
        Track {
            artist: "A".to_string(),
            title: format!("T{}", position),
            album: String::new(),
            bpm: Some(150.0),
            duration,
            rating: None,
            position,
        }
    }

    fn set() -> PartySet {
        PartySet {
            id: 4,
            name: "2/2/2024 - Blues".to_string(),
            date: None,
        }
    }

    #[test]
    fn test_cumulative_minutes() {
        let profile = set_profile(&set(), &[track(1, Some(120.0)), track(2, Some(180.0))]);
        assert_eq!(profile.points[0].cumulative_minutes, Some(2.0));
        assert_eq!(profile.points[1].cumulative_minutes, Some(5.0));
        assert_eq!(profile.total_minutes, 5.0);
    }

    #[test]
    fn test_unknown_duration_skipped() {
        let profile = set_profile(
            &set(),
            &[track(1, Some(60.0)), track(2, None), track(3, Some(60.0))],
        );
        assert_eq!(profile.points[1].cumulative_minutes, None);
        assert_eq!(profile.points[2].cumulative_minutes, Some(2.0));
        assert_eq!(profile.total_minutes, 2.0);
    }

    #[test]
    fn test_points_in_position_order() {
        let profile = set_profile(&set(), &[track(3, None), track(1, None)]);
        assert_eq!(profile.points[0].position, 1);
        assert_eq!(profile.total_minutes, 0.0);
    }
}
