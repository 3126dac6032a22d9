//! Read access to the Mixxx library database.
//!
//! The analyses only ever see the records of [`crate::models`]; everything
//! Mixxx-specific (table names, the optional `hidden` column, lenient numeric
//! columns) stays in this module.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use rustc_hash::FxHasher;
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::models::{CrateRow, LibrarySong, PartySet, SetId, Track};

// ============================================================================
// Source Trait
// ============================================================================

/// Data-change fingerprint used as the snapshot cache invalidation trigger.
/// `data_version` moves when another connection commits; `content_hash`
/// covers edits made in place (renamed playlists, retitled tracks).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceFingerprint {
    pub counts: Vec<(String, i64, i64)>, // (table, row count, max id)
    pub data_version: i64,
    pub content_hash: u64,
}

/// What the analyses consume from a track/set store.
pub trait TrackSource {
    /// Every playlist in insertion order; `date` is set for party sets only.
    fn list_sets(&self) -> Result<Vec<PartySet>>;

    /// Tracks of one set in position order.
    fn tracks_for_set(&self, set_id: SetId) -> Result<Vec<Track>>;

    /// Every visible library song (unplayed-artist baseline).
    fn library_songs(&self) -> Result<Vec<LibrarySong>>;

    /// Crates with their visible song counts.
    fn crate_song_counts(&self) -> Result<Vec<CrateRow>>;

    /// Visible songs that belong to no crate, sorted by artist.
    fn songs_without_crate(&self) -> Result<Vec<LibrarySong>>;

    fn fingerprint(&self) -> Result<SourceFingerprint>;
}

// ============================================================================
// Set Dates
// ============================================================================

/// Leading "M/D/YYYY" or "M/D/YY" of a playlist name
pub static SET_DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{2,4})").unwrap());

/// Parse the date a party set is named after.
/// "3/14/2024 - Blues" → 2024-03-14, "3/14/24 - Blues" → 2024-03-14.
/// Two-digit years pivot like strptime's %y (00-68 → 20xx, 69-99 → 19xx);
/// three-digit years and impossible dates yield `None`.
pub fn parse_set_date(name: &str) -> Option<NaiveDate> {
    let caps = SET_DATE_PREFIX.captures(name)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year_str = &caps[3];
    let year: i32 = match year_str.len() {
        4 => year_str.parse().ok()?,
        2 => {
            let yy: i32 = year_str.parse().ok()?;
            if yy <= 68 {
                2000 + yy
            } else {
                1900 + yy
            }
        }
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

// ============================================================================
// Lenient Column Readers
// ============================================================================

/// Integer, real or numeric text → f64; NULL, blobs and junk text → None
fn numeric_column(row: &Row, idx: usize) -> Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) if f.is_finite() => Some(f),
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|f| f.is_finite()),
        _ => None,
    })
}

fn integer_column(row: &Row, idx: usize) -> Result<Option<i64>> {
    Ok(numeric_column(row, idx)?.map(|f| f.round() as i64))
}

fn text_column(row: &Row, idx: usize) -> Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        _ => None,
    })
}

// ============================================================================
// Mixxx Database
// ============================================================================

pub struct MixxxDb {
    conn: Connection,
    has_hidden: bool,
}

impl MixxxDb {
    /// Open a Mixxx database read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open Mixxx database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection (in-memory fixtures).
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let has_hidden = column_exists(&conn, "library", "hidden")
            .context("Failed to inspect library table")?;
        Ok(Self { conn, has_hidden })
    }

    fn visible_clause(&self) -> &'static str {
        if self.has_hidden {
            "lib.hidden = 0"
        } else {
            "1 = 1"
        }
    }

    fn read_library_rows(&self, sql: &str) -> Result<Vec<LibrarySong>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut songs = Vec::new();
        while let Some(row) = rows.next()? {
            songs.push(LibrarySong {
                id: row.get(0)?,
                artist: text_column(row, 1)?,
                title: text_column(row, 2)?,
                album: text_column(row, 3)?,
                bpm: numeric_column(row, 4)?,
                duration: numeric_column(row, 5)?,
                rating: integer_column(row, 6)?,
            });
        }
        Ok(songs)
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

impl TrackSource for MixxxDb {
    fn list_sets(&self) -> Result<Vec<PartySet>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM Playlists ORDER BY id")
            .context("Failed to query playlists")?;
        let mut rows = stmt.query([])?;
        let mut sets = Vec::new();
        while let Some(row) = rows.next()? {
            let name = text_column(row, 1)?.unwrap_or_default();
            sets.push(PartySet {
                id: row.get(0)?,
                date: parse_set_date(&name),
                name,
            });
        }
        Ok(sets)
    }

    fn tracks_for_set(&self, set_id: SetId) -> Result<Vec<Track>> {
        let sql = format!(
            "SELECT COALESCE(lib.artist, ''), COALESCE(lib.title, ''), COALESCE(lib.album, ''),
                    lib.bpm, lib.duration, lib.rating, pt.position
             FROM PlaylistTracks pt
             JOIN library lib ON pt.track_id = lib.id
             WHERE pt.playlist_id = ?1 AND {}
             ORDER BY pt.position",
            self.visible_clause()
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt
            .query([set_id])
            .with_context(|| format!("Failed to read tracks of playlist {}", set_id))?;
        let mut tracks = Vec::new();
        while let Some(row) = rows.next()? {
            tracks.push(Track {
                artist: text_column(row, 0)?.unwrap_or_default(),
                title: text_column(row, 1)?.unwrap_or_default(),
                album: text_column(row, 2)?.unwrap_or_default(),
                bpm: numeric_column(row, 3)?,
                duration: numeric_column(row, 4)?,
                rating: integer_column(row, 5)?,
                position: integer_column(row, 6)?.unwrap_or(0),
            });
        }
        Ok(tracks)
    }

    fn library_songs(&self) -> Result<Vec<LibrarySong>> {
        let sql = format!(
            "SELECT lib.id, lib.artist, lib.title, lib.album, lib.bpm, lib.duration, lib.rating
             FROM library lib
             WHERE {}
             ORDER BY lib.id",
            self.visible_clause()
        );
        self.read_library_rows(&sql)
            .context("Failed to read library songs")
    }

    fn crate_song_counts(&self) -> Result<Vec<CrateRow>> {
        let sql = format!(
            "SELECT c.id, c.name, COUNT(lib.id)
             FROM crates c
             LEFT JOIN crate_tracks ct ON ct.crate_id = c.id
             LEFT JOIN library lib ON ct.track_id = lib.id AND {}
             GROUP BY c.id, c.name
             ORDER BY c.id",
            self.visible_clause()
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to query crates")?;
        let mut rows = stmt.query([])?;
        let mut crates = Vec::new();
        while let Some(row) = rows.next()? {
            let count: i64 = row.get(2)?;
            crates.push(CrateRow {
                id: row.get(0)?,
                name: text_column(row, 1)?.unwrap_or_default(),
                song_count: count.max(0) as u64,
            });
        }
        Ok(crates)
    }

    fn songs_without_crate(&self) -> Result<Vec<LibrarySong>> {
        let sql = format!(
            "SELECT lib.id, lib.artist, lib.title, lib.album, lib.bpm, lib.duration, lib.rating
             FROM library lib
             LEFT JOIN crate_tracks ct ON lib.id = ct.track_id
             WHERE ct.track_id IS NULL AND {}
             ORDER BY lib.artist, lib.id",
            self.visible_clause()
        );
        self.read_library_rows(&sql)
            .context("Failed to read songs without crate")
    }

    fn fingerprint(&self) -> Result<SourceFingerprint> {
        let mut counts = Vec::new();
        let mut hasher = FxHasher::default();
        for (table, id_col) in FINGERPRINT_TABLES {
            let (n, max): (i64, i64) = self.conn.query_row(
                &format!("SELECT COUNT(*), COALESCE(MAX({}), 0) FROM {}", id_col, table),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            counts.push((table.to_string(), n, max));
            hash_table(&self.conn, table, &mut hasher)
                .with_context(|| format!("Failed to checksum table {}", table))?;
        }
        let data_version: i64 = self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(SourceFingerprint {
            counts,
            data_version,
            content_hash: hasher.finish(),
        })
    }
}

/// Tables the snapshot is built from, with the column used for "max id"
const FINGERPRINT_TABLES: [(&str, &str); 5] = [
    ("Playlists", "id"),
    ("PlaylistTracks", "id"),
    ("library", "id"),
    ("crates", "id"),
    ("crate_tracks", "track_id"),
];

/// Feed every cell of `table`, in a stable row order, into `hasher`.
fn hash_table(conn: &Connection, table: &str, hasher: &mut FxHasher) -> Result<()> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY 1, 2", table))?;
    let columns = stmt.column_count();
    table.hash(hasher);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        for idx in 0..columns {
            match row.get_ref(idx)? {
                ValueRef::Null => 0u8.hash(hasher),
                ValueRef::Integer(i) => (1u8, i).hash(hasher),
                ValueRef::Real(f) => (2u8, f.to_bits()).hash(hasher),
                ValueRef::Text(t) => (3u8, t).hash(hasher),
                ValueRef::Blob(b) => (4u8, b).hash(hasher),
            }
        }
    }
    Ok(())
}
