//! In-memory Mixxx library shared by the integration tests.

use mixxx_set_stats::source::MixxxDb;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const SCHEMA: &str = "
    CREATE TABLE library (id INTEGER PRIMARY KEY, artist TEXT, title TEXT, album TEXT,
                          bpm REAL, duration REAL, rating INTEGER, hidden INTEGER DEFAULT 0);
    CREATE TABLE Playlists (id INTEGER PRIMARY KEY, name TEXT);
    CREATE TABLE PlaylistTracks (id INTEGER PRIMARY KEY, playlist_id INTEGER,
                                 track_id INTEGER, position INTEGER);
    CREATE TABLE crates (id INTEGER PRIMARY KEY, name TEXT);
    CREATE TABLE crate_tracks (crate_id INTEGER, track_id INTEGER);
";

/// Three dated sets (one Lindy, two Blues), one undated playlist, a hidden
/// library row, an unplayed artist credited by two songs and a small crate tree.
pub const FIXTURE: &str = "
    INSERT INTO library VALUES (1, 'Count Basie', 'Shiny Stockings', 'Basie', 160, 200, 5, 0);
    INSERT INTO library VALUES (2, 'Ella Fitzgerald & Louis Armstrong', 'Cheek to Cheek', 'Ella and Louis', 110, 350, 4, 0);
    INSERT INTO library VALUES (3, 'Louis Armstrong and his Hot Five', 'Heebie Jeebies', 'Hot Fives', 200, 170, NULL, 0);
    INSERT INTO library VALUES (4, 'Bessie Smith', 'St. Louis Blues', NULL, 70, 190, 3, 0);
    INSERT INTO library VALUES (5, 'Chick Webb', 'Stompin at the Savoy', NULL, NULL, 180, 0, 0);
    INSERT INTO library VALUES (6, 'Hidden Artist', 'Hidden Song', NULL, 120, 100, 5, 1);
    INSERT INTO library VALUES (7, 'Chick Webb & Ella Fitzgerald', 'A-Tisket, A-Tasket', NULL, 150, 160, NULL, 0);

    INSERT INTO Playlists VALUES (1, '3/1/2024 - Blues - Friday');
    INSERT INTO Playlists VALUES (2, '1/5/24 - Lindy');
    INSERT INTO Playlists VALUES (3, 'Favorites');
    INSERT INTO Playlists VALUES (4, '2/2/2024 - Blues');

    INSERT INTO PlaylistTracks VALUES (1, 2, 1, 1);
    INSERT INTO PlaylistTracks VALUES (2, 2, 3, 2);
    INSERT INTO PlaylistTracks VALUES (3, 2, 6, 3);
    INSERT INTO PlaylistTracks VALUES (4, 4, 4, 1);
    INSERT INTO PlaylistTracks VALUES (5, 4, 1, 2);
    INSERT INTO PlaylistTracks VALUES (6, 1, 1, 1);
    INSERT INTO PlaylistTracks VALUES (7, 1, 2, 2);
    INSERT INTO PlaylistTracks VALUES (8, 3, 5, 1);

    INSERT INTO crates VALUES (1, 'Swing');
    INSERT INTO crates VALUES (2, 'Swing - Fast');
    INSERT INTO crates VALUES (3, 'Blues - Slow - Late');
    INSERT INTO crate_tracks VALUES (1, 1);
    INSERT INTO crate_tracks VALUES (2, 3);
    INSERT INTO crate_tracks VALUES (2, 6);
    INSERT INTO crate_tracks VALUES (3, 4);
";

pub fn connection() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory db");
    conn.execute_batch(SCHEMA).expect("schema");
    conn.execute_batch(FIXTURE).expect("fixture");
    conn
}

pub fn mixxx_db() -> MixxxDb {
    MixxxDb::from_connection(connection()).expect("mixxx db")
}

/// Same fixture written to `mixxxdb.sqlite` inside `dir`, for tests that need
/// a second connection to the file.
pub fn mixxx_file(dir: &Path) -> PathBuf {
    let path = dir.join("mixxxdb.sqlite");
    let conn = Connection::open(&path).expect("file db");
    conn.execute_batch(SCHEMA).expect("schema");
    conn.execute_batch(FIXTURE).expect("fixture");
    path
}
