//! SQLite-backed storage for the song library and saved playlists.
//!
//! Every public operation opens its own connection, uses it, and drops it
//! before returning. Constraint violations and missing rows are absorbed into
//! `bool`/`Option`/empty results so callers never see a storage error.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::protocol::{NewSong, PlaylistInfo, Song};
use crate::stats;

const SONG_COLUMNS: &str = "id, title, artist, genre, file_path, play_count";

pub struct DbManager {
    db_path: PathBuf,
}

impl DbManager {
    /// Opens (creating when needed) the library database at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    warn!(
                        "Could not create database directory {}: {}",
                        parent.display(),
                        err
                    );
                }
            }
        }

        let db_manager = Self {
            db_path: db_path.to_path_buf(),
        };
        db_manager.initialize()?;
        Ok(db_manager)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connection(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Ensures the three relations exist. Never touches existing rows.
    pub fn initialize(&self) -> Result<(), rusqlite::Error> {
        let conn = self.connection()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS songs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                artist TEXT,
                genre TEXT,
                file_path TEXT NOT NULL UNIQUE,
                play_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS playlists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS playlist_songs (
                playlist_id INTEGER NOT NULL,
                song_id INTEGER NOT NULL,
                UNIQUE(playlist_id, song_id),
                FOREIGN KEY(playlist_id) REFERENCES playlists(id),
                FOREIGN KEY(song_id) REFERENCES songs(id)
            )",
            [],
        )?;
        Ok(())
    }

    /// Inserts a song unless its file path is already catalogued.
    ///
    /// Returns `false` only when the database could not be written; a
    /// duplicate path is a successful no-op that keeps the existing row.
    pub fn add_song(&self, song: &NewSong) -> bool {
        let result = self.connection().and_then(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO songs (title, artist, genre, file_path) VALUES (?1, ?2, ?3, ?4)",
                params![song.title, song.artist, song.genre, song.file_path],
            )
        });
        match result {
            Ok(0) => {
                debug!("Song already in library, keeping existing row: {}", song.file_path);
                true
            }
            Ok(_) => true,
            Err(err) => {
                warn!("Failed to add song {}: {}", song.file_path, err);
                false
            }
        }
    }

    fn query_songs(&self) -> Result<Vec<Song>, rusqlite::Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY id ASC"))?;
        let song_iter = stmt.query_map([], song_from_row)?;

        let mut songs = Vec::new();
        for song in song_iter {
            songs.push(song?);
        }
        Ok(songs)
    }

    /// All songs in insertion order.
    pub fn get_all_songs(&self) -> Vec<Song> {
        self.query_songs().unwrap_or_else(|err| {
            warn!("Failed to read songs: {}", err);
            Vec::new()
        })
    }

    /// Songs whose title or artist contains `term`, ignoring case.
    ///
    /// Matching runs on Unicode lowercase forms rather than SQLite's
    /// ASCII-only `LIKE` folding. An empty term matches every song.
    pub fn search_songs(&self, term: &str) -> Vec<Song> {
        let needle = term.to_lowercase();
        self.get_all_songs()
            .into_iter()
            .filter(|song| {
                song.title.to_lowercase().contains(&needle)
                    || song
                        .artist
                        .as_deref()
                        .is_some_and(|artist| artist.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// First song (lowest id) whose title and artist equal the given values, ignoring case.
    /// A song without an artist matches the "Unknown Artist" placeholder.
    pub fn get_song_by_meta(&self, title: &str, artist: &str) -> Option<Song> {
        let title = title.to_lowercase();
        let artist = artist.to_lowercase();
        self.get_all_songs().into_iter().find(|song| {
            song.title.to_lowercase() == title && song.artist_or_unknown().to_lowercase() == artist
        })
    }

    /// Adds one play to the song. Unknown ids leave the table untouched.
    pub fn increment_play_count(&self, song_id: i64) {
        let result = self.connection().and_then(|conn| {
            conn.execute(
                "UPDATE songs SET play_count = play_count + 1 WHERE id = ?1",
                params![song_id],
            )
        });
        match result {
            Ok(0) => debug!("No song with id {} to count a play for", song_id),
            Ok(_) => {}
            Err(err) => warn!("Failed to increment play count for {}: {}", song_id, err),
        }
    }

    fn insert_playlist(&self, name: &str, song_ids: &[i64]) -> Result<i64, rusqlite::Error> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute("INSERT INTO playlists (name) VALUES (?1)", params![name])?;
        let playlist_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO playlist_songs (playlist_id, song_id) VALUES (?1, ?2)",
            )?;
            for song_id in song_ids {
                stmt.execute(params![playlist_id, song_id])?;
            }
        }
        tx.commit()?;
        Ok(playlist_id)
    }

    /// Stores a named playlist with its songs in one transaction.
    ///
    /// Returns `false` and writes nothing when the name is taken or any song
    /// id does not exist.
    pub fn create_playlist(&self, name: &str, song_ids: &[i64]) -> bool {
        match self.insert_playlist(name, song_ids) {
            Ok(playlist_id) => {
                debug!(
                    "Created playlist '{}' (id={}) with {} songs",
                    name,
                    playlist_id,
                    song_ids.len()
                );
                true
            }
            Err(err) => {
                warn!("Failed to create playlist '{}': {}", name, err);
                false
            }
        }
    }

    fn query_playlists(&self) -> Result<Vec<PlaylistInfo>, rusqlite::Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id, name FROM playlists ORDER BY id ASC")?;
        let playlist_iter = stmt.query_map([], |row| {
            Ok(PlaylistInfo {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut playlists = Vec::new();
        for playlist in playlist_iter {
            playlists.push(playlist?);
        }
        Ok(playlists)
    }

    pub fn get_playlists(&self) -> Vec<PlaylistInfo> {
        self.query_playlists().unwrap_or_else(|err| {
            warn!("Failed to read playlists: {}", err);
            Vec::new()
        })
    }

    pub fn get_playlist(&self, playlist_id: i64) -> Option<PlaylistInfo> {
        let result = self.connection().and_then(|conn| {
            conn.query_row(
                "SELECT id, name FROM playlists WHERE id = ?1",
                params![playlist_id],
                |row| {
                    Ok(PlaylistInfo {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
        });
        result.unwrap_or_else(|err| {
            warn!("Failed to read playlist {}: {}", playlist_id, err);
            None
        })
    }

    fn query_playlist_songs(&self, playlist_id: i64) -> Result<Vec<Song>, rusqlite::Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.title, s.artist, s.genre, s.file_path, s.play_count
             FROM playlist_songs ps
             JOIN songs s ON s.id = ps.song_id
             WHERE ps.playlist_id = ?1
             ORDER BY ps.rowid ASC",
        )?;
        let song_iter = stmt.query_map(params![playlist_id], song_from_row)?;

        let mut songs = Vec::new();
        for song in song_iter {
            songs.push(song?);
        }
        Ok(songs)
    }

    /// Songs saved in the playlist, in the order they were associated.
    pub fn get_playlist_songs(&self, playlist_id: i64) -> Vec<Song> {
        self.query_playlist_songs(playlist_id).unwrap_or_else(|err| {
            warn!("Failed to read songs of playlist {}: {}", playlist_id, err);
            Vec::new()
        })
    }

    fn remove_playlist(&self, playlist_id: i64) -> Result<usize, rusqlite::Error> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM playlist_songs WHERE playlist_id = ?1",
            params![playlist_id],
        )?;
        let removed = tx.execute("DELETE FROM playlists WHERE id = ?1", params![playlist_id])?;
        tx.commit()?;
        Ok(removed)
    }

    /// Removes the playlist and its associations. Library songs are kept.
    pub fn delete_playlist(&self, playlist_id: i64) -> bool {
        match self.remove_playlist(playlist_id) {
            Ok(0) => {
                debug!("No playlist with id {} to delete", playlist_id);
                true
            }
            Ok(_) => true,
            Err(err) => {
                warn!("Failed to delete playlist {}: {}", playlist_id, err);
                false
            }
        }
    }

    /// Human-readable listening report (top song, artist and genre).
    pub fn get_statistics(&self) -> String {
        let statistics = self
            .connection()
            .and_then(|conn| stats::query_statistics(&conn))
            .unwrap_or_else(|err| {
                warn!("Failed to compute statistics: {}", err);
                stats::LibraryStatistics::default()
            });
        stats::render_report(&statistics)
    }
}

fn song_from_row(row: &Row<'_>) -> Result<Song, rusqlite::Error> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        genre: row.get(3)?,
        file_path: row.get(4)?,
        play_count: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_test_db() -> (TempDir, DbManager) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let db = DbManager::new(&dir.path().join("library.db")).expect("failed to open db");
        (dir, db)
    }

    fn new_song(title: &str, artist: &str, genre: &str, path: &str) -> NewSong {
        NewSong {
            title: title.to_string(),
            artist: Some(artist.to_string()),
            genre: Some(genre.to_string()),
            file_path: path.to_string(),
        }
    }

    fn song_ids(db: &DbManager) -> Vec<i64> {
        db.get_all_songs().iter().map(|song| song.id).collect()
    }

    fn association_count(db: &DbManager) -> i64 {
        let conn = db.connection().expect("connection");
        conn.query_row("SELECT COUNT(*) FROM playlist_songs", [], |row| row.get(0))
            .expect("count associations")
    }

    #[test]
    fn test_add_and_get_song() {
        let (_dir, db) = open_test_db();
        assert!(db.add_song(&new_song("Title A", "Artist A", "Pop", "/path/a.mp3")));

        let songs = db.get_all_songs();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Title A");
        assert_eq!(songs[0].artist.as_deref(), Some("Artist A"));
        assert_eq!(songs[0].file_path, "/path/a.mp3");
        assert_eq!(songs[0].play_count, 0);
    }

    #[test]
    fn test_initialize_is_idempotent_and_keeps_rows() {
        let (dir, db) = open_test_db();
        db.add_song(&new_song("Keep", "Me", "Pop", "/keep.mp3"));

        db.initialize().expect("second initialize");
        let reopened = DbManager::new(&dir.path().join("library.db")).expect("reopen");
        assert_eq!(reopened.get_all_songs().len(), 1);
    }

    #[test]
    fn test_duplicate_path_keeps_first_record() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Song 1", "Artist 1", "Pop", "/same/path.mp3"));
        assert!(db.add_song(&new_song("Song 1 New", "Artist 2", "Rock", "/same/path.mp3")));

        let songs = db.get_all_songs();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Song 1");
        assert_eq!(songs[0].artist.as_deref(), Some("Artist 1"));
    }

    #[test]
    fn test_get_all_songs_preserves_insertion_order() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("B", "x", "g", "/b"));
        db.add_song(&new_song("A", "x", "g", "/a"));
        db.add_song(&new_song("C", "x", "g", "/c"));

        let titles: Vec<String> = db.get_all_songs().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_search_songs_matches_title_and_artist() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Yellow Submarine", "The Beatles", "Rock", "/p/1"));
        db.add_song(&new_song("Yellow", "Coldplay", "Pop", "/p/2"));

        assert_eq!(db.search_songs("Yellow").len(), 2);
        assert_eq!(db.search_songs("Beatles").len(), 1);
        assert!(db.search_songs("Eminem").is_empty());
    }

    #[test]
    fn test_search_songs_ignores_case() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Yellow Submarine", "The Beatles", "Rock", "/p/1"));
        db.add_song(&new_song("Yellow", "Coldplay", "Pop", "/p/2"));
        db.add_song(&new_song("Хубава", "ЗВЕЗДА", "Pop", "/p/3"));

        assert_eq!(db.search_songs("yellow"), db.search_songs("Yellow"));
        assert_eq!(db.search_songs("YELLOW").len(), 2);
        assert_eq!(db.search_songs("звезда").len(), 1);
    }

    #[test]
    fn test_search_treats_sql_wildcards_literally() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("100% Pure", "Band", "Pop", "/p/1"));
        db.add_song(&new_song("Plain", "Band", "Pop", "/p/2"));

        assert_eq!(db.search_songs("%").len(), 1);
        assert!(db.search_songs("_").is_empty());
    }

    #[test]
    fn test_increment_play_count() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Song", "Art", "Gen", "path"));
        let id = song_ids(&db)[0];

        db.increment_play_count(id);
        db.increment_play_count(id);

        assert_eq!(db.get_all_songs()[0].play_count, 2);
    }

    #[test]
    fn test_increment_unknown_id_leaves_table_unchanged() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Song", "Art", "Gen", "path"));
        let before = db.get_all_songs();

        db.increment_play_count(9999);

        assert_eq!(db.get_all_songs(), before);
    }

    #[test]
    fn test_create_playlist_success() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("S1", "A1", "G1", "p1"));
        db.add_song(&new_song("S2", "A2", "G2", "p2"));
        let ids = song_ids(&db);

        assert!(db.create_playlist("My Mix", &ids));

        let playlists = db.get_playlists();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].name, "My Mix");
        let songs = db.get_playlist_songs(playlists[0].id);
        assert_eq!(songs.iter().map(|s| s.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_create_playlist_duplicate_name_writes_nothing() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("S1", "A1", "G1", "p1"));
        let ids = song_ids(&db);

        assert!(db.create_playlist("Gym", &[]));
        assert!(!db.create_playlist("Gym", &ids));

        assert_eq!(db.get_playlists().len(), 1);
        assert_eq!(association_count(&db), 0);
    }

    #[test]
    fn test_create_playlist_with_unknown_song_rolls_back() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("S1", "A1", "G1", "p1"));
        let mut ids = song_ids(&db);
        ids.push(4242);

        assert!(!db.create_playlist("Broken", &ids));

        assert!(db.get_playlists().is_empty());
        assert_eq!(association_count(&db), 0);
    }

    #[test]
    fn test_create_playlist_collapses_repeated_ids() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("S1", "A1", "G1", "p1"));
        let id = song_ids(&db)[0];

        assert!(db.create_playlist("Loop", &[id, id]));
        let playlist_id = db.get_playlists()[0].id;
        assert_eq!(db.get_playlist_songs(playlist_id).len(), 1);
    }

    #[test]
    fn test_get_playlists_empty() {
        let (_dir, db) = open_test_db();
        assert!(db.get_playlists().is_empty());
        assert!(db.get_playlist(1).is_none());
    }

    #[test]
    fn test_delete_playlist_keeps_library_songs() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("S1", "A1", "G1", "p1"));
        let id = song_ids(&db)[0];
        db.create_playlist("To Delete", &[id]);
        let playlist_id = db.get_playlists()[0].id;
        assert_eq!(db.get_playlist_songs(playlist_id).len(), 1);

        assert!(db.delete_playlist(playlist_id));

        assert!(db.get_playlists().is_empty());
        assert_eq!(association_count(&db), 0);
        assert_eq!(db.get_all_songs().len(), 1);
    }

    #[test]
    fn test_delete_unknown_playlist_is_noop() {
        let (_dir, db) = open_test_db();
        db.create_playlist("Stay", &[]);

        assert!(db.delete_playlist(999));
        assert_eq!(db.get_playlists().len(), 1);
    }

    #[test]
    fn test_get_song_by_meta_exact() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Hello", "Adele", "Pop", "/path/hello.mp3"));

        let song = db.get_song_by_meta("Hello", "Adele").expect("song should match");
        assert_eq!(song.file_path, "/path/hello.mp3");
    }

    #[test]
    fn test_get_song_by_meta_case_insensitive() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Hello", "Adele", "Pop", "/path/hello.mp3"));

        let song = db.get_song_by_meta("hello", "ADELE").expect("song should match");
        assert_eq!(song.title, "Hello");
    }

    #[test]
    fn test_get_song_by_meta_returns_first_inserted() {
        let (_dir, db) = open_test_db();
        db.add_song(&new_song("Hello", "Adele", "Pop", "/first.mp3"));
        db.add_song(&new_song("HELLO", "adele", "Pop", "/second.mp3"));

        let song = db.get_song_by_meta("Hello", "Adele").expect("song should match");
        assert_eq!(song.file_path, "/first.mp3");
    }

    #[test]
    fn test_get_song_by_meta_matches_missing_artist_as_unknown() {
        let (_dir, db) = open_test_db();
        db.add_song(&NewSong {
            title: "Mystery".to_string(),
            artist: None,
            genre: None,
            file_path: "/path/mystery.mp3".to_string(),
        });

        let song = db
            .get_song_by_meta("mystery", &crate::protocol::UNKNOWN_ARTIST.to_uppercase())
            .expect("song should match");
        assert_eq!(song.artist, None);
        assert!(db.get_song_by_meta("Mystery", "").is_none());
    }

    #[test]
    fn test_get_song_by_meta_not_found() {
        let (_dir, db) = open_test_db();
        assert!(db.get_song_by_meta("Nothing", "Nobody").is_none());
    }
}
