//! Shared records and the event-bus protocol exchanged between runtime components.
//!
//! Storage rows, playlist interchange entries and playback notifications all
//! live here so the queue, the storage engine and the playback facade agree on
//! one vocabulary.

use std::path::PathBuf;

/// Artist placeholder written when a file carries no artist tag.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Genre placeholder written when a file carries no genre tag.
pub const UNKNOWN_GENRE: &str = "Unknown Genre";

/// One row of the `songs` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub file_path: String,
    pub play_count: i64,
}

impl Song {
    /// Artist name for display, substituting the placeholder for a missing value.
    pub fn artist_or_unknown(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }

    /// `Title - Artist` label used by list views and reports.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.title, self.artist_or_unknown())
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.file_path)
    }
}

/// Metadata supplied when inserting a new song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSong {
    pub title: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub file_path: String,
}

/// One row of the `playlists` relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: i64,
    pub name: String,
}

/// Interchange record used by playlist import/export files.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PlaylistEntry {
    pub title: String,
    pub artist: String,
}

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Playback(PlaybackMessage),
}

/// Notifications published by the playback engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackMessage {
    /// A file was handed to the engine.
    TrackLoaded(PathBuf),
    Playing,
    Paused,
    Stopped,
    /// Volume as a 0.0-1.0 fraction.
    VolumeChanged(f32),
    /// The engine reached the end of the current media.
    TrackFinished,
}
