//! Playlist interchange files: a JSON array of `{ "title", "artist" }` records.

use std::path::Path;

use crate::protocol::{PlaylistEntry, Song};

pub fn parse_playlist_entries(content: &str) -> Result<Vec<PlaylistEntry>, String> {
    serde_json::from_str::<Vec<PlaylistEntry>>(content)
        .map_err(|err| format!("Invalid playlist file: {}", err))
}

pub fn read_playlist_file(path: &Path) -> Result<Vec<PlaylistEntry>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {}", path.display(), err))?;
    parse_playlist_entries(&content)
}

/// Interchange records for `songs`; ids and play counts are never exported.
pub fn entries_from_songs(songs: &[Song]) -> Vec<PlaylistEntry> {
    songs
        .iter()
        .map(|song| PlaylistEntry {
            title: song.title.clone(),
            artist: song.artist_or_unknown().to_string(),
        })
        .collect()
}

pub fn write_playlist_file(path: &Path, entries: &[PlaylistEntry]) -> Result<(), String> {
    let content = serde_json::to_string_pretty(entries)
        .map_err(|err| format!("Failed to serialize playlist: {}", err))?;
    std::fs::write(path, content)
        .map_err(|err| format!("Failed to write {}: {}", path.display(), err))
}

/// Playlist name suggested by an import file: its stem, or `Imported Playlist`.
pub fn playlist_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "Imported Playlist".to_string())
}
