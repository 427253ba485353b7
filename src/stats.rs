//! Listening statistics derived from stored play counts.

use rusqlite::{params, Connection, OptionalExtension};

use crate::protocol::UNKNOWN_ARTIST;

/// Most played single song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopSong {
    pub title: String,
    pub artist: String,
    pub play_count: i64,
}

/// Winner of a grouped play-count ranking (artist or genre).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopGroup {
    pub name: String,
    pub play_count: i64,
}

/// Rankings shown in the statistics report. `None` means no plays recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryStatistics {
    pub top_song: Option<TopSong>,
    pub top_artist: Option<TopGroup>,
    pub top_genre: Option<TopGroup>,
}

/// Computes all three rankings. Ties go to the earliest inserted song.
pub fn query_statistics(conn: &Connection) -> Result<LibraryStatistics, rusqlite::Error> {
    let top_song = conn
        .query_row(
            "SELECT title, artist, play_count FROM songs
             WHERE play_count > 0
             ORDER BY play_count DESC, id ASC
             LIMIT 1",
            [],
            |row| {
                Ok(TopSong {
                    title: row.get(0)?,
                    artist: row
                        .get::<_, Option<String>>(1)?
                        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
                    play_count: row.get(2)?,
                })
            },
        )
        .optional()?;

    // The placeholder artist collects every untagged file, so it is never ranked.
    let top_artist = conn
        .query_row(
            "SELECT artist, SUM(play_count) AS total FROM songs
             WHERE artist IS NOT NULL AND artist != ?1
             GROUP BY artist
             HAVING SUM(play_count) > 0
             ORDER BY SUM(play_count) DESC, MIN(id) ASC
             LIMIT 1",
            params![UNKNOWN_ARTIST],
            top_group_from_row,
        )
        .optional()?;

    let top_genre = conn
        .query_row(
            "SELECT genre, SUM(play_count) AS total FROM songs
             WHERE genre IS NOT NULL
             GROUP BY genre
             HAVING SUM(play_count) > 0
             ORDER BY SUM(play_count) DESC, MIN(id) ASC
             LIMIT 1",
            [],
            top_group_from_row,
        )
        .optional()?;

    Ok(LibraryStatistics {
        top_song,
        top_artist,
        top_genre,
    })
}

fn top_group_from_row(row: &rusqlite::Row<'_>) -> Result<TopGroup, rusqlite::Error> {
    Ok(TopGroup {
        name: row.get(0)?,
        play_count: row.get(1)?,
    })
}

/// Renders the fixed report layout: song, artist, then genre sections.
pub fn render_report(statistics: &LibraryStatistics) -> String {
    let song_line = statistics
        .top_song
        .as_ref()
        .map(|song| {
            format!(
                "{} - {} ({} times streamed)",
                song.title, song.artist, song.play_count
            )
        })
        .unwrap_or_else(|| "no data".to_string());

    format!(
        "=== STATS ===\n\nTop song:\n{}\n\nTop artist:\n{}\n\nTop genre:\n{}\n",
        song_line,
        render_group(statistics.top_artist.as_ref()),
        render_group(statistics.top_genre.as_ref()),
    )
}

fn render_group(group: Option<&TopGroup>) -> String {
    match group {
        Some(group) => format!("{} ({} times streamed)", group.name, group.play_count),
        None => "no data".to_string(),
    }
}
