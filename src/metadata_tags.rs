//! Tag reading backed by `lofty`, with filename and placeholder fallbacks.

use std::path::Path;

use lofty::file::TaggedFileExt;
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::Tag;
use log::debug;

use crate::protocol::{NewSong, UNKNOWN_ARTIST, UNKNOWN_GENRE};

/// Tag values found in a file. Absent or blank tags are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
}

/// Source of embedded tags for a media file.
pub trait TagReader {
    /// Returns `None` when the file cannot be read or carries no tags.
    fn read_tags(&self, path: &Path) -> Option<SongTags>;
}

/// Reads tags from the file itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Option<SongTags> {
        let tagged_file = match read_from_path(path) {
            Ok(tagged_file) => tagged_file,
            Err(err) => {
                debug!("Could not read tags from {}: {}", path.display(), err);
                return None;
            }
        };
        let primary_tag = tagged_file.primary_tag();
        let tags = tagged_file.tags();

        let song_tags = SongTags {
            title: first_non_empty_value(primary_tag, tags, |tag| {
                tag.title().map(|value| value.into_owned())
            }),
            artist: first_non_empty_value(primary_tag, tags, |tag| {
                tag.artist().map(|value| value.into_owned())
            }),
            genre: first_non_empty_value(primary_tag, tags, |tag| {
                tag.genre().map(|value| value.into_owned())
            }),
        };
        (song_tags != SongTags::default()).then_some(song_tags)
    }
}

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> Option<String>
where
    F: FnMut(&Tag) -> Option<String>,
{
    primary_tag
        .into_iter()
        .chain(tags.iter())
        .filter_map(|tag| extractor(tag))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn title_from_file_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Builds the library record for `path`, filling gaps in `tags` with the file
/// stem and the placeholder artist/genre.
pub fn song_from_tags(path: &Path, tags: Option<SongTags>) -> NewSong {
    let tags = tags.unwrap_or_default();
    NewSong {
        title: tags.title.unwrap_or_else(|| title_from_file_name(path)),
        artist: Some(tags.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string())),
        genre: Some(tags.genre.unwrap_or_else(|| UNKNOWN_GENRE.to_string())),
        file_path: path.to_string_lossy().into_owned(),
    }
}
