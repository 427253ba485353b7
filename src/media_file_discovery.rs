//! Finds the audio files under a music folder for library import.

use std::path::{Path, PathBuf};

use log::{debug, warn};

/// File extensions catalogued as songs, compared case-insensitively.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "aac", "m4a", "mp4"];

/// Result of walking a music folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderScan {
    /// Audio files, sorted by path.
    pub audio_files: Vec<PathBuf>,
    /// Regular files without an audio extension, plus special files.
    pub skipped_files: usize,
    /// Directories or entries that could not be listed or inspected.
    pub unreadable: Vec<PathBuf>,
}

pub fn has_audio_extension(path: &Path) -> bool {
    let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    let extension = extension.to_ascii_lowercase();
    AUDIO_EXTENSIONS.contains(&extension.as_str())
}

/// Walks `root` and everything below it. A missing or unlistable root shows up
/// in `unreadable` rather than as an error.
pub fn scan_music_folder(root: &Path) -> FolderScan {
    let mut scan = FolderScan::default();
    scan_directory(root, &mut scan);
    scan.audio_files.sort();
    debug!(
        "Scanned {}: {} audio, {} skipped, {} unreadable",
        root.display(),
        scan.audio_files.len(),
        scan.skipped_files,
        scan.unreadable.len()
    );
    scan
}

fn scan_directory(directory: &Path, scan: &mut FolderScan) {
    let listing = match std::fs::read_dir(directory) {
        Ok(listing) => listing,
        Err(err) => {
            warn!("Cannot list {}: {}", directory.display(), err);
            scan.unreadable.push(directory.to_path_buf());
            return;
        }
    };

    let mut subdirectories = Vec::new();
    for entry in listing {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Unreadable entry in {}: {}", directory.display(), err);
                scan.unreadable.push(directory.to_path_buf());
                continue;
            }
        };
        let path = entry.path();
        match entry.file_type() {
            Ok(kind) if kind.is_dir() => subdirectories.push(path),
            Ok(kind) if kind.is_file() && has_audio_extension(&path) => scan.audio_files.push(path),
            Ok(_) => scan.skipped_files += 1,
            Err(err) => {
                warn!("Cannot inspect {}: {}", path.display(), err);
                scan.unreadable.push(path);
            }
        }
    }

    for subdirectory in subdirectories {
        scan_directory(&subdirectory, scan);
    }
}
