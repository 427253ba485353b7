//! Application state shared by every user-facing command.
//!
//! `MusicApp` owns the storage engine, the play queue and the playback
//! facade, and performs the side effects queue navigation asks for: loading
//! and playing the file, then counting the play in storage.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::sync::broadcast::{error::TryRecvError, Receiver, Sender};

use crate::audio_player::{AudioPlayer, PlaybackEngine};
use crate::config::{self, Config};
use crate::db_manager::DbManager;
use crate::media_file_discovery;
use crate::metadata_tags::{self, TagReader};
use crate::playback_queue::PlaybackQueue;
use crate::playlist_io;
use crate::protocol::{Message, PlaybackMessage, PlaylistInfo, Song};

/// Outcome of importing a playlist file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub playlist_name: String,
    pub matched: usize,
    pub unmatched: usize,
}

/// Outcome of cataloguing a music folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderReport {
    pub added: usize,
    pub skipped_files: usize,
    pub unreadable: Vec<PathBuf>,
}

pub struct MusicApp {
    db: DbManager,
    queue: PlaybackQueue,
    player: AudioPlayer,
    tag_reader: Box<dyn TagReader>,
    bus_sender: Sender<Message>,
    bus_receiver: Receiver<Message>,
    config: Config,
    config_path: Option<PathBuf>,
}

impl MusicApp {
    pub fn new(
        db: DbManager,
        engine: Box<dyn PlaybackEngine>,
        tag_reader: Box<dyn TagReader>,
        bus_sender: Sender<Message>,
        config: Config,
        config_path: Option<PathBuf>,
    ) -> Self {
        let player = AudioPlayer::new(engine, config.playback.volume);
        let bus_receiver = bus_sender.subscribe();
        Self {
            db,
            queue: PlaybackQueue::new(),
            player,
            tag_reader,
            bus_sender,
            bus_receiver,
            config,
            config_path,
        }
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn now_playing(&self) -> Option<&Song> {
        self.queue.current_song()
    }

    // ---- library ----

    /// Catalogues each file, reading its tags. Returns how many were stored
    /// (already-known paths count as stored).
    pub fn add_files(&mut self, paths: &[PathBuf]) -> usize {
        let mut count = 0;
        for path in paths {
            let tags = self.tag_reader.read_tags(path);
            let song = metadata_tags::song_from_tags(path, tags);
            if self.db.add_song(&song) {
                count += 1;
            }
        }
        info!("Added {} of {} files to the library", count, paths.len());
        count
    }

    /// Catalogues every audio file below `folder`, reporting what was left out.
    pub fn add_folder(&mut self, folder: &Path) -> FolderReport {
        let scan = media_file_discovery::scan_music_folder(folder);
        FolderReport {
            added: self.add_files(&scan.audio_files),
            skipped_files: scan.skipped_files,
            unreadable: scan.unreadable,
        }
    }

    /// Whole library for a blank term, otherwise the title/artist search.
    pub fn library_view(&self, term: &str) -> Vec<Song> {
        if term.trim().is_empty() {
            self.db.get_all_songs()
        } else {
            self.db.search_songs(term.trim())
        }
    }

    pub fn statistics(&self) -> String {
        self.db.get_statistics()
    }

    // ---- queue ----

    pub fn enqueue(&mut self, songs: Vec<Song>) {
        self.queue.append_many(songs);
        debug!("Queue now holds {} tracks", self.queue.len());
    }

    pub fn remove_from_queue(&mut self, indices: &[usize]) -> usize {
        let was_playing = self.queue.current_track().map(|track| track.queue_id);
        let removed = self.queue.remove(indices);
        if was_playing.is_some() && self.queue.current_track().is_none() {
            self.player.stop();
        }
        removed
    }

    pub fn shuffle_queue(&mut self) {
        self.queue.shuffle();
    }

    pub fn clear_queue(&mut self) {
        if self.queue.current_track().is_some() {
            self.player.stop();
        }
        self.queue.clear();
    }

    // ---- playback ----

    /// Loads and plays the current queue entry, then counts the play.
    /// Does nothing when no entry is current.
    pub fn play_current(&mut self) -> Result<Option<Song>, String> {
        let Some(song) = self.queue.current_song().cloned() else {
            return Ok(None);
        };
        self.player.load(&song.path())?;
        self.player.play();
        self.db.increment_play_count(song.id);
        info!("Now playing: {}", song.display_name());
        Ok(Some(song))
    }

    pub fn play_at(&mut self, index: usize) -> Result<Option<Song>, String> {
        if self.queue.select(index).is_none() {
            return Err(format!("No queue entry at position {}", index + 1));
        }
        self.play_current()
    }

    pub fn next(&mut self) -> Result<Option<Song>, String> {
        if self.queue.move_next().is_none() {
            return Ok(None);
        }
        self.play_current()
    }

    pub fn previous(&mut self) -> Result<Option<Song>, String> {
        if self.queue.move_previous().is_none() {
            return Ok(None);
        }
        self.play_current()
    }

    /// End of media: keep going with the next entry, wrapping at the end.
    pub fn on_track_finished(&mut self) -> Result<Option<Song>, String> {
        debug!("Track finished, advancing queue");
        self.next()
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn resume(&mut self) {
        self.player.play();
    }

    pub fn stop(&mut self) {
        self.player.stop();
    }

    pub fn volume_percent(&self) -> u8 {
        self.player.volume_percent()
    }

    /// Applies and persists a 0-100 volume.
    pub fn set_volume(&mut self, percent: u8) {
        self.player.set_volume(percent);
        self.config.playback.volume = self.player.volume_percent();
        if let Some(path) = &self.config_path {
            if let Err(err) = config::save_config(path, &self.config) {
                warn!("{}", err);
            }
        }
    }

    /// Publishes end of media on behalf of an engine that cannot detect it.
    pub fn notify_track_finished(&self) {
        if let Err(err) = self
            .bus_sender
            .send(Message::Playback(PlaybackMessage::TrackFinished))
        {
            warn!("Failed to publish track finished: {}", err);
        }
    }

    /// Handles every pending bus message. Returns how many were processed, or
    /// the first failure to advance to the next track.
    pub fn pump_events(&mut self) -> Result<usize, String> {
        let mut handled = 0;
        let mut first_error = None;
        loop {
            match self.bus_receiver.try_recv() {
                Ok(Message::Playback(PlaybackMessage::TrackFinished)) => {
                    handled += 1;
                    if let Err(err) = self.on_track_finished() {
                        warn!("Could not advance to the next track: {}", err);
                        first_error.get_or_insert(err);
                    }
                }
                Ok(Message::Playback(message)) => {
                    handled += 1;
                    debug!("Playback event: {:?}", message);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Event bus lagged, skipped {} messages", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(handled),
        }
    }

    // ---- playlists ----

    pub fn playlists(&self) -> Vec<PlaylistInfo> {
        self.db.get_playlists()
    }

    pub fn playlist_songs(&self, playlist_id: i64) -> Vec<Song> {
        self.db.get_playlist_songs(playlist_id)
    }

    pub fn create_playlist(&self, name: &str, song_ids: &[i64]) -> bool {
        self.db.create_playlist(name, song_ids)
    }

    /// Saves the queued songs (each once) as a named playlist.
    pub fn save_queue_as_playlist(&self, name: &str) -> Result<(), String> {
        if self.db.get_playlists().iter().any(|playlist| playlist.name == name) {
            return Err(format!("A playlist named '{}' already exists", name));
        }
        if self.db.create_playlist(name, &self.queue.song_ids()) {
            Ok(())
        } else {
            Err(format!("Could not save playlist '{}'", name))
        }
    }

    /// Appends a stored playlist to the queue. Returns the number of songs added.
    pub fn load_playlist(&mut self, playlist_id: i64) -> Result<usize, String> {
        if self.db.get_playlist(playlist_id).is_none() {
            return Err(format!("Playlist {} not found", playlist_id));
        }
        let songs = self.db.get_playlist_songs(playlist_id);
        let count = songs.len();
        self.queue.insert_from_playlist(songs);
        Ok(count)
    }

    pub fn delete_playlist(&self, playlist_id: i64) -> bool {
        self.db.delete_playlist(playlist_id)
    }

    /// Creates a playlist from an interchange file, matching entries against the
    /// library by title and artist. Nothing is written if the file is malformed.
    pub fn import_playlist(&self, path: &Path, name: Option<&str>) -> Result<ImportReport, String> {
        let entries = playlist_io::read_playlist_file(path)?;
        let playlist_name = name
            .map(str::to_string)
            .unwrap_or_else(|| playlist_io::playlist_name_from_path(path));

        let mut song_ids = Vec::new();
        let mut seen = HashSet::new();
        let mut unmatched = 0;
        for entry in &entries {
            match self.db.get_song_by_meta(&entry.title, &entry.artist) {
                Some(song) => {
                    if seen.insert(song.id) {
                        song_ids.push(song.id);
                    }
                }
                None => {
                    debug!("No library match for {} - {}", entry.title, entry.artist);
                    unmatched += 1;
                }
            }
        }

        if !self.db.create_playlist(&playlist_name, &song_ids) {
            return Err(format!("Could not create playlist '{}'", playlist_name));
        }
        Ok(ImportReport {
            playlist_name,
            matched: song_ids.len(),
            unmatched,
        })
    }

    /// Writes the playlist's title/artist pairs. Returns how many were written.
    pub fn export_playlist(&self, playlist_id: i64, path: &Path) -> Result<usize, String> {
        if self.db.get_playlist(playlist_id).is_none() {
            return Err(format!("Playlist {} not found", playlist_id));
        }
        let entries = playlist_io::entries_from_songs(&self.db.get_playlist_songs(playlist_id));
        playlist_io::write_playlist_file(path, &entries)?;
        Ok(entries.len())
    }
}
