//! In-memory play queue: ordered song snapshots plus a "now playing" pointer.
//!
//! The queue never talks to storage or the audio engine. Navigation returns
//! the song that should start playing and the caller performs the side
//! effects. Each queued entry gets a queue-local id so the pointer can follow
//! its track through a shuffle.

use log::warn;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::protocol::Song;

/// A song snapshot taken when it entered the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrack {
    pub queue_id: u64,
    pub song: Song,
}

pub struct PlaybackQueue {
    tracks: Vec<QueuedTrack>,
    current_index: Option<usize>,
    next_queue_id: u64,
    rng_seed: [u8; 32],
}

impl PlaybackQueue {
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        if let Err(err) = getrandom::fill(&mut seed) {
            warn!("Failed to generate random shuffle seed, using time-based seed: {}", err);
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos())
                .unwrap_or_default();
            seed[..16].copy_from_slice(&nanos.to_le_bytes());
        }
        Self::with_seed(seed)
    }

    pub fn with_seed(rng_seed: [u8; 32]) -> Self {
        Self {
            tracks: Vec::new(),
            current_index: None,
            next_queue_id: 0,
            rng_seed,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[QueuedTrack] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_track(&self) -> Option<&QueuedTrack> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.current_track().map(|track| &track.song)
    }

    /// Library ids of the queued songs, first occurrence order, without repeats.
    pub fn song_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            if !ids.contains(&track.song.id) {
                ids.push(track.song.id);
            }
        }
        ids
    }

    pub fn append(&mut self, song: Song) {
        let queue_id = self.next_queue_id;
        self.next_queue_id += 1;
        self.tracks.push(QueuedTrack { queue_id, song });
    }

    pub fn append_many<I>(&mut self, songs: I)
    where
        I: IntoIterator<Item = Song>,
    {
        for song in songs {
            self.append(song);
        }
    }

    /// Appends a stored playlist's songs in the order storage returned them.
    pub fn insert_from_playlist(&mut self, songs: Vec<Song>) {
        self.append_many(songs);
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = None;
    }

    /// Deletes the tracks at `indices`. Out-of-range and repeated indices are ignored.
    ///
    /// Removing the current track unsets the pointer; otherwise the pointer
    /// keeps following its track. Returns the number of removed tracks.
    pub fn remove(&mut self, indices: &[usize]) -> usize {
        let mut doomed: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|index| *index < self.tracks.len())
            .collect();
        doomed.sort_unstable();
        doomed.dedup();

        if let Some(current) = self.current_index {
            self.current_index = if doomed.binary_search(&current).is_ok() {
                None
            } else {
                let removed_before = doomed.iter().filter(|index| **index < current).count();
                Some(current - removed_before)
            };
        }

        for index in doomed.iter().rev() {
            self.tracks.remove(*index);
        }
        if self.tracks.is_empty() {
            self.current_index = None;
        }
        doomed.len()
    }

    /// Randomly reorders the whole queue. The pointer stays on the same track.
    pub fn shuffle(&mut self) {
        let playing_id = self.current_track().map(|track| track.queue_id);

        let mut rng = StdRng::from_seed(self.rng_seed);
        self.tracks.shuffle(&mut rng);
        self.rng_seed = rng.gen();

        self.current_index = playing_id.and_then(|queue_id| {
            self.tracks
                .iter()
                .position(|track| track.queue_id == queue_id)
        });
    }

    /// Points at `index` and returns its song, or `None` if out of range.
    pub fn select(&mut self, index: usize) -> Option<&Song> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current_index = Some(index);
        self.current_song()
    }

    /// Advances circularly. An unset pointer starts at the first track.
    pub fn move_next(&mut self) -> Option<&Song> {
        if self.tracks.is_empty() {
            return None;
        }
        let next_index = match self.current_index {
            Some(index) if index + 1 < self.tracks.len() => index + 1,
            _ => 0,
        };
        self.current_index = Some(next_index);
        self.current_song()
    }

    /// Steps back circularly. An unset pointer starts at the last track.
    pub fn move_previous(&mut self) -> Option<&Song> {
        if self.tracks.is_empty() {
            return None;
        }
        let last_index = self.tracks.len() - 1;
        let previous_index = match self.current_index {
            Some(index) if index > 0 && index <= last_index => index - 1,
            _ => last_index,
        };
        self.current_index = Some(previous_index);
        self.current_song()
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}
