//! Facade over the external playback engine.
//!
//! The queue only ever asks for load/play/pause/stop and a volume level.
//! Volume arrives as a 0-100 percentage and is handed to the engine as a
//! 0.0-1.0 fraction.

use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::sync::broadcast::Sender;

use crate::protocol::{Message, PlaybackMessage};

pub const DEFAULT_VOLUME_PERCENT: u8 = 50;

/// Audio backend driven by the facade. Implementations report end of media by
/// publishing `PlaybackMessage::TrackFinished` on the bus.
pub trait PlaybackEngine {
    fn load(&mut self, path: &Path) -> Result<(), String>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    /// `volume` is a 0.0-1.0 fraction.
    fn set_volume(&mut self, volume: f32);
}

pub struct AudioPlayer {
    engine: Box<dyn PlaybackEngine>,
    volume: f32,
}

impl AudioPlayer {
    pub fn new(mut engine: Box<dyn PlaybackEngine>, volume_percent: u8) -> Self {
        let volume = percent_to_fraction(volume_percent);
        engine.set_volume(volume);
        Self { engine, volume }
    }

    pub fn load(&mut self, path: &Path) -> Result<(), String> {
        debug!("AudioPlayer: loading {}", path.display());
        self.engine.load(path)
    }

    pub fn play(&mut self) {
        self.engine.play();
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    /// Sets the volume from a percentage; values above 100 are clamped.
    pub fn set_volume(&mut self, percent: u8) {
        self.volume = percent_to_fraction(percent);
        self.engine.set_volume(self.volume);
    }

    pub fn volume_percent(&self) -> u8 {
        (self.volume * 100.0).round() as u8
    }
}

fn percent_to_fraction(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Playing,
    Paused,
    Stopped,
}

/// Headless engine: tracks transport state, logs it, and mirrors every
/// change onto the bus. It never decodes audio, so end of media only happens
/// when someone publishes `TrackFinished` for it.
pub struct LoggingEngine {
    bus_sender: Sender<Message>,
    loaded_path: Option<PathBuf>,
    state: EngineState,
}

impl LoggingEngine {
    pub fn new(bus_sender: Sender<Message>) -> Self {
        Self {
            bus_sender,
            loaded_path: None,
            state: EngineState::Idle,
        }
    }

    fn publish(&self, message: PlaybackMessage) {
        // No subscribers simply means nobody is listening yet.
        let _ = self.bus_sender.send(Message::Playback(message));
    }
}

impl PlaybackEngine for LoggingEngine {
    fn load(&mut self, path: &Path) -> Result<(), String> {
        if !path.exists() {
            return Err(format!("File not found: {}", path.display()));
        }
        info!("Loaded {}", path.display());
        self.loaded_path = Some(path.to_path_buf());
        self.state = EngineState::Stopped;
        self.publish(PlaybackMessage::TrackLoaded(path.to_path_buf()));
        Ok(())
    }

    fn play(&mut self) {
        match &self.loaded_path {
            Some(path) => {
                info!("Playing {}", path.display());
                self.state = EngineState::Playing;
                self.publish(PlaybackMessage::Playing);
            }
            None => debug!("Play requested with nothing loaded"),
        }
    }

    fn pause(&mut self) {
        if self.state == EngineState::Playing {
            info!("Paused");
            self.state = EngineState::Paused;
            self.publish(PlaybackMessage::Paused);
        }
    }

    fn stop(&mut self) {
        if matches!(self.state, EngineState::Playing | EngineState::Paused) {
            info!("Stopped");
            self.state = EngineState::Stopped;
            self.publish(PlaybackMessage::Stopped);
        }
    }

    fn set_volume(&mut self, volume: f32) {
        debug!("Volume set to {:.2}", volume);
        self.publish(PlaybackMessage::VolumeChanged(volume));
    }
}
