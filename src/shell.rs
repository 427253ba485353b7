//! Line-oriented front end: turns typed commands into `MusicApp` calls and
//! renders their results as text.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use log::debug;

use crate::app_runtime::MusicApp;
use crate::protocol::Song;

const HELP_TEXT: &str = "\
Library:
  add <file>...             add audio files to the library
  add-dir <folder>          add every audio file under a folder
  list [term]               show the library, optionally filtered by title/artist
  stats                     show listening statistics
Queue:
  queue <row>...            queue rows from the last list
  queue-all                 queue every row from the last list
  show                      show the queue
  remove <pos>...           remove queue positions
  shuffle                   shuffle the queue
  clear                     empty the queue
Playback:
  play [pos]                play a queue position (or the current one)
  next | prev               move through the queue
  pause | resume | stop     transport controls
  volume [0-100]            show or set the volume
  finish                    signal that the current track ended
  now                       show the current track
Playlists:
  playlists                 list saved playlists
  save <name>               save the queue as a playlist
  open <id>                 show a playlist's songs
  load <id>                 append a playlist to the queue
  delete <id>               delete a playlist
  import <file> [name]      import a playlist file
  export <id> <file>        export a playlist file
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Add(Vec<PathBuf>),
    AddDir(PathBuf),
    List(String),
    Stats,
    Queue(Vec<usize>),
    QueueAll,
    Show,
    Remove(Vec<usize>),
    Shuffle,
    Clear,
    Play(Option<usize>),
    Next,
    Previous,
    Pause,
    Resume,
    Stop,
    Volume(Option<u8>),
    Finish,
    Now,
    Playlists,
    Save(String),
    Open(i64),
    Load(i64),
    Delete(i64),
    Import(PathBuf, Option<String>),
    Export(i64, PathBuf),
}

/// Splits on whitespace, keeping double-quoted sections together.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            ch if ch.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            ch => {
                current.push(ch);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err("Unterminated quote".to_string());
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_positions(args: &[String]) -> Result<Vec<usize>, String> {
    if args.is_empty() {
        return Err("Expected at least one position".to_string());
    }
    args.iter()
        .map(|arg| match arg.parse::<usize>() {
            Ok(position) if position > 0 => Ok(position - 1),
            _ => Err(format!("Invalid position: {}", arg)),
        })
        .collect()
}

fn parse_id(args: &[String]) -> Result<i64, String> {
    let arg = args.first().ok_or_else(|| "Expected a playlist id".to_string())?;
    arg.parse::<i64>()
        .map_err(|_| format!("Invalid playlist id: {}", arg))
}

pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let tokens = tokenize(line)?;
    let Some((name, args)) = tokens.split_first() else {
        return Ok(None);
    };

    let command = match name.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "add" => {
            if args.is_empty() {
                return Err("Usage: add <file>...".to_string());
            }
            Command::Add(args.iter().map(PathBuf::from).collect())
        }
        "add-dir" => match args.first() {
            Some(folder) => Command::AddDir(PathBuf::from(folder)),
            None => return Err("Usage: add-dir <folder>".to_string()),
        },
        "list" | "search" => Command::List(args.join(" ")),
        "stats" => Command::Stats,
        "queue" => Command::Queue(parse_positions(args)?),
        "queue-all" => Command::QueueAll,
        "show" => Command::Show,
        "remove" => Command::Remove(parse_positions(args)?),
        "shuffle" => Command::Shuffle,
        "clear" => Command::Clear,
        "play" => {
            if args.is_empty() {
                Command::Play(None)
            } else {
                Command::Play(parse_positions(args)?.first().copied())
            }
        }
        "next" => Command::Next,
        "prev" | "previous" => Command::Previous,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "volume" => match args.first() {
            None => Command::Volume(None),
            Some(arg) => match arg.parse::<u8>() {
                Ok(level) if level <= 100 => Command::Volume(Some(level)),
                _ => return Err(format!("Volume must be 0-100, got {}", arg)),
            },
        },
        "finish" => Command::Finish,
        "now" => Command::Now,
        "playlists" => Command::Playlists,
        "save" => {
            let playlist_name = args.join(" ");
            if playlist_name.trim().is_empty() {
                return Err("Usage: save <name>".to_string());
            }
            Command::Save(playlist_name)
        }
        "open" => Command::Open(parse_id(args)?),
        "load" => Command::Load(parse_id(args)?),
        "delete" => Command::Delete(parse_id(args)?),
        "import" => match args.split_first() {
            Some((file, rest)) => {
                let playlist_name = rest.join(" ");
                Command::Import(
                    PathBuf::from(file),
                    (!playlist_name.trim().is_empty()).then_some(playlist_name),
                )
            }
            None => return Err("Usage: import <file> [name]".to_string()),
        },
        "export" => match args {
            [id, file] => Command::Export(parse_id(std::slice::from_ref(id))?, PathBuf::from(file)),
            _ => return Err("Usage: export <id> <file>".to_string()),
        },
        other => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
    };
    Ok(Some(command))
}

fn render_songs(songs: &[Song], current: Option<usize>) -> String {
    if songs.is_empty() {
        return "(empty)".to_string();
    }
    songs
        .iter()
        .enumerate()
        .map(|(index, song)| {
            let marker = if current == Some(index) { ">" } else { " " };
            format!(
                "{}{:>3}. {} [{} plays]",
                marker,
                index + 1,
                song.display_name(),
                song.play_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_playing(result: Result<Option<Song>, String>) -> String {
    match result {
        Ok(Some(song)) => format!("Playing: {}", song.title),
        Ok(None) => "Queue is empty".to_string(),
        Err(err) => format!("Error: {}", err),
    }
}

pub enum ShellOutcome {
    Continue(String),
    Quit,
}

pub struct Shell {
    app: MusicApp,
    last_view: Vec<Song>,
}

impl Shell {
    pub fn new(app: MusicApp) -> Self {
        Self {
            app,
            last_view: Vec::new(),
        }
    }

    pub fn execute(&mut self, command: Command) -> ShellOutcome {
        let output = match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::Quit => {
                self.app.stop();
                return ShellOutcome::Quit;
            }
            Command::Add(paths) => {
                let count = self.app.add_files(&paths);
                format!("Added {} songs with metadata!", count)
            }
            Command::AddDir(folder) => {
                let report = self.app.add_folder(&folder);
                let mut lines = vec![format!("Added {} songs with metadata!", report.added)];
                if report.skipped_files > 0 {
                    lines.push(format!("Skipped {} non-audio files", report.skipped_files));
                }
                lines.extend(
                    report
                        .unreadable
                        .iter()
                        .map(|path| format!("Could not read {}", path.display())),
                );
                lines.join("\n")
            }
            Command::List(term) => {
                self.last_view = self.app.library_view(&term);
                render_songs(&self.last_view, None)
            }
            Command::Stats => self.app.statistics(),
            Command::Queue(rows) => {
                let mut picked = Vec::new();
                for row in rows {
                    match self.last_view.get(row) {
                        Some(song) => picked.push(song.clone()),
                        None => return ShellOutcome::Continue(format!("No row {} in the last list", row + 1)),
                    }
                }
                let count = picked.len();
                self.app.enqueue(picked);
                format!("Queued {} songs", count)
            }
            Command::QueueAll => {
                let count = self.last_view.len();
                self.app.enqueue(self.last_view.clone());
                format!("Queued {} songs", count)
            }
            Command::Show => {
                let queue = self.app.queue();
                let songs: Vec<Song> = queue.tracks().iter().map(|track| track.song.clone()).collect();
                render_songs(&songs, queue.current_index())
            }
            Command::Remove(positions) => {
                let removed = self.app.remove_from_queue(&positions);
                format!("Removed {} songs from the queue", removed)
            }
            Command::Shuffle => {
                self.app.shuffle_queue();
                "Queue shuffled".to_string()
            }
            Command::Clear => {
                self.app.clear_queue();
                "Queue cleared".to_string()
            }
            Command::Play(Some(position)) => render_playing(self.app.play_at(position)),
            Command::Play(None) => {
                if self.app.now_playing().is_some() {
                    render_playing(self.app.play_current())
                } else {
                    render_playing(self.app.next())
                }
            }
            Command::Next => render_playing(self.app.next()),
            Command::Previous => render_playing(self.app.previous()),
            Command::Pause => {
                self.app.pause();
                "Paused".to_string()
            }
            Command::Resume => {
                self.app.resume();
                "Resumed".to_string()
            }
            Command::Stop => {
                self.app.stop();
                "Stopped".to_string()
            }
            Command::Volume(Some(level)) => {
                self.app.set_volume(level);
                format!("Volume: {}%", self.app.volume_percent())
            }
            Command::Volume(None) => format!("Volume: {}%", self.app.volume_percent()),
            Command::Finish => {
                self.app.notify_track_finished();
                match self.app.pump_events() {
                    Err(err) => format!("Error: {}", err),
                    Ok(_) => match self.app.now_playing() {
                        Some(song) => format!("Playing: {}", song.title),
                        None => "Queue is empty".to_string(),
                    },
                }
            }
            Command::Now => match self.app.now_playing() {
                Some(song) => format!("Playing: {}", song.display_name()),
                None => "Ready to play".to_string(),
            },
            Command::Playlists => {
                let playlists = self.app.playlists();
                if playlists.is_empty() {
                    "(no playlists)".to_string()
                } else {
                    playlists
                        .iter()
                        .map(|playlist| format!("{:>4}  {}", playlist.id, playlist.name))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::Save(name) => {
                match self.app.save_queue_as_playlist(&name) {
                    Ok(()) => format!("Saved playlist '{}'", name),
                    Err(err) => format!("Error: {}", err),
                }
            }
            Command::Open(id) => {
                self.last_view = self.app.playlist_songs(id);
                render_songs(&self.last_view, None)
            }
            Command::Load(id) => match self.app.load_playlist(id) {
                Ok(count) => format!("Queued {} songs", count),
                Err(err) => format!("Error: {}", err),
            },
            Command::Delete(id) => {
                if self.app.delete_playlist(id) {
                    format!("Deleted playlist {}", id)
                } else {
                    format!("Error: could not delete playlist {}", id)
                }
            }
            Command::Import(path, name) => match self.app.import_playlist(&path, name.as_deref()) {
                Ok(report) if report.unmatched > 0 => format!(
                    "Imported '{}' with {} songs; {} not found in the library",
                    report.playlist_name, report.matched, report.unmatched
                ),
                Ok(report) => format!(
                    "Imported '{}' with {} songs",
                    report.playlist_name, report.matched
                ),
                Err(err) => format!("Error: {}", err),
            },
            Command::Export(id, path) => match self.app.export_playlist(id, &path) {
                Ok(count) => format!("Exported {} songs to {}", count, path.display()),
                Err(err) => format!("Error: {}", err),
            },
        };
        ShellOutcome::Continue(output)
    }

    /// Reads commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> std::io::Result<()> {
        write!(output, "> ")?;
        output.flush()?;
        for line in input.lines() {
            let line = line?;
            if let Err(err) = self.app.pump_events() {
                writeln!(output, "Error: {}", err)?;
            }
            match parse_command(&line) {
                Ok(Some(command)) => {
                    debug!("Executing {:?}", command);
                    match self.execute(command) {
                        ShellOutcome::Continue(text) => writeln!(output, "{}", text)?,
                        ShellOutcome::Quit => return Ok(()),
                    }
                }
                Ok(None) => {}
                Err(err) => writeln!(output, "{}", err)?,
            }
            write!(output, "> ")?;
            output.flush()?;
        }
        self.app.stop();
        Ok(())
    }
}
