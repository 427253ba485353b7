mod app_runtime;
mod audio_player;
mod config;
mod db_manager;
mod media_file_discovery;
mod metadata_tags;
mod playback_queue;
mod playlist_io;
mod protocol;
mod shell;
mod stats;

use app_runtime::MusicApp;
use audio_player::LoggingEngine;
use db_manager::DbManager;
use log::info;
use metadata_tags::LoftyTagReader;
use shell::Shell;
use tokio::sync::broadcast;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Debug);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_path = config::default_config_path();
    let config = match &config_path {
        Some(path) => config::load_or_create_config(path),
        None => {
            log::warn!("No config directory available, using defaults");
            config::Config::default()
        }
    };

    let db_manager = DbManager::new(&config.database_path())?;
    info!("Library opened at {}", db_manager.db_path().display());

    // Bus for communication between the playback engine and the app
    let (bus_sender, _) = broadcast::channel(256);
    let engine = LoggingEngine::new(bus_sender.clone());

    let app = MusicApp::new(
        db_manager,
        Box::new(engine),
        Box::new(LoftyTagReader),
        bus_sender,
        config,
        config_path,
    );

    println!("Spoopify - type 'help' for commands");
    let mut shell = Shell::new(app);
    let stdin = std::io::stdin();
    shell.run(stdin.lock(), std::io::stdout())?;

    info!("Application exiting");
    Ok(())
}
