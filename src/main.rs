use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use trackmeta::config::{default_config_path, load_or_create_config};
use trackmeta::discovery::tracks_from_uri;
use trackmeta::{
    BusNotifier, Config, LengthFormat, LoftyCodecRegistry, Message, TrackContext,
    TrackListSummary, TrackRegistry, TrackSettings, format_length,
};

fn load_config() -> Config {
    let path = match default_config_path() {
        Ok(path) => path,
        Err(err) => {
            warn!("Using default config: {}", err);
            return Config::default();
        }
    };
    match load_or_create_config(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!("Failed to load config {}: {}. Using defaults", path.display(), err);
            Config::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();
    log::set_max_level(log::LevelFilter::Info);

    let config = load_config();
    log::set_max_level(config.logging.level_filter());

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let locations: Vec<String> = std::env::args().skip(1).collect();
    if locations.is_empty() {
        info!("Usage: trackmeta <path-or-uri>...");
        return Ok(());
    }

    // Bus for communication between components
    let (bus_sender, mut bus_receiver) = broadcast::channel::<Message>(1024);

    let context = Arc::new(TrackContext::new(
        Arc::new(BusNotifier::new(bus_sender)),
        Arc::new(LoftyCodecRegistry::new()),
        TrackSettings::from_config(&config),
    ));
    let registry = TrackRegistry::new(context);

    let mut tracks = Vec::new();
    for location in &locations {
        tracks.extend(tracks_from_uri(&registry, location));
    }

    for track in &tracks {
        println!(
            "{}  [{} {}] {}",
            track,
            format_length(track.get_duration() as f64, LengthFormat::Short),
            track.get_bitrate_display(),
            track.get_loc_for_display()
        );
        debug!("Snapshot: {}", serde_json::to_string(&track.snapshot())?);
    }

    if tracks.len() > 1 {
        let summary = TrackListSummary::from_tracks(&tracks);
        println!("{} - {}: {}", summary.artist, summary.album, summary.total_label());
    }

    while let Ok(message) = bus_receiver.try_recv() {
        debug!("Bus message: {:?}", message);
    }
    info!("Resolved {} tracks", registry.live_count());
    Ok(())
}
