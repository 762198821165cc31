use loopview::cli::Args;
use loopview::core::{EngineState, HeadlessSurface, PlaybackEngine, PlayerEvent};
use loopview::entities::{AssetLocator, Configuration, NativeBackend};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Fixed update rate of the headless loop
const TICK_HZ: f64 = 60.0;

fn init_logger(args: &Args) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| PathBuf::from("loopview.log"));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn log_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::Error(kind) => error!("Event: error: {}", kind),
        PlayerEvent::SubtitlesDropped => warn!("Event: subtitles dropped"),
        other => info!("Event: {:?}", other),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args)?;
    debug!("Command-line args: {:?}", args);

    #[cfg(feature = "ffmpeg")]
    playa_ffmpeg::init().context("Failed to initialize FFmpeg")?;

    let directives = args.to_directives()?;
    let config = Configuration::build(&directives);
    let style = config.error_style();
    debug!("Configuration: {:?}", config);

    let surface = Arc::new(HeadlessSurface::new(args.surface_size().0, args.surface_size().1));
    let mut engine = PlaybackEngine::new(
        Arc::new(NativeBackend::new()),
        surface.clone(),
        AssetLocator::with_dir(&args.bundle),
    );
    let events = engine.events();
    let ticks = engine.ticks();

    if let Err(e) = engine.load(config) {
        if !style.widget_off {
            eprintln!("{}", e);
        }
    }
    if engine.state() != EngineState::Failed {
        engine.set_filters(args.filters())?;
        engine.set_brightness(args.brightness)?;
        engine.set_contrast(args.contrast)?;
    }

    let dt = 1.0 / TICK_HZ;
    let steps = (args.seconds.max(0.0) * TICK_HZ).round() as u64;
    let frame_time = std::time::Duration::from_secs_f64(dt);
    for _ in 0..steps {
        engine.tick(dt);
        for event in events.try_iter() {
            log_event(&event);
        }
        for tick in ticks.try_iter() {
            info!("Time: {:.3}s", tick.seconds());
        }
        if let Some(cue) = engine.current_cue() {
            debug!("Cue: {}", cue.text);
        }
        if engine.state() == EngineState::Failed {
            break;
        }
        std::thread::sleep(frame_time);
    }

    let state = engine.state();
    let failure = engine.failure().cloned();
    let (presented, dropped) = engine.frame_stats();
    engine.stop();
    for event in events.try_iter() {
        log_event(&event);
    }
    info!(
        "Finished in state {:?}: {} frames presented, {} dropped",
        state, presented, dropped
    );

    if let Some(path) = &args.snapshot {
        match surface.last_frame() {
            Some((frame, _)) => {
                let image = frame
                    .to_rgba_image()
                    .context("Presented frame has an inconsistent buffer")?;
                image
                    .save(path)
                    .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
                info!("Snapshot written to {}", path.display());
            }
            None => warn!("No frame was presented, snapshot skipped"),
        }
    }

    if state == EngineState::Failed {
        match failure {
            Some(kind) => bail!("Playback failed: {}", kind),
            None => bail!("Playback failed"),
        }
    }
    Ok(())
}
