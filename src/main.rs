use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use stendhal_sound::{AppResult, NoEntities, SoundConfig, SoundSystem};

/// Initialize tracing with a daily log file and, in debug builds, console output
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("Stendhal").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "stendhal-sound.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

struct Args {
    config: Option<PathBuf>,
    volume: i32,
    sounds: Vec<String>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args {
        config: None,
        volume: 100,
        sounds: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--volume" => {
                let volume = iter.next().context("--volume needs a value")?;
                args.volume = volume
                    .parse()
                    .with_context(|| format!("invalid volume: {volume}"))?;
            }
            _ => args.sounds.push(arg),
        }
    }
    Ok(args)
}

fn main() -> AppResult<()> {
    initialize_tracing();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => SoundConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SoundConfig::load().context("loading sound configuration")?,
    };

    let sounds = SoundSystem::initialize_default(&config, Arc::new(NoEntities));
    if !sounds.is_operative() {
        anyhow::bail!("sound system is not operative, see the log for details");
    }

    if args.sounds.is_empty() {
        println!("{} library sounds available", sounds.library_size());
    }

    for name in &args.sounds {
        if !sounds.contains(name) {
            tracing::warn!("Not a library sound: {}", name);
            continue;
        }
        match sounds.play_sound(name, args.volume)? {
            Some(handle) => {
                println!("Playing {}", name);
                while handle.is_playing() {
                    thread::sleep(Duration::from_millis(50));
                }
            }
            None => println!("{} was not played", name),
        }
    }

    sounds.shutdown();
    Ok(())
}
