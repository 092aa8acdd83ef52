//! Twindeck Player - play or mix one or two files from the terminal
//!
//! ```text
//! twindeck-player track.flac --loop
//! twindeck-player a.wav b.mp3 --crossfade 0.3 --speed 1.1
//! twindeck-player a.wav --ab 12.0 20.5 --render loop.wav --duration 60
//! ```
//!
//! While playing, commands are read line by line from stdin (`help` lists
//! them) and a status line shows position, length and loop state.

mod cli;
mod config;
mod session;

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use twindeck_core::audio::{
    list_output_devices, render_to_wav, start_audio_system, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE,
};
use twindeck_core::config::EngineConfig;
use twindeck_core::source::DecoderRegistry;
use twindeck_core::{format_time, PlayerSlot};

use cli::{parse_command, Args};
use session::Session;

/// How often the status line refreshes
const STATUS_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    if args.list_devices {
        for device in list_output_devices()? {
            println!("{} ({} channels)", device, device.max_channels);
        }
        return Ok(());
    }

    // Envelope extraction is the only rayon user; name its threads
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-waveform-{}", i))
        .build_global()
    {
        log::warn!("Rayon thread pool already initialized: {}", e);
    }

    let config = config::load(&args);
    let registry = Arc::new(DecoderRegistry::with_defaults());

    match &args.render {
        Some(path) => render(&args, &config, registry, path),
        None => play_live(&args, &config, registry),
    }
}

/// Load the files and apply the playback flags, returning the longest length
fn prepare(session: &mut Session, args: &Args) -> Result<f64> {
    let mut longest: f64 = 0.0;
    for (slot, path) in PlayerSlot::ALL.into_iter().zip(&args.files) {
        let length = session.load(slot, path)?;
        println!(
            "player {}: {} ({})",
            slot.display_number(),
            path.display(),
            format_time(length)
        );
        longest = longest.max(length);
    }

    for slot in PlayerSlot::ALL {
        let Some(player) = session.player_mut(slot) else { continue };
        if let Some(speed) = args.speed {
            player.set_speed(speed);
        }
        if args.loop_simple {
            player.set_loop_simple(true)?;
        }
        if slot == PlayerSlot::One {
            if let Some([start, end]) = args.ab.as_deref() {
                player.set_loop_region(*start, *end)?;
                player.seek(*start)?;
            }
        }
        player.play()?;
    }

    if let Session::Dual(mixer) = session {
        if args.linked {
            mixer.set_linked(true);
        }
        if let Some(crossfade) = args.crossfade {
            mixer.set_crossfade(crossfade);
        }
    }

    Ok(longest)
}

fn render(args: &Args, config: &EngineConfig, registry: Arc<DecoderRegistry>, path: &Path) -> Result<()> {
    let rate = config.audio.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let block = config.audio.buffer_size.as_frames().unwrap_or(DEFAULT_BUFFER_SIZE) as usize;
    let (mut session, mut renderer) =
        Session::create(args.files.len(), rate, &config.player_settings(), registry);

    let longest = prepare(&mut session, args)?;
    let duration = args.duration.unwrap_or(longest).max(0.0);
    let frames = (duration * rate as f64).round() as usize;

    println!("Rendering {} at {} Hz to {}", format_time(duration), rate, path.display());
    let started = Instant::now();
    render_to_wav(&mut renderer, path, rate, frames, block, |_| {})
        .with_context(|| format!("Failed to render {}", path.display()))?;

    session.report_underruns();
    println!("{}", session.status_line());
    println!("Done in {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn play_live(args: &Args, config: &EngineConfig, registry: Arc<DecoderRegistry>) -> Result<()> {
    let settings = config.player_settings();
    let players = args.files.len();

    let mut created = None;
    let handle = start_audio_system(&config.audio, |rate| {
        let (session, renderer) = Session::create(players, rate, &settings, registry);
        created = Some(session);
        renderer
    })
    .context("Failed to start audio output")?;
    let mut session = created.context("Audio system started without players")?;

    println!(
        "{} @ {} Hz, {} frames (~{:.1}ms)",
        handle.device_name(),
        handle.sample_rate(),
        handle.buffer_size(),
        handle.latency_ms()
    );

    prepare(&mut session, args)?;
    println!("Type `help` for commands, `quit` to exit.");

    let lines = spawn_stdin_reader()?;
    let deadline = args.duration.map(|d| Instant::now() + Duration::from_secs_f64(d.max(0.0)));
    let mut stdin_open = true;

    'run: loop {
        while stdin_open {
            match lines.try_recv() {
                Ok(line) => match parse_command(&line) {
                    Ok(command) => match session.apply(command) {
                        Ok(true) => {}
                        Ok(false) => break 'run,
                        Err(e) => eprintln!("\n{:#}", e),
                    },
                    Err(e) => eprintln!("\n{}", e),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => stdin_open = false,
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        // Without a terminal to read from, finish when playback does
        if !stdin_open && session.is_idle() {
            break;
        }

        session.report_underruns();
        print!("\r{}\x1b[K", session.status_line());
        std::io::stdout().flush().ok();
        thread::sleep(STATUS_INTERVAL);
    }

    println!();
    drop(handle);
    Ok(())
}

/// Forward stdin lines to the main loop; the channel closes at EOF
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}
