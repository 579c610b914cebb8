use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use playcall_core::{
    Config, PreloadStatus, Preloader, Session, format_commentary_readable, get_cache_dir,
    get_session_path, load_session, save_session, validate::probe_duration, validate_video_file,
};
use tracing::Level;

use crate::{
    narrator::TerminalNarrator,
    pipeline::{Services, start_playback},
};

mod narrator;
mod pipeline;

/// Tail added after the last line when the video length is unknown.
const UNKNOWN_DURATION_TAIL: f64 = 3.0;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", secs / 60.0, secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "playcall")]
#[command(about = "Generate sports-style play-by-play for a short video and narrate it in sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use scripted commentary and silent narration; no API keys needed
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate commentary for a video and save it as a session file
    Generate {
        video: PathBuf,

        /// Where to write the session JSON
        #[arg(short, long, default_value = "key_moments.json")]
        output: PathBuf,

        /// Ignore cached commentary
        #[arg(short, long)]
        force: bool,
    },
    /// Replay a saved session with narration
    Play {
        session: PathBuf,

        /// Video length in seconds, if the video itself is not available
        #[arg(long)]
        duration: Option<f64>,

        /// Play narration audio through ffplay
        #[arg(long)]
        audio: bool,
    },
    /// Generate commentary, then play it back
    Run {
        video: PathBuf,

        #[arg(long)]
        audio: bool,

        #[arg(short, long)]
        force: bool,
    },
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    config.debug |= cli.debug;

    println!(
        "\n{}  {}\n",
        style("playcall").cyan().bold(),
        style("Play-by-play").dim()
    );
    if config.debug {
        println!(
            "{} {}",
            style("!").yellow().bold(),
            style("debug mode: scripted commentary, silent narration").yellow()
        );
    }

    let generating = !matches!(cli.command, Command::Play { .. });
    let services = Services::from_config(&config, generating)?;

    match cli.command {
        Command::Generate {
            video,
            output,
            force,
        } => {
            let (session, _) = generate(&config, &services, &video, force).await?;
            save_session(&session.export()?, &output).await?;
            println!(
                "\n{} {}\n",
                style("Saved:").dim(),
                style(output.display()).cyan()
            );
            print_commentary(&session);
        }
        Command::Play {
            session: session_path,
            duration,
            audio,
        } => {
            let mut session = Session::new();
            let store = load_session(&session_path).await?;
            let duration = match duration {
                Some(duration) => duration,
                None => guess_duration(&store).await,
            };
            session.load_video(store.video().clone(), Some(duration));
            session.install_commentary(store.with_duration(duration))?;
            println!(
                "{} Loaded {} lines from {}",
                style("✓").green().bold(),
                session.store().map_or(0, |store| store.len()),
                style(session_path.display()).dim()
            );
            play(&services, &mut session, duration, audio).await?;
        }
        Command::Run {
            video,
            audio,
            force,
        } => {
            let (mut session, duration) = generate(&config, &services, &video, force).await?;
            print_commentary(&session);
            play(&services, &mut session, duration, audio).await?;
        }
    }

    Ok(())
}

/// Validate, then load commentary from the cache or the commentary service.
async fn generate(
    config: &Config,
    services: &Services,
    video: &Path,
    force: bool,
) -> Result<(Session, f64)> {
    let step_start = Instant::now();
    let spinner = create_spinner("Checking video...");
    let validated = match validate_video_file(video, &config.limits).await {
        Ok(validated) => validated,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };
    spinner.finish_with_message(format!(
        "{} Video ok: {:.1}s, {:.2} MB",
        style("✓").green().bold(),
        validated.duration_seconds,
        validated.size_bytes as f64 / (1024.0 * 1024.0)
    ));

    let duration = validated.duration_seconds;
    let cache_path = get_session_path(&get_cache_dir(video));
    let mut session = Session::new();

    if !force && !config.debug && cache_path.exists() {
        let store = load_session(&cache_path).await?;
        session.load_video(store.video().clone(), Some(duration));
        session.install_commentary(store.with_duration(duration))?;
        println!(
            "{} Commentary generated {}",
            style("✓").green().bold(),
            style("(cached)").dim()
        );
        return Ok((session, duration));
    }

    let reference = if config.debug {
        validated.reference
    } else {
        let spinner = create_spinner("Preparing video for the commentary service...");
        let reference = services.video_reference(video).await?;
        spinner.finish_and_clear();
        reference
    };
    session.load_video(reference, Some(duration));

    let spinner = create_spinner("Calling the play-by-play...");
    if let Err(e) = session.regenerate(services.commentary.as_ref()).await {
        spinner.finish_and_clear();
        return Err(e.into());
    }
    if !config.debug {
        save_session(&session.export()?, &cache_path).await?;
    }
    spinner.finish_with_message(format!(
        "{} Commentary generated {}",
        style("✓").green().bold(),
        style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
    ));

    Ok((session, duration))
}

/// Preload narration and run it against a simulated video clock. Ctrl-C stops.
async fn play(services: &Services, session: &mut Session, duration: f64, audio: bool) -> Result<()> {
    let step_start = Instant::now();
    let preloader = Preloader::new(services.speech.clone(), services.voice_id.clone());
    let spinner = create_spinner("Preloading narration...");

    let mut status = preloader.subscribe();
    let progress = spinner.clone();
    let watcher = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            if let PreloadStatus::Loading { done, total } = *status.borrow_and_update() {
                progress.set_message(format!("Preloading narration {}/{}...", done, total));
            }
        }
    });

    let narration = match session.prepare_narration(&preloader).await {
        Ok(narration) => {
            spinner.finish_with_message(format!(
                "{} Narration ready: {}/{} lines {}",
                style("✓").green().bold(),
                narration.playable(),
                narration.len(),
                style(format!("[{}]", format_duration(step_start.elapsed()))).dim()
            ));
            narration
        }
        Err(e) => {
            spinner.finish_with_message(format!(
                "{} Narration unavailable, playing video only: {}",
                style("!").yellow().bold(),
                e
            ));
            session
                .narration()
                .cloned()
                .ok_or(playcall_core::PlaycallError::NoVideoLoaded)?
        }
    };
    watcher.abort();

    println!("{}", style("─".repeat(60)).dim());
    let output = Arc::new(TerminalNarrator::new(audio));
    let playback = start_playback(session, narration, duration, output).await?;

    let shutdown_tx = playback.shutdown_tx.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });
    let report = playback.done.await??;
    interrupt.abort();

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{} Narrated {} of {} lines",
        style("✓").green().bold(),
        report.narrated.len(),
        session.store().map_or(0, |store| store.len())
    );
    Ok(())
}

/// Probe the session's video if it is a local file; otherwise run a little
/// past the last line.
async fn guess_duration(store: &playcall_core::CommentaryStore) -> f64 {
    if let playcall_core::VideoReference::Local { path, .. } = store.video() {
        if let Ok(duration) = probe_duration(path).await {
            return duration;
        }
    }
    store
        .entries()
        .iter()
        .map(|entry| entry.seconds)
        .fold(0.0, f64::max)
        + UNKNOWN_DURATION_TAIL
}

fn print_commentary(session: &Session) {
    if let Some(store) = session.store() {
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", format_commentary_readable(store));
    }
}
