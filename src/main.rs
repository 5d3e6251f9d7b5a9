use aimrange::app_dirs::AppDirs;
use aimrange::coach::{Coach, GeminiCoach, NoCoach};
use aimrange::config::FileSettingsStore;
use aimrange::engine::{SessionEvent, COUNTDOWN_FROM, COUNTDOWN_STEP_MS, GO_HOLD_MS, TICK_MS};
use aimrange::media::{BlobStore, MediaSlot, MemoryBlobStore, SqliteBlobStore};
use aimrange::session::{GameStatus, SessionSummary};
use aimrange::settings::{EnvironmentPreset, GameSettings, MusicMode};
use aimrange::{Range, RangeBuilder};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How long `simulate` waits for the coach before giving up.
const FEEDBACK_WAIT: Duration = Duration::from_secs(20);

/// headless aim-trainer range: settings, media and simulated sessions
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Aim-trainer session engine. Manage the persisted range settings and media library, or run a simulated timed session and get coach feedback."
)]
pub struct Cli {
    /// keep settings and media in this directory instead of the platform default
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// show or change the stored settings
    Settings {
        #[clap(subcommand)]
        action: SettingsAction,
    },
    /// manage the stored media library
    Media {
        #[clap(subcommand)]
        action: MediaAction,
    },
    /// play a session with a scripted shooter
    Simulate(SimulateArgs),
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// print the settings as JSON
    Show,
    /// change one or more settings; values are clamped to their allowed range
    Set(SetArgs),
    /// restore the defaults
    Reset,
}

#[derive(Args, Debug, Default)]
struct SetArgs {
    #[clap(long)]
    sensitivity: Option<f32>,
    /// field of view in degrees
    #[clap(long)]
    fov: Option<u32>,
    /// target size multiplier
    #[clap(long)]
    target_size: Option<f32>,
    /// play without a clock
    #[clap(long)]
    indefinite: Option<bool>,
    #[clap(long, value_enum)]
    environment: Option<EnvironmentPreset>,
    #[clap(long, value_enum)]
    music: Option<MusicMode>,
    /// video URL for streamed music
    #[clap(long)]
    stream_url: Option<String>,
    /// crosshair colour as #rrggbb
    #[clap(long)]
    crosshair_color: Option<String>,
    #[clap(long)]
    crosshair_length: Option<u32>,
    #[clap(long)]
    crosshair_width: Option<u32>,
    #[clap(long)]
    crosshair_gap: Option<u32>,
    #[clap(long)]
    crosshair_dot: Option<bool>,
    #[clap(long)]
    menu_translucent: Option<bool>,
}

#[derive(Subcommand, Debug)]
enum MediaAction {
    /// store a file in a media slot
    Import {
        #[clap(value_enum)]
        slot: MediaSlot,
        file: PathBuf,
    },
    /// delete the stored media of a slot
    Remove {
        #[clap(value_enum)]
        slot: MediaSlot,
    },
    /// list stored media
    List,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// session length in seconds
    #[clap(short = 's', long, default_value_t = 30)]
    seconds: u64,
    /// chance in percent that a shot lands
    #[clap(short = 'a', long, default_value_t = 75)]
    accuracy: u8,
    /// time between shots
    #[clap(short = 'r', long, default_value_t = 400)]
    reaction_ms: u64,
    /// fix the random sequence
    #[clap(long)]
    seed: Option<u64>,
    /// skip the remote coach
    #[clap(long)]
    offline: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    // info+ by default; RUST_LOG overrides
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();

    let cli = Cli::parse();
    let (settings_path, media_path) = match &cli.data_dir {
        Some(dir) => AppDirs::under(dir),
        None => (AppDirs::settings_path(), AppDirs::media_db_path()),
    };

    match cli.command {
        Command::Settings { action } => run_settings(action, &settings_path, &media_path),
        Command::Media { action } => run_media(action, &settings_path, &media_path),
        Command::Simulate(args) => run_simulate(args, &settings_path, &media_path),
    }
}

fn open_range(settings_path: &Path, media_path: &Path) -> RangeBuilder {
    let builder = Range::builder().settings_store(FileSettingsStore::with_path(settings_path));
    match SqliteBlobStore::open(media_path) {
        Ok(store) => builder.blob_store(store),
        Err(e) => {
            log::warn!(
                "media library at {} unavailable, using memory: {}",
                media_path.display(),
                e
            );
            builder.blob_store(MemoryBlobStore::new())
        }
    }
}

fn run_settings(
    action: SettingsAction,
    settings_path: &Path,
    media_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut range = open_range(settings_path, media_path).build();
    match action {
        SettingsAction::Show => {}
        SettingsAction::Set(args) => range.update_settings(|s| apply_set(s, args))?,
        SettingsAction::Reset => range.update_settings(GameSettings::reset),
    }
    println!("{}", serde_json::to_string_pretty(range.settings())?);
    Ok(())
}

fn apply_set(s: &mut GameSettings, args: SetArgs) -> aimrange::Result<()> {
    // validated first so a bad colour leaves everything else untouched
    if let Some(v) = args.crosshair_color {
        s.set_crosshair_color(&v)?;
    }
    if let Some(v) = args.sensitivity {
        s.set_sensitivity(v);
    }
    if let Some(v) = args.fov {
        s.set_fov(v);
    }
    if let Some(v) = args.target_size {
        s.set_target_size(v);
    }
    if let Some(v) = args.indefinite {
        s.set_indefinite(v);
    }
    if let Some(v) = args.environment {
        s.set_environment(v);
    }
    if let Some(v) = args.music {
        s.set_music_mode(v);
    }
    if args.stream_url.is_some() {
        s.set_stream_url(args.stream_url);
    }
    if let Some(v) = args.crosshair_length {
        s.set_crosshair_length(v);
    }
    if let Some(v) = args.crosshair_width {
        s.set_crosshair_width(v);
    }
    if let Some(v) = args.crosshair_gap {
        s.set_crosshair_gap(v);
    }
    if let Some(v) = args.crosshair_dot {
        s.set_crosshair_dot(v);
    }
    if let Some(v) = args.menu_translucent {
        s.set_menu_translucent(v);
    }
    Ok(())
}

fn run_media(
    action: MediaAction,
    settings_path: &Path,
    media_path: &Path,
) -> Result<(), Box<dyn Error>> {
    match action {
        MediaAction::Import { slot, file } => {
            let data = std::fs::read(&file)?;
            let len = data.len();
            // no in-memory fallback: an import that is not stored did nothing
            let mut range = Range::builder()
                .settings_store(FileSettingsStore::with_path(settings_path))
                .blob_store(SqliteBlobStore::open(media_path)?)
                .build();
            range.import_media(slot, data)?;
            println!("{}: {} bytes from {}", slot, len, file.display());
        }
        MediaAction::Remove { slot } => {
            let store = SqliteBlobStore::open(media_path)?;
            store.delete_blob(slot.key())?;
            println!("{}: removed", slot);
        }
        MediaAction::List => {
            let store = SqliteBlobStore::open(media_path)?;
            for (key, len) in store.list()? {
                println!("{:<12} {} bytes", key, len);
            }
        }
    }
    Ok(())
}

fn run_simulate(
    args: SimulateArgs,
    settings_path: &Path,
    media_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let coach: Arc<dyn Coach> = if args.offline {
        Arc::new(NoCoach)
    } else {
        match GeminiCoach::from_env() {
            Ok(coach) => Arc::new(coach),
            Err(e) => {
                log::warn!("{}; feedback will be the fallback", e);
                Arc::new(NoCoach)
            }
        }
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut shooter = StdRng::seed_from_u64(seed);
    let session_ms = args.seconds.max(1) * 1_000;
    let reaction_ms = args.reaction_ms.max(TICK_MS);
    let hit_chance = f64::from(args.accuracy.min(100)) / 100.0;

    let mut range = open_range(settings_path, media_path)
        .coach(coach)
        .duration_ms(session_ms)
        .seed(seed)
        .build();

    range.start();
    range.on_pointer_lock(true);
    range.advance(u64::from(COUNTDOWN_FROM) * COUNTDOWN_STEP_MS + GO_HOLD_MS);
    report(range.drain_events());

    let mut since_shot = 0;
    while range.status() == GameStatus::Playing && range.engine().elapsed_ms() < session_ms {
        range.advance(TICK_MS);
        since_shot += TICK_MS;
        if since_shot >= reaction_ms {
            since_shot = 0;
            if shooter.gen_bool(hit_chance) {
                if let Some(id) = range.targets().first().map(|t| t.id.clone()) {
                    range.click_target(&id);
                }
            } else {
                range.click_background();
            }
        }
        report(range.drain_events());
    }

    // indefinite sessions never run out on their own
    range.finish();
    report(range.drain_events());

    if !range.wait_for_feedback(FEEDBACK_WAIT) {
        log::warn!("no coach feedback within {:?}", FEEDBACK_WAIT);
    }
    report(range.drain_events());
    Ok(())
}

fn report(events: Vec<SessionEvent>) {
    for event in events {
        match event {
            SessionEvent::StatusChanged { from, to } => log::debug!("{} -> {}", from, to),
            SessionEvent::Countdown(Some(step)) => println!("{}", step),
            SessionEvent::Countdown(None) => {}
            SessionEvent::Hit { points, combo } => log::debug!("hit +{} (combo {})", points, combo),
            SessionEvent::Miss => log::debug!("miss"),
            SessionEvent::Finished(summary) => print_summary(&summary),
            SessionEvent::Feedback(feedback) => {
                println!("coach [{}]: {}", feedback.rating, feedback.text)
            }
        }
    }
}

fn print_summary(summary: &SessionSummary) {
    println!("score     {}", summary.score);
    println!("hits      {}", summary.hits);
    println!("misses    {}", summary.misses);
    println!("accuracy  {}%", summary.accuracy);
    println!("max combo {}", summary.max_combo);
    println!("time      {:.1}s", summary.elapsed_secs);
    println!(
        "history   {}",
        summary
            .history
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
}
