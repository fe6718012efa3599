use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sound_safari_core::capture::{Signal, SyntheticCapture};
use sound_safari_core::challenge::{date_key, today_key, ChallengeTracker};
use sound_safari_core::config::{
    resolve_optional_string, resolve_session_ceiling, Env, Profile, SessionCeiling, StdEnv,
    ENV_INPUT_DEVICE, ENV_OUTPUT_DEVICE, ENV_PROFILE,
};
use sound_safari_core::difficulty::DifficultyMode;
use sound_safari_core::orchestrator::{Clock, PhaseOrchestrator, SessionOutcome, VirtualClock};
use sound_safari_core::playback::{PlaybackSink, RecordingPlaybackSink};
use sound_safari_core::session::SessionEvent;
use sound_safari_core::signal::{FeatureSource, SignalExtractor};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exact FFT bin at 48 kHz, inside the voice band.
const DRY_RUN_VOICE_HZ: f32 = 234.375;
/// RMS about 0.35, loud enough to count as claps in Creation.
const DRY_RUN_AMPLITUDE: f32 = 0.5;

#[derive(Parser, Debug)]
#[command(name = "sound-safari")]
#[command(about = "Sound Safari session engine: listen, classify, adapt")]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one session and print the session record as JSON.
    Run(RunArgs),
    /// Print the daily challenge for a date.
    Challenge {
        /// ISO date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, env = ENV_PROFILE)]
    profile: PathBuf,

    /// ISO date (YYYY-MM-DD) for the daily challenge; defaults to today.
    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    max_minutes: Option<u32>,

    #[arg(long)]
    input_device: Option<String>,

    #[arg(long)]
    output_device: Option<String>,

    /// Synthetic input, in-memory playback and virtual time.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Write the updated profile back to `--profile`.
    #[arg(long, default_value_t = false)]
    save: bool,
}

struct RunConfig {
    profile: Profile,
    ceiling: SessionCeiling,
    date_key: String,
    input_device: Option<String>,
    output_device: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Challenge { date } => {
            let key = resolve_date_key(date.as_deref())?;
            let challenge = ChallengeTracker::generate(&key);
            println!("{}", serde_json::to_string_pretty(&challenge)?);
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let env = StdEnv;
    let profile_path = args.profile.clone();
    let dry_run = args.dry_run;
    let save = args.save;
    let cfg = build_config(args, &env)?;

    tracing::info!(
        child = %cfg.profile.child_name,
        date_key = %cfg.date_key,
        ceiling_minutes = cfg.ceiling.minutes(),
        dry_run,
        "config loaded"
    );

    let outcome = if dry_run {
        let capture = SyntheticCapture::new(Signal::Sine {
            freq_hz: DRY_RUN_VOICE_HZ,
            amplitude: DRY_RUN_AMPLITUDE,
        });
        drive(
            &cfg,
            SignalExtractor::new(capture),
            VirtualClock::new(),
            RecordingPlaybackSink::new(),
        )
        .await?
    } else {
        run_on_devices(&cfg).await?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "session": &outcome.data,
            "summary": &outcome.summary,
            "new_achievements": &outcome.new_achievements,
        }))?
    );

    if save {
        let mut profile = cfg.profile;
        apply_outcome(&mut profile, outcome);
        let json = serde_json::to_string_pretty(&profile)?;
        std::fs::write(&profile_path, json)
            .with_context(|| format!("failed to write profile {}", profile_path.display()))?;
        tracing::info!(path = %profile_path.display(), "profile saved");
    }

    Ok(())
}

#[cfg(feature = "audio-device")]
async fn run_on_devices(cfg: &RunConfig) -> anyhow::Result<SessionOutcome> {
    use sound_safari_core::capture::DeviceCapture;
    use sound_safari_core::orchestrator::TokioClock;
    use sound_safari_core::playback::AudioPlaybackSink;

    let mut capture = DeviceCapture::new();
    if let Some(name) = cfg.input_device.as_deref() {
        capture = capture.with_input_device_name(name);
    }
    let mut sink = AudioPlaybackSink::new();
    if let Some(name) = cfg.output_device.as_deref() {
        sink = sink.with_output_device_name(name);
    }

    drive(cfg, SignalExtractor::new(capture), TokioClock::new(), sink).await
}

#[cfg(not(feature = "audio-device"))]
async fn run_on_devices(_cfg: &RunConfig) -> anyhow::Result<SessionOutcome> {
    anyhow::bail!("built without the `audio-device` feature; use --dry-run")
}

async fn drive<F, K, P>(
    cfg: &RunConfig,
    features: F,
    clock: K,
    playback: P,
) -> anyhow::Result<SessionOutcome>
where
    F: FeatureSource,
    K: Clock,
    P: PlaybackSink,
{
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
    let logger = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(event = %json, "session event"),
                Err(e) => tracing::warn!(error = %e, "failed to encode session event"),
            }
        }
    });

    let outcome = PhaseOrchestrator::new(features, clock, playback)
        .with_profile(&cfg.profile)
        .with_session_ceiling(cfg.ceiling)
        .with_date_key(cfg.date_key.clone())
        .with_events(tx)
        .run()
        .await;

    logger.await.context("event logger task failed")?;
    Ok(outcome)
}

fn apply_outcome(profile: &mut Profile, outcome: SessionOutcome) {
    profile.session_history.push(outcome.data);
    profile.achievements.extend(outcome.new_achievements);
    profile
        .progression
        .unlocked_environments
        .extend(outcome.summary.environments_unlocked);
    profile.daily_challenge = outcome.summary.daily_challenge;
    if profile.preferences.difficulty_mode == DifficultyMode::Adaptive {
        profile.preferences.difficulty = outcome.summary.final_difficulty;
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn resolve_date_key(date: Option<&str>) -> anyhow::Result<String> {
    match date {
        Some(d) => {
            let parsed = NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .with_context(|| format!("invalid --date (expected YYYY-MM-DD): {d}"))?;
            Ok(date_key(parsed))
        }
        None => Ok(today_key()),
    }
}

fn build_config(args: RunArgs, env: &impl Env) -> anyhow::Result<RunConfig> {
    let raw = std::fs::read_to_string(&args.profile)
        .with_context(|| format!("failed to read profile {}", args.profile.display()))?;
    let profile = Profile::from_json(&raw)
        .with_context(|| format!("invalid profile {}", args.profile.display()))?;

    let ceiling = resolve_session_ceiling(
        args.max_minutes,
        env,
        profile.preferences.max_session_minutes,
    )?;

    Ok(RunConfig {
        ceiling,
        date_key: resolve_date_key(args.date.as_deref())?,
        input_device: resolve_optional_string(args.input_device, ENV_INPUT_DEVICE, env),
        output_device: resolve_optional_string(args.output_device, ENV_OUTPUT_DEVICE, env),
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sound_safari_core::difficulty::DifficultyLevel;
    use sound_safari_core::emotion::Emotion;
    use sound_safari_core::orchestrator::PhaseTimings;
    use sound_safari_core::session::{SessionData, SessionPhase, SessionSummary};
    use std::time::Duration;

    fn outcome_ending_at(level: DifficultyLevel) -> SessionOutcome {
        let data = SessionData::new("session-1", "Kid", Utc::now());
        SessionOutcome {
            summary: SessionSummary {
                session_id: data.id.clone(),
                furthest_phase: SessionPhase::Summary,
                ended_early: false,
                sounds_discovered: 0,
                sounds_imitated: 0,
                rhythms_created: 0,
                comfort_sounds_played: 0,
                total_duration: Duration::from_secs(60),
                dominant_emotion: Emotion::Neutral,
                final_difficulty: level,
                badges_earned: Vec::new(),
                environments_unlocked: Vec::new(),
                daily_challenge: None,
            },
            data,
            new_achievements: Vec::new(),
        }
    }

    #[test]
    fn adaptive_profile_keeps_final_difficulty() {
        let mut profile = Profile::default();
        profile.preferences.difficulty_mode = DifficultyMode::Adaptive;
        profile.preferences.difficulty = DifficultyLevel::Hard;

        apply_outcome(&mut profile, outcome_ending_at(DifficultyLevel::Easy));

        assert_eq!(profile.preferences.difficulty, DifficultyLevel::Easy);
        assert_eq!(profile.session_history.len(), 1);
    }

    #[test]
    fn fixed_profile_keeps_chosen_difficulty() {
        let mut profile = Profile::default();
        profile.preferences.difficulty_mode = DifficultyMode::Fixed;
        profile.preferences.difficulty = DifficultyLevel::Medium;

        apply_outcome(&mut profile, outcome_ending_at(DifficultyLevel::Hard));

        assert_eq!(profile.preferences.difficulty, DifficultyLevel::Medium);
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "sound-safari",
            "run",
            "--profile",
            "kid.json",
            "--max-minutes",
            "5",
            "--dry-run",
        ])
        .expect("valid args");
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.profile, PathBuf::from("kid.json"));
                assert_eq!(args.max_minutes, Some(5));
                assert!(args.dry_run);
                assert!(!args.save);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn dry_run_signal_is_loud_enough_to_clap() {
        let mut source = SignalExtractor::new(SyntheticCapture::new(Signal::Sine {
            freq_hz: DRY_RUN_VOICE_HZ,
            amplitude: DRY_RUN_AMPLITUDE,
        }));
        FeatureSource::start(&mut source).expect("synthetic start");

        let f = source.features();
        assert!(f.is_vocalizing);
        assert!(f.volume > PhaseTimings::default().clap_volume_threshold);
    }

    #[test]
    fn date_key_is_validated() {
        assert_eq!(resolve_date_key(Some("2024-05-01")).expect("valid"), "2024-05-01");
        assert!(resolve_date_key(Some("May 1st")).is_err());
    }
}
