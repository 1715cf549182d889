use alarm_bridge::alarm::{AlarmPipeline, InMemoryAlarmLog, TracingNotifier};
use alarm_bridge::audio::{AlertPlayer, CpalAudioService, RingerModeGuard, ToneLibrary};
use alarm_bridge::config::ConfigStore;
use alarm_bridge::kernel::telemetry::SharedTelemetry;
use alarm_bridge::kernel::{SystemClock, TokioScheduler};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Classify one inbound SMS and sound the alert it calls for.
#[derive(Debug, Parser)]
#[command(name = "alarm_bridge", version, about = "SMS alarm classifier and alert player")]
struct Cli {
    /// JSON settings file (key -> value)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Register a WAV file under a tone id; repeatable
    #[arg(long = "tone", value_name = "ID=FILE", value_parser = parse_tone)]
    tones: Vec<(i64, PathBuf)>,

    /// Sender number as delivered by the network
    sender: String,

    /// Message body; remaining words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    body: Vec<String>,
}

fn parse_tone(raw: &str) -> Result<(i64, PathBuf), String> {
    let (id, path) = raw.split_once('=').ok_or_else(|| format!("expected ID=FILE, got '{}'", raw))?;
    let id = id.trim().parse().map_err(|_| format!("tone id '{}' is not an integer", id))?;
    if path.is_empty() {
        return Err("tone file path is empty".to_string());
    }
    Ok((id, PathBuf::from(path)))
}

fn load_inputs(args: &Cli) -> alarm_bridge::Result<(ConfigStore, ToneLibrary)> {
    let config = match &args.settings {
        Some(path) => ConfigStore::load_file(path)?,
        None => ConfigStore::new(),
    };

    let mut tones = ToneLibrary::builtin();
    for (id, path) in &args.tones {
        tones.register_wav(*id, path)?;
    }
    Ok((config, tones))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Cli::parse();

    let (config, tones) = load_inputs(&args).context("loading settings and tones")?;
    let config = Arc::new(config);

    tracing::info!("Alarm bridge booting...");

    let telemetry = SharedTelemetry::new();
    let audio = Arc::new(CpalAudioService::default());
    let scheduler = TokioScheduler::current().shared();
    let guard = RingerModeGuard::with_telemetry(audio.clone(), scheduler, telemetry.clone());
    let player = AlertPlayer::with_telemetry(audio, tones, guard.clone(), telemetry.clone());
    let alarm_log = Arc::new(InMemoryAlarmLog::new());

    let pipeline = AlarmPipeline::new(
        config,
        alarm_log,
        Arc::new(TracingNotifier),
        player.clone(),
        Arc::new(SystemClock),
    )
    .with_telemetry(telemetry.clone());

    match pipeline.handle_message(&args.sender, &args.body.join(" ")).await {
        Some(handled) => {
            tracing::info!("Alert outcome: {:?}", handled.alert);
            player.wait_finished().await;
            guard.wait_idle().await;
            println!("{}", serde_json::to_string_pretty(&handled.record)?);
        }
        None => println!("not an alarm"),
    }

    tracing::info!("Telemetry: {:?}", telemetry.snapshot());
    Ok(())
}
