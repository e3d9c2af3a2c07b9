use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use swingsense::{ClubType, EngineEvent, RawMotionPayload, RoundSnapshot};
use swingsense_app::actors::engine::{EngineActor, validation_context};
use swingsense_app::actors::system::SystemActor;
use swingsense_app::actors::{self, Actor};
use swingsense_app::bus::{self, BusReceiver, BusSender};
use swingsense_app::engine::SwingEngine;
use swingsense_app::state::{self, SystemState};

#[derive(Parser, Debug, Clone)]
#[command(name = "swingsense", about = "Golf swing intelligence engine")]
struct Config {
    /// Config file path (default: ~/.config/swingsense/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analyze as this user (overrides `user_id` in the config file)
    #[arg(long)]
    user: Option<String>,

    /// Analyze a JSON-lines file of raw readings and print each swing
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Club family for --replay
    #[arg(long, value_enum, requires = "replay")]
    club: Option<ClubType>,

    /// Run one health check, print it, and exit
    #[arg(long)]
    health: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("swingsense=info,swingsense_app=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("debug logging enabled");

    let cli = Config::parse();

    // Load (or create) config file
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(state::config::default_config_path);

    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let (system_state, round_writer) = SystemState::new(config_path);
    let state = Arc::new(system_state);
    let mut config = state.system.snapshot();
    if let Some(user) = &cli.user {
        config.user_id = Some(user.clone());
    }
    let store = state.store();

    if cli.health {
        let engine = SwingEngine::new(config, store);
        let report = rt.block_on(engine.health_check());
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(path) = &cli.replay {
        let engine = SwingEngine::new(config, store);
        return replay(engine, path, cli.club);
    }

    // Single unified bus
    let bus_tx = bus::channel();

    // System actor: keeps RoundState in sync. Must be fully up before
    // other actors start so no round commands are missed.
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let sender = BusSender::new("system".into(), bus_tx.clone(), Arc::clone(&shutdown));
        let receiver = sender.subscribe();
        let (actor, ready_rx) = SystemActor::new(round_writer);
        actor.start(Arc::clone(&state), sender, receiver);
        ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("system actor failed to start"))?;
        state.register_actor("system".into(), Box::new(actor), shutdown);
    }

    // Engine actor: always on.
    actors::start_actor(
        "engine".into(),
        Box::new(EngineActor::new(config, store, rt.handle().clone())),
        &state,
        &bus_tx,
    );

    // Config-driven actors (mock sensors, mock round managers)
    let snap = state.system.snapshot();
    for ra in actors::resolve_actors(&snap) {
        tracing::info!("starting actor '{}' ({})", ra.id, ra.name);
        actors::start_actor(ra.id, ra.actor, &state, &bus_tx);
    }

    // Reporter: surfaces analyses and alerts, and keeps the broadcast
    // channel drained when no other subscriber is reading.
    let mut report_rx = BusReceiver::from(bus_tx.subscribe());
    let report_handle = tokio::spawn(async move {
        while let Ok(msg) = report_rx.recv().await {
            match &msg.event {
                EngineEvent::SwingAnalyzed(analysis) => {
                    let best = analysis
                        .best_match()
                        .map(|m| format!("{} ({:.0})", m.template_id, m.overall_match))
                        .unwrap_or_else(|| "no match".into());
                    tracing::info!(
                        "swing {}: {best}, confidence {:.0}, valid={}",
                        analysis.swing.id,
                        analysis.validation.adjusted_confidence,
                        analysis.validation.is_valid
                    );
                }
                EngineEvent::Alert(alert) => {
                    tracing::warn!("[{}] {}: {}", msg.source, alert.level, alert.message);
                }
                EngineEvent::Health(report) => {
                    tracing::info!("health: {}", report.overall);
                }
                _ => {}
            }
        }
    });

    rt.block_on(async { tokio::signal::ctrl_c().await })?;

    // Shutdown: stop all actors via registry
    tracing::info!("shutting down...");
    state.stop_all();
    // Dropping bus_tx closes the broadcast channel as secondary signal
    drop(bus_tx);
    report_handle.abort();

    Ok(())
}

/// Feed a JSON-lines recording through the engine and print one analysis
/// per detected swing. Unparsable lines are logged and skipped.
fn replay(mut engine: SwingEngine, path: &Path, club: Option<ClubType>) -> anyhow::Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let round = RoundSnapshot {
        round_active: true,
        ..Default::default()
    };
    let mut out = std::io::stdout().lock();
    let mut swings = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawMotionPayload = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("replay: line {}: {e}", line_no + 1);
                continue;
            }
        };
        match engine.ingest_raw(raw) {
            Ok(Some(swing)) => {
                swings += 1;
                let context = validation_context(&round, &swing);
                let analysis = engine.analyze(swing, &context, club);
                writeln!(out, "{}", serde_json::to_string(&analysis)?)?;
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("replay: line {} rejected: {e}", line_no + 1),
        }
    }

    tracing::info!("replay: {swings} swing(s) detected in {}", path.display());
    Ok(())
}
