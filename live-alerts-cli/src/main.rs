mod cli;
mod config;
mod error;
mod logging;
mod overlay;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use live_alerts::source::{RumbleApiSource, RumbleSourceConfig};
use live_alerts::{AlertEvent, AlertSystem, Category, EventSource, SceneBindingRegistry};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::cli::{Args, Commands};
use crate::config::AppConfig;
use crate::error::Result;
use crate::overlay::{Overlay, build_scene_graph};

/// How long shutdown waits for the final overlay snapshot.
const SNAPSHOT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init_logging(args.verbose, args.quiet, args.log_file.as_deref())
        .context("failed to initialise logging")?;

    run(args)
        .await
        .inspect_err(|e| error!("Application error: {e}"))?;
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config.as_deref();

    match args.command.unwrap_or(Commands::Run {
        api_url: None,
        refresh: None,
        include_backlog: false,
    }) {
        Commands::Run {
            api_url,
            refresh,
            include_backlog,
        } => {
            let mut config = AppConfig::load(config_path)?;
            if let Some(url) = api_url {
                config.alerts.source_credential_url = url;
            }
            if let Some(refresh) = refresh {
                config.alerts.refresh_interval_seconds = refresh;
            }
            if include_backlog {
                config.alerts.skip_backlog = false;
            }
            run_alerts(config).await?;
        }

        Commands::Scenes => {
            let config = AppConfig::load(config_path)?;
            print_scenes(&config)?;
        }

        Commands::Check => {
            let config = AppConfig::load(config_path)?;
            check(&config)?;
        }

        Commands::Config { show, reset, init } => {
            config_command(config_path, show, reset, init)?;
        }
    }

    Ok(())
}

async fn run_alerts(config: AppConfig) -> Result<()> {
    let graph = Arc::new(build_scene_graph(&config.overlay)?);
    let mut overlay = Overlay::new(graph);
    let snapshot_writer = config
        .overlay
        .snapshot_file
        .clone()
        .map(|path| overlay.mirror_to(path));
    let overlay = Arc::new(overlay);

    let mut system = AlertSystem::new(overlay);
    system.configure(config.alerts.clone())?;

    let source: Option<Arc<dyn EventSource>> = if system.config().polling_configured() {
        let source_config = RumbleSourceConfig::for_refresh_interval(system.config().refresh_interval());
        Some(Arc::new(RumbleApiSource::new(
            &system.config().source_credential_url,
            source_config,
        )?))
    } else {
        warn!("No Live Stream API URL configured; set alerts.source_credential_url or pass --api-url");
        None
    };

    let events = system.subscribe();
    let logger = tokio::spawn(log_alert_events(events));

    system.start(source).await?;
    info!("Press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C, stopping");
    }

    system.stop();
    drop(system);
    logger.abort();
    if let Some(writer) = snapshot_writer
        && tokio::time::timeout(SNAPSHOT_FLUSH_TIMEOUT, writer).await.is_err()
    {
        warn!("Overlay snapshot writer did not finish in time");
    }
    info!("Shutdown complete");
    Ok(())
}

async fn log_alert_events(mut events: tokio::sync::broadcast::Receiver<AlertEvent>) {
    loop {
        match events.recv().await {
            Ok(AlertEvent::Shown { category, event, scene, .. }) => {
                debug!(category = %category, scene = %scene, "Alert shown: {event}");
            }
            Ok(AlertEvent::Dropped { category, event, reason }) => {
                debug!(category = %category, reason = ?reason, "Alert dropped: {event}");
            }
            Ok(AlertEvent::PollFailed { error }) => {
                debug!(error = %error, "Poll failed");
            }
            Ok(AlertEvent::SessionChanged { session: Some(session) }) => {
                info!(session = %session.id, title = ?session.title, "Now following livestream");
            }
            Ok(AlertEvent::SessionChanged { session: None }) => {
                info!("Livestream ended, waiting for the next one");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Alert event logger fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_scenes(config: &AppConfig) -> Result<()> {
    let graph = build_scene_graph(&config.overlay)?;
    let mut registry = SceneBindingRegistry::new();
    registry.relist(&graph);

    println!("Scenes:");
    for scene in registry.scene_names() {
        println!("  {scene}");
        for item in registry.items_in(scene).unwrap_or_default() {
            println!("    - {} ({:?})", item.name, item.kind);
        }
    }

    println!("Text sources:");
    for name in registry.text_sources() {
        println!("  {name}");
    }
    println!("Sub-scenes:");
    for name in registry.subscenes() {
        println!("  {name}");
    }
    Ok(())
}

fn check(config: &AppConfig) -> Result<()> {
    config.alerts.validate()?;
    println!("Configuration is valid");
    if !config.alerts.polling_configured() {
        println!("Polling is not configured (no Live Stream API URL)");
    }

    let graph = build_scene_graph(&config.overlay)?;
    let mut registry = SceneBindingRegistry::new();
    registry.relist(&graph);

    for category in Category::ALL {
        let category_config = config.alerts.category(category);
        let state = if category_config.enabled { "enabled" } else { "disabled" };
        match registry.resolve(&graph, category, category_config) {
            Ok(binding) => println!("  {category} ({state}): bound in scene {:?}", binding.scene),
            Err(unresolved) => println!("  {category} ({state}): {unresolved}"),
        }
    }
    Ok(())
}

fn config_command(path: Option<&Path>, show: bool, reset: bool, init: bool) -> Result<()> {
    if reset {
        let path = AppConfig::reset(path)?;
        println!("Configuration reset to defaults at {}", path.display());
    } else if init {
        match AppConfig::init(path)? {
            (path, true) => println!("Wrote default configuration to {}", path.display()),
            (path, false) => println!("Configuration already exists at {}", path.display()),
        }
    } else if show {
        let config = AppConfig::load(path)?;
        print!("{}", config.show()?);
    } else {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => AppConfig::default_path()?,
        };
        println!("Config file: {}", path.display());
        println!("Use --show to display it, --init to create it or --reset to restore defaults");
    }
    Ok(())
}
