/**
 * MQ2NAGCMD - Bus -> fichier de commandes Nagios
 *
 * RÔLE : Consomme les check results publiés sous `<prefix>.#` et les écrit,
 * une commande externe par ligne, dans le fichier de commandes Nagios.
 *
 * FONCTIONNEMENT :
 * - config : défauts <- YAML <- .env/environnement <- flags
 * - connexion au broker, puis boucle entrante (fail-fast sur écriture)
 * - selfcheck périodique démarré une fois la boucle en `Running`
 * - SIGINT/SIGTERM => arrêt gracieux (exit 0), toute autre sortie => exit 1
 */

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use nagmq_core::bus::{Bus, MqttBus};
use nagmq_core::config::load_config;
use nagmq_core::dispatch::{InboundDispatcher, InboundOptions, InboundState};
use nagmq_core::heartbeat::{HeartbeatEmitter, SelfCheck};
use nagmq_core::logging::init_logging;
use nagmq_core::sink::FileSink;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    // .env optionnel
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli).await {
        Ok(()) => {
            info!("mq2nagcmd stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = load_config(cli.config.as_deref())
        .await
        .context("loading configuration")?;
    cli.apply(&mut cfg);

    let local_host = gethostname::gethostname().to_string_lossy().into_owned();
    info!("Starting mq2nagcmd v{} on {}", VERSION, local_host);

    let bus = MqttBus::connect(&cfg.bus, &format!("nagcmd-receiver@{local_host}"))
        .await
        .with_context(|| format!("can't connect to bus at {}", cfg.bus.url))?;
    let bus: Arc<dyn Bus> = Arc::new(bus);

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            info!("Signal received, shutting down");
            shutdown.cancel();
        }
    });

    let sink = FileSink::new(&cfg.inbound.cmd_file);
    info!("Writing commands to {}", sink.path().display());
    let mut dispatcher = InboundDispatcher::new(
        bus.clone(),
        sink,
        InboundOptions {
            pattern: cfg.inbound.subscribe_pattern(),
            strip_fqdn: cfg.inbound.strip_fqdn,
        },
    );

    let selfcheck = &cfg.inbound.selfcheck;
    let heartbeat_stop = shutdown.child_token();
    let heartbeat = if selfcheck.enabled {
        let check = SelfCheck::running(
            selfcheck.host.clone().unwrap_or_else(|| local_host.clone()),
            selfcheck.service.clone(),
            VERSION,
        );
        let emitter = HeartbeatEmitter::new(
            bus.clone(),
            check,
            cfg.inbound.topic_prefix.clone(),
            Duration::from_secs(selfcheck.interval_secs),
        )
        .with_client_version(format!("mq2nagcmd-{VERSION}"));

        let mut states = dispatcher.watch_state();
        let stop = heartbeat_stop.clone();
        Some(tokio::spawn(async move {
            let running = states
                .wait_for(|s| matches!(s, InboundState::Running | InboundState::Stopped))
                .await
                .map(|s| *s == InboundState::Running)
                .unwrap_or(false);
            if running {
                emitter.run(stop).await;
            }
        }))
    } else {
        info!("Selfcheck disabled");
        None
    };

    let outcome = dispatcher.run(shutdown.clone()).await;

    heartbeat_stop.cancel();
    if let Some(handle) = heartbeat {
        if let Err(e) = handle.await {
            warn!("Selfcheck task failed: {}", e);
        }
    }
    bus.close().await;

    outcome.context("inbound loop stopped")
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("Can't install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
