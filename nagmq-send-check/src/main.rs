/**
 * SEND_CHECK - stdin -> bus
 *
 * RÔLE : Remplaçant de send_nsca. Lit des check results passifs sur l'entrée
 * standard (une ligne par résultat) et les publie sur le bus.
 *
 * FONCTIONNEMENT :
 * - ligne invalide ou publication ratée : loggée, on passe à la suivante
 * - fin de flux : résumé, fermeture propre de la connexion, exit 0
 * - seuls la connexion et la lecture de stdin sont fatales (exit 1)
 */

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use nagmq_core::bus::{Bus, MqttBus};
use nagmq_core::config::load_config;
use nagmq_core::dispatch::{OutboundOptions, OutboundPublisher};
use nagmq_core::logging::init_logging;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
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
    cli.apply(&mut cfg).await?;

    let local_host = gethostname::gethostname().to_string_lossy().into_owned();
    let bus = MqttBus::connect(&cfg.bus, &format!("send-check@{local_host}"))
        .await
        .with_context(|| format!("can't connect to bus at {}", cfg.bus.url))?;
    let bus: Arc<dyn Bus> = Arc::new(bus);

    let publisher = OutboundPublisher::new(
        bus.clone(),
        OutboundOptions {
            topic_prefix: cfg.outbound.topic_prefix.clone(),
            mode: cfg.outbound.mode,
            state_policy: cfg.outbound.state_policy,
            client_version: Some(format!("send_check-{VERSION}")),
        },
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stop reading input");
                shutdown.cancel();
            }
        }
    });

    let outcome = publisher
        .run(BufReader::new(tokio::io::stdin()), shutdown)
        .await;
    bus.close().await;

    outcome.context("reading check results from stdin")?;
    Ok(())
}
