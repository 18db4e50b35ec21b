//! checkstream — follow the Icinga 2 event stream and feed Flapjack.
//!
//! ```text
//! checkstream --icinga icinga.example.com:5665 --icinga-user flapjack \
//!             --icinga-certfile /etc/icinga2/pki/ca.crt --redis localhost:6380
//! ```
//!
//! Runs until SIGINT / SIGTERM (exit 0) or a fatal error such as rejected
//! credentials (non-zero exit).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use checkstream_core::{CachingEnricher, Enricher, EventSink, LogSink, StreamSupervisor};
use checkstream_http::{IcingaEnricher, IcingaEventSource};
use checkstream_redis::FlapjackSink;

mod args;
mod logging;

use args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_config());

    let icinga = cli.icinga_config()?;
    let flapjack = cli.flapjack_config();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        icinga = %icinga.server,
        queue = %icinga.queue,
        redis = %flapjack.server,
        db = flapjack.database,
        flapjack_version = %flapjack.version,
        dry_run = cli.dry_run,
        "starting checkstream"
    );

    let source = IcingaEventSource::new(icinga.clone()).context("configure event stream")?;

    let lookups: Arc<dyn Enricher> =
        Arc::new(IcingaEnricher::new(icinga).context("configure object lookups")?);
    let enricher: Arc<dyn Enricher> = match cli.lookup_cache_ttl() {
        Some(ttl) => Arc::new(CachingEnricher::new(lookups, ttl)),
        None => lookups,
    };

    let sink: Arc<dyn EventSink> = if cli.dry_run {
        Arc::new(LogSink)
    } else {
        Arc::new(
            FlapjackSink::connect(flapjack)
                .await
                .context("couldn't establish Redis connection")?,
        )
    };

    let supervisor = StreamSupervisor::new(cli.supervisor_config(), Arc::new(source), enricher, sink);
    supervisor
        .run(shutdown_signal())
        .await
        .context("event stream stopped")?;

    let metrics = supervisor.metrics();
    info!(
        sessions = metrics.sessions_opened,
        received = metrics.events_received,
        dispatched = metrics.events_dispatched,
        skipped = metrics.events_skipped,
        reconnects = metrics.reconnects,
        "shut down"
    );
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
