//! ratio-exporter - scrapes a profile page and serves the totals to Prometheus.
//!
//! Configuration comes from environment variables (see `--help`):
//!   COOKIE_STRING=... PROFILE_URL=... USER_AGENT=... \
//!   UL_ELEMENT_SELECTOR=... DL_ELEMENT_SELECTOR=... ratio-exporter

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::error::Error;
use std::process;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use ratio_exporter::background::Scheduler;
use ratio_exporter::config::{Args, ExporterConfig};
use ratio_exporter::handlers;
use ratio_exporter::notify::Notifier;
use ratio_exporter::scrape::{FieldExtractor, HttpPageSource, PageSource};
use ratio_exporter::state::{ExporterState, SharedState};

type BoxError = Box<dyn Error + Send + Sync>;

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("ratio_exporter={level}").parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(async_main(config)) {
        error!(error = %e, "exporter stopped");
        process::exit(1);
    }
}

async fn async_main(config: ExporterConfig) -> Result<(), BoxError> {
    info!("ratio-exporter {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        url = %config.target.url,
        interval_secs = config.interval.as_secs(),
        "Config loaded"
    );

    let state = ExporterState::shared()?;
    let source = HttpPageSource::new(&config.target)?;
    let extractor = FieldExtractor::new(
        &config.target.upload_selector,
        &config.target.download_selector,
    )?;

    let mut scheduler = Scheduler::new(source, extractor, state.clone(), config.interval)?;
    match &config.telegram {
        Some(telegram) => {
            scheduler = scheduler.with_notifier(Notifier::new(telegram)?);
            info!(chat_id = telegram.chat_id, "Telegram notifications: enabled");
        }
        None => info!("Telegram notifications: disabled"),
    }

    // Setup graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let listener = TcpListener::bind(config.listen).await?;
    serve_and_scrape(listener, state, scheduler, shutdown_rx).await?;
    info!("Shutdown complete");
    Ok(())
}

/// Runs the metrics server and the fetch loop until shutdown is requested.
///
/// After the signal, the loop stopping first lets the server drain; the server
/// stopping first drops the loop. The server stopping before any signal is an
/// error.
async fn serve_and_scrape<S: PageSource>(
    listener: TcpListener,
    state: SharedState,
    scheduler: Scheduler<S>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), BoxError> {
    let mut server = tokio::spawn(handlers::serve(listener, state, shutdown.clone()));

    tokio::select! {
        _ = scheduler.run(shutdown.clone()) => {}
        result = &mut server => {
            result??;
            if !*shutdown.borrow() {
                return Err("metrics server exited unexpectedly".into());
            }
            return Ok(());
        }
    }

    server.await??;
    Ok(())
}
