// Watchbot daemon entry point.
// Loads env config, opens the store (fatal on failure), then hands control
// to the scheduler until SIGINT/SIGTERM. Exit code 0 after a clean
// shutdown, 1 on unrecoverable startup errors.

use log::{error, info};
use std::sync::Arc;
use tokio::sync::watch;
use watchbot::fetch::HttpFetcher;
use watchbot::llm::LlmClient;
use watchbot::notify::Notifier;
use watchbot::{Config, Pipeline, Result, Scheduler, Store};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("[main] fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!("[main] watchbot starting, db={}", config.db_path);

    let store = Arc::new(Store::open(&config.db_path)?);
    let llm = config.llm.clone().map(|llm_config| {
        info!(
            "[main] LLM analysis enabled: {} / {}",
            llm_config.provider.as_str(),
            llm_config.model
        );
        Arc::new(LlmClient::new(llm_config))
    });
    if llm.is_none() {
        info!("[main] no LLM configured, changes fall back to diff summaries");
    }

    let fetcher = Arc::new(HttpFetcher::default());
    let notifier = Arc::new(Notifier::from_config(&config));
    let pipeline = Arc::new(Pipeline::new(store, fetcher, llm, notifier));

    // Ctrl-C flips the shutdown watch; the scheduler and any in-flight round
    // observe it at their next suspension point.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[main] shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    Scheduler::new(config.check_interval).run(pipeline, shutdown_rx).await;

    info!("[main] clean shutdown");
    Ok(())
}
