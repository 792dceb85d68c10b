//! Scanner Binary - Live Order-Block Scanner
//!
//! Seeds each configured pair from `buffer.history_dir` when set, then watches
//! its kline stream and recomputes order blocks on each closed bar.
//!
//! Usage:
//!   ./scanner                          # config/scanner.yaml or $SCANNER_CONFIG_PATH
//!   ./scanner path/to/scanner.yaml     # explicit config
//!   MAX_OB_WORKER=8 ./scanner          # override the worker pool size

use anyhow::{bail, Context, Result};
use orderblock_scanner::bin_common::{
    load_config_from_env, parse_args, BinaryRunner, ConfigType, RunConfig,
};
use scanner::{
    init_tracing, BarStore, HistorySource, InMemoryBarStore, JsonFileHistory, LoggingSink,
    OrderBlockSink, PairOrchestrator, ScannerConfig, ShutdownManager, WorkerDispatcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streamsockets::StreamPoolManager;
use tracing::{error, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

struct ScannerApp {
    run: RunConfig,
    config: ScannerConfig,
    store: Arc<dyn BarStore>,
    sink: Arc<dyn OrderBlockSink>,
    dispatcher: Option<Arc<WorkerDispatcher>>,
    pool: Option<StreamPoolManager>,
    orchestrators: Vec<Arc<PairOrchestrator>>,
}

impl ScannerApp {
    fn new(config: ScannerConfig) -> Self {
        Self {
            run: RunConfig::new("Order-Block Scanner").with_heartbeat(HEARTBEAT_INTERVAL),
            config,
            store: Arc::new(InMemoryBarStore::new()),
            sink: Arc::new(LoggingSink),
            dispatcher: None,
            pool: None,
            orchestrators: Vec::new(),
        }
    }
}

impl BinaryRunner for ScannerApp {
    fn config(&self) -> &RunConfig {
        &self.run
    }

    async fn start(&mut self) -> Result<()> {
        if self.config.pairs.is_empty() {
            bail!("No pairs configured");
        }

        let dispatcher = Arc::new(WorkerDispatcher::with_structure_config(
            self.config.workers.pool_size,
            Arc::clone(&self.store),
            self.config.algorithm.clone(),
        )?);
        self.dispatcher = Some(Arc::clone(&dispatcher));

        let pool = StreamPoolManager::new(self.config.stream_config())?;
        let history: Option<Box<dyn HistorySource>> = self
            .config
            .buffer
            .history_dir
            .as_ref()
            .map(|dir| Box::new(JsonFileHistory::new(dir)) as Box<dyn HistorySource>);

        for pair in &self.config.pairs {
            let orchestrator = Arc::new(PairOrchestrator::new(
                pair.clone(),
                &self.config.buffer.exchange,
                self.config.buffer.retention,
                Arc::clone(&self.store),
                Arc::clone(&dispatcher),
                Arc::clone(&self.sink),
            ));

            if let Some(history) = &history {
                match orchestrator.warm_up(history.as_ref()).await {
                    Ok(len) => info!("[Pair {}] Seeded with {} bars", pair, len),
                    Err(e) => warn!("[Pair {}] History unavailable, starting empty: {}", pair, e),
                }
            }

            match orchestrator.watch(&pool).await {
                Ok(()) => self.orchestrators.push(orchestrator),
                Err(e) => error!("[Scanner] Could not watch {}: {}", pair, e),
            }
        }

        let watching = self.orchestrators.len();
        let connections = pool.connection_count().await;
        self.pool = Some(pool);

        if watching == 0 {
            bail!("No pair could be subscribed");
        }
        info!(
            "[Scanner] Watching {}/{} pairs over {} connections",
            watching,
            self.config.pairs.len(),
            connections
        );
        Ok(())
    }

    fn heartbeat(&self) {
        if let Some(dispatcher) = &self.dispatcher {
            let stats = dispatcher.stats();
            info!(
                "[Scanner] Workers {}/{} busy, {} queued | {} completed, {} failed",
                dispatcher.busy_count(),
                dispatcher.pool_size(),
                dispatcher.queued_len(),
                stats.completed,
                stats.failed
            );
        }
        for orchestrator in &self.orchestrators {
            let stats = orchestrator.stats();
            if !orchestrator.is_watching() {
                warn!("[Pair {}] Subscription inactive", orchestrator.pair());
            }
            info!(
                "[Pair {}] {} bars, {} calculations, {} failures",
                orchestrator.pair(),
                stats.bars_appended,
                stats.calculations,
                stats.failures
            );
        }
    }

    async fn stop(&mut self) {
        for orchestrator in self.orchestrators.drain(..) {
            if let Err(e) = orchestrator.unwatch() {
                warn!("[Pair {}] Unwatch failed: {}", orchestrator.pair(), e);
            }
        }
        if let Some(pool) = self.pool.take() {
            pool.shutdown().await;
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Priority: CLI arg > SCANNER_CONFIG_PATH > default
    let config_path: PathBuf = match parse_args().into_iter().next() {
        Some(path) => PathBuf::from(path),
        None => load_config_from_env(ConfigType::Scanner),
    };
    let config = ScannerConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing(&config.log_level);
    config.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let mut app = ScannerApp::new(config);
    app.execute(&shutdown).await
}
