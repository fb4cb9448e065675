use scanbot::{
    clock::LiveClock,
    config::ScannerConfig,
    logging::{init_json_logging, init_logging},
    provider::{LogDispatcher, StaticUniverse, file::JsonFileMarketData},
    scan::{coordinator::ScanCoordinator, schedule::run_scheduled},
};
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "scanbot.json";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let loaded = ScannerConfig::load(&config_path);
    let json_logs = loaded.as_ref().is_ok_and(|config| config.json_logs);

    // Initialise Tracing
    if json_logs {
        init_json_logging();
    } else {
        init_logging();
    }

    let config = loaded.unwrap_or_else(|error| {
        warn!(path = %config_path, %error, "failed to load config, using defaults");
        ScannerConfig::default()
    });

    // Construct file-backed collaborators
    let provider = JsonFileMarketData::new(&config.scan.data_dir);
    let universe = StaticUniverse::new(config.scan.symbols.iter().cloned());

    let coordinator = ScanCoordinator::new(&config, provider, universe, LogDispatcher, LiveClock);

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    };

    run_scheduled(&coordinator, config.scan.cycle_period(), shutdown).await;
}
