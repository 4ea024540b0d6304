use pedlar_broker::PriceFeed;
use pedlar_web::{AppState, BrokerProxy, TcpConnector, TickerRelay, WebConfig, create_router};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"pedlarweb - trade endpoint and ticker relay

USAGE:
    pedlarweb [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    HOST                Server host (default: 0.0.0.0)
    PORT                Server port (default: 5000)
    BROKER_URL          Broker request endpoint (default: tcp://127.0.0.1:7100)
    TICKER_URL          Upstream ticker (default: tcp://127.0.0.1:7000)
    RELAY_URL           Where agents subscribe to ticks (default: tcp://127.0.0.1:7010)
    BROKER_TIMEOUT_MS   Broker response timeout (default: 500)
    RUST_LOG            Log level filter

EXAMPLES:
    # Run with defaults
    pedlarweb

    # Broker on another host, patient timeout
    BROKER_URL=tcp://10.0.0.2:7100 BROKER_TIMEOUT_MS=2000 pedlarweb
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pedlar_web=info,pedlar_broker=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            WebConfig::from_file(&path)?
        }
        None => WebConfig::default(),
    };
    config.apply_env()?;

    // Upstream feed, relayed to agents and browsers
    let feed = PriceFeed::new(config.relay_capacity);
    tokio::spawn(
        feed.clone()
            .ingest_from(config.ticker.clone(), Vec::new(), config.reconnect()),
    );

    let relay = TickerRelay::bind(&config.relay, config.relay_capacity).await?;
    let ticks = relay.views();
    let updates = feed.subscribe();
    tokio::spawn(async move {
        if let Err(e) = relay.run(updates).await {
            tracing::error!("Ticker relay stopped: {}", e);
        }
    });

    let proxy = BrokerProxy::new(
        TcpConnector::new(config.broker.clone(), config.linger()),
        config.broker_timeout(),
    );
    let state = Arc::new(AppState::new(proxy, ticks));
    let app = create_router(state);

    let addr = config.bind_addr();
    tracing::info!("Starting pedlarweb on {}", addr);
    tracing::info!("Broker: {} (timeout {:?})", config.broker, config.broker_timeout());
    tracing::info!("Ticker: {}", config.ticker);
    tracing::info!("Relay: {}", config.relay);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
