//! Echo agent: prints every tick and bar published on a ticker endpoint

use async_trait::async_trait;
use pedlar_core::{Bar, FeedMessage};
use pedlar_gateway::{Endpoint, TcpSubscriber};
use pedlar_web::{Agent, AgentError, Strategy, TradeClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Echo;

#[async_trait]
impl Strategy for Echo {
    async fn on_tick(&mut self, _agent: &mut Agent, bid: f64, ask: f64) -> Result<(), AgentError> {
        tracing::info!("Tick: {} {}", bid, ask);
        Ok(())
    }

    async fn on_bar(&mut self, _agent: &mut Agent, bar: Bar) -> Result<(), AgentError> {
        tracing::info!("Bar: {} {} {} {}", bar.open, bar.high, bar.low, bar.close);
        Ok(())
    }
}

fn print_help() {
    eprintln!(
        r#"tick-echo - print ticks and bars from a ticker

USAGE:
    tick-echo [OPTIONS]

OPTIONS:
    -t, --ticker <ADDR>     Ticker endpoint (default: tcp://127.0.0.1:7010)
    -e, --endpoint <URL>    Web endpoint (default: http://127.0.0.1:5000)
    -h, --help              Print this help message
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tick_echo=debug,pedlar_web=info,pedlar_gateway=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut ticker = Endpoint::new("127.0.0.1", 7010);
    let mut endpoint = "http://127.0.0.1:5000".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--ticker" | "-t" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Error: --ticker requires an address");
                    std::process::exit(1);
                };
                ticker = Endpoint::parse(value)?;
            }
            "--endpoint" | "-e" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Error: --endpoint requires a URL");
                    std::process::exit(1);
                };
                endpoint = value.clone();
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    tracing::info!("Connecting to ticker: {}", ticker);
    let feed = TcpSubscriber::<FeedMessage>::connect(&ticker, &[]).await?;
    let mut agent = Agent::new(TradeClient::new(endpoint, "echo"));

    let mut echo = Echo;
    tokio::select! {
        result = agent.run(&mut echo, feed) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Stopping agent"),
    }
    Ok(())
}
