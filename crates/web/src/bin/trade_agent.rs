//! Interactive agent: buy, sell and close from the terminal

use pedlar_web::{Agent, TradeClient};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VOLUME: f64 = 0.01;

fn print_help() {
    eprintln!(
        r#"trade-agent - place trades through the web endpoint

USAGE:
    trade-agent [OPTIONS]

OPTIONS:
    -e, --endpoint <URL>    Web endpoint (default: http://127.0.0.1:5000)
    -n, --name <NAME>       Agent name sent with each trade (default: interactive)
    -h, --help              Print this help message

COMMANDS:
    b   buy       s   sell       c   close all       q   quit
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trade_agent=info,pedlar_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut endpoint = "http://127.0.0.1:5000".to_string();
    let mut name = "interactive".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--endpoint" | "-e" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Error: --endpoint requires a URL");
                    std::process::exit(1);
                };
                endpoint = value.clone();
            }
            "--name" | "-n" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Error: --name requires a value");
                    std::process::exit(1);
                };
                name = value.clone();
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut agent = Agent::new(TradeClient::new(endpoint, name));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"[b]uy [s]ell [c]lose [q]uit: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let outcome = match line.trim() {
            "b" => agent.buy(VOLUME, true, true).await.map(|_| ()),
            "s" => agent.sell(VOLUME, true, true).await.map(|_| ()),
            "c" => agent.close_all().await.map(|_| ()),
            "q" => break,
            _ => continue,
        };
        if let Err(e) = outcome {
            if e.is_unknown_outcome() {
                tracing::warn!("Outcome unknown, check the broker before retrying: {}", e);
            }
        }
        tracing::info!(
            "Open orders: {}, balance: {:.2}",
            agent.orders().len(),
            agent.balance()
        );
    }

    if let Err(e) = agent.close_all().await {
        tracing::error!("Orders left open on exit: {}", e);
    }
    Ok(())
}
