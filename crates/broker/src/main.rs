use log::info;
use pedlar_broker::config::{parse_endpoint, parse_number};
use pedlar_broker::{BrokerConfig, BrokerServer};

fn print_help() {
    eprintln!(
        r#"lbroker - local execution broker

USAGE:
    lbroker [OPTIONS]

OPTIONS:
    -t, --ticker <ADDR>         Upstream ticker to subscribe to (default: tcp://127.0.0.1:7000)
    -b, --broker-host <ADDR>    Address to serve trade requests on (default: tcp://127.0.0.1:7100)
    -i, --order-id <N>          First order id to hand out (default: 1)
    -l, --leverage <N>          Account leverage (default: 100)
    -c, --config <PATH>         Load configuration from JSON file
    -h, --help                  Print this help message

ENVIRONMENT VARIABLES:
    PEDLAR_TICKER               Same as --ticker
    PEDLAR_BROKER               Same as --broker-host
    PEDLAR_ORDER_ID             Same as --order-id
    PEDLAR_LEVERAGE             Same as --leverage
    RUST_LOG                    Log level filter (default: info)

EXAMPLES:
    # Run with defaults
    lbroker

    # Resume ids after a restart
    lbroker --order-id 5000 --broker-host tcp://0.0.0.0:7100
"#
    );
}

fn flag_value(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i) {
        Some(value) => value.clone(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut flags: Vec<(String, String)> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                config_path = Some(flag_value(&args, i, "--config"));
            }
            flag @ ("--ticker" | "-t" | "--broker-host" | "-b" | "--order-id" | "-i"
            | "--leverage" | "-l") => {
                i += 1;
                flags.push((flag.to_string(), flag_value(&args, i, flag)));
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
            info!("Loading configuration from: {}", path);
            BrokerConfig::from_file(&path)?
        }
        None => BrokerConfig::default(),
    };
    config.apply_env()?;

    // Flags win over file and environment
    for (flag, value) in &flags {
        match flag.as_str() {
            "--ticker" | "-t" => config.ticker = parse_endpoint(flag, value)?,
            "--broker-host" | "-b" => config.broker_host = parse_endpoint(flag, value)?,
            "--order-id" | "-i" => config.order_id = parse_number(flag, value)?,
            _ => config.leverage = parse_number(flag, value)?,
        }
    }

    info!("Starting broker");
    info!("Ticker: {}", config.ticker);
    info!("Broker host: {}", config.broker_host);
    info!("First order id: {}", config.order_id);
    info!("Leverage: {}", config.leverage);

    let server = BrokerServer::start(&config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, stopping broker");

    let orphans = server.shutdown().await?;
    info!("Broker stopped with {} open order(s)", orphans.len());

    Ok(())
}
