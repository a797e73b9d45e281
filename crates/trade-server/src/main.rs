use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use trade_core::dex::{build_party, FixtureSpeciesLookup};

use trade_server::config::{LogLevel, PartySource, ServerConfig};
use trade_server::server::Server;

fn init_logging(log_level: LogLevel) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_filter_str()))
        .format_timestamp_millis()
        .init();
}

/// Impersonates a second Game Boy over BGB's link-cable TCP protocol and
/// drives a Generation II trade to completion.
#[derive(Parser)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 9999)]
    port: u16,

    /// Trainer name to present to the peer
    #[arg(long, default_value = "TRADER")]
    trainer_name: String,

    /// Path to a party spec file; a built-in demo party is used when omitted
    #[arg(long)]
    party: Option<PathBuf>,

    /// Logging verbosity
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

fn config_from_args(args: Args) -> Result<ServerConfig, String> {
    let bind_addr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| format!("invalid host/port {}:{}: {e}", args.host, args.port))?;
    let party_source = match args.party {
        Some(path) => PartySource::File(path),
        None => PartySource::Demo { trainer_name: args.trainer_name },
    };
    Ok(ServerConfig { bind_addr, log_level: args.log_level.unwrap_or_default(), party_source })
}

fn main() {
    let args = Args::parse();
    let config = match config_from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    init_logging(config.log_level);

    let spec = match config.resolve_party() {
        Ok(spec) => spec,
        Err(e) => {
            error!("failed to resolve party: {e}");
            std::process::exit(1);
        }
    };

    let lookup = FixtureSpeciesLookup::new();
    let party = match build_party(&spec, &lookup) {
        Ok(party) => party,
        Err(e) => {
            error!("failed to build party: {e}");
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config.bind_addr) {
        Ok(server) => server,
        Err(e) => {
            error!("failed to bind {}: {e}", config.bind_addr);
            std::process::exit(1);
        }
    };

    info!("pkm-trade-server listening on {}, trainer={}", config.bind_addr, spec.trainer_name);

    // No portable stdlib SIGINT hook; the process exits on Ctrl-C like any
    // other blocking CLI server. `Server::stop` exists for embedders and
    // is exercised by the crate's own tests.
    server.serve(&party);
    server.join();
    info!("shut down");
}
