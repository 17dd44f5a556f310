//! dns-relay - a TCP-to-UDP DNS transport bridge.
//!
//! Forwards DNS-over-TCP queries to a single upstream UDP resolver and
//! relays the reply back. See `dns_relay::supervisor` for the startup
//! sequence.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dns_relay::config::{Cli, Config};
use dns_relay::supervisor;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Resolve addresses, bind sockets, drop privileges and (optionally) fork
    // *before* the async runtime exists: forking a multi-threaded runtime
    // would strand its worker threads in the parent process.
    let bootstrap = match supervisor::bootstrap(&config) {
        Ok(bootstrap) => bootstrap,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(dns_relay::error::StartupError::Runtime)
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(supervisor::run(bootstrap)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "dns_relay=info",
        1 => "dns_relay=debug",
        _ => "dns_relay=trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}
