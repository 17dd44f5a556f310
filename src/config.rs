//! Startup configuration: CLI surface and numeric address resolution.
//!
//! Resolution here is deliberately dumb — numeric host parsing only, no DNS
//! lookups of the arguments themselves, matching the source's use of
//! `AI_NUMERICHOST`.

use std::net::{IpAddr, SocketAddr};

use clap::Parser;

use crate::constants::DNS_PORT;
use crate::error::AddressError;

/// TCP-to-UDP DNS transport bridge.
///
/// Accepts DNS-over-TCP queries on one or more local addresses and forwards
/// each to a single upstream resolver over UDP.
#[derive(Parser, Debug)]
#[command(name = "dns-relay", about, version)]
pub struct Cli {
    /// Numeric IP address of the upstream UDP DNS resolver (port 53)
    pub upstream: String,

    /// Numeric local addresses to bind for TCP (port 53); at least one required
    #[arg(required = true, num_args = 1..)]
    pub listen: Vec<String>,

    /// Stay in the foreground instead of forking into the background
    #[arg(short, long)]
    pub foreground: bool,

    /// Skip dropping privileges to the unprivileged uid/gid pair (for tests
    /// and non-root development runs)
    #[arg(long)]
    pub no_privilege_drop: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// An immutable IP+port pair, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    /// Parse a numeric IPv4 or IPv6 host string paired with `port`.
    pub fn parse_numeric(host: &str, port: u16) -> Result<Self, AddressError> {
        let ip: IpAddr = host
            .parse()
            .map_err(|source| AddressError { host: host.to_string(), source })?;
        Ok(Self(SocketAddr::new(ip, port)))
    }

    pub fn addr(self) -> SocketAddr {
        self.0
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully resolved startup configuration.
pub struct Config {
    pub listen_endpoints: Vec<Endpoint>,
    pub upstream_endpoint: Endpoint,
    pub daemonize: bool,
    pub drop_privileges: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, AddressError> {
        let upstream_endpoint = Endpoint::parse_numeric(&cli.upstream, DNS_PORT)?;
        let listen_endpoints = cli
            .listen
            .iter()
            .map(|host| Endpoint::parse_numeric(host, DNS_PORT))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            listen_endpoints,
            upstream_endpoint,
            daemonize: !cli.foreground,
            drop_privileges: !cli.no_privilege_drop,
        })
    }
}
