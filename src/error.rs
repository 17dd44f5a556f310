//! Error taxonomy for the bridge, split along the lines of §7 of the design:
//! configuration/startup errors are fatal, per-connection errors are local
//! to a single relay and never escalate.

use std::net::SocketAddr;

/// A numeric address string failed to parse.
#[derive(Debug, thiserror::Error)]
#[error("{host:?} is not a numeric address: {source}")]
pub struct AddressError {
    pub host: String,
    #[source]
    pub source: std::net::AddrParseError,
}

/// Fatal errors raised during startup. Any of these aborts the whole
/// process with a diagnostic on stderr and exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("failed to open socket for {addr}: {source}")]
    Socket {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to drop privileges to uid/gid {uid}/{gid}: {source}")]
    PrivilegeDrop {
        uid: u32,
        gid: u32,
        #[source]
        source: nix::Error,
    },

    #[error("failed to fork into the background: {0}")]
    Fork(#[source] nix::Error),

    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

/// A per-connection failure. All variants are local to one relay; the
/// supervisor never observes these.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zero-length DNS message")]
    ZeroLengthMessage,

    #[error("peer closed the connection")]
    Eof,

    #[error("idle timeout elapsed")]
    IdleTimeout,

    #[error("relay cancelled during shutdown")]
    Cancelled,
}

impl RelayError {
    /// Cancellation is expected teardown, not a genuine error; callers use
    /// this to decide whether a failure is worth a log line.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelayError::Cancelled)
    }
}
