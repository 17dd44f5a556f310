//! Fixed sizes and timeouts that govern the relay's wire protocol and
//! admission policy. Mirrors the constants of the original select-loop
//! implementation this crate descends from.

use std::time::Duration;

/// Size of the DNS-over-TCP length prefix, in bytes.
pub const HEADER_LEN: usize = 2;

/// Largest DNS message the 16-bit length prefix can describe.
pub const MAX_MSG_LEN: usize = 65_535;

/// Per-direction buffer capacity: one length prefix plus one max-size message.
pub const BUF_SIZE: usize = HEADER_LEN + MAX_MSG_LEN;

/// Read size requested when the length prefix has not arrived yet, to
/// amortize short reads without over-allocating ahead of need.
pub const READAHEAD: usize = 512;

/// Per-connection inactivity limit; a relay with no successful I/O for this
/// long is closed.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Global concurrent TCP connection cap.
pub const MAX_CONN: usize = 300;

/// `listen()` backlog per bind address.
pub const LISTEN_BACKLOG: i32 = 10;

/// DNS well-known port, implicit in the CLI's address arguments.
pub const DNS_PORT: u16 = 53;

/// Unprivileged uid/gid the supervisor drops root privileges to.
pub const UNPRIVILEGED_UID: u32 = 65534;
pub const UNPRIVILEGED_GID: u32 = 65534;
