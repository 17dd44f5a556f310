//! One listener per configured bind address: accepts TCP connections,
//! applies admission policy and per-socket options, and hands each
//! connection off to a freshly constructed [`Relay`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;

use crate::admission::{Admission, AdmissionGuard};
use crate::constants::{BUF_SIZE, LISTEN_BACKLOG};
use crate::error::StartupError;
use crate::relay::Relay;

/// Opens, configures, binds and listens on `addr`, returning a plain
/// blocking socket. Must run before the async runtime starts (and, when
/// daemonizing, before the fork) so the listening fd is inherited cleanly by
/// the child.
pub fn bind_std(addr: SocketAddr) -> Result<std::net::TcpListener, StartupError> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|source| StartupError::Socket { addr, source })?;

    socket.set_reuse_address(true).map_err(|source| StartupError::Socket { addr, source })?;

    // Each configured bind address gets its own Listener, so binding the
    // IPv6 wildcard here must never also claim the IPv4 space.
    if addr.is_ipv6() {
        socket.set_only_v6(true).map_err(|source| StartupError::Socket { addr, source })?;
    }

    socket.set_nonblocking(true).map_err(|source| StartupError::Socket { addr, source })?;

    socket.bind(&addr.into()).map_err(|source| StartupError::Bind { addr, source })?;
    socket.listen(LISTEN_BACKLOG).map_err(|source| StartupError::Listen { addr, source })?;

    Ok(socket.into())
}

/// Sets `SO_RCVBUF`/`SO_SNDBUF` on a freshly accepted client socket to match
/// the relay's per-direction buffer capacity.
fn configure_client_socket(stream: &TcpStream) -> std::io::Result<()> {
    let sock_ref = socket2::SockRef::from(stream);
    sock_ref.set_recv_buffer_size(BUF_SIZE)?;
    sock_ref.set_send_buffer_size(BUF_SIZE)?;
    Ok(())
}

/// Opens a UDP socket dedicated to one connection and connects it to the
/// upstream resolver, so replies are correlated without tracking DNS
/// transaction IDs.
async fn connect_upstream(upstream: SocketAddr) -> std::io::Result<UdpSocket> {
    let bind_addr: SocketAddr =
        if upstream.is_ipv6() { ([0, 0, 0, 0, 0, 0, 0, 0], 0).into() } else { ([0, 0, 0, 0], 0).into() };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(upstream).await?;
    Ok(socket)
}

pub struct Listener {
    acceptor: tokio::net::TcpListener,
    bind_addr: SocketAddr,
}

impl Listener {
    /// Wrap an already-bound, already-listening std socket for use on the
    /// async runtime.
    pub fn new(std_listener: std::net::TcpListener, bind_addr: SocketAddr) -> Result<Self, StartupError> {
        let acceptor = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|source| StartupError::Socket { addr: bind_addr, source })?;
        Ok(Self { acceptor, bind_addr })
    }

    /// Spawn the perpetual accept loop as its own task.
    pub fn spawn(
        self,
        upstream: SocketAddr,
        admission: Arc<Admission>,
        idle_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.accept_loop(upstream, admission, idle_timeout, shutdown))
    }

    async fn accept_loop(
        self,
        upstream: SocketAddr,
        admission: Arc<Admission>,
        idle_timeout: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let accepted = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                res = self.acceptor.accept() => res,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(bind = %self.bind_addr, error = %e, "accept failed");
                    continue;
                }
            };

            // Admission is checked after accept (rather than suppressing
            // accept while saturated) per the listener contract: close the
            // new socket immediately, no handshake attempted.
            if !admission.try_admit() {
                tracing::debug!(%peer, bind = %self.bind_addr, "connection rejected: admission saturated");
                drop(stream);
                continue;
            }
            let guard = AdmissionGuard::new(admission.clone());

            if let Err(e) = configure_client_socket(&stream) {
                tracing::warn!(%peer, error = %e, "failed to configure accepted socket");
                drop(guard);
                continue;
            }

            let outgoing = match connect_upstream(upstream).await {
                Ok(socket) => socket,
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "failed to open upstream socket");
                    drop(guard);
                    continue;
                }
            };

            let relay = Relay::new(stream, outgoing, peer, idle_timeout, guard);
            tokio::spawn(relay.run(shutdown.clone()));
        }
    }
}
