//! The process-wide root object: resolves configuration, binds listeners,
//! drops privileges, daemonizes, then runs the listeners until a
//! termination signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;

use crate::admission::Admission;
use crate::config::Config;
use crate::constants::{IDLE_TIMEOUT, MAX_CONN, UNPRIVILEGED_GID, UNPRIVILEGED_UID};
use crate::error::StartupError;
use crate::listener::{self, Listener};

/// Everything resolved and opened by the synchronous, pre-runtime part of
/// startup (steps 1-4 of §4.3): numeric address resolution, socket bind,
/// privilege drop, and daemonization.
pub struct Bootstrap {
    std_listeners: Vec<(std::net::TcpListener, SocketAddr)>,
    upstream: SocketAddr,
}

/// Steps 1 through 4 of the startup sequence. Must run before the tokio
/// runtime is built: forking a multi-threaded runtime would strand its
/// worker threads in the parent.
pub fn bootstrap(config: &Config) -> Result<Bootstrap, StartupError> {
    let mut std_listeners = Vec::with_capacity(config.listen_endpoints.len());
    for endpoint in &config.listen_endpoints {
        let addr = endpoint.addr();
        let std_listener = listener::bind_std(addr)?;
        std_listeners.push((std_listener, addr));
        tracing::info!(%addr, "bound listener");
    }

    if config.drop_privileges {
        crate::privilege::drop_privileges(UNPRIVILEGED_UID, UNPRIVILEGED_GID)?;
        tracing::info!(uid = UNPRIVILEGED_UID, gid = UNPRIVILEGED_GID, "dropped privileges");
    }

    if config.daemonize {
        // On success this only returns in the child; the parent exits here.
        crate::privilege::daemonize()?;
    }

    Ok(Bootstrap { std_listeners, upstream: config.upstream_endpoint.addr() })
}

/// Steps 5-6: subscribe to termination signals, start every listener, and
/// run until a signal arrives.
pub async fn run(bootstrap: Bootstrap) -> Result<(), StartupError> {
    let admission = Arc::new(Admission::new(MAX_CONN));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(bootstrap.std_listeners.len());
    for (std_listener, bind_addr) in bootstrap.std_listeners {
        let listener = Listener::new(std_listener, bind_addr)?;
        handles.push(listener.spawn(
            bootstrap.upstream,
            admission.clone(),
            IDLE_TIMEOUT,
            shutdown_rx.clone(),
        ));
        tracing::info!(%bind_addr, upstream = %bootstrap.upstream, "listener started");
    }

    wait_for_termination().await?;
    tracing::info!("termination signal received, shutting down");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Waits for `SIGINT` or `SIGTERM`. Both request graceful shutdown. Failure
/// to install either handler is a fatal startup error, not a panic.
async fn wait_for_termination() -> Result<(), StartupError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).map_err(StartupError::Signal)?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map_err(StartupError::Signal)?,
        _ = sigterm.recv() => {}
    }

    Ok(())
}
