//! The per-connection TCP↔UDP relay.
//!
//! Expressed as a single async task with sequential `await`s, which is the
//! preferred shape for this state machine in a language with first-class
//! async: `Reading` is the inner framing loop, `Forwarding` is the UDP send,
//! `AwaitingReply` is the UDP recv, `Writing` is the TCP write-all. Every
//! transition out of `Reading`/`Forwarding`/`AwaitingReply`/`Writing` on
//! success rearms the idle timer by construction, since each step is wrapped
//! in a fresh `timeout`.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;

use crate::admission::AdmissionGuard;
use crate::constants::{BUF_SIZE, HEADER_LEN, MAX_MSG_LEN, READAHEAD};
use crate::error::RelayError;

/// Outcome of inspecting the bytes accumulated so far in the request buffer.
enum Frame {
    /// Not enough bytes yet for a complete message.
    Incomplete,
    /// The declared length was zero — a protocol violation.
    ZeroLength,
    /// A complete message is present; `usize` is its total length including
    /// the 2-byte header.
    Complete(usize),
}

fn inspect(buf: &[u8]) -> Frame {
    if buf.len() < HEADER_LEN {
        return Frame::Incomplete;
    }
    let msg_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if msg_len == 0 {
        return Frame::ZeroLength;
    }
    let total = HEADER_LEN + msg_len;
    if buf.len() < total { Frame::Incomplete } else { Frame::Complete(total) }
}

/// How many bytes to ask the next TCP read for, given what's already
/// buffered. Requests `READAHEAD` bytes while the header hasn't arrived,
/// otherwise exactly what's missing from the known message length.
fn next_read_size(buf: &[u8], filled: usize) -> usize {
    let want = if filled < HEADER_LEN {
        READAHEAD
    } else {
        let msg_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        (HEADER_LEN + msg_len).saturating_sub(filled).max(1)
    };
    want.min(BUF_SIZE - filled)
}

/// One accepted TCP connection paired with its dedicated, connected UDP
/// socket to the upstream resolver.
pub struct Relay {
    incoming: TcpStream,
    outgoing: UdpSocket,
    peer: SocketAddr,
    idle_timeout: Duration,
    _admission: AdmissionGuard,
}

impl Relay {
    pub fn new(
        incoming: TcpStream,
        outgoing: UdpSocket,
        peer: SocketAddr,
        idle_timeout: Duration,
        admission: AdmissionGuard,
    ) -> Self {
        Self { incoming, outgoing, peer, idle_timeout, _admission: admission }
    }

    /// Drive the relay to completion. Never panics and never propagates an
    /// error to the caller: every failure mode here is local to this
    /// connection and terminates only this task.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        match self.serve(&mut shutdown).await {
            Ok(()) => unreachable!("serve only returns via an error variant"),
            Err(e) if e.is_cancelled() => {
                tracing::trace!(peer = %self.peer, "relay cancelled during shutdown");
            }
            Err(RelayError::Eof) => {
                tracing::trace!(peer = %self.peer, "connection closed by peer");
            }
            Err(RelayError::IdleTimeout) => {
                tracing::debug!(peer = %self.peer, "relay closed: idle timeout");
            }
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "relay closed with error");
            }
        }
        let _ = self.incoming.shutdown().await;
    }

    /// Runs the read-frame / forward / receive-reply / write-reply cycle
    /// until the connection ends. Always returns `Err`; the only question
    /// is which.
    async fn serve(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<(), RelayError> {
        let mut request = vec![0u8; BUF_SIZE];
        let mut response = vec![0u8; BUF_SIZE];
        let mut filled = 0usize;

        loop {
            // Drain any complete messages already sitting in the buffer
            // (pipelined queries) before issuing a fresh read.
            loop {
                match inspect(&request[..filled]) {
                    Frame::Incomplete => break,
                    Frame::ZeroLength => return Err(RelayError::ZeroLengthMessage),
                    Frame::Complete(total) => {
                        self.forward_and_reply(&request[HEADER_LEN..total], &mut response, shutdown)
                            .await?;
                        request.copy_within(total..filled, 0);
                        filled -= total;
                    }
                }
            }

            let want = next_read_size(&request[..filled], filled);
            let n = guarded(
                self.idle_timeout,
                shutdown,
                self.incoming.read(&mut request[filled..filled + want]),
            )
            .await?;
            if n == 0 {
                return Err(RelayError::Eof);
            }
            filled += n;
        }
    }

    /// `Forwarding` → `AwaitingReply` → `Writing`, for one complete message.
    async fn forward_and_reply(
        &mut self,
        payload: &[u8],
        response: &mut [u8],
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        guarded(self.idle_timeout, shutdown, self.outgoing.send(payload)).await?;

        let reply_len = guarded(
            self.idle_timeout,
            shutdown,
            self.outgoing.recv(&mut response[HEADER_LEN..HEADER_LEN + MAX_MSG_LEN]),
        )
        .await?;

        response[..HEADER_LEN].copy_from_slice(&(reply_len as u16).to_be_bytes());

        guarded(
            self.idle_timeout,
            shutdown,
            self.incoming.write_all(&response[..HEADER_LEN + reply_len]),
        )
        .await?;

        Ok(())
    }
}

/// Races a single I/O future against the idle timer and the shutdown
/// signal. A future that neither completes nor times out within
/// `idle_timeout` closes the relay; a shutdown notification during the
/// wait is swallowed as cancellation, not logged as a failure.
async fn guarded<T>(
    idle_timeout: Duration,
    shutdown: &mut watch::Receiver<bool>,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T, RelayError> {
    if *shutdown.borrow() {
        return Err(RelayError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = shutdown.changed() => Err(RelayError::Cancelled),
        res = tokio::time::timeout(idle_timeout, fut) => match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RelayError::Io(e)),
            Err(_elapsed) => Err(RelayError::IdleTimeout),
        },
    }
}
