//! The forwarding upstream: accepts TCP connections from leaves,
//! decodes their binary frames, and additively merges each bundle into the
//! main aggregator's store via [`Inbound::Merge`].
//!
//! Keepalive tuning follows `socket2`-backed `TcpStream` tuning; the accept
//! loop follows the general shape of "spawn one thread per unit of work,
//! feed a shared channel." Graceful shutdown of the accept loop is not a
//! first-class concern — the listener runs until the process exits or a
//! fatal accept error occurs.

use super::frame;
use crate::aggregate::Inbound;
use crate::error::MetricsError;
use crate::meta;
use crossbeam::channel::Sender;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const KEEPALIVE_PERIOD: Duration = Duration::from_secs(30);

/// Runs the forwarding-upstream accept loop to completion. Returns only on
/// a fatal listener error; per-connection errors are logged and routed to
/// meta-stats instead of tearing down the listener.
///
/// `merge_tx` is the forwarded-upstream aggregator's inbound channel, where
/// decoded bundles are merged. `main_tx` is the main aggregator's inbound
/// channel, where meta-stats (e.g. a malformed frame) are always routed,
/// regardless of which aggregator the connection itself feeds.
///
/// # Errors
/// Returns [`MetricsError::StdIo`] if the listener cannot be bound, or if
/// `accept` fails with a non-transient error.
pub fn run(addr: SocketAddr, merge_tx: Sender<Inbound>, main_tx: Sender<Inbound>) -> Result<(), MetricsError> {
    let listener = TcpListener::bind(addr)?;
    info!("forwarding upstream listening on {addr}");

    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                apply_keepalive(&stream);
                let merge_tx = merge_tx.clone();
                let main_tx = main_tx.clone();
                std::thread::spawn(move || decode_connection(stream, peer, &merge_tx, &main_tx));
            }
            Err(err) if is_transient(&err) => {
                warn!("transient accept error on {addr}: {err}");
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(err) => {
                error!("fatal accept error on {addr}, forwarding upstream stopping: {err}");
                return Err(err.into());
            }
        }
    }
}

/// Decodes frames from one accepted connection until it closes or a
/// malformed frame is read, forwarding each decoded bundle to `merge_tx`
/// for merge and any decode-error meta-stat to `main_tx`.
fn decode_connection(mut stream: TcpStream, peer: SocketAddr, merge_tx: &Sender<Inbound>, main_tx: &Sender<Inbound>) {
    loop {
        match frame::decode_one(&mut stream) {
            Ok(Some(bundle)) => {
                if merge_tx.send(Inbound::Merge(bundle)).is_err() {
                    return;
                }
            }
            Ok(None) => {
                debug!("forwarding connection from {peer} closed cleanly");
                return;
            }
            Err(err) => {
                warn!("forwarding connection from {peer} sent a malformed frame: {err}");
                let _ = main_tx.send(Inbound::Stat(meta::increment(meta::FORWARDED_MESSAGE_READ)));
                return;
            }
        }
    }
}

fn apply_keepalive(stream: &TcpStream) {
    let sock = socket2::SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new().with_time(KEEPALIVE_PERIOD);
    if let Err(err) = sock.set_tcp_keepalive(&keepalive) {
        warn!("failed to set forwarding keepalive: {err}");
    }
}

/// Errors worth retrying the accept loop on instead of shutting it down:
/// the ones that reflect a one-off condition on a single pending connection
/// rather than the listening socket itself being broken.
fn is_transient(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::WouldBlock
    )
}
