//! Persistent, auto-reconnecting TCP connection.
//!
//! Both the Graphite link and the forwarding link are instances of this one
//! abstraction, not a per-site concern. The bounded-backoff wait loop here
//! generalizes a fixed short retry into a capped exponential backoff for
//! TCP dials.
//!
//! **Documented policy**: a write
//! attempt blocks, redialing with backoff, until the connection succeeds
//! and the write completes. No payload is ever silently discarded by this
//! type; the bounded outbound queue in front of it (see [`spawn_writer`])
//! is the backpressure mechanism, not payload drop.

use crossbeam::channel::Receiver;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// State machine: `Disconnected -> Connecting -> Connected`, looping back
/// to `Disconnected` on any write failure. Terminal only on process exit.
enum State {
    Disconnected,
    Connected(TcpStream),
}

/// A long-lived TCP client that transparently redials on failure.
pub struct PersistentConn {
    addr: SocketAddr,
    state: State,
}

impl PersistentConn {
    /// Creates a connection in the `Disconnected` state; the first write
    /// triggers the initial dial.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: State::Disconnected,
        }
    }

    fn dial(&mut self) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match TcpStream::connect(self.addr) {
                Ok(stream) => {
                    self.state = State::Connected(stream);
                    return;
                }
                Err(err) => {
                    warn!("dial to {} failed: {err}, retrying in {backoff:?}", self.addr);
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    /// Writes `payload` to the connection, dialing first if necessary and
    /// redialing on write failure. Blocks until the write succeeds.
    pub fn write_all(&mut self, payload: &[u8]) {
        loop {
            if matches!(self.state, State::Disconnected) {
                self.dial();
            }
            let State::Connected(stream) = &mut self.state else {
                unreachable!("dial() always leaves us Connected");
            };
            match stream.write_all(payload) {
                Ok(()) => return,
                Err(err) => {
                    warn!("write to {} failed: {err}, invalidating connection", self.addr);
                    self.state = State::Disconnected;
                }
            }
        }
    }

    /// Idempotent: drops the underlying socket if one is open.
    pub fn close(&mut self) {
        self.state = State::Disconnected;
    }
}

/// Spawns a dedicated writer thread owning one [`PersistentConn`], draining
/// `payloads` in order. The caller is expected to size `payloads`'
/// (bounded) capacity: flush producers block on send once it's full rather
/// than the writer ever dropping a payload.
pub fn spawn_writer(
    addr: SocketAddr,
    payloads: Receiver<Vec<u8>>,
    shutdown: Receiver<()>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut conn = PersistentConn::new(addr);
        loop {
            crossbeam::select! {
                recv(payloads) -> msg => {
                    match msg {
                        Ok(payload) => conn.write_all(&payload),
                        Err(_) => {
                            conn.close();
                            return;
                        }
                    }
                }
                recv(shutdown) -> _ => {
                    conn.close();
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn writes_survive_a_redial() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"hello");
        });

        let mut conn = PersistentConn::new(addr);
        conn.write_all(b"hello");
        server.join().unwrap();
    }
}
