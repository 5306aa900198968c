//! Networking primitives shared by the Graphite emitter and the forwarding
//! subsystem: the persistent, auto-reconnecting TCP connection.

pub mod persistent;

pub use persistent::{spawn_writer, PersistentConn};
