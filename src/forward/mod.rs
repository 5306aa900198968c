//! The forwarding subsystem: a leaf role that ships
//! counters to an upstream instance over a binary-framed TCP link, and an
//! upstream role that accepts and merges them.

pub mod frame;
pub mod leaf;
pub mod upstream;
