//! The forwarding wire frame: a length-prefixed,
//! self-describing binary encoding of a `name -> summed value` map.
//!
//! `bincode` is the chosen canonical encoding (this was an open
//! choice); grounded on its use elsewhere in the retrieved corpus
//! (`surrealdb-surrealdb` uses `bincode` for self-describing binary
//! payloads). The `u32` big-endian length prefix is what makes multiple
//! frames streamable over one connection.

use crate::error::MetricsError;
use std::collections::HashMap;
use std::io::{Read, Write};

const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Encodes `bundle` as one length-prefixed frame.
///
/// # Errors
/// Returns [`MetricsError::FrameDecode`] if the map fails to serialize.
pub fn encode(bundle: &HashMap<String, f64>) -> Result<Vec<u8>, MetricsError> {
    let body = bincode::serialize(bundle)?;
    let mut frame = Vec::with_capacity(4 + body.len());
    #[allow(clippy::cast_possible_truncation)]
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Reads exactly one frame from `reader`, blocking until the full frame
/// arrives. Returns `Ok(None)` on a clean end-of-stream before any bytes of
/// the next frame's length prefix were read.
///
/// # Errors
/// Returns [`MetricsError::FrameDecode`] on a malformed length prefix, an
/// oversized frame, a truncated body, or invalid `bincode`.
pub fn decode_one<R: Read>(reader: &mut R) -> Result<Option<HashMap<String, f64>>, MetricsError> {
    let mut len_buf = [0u8; 4];
    if !read_exact_or_eof(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(MetricsError::FrameDecode(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte limit"
        )));
    }
    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .map_err(|e| MetricsError::FrameDecode(format!("truncated frame body: {e}")))?;
    let bundle = bincode::deserialize(&body)?;
    Ok(Some(bundle))
}

/// Like `Read::read_exact`, but returns `Ok(false)` instead of erroring if
/// zero bytes were available before EOF (a clean stream close between
/// frames), and still errors on a partial read (a frame cut mid-length-prefix).
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, MetricsError> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => {
                if total == 0 {
                    return Ok(false);
                }
                return Err(MetricsError::FrameDecode(
                    "stream ended mid length-prefix".to_string(),
                ));
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(MetricsError::StdIo(e)),
        }
    }
    Ok(true)
}

/// Writes `payload` (an already-[`encode`]d frame) to `writer`.
///
/// # Errors
/// Returns [`MetricsError::StdIo`] on write failure.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), MetricsError> {
    writer.write_all(payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_bit_exact() {
        let mut bundle = HashMap::new();
        bundle.insert("hits".to_string(), 5.0);
        bundle.insert("errors.bad_message".to_string(), 1.5);

        let frame = encode(&bundle).unwrap();
        let mut cursor = std::io::Cursor::new(frame);
        let decoded = decode_one(&mut cursor).unwrap().unwrap();

        assert_eq!(decoded.len(), bundle.len());
        for (key, value) in &bundle {
            assert_eq!(decoded[key].to_bits(), value.to_bits());
        }
    }

    #[test]
    fn multiple_frames_stream_over_one_buffer() {
        let mut a = HashMap::new();
        a.insert("a".to_string(), 1.0);
        let mut b = HashMap::new();
        b.insert("b".to_string(), 2.0);

        let mut buf = encode(&a).unwrap();
        buf.extend(encode(&b).unwrap());

        let mut cursor = std::io::Cursor::new(buf);
        let first = decode_one(&mut cursor).unwrap().unwrap();
        let second = decode_one(&mut cursor).unwrap().unwrap();
        assert_eq!(first["a"], 1.0);
        assert_eq!(second["b"], 2.0);
        assert!(decode_one(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn clean_eof_between_frames_yields_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(decode_one(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_length_prefix_errors() {
        let mut cursor = std::io::Cursor::new(vec![0u8, 1u8]);
        assert!(decode_one(&mut cursor).is_err());
    }
}
