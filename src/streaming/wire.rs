//! Wire framing for the command channel
//!
//! Every message in either direction is one frame:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ JSON payload             │
//! │ Big-endian u32   │ (UTF-8, ≤ 64 KiB)        │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! ## Error handling
//!
//! - **Oversized length**: connection closed
//! - **Undecodable JSON**: error response, connection stays open
//! - **Read timeout before a length prefix**: not an error, lets the reader
//!   re-check its shutdown flag

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{ErrorKind, Read, Write};

/// Largest accepted payload
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Initial capacity for the read buffer (typical request size)
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Serialize a message to a JSON payload
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Deserialize a JSON payload
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one length-prefixed frame
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(Error::Protocol(format!(
            "Frame too large: {} bytes",
            payload.len()
        )));
    }
    let len = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads frames into a reusable buffer.
///
/// Progress survives read timeouts: a length prefix or payload split across
/// several reads is resumed on the next call instead of being discarded.
pub struct FrameReader {
    header: [u8; 4],
    buffer: Vec<u8>,
    /// Bytes of the current header or payload received so far
    filled: usize,
    /// Payload length once the header is complete
    expected: Option<usize>,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one partial read
enum Fill {
    Done,
    TimedOut,
}

fn fill<R: Read>(reader: &mut R, dst: &mut [u8], filled: &mut usize) -> Result<Fill> {
    while *filled < dst.len() {
        match reader.read(&mut dst[*filled..]) {
            Ok(0) => return Err(Error::Io(ErrorKind::UnexpectedEof.into())),
            Ok(n) => *filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                return Ok(Fill::TimedOut);
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(Fill::Done)
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            header: [0u8; 4],
            buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
            filled: 0,
            expected: None,
        }
    }

    /// Read one frame.
    ///
    /// Returns `Ok(None)` if the read timed out before the frame was complete;
    /// call again to continue. EOF surfaces as `Error::Io` with `UnexpectedEof`.
    pub fn read_frame<R: Read>(&mut self, reader: &mut R) -> Result<Option<&[u8]>> {
        if self.expected.is_none() {
            if let Fill::TimedOut = fill(reader, &mut self.header, &mut self.filled)? {
                return Ok(None);
            }
            let len = u32::from_be_bytes(self.header) as usize;
            self.filled = 0;
            if len > MAX_FRAME_LEN {
                return Err(Error::Protocol(format!("Frame too large: {} bytes", len)));
            }
            self.buffer.clear();
            self.buffer.resize(len, 0);
            self.expected = Some(len);
        }

        if let Fill::TimedOut = fill(reader, &mut self.buffer, &mut self.filled)? {
            return Ok(None);
        }
        self.filled = 0;
        self.expected = None;
        Ok(Some(&self.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_layout() {
        let mut out = Vec::new();
        write_frame(&mut out, b"{}").unwrap();
        assert_eq!(out, vec![0, 0, 0, 2, b'{', b'}']);

        let mut reader = FrameReader::new();
        let mut input = Cursor::new(out);
        assert_eq!(reader.read_frame(&mut input).unwrap(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut input = Cursor::new(((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec());
        let mut reader = FrameReader::new();
        assert!(matches!(
            reader.read_frame(&mut input),
            Err(Error::Protocol(_))
        ));

        let big = vec![b' '; MAX_FRAME_LEN + 1];
        assert!(write_frame(&mut Vec::new(), &big).is_err());
    }

    /// Delivers its chunks one per read, timing out between them
    struct Trickle {
        chunks: Vec<Vec<u8>>,
        timeout_next: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.timeout_next {
                self.timeout_next = false;
                return Err(ErrorKind::WouldBlock.into());
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            self.timeout_next = true;
            let chunk = self.chunks.remove(0);
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.insert(0, chunk[n..].to_vec());
            }
            Ok(n)
        }
    }

    #[test]
    fn test_split_frame_resumes_after_timeouts() {
        let mut frame = Vec::new();
        write_frame(&mut frame, br#"{"type":"Health"}"#).unwrap();
        write_frame(&mut frame, b"{}").unwrap();
        // Split inside the first prefix and inside the first payload
        let mut input = Trickle {
            chunks: vec![
                frame[..2].to_vec(),
                frame[2..7].to_vec(),
                frame[7..].to_vec(),
            ],
            timeout_next: false,
        };

        let mut reader = FrameReader::new();
        let mut frames = Vec::new();
        let mut timeouts = 0;
        while frames.len() < 2 {
            match reader.read_frame(&mut input).unwrap() {
                Some(payload) => frames.push(payload.to_vec()),
                None => timeouts += 1,
            }
        }
        assert!(timeouts >= 2);
        assert_eq!(frames[0], br#"{"type":"Health"}"#.to_vec());
        assert_eq!(frames[1], b"{}".to_vec());
    }

    #[test]
    fn test_eof_is_io_error() {
        let mut reader = FrameReader::new();
        let mut input = Cursor::new(Vec::new());
        match reader.read_frame(&mut input) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected EOF, got {:?}", other.map(|f| f.map(<[u8]>::to_vec))),
        }
    }
}
