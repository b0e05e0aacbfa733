use thiserror::Error;

use crate::ring::RingBuffer;

/// Minimum valid frame length: the 4-byte header with zero payload bytes.
const HEADER_LEN: usize = 4;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramerError {
    #[error("frame length {0} is shorter than the 4-byte header")]
    Invalid(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Ok(Packet),
    NeedMore,
}

/// Stateless wire framer over a [`RingBuffer`]: `[len:u16 BE][id:u16 BE][payload]`.
///
/// `len` counts the whole frame, header included, so the payload is
/// `len - HEADER_LEN` bytes. Callers loop `try_frame` until `NeedMore`.
pub struct PacketFramer;

impl PacketFramer {
    pub fn try_frame(buf: &mut RingBuffer) -> Result<FrameOutcome, FramerError> {
        if buf.occupancy() < HEADER_LEN {
            return Ok(FrameOutcome::NeedMore);
        }

        let header = buf.peek_to_vec(HEADER_LEN);
        let len = u16::from_be_bytes([header[0], header[1]]);
        if (len as usize) < HEADER_LEN {
            return Err(FramerError::Invalid(len));
        }

        let len = len as usize;
        if buf.occupancy() < len {
            return Ok(FrameOutcome::NeedMore);
        }

        let id = u16::from_be_bytes([header[2], header[3]]);
        let frame = buf.peek_to_vec(len);
        let payload = frame[HEADER_LEN..].to_vec();

        if let Err(err) = buf.consume(len) {
            fastport_utils::safe_panic!(
                "framer consume({len}) past occupancy already checked above: {err}"
            );
        }
        Ok(FrameOutcome::Ok(Packet { id, payload }))
    }

    /// Serializes `[len:u16 BE][id:u16 BE][payload]` directly into `buf`'s
    /// writable spans, without a heap scratch buffer. Returns the total frame
    /// length written, or an error if the ring cannot accept it (callers
    /// disconnect with BufferOverflow).
    pub fn write_frame(
        buf: &mut RingBuffer,
        id: u16,
        payload: &[u8],
    ) -> Result<usize, crate::ring::RingError> {
        let len = HEADER_LEN + payload.len();
        let available = buf.writable_len();
        if len > available {
            return Err(crate::ring::RingError::Overflow {
                requested: len,
                available,
            });
        }

        {
            let (first, second) = buf.writable_spans();
            let mut pos = 0;
            pos = write_spanned(first, second, pos, &(len as u16).to_be_bytes());
            pos = write_spanned(first, second, pos, &id.to_be_bytes());
            write_spanned(first, second, pos, payload);
        }
        buf.commit_write(len)?;
        Ok(len)
    }
}

/// Copies `bytes` into `(first, second)` starting at logical offset `pos`,
/// straddling the span boundary if `bytes` crosses it. Returns the new
/// offset. Callers must have already verified `bytes` fits within the
/// combined span.
fn write_spanned(first: &mut [u8], second: &mut [u8], pos: usize, bytes: &[u8]) -> usize {
    let mut remaining = bytes;
    let mut pos = pos;
    if pos < first.len() {
        let n = remaining.len().min(first.len() - pos);
        first[pos..pos + n].copy_from_slice(&remaining[..n]);
        remaining = &remaining[n..];
        pos += n;
    }
    if !remaining.is_empty() {
        let second_pos = pos - first.len();
        let n = remaining.len();
        second[second_pos..second_pos + n].copy_from_slice(remaining);
        pos += n;
    }
    pos
}
