//! Wraps/unwraps a transport byte stream into discrete protocol frames.
//!
//! Header layout (7 bytes, fixed big-endian on the wire):
//! ```text
//! offset  size  field
//! 0       1     component id
//! 1       2     message id
//! 3       4     body length (bytes)
//! 7       N     body
//! ```

use bytes::{Buf, BytesMut};

pub const HEADER_LEN: usize = 7;

/// An upper bound on a single frame's body, well above the protocol's own
/// 1024-byte message-body limit, purely to stop a corrupt or hostile peer
/// from making the decoder allocate unbounded memory while it waits for the
/// rest of a frame.
pub const MAX_BODY_LEN: u32 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub component_id: u8,
    pub message_id: u16,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(component_id: u8, message_id: u16, body: Vec<u8>) -> Self {
        Self {
            component_id,
            message_id,
            body,
        }
    }

    /// Serializes this frame's header + body to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        out.push(self.component_id);
        out.extend_from_slice(&self.message_id.to_be_bytes());
        out.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

/// A frame's body length field claimed more bytes than this decoder is
/// willing to buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyTooLarge {
    pub declared: u32,
    pub limit: u32,
}

impl std::fmt::Display for BodyTooLarge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frame body length {} exceeds limit {}",
            self.declared, self.limit
        )
    }
}

impl std::error::Error for BodyTooLarge {}

/// Accumulates bytes read from a transport and yields zero or more complete
/// [`Frame`]s. Tolerates headers split arbitrarily across reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Appends newly-read transport bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pulls the next complete frame out of the buffer, if one is fully
    /// present. Returns `Ok(None)` when more bytes are needed; call this in
    /// a loop after each `feed` until it returns `None`.
    pub fn try_decode_one(&mut self) -> Result<Option<Frame>, BodyTooLarge> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let component_id = self.buf[0];
        let message_id = u16::from_be_bytes([self.buf[1], self.buf[2]]);
        let body_len = u32::from_be_bytes([self.buf[3], self.buf[4], self.buf[5], self.buf[6]]);

        if body_len > MAX_BODY_LEN {
            return Err(BodyTooLarge {
                declared: body_len,
                limit: MAX_BODY_LEN,
            });
        }

        let total_len = HEADER_LEN + body_len as usize;
        if self.buf.len() < total_len {
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        let body = self.buf.split_to(body_len as usize).to_vec();

        Ok(Some(Frame::new(component_id, message_id, body)))
    }

    /// Drains every fully-buffered frame currently available.
    pub fn decode_all(&mut self) -> Result<Vec<Frame>, BodyTooLarge> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_decode_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// True when no partial frame remains buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_decodes_one_frame() {
        let frame = Frame::new(2, 4, vec![1, 2, 3]);
        let bytes = frame.encode();

        let mut dec = FrameDecoder::new();
        dec.feed(&bytes);
        let decoded = dec.try_decode_one().unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(dec.is_empty());
    }

    #[test]
    fn tolerates_header_split_across_feeds() {
        let frame = Frame::new(1, 300, vec![9; 10]);
        let bytes = frame.encode();

        let mut dec = FrameDecoder::new();
        for chunk in bytes.chunks(1) {
            dec.feed(chunk);
        }
        let decoded = dec.try_decode_one().unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decodes_concatenated_frames_fed_in_small_chunks() {
        let frames = vec![
            Frame::new(0, 0, vec![]),
            Frame::new(1, 1, vec![7, 7]),
            Frame::new(2, 15, (0..50).collect()),
        ];
        let mut all_bytes = Vec::new();
        for f in &frames {
            all_bytes.extend(f.encode());
        }

        let mut dec = FrameDecoder::new();
        let mut decoded = Vec::new();
        for chunk in all_bytes.chunks(3) {
            dec.feed(chunk);
            decoded.extend(dec.decode_all().unwrap());
        }

        assert_eq!(decoded, frames);
        assert!(dec.is_empty());
    }

    #[test]
    fn rejects_oversized_body_length() {
        let mut dec = FrameDecoder::new();
        let mut header = vec![0u8];
        header.extend_from_slice(&0u16.to_be_bytes());
        header.extend_from_slice(&(MAX_BODY_LEN + 1).to_be_bytes());
        dec.feed(&header);
        assert!(dec.try_decode_one().is_err());
    }
}
