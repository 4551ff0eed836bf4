//! Growable byte sequence with a cursor and configurable endian flip.
//!
//! Writes before the current end overwrite in place; writes at or past the
//! end append. Reads fail without moving the cursor when too few bytes
//! remain.

/// Returned when a read would need more bytes than remain in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead;

impl std::fmt::Display for ShortRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "short read: not enough bytes remaining in buffer")
    }
}

impl std::error::Error for ShortRead {}

/// Returned by [`ByteBuffer::set_position`] when asked to seek past the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOutOfRange {
    pub requested: usize,
    pub len: usize,
}

impl std::fmt::Display for PositionOutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position {} is past the end of a buffer of length {}",
            self.requested, self.len
        )
    }
}

impl std::error::Error for PositionOutOfRange {}

/// A growable `Vec<u8>` with a cursor, used as the foundation for the typed
/// buffer encoding.
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
    flip_endian: bool,
}

impl ByteBuffer {
    pub fn new(flip_endian: bool) -> Self {
        Self {
            data: Vec::new(),
            position: 0,
            flip_endian,
        }
    }

    pub fn with_bytes(bytes: Vec<u8>, flip_endian: bool) -> Self {
        Self {
            data: bytes,
            position: 0,
            flip_endian,
        }
    }

    pub fn is_flipping_endian(&self) -> bool {
        self.flip_endian
    }

    pub fn set_flip_endian(&mut self, flip_endian: bool) {
        self.flip_endian = flip_endian;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Fails if `position` would land past the end of the buffer. Unlike the
    /// reference implementation's `size() - 1` bound (which underflows on an
    /// empty buffer), positioning exactly at `len` is allowed.
    pub fn set_position(&mut self, position: usize) -> Result<(), PositionOutOfRange> {
        if position > self.data.len() {
            return Err(PositionOutOfRange {
                requested: position,
                len: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.position = 0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Remaining bytes between the cursor and the end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Writes raw bytes at the cursor, overwriting in place if the write
    /// lands entirely before the current end, otherwise appending.
    pub fn write_array(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    /// Reads `len` raw bytes from the cursor. Fails without moving the
    /// cursor if fewer than `len` bytes remain.
    pub fn read_array(&mut self, len: usize) -> Result<Vec<u8>, ShortRead> {
        if self.remaining() < len {
            return Err(ShortRead);
        }
        let out = self.data[self.position..self.position + len].to_vec();
        self.position += len;
        Ok(out)
    }

    fn maybe_flip(&self, bytes: &mut [u8]) {
        if self.flip_endian && bytes.len() > 1 {
            bytes.reverse();
        }
    }
}

/// Generates `write_x`/`read_x` primitive pairs on [`ByteBuffer`].
macro_rules! primitive_accessors {
    ($($write:ident / $read:ident : $ty:ty),+ $(,)?) => {
        impl ByteBuffer {
            $(
                pub fn $write(&mut self, value: $ty) {
                    let mut bytes = value.to_ne_bytes();
                    self.maybe_flip(&mut bytes);
                    self.write_array(&bytes);
                }

                pub fn $read(&mut self) -> Result<$ty, ShortRead> {
                    const SIZE: usize = std::mem::size_of::<$ty>();
                    let mut bytes: [u8; SIZE] = self.read_array(SIZE)?.try_into().unwrap();
                    self.maybe_flip(&mut bytes);
                    Ok(<$ty>::from_ne_bytes(bytes))
                }
            )+
        }
    };
}

primitive_accessors! {
    write_i8 / read_i8: i8,
    write_u8 / read_u8: u8,
    write_i16 / read_i16: i16,
    write_u16 / read_u16: u16,
    write_i32 / read_i32: i32,
    write_u32 / read_u32: u32,
    write_i64 / read_i64: i64,
    write_u64 / read_u64: u64,
    write_f32 / read_f32: f32,
}

impl ByteBuffer {
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn read_bool(&mut self) -> Result<bool, ShortRead> {
        Ok(self.read_u8()? != 0)
    }

    /// The reference protocol's 8-bit `char` type; kept distinct from
    /// `i8`/`u8` at the typed-buffer layer even though the representation
    /// is identical.
    pub fn write_char(&mut self, value: u8) {
        self.write_u8(value);
    }

    pub fn read_char(&mut self) -> Result<u8, ShortRead> {
        self.read_u8()
    }
}

/// True when the host's native byte order is little-endian; used to decide
/// the `flip_endian` flag for buffers that carry wire data, since the wire
/// format is fixed big-endian (see SPEC_FULL.md §9).
pub const fn host_is_little_endian() -> bool {
    cfg!(target_endian = "little")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_round_trip_no_flip() {
        let mut buf = ByteBuffer::new(false);
        buf.write_u32(0x01020304);
        buf.write_i16(-7);
        buf.rewind();
        assert_eq!(buf.read_u32().unwrap(), 0x01020304);
        assert_eq!(buf.read_i16().unwrap(), -7);
    }

    #[test]
    fn primitive_round_trip_with_flip() {
        let mut buf = ByteBuffer::new(true);
        buf.write_u32(0x01020304);
        assert_eq!(buf.as_slice(), &[0x04, 0x03, 0x02, 0x01]);
        buf.rewind();
        assert_eq!(buf.read_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn write_before_end_overwrites_in_place() {
        let mut buf = ByteBuffer::new(false);
        buf.write_u32(0xFFFFFFFF);
        buf.set_position(0).unwrap();
        buf.write_u16(0);
        assert_eq!(buf.len(), 4);
        buf.rewind();
        assert_eq!(buf.read_u16().unwrap(), 0);
        assert_eq!(buf.read_u16().unwrap(), 0xFFFF);
    }

    #[test]
    fn read_past_end_is_short_read_and_does_not_move_cursor() {
        let mut buf = ByteBuffer::new(false);
        buf.write_u8(1);
        buf.rewind();
        assert!(buf.read_u32().is_err());
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn set_position_rejects_past_end_but_allows_exactly_at_end() {
        let mut buf = ByteBuffer::new(false);
        buf.write_array(&[1, 2, 3]);
        assert!(buf.set_position(3).is_ok());
        assert!(buf.set_position(4).is_err());

        let mut empty = ByteBuffer::new(false);
        assert!(empty.set_position(0).is_ok());
    }

    #[test]
    fn clear_resets_length_and_position() {
        let mut buf = ByteBuffer::new(false);
        buf.write_array(&[1, 2, 3]);
        buf.clear();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.position(), 0);
    }
}
