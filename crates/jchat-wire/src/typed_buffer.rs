//! Self-describing payload encoding built on [`ByteBuffer`]: every value is
//! preceded by a one-byte type tag, and reads verify the tag before
//! consuming the value bytes.

use crate::buffer::ByteBuffer;

/// The closed set of type tags the typed buffer format recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    Bool = 0,
    Char = 1,
    Int8 = 2,
    UInt8 = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    String = 11,
    Blob = 12,
}

/// A tag byte did not correspond to any known [`DataType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownDataType(pub u8);

impl std::fmt::Display for UnknownDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown typed-buffer tag byte {}", self.0)
    }
}

impl std::error::Error for UnknownDataType {}

impl TryFrom<u8> for DataType {
    type Error = UnknownDataType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => DataType::Bool,
            1 => DataType::Char,
            2 => DataType::Int8,
            3 => DataType::UInt8,
            4 => DataType::Int16,
            5 => DataType::UInt16,
            6 => DataType::Int32,
            7 => DataType::UInt32,
            8 => DataType::Int64,
            9 => DataType::UInt64,
            10 => DataType::Float,
            11 => DataType::String,
            12 => DataType::Blob,
            other => return Err(UnknownDataType(other)),
        })
    }
}

/// Why a typed read failed. Both variants leave the buffer's cursor
/// unchanged (verified by peeking the tag before any value bytes are
/// consumed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedReadError {
    /// The next tag byte did not match the type being read, or the tag byte
    /// itself was unrecognized.
    TagMismatch { expected: DataType, found: Option<DataType> },
    /// Fewer bytes remain than the tag or value requires.
    ShortRead,
    /// A `String` value's bytes were not valid UTF-8.
    InvalidUtf8,
}

impl std::fmt::Display for TypedReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypedReadError::TagMismatch { expected, found } => write!(
                f,
                "typed buffer tag mismatch: expected {:?}, found {:?}",
                expected, found
            ),
            TypedReadError::ShortRead => write!(f, "typed buffer short read"),
            TypedReadError::InvalidUtf8 => write!(f, "typed buffer string was not valid utf-8"),
        }
    }
}

impl std::error::Error for TypedReadError {}

/// Length prefix width for `String`/`Blob` payloads. Fixed at 32 bits rather
/// than the reference implementation's machine-sized `size_t`, so the wire
/// format does not vary by host pointer width (see SPEC_FULL.md §9).
type LengthPrefix = u32;

pub struct TypedBuffer {
    inner: ByteBuffer,
}

impl TypedBuffer {
    pub fn new(flip_endian: bool) -> Self {
        Self {
            inner: ByteBuffer::new(flip_endian),
        }
    }

    pub fn with_bytes(bytes: Vec<u8>, flip_endian: bool) -> Self {
        Self {
            inner: ByteBuffer::with_bytes(bytes, flip_endian),
        }
    }

    pub fn is_flipping_endian(&self) -> bool {
        self.inner.is_flipping_endian()
    }

    pub fn set_flip_endian(&mut self, flip_endian: bool) {
        self.inner.set_flip_endian(flip_endian);
    }

    pub fn rewind(&mut self) {
        self.inner.rewind();
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.inner.into_vec()
    }

    fn verify_tag(&self, expected: DataType) -> Result<(), TypedReadError> {
        let pos = self.inner.position();
        if pos >= self.inner.len() {
            return Err(TypedReadError::ShortRead);
        }
        let byte = self.inner.as_slice()[pos];
        let found = DataType::try_from(byte).ok();
        if found != Some(expected) {
            return Err(TypedReadError::TagMismatch { expected, found });
        }
        Ok(())
    }

    fn consume_tag(&mut self) {
        // Safe: verify_tag already confirmed a byte is present.
        self.inner.set_position(self.inner.position() + 1).expect("tag byte present");
    }
}

/// Generates tagged `write_x`/`read_x` pairs that delegate to the matching
/// untagged `ByteBuffer` primitive.
macro_rules! typed_primitive_accessors {
    ($($write:ident / $read:ident : $ty:ty => $tag:ident via $inner_write:ident / $inner_read:ident),+ $(,)?) => {
        impl TypedBuffer {
            $(
                pub fn $write(&mut self, value: $ty) {
                    self.inner.write_u8(DataType::$tag as u8);
                    self.inner.$inner_write(value);
                }

                pub fn $read(&mut self) -> Result<$ty, TypedReadError> {
                    self.verify_tag(DataType::$tag)?;
                    self.consume_tag();
                    self.inner.$inner_read().map_err(|_| TypedReadError::ShortRead)
                }
            )+
        }
    };
}

typed_primitive_accessors! {
    write_bool / read_bool: bool => Bool via write_bool / read_bool,
    write_char / read_char: u8 => Char via write_char / read_char,
    write_i8 / read_i8: i8 => Int8 via write_i8 / read_i8,
    write_u8 / read_u8: u8 => UInt8 via write_u8 / read_u8,
    write_i16 / read_i16: i16 => Int16 via write_i16 / read_i16,
    write_u16 / read_u16: u16 => UInt16 via write_u16 / read_u16,
    write_i32 / read_i32: i32 => Int32 via write_i32 / read_i32,
    write_u32 / read_u32: u32 => UInt32 via write_u32 / read_u32,
    write_i64 / read_i64: i64 => Int64 via write_i64 / read_i64,
    write_u64 / read_u64: u64 => UInt64 via write_u64 / read_u64,
    write_f32 / read_f32: f32 => Float via write_f32 / read_f32,
}

impl TypedBuffer {
    pub fn write_string(&mut self, value: &str) {
        self.inner.write_u8(DataType::String as u8);
        let bytes = value.as_bytes();
        self.inner.write_u32(bytes.len() as LengthPrefix);
        self.inner.write_array(bytes);
    }

    pub fn read_string(&mut self) -> Result<String, TypedReadError> {
        self.verify_tag(DataType::String)?;
        self.consume_tag();
        let len = self.inner.read_u32().map_err(|_| TypedReadError::ShortRead)? as usize;
        let bytes = self.inner.read_array(len).map_err(|_| TypedReadError::ShortRead)?;
        String::from_utf8(bytes).map_err(|_| TypedReadError::InvalidUtf8)
    }

    pub fn write_blob(&mut self, value: &[u8]) {
        self.inner.write_u8(DataType::Blob as u8);
        self.inner.write_u32(value.len() as LengthPrefix);
        self.inner.write_array(value);
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>, TypedReadError> {
        self.verify_tag(DataType::Blob)?;
        self.consume_tag();
        let len = self.inner.read_u32().map_err(|_| TypedReadError::ShortRead)? as usize;
        self.inner.read_array(len).map_err(|_| TypedReadError::ShortRead)
    }

    /// True once every byte of the buffer has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.inner.position() == self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_primitive() {
        let mut buf = TypedBuffer::new(false);
        buf.write_bool(true);
        buf.write_char(b'x');
        buf.write_i8(-1);
        buf.write_u8(200);
        buf.write_i16(-30000);
        buf.write_u16(60000);
        buf.write_i32(-1);
        buf.write_u32(u32::MAX);
        buf.write_i64(-1);
        buf.write_u64(u64::MAX);
        buf.write_f32(1.5);
        buf.write_string("hello");
        buf.write_blob(&[9, 8, 7]);

        buf.rewind();
        assert_eq!(buf.read_bool().unwrap(), true);
        assert_eq!(buf.read_char().unwrap(), b'x');
        assert_eq!(buf.read_i8().unwrap(), -1);
        assert_eq!(buf.read_u8().unwrap(), 200);
        assert_eq!(buf.read_i16().unwrap(), -30000);
        assert_eq!(buf.read_u16().unwrap(), 60000);
        assert_eq!(buf.read_i32().unwrap(), -1);
        assert_eq!(buf.read_u32().unwrap(), u32::MAX);
        assert_eq!(buf.read_i64().unwrap(), -1);
        assert_eq!(buf.read_u64().unwrap(), u64::MAX);
        assert_eq!(buf.read_f32().unwrap(), 1.5);
        assert_eq!(buf.read_string().unwrap(), "hello");
        assert_eq!(buf.read_blob().unwrap(), vec![9, 8, 7]);
        assert!(buf.is_exhausted());
    }

    #[test]
    fn tag_mismatch_leaves_cursor_unchanged() {
        let mut buf = TypedBuffer::new(false);
        buf.write_u32(42);
        buf.rewind();

        let before = buf.inner.position();
        assert!(buf.read_string().is_err());
        assert_eq!(buf.inner.position(), before);

        // The correctly-typed read still succeeds afterwards.
        assert_eq!(buf.read_u32().unwrap(), 42);
    }

    #[test]
    fn short_read_on_truncated_string_length() {
        let mut buf = TypedBuffer::new(false);
        buf.inner.write_u8(DataType::String as u8);
        // No length prefix bytes follow.
        assert!(matches!(buf.read_string(), Err(TypedReadError::ShortRead)));
    }

    #[test]
    fn unicode_round_trip() {
        let mut buf = TypedBuffer::new(true);
        buf.write_string("héllo 世界");
        buf.rewind();
        assert_eq!(buf.read_string().unwrap(), "héllo 世界");
    }
}
