//! Byte buffer, typed buffer, and frame codec: the wire-level foundation
//! the jchat protocol is built on. No knowledge of components, dispatch, or
//! chat semantics lives here — see `jchat-protocol` and `jchat-core`.

mod buffer;
mod frame;
mod typed_buffer;

pub use buffer::{ByteBuffer, PositionOutOfRange, ShortRead, host_is_little_endian};
pub use frame::{BodyTooLarge, Frame, FrameDecoder, HEADER_LEN, MAX_BODY_LEN};
pub use typed_buffer::{DataType, TypedBuffer, TypedReadError, UnknownDataType};
