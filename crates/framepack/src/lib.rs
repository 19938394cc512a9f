//! # Framepack
//!
//! A small, self-describing, bounded serialization format for RPC frames.
//!
//! ## Philosophy
//!
//! - **Self-Describing**: Every value carries its tag, so a reader can decode a value
//!   it knows nothing about (`Decoder::value`) or skip it entirely (`Decoder::skip`).
//! - **Counted Containers**: Arrays and maps declare their element count up front.
//!   A frame is an array whose count is known before any element is read.
//! - **Positioned Errors**: Every decode failure reports the byte offset of the
//!   item that caused it.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Count: 4b][Item; Count]` (map items are key/value pairs)
//!
//! All integers are Little-Endian.

mod decoder;
mod encoder;
mod traits;
mod value;


pub use crate::decoder::Decoder;
pub use crate::encoder::Encoder;
pub use crate::traits::Pack;
pub use crate::traits::Unpack;
pub use crate::value::Value;

/// What went wrong, independent of where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// The item on the wire is not of the requested type.
    TypeMismatch { expected: &'static str, found: Tag },
    /// An integer on the wire does not fit the requested width.
    IntegerOverflow { target: &'static str },
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Blob length exceeds `u32::MAX` or the decoder's limit.
    BlobTooLarge(usize),
    /// Container count exceeds the decoder's limit.
    ContainerTooLarge(usize),
    /// Values are nested deeper than the decoder's limit.
    DepthExceeded(usize),
    /// Structural Violation: finalized the buffer with items still owed.
    ScopeStillOpen { missing: usize },
    /// Structural Violation: a map key must be a string.
    InvalidMapKey(Tag),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UnexpectedEnd => write!(f, "unexpected end of input"),
            ErrorKind::InvalidTag(b) => write!(f, "invalid tag byte: {:#04x}", b),
            ErrorKind::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            ErrorKind::IntegerOverflow { target } => write!(f, "integer out of range for {}", target),
            ErrorKind::InvalidUtf8 => write!(f, "invalid utf-8 in string"),
            ErrorKind::BlobTooLarge(n) => write!(f, "blob too large: {} bytes", n),
            ErrorKind::ContainerTooLarge(n) => write!(f, "container too large: {} items", n),
            ErrorKind::DepthExceeded(max) => write!(f, "nesting depth exceeds {}", max),
            ErrorKind::ScopeStillOpen { missing } => {
                write!(f, "container still open: {} items missing", missing)
            }
            ErrorKind::InvalidMapKey(tag) => write!(f, "map keys must be strings, found {}", tag),
        }
    }
}

/// Framepack serialization and deserialization errors.
///
/// `pos` is the byte offset into the buffer at which the failing item starts
/// (decoding) or at which the failing write would have landed (encoding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pos: usize,
    kind: ErrorKind,
}

impl Error {
    pub fn new(pos: usize, kind: ErrorKind) -> Self {
        Self { pos, kind }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[pos {}]: {}", self.pos, self.kind)
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for Framepack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the type of the encoded value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Nil = 0x00,

    // Fixed-width scalars
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    U8 = 0x03,
    U16 = 0x04,
    U32 = 0x05,
    U64 = 0x06,
    S8 = 0x07,
    S16 = 0x08,
    S32 = 0x09,
    S64 = 0x0A,
    F32 = 0x0B,
    F64 = 0x0C,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Bytes = 0x11,

    // Containers (Tag + u32 Count + Items)
    Array = 0x20,
    Map = 0x21,
}

impl Tag {
    /// Returns the Tag variant for a given byte, or `None` if invalid.
    pub const fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Tag::Nil),
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::U8),
            0x04 => Some(Tag::U16),
            0x05 => Some(Tag::U32),
            0x06 => Some(Tag::U64),
            0x07 => Some(Tag::S8),
            0x08 => Some(Tag::S16),
            0x09 => Some(Tag::S32),
            0x0A => Some(Tag::S64),
            0x0B => Some(Tag::F32),
            0x0C => Some(Tag::F64),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Bytes),
            0x20 => Some(Tag::Array),
            0x21 => Some(Tag::Map),
            _ => None,
        }
    }

    /// Human-readable name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Tag::Nil => "nil",
            Tag::BoolTrue | Tag::BoolFalse => "bool",
            Tag::U8 => "u8",
            Tag::U16 => "u16",
            Tag::U32 => "u32",
            Tag::U64 => "u64",
            Tag::S8 => "s8",
            Tag::S16 => "s16",
            Tag::S32 => "s32",
            Tag::S64 => "s64",
            Tag::F32 => "f32",
            Tag::F64 => "f64",
            Tag::String => "string",
            Tag::Bytes => "bytes",
            Tag::Array => "array",
            Tag::Map => "map",
        }
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Tag::U8 | Tag::U16 | Tag::U32 | Tag::U64 | Tag::S8 | Tag::S16 | Tag::S32 | Tag::S64
        )
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resource bounds enforced by the `Decoder`.
///
/// Frames come off the network, so every length and count read from the wire
/// is checked against these before it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum container nesting for `skip` and `value`.
    pub max_depth: usize,
    /// Maximum byte length of a single string or bytes blob.
    pub max_blob_len: usize,
    /// Maximum declared item count of a single array or map.
    pub max_container_len: usize,
}

impl Limits {
    pub const DEFAULT: Limits = Limits {
        max_depth: 64,
        max_blob_len: 16 * 1024 * 1024,
        max_container_len: 1 << 20,
    };
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULT
    }
}
