//! Zero-copy, position-tracking decoder.

use crate::Error;
use crate::ErrorKind;
use crate::Limits;
use crate::Result;
use crate::Tag;
use crate::traits::Unpack;
use crate::value::Value;

/// Generates a strict fixed-width reader: the tag must match exactly.
macro_rules! decode_fixed {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $tag:expr, $size:literal) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            self.expect_tag($tag, stringify!($name))?;
            let bytes = self.read_array::<$size>()?;
            Ok(<$ty>::from_le_bytes(bytes))
        }
    };
}

/// A bounds-checked cursor over a byte slice.
///
/// The decoder tracks its absolute offset into the buffer so that every error
/// can report where the offending item starts. Reading advances the cursor;
/// a failed read leaves the cursor wherever the failure was detected.
///
/// # Errors
/// All read operations return `UnexpectedEnd` if the buffer is exhausted.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    limits: Limits,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the slice with default limits.
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_limits(buf, Limits::default())
    }

    /// Creates a decoder over the slice with explicit limits.
    pub fn with_limits(buf: &'a [u8], limits: Limits) -> Self {
        Self { buf, pos: 0, limits }
    }

    /// Absolute byte offset of the next item.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    fn fail<T>(&self, pos: usize, kind: ErrorKind) -> Result<T> {
        Err(Error::new(pos, kind))
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let Some(&b) = self.buf.get(self.pos) else {
            return self.fail(self.pos, ErrorKind::UnexpectedEnd);
        };
        match Tag::from_u8(b) {
            Some(tag) => Ok(tag),
            None => self.fail(self.pos, ErrorKind::InvalidTag(b)),
        }
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return self.fail(self.pos, ErrorKind::UnexpectedEnd);
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u32_raw(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?) as usize)
    }

    /// Consumes the tag if it matches, otherwise fails at the item's position
    /// without advancing.
    fn expect_tag(&mut self, expected: Tag, what: &'static str) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag != expected {
            return self.fail(self.pos, ErrorKind::TypeMismatch { expected: what, found: tag });
        }
        self.pos += 1;
        Ok(())
    }

    /// Decodes an integer of any width as `i128`.
    ///
    /// Every wire integer fits, so this never fails with `IntegerOverflow`.
    pub fn wide_int(&mut self) -> Result<i128> {
        let start = self.pos;
        let tag = self.peek_tag()?;
        if !tag.is_integer() {
            return self.fail(start, ErrorKind::TypeMismatch { expected: "integer", found: tag });
        }
        self.pos += 1;
        let v = match tag {
            Tag::U8 => self.read_array::<1>()?[0] as i128,
            Tag::U16 => u16::from_le_bytes(self.read_array::<2>()?) as i128,
            Tag::U32 => u32::from_le_bytes(self.read_array::<4>()?) as i128,
            Tag::U64 => u64::from_le_bytes(self.read_array::<8>()?) as i128,
            Tag::S8 => self.read_array::<1>()?[0] as i8 as i128,
            Tag::S16 => i16::from_le_bytes(self.read_array::<2>()?) as i128,
            Tag::S32 => i32::from_le_bytes(self.read_array::<4>()?) as i128,
            Tag::S64 => i64::from_le_bytes(self.read_array::<8>()?) as i128,
            _ => unreachable!("checked by is_integer"),
        };
        Ok(v)
    }

    /// Decodes nil.
    pub fn nil(&mut self) -> Result<()> { self.expect_tag(Tag::Nil, "nil") }

    /// Decodes a bool.
    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => { self.pos += 1; Ok(true) },
            Tag::BoolFalse => { self.pos += 1; Ok(false) },
            tag => self.fail(self.pos, ErrorKind::TypeMismatch { expected: "bool", found: tag }),
        }
    }

    decode_fixed!(/// Decodes u8.
        u8, u8, Tag::U8, 1);
    decode_fixed!(/// Decodes u16 (LE).
        u16, u16, Tag::U16, 2);
    decode_fixed!(/// Decodes u32 (LE).
        u32, u32, Tag::U32, 4);
    decode_fixed!(/// Decodes u64 (LE).
        u64, u64, Tag::U64, 8);
    decode_fixed!(/// Decodes s8.
        s8, i8, Tag::S8, 1);
    decode_fixed!(/// Decodes s16 (LE).
        s16, i16, Tag::S16, 2);
    decode_fixed!(/// Decodes s32 (LE).
        s32, i32, Tag::S32, 4);
    decode_fixed!(/// Decodes s64 (LE).
        s64, i64, Tag::S64, 8);
    decode_fixed!(/// Decodes f32 (LE).
        f32, f32, Tag::F32, 4);
    decode_fixed!(/// Decodes f64 (LE).
        f64, f64, Tag::F64, 8);

    /// Decodes an integer of any width as `u64`.
    ///
    /// Widening is lossless; negative values fail with `IntegerOverflow`.
    pub fn uint(&mut self) -> Result<u64> {
        let start = self.pos;
        let v = self.wide_int()?;
        u64::try_from(v).or_else(|_| self.fail(start, ErrorKind::IntegerOverflow { target: "u64" }))
    }

    /// Decodes an integer of any width as `i64`.
    ///
    /// Widening is lossless; `u64` values above `i64::MAX` fail with `IntegerOverflow`.
    pub fn int(&mut self) -> Result<i64> {
        let start = self.pos;
        let v = self.wide_int()?;
        i64::try_from(v).or_else(|_| self.fail(start, ErrorKind::IntegerOverflow { target: "i64" }))
    }

    fn read_blob(&mut self, expected: Tag, what: &'static str) -> Result<&'a [u8]> {
        let start = self.pos;
        self.expect_tag(expected, what)?;
        let len = self.read_u32_raw()?;
        if len > self.limits.max_blob_len {
            return self.fail(start, ErrorKind::BlobTooLarge(len));
        }
        self.read_bytes(len)
    }

    /// Decodes a string slice (UTF-8).
    pub fn str(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let bytes = self.read_blob(Tag::String, "string")?;
        std::str::from_utf8(bytes).or_else(|_| self.fail(start, ErrorKind::InvalidUtf8))
    }

    /// Decodes a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.read_blob(Tag::Bytes, "bytes")
    }

    fn read_container(&mut self, expected: Tag, what: &'static str) -> Result<usize> {
        let start = self.pos;
        self.expect_tag(expected, what)?;
        let count = self.read_u32_raw()?;
        if count > self.limits.max_container_len {
            return self.fail(start, ErrorKind::ContainerTooLarge(count));
        }
        Ok(count)
    }

    /// Reads an Array header and returns its declared item count.
    ///
    /// The items follow inline; the caller reads exactly `count` of them.
    pub fn array(&mut self) -> Result<usize> {
        self.read_container(Tag::Array, "array")
    }

    /// Reads a Map header and returns its declared pair count.
    ///
    /// Each pair is a `str()` key followed by a value.
    pub fn map(&mut self) -> Result<usize> {
        self.read_container(Tag::Map, "map")
    }

    /// Skips the next item and its nested children.
    pub fn skip(&mut self) -> Result<()> {
        self.skip_impl(0)
    }

    fn skip_impl(&mut self, depth: usize) -> Result<()> {
        if depth > self.limits.max_depth {
            return self.fail(self.pos, ErrorKind::DepthExceeded(self.limits.max_depth));
        }

        match self.peek_tag()? {
            Tag::Nil | Tag::BoolTrue | Tag::BoolFalse => { self.pos += 1; }
            tag if tag.is_integer() => { self.wide_int()?; }
            Tag::F32 => { self.f32()?; }
            Tag::F64 => { self.f64()?; }
            Tag::String => { self.str()?; }
            Tag::Bytes => { self.bytes()?; }
            Tag::Array => {
                let count = self.array()?;
                for _ in 0..count {
                    self.skip_impl(depth + 1)?;
                }
            }
            Tag::Map => {
                let count = self.map()?;
                for _ in 0..count {
                    self.str()?;
                    self.skip_impl(depth + 1)?;
                }
            }
            _ => unreachable!("integers handled above"),
        }
        Ok(())
    }

    /// Decodes the next item into a dynamic `Value`.
    pub fn value(&mut self) -> Result<Value> {
        self.value_impl(0)
    }

    fn value_impl(&mut self, depth: usize) -> Result<Value> {
        if depth > self.limits.max_depth {
            return self.fail(self.pos, ErrorKind::DepthExceeded(self.limits.max_depth));
        }

        let value = match self.peek_tag()? {
            Tag::Nil => { self.pos += 1; Value::Nil }
            Tag::BoolTrue | Tag::BoolFalse => Value::Bool(self.bool()?),
            tag if tag.is_integer() => {
                let v = self.wide_int()?;
                match i64::try_from(v) {
                    Ok(n) => Value::Int(n),
                    Err(_) => Value::UInt(v as u64),
                }
            }
            Tag::F32 => Value::Float(self.f32()? as f64),
            Tag::F64 => Value::Float(self.f64()?),
            Tag::String => Value::Str(self.str()?.to_string()),
            Tag::Bytes => Value::Bytes(self.bytes()?.to_vec()),
            Tag::Array => {
                let count = self.array()?;
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.value_impl(depth + 1)?);
                }
                Value::Array(items)
            }
            Tag::Map => {
                let count = self.map()?;
                let mut entries = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    let key = self.str()?.to_string();
                    entries.push((key, self.value_impl(depth + 1)?));
                }
                Value::Map(entries)
            }
            _ => unreachable!("integers handled above"),
        };
        Ok(value)
    }

    /// Decodes the next item into any `Unpack` type.
    pub fn unpack<T: Unpack>(&mut self) -> Result<T> {
        T::unpack(self)
    }
}
