//! State-machine driven encoder.

use crate::Error;
use crate::ErrorKind;
use crate::Result;
use crate::Tag;
use crate::traits::Pack;
use crate::value::Value;

/// Internal state tracking for an open container on the `Encoder` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Array,
    Map,
}

/// An open container that is still owed `remaining` items.
struct Frame {
    scope: Scope,
    remaining: usize,
}

/// A bounded encoder for counted containers.
///
/// # Structural Invariants
///
/// Containers declare their item count when they begin. The encoder counts items
/// as they are written and closes a container as soon as its last item begins;
/// anything written after that belongs to the enclosing container (or the root,
/// which holds any number of items).
///
/// 1.  **Map Keys**: Every even-indexed item of a map must be a string.
/// 2.  **Finalizing**: `into_bytes` fails with `ScopeStillOpen` if any container
///     is still owed items.
pub struct Encoder {
    buf: Vec<u8>,
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates a new encoder with default capacity.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
            stack: Vec::with_capacity(8),
        }
    }

    /// Consumes the encoder and returns the final byte vector.
    ///
    /// # Errors
    /// Returns `ScopeStillOpen` if a container is still owed items.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if let Some(missing) = self.missing() {
            return Err(Error::new(self.buf.len(), ErrorKind::ScopeStillOpen { missing }));
        }
        Ok(self.buf)
    }

    /// Returns a view of the current buffer.
    ///
    /// # Errors
    /// Returns `ScopeStillOpen` if a container is still owed items.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        if let Some(missing) = self.missing() {
            return Err(Error::new(self.buf.len(), ErrorKind::ScopeStillOpen { missing }));
        }
        Ok(&self.buf)
    }

    fn missing(&self) -> Option<usize> {
        let missing: usize = self.stack.iter().map(|frame| frame.remaining).sum();
        (missing > 0).then_some(missing)
    }

    /// Accounts for one item starting with `tag` in the innermost container.
    fn begin_item(&mut self, tag: Tag) -> Result<()> {
        let pos = self.buf.len();
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };

        // Map items alternate key, value; `remaining` is even on a key.
        if frame.scope == Scope::Map && frame.remaining % 2 == 0 && tag != Tag::String {
            return Err(Error::new(pos, ErrorKind::InvalidMapKey(tag)));
        }

        frame.remaining -= 1;
        if frame.remaining == 0 {
            self.stack.pop();
        }
        Ok(())
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.begin_item(tag)?;
        self.buf.push(tag as u8);
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| Error::new(self.buf.len(), ErrorKind::BlobTooLarge(len)))?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }

    fn write_blob(&mut self, tag: Tag, bytes: &[u8]) -> Result<()> {
        if bytes.len() > u32::MAX as usize {
            return Err(Error::new(self.buf.len(), ErrorKind::BlobTooLarge(bytes.len())));
        }
        self.write_tag(tag)?;
        self.write_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn begin_container(&mut self, tag: Tag, scope: Scope, count: usize) -> Result<()> {
        let items = match scope {
            Scope::Array => Some(count),
            Scope::Map => count.checked_mul(2),
        };
        let Some(items) = items.filter(|_| count <= u32::MAX as usize) else {
            return Err(Error::new(self.buf.len(), ErrorKind::ContainerTooLarge(count)));
        };

        self.write_tag(tag)?;
        self.write_len(count)?;
        if items > 0 {
            self.stack.push(Frame { scope, remaining: items });
        }
        Ok(())
    }

    /// Encodes nil.
    pub fn nil(&mut self) -> Result<()> { self.write_tag(Tag::Nil) }

    /// Encodes a boolean value.
    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.write_tag(if v { Tag::BoolTrue } else { Tag::BoolFalse })
    }

    /// Encodes an unsigned 8-bit integer.
    pub fn u8(&mut self, v: u8) -> Result<()> { self.write_tag(Tag::U8)?; self.buf.push(v); Ok(()) }
    /// Encodes a signed 8-bit integer.
    pub fn s8(&mut self, v: i8) -> Result<()> { self.write_tag(Tag::S8)?; self.buf.push(v as u8); Ok(()) }

    /// Encodes an unsigned 16-bit integer (LE).
    pub fn u16(&mut self, v: u16) -> Result<()> { self.write_tag(Tag::U16)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }
    /// Encodes a signed 16-bit integer (LE).
    pub fn s16(&mut self, v: i16) -> Result<()> { self.write_tag(Tag::S16)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }

    /// Encodes an unsigned 32-bit integer (LE).
    pub fn u32(&mut self, v: u32) -> Result<()> { self.write_tag(Tag::U32)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }
    /// Encodes a signed 32-bit integer (LE).
    pub fn s32(&mut self, v: i32) -> Result<()> { self.write_tag(Tag::S32)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }

    /// Encodes an unsigned 64-bit integer (LE).
    pub fn u64(&mut self, v: u64) -> Result<()> { self.write_tag(Tag::U64)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }
    /// Encodes a signed 64-bit integer (LE).
    pub fn s64(&mut self, v: i64) -> Result<()> { self.write_tag(Tag::S64)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }

    /// Encodes a 32-bit float (LE).
    pub fn f32(&mut self, v: f32) -> Result<()> { self.write_tag(Tag::F32)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }
    /// Encodes a 64-bit float (LE).
    pub fn f64(&mut self, v: f64) -> Result<()> { self.write_tag(Tag::F64)?; self.buf.extend_from_slice(&v.to_le_bytes()); Ok(()) }

    /// Encodes an unsigned integer using the narrowest unsigned tag that holds it.
    pub fn uint(&mut self, v: u64) -> Result<()> {
        if let Ok(v) = u8::try_from(v) {
            self.u8(v)
        } else if let Ok(v) = u16::try_from(v) {
            self.u16(v)
        } else if let Ok(v) = u32::try_from(v) {
            self.u32(v)
        } else {
            self.u64(v)
        }
    }

    /// Encodes a signed integer using the narrowest tag that holds it.
    ///
    /// Non-negative values use unsigned tags.
    pub fn int(&mut self, v: i64) -> Result<()> {
        if v >= 0 {
            return self.uint(v as u64);
        }
        if let Ok(v) = i8::try_from(v) {
            self.s8(v)
        } else if let Ok(v) = i16::try_from(v) {
            self.s16(v)
        } else if let Ok(v) = i32::try_from(v) {
            self.s32(v)
        } else {
            self.s64(v)
        }
    }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> { self.write_blob(Tag::String, v.as_bytes()) }

    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> { self.write_blob(Tag::Bytes, v) }

    /// Begins an Array of exactly `count` items.
    ///
    /// The array closes itself once `count` items have been written.
    pub fn array(&mut self, count: usize) -> Result<()> {
        self.begin_container(Tag::Array, Scope::Array, count)
    }

    /// Begins a Map of exactly `count` key/value pairs.
    ///
    /// # Invariants
    /// - **Strict:** Keys must be written with `str()`.
    pub fn map(&mut self, count: usize) -> Result<()> {
        self.begin_container(Tag::Map, Scope::Map, count)
    }

    /// Encodes a dynamic value.
    pub fn value(&mut self, v: &Value) -> Result<()> {
        match v {
            Value::Nil => self.nil(),
            Value::Bool(b) => self.bool(*b),
            Value::Int(n) => self.int(*n),
            Value::UInt(n) => self.uint(*n),
            Value::Float(x) => self.f64(*x),
            Value::Str(s) => self.str(s),
            Value::Bytes(b) => self.bytes(b),
            Value::Array(items) => {
                self.array(items.len())?;
                for item in items {
                    self.value(item)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                self.map(entries.len())?;
                for (key, item) in entries {
                    self.str(key)?;
                    self.value(item)?;
                }
                Ok(())
            }
        }
    }

    /// Encodes any `Pack` value.
    pub fn pack<T: Pack + ?Sized>(&mut self, v: &T) -> Result<()> {
        v.pack(self)
    }
}
