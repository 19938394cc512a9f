//! Typed encode and decode targets.

use crate::Decoder;
use crate::Encoder;
use crate::Error;
use crate::ErrorKind;
use crate::Result;
use crate::Tag;
use crate::value::Value;

/// A value that can write itself into an `Encoder` as exactly one item.
pub trait Pack {
    fn pack(&self, enc: &mut Encoder) -> Result<()>;
}

/// A value that can read itself from exactly one item of a `Decoder`.
pub trait Unpack: Sized {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self>;
}

/// Integers pack with the narrowest tag and unpack from any integer tag that
/// fits, so the wire never dictates the Rust width.
macro_rules! impl_int {
    ($($ty:ty => $wide:ident, $write:ident);* $(;)?) => {$(
        impl Pack for $ty {
            fn pack(&self, enc: &mut Encoder) -> Result<()> {
                enc.$write((*self).into())
            }
        }

        impl Unpack for $ty {
            fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
                let start = dec.pos();
                let wide = dec.$wide()?;
                <$ty>::try_from(wide).map_err(|_| {
                    Error::new(start, ErrorKind::IntegerOverflow { target: stringify!($ty) })
                })
            }
        }
    )*};
}

impl_int! {
    u8 => uint, uint;
    u16 => uint, uint;
    u32 => uint, uint;
    u64 => uint, uint;
    i8 => int, int;
    i16 => int, int;
    i32 => int, int;
    i64 => int, int;
}

impl Pack for () {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { enc.nil() }
}

impl Unpack for () {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> { dec.nil() }
}

impl Pack for bool {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { enc.bool(*self) }
}

impl Unpack for bool {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> { dec.bool() }
}

impl Pack for f32 {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { enc.f32(*self) }
}

impl Unpack for f32 {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> { dec.f32() }
}

impl Pack for f64 {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { enc.f64(*self) }
}

impl Unpack for f64 {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        match dec.peek_tag()? {
            Tag::F32 => Ok(dec.f32()? as f64),
            _ => dec.f64(),
        }
    }
}

impl Pack for str {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { enc.str(self) }
}

impl Pack for String {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { enc.str(self) }
}

impl Unpack for String {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> { Ok(dec.str()?.to_string()) }
}

impl Pack for Value {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { enc.value(self) }
}

impl Unpack for Value {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> { dec.value() }
}

/// `None` is nil on the wire.
impl<T: Pack> Pack for Option<T> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            Some(v) => v.pack(enc),
            None => enc.nil(),
        }
    }
}

impl<T: Unpack> Unpack for Option<T> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        if dec.peek_tag()? == Tag::Nil {
            dec.nil()?;
            return Ok(None);
        }
        T::unpack(dec).map(Some)
    }
}

impl<T: Pack> Pack for [T] {
    fn pack(&self, enc: &mut Encoder) -> Result<()> {
        enc.array(self.len())?;
        for item in self {
            item.pack(enc)?;
        }
        Ok(())
    }
}

impl<T: Pack> Pack for Vec<T> {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { self.as_slice().pack(enc) }
}

impl<T: Unpack> Unpack for Vec<T> {
    fn unpack(dec: &mut Decoder<'_>) -> Result<Self> {
        let count = dec.array()?;
        let mut items = Vec::with_capacity(count.min(dec.remaining()));
        for _ in 0..count {
            items.push(T::unpack(dec)?);
        }
        Ok(items)
    }
}

impl<T: Pack + ?Sized> Pack for &T {
    fn pack(&self, enc: &mut Encoder) -> Result<()> { (**self).pack(enc) }
}
