//! Type-erased decode targets.
//!
//! The registry maps method names to factories that produce a fresh, empty
//! argument for the decoder to fill. Handlers recover the concrete type with
//! `downcast_ref` or `downcast`.

use std::any::Any;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use framepack::Decoder;
use framepack::Unpack;

/// A decoded argument or result whose concrete type is known only to the
/// method that registered it.
pub trait Arg: Any + Send + Debug {
    /// Replaces `self` with exactly one item read from `dec`.
    fn unpack_into(&mut self, dec: &mut Decoder<'_>) -> framepack::Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Unpack + Any + Send + Debug> Arg for T {
    fn unpack_into(&mut self, dec: &mut Decoder<'_>) -> framepack::Result<()> {
        *self = T::unpack(dec)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl dyn Arg {
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Takes ownership of the concrete value, or hands the box back on mismatch.
    pub fn downcast<T: Any>(self: Box<Self>) -> Result<Box<T>, Box<dyn Any + Send>> {
        self.into_any().downcast::<T>()
    }
}

/// Produces a fresh decode target for one method.
pub trait ArgFactory: Send + Sync {
    fn make_arg(&self) -> Box<dyn Arg>;
}

/// Factory for any `Default` argument type.
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<T> Typed<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Arg + Default> ArgFactory for Typed<T> {
    fn make_arg(&self) -> Box<dyn Arg> {
        Box::new(T::default())
    }
}

/// Shorthand for a shared `Typed<T>` factory.
pub fn typed<T: Arg + Default>() -> Arc<dyn ArgFactory> {
    Arc::new(Typed::<T>::new())
}
