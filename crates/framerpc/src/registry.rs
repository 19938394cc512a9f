//! # Protocol Registry
//!
//! A two-level table, protocol name to method name to `MethodDescriptor`.
//!
//! Registration takes `&mut self` and happens during setup. Once the registry
//! is shared (`Arc<Registry>`) it can no longer change, so concurrent
//! resolution needs no locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::arg::typed;
use crate::arg::Arg;
use crate::arg::ArgFactory;
use crate::error::Error;
use crate::error::Result;

/// How a decoded invocation is dispatched. Does not affect decode shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invocation {
    /// The caller awaits a Response.
    Call,
    /// One-way; no Response is sent.
    Notify,
}

/// Describes one method: how to build its argument, and how it is invoked.
#[derive(Clone)]
pub struct MethodDescriptor {
    arg: Option<Arc<dyn ArgFactory>>,
    invocation: Invocation,
}

impl MethodDescriptor {
    pub fn new(arg: Option<Arc<dyn ArgFactory>>, invocation: Invocation) -> Self {
        Self { arg, invocation }
    }

    /// A call whose argument decodes into `T`.
    pub fn call<T: Arg + Default>() -> Self {
        Self::new(Some(typed::<T>()), Invocation::Call)
    }

    /// A notification whose argument decodes into `T`.
    pub fn notify<T: Arg + Default>() -> Self {
        Self::new(Some(typed::<T>()), Invocation::Notify)
    }

    /// A method with no argument factory; its argument is skipped.
    pub fn untyped(invocation: Invocation) -> Self {
        Self::new(None, invocation)
    }

    pub fn invocation(&self) -> Invocation {
        self.invocation
    }

    pub fn is_typed(&self) -> bool {
        self.arg.is_some()
    }

    /// A fresh decode target, or `None` when the argument is untyped.
    pub fn make_arg(&self) -> Option<Box<dyn Arg>> {
        self.arg.as_ref().map(|factory| factory.make_arg())
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("typed", &self.is_typed())
            .field("invocation", &self.invocation)
            .finish()
    }
}

/// A named namespace of methods.
#[derive(Debug, Clone)]
pub struct ProtocolDescriptor {
    name: String,
    methods: HashMap<String, MethodDescriptor>,
}

impl ProtocolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), methods: HashMap::new() }
    }

    pub fn with_methods(name: impl Into<String>, methods: HashMap<String, MethodDescriptor>) -> Self {
        Self { name: name.into(), methods }
    }

    /// Adds a method, replacing any previous one of the same name.
    pub fn method(mut self, name: impl Into<String>, desc: MethodDescriptor) -> Self {
        self.methods.insert(name.into(), desc);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, method: &str) -> Option<&MethodDescriptor> {
        self.methods.get(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodDescriptor)> {
        self.methods.iter().map(|(name, desc)| (name.as_str(), desc))
    }
}

/// Protocol name to `ProtocolDescriptor`.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    protocols: HashMap<String, ProtocolDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a protocol. Fails with `DuplicateProtocol` if the name is taken.
    pub fn register(&mut self, protocol: ProtocolDescriptor) -> Result<()> {
        if self.protocols.contains_key(protocol.name()) {
            return Err(Error::DuplicateProtocol(protocol.name().to_string()));
        }
        debug!(protocol = protocol.name(), methods = protocol.methods.len(), "registered protocol");
        self.protocols.insert(protocol.name().to_string(), protocol);
        Ok(())
    }

    pub fn register_protocol(
        &mut self,
        name: impl Into<String>,
        methods: HashMap<String, MethodDescriptor>,
    ) -> Result<()> {
        self.register(ProtocolDescriptor::with_methods(name, methods))
    }

    /// Resolves `"<protocol>.<method>"`, splitting on the first dot.
    ///
    /// A name without a dot is treated as a bare protocol with an empty method.
    pub fn resolve(&self, qualified: &str) -> Result<(&ProtocolDescriptor, &MethodDescriptor)> {
        let (protocol_name, method_name) = qualified.split_once('.').unwrap_or((qualified, ""));

        let protocol = self
            .protocols
            .get(protocol_name)
            .ok_or_else(|| Error::ProtocolNotFound(protocol_name.to_string()))?;

        let method = protocol.get(method_name).ok_or_else(|| Error::MethodNotFound {
            method: method_name.to_string(),
            protocol: protocol_name.to_string(),
        })?;

        Ok((protocol, method))
    }

    pub fn protocol(&self, name: &str) -> Option<&ProtocolDescriptor> {
        self.protocols.get(name)
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}
