//! # framerpc
//!
//! The framing and dispatch core of an RPC connection.
//!
//! A frame is a framepack array whose first two elements are a `MessageKind`
//! and a sequence number. Decoding a frame validates its shape, resolves its
//! `"protocol.method"` name against a `Registry`, or, for a Response, takes
//! the matching `PendingCall` out of the connection's `Tracker`.
//!
//! ```text
//! [Call,     seqno, "proto.method", arg   ]
//! [Response, seqno, error,          result]
//! [Notify,   seqno, "proto.method", arg   ]
//! [Cancel,   seqno, "proto.method"        ]
//! ```
//!
//! Sharing: one `Arc<Registry>` per process, built before any connection
//! decodes; one `Tracker` per connection.

mod arg;
mod error;
mod frame;
mod kind;
mod message;
mod registry;
mod tracker;

#[cfg(test)]
mod tests;

pub use arg::typed;
pub use arg::Arg;
pub use arg::ArgFactory;
pub use arg::Typed;
pub use error::Error;
pub use error::RemoteError;
pub use error::Result;
pub use frame::CallFrame;
pub use frame::CancelFrame;
pub use frame::NotifyFrame;
pub use frame::ResponseFrame;
pub use kind::MessageKind;
pub use kind::SeqNo;
pub use kind::MIN_FRAME_LEN;
pub use message::decode_frame;
pub use message::Call;
pub use message::Cancel;
pub use message::Message;
pub use message::Notify;
pub use message::Response;
pub use registry::Invocation;
pub use registry::MethodDescriptor;
pub use registry::ProtocolDescriptor;
pub use registry::Registry;
pub use tracker::CallOutcome;
pub use tracker::PendingCall;
pub use tracker::Tracker;
