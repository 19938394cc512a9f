//! # Message Decoder
//!
//! Turns one frame into a `Message`, validating it against the `Registry`
//! (named kinds) or the `Tracker` (responses).
//!
//! ## Invariants
//! - **Kind First**: element 0 alone decides the kind; unknown values fail with
//!   `InvalidRpcType` whatever follows.
//! - **Exact Arity**: the declared element count must equal the kind's arity,
//!   checked before any kind-specific element is read.
//! - **Resolve Before Decode**: a Response consumes its pending call before
//!   reading the error and result fields.
//! - **All or Nothing**: any error aborts the frame. The decoder position after
//!   a failure is unspecified; the connection should be dropped.

use framepack::Decoder;
use framepack::Tag;
use tracing::debug;

use crate::arg::Arg;
use crate::error::Error;
use crate::error::RemoteError;
use crate::error::Result;
use crate::kind::MessageKind;
use crate::kind::SeqNo;
use crate::kind::MIN_FRAME_LEN;
use crate::registry::Registry;
use crate::tracker::CallOutcome;
use crate::tracker::PendingCall;
use crate::tracker::Tracker;

/// An inbound invocation: a Call expecting a Response.
#[derive(Debug)]
pub struct Call {
    seqno: SeqNo,
    name: String,
    arg: Option<Box<dyn Arg>>,
}

/// A one-way invocation.
#[derive(Debug)]
pub struct Notify {
    seqno: SeqNo,
    name: String,
    arg: Option<Box<dyn Arg>>,
}

/// A request to abandon the in-flight call `seqno`.
#[derive(Debug)]
pub struct Cancel {
    seqno: SeqNo,
    name: String,
}

/// The answer to one of our calls, already detached from the tracker.
#[derive(Debug)]
pub struct Response {
    seqno: SeqNo,
    call: PendingCall,
    error: Option<RemoteError>,
    result: Option<Box<dyn Arg>>,
}

/// A fully decoded frame.
#[derive(Debug)]
pub enum Message {
    Call(Call),
    Response(Response),
    Notify(Notify),
    Cancel(Cancel),
}

impl Call {
    pub fn seqno(&self) -> SeqNo { self.seqno }
    pub fn name(&self) -> &str { &self.name }

    /// The decoded argument, or `None` for an untyped method.
    pub fn arg(&self) -> Option<&dyn Arg> { self.arg.as_deref() }
    pub fn into_arg(self) -> Option<Box<dyn Arg>> { self.arg }
}

impl Notify {
    pub fn seqno(&self) -> SeqNo { self.seqno }
    pub fn name(&self) -> &str { &self.name }
    pub fn arg(&self) -> Option<&dyn Arg> { self.arg.as_deref() }
    pub fn into_arg(self) -> Option<Box<dyn Arg>> { self.arg }
}

impl Cancel {
    pub fn seqno(&self) -> SeqNo { self.seqno }
    pub fn name(&self) -> &str { &self.name }
}

impl Response {
    fn decode(seqno: SeqNo, dec: &mut Decoder<'_>, tracker: &Tracker) -> Result<Self> {
        // A failure past this point drops `call`, closing its receiver.
        let call = tracker.resolve(seqno)?;

        let error = RemoteError::from_field(dec.value()?);
        // A failed call usually sends nil; that is no result, not a mismatch.
        let nil_beside_error = error.is_some() && dec.peek_tag()? == Tag::Nil;
        let result = match call.make_result() {
            Some(mut target) if !nil_beside_error => {
                target.unpack_into(dec)?;
                Some(target)
            }
            _ => {
                dec.skip()?;
                None
            }
        };

        Ok(Self { seqno, call, error, result })
    }

    pub fn seqno(&self) -> SeqNo { self.seqno }

    /// Qualified name of the call this answers.
    pub fn method(&self) -> &str { self.call.method() }

    pub fn error(&self) -> Option<&RemoteError> { self.error.as_ref() }
    pub fn result(&self) -> Option<&dyn Arg> { self.result.as_deref() }
    pub fn is_error(&self) -> bool { self.error.is_some() }

    pub fn outcome(self) -> (PendingCall, CallOutcome) {
        let outcome = match self.error {
            Some(error) => Err(error),
            None => Ok(self.result),
        };
        (self.call, outcome)
    }

    /// Hands the outcome to the waiting caller. Returns false if it gave up.
    pub fn complete(self) -> bool {
        let (call, outcome) = self.outcome();
        call.complete(outcome)
    }
}

impl Message {
    /// Decodes a frame body of `len` elements.
    ///
    /// `dec` must be positioned just past the frame's array header.
    pub fn decode(
        len: usize,
        dec: &mut Decoder<'_>,
        registry: &Registry,
        tracker: &Tracker,
    ) -> Result<Self> {
        let start = dec.pos();
        Self::decode_body(len, dec, registry, tracker).inspect_err(|e| {
            debug!(pos = start, len, error = %e, "rejected frame");
        })
    }

    fn decode_body(
        len: usize,
        dec: &mut Decoder<'_>,
        registry: &Registry,
        tracker: &Tracker,
    ) -> Result<Self> {
        if len < MIN_FRAME_LEN {
            return Err(Error::WrongMessageLength { expected: MIN_FRAME_LEN, actual: len });
        }

        let kind = MessageKind::try_from(dec.wide_int()?)?;
        let seqno = dec.uint()?;

        if len != kind.arity() {
            return Err(Error::WrongMessageLength { expected: kind.arity(), actual: len });
        }

        let message = match kind {
            MessageKind::Call => {
                let (name, arg) = decode_invocation(dec, registry)?;
                Message::Call(Call { seqno, name, arg })
            }
            MessageKind::Notify => {
                let (name, arg) = decode_invocation(dec, registry)?;
                Message::Notify(Notify { seqno, name, arg })
            }
            MessageKind::Cancel => {
                let name = decode_name(dec, registry)?;
                Message::Cancel(Cancel { seqno, name })
            }
            MessageKind::Response => Message::Response(Response::decode(seqno, dec, tracker)?),
        };
        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Call(_) => MessageKind::Call,
            Self::Response(_) => MessageKind::Response,
            Self::Notify(_) => MessageKind::Notify,
            Self::Cancel(_) => MessageKind::Cancel,
        }
    }

    pub fn seqno(&self) -> SeqNo {
        match self {
            Self::Call(m) => m.seqno,
            Self::Response(m) => m.seqno,
            Self::Notify(m) => m.seqno,
            Self::Cancel(m) => m.seqno,
        }
    }

    /// The qualified method name of named kinds; `None` for a Response.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Call(m) => Some(&m.name),
            Self::Notify(m) => Some(&m.name),
            Self::Cancel(m) => Some(&m.name),
            Self::Response(_) => None,
        }
    }

    /// The decoded argument of a Call or Notify.
    pub fn arg(&self) -> Option<&dyn Arg> {
        match self {
            Self::Call(m) => m.arg(),
            Self::Notify(m) => m.arg(),
            Self::Cancel(_) | Self::Response(_) => None,
        }
    }
}

/// Reads an array header, then the frame it declares.
pub fn decode_frame(dec: &mut Decoder<'_>, registry: &Registry, tracker: &Tracker) -> Result<Message> {
    let len = dec.array()?;
    Message::decode(len, dec, registry, tracker)
}

fn decode_name(dec: &mut Decoder<'_>, registry: &Registry) -> Result<String> {
    let name = dec.str()?;
    registry.resolve(name)?;
    Ok(name.to_string())
}

fn decode_invocation(
    dec: &mut Decoder<'_>,
    registry: &Registry,
) -> Result<(String, Option<Box<dyn Arg>>)> {
    let name = dec.str()?;
    let (_, method) = registry.resolve(name)?;

    let arg = match method.make_arg() {
        Some(mut target) => {
            target.unpack_into(dec)?;
            Some(target)
        }
        None => {
            dec.skip()?;
            None
        }
    };
    Ok((name.to_string(), arg))
}
