//! # Frame Encoders
//!
//! The sending side of each message kind. Each encoder writes one complete
//! frame (array header plus elements) in exactly the shape `Message::decode`
//! accepts.

use framepack::Encoder;
use framepack::Pack;
use framepack::Value;

use crate::kind::MessageKind;
use crate::kind::SeqNo;

fn header(enc: &mut Encoder, kind: MessageKind, seqno: SeqNo) -> framepack::Result<()> {
    enc.array(kind.arity())?;
    enc.int(kind.wire())?;
    enc.uint(seqno)
}

/// Encodes an outbound Call frame.
pub struct CallFrame<'a, A: ?Sized> {
    pub seqno: SeqNo,
    pub name: &'a str,
    pub arg: &'a A,
}

impl<'a, A: Pack + ?Sized> CallFrame<'a, A> {
    pub fn new(seqno: SeqNo, name: &'a str, arg: &'a A) -> Self {
        Self { seqno, name, arg }
    }

    pub fn encode(&self, enc: &mut Encoder) -> framepack::Result<()> {
        header(enc, MessageKind::Call, self.seqno)?;
        enc.str(self.name)?;
        enc.pack(self.arg)
    }

    pub fn to_bytes(&self) -> framepack::Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        enc.into_bytes()
    }
}

/// Encodes an outbound one-way Notify frame.
pub struct NotifyFrame<'a, A: ?Sized> {
    pub seqno: SeqNo,
    pub name: &'a str,
    pub arg: &'a A,
}

impl<'a, A: Pack + ?Sized> NotifyFrame<'a, A> {
    pub fn new(seqno: SeqNo, name: &'a str, arg: &'a A) -> Self {
        Self { seqno, name, arg }
    }

    pub fn encode(&self, enc: &mut Encoder) -> framepack::Result<()> {
        header(enc, MessageKind::Notify, self.seqno)?;
        enc.str(self.name)?;
        enc.pack(self.arg)
    }

    pub fn to_bytes(&self) -> framepack::Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        enc.into_bytes()
    }
}

/// Encodes a Cancel frame for a call the peer is serving.
pub struct CancelFrame<'a> {
    pub seqno: SeqNo,
    pub name: &'a str,
}

impl<'a> CancelFrame<'a> {
    pub fn new(seqno: SeqNo, name: &'a str) -> Self {
        Self { seqno, name }
    }

    pub fn encode(&self, enc: &mut Encoder) -> framepack::Result<()> {
        header(enc, MessageKind::Cancel, self.seqno)?;
        enc.str(self.name)
    }

    pub fn to_bytes(&self) -> framepack::Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        enc.into_bytes()
    }
}

/// Encodes a Response frame. `error: None` writes nil, meaning success.
pub struct ResponseFrame<'a, R: ?Sized> {
    pub seqno: SeqNo,
    pub error: Option<&'a Value>,
    pub result: &'a R,
}

impl<'a, R: Pack + ?Sized> ResponseFrame<'a, R> {
    pub fn ok(seqno: SeqNo, result: &'a R) -> Self {
        Self { seqno, error: None, result }
    }

    pub fn err(seqno: SeqNo, error: &'a Value, result: &'a R) -> Self {
        Self { seqno, error: Some(error), result }
    }

    pub fn encode(&self, enc: &mut Encoder) -> framepack::Result<()> {
        header(enc, MessageKind::Response, self.seqno)?;
        match self.error {
            Some(error) => enc.value(error)?,
            None => enc.nil()?,
        }
        enc.pack(self.result)
    }

    pub fn to_bytes(&self) -> framepack::Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        enc.into_bytes()
    }
}
