//! # Error Definitions
//!
//! Every way a frame can be rejected, plus the setup-time collisions of the
//! registry and tracker. Remote failures carried inside a Response are a
//! separate type (`RemoteError`): they are payload, not decode failures.

use framepack::Value;

use crate::kind::SeqNo;

/// Failures raised while decoding a frame or wiring up the dispatch tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The structured-value decoder failed; carries its byte position.
    Decode(framepack::Error),
    /// The kind discriminant is not a known `MessageKind`.
    InvalidRpcType(i128),
    /// The declared element count does not match the kind's arity.
    WrongMessageLength { expected: usize, actual: usize },
    /// The protocol segment of a qualified name is not registered.
    ProtocolNotFound(String),
    /// The protocol exists but has no such method.
    MethodNotFound { method: String, protocol: String },
    /// A Response arrived for a sequence number with no pending call.
    CallNotFound(SeqNo),
    /// A protocol with this name is already registered.
    DuplicateProtocol(String),
    /// A call is already in flight under this sequence number.
    DuplicateSeqNo(SeqNo),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "{}", e),
            Self::InvalidRpcType(_) => write!(f, "invalid RPC type"),
            Self::WrongMessageLength { .. } => write!(f, "wrong message length"),
            Self::ProtocolNotFound(protocol) => write!(f, "protocol not found: {}", protocol),
            Self::MethodNotFound { method, protocol } => {
                write!(f, "method '{}' not found in protocol '{}'", method, protocol)
            }
            Self::CallNotFound(seqno) => write!(f, "Call not found for sequence number {}", seqno),
            Self::DuplicateProtocol(name) => write!(f, "protocol already registered: {}", name),
            Self::DuplicateSeqNo(seqno) => {
                write!(f, "call already pending for sequence number {}", seqno)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<framepack::Error> for Error {
    fn from(e: framepack::Error) -> Self {
        Self::Decode(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error field of a Response: the remote side reporting failure.
///
/// Distinct from `Error`, which means the frame itself could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError(pub Value);

impl RemoteError {
    /// Classifies a decoded error field. Nil and the empty string mean success.
    pub fn from_field(field: Value) -> Option<Self> {
        match &field {
            Value::Nil => None,
            Value::Str(s) if s.is_empty() => None,
            _ => Some(Self(field)),
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::Str(s) => f.write_str(s),
            other => write!(f, "remote error: {:?}", other),
        }
    }
}

impl std::error::Error for RemoteError {}
