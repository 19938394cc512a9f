//! Message kinds and their fixed frame shapes.

use crate::error::Error;

/// Correlates a call with its response. Unique among a connection's pending calls.
///
/// Unsigned on the wire: a negative integer in the seqno slot is a decode error
/// (`IntegerOverflow`), where a signed-seqno peer would have accepted it.
pub type SeqNo = u64;

/// Every frame carries at least a kind discriminant and a sequence number.
pub const MIN_FRAME_LEN: usize = 2;

/// The first element of every frame.
///
/// | kind     | wire | arity | shape                             |
/// |----------|-----:|------:|-----------------------------------|
/// | Call     | 0    | 4     | `[0, seqno, "proto.method", arg]` |
/// | Response | 1    | 4     | `[1, seqno, error, result]`       |
/// | Notify   | 2    | 4     | `[2, seqno, "proto.method", arg]` |
/// | Cancel   | 3    | 3     | `[3, seqno, "proto.method"]`      |
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Call = 0,
    Response = 1,
    Notify = 2,
    Cancel = 3,
}

impl MessageKind {
    /// Exact element count a frame of this kind must declare.
    pub const fn arity(self) -> usize {
        match self {
            Self::Call | Self::Response | Self::Notify => 4,
            Self::Cancel => 3,
        }
    }

    pub const fn wire(self) -> i64 {
        self as u8 as i64
    }

    /// Kinds whose element 2 is a qualified method name.
    pub const fn is_named(self) -> bool {
        !matches!(self, Self::Response)
    }
}

/// Accepts any wire integer, so out-of-range discriminants are still
/// `InvalidRpcType` rather than an overflow.
impl TryFrom<i128> for MessageKind {
    type Error = Error;

    fn try_from(raw: i128) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Call),
            1 => Ok(Self::Response),
            2 => Ok(Self::Notify),
            3 => Ok(Self::Cancel),
            other => Err(Error::InvalidRpcType(other)),
        }
    }
}

impl TryFrom<i64> for MessageKind {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::try_from(i128::from(raw))
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Call => "call",
            Self::Response => "response",
            Self::Notify => "notify",
            Self::Cancel => "cancel",
        };
        f.write_str(name)
    }
}
