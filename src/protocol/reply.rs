//! Reply definitions

use bytes::Bytes;

/// Reply types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyType {
    Hit = 0x00,
    Miss = 0x01,
}

impl ReplyType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(ReplyType::Hit),
            0x01 => Some(ReplyType::Miss),
            _ => None,
        }
    }
}

/// A reply from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub reply_type: ReplyType,

    /// Value bytes for a hit, empty for a miss
    pub value: Bytes,
}

impl Reply {
    pub fn hit(value: impl Into<Bytes>) -> Self {
        Self {
            reply_type: ReplyType::Hit,
            value: value.into(),
        }
    }

    pub fn miss() -> Self {
        Self {
            reply_type: ReplyType::Miss,
            value: Bytes::new(),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.reply_type == ReplyType::Hit
    }
}
