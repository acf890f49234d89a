//! Request definitions

use bytes::Bytes;

/// Request types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Get = 0x00,
}

impl RequestType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(RequestType::Get),
            _ => None,
        }
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_type: RequestType,
    pub key: Bytes,
}

impl Request {
    /// GET request for `key`
    pub fn get(key: impl Into<Bytes>) -> Self {
        Self {
            request_type: RequestType::Get,
            key: key.into(),
        }
    }
}
