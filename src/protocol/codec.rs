//! Protocol codec
//!
//! Encoding and decoding functions for benchmark frames, plus the helpers
//! that connect frames to table results.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │KeyLen (1)│            Key              │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Reply
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ValLen (2)│           Value             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TableError};
use crate::item::Item;
use crate::table::HashTable;

use super::{Reply, ReplyType, Request, RequestType};

/// Request header size: 1 byte type + 1 byte key length
pub const REQUEST_HEADER_SIZE: usize = 2;

/// Reply header size: 1 byte type + 2 bytes value length
pub const REPLY_HEADER_SIZE: usize = 3;

/// Longest key a request header can describe
pub const MAX_WIRE_KEY_LEN: usize = u8::MAX as usize;

/// Longest value a reply header can describe
pub const MAX_WIRE_VALUE_LEN: usize = u16::MAX as usize;

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Format: type (1) + key_len (1) + key
pub fn encode_request(request: &Request) -> Result<Bytes> {
    encode_request_parts(request.request_type, &request.key)
}

fn encode_request_parts(request_type: RequestType, key: &[u8]) -> Result<Bytes> {
    if key.len() > MAX_WIRE_KEY_LEN {
        return Err(TableError::Protocol(format!(
            "Key too long for request header: {} bytes (max {})",
            key.len(),
            MAX_WIRE_KEY_LEN
        )));
    }

    let mut message = BytesMut::with_capacity(REQUEST_HEADER_SIZE + key.len());
    message.put_u8(request_type as u8);
    message.put_u8(key.len() as u8);
    message.put_slice(key);

    Ok(message.freeze())
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    if bytes.len() < REQUEST_HEADER_SIZE {
        return Err(TableError::Protocol(format!(
            "Incomplete request header: expected {} bytes, got {}",
            REQUEST_HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut buf = bytes;
    let type_byte = buf.get_u8();
    let key_len = buf.get_u8() as usize;

    let request_type = RequestType::from_u8(type_byte).ok_or_else(|| {
        TableError::Protocol(format!("Unknown request type: 0x{:02x}", type_byte))
    })?;

    if buf.remaining() < key_len {
        return Err(TableError::Protocol(format!(
            "Incomplete key: expected {} bytes, got {}",
            key_len,
            buf.remaining()
        )));
    }

    Ok(Request {
        request_type,
        key: Bytes::copy_from_slice(&buf[..key_len]),
    })
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply to bytes
///
/// Format: type (1) + value_len (2, LE) + value
pub fn encode_reply(reply: &Reply) -> Result<Bytes> {
    if reply.value.len() > MAX_WIRE_VALUE_LEN {
        return Err(TableError::Protocol(format!(
            "Value too long for reply header: {} bytes (max {})",
            reply.value.len(),
            MAX_WIRE_VALUE_LEN
        )));
    }

    let mut message = BytesMut::with_capacity(REPLY_HEADER_SIZE + reply.value.len());
    message.put_u8(reply.reply_type as u8);
    message.put_u16_le(reply.value.len() as u16);
    message.put_slice(&reply.value);

    Ok(message.freeze())
}

/// Decode a reply from bytes
pub fn decode_reply(bytes: &[u8]) -> Result<Reply> {
    if bytes.len() < REPLY_HEADER_SIZE {
        return Err(TableError::Protocol(format!(
            "Incomplete reply header: expected {} bytes, got {}",
            REPLY_HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut buf = bytes;
    let type_byte = buf.get_u8();
    let value_len = buf.get_u16_le() as usize;

    let reply_type = ReplyType::from_u8(type_byte).ok_or_else(|| {
        TableError::Protocol(format!("Unknown reply type: 0x{:02x}", type_byte))
    })?;

    if buf.remaining() < value_len {
        return Err(TableError::Protocol(format!(
            "Incomplete value: expected {} bytes, got {}",
            value_len,
            buf.remaining()
        )));
    }

    if reply_type == ReplyType::Miss && value_len != 0 {
        return Err(TableError::Protocol(format!(
            "MISS reply carries {} value bytes",
            value_len
        )));
    }

    Ok(Reply {
        reply_type,
        value: Bytes::copy_from_slice(&buf[..value_len]),
    })
}

// =============================================================================
// Table Helpers
// =============================================================================

/// Build a GET frame for a (pinned) item's key
pub fn encode_get_request(item: &Item) -> Result<Bytes> {
    encode_request_parts(RequestType::Get, &item.key())
}

/// Answer a request from the table
pub fn serve(table: &HashTable, request: &Request) -> Result<Reply> {
    match request.request_type {
        RequestType::Get => match table.start_access(&request.key) {
            Ok(guard) => Ok(Reply::hit(Bytes::copy_from_slice(&guard.value()))),
            Err(TableError::NotFound) => Ok(Reply::miss()),
            Err(e) => Err(e),
        },
    }
}

/// Check a reply against the value the table recorded for `expected`
pub fn verify_reply(expected: &Item, reply: &Reply) -> bool {
    reply.is_hit() && reply.value[..] == expected.value()[..]
}
