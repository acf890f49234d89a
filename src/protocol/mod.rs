//! Protocol Module
//!
//! Frames exchanged by the benchmark clients, layered on top of table
//! results. Only framing lives here; sockets belong to the harness.
//!
//! ## Wire Format (packed, little endian)
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
//!
//! ### Request Types
//! - 0x00: GET
//!
//! ### Reply Types
//! - 0x00: HIT  - Payload: value
//! - 0x01: MISS - Payload: empty

mod codec;
mod reply;
mod request;

pub use codec::{
    decode_reply, decode_request, encode_get_request, encode_reply, encode_request, serve,
    verify_reply, MAX_WIRE_KEY_LEN, MAX_WIRE_VALUE_LEN, REPLY_HEADER_SIZE, REQUEST_HEADER_SIZE,
};
pub use reply::{Reply, ReplyType};
pub use request::{Request, RequestType};
