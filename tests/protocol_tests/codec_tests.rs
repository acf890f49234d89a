//! Protocol Codec Tests
//!
//! Tests verify:
//! - Request and reply header layout
//! - Rejection of truncated, oversized and unknown frames
//! - Serving GETs from a table and verifying replies

use bytes::Bytes;

use benchtable::protocol::{
    decode_reply, decode_request, encode_get_request, encode_reply, encode_request, serve,
    verify_reply, Reply, ReplyType, Request, RequestType, MAX_WIRE_KEY_LEN, MAX_WIRE_VALUE_LEN,
    REPLY_HEADER_SIZE, REQUEST_HEADER_SIZE,
};
use benchtable::{Config, HashTable, Item, KeyMatch, TableError};

fn table() -> HashTable {
    let config = Config::builder()
        .hash_power(4)
        .key_match(KeyMatch::Exact)
        .build();
    HashTable::new(config).unwrap()
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_encode_request_layout() {
    let encoded = encode_request(&Request::get(&b"mykey"[..])).unwrap();

    assert_eq!(encoded.len(), REQUEST_HEADER_SIZE + 5);
    assert_eq!(encoded[0], RequestType::Get as u8);
    assert_eq!(encoded[1], 5);
    assert_eq!(&encoded[2..], b"mykey");
}

#[test]
fn test_decode_request() {
    let decoded = decode_request(&[0x00, 0x03, b'a', b'b', b'c']).unwrap();

    assert_eq!(decoded.request_type, RequestType::Get);
    assert_eq!(decoded.key, Bytes::from_static(b"abc"));
}

#[test]
fn test_decode_request_ignores_trailing_bytes() {
    let decoded = decode_request(&[0x00, 0x01, b'k', 0xff, 0xff]).unwrap();
    assert_eq!(decoded.key, Bytes::from_static(b"k"));
}

#[test]
fn test_request_max_key_length() {
    let key = vec![b'k'; MAX_WIRE_KEY_LEN];
    let encoded = encode_request(&Request::get(key.clone())).unwrap();
    assert_eq!(decode_request(&encoded).unwrap().key, Bytes::from(key));

    let too_long = vec![b'k'; MAX_WIRE_KEY_LEN + 1];
    assert!(matches!(
        encode_request(&Request::get(too_long)),
        Err(TableError::Protocol(_))
    ));
}

#[test]
fn test_decode_request_truncated_header() {
    assert!(matches!(decode_request(&[0x00]), Err(TableError::Protocol(_))));
    assert!(matches!(decode_request(&[]), Err(TableError::Protocol(_))));
}

#[test]
fn test_decode_request_truncated_key() {
    assert!(matches!(
        decode_request(&[0x00, 0x04, b'a', b'b']),
        Err(TableError::Protocol(_))
    ));
}

#[test]
fn test_decode_request_unknown_type() {
    assert!(matches!(
        decode_request(&[0x7f, 0x00]),
        Err(TableError::Protocol(_))
    ));
}

// =============================================================================
// Reply Tests
// =============================================================================

#[test]
fn test_encode_hit_reply_layout() {
    let encoded = encode_reply(&Reply::hit(&b"value"[..])).unwrap();

    assert_eq!(encoded.len(), REPLY_HEADER_SIZE + 5);
    assert_eq!(encoded[0], ReplyType::Hit as u8);
    assert_eq!(u16::from_le_bytes([encoded[1], encoded[2]]), 5);
    assert_eq!(&encoded[3..], b"value");
}

#[test]
fn test_encode_miss_reply_layout() {
    let encoded = encode_reply(&Reply::miss()).unwrap();
    assert_eq!(&encoded[..], &[0x01u8, 0x00, 0x00]);
}

#[test]
fn test_decode_reply_little_endian_length() {
    let mut frame = vec![0x00, 0x00, 0x01];
    frame.extend(std::iter::repeat(b'x').take(256));

    let reply = decode_reply(&frame).unwrap();
    assert!(reply.is_hit());
    assert_eq!(reply.value.len(), 256);
}

#[test]
fn test_reply_max_value_length() {
    let value = vec![1u8; MAX_WIRE_VALUE_LEN];
    let encoded = encode_reply(&Reply::hit(value.clone())).unwrap();
    assert_eq!(decode_reply(&encoded).unwrap().value, Bytes::from(value));

    let too_long = vec![1u8; MAX_WIRE_VALUE_LEN + 1];
    assert!(matches!(
        encode_reply(&Reply::hit(too_long)),
        Err(TableError::Protocol(_))
    ));
}

#[test]
fn test_decode_reply_errors() {
    // Truncated header
    assert!(decode_reply(&[0x00, 0x01]).is_err());
    // Truncated value
    assert!(decode_reply(&[0x00, 0x03, 0x00, b'a']).is_err());
    // Unknown type
    assert!(decode_reply(&[0x09, 0x00, 0x00]).is_err());
    // MISS with a payload
    assert!(decode_reply(&[0x01, 0x01, 0x00, b'a']).is_err());
}

// =============================================================================
// Table Helper Tests
// =============================================================================

#[test]
fn test_encode_get_request_uses_item_key() {
    let item = Item::new(b"sampled", b"value").unwrap();
    let frame = encode_get_request(&item).unwrap();

    let request = decode_request(&frame).unwrap();
    assert_eq!(request, Request::get(&b"sampled"[..]));
}

#[test]
fn test_encode_get_request_rejects_long_keys() {
    let key = vec![b'k'; MAX_WIRE_KEY_LEN + 1];
    let item = Item::new(&key, b"v").unwrap();

    assert!(encode_get_request(&item).is_err());
}

#[test]
fn test_serve_hit_and_verify() {
    let table = table();
    table.put(b"k1", b"v1").unwrap();

    let guard = table.pick_random_live_item().unwrap();
    let frame = encode_get_request(&guard).unwrap();
    let reply = serve(&table, &decode_request(&frame).unwrap()).unwrap();

    assert_eq!(reply, Reply::hit(&b"v1"[..]));
    let wire = encode_reply(&reply).unwrap();
    assert!(verify_reply(&guard, &decode_reply(&wire).unwrap()));
}

#[test]
fn test_serve_miss() {
    let table = table();

    let reply = serve(&table, &Request::get(&b"absent"[..])).unwrap();
    assert_eq!(reply.reply_type, ReplyType::Miss);
    assert!(reply.value.is_empty());
}

#[test]
fn test_serve_counts_request() {
    let table = table();
    let (item, _) = table.put(b"k", b"v").unwrap();

    serve(&table, &Request::get(&b"k"[..])).unwrap();
    assert_eq!(item.request_count(), 1);
    assert_eq!(item.ref_count(), 0);
}

#[test]
fn test_verify_reply_rejects_mismatch() {
    let item = Item::new(b"k", b"expected").unwrap();

    assert!(verify_reply(&item, &Reply::hit(&b"expected"[..])));
    assert!(!verify_reply(&item, &Reply::hit(&b"other"[..])));
    assert!(!verify_reply(&item, &Reply::miss()));
}

#[test]
fn test_serve_before_setup_propagates_misuse() {
    let table = HashTable::deferred(Config::default()).unwrap();

    assert!(matches!(
        serve(&table, &Request::get(&b"k"[..])),
        Err(TableError::SetupMisuse(_))
    ));
}
