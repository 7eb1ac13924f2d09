//! Codec Tests
//!
//! Byte-exact encoding of client messages and fail-closed decoding of
//! server messages.

use keyshard::protocol::{
    decode, encode, encoded_len, InboundMessage, KeyRange, OutboundMessage, ParseError, WireField,
};
use keyshard::PublicKey;

fn le(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

/// Reply{seqno=5, key=9} with an empty destination
fn reply_fixture() -> Vec<u8> {
    concat(&[&[0x00], &le(5), &le(0), &[0x02], &le(9)])
}

fn redirect_fixture() -> Vec<u8> {
    concat(&[&[0x00], &le(11), &le(2), &[0xAA, 0xBB], &[0x03], &le(150), &le(1), &[0xEE]])
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_ack() {
    let encoded = encode(&OutboundMessage::Ack { acked_seqno: 7 });
    assert_eq!(
        encoded.as_ref(),
        &[0x01, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_encode_get() {
    let msg = OutboundMessage::Get {
        seqno: 1,
        requester: PublicKey::new(vec![0xAA, 0xBB]),
        key: 42,
    };

    let expected = concat(&[&[0x00], &le(1), &le(2), &[0xAA, 0xBB], &[0x00], &le(42)]);
    assert_eq!(encode(&msg).as_ref(), expected.as_slice());
}

#[test]
fn test_encode_set_with_value() {
    let msg = OutboundMessage::Set {
        seqno: 2,
        requester: PublicKey::new(vec![0xAA]),
        key: 7,
        value: Some(vec![1, 2, 3]),
    };

    let expected = concat(&[
        &[0x00],
        &le(2),
        &le(1),
        &[0xAA],
        &[0x01],
        &le(7),
        &[0x01],
        &le(3),
        &[1, 2, 3],
    ]);
    assert_eq!(encode(&msg).as_ref(), expected.as_slice());
}

#[test]
fn test_encode_set_without_value_is_delete() {
    let msg = OutboundMessage::Set {
        seqno: 2,
        requester: PublicKey::new(vec![0xAA]),
        key: 7,
        value: None,
    };

    let expected = concat(&[&[0x00], &le(2), &le(1), &[0xAA], &[0x01], &le(7), &[0x00]]);
    assert_eq!(encode(&msg).as_ref(), expected.as_slice());
}

#[test]
fn test_encode_set_with_empty_value() {
    let msg = OutboundMessage::Set {
        seqno: 3,
        requester: PublicKey::new(vec![0xAA]),
        key: 0,
        value: Some(Vec::new()),
    };

    let expected = concat(&[&[0x00], &le(3), &le(1), &[0xAA], &[0x01], &le(0), &[0x01], &le(0)]);
    assert_eq!(encode(&msg).as_ref(), expected.as_slice());
}

#[test]
fn test_encode_shard() {
    let msg = OutboundMessage::Shard {
        seqno: 3,
        requester: PublicKey::new(vec![0xAA]),
        range: KeyRange::bounded(125, 175),
        recipient: PublicKey::new(vec![0xCC, 0xDD]),
    };

    let expected = concat(&[
        &[0x00],
        &le(3),
        &le(1),
        &[0xAA],
        &[0x04],
        &[0x01],
        &le(125),
        &[0x01],
        &le(175),
        &le(2),
        &[0xCC, 0xDD],
    ]);
    assert_eq!(encode(&msg).as_ref(), expected.as_slice());
}

#[test]
fn test_encode_shard_unbounded() {
    let msg = OutboundMessage::Shard {
        seqno: 4,
        requester: PublicKey::new(vec![0xAA]),
        range: KeyRange::everything(),
        recipient: PublicKey::new(vec![0xCC]),
    };

    let expected = concat(&[
        &[0x00],
        &le(4),
        &le(1),
        &[0xAA],
        &[0x04],
        &[0x00],
        &[0x00],
        &le(1),
        &[0xCC],
    ]);
    assert_eq!(encode(&msg).as_ref(), expected.as_slice());
}

#[test]
fn test_encoded_len_matches_output() {
    let requester = PublicKey::new(vec![0x11; 32]);
    let messages = [
        OutboundMessage::Get {
            seqno: 9,
            requester: requester.clone(),
            key: 1,
        },
        OutboundMessage::Set {
            seqno: 10,
            requester: requester.clone(),
            key: 2,
            value: Some(vec![0; 1024]),
        },
        OutboundMessage::Shard {
            seqno: 11,
            requester,
            range: KeyRange {
                low: Some(1),
                high: None,
            },
            recipient: PublicKey::new(vec![0x22; 32]),
        },
        OutboundMessage::Ack { acked_seqno: 12 },
    ];

    for msg in &messages {
        assert_eq!(encoded_len(msg), encode(msg).len(), "{:?}", msg);
    }
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_reply() {
    let decoded = decode(&reply_fixture()).unwrap();
    assert_eq!(decoded, InboundMessage::Reply { seqno: 5, key: 9 });
}

#[test]
fn test_decode_redirect() {
    let decoded = decode(&redirect_fixture()).unwrap();
    assert_eq!(decoded, InboundMessage::Redirect { seqno: 11, key: 150 });
}

#[test]
fn test_decode_ack() {
    let decoded = decode(&concat(&[&[0x01], &le(42)])).unwrap();
    assert_eq!(decoded, InboundMessage::Ack { acked_seqno: 42 });
}

#[test]
fn test_decode_skips_destination_bytes() {
    let bytes = concat(&[&[0x00], &le(6), &le(3), &[1, 2, 3], &[0x02], &le(77)]);
    assert_eq!(decode(&bytes).unwrap(), InboundMessage::Reply { seqno: 6, key: 77 });
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut bytes = reply_fixture();
    bytes.extend_from_slice(&[0x01, 0xFF, 0xFF, 0xFF]);
    assert_eq!(decode(&bytes).unwrap(), InboundMessage::Reply { seqno: 5, key: 9 });
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_decode_empty() {
    assert_eq!(
        decode(&[]),
        Err(ParseError::ShortRead {
            field: WireField::MessageTag
        })
    );
}

#[test]
fn test_every_truncation_fails() {
    // Only the fields up to the key are read, so stop each fixture there
    let fixtures = [
        reply_fixture(),
        concat(&[&[0x00], &le(11), &le(2), &[0xAA, 0xBB], &[0x03], &le(150)]),
        concat(&[&[0x01], &le(3)]),
    ];

    for fixture in &fixtures {
        for len in 0..fixture.len() {
            assert!(
                decode(&fixture[..len]).is_err(),
                "prefix of {} bytes decoded",
                len
            );
        }
        assert!(decode(fixture).is_ok());
    }
}

#[test]
fn test_truncation_reports_field() {
    let fixture = reply_fixture();
    let field_at = |len: usize| match decode(&fixture[..len]) {
        Err(ParseError::ShortRead { field }) => field,
        other => panic!("expected a short read, got {:?}", other),
    };

    assert_eq!(field_at(5), WireField::Seqno);
    assert_eq!(field_at(12), WireField::DestinationLength);
    assert_eq!(field_at(17), WireField::InnerTag);
    assert_eq!(field_at(20), WireField::ReplyKey);

    let ack = concat(&[&[0x01], &le(3)]);
    assert_eq!(
        decode(&ack[..4]),
        Err(ParseError::ShortRead {
            field: WireField::AckSeqno
        })
    );

    let redirect = redirect_fixture();
    assert_eq!(
        decode(&redirect[..redirect.len() - 12]),
        Err(ParseError::ShortRead {
            field: WireField::RedirectKey
        })
    );
}

#[test]
fn test_destination_longer_than_input() {
    let bytes = concat(&[&[0x00], &le(1), &le(4), &[0xAA, 0xBB]]);
    assert_eq!(
        decode(&bytes),
        Err(ParseError::ShortRead {
            field: WireField::DestinationBody
        })
    );

    let huge = concat(&[&[0x00], &le(1), &le(u64::MAX), &[0x02], &le(9)]);
    assert_eq!(
        decode(&huge),
        Err(ParseError::ShortRead {
            field: WireField::DestinationBody
        })
    );
}

#[test]
fn test_unknown_inner_tag() {
    let bytes = concat(&[&[0x00], &le(5), &le(0), &[0x05], &le(9)]);
    assert_eq!(decode(&bytes), Err(ParseError::UnknownInnerTag(5)));
}

#[test]
fn test_client_only_inner_tags_rejected() {
    // Get, Set and Shard only ever travel client to server
    for tag in [0x00, 0x01, 0x04] {
        let bytes = concat(&[&[0x00], &le(5), &le(0), &[tag], &le(9)]);
        assert_eq!(decode(&bytes), Err(ParseError::UnknownInnerTag(tag)));
    }
}

#[test]
fn test_unknown_message_tag() {
    assert_eq!(decode(&[0x02]), Err(ParseError::UnknownMessageTag(2)));
    assert_eq!(
        decode(&concat(&[&[0xFF], &le(1)])),
        Err(ParseError::UnknownMessageTag(0xFF))
    );
}

#[test]
fn test_parse_error_display() {
    let err = ParseError::ShortRead {
        field: WireField::ReplyKey,
    };
    assert_eq!(err.to_string(), "short message at reply key");
}
