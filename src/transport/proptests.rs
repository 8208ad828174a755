//! Property-based tests for record framing
//!
//! Chunk boundaries are arbitrary on the wire, so decoding must not depend on
//! where the body happens to be split.

use super::framing::RecordDecoder;
use super::types::{ChunkHit, StreamEvent};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Text including multi-byte characters, quotes and think markers
fn arb_content() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 _.!?,]{0,30}",
        "[\u{4e00}-\u{4e20}]{1,10}",
        Just("<think>".to_string()),
        Just("</think>".to_string()),
        Just("say \"hi\"\nand\\go".to_string()),
        Just("\u{1F600} emoji".to_string()),
    ]
}

fn arb_hit() -> impl Strategy<Value = ChunkHit> {
    ("[a-z0-9-]{1,12}", "[a-zA-Z ]{0,20}", arb_content()).prop_map(|(node_id, name, summary)| {
        ChunkHit {
            node_id,
            name,
            summary,
        }
    })
}

fn arb_event() -> impl Strategy<Value = StreamEvent> {
    prop_oneof![
        arb_content().prop_map(|content| StreamEvent::ConversationId { content }),
        arb_content().prop_map(|content| StreamEvent::Nonce { content }),
        arb_content().prop_map(|content| StreamEvent::Data { content }),
        arb_content().prop_map(|content| StreamEvent::Error { content }),
        proptest::collection::vec(arb_hit(), 0..3)
            .prop_map(|chunk_result| StreamEvent::ChunkResult { chunk_result }),
        Just(StreamEvent::Done),
    ]
}

/// How one record is laid out on the wire
#[derive(Debug, Clone, Copy)]
struct RecordStyle {
    space_after_prefix: bool,
    crlf: bool,
    /// Split the JSON over two `data:` lines at a structural comma
    two_lines: bool,
}

fn arb_style() -> impl Strategy<Value = RecordStyle> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(space_after_prefix, crlf, two_lines)| {
        RecordStyle {
            space_after_prefix,
            crlf,
            two_lines,
        }
    })
}

fn encode(event: &StreamEvent, style: RecordStyle) -> String {
    let json = serde_json::to_string(event).unwrap();
    let prefix = if style.space_after_prefix { "data: " } else { "data:" };
    let eol = if style.crlf { "\r\n" } else { "\n" };

    // serde_json writes `{"type":...,` first, so the first comma is structural
    let lines: Vec<&str> = match json.split_once(',') {
        Some((head, tail)) if style.two_lines => vec![head, tail],
        _ => vec![json.as_str()],
    };

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(prefix);
        if i > 0 {
            out.push(',');
        }
        out.push_str(line);
        out.push_str(eol);
    }
    out.push_str(eol);
    out
}

/// Cut `bytes` at the given (sorted, deduplicated) offsets
fn split_at_offsets(bytes: &[u8], offsets: &[usize]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for &offset in offsets {
        if offset > start && offset < bytes.len() {
            chunks.push(bytes[start..offset].to_vec());
            start = offset;
        }
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn decode_all(chunks: &[Vec<u8>]) -> Vec<StreamEvent> {
    let mut decoder = RecordDecoder::new();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(decoder.feed(chunk));
    }
    events.extend(decoder.finish());
    events
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_framing_is_split_invariant(
        records in proptest::collection::vec((arb_event(), arb_style()), 1..8),
        mut offsets in proptest::collection::vec(0usize..4096, 0..20),
    ) {
        let body: String = records.iter().map(|(event, style)| encode(event, *style)).collect();
        let bytes = body.as_bytes();
        let expected: Vec<StreamEvent> = records.iter().map(|(event, _)| event.clone()).collect();

        offsets.iter_mut().for_each(|o| *o %= bytes.len());
        offsets.sort_unstable();
        offsets.dedup();

        let whole = decode_all(&[bytes.to_vec()]);
        let split = decode_all(&split_at_offsets(bytes, &offsets));

        prop_assert_eq!(&whole, &expected);
        prop_assert_eq!(&split, &expected);
    }

    #[test]
    fn prop_byte_at_a_time(
        records in proptest::collection::vec(arb_event(), 1..5),
    ) {
        let body: String = records
            .iter()
            .map(|event| encode(event, RecordStyle { space_after_prefix: true, crlf: false, two_lines: false }))
            .collect();
        let chunks: Vec<Vec<u8>> = body.as_bytes().iter().map(|b| vec![*b]).collect();

        prop_assert_eq!(decode_all(&chunks), records);
    }

    #[test]
    fn prop_malformed_records_do_not_stop_decoding(
        before in proptest::collection::vec(arb_event(), 0..4),
        garbage in "[a-z{}: ]{1,20}",
        after in proptest::collection::vec(arb_event(), 1..4),
    ) {
        let style = RecordStyle { space_after_prefix: true, crlf: false, two_lines: false };
        let mut body: String = before.iter().map(|e| encode(e, style)).collect();
        body.push_str("data: {");
        body.push_str(&garbage);
        body.push_str("\n\n");
        body.extend(after.iter().map(|e| encode(e, style)));

        let mut expected = before.clone();
        expected.extend(after.iter().cloned());

        prop_assert_eq!(decode_all(&[body.into_bytes()]), expected);
    }
}
