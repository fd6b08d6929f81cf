//! Property-based invariant tests for the wire codecs and stream parsers.
//!
//! 1. Buffer addresses survive encode then decode for every screen size.
//! 2. 12-bit addresses never produce telnet or order control bytes.
//! 3. Record boundaries do not depend on how the transport chunks the stream.
//! 4. Arbitrary host bytes never panic a session or leave the cursor outside the buffer.
//! 5. Alphanumeric text survives EBCDIC conversion.

use proptest::prelude::*;

use tn3270r::lib3270::ebcdic::{ebcdic_to_string, string_to_ebcdic};
use tn3270r::lib3270::{decode_address, encode_address, ScreenSize};
use tn3270r::telnet_negotiation::{TelnetEvent, TelnetNegotiator};
use tn3270r::{EngineConfig, Session};

fn screen_size_strategy() -> impl Strategy<Value = ScreenSize> {
    prop_oneof![
        Just(ScreenSize::Model2),
        Just(ScreenSize::Model3),
        Just(ScreenSize::Model4),
        Just(ScreenSize::Model5),
    ]
}

fn records(negotiator: &mut TelnetNegotiator, chunks: &[&[u8]]) -> Vec<Vec<u8>> {
    chunks
        .iter()
        .flat_map(|chunk| negotiator.process_incoming_data(chunk))
        .filter_map(|event| match event {
            TelnetEvent::Record(record) => Some(record),
            _ => None,
        })
        .collect()
}

proptest! {
    #[test]
    fn address_round_trip(size in screen_size_strategy(), seed in any::<usize>()) {
        let pos = seed % size.buffer_size();
        let [b1, b2] = encode_address(pos);
        prop_assert_eq!(decode_address(b1, b2, size.buffer_size()), pos);
    }

    #[test]
    fn twelve_bit_addresses_are_graphic(pos in 0usize..4096) {
        let [b1, b2] = encode_address(pos);
        prop_assert!(b1 >= 0x40 && b2 >= 0x40, "pos {} encoded as {:02X} {:02X}", pos, b1, b2);
        prop_assert!(b1 != 0xFF && b2 != 0xFF);
    }

    #[test]
    fn chunking_does_not_change_records(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..40), 1..5),
        split in any::<usize>(),
    ) {
        let mut stream = Vec::new();
        for payload in &payloads {
            for &b in payload {
                stream.push(b);
                if b == 0xFF {
                    stream.push(0xFF);
                }
            }
            stream.extend_from_slice(&[0xFF, 0xEF]);
        }

        let whole = records(&mut TelnetNegotiator::new(2), &[&stream]);
        let at = split % (stream.len() + 1);
        let split_up = records(&mut TelnetNegotiator::new(2), &[&stream[..at], &stream[at..]]);

        prop_assert_eq!(&whole, &payloads);
        prop_assert_eq!(split_up, whole);
    }

    #[test]
    fn session_survives_arbitrary_records(
        size in screen_size_strategy(),
        records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..8),
    ) {
        let mut session = Session::new(&EngineConfig { screen_size: size, ..EngineConfig::default() });
        for record in &records {
            let mut framed = record.clone();
            framed.extend_from_slice(&[0xFF, 0xEF]);
            session.process_incoming(&framed);
            prop_assert!(session.display().cursor() < session.display().buffer_size());
        }
    }

    #[test]
    fn alphanumeric_text_survives_ebcdic(text in "[A-Za-z0-9 ]{0,64}") {
        prop_assert_eq!(ebcdic_to_string(&string_to_ebcdic(&text)), text);
    }
}
