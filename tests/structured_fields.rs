//! Structured field handling through a session: Read Partition queries,
//! Set Reply Mode and malformed Write Structured Field payloads.

use tn3270r::lib3270::codes::*;
use tn3270r::lib3270::query_reply::{split_query_reply, SUPPORTED_QUERY_REPLIES};
use tn3270r::lib3270::{AidKey, ReplyMode, ScreenSize};
use tn3270r::{EngineConfig, Session};

const IAC: u8 = 0xFF;
const EOR: u8 = 0xEF;

fn wsf(fields: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![CMD_WRITE_STRUCTURED_FIELD];
    for field in fields {
        out.extend_from_slice(field);
    }
    out.extend_from_slice(&[IAC, EOR]);
    out
}

/// Undo IAC doubling and drop the trailing IAC EOR
fn unframe(bytes: &[u8]) -> Vec<u8> {
    let body = &bytes[..bytes.len() - 2];
    let mut out = Vec::with_capacity(body.len());
    let mut iter = body.iter();
    while let Some(&b) = iter.next() {
        out.push(b);
        if b == IAC {
            iter.next();
        }
    }
    out
}

fn session(size: ScreenSize) -> Session {
    Session::new(&EngineConfig {
        screen_size: size,
        ..EngineConfig::default()
    })
}

/// Read Partition Query answers with every supported reply in order
#[test]
fn test_query_reply_lists_capabilities() {
    let mut s = session(ScreenSize::Model4);
    let reply = s.process_incoming(&wsf(&[&[0x00, 0x05, SF_READ_PARTITION, 0xFF, RP_QUERY]]));
    let record = unframe(&reply);
    assert_eq!(record[0], AID_STRUCTURED_FIELD);

    let replies = split_query_reply(&record);
    let codes: Vec<u8> = replies.iter().map(|(code, _)| *code).collect();
    assert_eq!(codes, SUPPORTED_QUERY_REPLIES.to_vec());

    let (_, usable) = replies.iter().find(|(code, _)| *code == QR_USABLE_AREA).unwrap();
    assert_eq!(&usable[2..6], &[0x00, 80, 0x00, 43]);

    let (_, modes) = replies.iter().find(|(code, _)| *code == QR_REPLY_MODES).unwrap();
    assert_eq!(*modes, &[0x00, 0x01, 0x02]);
}

/// Query List with explicit codes returns those plus the summary
#[test]
fn test_query_list() {
    let mut s = session(ScreenSize::Model2);
    let reply = s.process_incoming(&wsf(&[&[
        0x00, 0x08, SF_READ_PARTITION, 0xFF, RP_QUERY_LIST, 0x00, QR_COLOR, QR_HIGHLIGHTING,
    ]]));
    let record = unframe(&reply);
    let codes: Vec<u8> = split_query_reply(&record).iter().map(|(code, _)| *code).collect();
    assert_eq!(codes, vec![QR_SUMMARY, QR_COLOR, QR_HIGHLIGHTING]);
}

/// Read Partition Read Modified answers in the current reply mode
#[test]
fn test_read_partition_read_modified() {
    let mut s = session(ScreenSize::Model2);
    s.process_incoming(&[CMD_ERASE_WRITE, WCC_RESET, ORDER_SF, 0x00, ORDER_IC, IAC, EOR]);
    s.type_string("Q").unwrap();

    let reply = s.process_incoming(&wsf(&[&[0x00, 0x05, SF_READ_PARTITION, 0x00, RP_READ_MODIFIED]]));
    let record = unframe(&reply);
    assert_eq!(record[0], AID_NO_AID);
    assert_eq!(&record[3..], &[ORDER_SBA, 0x40, 0xC1, 0xD8]);
}

/// Several structured fields in one record are handled in order
#[test]
fn test_multiple_fields_in_one_record() {
    let mut s = session(ScreenSize::Model2);
    let reply = s.process_incoming(&wsf(&[
        &[0x00, 0x05, SF_SET_REPLY_MODE, 0x00, 0x02],
        &[0x00, 0x05, SF_READ_PARTITION, 0xFF, RP_QUERY],
    ]));
    assert_eq!(s.reply_mode(), ReplyMode::Character);
    assert_eq!(unframe(&reply)[0], AID_STRUCTURED_FIELD);
}

/// A field with a bad length stops processing but keeps earlier fields
#[test]
fn test_bad_length_stops_processing() {
    let mut s = session(ScreenSize::Model2);
    let reply = s.process_incoming(&wsf(&[
        &[0x00, 0x05, SF_SET_REPLY_MODE, 0x00, 0x01],
        &[0x00, 0x40, SF_READ_PARTITION, 0xFF, RP_QUERY],
    ]));
    assert!(reply.is_empty());
    assert_eq!(s.reply_mode(), ReplyMode::ExtendedField);
}

/// Unknown structured field identifiers are skipped
#[test]
fn test_unknown_field_skipped() {
    let mut s = session(ScreenSize::Model2);
    let reply = s.process_incoming(&wsf(&[
        &[0x00, 0x06, 0x40, 0x00, 0x00, 0x00],
        &[0x00, 0x05, SF_READ_PARTITION, 0xFF, RP_QUERY],
    ]));
    assert!(!reply.is_empty());
}

/// Extended Field mode sends SFE in Read Buffer replies
#[test]
fn test_read_buffer_in_extended_field_mode() {
    let mut s = session(ScreenSize::Model2);
    s.process_incoming(&wsf(&[&[0x00, 0x05, SF_SET_REPLY_MODE, 0x00, 0x01]]));
    s.process_incoming(&[
        CMD_ERASE_WRITE, WCC_RESET, ORDER_SFE, 0x02, XA_3270, ATTR_PROTECTED, XA_FOREGROUND, COLOR_BLUE, IAC, EOR,
    ]);
    let reply = s.process_incoming(&[CMD_READ_BUFFER, IAC, EOR]);
    let record = unframe(&reply);
    assert_eq!(&record[3..9], &[ORDER_SFE, 0x02, XA_3270, 0x60, XA_FOREGROUND, COLOR_BLUE]);

    s.send_aid(AidKey::Clear);
    let reply = s.process_incoming(&[CMD_READ_BUFFER, IAC, EOR]);
    assert_eq!(unframe(&reply).len(), 3 + 1920);
}
