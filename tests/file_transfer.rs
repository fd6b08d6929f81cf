//! IND$FILE transfers driven through a session, with the host's Data Chain
//! structured fields arriving in Write Structured Field records.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tn3270r::lib3270::codes::*;
use tn3270r::lib3270::ind_file::{HostSystem, IndFileCommand};
use tn3270r::lib3270::transfer::{TransferDirection, TransferMode, TransferRequest, TransferState};
use tn3270r::{EngineConfig, Session, SessionCallback};

const IAC: u8 = 0xFF;
const EOR: u8 = 0xEF;

#[derive(Default, Clone)]
struct TransferLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl SessionCallback for TransferLog {
    fn transfer_started(&mut self, direction: TransferDirection, path: &Path) {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.events.lock().unwrap().push(format!("started {direction:?} {name}"));
    }

    fn transfer_progress(&mut self, bytes: u64, blocks: u32) {
        self.events.lock().unwrap().push(format!("progress {bytes} {blocks}"));
    }

    fn transfer_complete(&mut self, message: &str) {
        self.events.lock().unwrap().push(format!("complete {message}"));
    }

    fn transfer_error(&mut self, message: &str) {
        self.events.lock().unwrap().push(format!("error {message}"));
    }
}

fn with_length(mut sf: Vec<u8>) -> Vec<u8> {
    let len = sf.len() as u16;
    sf[..2].copy_from_slice(&len.to_be_bytes());
    sf
}

/// Open request; the direction byte sits at offset 14
fn open_sf(name: &str, direction: u8) -> Vec<u8> {
    let mut sf = vec![
        0x00, 0x00, SF_DATA_CHAIN, DC_OPEN, 0x12, 0x01, 0x06, 0x01, 0x01, 0x03, 0x0A, 0x0A, 0x00, 0x00,
    ];
    sf.push(direction);
    sf.extend_from_slice(&[0x00, 0x00, 0x03, 0x09]);
    sf.extend_from_slice(name.as_bytes());
    with_length(sf)
}

fn insert_sf(data: &[u8]) -> Vec<u8> {
    let mut sf = vec![0x00, 0x00, SF_DATA_CHAIN, DC_INSERT, DC_DATA_INSERT, 0xC0, 0x80, DC_BEGIN_DATA];
    sf.extend_from_slice(&((data.len() + 5) as u16).to_be_bytes());
    sf.extend_from_slice(data);
    with_length(sf)
}

fn get_sf() -> Vec<u8> {
    vec![0x00, 0x04, SF_DATA_CHAIN, DC_GET]
}

fn close_sf() -> Vec<u8> {
    vec![0x00, 0x04, SF_DATA_CHAIN, DC_CLOSE]
}

/// Send one structured field in a WSF record and return the unframed reply
fn host_sends(s: &mut Session, sf: &[u8]) -> Vec<u8> {
    let mut record = vec![CMD_WRITE_STRUCTURED_FIELD];
    for &b in sf {
        record.push(b);
        if b == IAC {
            record.push(IAC);
        }
    }
    record.extend_from_slice(&[IAC, EOR]);
    let reply = s.process_incoming(&record);
    if reply.is_empty() {
        return reply;
    }
    let mut out = Vec::new();
    let mut iter = reply[..reply.len() - 2].iter();
    while let Some(&b) = iter.next() {
        out.push(b);
        if b == IAC {
            iter.next();
        }
    }
    out
}

fn session_with_log() -> (Session, TransferLog) {
    let log = TransferLog::default();
    let mut s = Session::new(&EngineConfig::default());
    s.set_callback(Box::new(log.clone()));
    (s, log)
}

fn request(path: PathBuf, direction: TransferDirection, mode: TransferMode) -> TransferRequest {
    TransferRequest { local_path: path, direction, mode, append: false }
}

/// Host-to-terminal text transfer followed by the completion message
#[test]
fn test_download_with_completion_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    let (mut s, log) = session_with_log();
    s.prepare_transfer(request(path.clone(), TransferDirection::Download, TransferMode::Ascii { crlf: true }));

    let reply = host_sends(&mut s, &open_sf("FT:DATA", 0x00));
    assert_eq!(reply, vec![AID_STRUCTURED_FIELD, 0x00, 0x05, 0xD0, 0x00, 0x09]);
    assert_eq!(s.transfer_state(), TransferState::TransferInProgress);

    let ack = host_sends(&mut s, &insert_sf(b"LINE ONE\r\nLINE TWO\r\n"));
    assert_eq!(ack, vec![AID_STRUCTURED_FIELD, 0x00, 0x0B, 0xD0, 0x47, 0x05, 0x63, 0x06, 0x00, 0x00, 0x00, 0x01]);

    let reply = host_sends(&mut s, &close_sf());
    assert_eq!(reply, vec![AID_STRUCTURED_FIELD, 0x00, 0x05, 0xD0, 0x41, 0x09]);

    host_sends(&mut s, &open_sf("FT:MSG", 0x00));
    host_sends(&mut s, &insert_sf(b"TRANS03 File transfer complete"));
    host_sends(&mut s, &close_sf());
    assert_eq!(s.transfer_state(), TransferState::Idle);

    let newline = if cfg!(windows) { "\r\n" } else { "\n" };
    assert_eq!(fs::read_to_string(&path).unwrap(), format!("LINE ONE{newline}LINE TWO{newline}"));

    let events = log.events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            "started Download report.txt".to_string(),
            "progress 20 1".to_string(),
            "complete TRANS03 File transfer complete".to_string(),
        ]
    );
}

/// Terminal-to-host binary transfer ends with the EOF error code
#[test]
fn test_binary_upload_until_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let content: Vec<u8> = (0u8..=255).collect();
    fs::write(&path, &content).unwrap();

    let config = EngineConfig {
        binary_block_size: 200,
        ..EngineConfig::default()
    };
    let mut s = Session::new(&config);
    s.prepare_transfer(request(path, TransferDirection::Upload, TransferMode::Binary));

    let reply = host_sends(&mut s, &open_sf("FT:DATA", 0x01));
    assert_eq!(reply, vec![AID_STRUCTURED_FIELD, 0x00, 0x05, 0xD0, 0x00, 0x09]);

    let first = host_sends(&mut s, &get_sf());
    assert_eq!(&first[1..3], &(16u16 + 200).to_be_bytes());
    assert_eq!(u16::from_be_bytes([first[1], first[2]]) as usize, first.len() - 1);
    assert_eq!(&first[17..], &content[..200]);

    let second = host_sends(&mut s, &get_sf());
    assert_eq!(&second[8..12], &2u32.to_be_bytes());
    assert_eq!(&second[17..], &content[200..]);

    let eof = host_sends(&mut s, &get_sf());
    assert_eq!(eof, vec![AID_STRUCTURED_FIELD, 0x00, 0x09, 0xD0, 0x46, 0x08, 0x69, 0x04, 0x22, 0x00]);
    assert_eq!(s.transfer_state(), TransferState::Idle);

    let reply = host_sends(&mut s, &close_sf());
    assert_eq!(reply, vec![AID_STRUCTURED_FIELD, 0x00, 0x05, 0xD0, 0x41, 0x09]);
}

/// Set Cursor and Get in one record produce a single inbound record
#[test]
fn test_set_cursor_then_get_in_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("four.bin");
    fs::write(&path, b"ABCD").unwrap();
    let mut s = Session::new(&EngineConfig::default());
    s.prepare_transfer(request(path, TransferDirection::Upload, TransferMode::Binary));
    host_sends(&mut s, &open_sf("FT:DATA", 0x01));

    let mut record = vec![CMD_WRITE_STRUCTURED_FIELD];
    record.extend_from_slice(&[0x00, 0x05, SF_DATA_CHAIN, DC_SET_CURSOR, 0x00]);
    record.extend_from_slice(&get_sf());
    record.extend_from_slice(&[IAC, EOR]);
    let reply = s.process_incoming(&record);

    let terminators = reply.windows(2).filter(|w| *w == [IAC, EOR]).count();
    assert_eq!(terminators, 1);
    assert!(reply.ends_with(&[IAC, EOR]));

    let body = &reply[..reply.len() - 2];
    assert_eq!(body[0], AID_STRUCTURED_FIELD);
    assert_eq!(u16::from_be_bytes([body[1], body[2]]) as usize, body.len() - 1);
    assert_eq!(&body[3..5], &[SF_DATA_CHAIN, DC_GET]);
    assert_eq!(&body[8..12], &1u32.to_be_bytes());
    assert_eq!(&body[17..], b"ABCD");
}

/// A missing upload file is refused at open time
#[test]
fn test_upload_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (mut s, log) = session_with_log();
    s.prepare_transfer(request(dir.path().join("absent.txt"), TransferDirection::Upload, TransferMode::Binary));

    let reply = host_sends(&mut s, &open_sf("FT:DATA", 0x01));
    assert_eq!(&reply[4..6], &[DC_OPEN, DC_RESPONSE_NEGATIVE]);
    assert_eq!(&reply[8..], &DC_ERR_FILE_NOT_FOUND.to_be_bytes());
    assert_eq!(s.transfer_state(), TransferState::Error);
    assert!(log.events.lock().unwrap()[0].starts_with("error"));
}

/// Without a prepared request the open fails
#[test]
fn test_open_without_prepare() {
    let mut s = Session::new(&EngineConfig::default());
    let reply = host_sends(&mut s, &open_sf("FT:DATA", 0x00));
    assert_eq!(&reply[8..], &DC_ERR_OPEN.to_be_bytes());
}

/// Cancelling forgets the request and returns to idle
#[test]
fn test_cancel_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = Session::new(&EngineConfig::default());
    s.prepare_transfer(request(dir.path().join("x"), TransferDirection::Download, TransferMode::Binary));
    host_sends(&mut s, &open_sf("FT:DATA", 0x00));
    assert_eq!(s.transfer_state(), TransferState::TransferInProgress);
    s.cancel_transfer();
    assert_eq!(s.transfer_state(), TransferState::Idle);
}

/// The IND$FILE command text typed for a transfer
#[test]
fn test_ind_file_command_for_session() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("in.txt");
    let command = IndFileCommand::new(TransferDirection::Download, "'USER.DATA'", HostSystem::Tso);
    let request = command.request_for(&local);
    assert_eq!(request.direction, TransferDirection::Download);
    assert_eq!(request.local_path, local);
    assert!(command.to_string().starts_with("IND$FILE GET 'USER.DATA'"));
}
