//! IND$FILE file transfer over Data Chain structured fields
//!
//! The host side of IND$FILE drives the transfer with Data Chain (0xD0)
//! structured fields: Open, Set Cursor, Get, Insert and Close. The terminal
//! answers each request with a positive or negative acknowledgement. A
//! transfer always opens two pseudo-files: `FT:DATA` carries the file
//! contents and `FT:MSG` carries the host's completion message.
//!
//! Local file I/O is synchronous and happens while the record is processed.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use log::{debug, info, warn};

use super::codes::*;
use crate::error::{TransferError, TransferResult};

/// Default payload cap for a text Get reply
pub const DEFAULT_TEXT_BLOCK_SIZE: usize = 1900;
/// Default payload cap for a binary Get reply
pub const DEFAULT_BINARY_BLOCK_SIZE: usize = 2000;

/// Offset of the direction byte in an Open request
const OPEN_DIRECTION_OFFSET: usize = 14;
/// Direction byte meaning the host will GET records from the terminal
const OPEN_DIRECTION_HOST_GET: u8 = 0x01;
/// Offset of the begin-data marker in an Insert request
const INSERT_DATA_MARKER_OFFSET: usize = 7;
/// Offset of the first data byte in an Insert request
const INSERT_DATA_OFFSET: usize = 10;

const FT_MARKER: &[u8] = b"FT:";
const FT_DATA: &str = "FT:DATA";
const FT_MSG: &str = "FT:MSG";

/// DOS end-of-file byte some hosts append to text files
const ASCII_EOF: u8 = 0x1A;

#[cfg(windows)]
const NEWLINE: &[u8] = b"\r\n";
#[cfg(not(windows))]
const NEWLINE: &[u8] = b"\n";

/// Transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    TransferInProgress,
    Error,
}

/// Which way the file moves, seen from the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Local file to host (IND$FILE PUT; the host GETs records)
    Upload,
    /// Host file to local (IND$FILE GET; the host INSERTs records)
    Download,
}

/// Data conversion for a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Text; the host translates to EBCDIC, `crlf` marks records by line ends
    Ascii { crlf: bool },
    Binary,
}

impl TransferMode {
    pub fn is_text(&self) -> bool {
        matches!(self, TransferMode::Ascii { .. })
    }
}

/// Local side of a transfer, prepared before the IND$FILE command is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub local_path: PathBuf,
    pub direction: TransferDirection,
    pub mode: TransferMode,
    pub append: bool,
}

/// Something the user interface should hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Started { direction: TransferDirection, path: PathBuf },
    Progress { bytes: u64, blocks: u32 },
    Complete { message: String },
    Error { message: String },
}

enum LocalStream {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

/// IND$FILE data-chain state machine
pub struct FileTransferEngine {
    state: TransferState,
    direction: Option<TransferDirection>,
    block_sequence: u32,
    is_text: bool,
    is_message_transfer: bool,
    message_received: bool,
    request: Option<TransferRequest>,
    stream: Option<LocalStream>,
    /// Text already read from the upload file but not yet sent
    pending_upload: Vec<u8>,
    /// Download text block ended with CR
    pending_cr: bool,
    bytes_transferred: u64,
    text_block_size: usize,
    binary_block_size: usize,
    events: Vec<TransferEvent>,
}

impl FileTransferEngine {
    pub fn new() -> Self {
        Self::with_block_sizes(DEFAULT_TEXT_BLOCK_SIZE, DEFAULT_BINARY_BLOCK_SIZE)
    }

    pub fn with_block_sizes(text_block_size: usize, binary_block_size: usize) -> Self {
        Self {
            state: TransferState::Idle,
            direction: None,
            block_sequence: 0,
            is_text: true,
            is_message_transfer: false,
            message_received: false,
            request: None,
            stream: None,
            pending_upload: Vec::new(),
            pending_cr: false,
            bytes_transferred: 0,
            text_block_size: text_block_size.max(3),
            binary_block_size: binary_block_size.max(1),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn direction(&self) -> Option<TransferDirection> {
        self.direction
    }

    pub fn block_sequence(&self) -> u32 {
        self.block_sequence
    }

    pub fn is_message_transfer(&self) -> bool {
        self.is_message_transfer
    }

    pub fn request(&self) -> Option<&TransferRequest> {
        self.request.as_ref()
    }

    /// Register the local file for the next `FT:DATA` open
    pub fn prepare(&mut self, request: TransferRequest) {
        debug!("transfer prepared: {:?}", request);
        self.request = Some(request);
    }

    /// Abort whatever is in progress and forget the prepared request
    pub fn cancel(&mut self) {
        if self.state == TransferState::TransferInProgress {
            info!("transfer cancelled");
        }
        self.stream = None;
        self.request = None;
        self.pending_upload.clear();
        self.pending_cr = false;
        self.is_message_transfer = false;
        self.state = TransferState::Idle;
    }

    /// Events raised since the last call
    pub fn take_events(&mut self) -> Vec<TransferEvent> {
        std::mem::take(&mut self.events)
    }

    /// Handle one Data Chain structured field (length, 0xD0, operation, ...)
    ///
    /// Returns the structured field to send back, if the operation has one.
    pub fn process(&mut self, sf: &[u8]) -> Option<Vec<u8>> {
        if sf.len() < 4 {
            warn!("data chain structured field too short: {} bytes", sf.len());
            return None;
        }
        let op = sf[3];
        match op {
            DC_OPEN => Some(self.open(sf)),
            DC_CLOSE => Some(self.close()),
            DC_SET_CURSOR => {
                debug!("data chain set cursor");
                None
            }
            DC_GET => Some(self.get()),
            DC_INSERT => self.insert(sf),
            other => {
                debug!("ignoring data chain operation 0x{other:02X}");
                None
            }
        }
    }

    fn open(&mut self, sf: &[u8]) -> Vec<u8> {
        let name = match find_file_name(sf) {
            Some(name) => name,
            None => {
                warn!("data chain open without FT: file name");
                return error_reply(DC_OPEN, &TransferError::MissingData);
            }
        };
        debug!("data chain open {name}");

        self.stream = None;
        self.pending_upload.clear();
        self.pending_cr = false;
        self.block_sequence = 0;
        self.message_received = false;

        if name.starts_with(FT_MSG) {
            self.is_message_transfer = true;
            self.state = TransferState::TransferInProgress;
            return positive_reply(DC_OPEN);
        }
        if !name.starts_with(FT_DATA) {
            return error_reply(
                DC_OPEN,
                &TransferError::Unsupported { reason: format!("pseudo-file {name}") },
            );
        }

        self.is_message_transfer = false;
        let direction = if sf.get(OPEN_DIRECTION_OFFSET) == Some(&OPEN_DIRECTION_HOST_GET) {
            TransferDirection::Upload
        } else {
            TransferDirection::Download
        };

        match self.open_local(direction) {
            Ok(()) => {
                self.direction = Some(direction);
                self.bytes_transferred = 0;
                self.state = TransferState::TransferInProgress;
                if let Some(request) = &self.request {
                    info!("transfer started: {:?} {}", direction, request.local_path.display());
                    self.events.push(TransferEvent::Started {
                        direction,
                        path: request.local_path.clone(),
                    });
                }
                positive_reply(DC_OPEN)
            }
            Err(err) => self.fail(DC_OPEN, err),
        }
    }

    fn open_local(&mut self, direction: TransferDirection) -> TransferResult<()> {
        let request = self.request.as_ref().ok_or_else(|| TransferError::OpenFailed {
            path: String::new(),
            reason: "no transfer prepared".to_string(),
        })?;
        if request.direction != direction {
            warn!(
                "host direction {:?} differs from prepared {:?}",
                direction, request.direction
            );
        }
        let path_text = request.local_path.display().to_string();
        self.is_text = request.mode.is_text();

        let stream = match direction {
            TransferDirection::Upload => File::open(&request.local_path)
                .map(|file| LocalStream::Reader(BufReader::new(file))),
            TransferDirection::Download => OpenOptions::new()
                .write(true)
                .create(true)
                .append(request.append)
                .truncate(!request.append)
                .open(&request.local_path)
                .map(|file| LocalStream::Writer(BufWriter::new(file))),
        }
        .map_err(|err| TransferError::from_open(&path_text, &err))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn get(&mut self) -> Vec<u8> {
        match self.read_block() {
            Ok(data) => {
                self.block_sequence += 1;
                self.bytes_transferred += data.len() as u64;
                self.events.push(TransferEvent::Progress {
                    bytes: self.bytes_transferred,
                    blocks: self.block_sequence,
                });
                get_reply(self.block_sequence, &data)
            }
            Err(TransferError::EndOfFile) => {
                debug!("upload stream exhausted after {} blocks", self.block_sequence);
                self.stream = None;
                self.state = TransferState::Idle;
                error_reply(DC_GET, &TransferError::EndOfFile)
            }
            Err(err) => self.fail(DC_GET, err),
        }
    }

    fn read_block(&mut self) -> TransferResult<Vec<u8>> {
        let reader = match self.stream.as_mut() {
            Some(LocalStream::Reader(reader)) => reader,
            _ => {
                return Err(TransferError::Unsupported {
                    reason: "get without an open upload".to_string(),
                })
            }
        };
        let read_error = |err: std::io::Error| TransferError::OpenFailed {
            path: String::new(),
            reason: err.to_string(),
        };

        if !self.is_text {
            let mut block = vec![0u8; self.binary_block_size];
            let n = reader.read(&mut block).map_err(read_error)?;
            if n == 0 {
                return Err(TransferError::EndOfFile);
            }
            block.truncate(n);
            return Ok(block);
        }

        if self.pending_upload.is_empty() {
            let mut line = Vec::new();
            let n = reader.read_until(b'\n', &mut line).map_err(read_error)?;
            if n == 0 {
                return Err(TransferError::EndOfFile);
            }
            while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                line.pop();
            }
            line.extend_from_slice(b"\r\n");
            self.pending_upload = line;
        }
        let take = self.pending_upload.len().min(self.text_block_size);
        Ok(self.pending_upload.drain(..take).collect())
    }

    fn insert(&mut self, sf: &[u8]) -> Option<Vec<u8>> {
        if sf.len() <= INSERT_DATA_MARKER_OFFSET || sf[INSERT_DATA_MARKER_OFFSET] != DC_BEGIN_DATA {
            debug!("data chain insert header skipped");
            return None;
        }
        if sf.len() < INSERT_DATA_OFFSET {
            return Some(self.fail(DC_INSERT, TransferError::MissingData));
        }
        let declared = u16::from_be_bytes([sf[8], sf[9]]) as usize;
        let data_len = declared.saturating_sub(5).min(sf.len() - INSERT_DATA_OFFSET);
        let data = &sf[INSERT_DATA_OFFSET..INSERT_DATA_OFFSET + data_len];

        self.block_sequence += 1;

        if self.is_message_transfer {
            if !self.message_received {
                self.message_received = true;
                self.handle_message(data);
            }
            return Some(insert_ack(self.block_sequence));
        }

        match self.write_block(data) {
            Ok(()) => {
                self.bytes_transferred += data.len() as u64;
                self.events.push(TransferEvent::Progress {
                    bytes: self.bytes_transferred,
                    blocks: self.block_sequence,
                });
                Some(insert_ack(self.block_sequence))
            }
            Err(err) => Some(self.fail(DC_INSERT, err)),
        }
    }

    fn write_block(&mut self, data: &[u8]) -> TransferResult<()> {
        let writer = match self.stream.as_mut() {
            Some(LocalStream::Writer(writer)) => writer,
            _ => {
                return Err(TransferError::WriteFailed {
                    reason: "insert without an open download".to_string(),
                })
            }
        };
        let write_error = |err: std::io::Error| TransferError::WriteFailed { reason: err.to_string() };

        if !self.is_text {
            return writer.write_all(data).map_err(write_error);
        }

        let mut out = Vec::with_capacity(data.len());
        for &byte in data {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    out.extend_from_slice(NEWLINE);
                    continue;
                }
                out.push(b'\r');
            }
            match byte {
                b'\r' => self.pending_cr = true,
                ASCII_EOF => {}
                _ => out.push(byte),
            }
        }
        writer.write_all(&out).map_err(write_error)
    }

    /// The FT:MSG block: the host's verdict on the whole transfer
    fn handle_message(&mut self, data: &[u8]) {
        let message = String::from_utf8_lossy(data)
            .trim_end_matches(|c: char| matches!(c, '\0' | '\r' | '\n' | ' '))
            .to_string();
        let failed = ["Error", "TRANS13", "TRANS14"]
            .iter()
            .any(|marker| message.contains(marker));
        if failed {
            warn!("transfer failed: {message}");
            self.events.push(TransferEvent::Error { message });
        } else {
            info!("transfer complete: {message}");
            self.events.push(TransferEvent::Complete { message });
        }
        self.state = TransferState::Idle;
    }

    fn close(&mut self) -> Vec<u8> {
        let result = match self.stream.take() {
            Some(LocalStream::Writer(mut writer)) => {
                let tail: &[u8] = if self.pending_cr { b"\r" } else { b"" };
                self.pending_cr = false;
                writer
                    .write_all(tail)
                    .and_then(|_| writer.flush())
                    .map_err(|err| TransferError::CloseFailed { reason: err.to_string() })
            }
            _ => Ok(()),
        };
        self.pending_upload.clear();
        if self.state == TransferState::TransferInProgress && !self.is_message_transfer {
            debug!("data transfer closed after {} bytes", self.bytes_transferred);
        }
        self.is_message_transfer = false;
        match result {
            Ok(()) => {
                if self.state != TransferState::Error {
                    self.state = TransferState::Idle;
                }
                positive_reply(DC_CLOSE)
            }
            Err(err) => self.fail(DC_CLOSE, err),
        }
    }

    /// Abort the transfer and build the negative acknowledgement
    fn fail(&mut self, op: u8, err: TransferError) -> Vec<u8> {
        warn!("transfer error on operation 0x{op:02X}: {err}");
        self.stream = None;
        self.pending_upload.clear();
        self.state = TransferState::Error;
        self.events.push(TransferEvent::Error { message: err.to_string() });
        error_reply(op, &err)
    }
}

impl Default for FileTransferEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Pseudo-file name following the "FT:" marker
fn find_file_name(sf: &[u8]) -> Option<String> {
    let start = sf.windows(FT_MARKER.len()).position(|w| w == FT_MARKER)?;
    let name: String = sf[start..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b':')
        .map(|&b| b as char)
        .collect();
    Some(name)
}

fn positive_reply(op: u8) -> Vec<u8> {
    vec![0x00, 0x05, SF_DATA_CHAIN, op, DC_RESPONSE_POSITIVE]
}

fn error_reply(op: u8, err: &TransferError) -> Vec<u8> {
    let mut reply = vec![0x00, 0x09, SF_DATA_CHAIN, op, DC_RESPONSE_NEGATIVE];
    reply.extend_from_slice(&DC_ERROR_HEADER);
    reply.extend_from_slice(&err.code().to_be_bytes());
    reply
}

fn insert_ack(sequence: u32) -> Vec<u8> {
    let mut reply = vec![0x00, 0x0B, SF_DATA_CHAIN, DC_INSERT, DC_GET_REPLY];
    reply.extend_from_slice(&DC_RECNUM_HEADER);
    reply.extend_from_slice(&sequence.to_be_bytes());
    reply
}

fn get_reply(sequence: u32, data: &[u8]) -> Vec<u8> {
    let length = (16 + data.len()) as u16;
    let mut reply = Vec::with_capacity(length as usize);
    reply.extend_from_slice(&length.to_be_bytes());
    reply.extend_from_slice(&[SF_DATA_CHAIN, DC_GET, DC_GET_REPLY]);
    reply.extend_from_slice(&DC_RECNUM_HEADER);
    reply.extend_from_slice(&sequence.to_be_bytes());
    reply.extend_from_slice(&DC_NOT_COMPRESSED);
    reply.push(DC_BEGIN_DATA);
    reply.extend_from_slice(&((data.len() + 5) as u16).to_be_bytes());
    reply.extend_from_slice(data);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn open_sf(name: &str, direction: u8) -> Vec<u8> {
        let mut sf = vec![0x00, 0x00, SF_DATA_CHAIN, DC_OPEN, 0x12, 0x01, 0x06, 0x01, 0x01, 0x03, 0x0A, 0x0A, 0x00, 0x00];
        sf.push(direction);
        sf.extend_from_slice(&[0x00, 0x00, 0x03, 0x09]);
        sf.extend_from_slice(name.as_bytes());
        let len = sf.len() as u16;
        sf[..2].copy_from_slice(&len.to_be_bytes());
        sf
    }

    fn insert_sf(data: &[u8]) -> Vec<u8> {
        let mut sf = vec![0x00, 0x00, SF_DATA_CHAIN, DC_INSERT, DC_DATA_INSERT, 0xC0, 0x80, DC_BEGIN_DATA];
        sf.extend_from_slice(&((data.len() + 5) as u16).to_be_bytes());
        sf.extend_from_slice(data);
        let len = sf.len() as u16;
        sf[..2].copy_from_slice(&len.to_be_bytes());
        sf
    }

    fn engine_for(path: PathBuf, direction: TransferDirection, mode: TransferMode) -> FileTransferEngine {
        let mut engine = FileTransferEngine::new();
        engine.prepare(TransferRequest { local_path: path, direction, mode, append: false });
        engine
    }

    #[test]
    fn test_open_upload_acks_positively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("up.txt");
        fs::write(&path, "line\n").unwrap();
        let mut engine = engine_for(path, TransferDirection::Upload, TransferMode::Ascii { crlf: true });

        let reply = engine.process(&open_sf("FT:DATA", 0x01));
        assert_eq!(reply, Some(vec![0x00, 0x05, 0xD0, 0x00, 0x09]));
        assert_eq!(engine.state(), TransferState::TransferInProgress);
        assert_eq!(engine.direction(), Some(TransferDirection::Upload));
        assert!(matches!(engine.take_events()[0], TransferEvent::Started { .. }));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine_for(dir.path().join("nope"), TransferDirection::Upload, TransferMode::Binary);
        let reply = engine.process(&open_sf("FT:DATA", 0x01)).unwrap();
        assert_eq!(reply, vec![0x00, 0x09, 0xD0, 0x00, 0x08, 0x69, 0x04, 0x1B, 0x00]);
        assert_eq!(engine.state(), TransferState::Error);
    }

    #[test]
    fn test_open_without_request() {
        let mut engine = FileTransferEngine::new();
        let reply = engine.process(&open_sf("FT:DATA", 0x00)).unwrap();
        assert_eq!(&reply[7..], &[0x20, 0x00]);
    }

    #[test]
    fn test_text_upload_blocks_then_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("up.txt");
        fs::write(&path, "AB\r\nC\n").unwrap();
        let mut engine = engine_for(path, TransferDirection::Upload, TransferMode::Ascii { crlf: true });
        engine.process(&open_sf("FT:DATA", 0x01));

        let set_cursor = [0x00, 0x05, SF_DATA_CHAIN, DC_SET_CURSOR, 0x00];
        assert_eq!(engine.process(&set_cursor), None);

        let first = engine.process(&[0x00, 0x04, SF_DATA_CHAIN, DC_GET]).unwrap();
        assert_eq!(&first[..2], &(16u16 + 4).to_be_bytes());
        assert_eq!(u16::from_be_bytes([first[0], first[1]]) as usize, first.len());
        assert_eq!(&first[2..7], &[0xD0, 0x46, 0x05, 0x63, 0x06]);
        assert_eq!(&first[7..11], &1u32.to_be_bytes());
        assert_eq!(&first[11..14], &[0xC0, 0x80, 0x61]);
        assert_eq!(&first[14..16], &9u16.to_be_bytes());
        assert_eq!(&first[16..], b"AB\r\n");

        let second = engine.process(&[0x00, 0x04, SF_DATA_CHAIN, DC_GET]).unwrap();
        assert_eq!(&second[7..11], &2u32.to_be_bytes());
        assert_eq!(&second[16..], b"C\r\n");

        let eof = engine.process(&[0x00, 0x04, SF_DATA_CHAIN, DC_GET]).unwrap();
        assert_eq!(eof, vec![0x00, 0x09, 0xD0, 0x46, 0x08, 0x69, 0x04, 0x22, 0x00]);
        assert_eq!(engine.state(), TransferState::Idle);
    }

    #[test]
    fn test_long_text_line_is_split() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.txt");
        fs::write(&path, "ABCDEFGH\n").unwrap();
        let mut engine = FileTransferEngine::with_block_sizes(4, 2000);
        engine.prepare(TransferRequest {
            local_path: path,
            direction: TransferDirection::Upload,
            mode: TransferMode::Ascii { crlf: true },
            append: false,
        });
        engine.process(&open_sf("FT:DATA", 0x01));
        let get = [0x00, 0x04, SF_DATA_CHAIN, DC_GET];
        let blocks: Vec<Vec<u8>> = (0..3).filter_map(|_| engine.process(&get)).map(|r| r[16..].to_vec()).collect();
        assert_eq!(blocks, vec![b"ABCD".to_vec(), b"EFGH".to_vec(), b"\r\n".to_vec()]);
    }

    #[test]
    fn test_binary_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("down.bin");
        let mut engine = engine_for(path.clone(), TransferDirection::Download, TransferMode::Binary);
        engine.process(&open_sf("FT:DATA", 0x00));

        // Insert request header: no reply
        let header = [0x00, 0x0A, SF_DATA_CHAIN, DC_INSERT, 0x11, 0x01, 0x04, 0x00, 0x80, 0x00];
        assert_eq!(engine.process(&header), None);

        let ack = engine.process(&insert_sf(&[0x00, 0x0D, 0x0A, 0x1A, 0xFF])).unwrap();
        assert_eq!(ack, vec![0x00, 0x0B, 0xD0, 0x47, 0x05, 0x63, 0x06, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(engine.process(&[0x00, 0x04, SF_DATA_CHAIN, DC_CLOSE]), Some(vec![0x00, 0x05, 0xD0, 0x41, 0x09]));
        assert_eq!(fs::read(&path).unwrap(), vec![0x00, 0x0D, 0x0A, 0x1A, 0xFF]);
        assert_eq!(engine.state(), TransferState::Idle);
    }

    #[test]
    fn test_text_download_converts_line_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("down.txt");
        let mut engine = engine_for(path.clone(), TransferDirection::Download, TransferMode::Ascii { crlf: true });
        engine.process(&open_sf("FT:DATA", 0x00));
        engine.process(&insert_sf(b"ONE\r"));
        engine.process(&insert_sf(b"\nTWO\r\n\x1a"));
        engine.process(&[0x00, 0x04, SF_DATA_CHAIN, DC_CLOSE]);

        let expected = format!("ONE{0}TWO{0}", String::from_utf8_lossy(NEWLINE));
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_message_transfer() {
        let mut engine = FileTransferEngine::new();
        assert_eq!(engine.process(&open_sf("FT:MSG", 0x00)), Some(positive_reply(DC_OPEN)));
        assert!(engine.is_message_transfer());

        let ack = engine.process(&insert_sf(b"TRANS03 File transfer complete\0")).unwrap();
        assert_eq!(&ack[7..], &1u32.to_be_bytes());
        let ack = engine.process(&insert_sf(b"ignored")).unwrap();
        assert_eq!(&ack[7..], &2u32.to_be_bytes());

        let events = engine.take_events();
        assert_eq!(events, vec![TransferEvent::Complete { message: "TRANS03 File transfer complete".into() }]);
        assert_eq!(engine.state(), TransferState::Idle);
    }

    #[test]
    fn test_message_transfer_failure() {
        let mut engine = FileTransferEngine::new();
        engine.process(&open_sf("FT:MSG", 0x00));
        engine.process(&insert_sf(b"TRANS14 Error writing file"));
        assert!(matches!(engine.take_events()[0], TransferEvent::Error { .. }));
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("down.txt");
        let mut engine = engine_for(path, TransferDirection::Download, TransferMode::Binary);
        engine.process(&open_sf("FT:DATA", 0x00));
        engine.cancel();
        assert_eq!(engine.state(), TransferState::Idle);
        assert!(engine.request().is_none());
    }

    #[test]
    fn test_file_name_search() {
        assert_eq!(find_file_name(b"\x00\x01FT:DATA\x00"), Some("FT:DATA".to_string()));
        assert_eq!(find_file_name(b"nothing"), None);
    }
}
