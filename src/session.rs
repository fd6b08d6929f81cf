//! TN3270 session driver
//!
//! A [`Session`] owns one instance of every protocol component for a single
//! connection: the telnet negotiator, the display buffer and the structured
//! field engine (with its file transfer state). Transport bytes go in through
//! [`Session::process_incoming`]; whatever must be written back comes out
//! already framed. Operator input goes through the keyboard methods and
//! [`Session::send_aid`].
//!
//! A session is driven from one thread at a time and takes no locks.

use log::{debug, info, warn};

use crate::callbacks::{NoopCallback, SessionCallback};
use crate::config::EngineConfig;
use crate::error::{InputError, InputResult, ProtocolError, ProtocolResult};
use crate::lib3270::codes::*;
use crate::lib3270::display::Display3270;
use crate::lib3270::field::ExtendedAttributes;
use crate::lib3270::orders::apply_orders;
use crate::lib3270::response::{ReplyMode, ResponseBuilder};
use crate::lib3270::structured_field::StructuredFieldEngine;
use crate::lib3270::transfer::{FileTransferEngine, TransferEvent, TransferRequest, TransferState};
use crate::telnet_negotiation::{TelnetEvent, TelnetNegotiator};

pub struct Session {
    display: Display3270,
    negotiator: TelnetNegotiator,
    structured_fields: StructuredFieldEngine,
    callback: Box<dyn SessionCallback>,
    last_aid: AidKey,
}

impl Session {
    pub fn new(config: &EngineConfig) -> Self {
        let negotiator = TelnetNegotiator::new(config.screen_size.model_number())
            .with_lu_name(config.lu_name.clone())
            .with_tn3270e(config.tn3270e_enabled);
        let transfer = FileTransferEngine::with_block_sizes(config.text_block_size, config.binary_block_size);
        Self {
            display: Display3270::new(config.screen_size),
            negotiator,
            structured_fields: StructuredFieldEngine::new(transfer),
            callback: Box::new(NoopCallback),
            last_aid: AidKey::NoAid,
        }
    }

    pub fn set_callback(&mut self, callback: Box<dyn SessionCallback>) {
        self.callback = callback;
    }

    pub fn display(&self) -> &Display3270 {
        &self.display
    }

    pub fn negotiator(&self) -> &TelnetNegotiator {
        &self.negotiator
    }

    pub fn is_tn3270e_mode(&self) -> bool {
        self.negotiator.is_tn3270e_mode()
    }

    pub fn reply_mode(&self) -> ReplyMode {
        self.structured_fields.reply_mode()
    }

    pub fn transfer_state(&self) -> TransferState {
        self.structured_fields.transfer().state()
    }

    pub fn last_aid(&self) -> AidKey {
        self.last_aid
    }

    pub fn screen_text(&self) -> String {
        self.display.screen_text()
    }

    /// Feed bytes read from the transport
    ///
    /// Returns the bytes to write back: negotiation replies, TN3270E
    /// responses and inbound records, in the order they were produced.
    pub fn process_incoming(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for event in self.negotiator.process_incoming_data(data) {
            match event {
                TelnetEvent::Send(bytes) => out.extend_from_slice(&bytes),
                TelnetEvent::Record(record) => {
                    for reply in self.process_record(&record) {
                        let framed = self.negotiator.frame_record(&reply);
                        out.extend_from_slice(&framed);
                    }
                }
                TelnetEvent::Status(message) => self.callback.status_message(&message),
            }
        }
        out
    }

    /// Run one 3270 record; returns unframed inbound records
    fn process_record(&mut self, record: &[u8]) -> Vec<Vec<u8>> {
        match self.dispatch(record) {
            Ok(replies) => replies,
            Err(err @ ProtocolError::UnknownCommand { .. }) => {
                debug!("ignoring record: {err}");
                Vec::new()
            }
            Err(err) => {
                warn!("discarding rest of record: {err}");
                Vec::new()
            }
        }
    }

    fn dispatch(&mut self, record: &[u8]) -> ProtocolResult<Vec<Vec<u8>>> {
        let Some(&code) = record.first() else {
            return Ok(Vec::new());
        };
        let command = CommandCode::from_u8(code).ok_or(ProtocolError::UnknownCommand { code })?;
        debug!("command {command:?}, {} bytes", record.len());

        match command {
            CommandCode::Write => self.write(record, None).map(|_| Vec::new()),
            CommandCode::EraseWrite => self.write(record, Some(false)).map(|_| Vec::new()),
            CommandCode::EraseWriteAlternate => self.write(record, Some(true)).map(|_| Vec::new()),
            CommandCode::ReadBuffer => Ok(vec![self.responder().read_buffer(AidKey::NoAid)]),
            CommandCode::ReadModified => Ok(vec![self.responder().read_modified(AidKey::NoAid)]),
            CommandCode::ReadModifiedAll => Ok(vec![self.responder().read_modified_all(AidKey::NoAid)]),
            CommandCode::EraseAllUnprotected => {
                if let Some(pos) = self.display.erase_all_unprotected() {
                    self.display.set_cursor(pos);
                }
                self.set_keyboard_lock(false);
                self.callback.screen_changed();
                Ok(Vec::new())
            }
            CommandCode::WriteStructuredField => {
                let replies = self.structured_fields.process(&record[1..], &self.display);
                self.fire_transfer_events();
                Ok(replies)
            }
        }
    }

    fn responder(&self) -> ResponseBuilder<'_> {
        ResponseBuilder::new(&self.display, self.structured_fields.reply_mode())
    }

    /// Write, Erase/Write or Erase/Write Alternate
    ///
    /// The WCC takes effect even when the order stream turns out malformed,
    /// since the orders before the damage have already been applied.
    fn write(&mut self, record: &[u8], erase: Option<bool>) -> ProtocolResult<()> {
        let wcc = *record.get(1).ok_or(ProtocolError::IncompleteData {
            context: "write control character",
            needed: 2,
            available: record.len(),
        })?;

        if let Some(use_alternate) = erase {
            self.display.erase(use_alternate);
            self.callback.repaint_requested();
        }
        if wcc & WCC_RESET_MDT != 0 {
            self.display.reset_mdt();
        }

        let start = self.display.cursor();
        let result = apply_orders(&mut self.display, &record[2..], start).map(|_| ());

        if wcc & WCC_ALARM != 0 {
            self.display.set_alarm(true);
            self.callback.alarm();
        }
        if wcc & (WCC_RESET | WCC_RESTORE) != 0 {
            self.set_keyboard_lock(false);
        }
        self.callback.screen_changed();
        result
    }

    fn set_keyboard_lock(&mut self, locked: bool) {
        if self.display.is_keyboard_locked() == locked {
            return;
        }
        if locked {
            self.display.lock_keyboard();
        } else {
            self.display.unlock_keyboard();
        }
        self.callback.keyboard_lock_changed(locked);
    }

    fn fire_transfer_events(&mut self) {
        for event in self.structured_fields.transfer_mut().take_events() {
            match event {
                TransferEvent::Started { direction, path } => {
                    info!("transfer started: {direction:?} {}", path.display());
                    self.callback.transfer_started(direction, &path);
                }
                TransferEvent::Progress { bytes, blocks } => self.callback.transfer_progress(bytes, blocks),
                TransferEvent::Complete { message } => self.callback.transfer_complete(&message),
                TransferEvent::Error { message } => self.callback.transfer_error(&message),
            }
        }
    }

    /// Send an attention key to the host
    ///
    /// Returns the framed inbound record. The keyboard locks until the host
    /// restores it. Clear also erases the screen, returns to the primary size
    /// and resets the reply mode.
    pub fn send_aid(&mut self, aid: AidKey) -> Vec<u8> {
        debug!("sending AID {aid:?}");
        self.last_aid = aid;
        self.set_keyboard_lock(true);
        self.display.set_alarm(false);

        if aid == AidKey::Clear {
            self.display.erase(false);
            self.structured_fields.set_reply_mode(ReplyMode::Field);
            self.callback.repaint_requested();
        }

        let record = self.responder().read_modified(aid);
        self.negotiator.frame_record(&record)
    }

    /// Type one character at the cursor
    pub fn type_char(&mut self, ch: char) -> InputResult<()> {
        let pos = self.writable_cursor()?;
        if let Some(attr) = self.display.field_attribute_for(pos) {
            if attr.is_numeric() && !(ch.is_ascii_digit() || matches!(ch, '.' | '-' | ',')) {
                return Err(InputError::NumericOnly { ch });
            }
        }

        let attrs = self.display.cell(pos).attrs;
        self.display.write_char(pos, ch, attrs);
        self.display.set_modified(pos);

        let mut next = self.display.wrap(pos + 1);
        if self.display.is_field_start(next) {
            next = self.display.next_unprotected_position(next).unwrap_or(next);
        }
        self.display.set_cursor(next);
        self.callback.screen_changed();
        Ok(())
    }

    /// Type a string, stopping at the first character that is refused
    pub fn type_string(&mut self, text: &str) -> InputResult<()> {
        text.chars().try_for_each(|ch| self.type_char(ch))
    }

    /// Move to the first data position of the next unprotected field
    pub fn tab(&mut self) {
        let target = self
            .display
            .next_field_data_start(self.display.cursor())
            .unwrap_or(0);
        self.display.set_cursor(target);
    }

    /// Move to the start of this unprotected field, or the previous one
    pub fn back_tab(&mut self) {
        let target = self
            .display
            .previous_field_data_start(self.display.cursor())
            .unwrap_or(0);
        self.display.set_cursor(target);
    }

    /// Null from the cursor to the end of its field (or the buffer, unformatted)
    pub fn erase_eof(&mut self) -> InputResult<()> {
        let pos = self.writable_cursor()?;
        let len = self.display.buffer_size();
        let formatted = self.display.is_formatted();
        for offset in 0..len {
            let p = (pos + offset) % len;
            if self.display.is_field_start(p) || (!formatted && p < pos) {
                break;
            }
            self.display.write_char(p, '\0', ExtendedAttributes::default());
        }
        self.display.set_modified(pos);
        self.callback.screen_changed();
        Ok(())
    }

    /// Move left one position and erase the character there
    pub fn backspace(&mut self) -> InputResult<()> {
        if self.display.is_keyboard_locked() {
            return Err(InputError::KeyboardLocked);
        }
        let len = self.display.buffer_size();
        let prev = (self.display.cursor() + len - 1) % len;
        if !self.display.is_writable(prev) {
            return Err(InputError::ProtectedPosition { position: prev });
        }
        self.display.write_char(prev, '\0', ExtendedAttributes::default());
        self.display.set_modified(prev);
        self.display.set_cursor(prev);
        self.callback.screen_changed();
        Ok(())
    }

    pub fn set_cursor(&mut self, row: usize, col: usize) -> InputResult<()> {
        if self.display.set_cursor_coords(row, col) {
            Ok(())
        } else {
            Err(InputError::InvalidPosition { row, col })
        }
    }

    fn writable_cursor(&self) -> InputResult<usize> {
        if self.display.is_keyboard_locked() {
            return Err(InputError::KeyboardLocked);
        }
        let pos = self.display.cursor();
        if self.display.is_writable(pos) {
            Ok(pos)
        } else {
            Err(InputError::ProtectedPosition { position: pos })
        }
    }

    /// Register the local file for the next IND$FILE transfer
    pub fn prepare_transfer(&mut self, request: TransferRequest) {
        self.structured_fields.transfer_mut().prepare(request);
    }

    pub fn cancel_transfer(&mut self) {
        self.structured_fields.transfer_mut().cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib3270::addressing::encode_address;
    use crate::lib3270::display::ScreenSize;
    use std::sync::{Arc, Mutex};

    const IAC: u8 = 0xFF;
    const EOR: u8 = 0xEF;

    #[derive(Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl SessionCallback for Recorder {
        fn screen_changed(&mut self) {
            self.events.lock().unwrap().push("screen".into());
        }
        fn keyboard_lock_changed(&mut self, locked: bool) {
            self.events.lock().unwrap().push(format!("lock {locked}"));
        }
        fn alarm(&mut self) {
            self.events.lock().unwrap().push("alarm".into());
        }
    }

    fn session() -> Session {
        Session::new(&EngineConfig::default())
    }

    fn record(bytes: &[u8]) -> Vec<u8> {
        let mut out = bytes.to_vec();
        out.extend_from_slice(&[IAC, EOR]);
        out
    }

    /// Erase/Write: protected label at 0, unprotected input field at 10..30
    fn formatted_screen(s: &mut Session) {
        let mut data = vec![CMD_ERASE_WRITE, WCC_RESET, ORDER_SF, 0x60];
        data.extend_from_slice(&[0xD5, 0xC1, 0xD4, 0xC5]);
        data.push(ORDER_SBA);
        data.extend_from_slice(&encode_address(10));
        data.extend_from_slice(&[ORDER_SF, 0x40, ORDER_IC]);
        data.push(ORDER_SBA);
        data.extend_from_slice(&encode_address(30));
        data.extend_from_slice(&[ORDER_SF, 0x60]);
        s.process_incoming(&record(&data));
    }

    #[test]
    fn test_erase_write_unlocks_and_fires_callbacks() {
        let mut s = session();
        let recorder = Recorder::default();
        let events = recorder.events.clone();
        s.set_callback(Box::new(recorder));
        let out = s.process_incoming(&record(&[CMD_ERASE_WRITE, WCC_RESET | WCC_ALARM, 0xC8, 0xC9]));
        assert!(out.is_empty());
        assert!(!s.display().is_keyboard_locked());
        assert_eq!(s.display().get_row(0).unwrap().trim_end(), "HI");
        let events = events.lock().unwrap();
        assert_eq!(*events, vec!["alarm", "lock false", "screen"]);
    }

    #[test]
    fn test_type_and_send_enter() {
        let mut s = session();
        formatted_screen(&mut s);
        assert_eq!(s.display().cursor(), 11);
        s.type_string("AB").unwrap();
        let out = s.send_aid(AidKey::Enter);
        let mut expected = vec![AID_ENTER];
        expected.extend_from_slice(&encode_address(13));
        expected.push(ORDER_SBA);
        expected.extend_from_slice(&encode_address(11));
        expected.extend_from_slice(&[0xC1, 0xC2, IAC, EOR]);
        assert_eq!(out, expected);
        assert!(s.display().is_keyboard_locked());
    }

    #[test]
    fn test_typing_into_protected_field_refused() {
        let mut s = session();
        formatted_screen(&mut s);
        s.set_cursor(0, 2).unwrap();
        assert_eq!(s.type_char('X'), Err(InputError::ProtectedPosition { position: 2 }));
    }

    #[test]
    fn test_numeric_field() {
        let mut s = session();
        s.process_incoming(&record(&[CMD_ERASE_WRITE, WCC_RESET, ORDER_SF, 0x50, ORDER_IC]));
        assert_eq!(s.type_char('A'), Err(InputError::NumericOnly { ch: 'A' }));
        assert!(s.type_char('7').is_ok());
    }

    #[test]
    fn test_locked_keyboard_refuses_input() {
        let mut s = session();
        assert_eq!(s.type_char('A'), Err(InputError::KeyboardLocked));
    }

    #[test]
    fn test_tab_and_back_tab() {
        let mut s = session();
        formatted_screen(&mut s);
        s.set_cursor(0, 0).unwrap();
        s.tab();
        assert_eq!(s.display().cursor(), 11);
        s.tab();
        assert_eq!(s.display().cursor(), 11);
        s.set_cursor(0, 15).unwrap();
        s.back_tab();
        assert_eq!(s.display().cursor(), 11);
    }

    #[test]
    fn test_erase_eof_and_backspace() {
        let mut s = session();
        formatted_screen(&mut s);
        s.type_string("HELLO").unwrap();
        s.set_cursor(0, 13).unwrap();
        s.erase_eof().unwrap();
        assert_eq!(s.display().cell(12).ch, 'E');
        assert_eq!(s.display().cell(13).ch, '\0');
        assert_eq!(s.display().cell(15).ch, '\0');
        s.backspace().unwrap();
        assert_eq!(s.display().cursor(), 12);
        assert_eq!(s.display().cell(12).ch, '\0');
    }

    #[test]
    fn test_clear_resets_reply_mode_and_size() {
        let config = EngineConfig {
            screen_size: ScreenSize::Model4,
            ..EngineConfig::default()
        };
        let mut s = Session::new(&config);
        s.process_incoming(&record(&[CMD_WRITE_STRUCTURED_FIELD, 0x00, 0x05, SF_SET_REPLY_MODE, 0x00, 0x02]));
        assert_eq!(s.reply_mode(), ReplyMode::Character);
        s.process_incoming(&record(&[CMD_ERASE_WRITE_ALTERNATE, WCC_RESET]));
        assert_eq!(s.display().rows(), 43);

        let out = s.send_aid(AidKey::Clear);
        assert_eq!(out, vec![AID_CLEAR, 0x40, 0x40, IAC, EOR]);
        assert_eq!(s.reply_mode(), ReplyMode::Field);
        assert_eq!(s.display().rows(), 24);
    }

    #[test]
    fn test_read_buffer_command_replies() {
        let mut s = session();
        s.process_incoming(&record(&[CMD_ERASE_WRITE, WCC_RESET]));
        let out = s.process_incoming(&record(&[CMD_READ_BUFFER]));
        assert_eq!(out[0], AID_NO_AID);
        assert_eq!(out.len(), 3 + 1920 + 2);
    }

    #[test]
    fn test_erase_all_unprotected() {
        let mut s = session();
        formatted_screen(&mut s);
        s.type_string("XY").unwrap();
        s.send_aid(AidKey::Enter);
        s.process_incoming(&record(&[CMD_ERASE_ALL_UNPROTECTED]));
        assert_eq!(s.display().cell(11).ch, '\0');
        assert_eq!(s.display().cursor(), 11);
        assert!(!s.display().is_keyboard_locked());
        assert_eq!(s.display().cell(0).ch, ' ');
        assert_eq!(s.display().cell(1).ch, 'N');
    }

    #[test]
    fn test_unknown_command_ignored() {
        let mut s = session();
        assert!(s.process_incoming(&record(&[0x42, 0x00])).is_empty());
        assert!(s.process_incoming(&record(&[CMD_WRITE])).is_empty());
    }

    #[test]
    fn test_set_cursor_bounds() {
        let mut s = session();
        assert_eq!(s.set_cursor(24, 0), Err(InputError::InvalidPosition { row: 24, col: 0 }));
        assert!(s.set_cursor(23, 79).is_ok());
    }
}
