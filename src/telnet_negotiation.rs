//! Telnet option negotiation and record framing for TN3270 / TN3270E
//!
//! The negotiator sits between the transport and the 3270 data stream. It
//! consumes arbitrarily chunked bytes, answers option negotiation, runs the
//! TN3270E DEVICE-TYPE / FUNCTIONS subnegotiation (RFC 2355) and hands back
//! whole records, one per `IAC EOR`, with IAC escaping and the TN3270E header
//! removed.

use std::collections::HashMap;

use log::{debug, info, trace, warn};

use crate::error::TelnetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelnetOption {
    Binary = 0,
    TerminalType = 24,
    EndOfRecord = 25,
    Tn3270e = 40,
}

impl TelnetOption {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TelnetOption::Binary),
            24 => Some(TelnetOption::TerminalType),
            25 => Some(TelnetOption::EndOfRecord),
            40 => Some(TelnetOption::Tn3270e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelnetCommand {
    SE = 240,
    EOR = 239,
    SB = 250,
    WILL = 251,
    WONT = 252,
    DO = 253,
    DONT = 254,
    IAC = 255,
}

impl TelnetCommand {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            240 => Some(TelnetCommand::SE),
            239 => Some(TelnetCommand::EOR),
            250 => Some(TelnetCommand::SB),
            251 => Some(TelnetCommand::WILL),
            252 => Some(TelnetCommand::WONT),
            253 => Some(TelnetCommand::DO),
            254 => Some(TelnetCommand::DONT),
            255 => Some(TelnetCommand::IAC),
            _ => None,
        }
    }
}

const IAC: u8 = TelnetCommand::IAC as u8;

/// Terminal-type subnegotiation verbs
const TTYPE_IS: u8 = 0x00;
const TTYPE_SEND: u8 = 0x01;

/// TN3270E subnegotiation verbs and element tags
pub const TN3270E_ASSOCIATE: u8 = 0x00;
pub const TN3270E_CONNECT: u8 = 0x01;
pub const TN3270E_DEVICE_TYPE: u8 = 0x02;
pub const TN3270E_FUNCTIONS: u8 = 0x03;
pub const TN3270E_IS: u8 = 0x04;
pub const TN3270E_REASON: u8 = 0x05;
pub const TN3270E_REJECT: u8 = 0x06;
pub const TN3270E_REQUEST: u8 = 0x07;
pub const TN3270E_SEND: u8 = 0x08;

/// TN3270E function codes
pub const FUNCTION_BIND_IMAGE: u8 = 0x00;
pub const FUNCTION_DATA_STREAM_CTL: u8 = 0x01;
pub const FUNCTION_RESPONSES: u8 = 0x02;
pub const FUNCTION_SCS_CTL_CODES: u8 = 0x03;
pub const FUNCTION_SYSREQ: u8 = 0x04;

/// Functions this terminal asks for, in request order
pub const SUPPORTED_FUNCTIONS: [u8; 4] = [
    FUNCTION_BIND_IMAGE,
    FUNCTION_DATA_STREAM_CTL,
    FUNCTION_RESPONSES,
    FUNCTION_SYSREQ,
];

/// TN3270E header data types
pub const DATA_TYPE_3270: u8 = 0x00;
pub const DATA_TYPE_RESPONSE: u8 = 0x02;

/// TN3270E header request flags
pub const REQUEST_NO_RESPONSE: u8 = 0x00;
pub const REQUEST_ERROR_RESPONSE: u8 = 0x01;
pub const REQUEST_ALWAYS_RESPONSE: u8 = 0x02;

/// Positive response body (DEVICE-END)
const RESPONSE_POSITIVE: u8 = 0x00;

pub const TN3270E_HEADER_LEN: usize = 5;

/// Byte parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Data,
    Iac,
    SubNeg,
    SubNegIac,
    Will,
    Wont,
    Do,
    Dont,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NegotiationState {
    /// Nothing said about this option yet
    Initial,
    /// Both sides agree the option is on
    Active,
    /// The option was refused or turned off
    Inactive,
}

/// Output of one call to [`TelnetNegotiator::process_incoming_data`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Bytes to write to the transport as-is
    Send(Vec<u8>),
    /// A complete 3270 record, framing removed
    Record(Vec<u8>),
    /// Informational message for the operator
    Status(String),
}

#[derive(Debug)]
pub struct TelnetNegotiator {
    state: ParserState,
    record: Vec<u8>,
    subneg: Vec<u8>,

    /// Options we perform (host said DO)
    local_states: HashMap<TelnetOption, NegotiationState>,
    /// Options the host performs (host said WILL)
    remote_states: HashMap<TelnetOption, NegotiationState>,

    model: u8,
    lu_name: Option<String>,
    tn3270e_enabled: bool,
    tn3270e_attempted: bool,
    tn3270e_failed: bool,
    tn3270e_mode: bool,
    functions: Vec<u8>,
    device_name: Option<String>,
    send_sequence: u16,

    events: Vec<TelnetEvent>,
}

impl TelnetNegotiator {
    /// Negotiator for an IBM 3278 of the given model (2-5)
    pub fn new(model: u8) -> Self {
        Self {
            state: ParserState::Data,
            record: Vec::new(),
            subneg: Vec::new(),
            local_states: HashMap::new(),
            remote_states: HashMap::new(),
            model,
            lu_name: None,
            tn3270e_enabled: true,
            tn3270e_attempted: false,
            tn3270e_failed: false,
            tn3270e_mode: false,
            functions: Vec::new(),
            device_name: None,
            send_sequence: 0,
            events: Vec::new(),
        }
    }

    /// LU name sent with the device type
    pub fn with_lu_name(mut self, lu_name: Option<String>) -> Self {
        self.lu_name = lu_name.filter(|name| !name.is_empty());
        self
    }

    /// Whether TN3270E may be negotiated at all
    pub fn with_tn3270e(mut self, enabled: bool) -> Self {
        self.tn3270e_enabled = enabled;
        self
    }

    pub fn is_tn3270e_mode(&self) -> bool {
        self.tn3270e_mode
    }

    pub fn tn3270e_attempted(&self) -> bool {
        self.tn3270e_attempted
    }

    pub fn tn3270e_failed(&self) -> bool {
        self.tn3270e_failed
    }

    /// Functions agreed with the host
    pub fn functions(&self) -> &[u8] {
        &self.functions
    }

    /// Device (LU) name the host assigned in DEVICE-TYPE IS
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn is_option_active(&self, option: TelnetOption) -> bool {
        matches!(self.local_states.get(&option), Some(NegotiationState::Active))
            || matches!(self.remote_states.get(&option), Some(NegotiationState::Active))
    }

    /// Terminal type announced to the host, e.g. `IBM-3278-2-E`
    pub fn terminal_type(&self) -> String {
        let mut name = format!("IBM-3278-{}", self.model);
        if self.tn3270e_attempted && !self.tn3270e_failed {
            name.push_str("-E");
        }
        name
    }

    /// Feed transport bytes through the negotiator
    ///
    /// Events come back in the order their triggers appeared in the stream.
    pub fn process_incoming_data(&mut self, data: &[u8]) -> Vec<TelnetEvent> {
        for &byte in data {
            self.process_byte(byte);
        }
        std::mem::take(&mut self.events)
    }

    fn process_byte(&mut self, byte: u8) {
        self.state = match self.state {
            ParserState::Data => {
                if byte == IAC {
                    ParserState::Iac
                } else {
                    self.record.push(byte);
                    ParserState::Data
                }
            }
            ParserState::Iac => match TelnetCommand::from_u8(byte) {
                Some(TelnetCommand::IAC) => {
                    self.record.push(IAC);
                    ParserState::Data
                }
                Some(TelnetCommand::SB) => {
                    self.subneg.clear();
                    ParserState::SubNeg
                }
                Some(TelnetCommand::WILL) => ParserState::Will,
                Some(TelnetCommand::WONT) => ParserState::Wont,
                Some(TelnetCommand::DO) => ParserState::Do,
                Some(TelnetCommand::DONT) => ParserState::Dont,
                Some(TelnetCommand::EOR) => {
                    let record = std::mem::take(&mut self.record);
                    self.handle_record(record);
                    ParserState::Data
                }
                _ => {
                    trace!("ignoring telnet command {byte}");
                    ParserState::Data
                }
            },
            ParserState::SubNeg => {
                if byte == IAC {
                    ParserState::SubNegIac
                } else {
                    self.subneg.push(byte);
                    ParserState::SubNeg
                }
            }
            ParserState::SubNegIac => match byte {
                IAC => {
                    self.subneg.push(IAC);
                    ParserState::SubNeg
                }
                b if b == TelnetCommand::SE as u8 => {
                    let payload = std::mem::take(&mut self.subneg);
                    self.handle_subnegotiation(&payload);
                    ParserState::Data
                }
                other => {
                    let data = std::mem::take(&mut self.subneg);
                    let err = TelnetError::MalformedSubnegotiation {
                        option: data.first().copied().unwrap_or(0),
                        data,
                    };
                    warn!("{err} (IAC {other} inside subnegotiation), discarding");
                    ParserState::Data
                }
            },
            ParserState::Will => {
                self.handle_will(byte);
                ParserState::Data
            }
            ParserState::Wont => {
                self.handle_wont(byte);
                ParserState::Data
            }
            ParserState::Do => {
                self.handle_do(byte);
                ParserState::Data
            }
            ParserState::Dont => {
                self.handle_dont(byte);
                ParserState::Data
            }
        };
    }

    fn handle_do(&mut self, option: u8) {
        debug!("received DO {option}");
        match TelnetOption::from_u8(option) {
            Some(TelnetOption::Tn3270e) => {
                if self.may_attempt_tn3270e() {
                    self.tn3270e_attempted = true;
                    self.local_states.insert(TelnetOption::Tn3270e, NegotiationState::Active);
                    info!("host offered TN3270E, accepting");
                    self.send_command(TelnetCommand::WILL, option);
                } else if self.local_states.get(&TelnetOption::Tn3270e) != Some(&NegotiationState::Active) {
                    self.send_command(TelnetCommand::WONT, option);
                }
            }
            Some(opt @ (TelnetOption::Binary | TelnetOption::EndOfRecord | TelnetOption::TerminalType)) => {
                if self.local_states.get(&opt) != Some(&NegotiationState::Active) {
                    self.local_states.insert(opt, NegotiationState::Active);
                    self.send_command(TelnetCommand::WILL, option);
                }
            }
            None => self.send_command(TelnetCommand::WONT, option),
        }
    }

    fn handle_will(&mut self, option: u8) {
        debug!("received WILL {option}");
        match TelnetOption::from_u8(option) {
            Some(TelnetOption::Tn3270e) => {
                if self.may_attempt_tn3270e() {
                    self.tn3270e_attempted = true;
                    self.remote_states.insert(TelnetOption::Tn3270e, NegotiationState::Active);
                    self.send_command(TelnetCommand::DO, option);
                } else if self.remote_states.get(&TelnetOption::Tn3270e) != Some(&NegotiationState::Active) {
                    self.send_command(TelnetCommand::DONT, option);
                }
            }
            Some(opt @ (TelnetOption::Binary | TelnetOption::EndOfRecord)) => {
                if self.remote_states.get(&opt) != Some(&NegotiationState::Active) {
                    self.remote_states.insert(opt, NegotiationState::Active);
                    self.send_command(TelnetCommand::DO, option);
                }
            }
            _ => self.send_command(TelnetCommand::DONT, option),
        }
    }

    fn handle_dont(&mut self, option: u8) {
        debug!("received DONT {option}");
        let Some(opt) = TelnetOption::from_u8(option) else {
            return;
        };
        let was_active = self.local_states.insert(opt, NegotiationState::Inactive) == Some(NegotiationState::Active);
        if opt == TelnetOption::Tn3270e {
            self.tn3270e_declined("host refused TN3270E");
        }
        if was_active {
            self.send_command(TelnetCommand::WONT, option);
        }
    }

    fn handle_wont(&mut self, option: u8) {
        debug!("received WONT {option}");
        let Some(opt) = TelnetOption::from_u8(option) else {
            return;
        };
        let was_active = self.remote_states.insert(opt, NegotiationState::Inactive) == Some(NegotiationState::Active);
        if opt == TelnetOption::Tn3270e {
            self.tn3270e_declined("host refused TN3270E");
        }
        if was_active {
            self.send_command(TelnetCommand::DONT, option);
        }
    }

    fn may_attempt_tn3270e(&self) -> bool {
        self.tn3270e_enabled && !self.tn3270e_attempted && !self.tn3270e_failed
    }

    /// Fall back to classic TN3270 for the rest of the connection
    fn tn3270e_declined(&mut self, reason: &str) {
        if self.tn3270e_failed {
            return;
        }
        self.tn3270e_failed = true;
        self.tn3270e_attempted = true;
        self.tn3270e_mode = false;
        self.functions.clear();
        self.local_states.insert(TelnetOption::Tn3270e, NegotiationState::Inactive);
        self.remote_states.insert(TelnetOption::Tn3270e, NegotiationState::Inactive);
        let err = TelnetError::OptionNegotiationFailed {
            option: TelnetOption::Tn3270e as u8,
            reason: reason.to_string(),
        };
        warn!("{err}, falling back to TN3270");
        self.events
            .push(TelnetEvent::Status(format!("{reason}; continuing in TN3270 mode")));
    }

    fn handle_subnegotiation(&mut self, payload: &[u8]) {
        let Some((&option, body)) = payload.split_first() else {
            warn!("empty subnegotiation");
            return;
        };
        match TelnetOption::from_u8(option) {
            Some(TelnetOption::TerminalType) => {
                if body.first() == Some(&TTYPE_SEND) {
                    self.send_terminal_type();
                }
            }
            Some(TelnetOption::Tn3270e) => self.handle_tn3270e(body),
            _ => debug!("ignoring subnegotiation for option {option}"),
        }
    }

    fn send_terminal_type(&mut self) {
        let terminal_type = self.terminal_type();
        debug!("sending terminal type {terminal_type}");
        let mut body = vec![TTYPE_IS];
        body.extend_from_slice(terminal_type.as_bytes());
        self.send_subnegotiation(TelnetOption::TerminalType, &body);
    }

    fn handle_tn3270e(&mut self, body: &[u8]) {
        if self.tn3270e_failed {
            debug!("ignoring TN3270E subnegotiation after fallback");
            return;
        }
        match body {
            [TN3270E_SEND, TN3270E_DEVICE_TYPE, ..] => {
                let mut reply = vec![TN3270E_DEVICE_TYPE, TN3270E_IS];
                reply.extend_from_slice(self.terminal_type().as_bytes());
                if let Some(lu) = &self.lu_name {
                    reply.push(TN3270E_CONNECT);
                    reply.extend_from_slice(lu.as_bytes());
                }
                self.send_subnegotiation(TelnetOption::Tn3270e, &reply);
            }
            [TN3270E_DEVICE_TYPE, TN3270E_IS, rest @ ..] => {
                let (device_type, device_name) = match rest.iter().position(|&b| b == TN3270E_CONNECT) {
                    Some(split) => (&rest[..split], Some(&rest[split + 1..])),
                    None => (rest, None),
                };
                self.device_name = device_name.map(|name| String::from_utf8_lossy(name).into_owned());
                info!(
                    "host confirmed device type {} (device {})",
                    String::from_utf8_lossy(device_type),
                    self.device_name.as_deref().unwrap_or("unassigned")
                );
                let mut request = vec![TN3270E_FUNCTIONS, TN3270E_REQUEST];
                request.extend_from_slice(&SUPPORTED_FUNCTIONS);
                self.send_subnegotiation(TelnetOption::Tn3270e, &request);
            }
            [TN3270E_DEVICE_TYPE, TN3270E_REJECT, rest @ ..] => {
                let reason = match rest {
                    [TN3270E_REASON, code, ..] => format!("device type rejected (reason {code})"),
                    _ => "device type rejected".to_string(),
                };
                self.tn3270e_declined(&reason);
                self.send_command(TelnetCommand::WONT, TelnetOption::Tn3270e as u8);
            }
            [TN3270E_FUNCTIONS, TN3270E_REQUEST, requested @ ..] => {
                let accepted = accept_functions(requested);
                let mut reply = vec![TN3270E_FUNCTIONS, TN3270E_IS];
                reply.extend_from_slice(&accepted);
                self.send_subnegotiation(TelnetOption::Tn3270e, &reply);
                self.complete_tn3270e(accepted);
            }
            [TN3270E_FUNCTIONS, TN3270E_IS, granted @ ..] => {
                self.complete_tn3270e(accept_functions(granted));
            }
            _ => debug!("ignoring TN3270E subnegotiation {body:02X?}"),
        }
    }

    fn complete_tn3270e(&mut self, functions: Vec<u8>) {
        info!("TN3270E negotiated with functions {functions:02X?}");
        self.functions = functions;
        if !self.tn3270e_mode {
            self.tn3270e_mode = true;
            self.events.push(TelnetEvent::Status("TN3270E session established".to_string()));
        }
    }

    /// Unwrap an inbound record and queue it for the 3270 dispatcher
    fn handle_record(&mut self, record: Vec<u8>) {
        if !self.tn3270e_mode {
            trace!("record of {} bytes", record.len());
            self.events.push(TelnetEvent::Record(record));
            return;
        }
        if record.len() < TN3270E_HEADER_LEN {
            warn!("TN3270E record shorter than its header ({} bytes), dropped", record.len());
            return;
        }
        let (header, data) = record.split_at(TN3270E_HEADER_LEN);
        let data_type = header[0];
        let request_flag = header[1];
        if data_type != DATA_TYPE_3270 {
            debug!("dropping TN3270E record with data type 0x{data_type:02X}");
            return;
        }
        self.events.push(TelnetEvent::Record(data.to_vec()));
        if request_flag == REQUEST_ALWAYS_RESPONSE {
            let response = [
                DATA_TYPE_RESPONSE,
                REQUEST_NO_RESPONSE,
                0x00,
                header[3],
                header[4],
                RESPONSE_POSITIVE,
            ];
            self.events.push(TelnetEvent::Send(escape_and_terminate(&response)));
        }
    }

    /// Frame an outbound 3270 record for the transport
    ///
    /// Adds the TN3270E header when that mode is active, doubles IAC bytes and
    /// appends `IAC EOR`.
    pub fn frame_record(&mut self, data: &[u8]) -> Vec<u8> {
        if !self.tn3270e_mode {
            return escape_and_terminate(data);
        }
        let seq = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        let mut record = Vec::with_capacity(data.len() + TN3270E_HEADER_LEN);
        record.extend_from_slice(&[DATA_TYPE_3270, REQUEST_NO_RESPONSE, 0x00]);
        record.extend_from_slice(&seq.to_be_bytes());
        record.extend_from_slice(data);
        escape_and_terminate(&record)
    }

    fn send_command(&mut self, command: TelnetCommand, option: u8) {
        trace!("sending {command:?} {option}");
        self.events.push(TelnetEvent::Send(vec![IAC, command as u8, option]));
    }

    fn send_subnegotiation(&mut self, option: TelnetOption, body: &[u8]) {
        let mut out = vec![IAC, TelnetCommand::SB as u8, option as u8];
        for &b in body {
            out.push(b);
            if b == IAC {
                out.push(IAC);
            }
        }
        out.extend_from_slice(&[IAC, TelnetCommand::SE as u8]);
        self.events.push(TelnetEvent::Send(out));
    }
}

/// The supported subset of `offered`, in our order
fn accept_functions(offered: &[u8]) -> Vec<u8> {
    SUPPORTED_FUNCTIONS
        .iter()
        .copied()
        .filter(|f| offered.contains(f))
        .collect()
}

/// Double every IAC and append `IAC EOR`
pub fn escape_and_terminate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out.extend_from_slice(&[IAC, TelnetCommand::EOR as u8]);
    out
}
