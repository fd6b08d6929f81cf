//! Error types for TN3270R
//!
//! One enum per area of the engine, gathered under [`TN3270Error`]. Protocol
//! errors never leave the session: a malformed record is logged and the rest
//! of it discarded. Transfer errors carry the IND$FILE negative
//! acknowledgement code sent back to the host.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::lib3270::codes::{
    DC_ERR_CLOSE, DC_ERR_EOF, DC_ERR_FILE_NOT_FOUND, DC_ERR_MISSING_DATA, DC_ERR_OPEN,
    DC_ERR_UNSUPPORTED_TYPE, DC_ERR_WRITE,
};

/// Top-level error type for TN3270R operations
#[derive(Debug)]
pub enum TN3270Error {
    /// Network connection errors
    Network(NetworkError),
    /// Telnet protocol negotiation errors
    Telnet(TelnetError),
    /// 3270 data stream errors
    Protocol(ProtocolError),
    /// IND$FILE transfer errors
    Transfer(TransferError),
    /// Configuration errors
    Config(ConfigError),
    /// Operator input rejected by the keyboard model
    Input(InputError),
}

/// Network connection related errors
#[derive(Debug)]
pub enum NetworkError {
    /// Connection refused by remote host
    ConnectionRefused { host: String, port: u16 },
    /// Connection timeout
    Timeout { host: String, port: u16, timeout_seconds: u64 },
    /// DNS resolution failure
    DnsResolution { host: String },
    /// Connection lost during operation
    ConnectionLost { reason: String },
    /// Operation attempted without a connection
    NotConnected,
}

/// Telnet protocol negotiation errors
#[derive(Debug)]
pub enum TelnetError {
    /// Malformed subnegotiation data
    MalformedSubnegotiation { option: u8, data: Vec<u8> },
    /// Option negotiation failed
    OptionNegotiationFailed { option: u8, reason: String },
}

/// 3270 data stream errors
#[derive(Debug)]
pub enum ProtocolError {
    /// Record starts with a byte that is not a 3270 command
    UnknownCommand { code: u8 },
    /// Record ended in the middle of an order or field
    IncompleteData { context: &'static str, needed: usize, available: usize },
    /// Structured field with a bad length or body
    InvalidStructuredField { field_id: u8, reason: String },
}

/// IND$FILE transfer errors
#[derive(Debug)]
pub enum TransferError {
    /// Local file does not exist
    FileNotFound { path: String },
    /// Local file could not be opened
    OpenFailed { path: String, reason: String },
    /// Upload stream exhausted; the normal end of a GET sequence
    EndOfFile,
    /// Writing downloaded data failed
    WriteFailed { reason: String },
    /// Host asked for something the engine does not do
    Unsupported { reason: String },
    /// Data-chain request arrived with no data element
    MissingData,
    /// Closing the local file failed
    CloseFailed { reason: String },
}

impl TransferError {
    /// Negative acknowledgement code sent to the host for this error
    pub fn code(&self) -> u16 {
        match self {
            TransferError::FileNotFound { .. } => DC_ERR_FILE_NOT_FOUND,
            TransferError::OpenFailed { .. } => DC_ERR_OPEN,
            TransferError::EndOfFile => DC_ERR_EOF,
            TransferError::WriteFailed { .. } => DC_ERR_WRITE,
            TransferError::Unsupported { .. } => DC_ERR_UNSUPPORTED_TYPE,
            TransferError::MissingData => DC_ERR_MISSING_DATA,
            TransferError::CloseFailed { .. } => DC_ERR_CLOSE,
        }
    }

    /// Classify a failure to open `path`
    pub fn from_open(path: &str, err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            TransferError::FileNotFound { path: path.to_string() }
        } else {
            TransferError::OpenFailed {
                path: path.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid configuration parameter
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Missing required configuration
    MissingRequired { parameter: String },
    /// Configuration file error
    FileError { path: String, error: String },
}

/// Operator input errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Keyboard is locked waiting for the host
    KeyboardLocked,
    /// Cursor is on a protected position or a field attribute
    ProtectedPosition { position: usize },
    /// Character not allowed in a numeric field
    NumericOnly { ch: char },
    /// Row/column outside the screen
    InvalidPosition { row: usize, col: usize },
}

impl fmt::Display for TN3270Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TN3270Error::Network(err) => write!(f, "Network error: {err}"),
            TN3270Error::Telnet(err) => write!(f, "Telnet error: {err}"),
            TN3270Error::Protocol(err) => write!(f, "Protocol error: {err}"),
            TN3270Error::Transfer(err) => write!(f, "Transfer error: {err}"),
            TN3270Error::Config(err) => write!(f, "Configuration error: {err}"),
            TN3270Error::Input(err) => write!(f, "Input error: {err}"),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionRefused { host, port } =>
                write!(f, "Connection refused to {host}:{port}"),
            NetworkError::Timeout { host, port, timeout_seconds } =>
                write!(f, "Connection timeout to {host}:{port} after {timeout_seconds}s"),
            NetworkError::DnsResolution { host } =>
                write!(f, "DNS resolution failed for {host}"),
            NetworkError::ConnectionLost { reason } =>
                write!(f, "Connection lost: {reason}"),
            NetworkError::NotConnected =>
                write!(f, "Not connected"),
        }
    }
}

impl fmt::Display for TelnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetError::MalformedSubnegotiation { option, data } =>
                write!(f, "Malformed subnegotiation for option {option}: {data:02X?}"),
            TelnetError::OptionNegotiationFailed { option, reason } =>
                write!(f, "Option {option} negotiation failed: {reason}"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownCommand { code } =>
                write!(f, "Unknown 3270 command code: 0x{code:02X}"),
            ProtocolError::IncompleteData { context, needed, available } =>
                write!(f, "Incomplete {context}: needed {needed} bytes, {available} available"),
            ProtocolError::InvalidStructuredField { field_id, reason } =>
                write!(f, "Invalid structured field 0x{field_id:02X}: {reason}"),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::FileNotFound { path } =>
                write!(f, "File not found: {path}"),
            TransferError::OpenFailed { path, reason } =>
                write!(f, "Cannot open '{path}': {reason}"),
            TransferError::EndOfFile =>
                write!(f, "End of file"),
            TransferError::WriteFailed { reason } =>
                write!(f, "Write failed: {reason}"),
            TransferError::Unsupported { reason } =>
                write!(f, "Unsupported request: {reason}"),
            TransferError::MissingData =>
                write!(f, "Missing data element"),
            TransferError::CloseFailed { reason } =>
                write!(f, "Close failed: {reason}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidParameter { parameter, value, reason } =>
                write!(f, "Invalid configuration parameter '{parameter}' = '{value}': {reason}"),
            ConfigError::MissingRequired { parameter } =>
                write!(f, "Missing required configuration parameter: {parameter}"),
            ConfigError::FileError { path, error } =>
                write!(f, "Configuration file error '{path}': {error}"),
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::KeyboardLocked =>
                write!(f, "Keyboard locked"),
            InputError::ProtectedPosition { position } =>
                write!(f, "Position {position} is protected"),
            InputError::NumericOnly { ch } =>
                write!(f, "'{ch}' not allowed in a numeric field"),
            InputError::InvalidPosition { row, col } =>
                write!(f, "Position ({row}, {col}) is outside the screen"),
        }
    }
}

impl StdError for TN3270Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TN3270Error::Network(err) => Some(err),
            TN3270Error::Telnet(err) => Some(err),
            TN3270Error::Protocol(err) => Some(err),
            TN3270Error::Transfer(err) => Some(err),
            TN3270Error::Config(err) => Some(err),
            TN3270Error::Input(err) => Some(err),
        }
    }
}

impl StdError for NetworkError {}
impl StdError for TelnetError {}
impl StdError for ProtocolError {}
impl StdError for TransferError {}
impl StdError for ConfigError {}
impl StdError for InputError {}

impl From<NetworkError> for TN3270Error {
    fn from(err: NetworkError) -> Self {
        TN3270Error::Network(err)
    }
}

impl From<TelnetError> for TN3270Error {
    fn from(err: TelnetError) -> Self {
        TN3270Error::Telnet(err)
    }
}

impl From<ProtocolError> for TN3270Error {
    fn from(err: ProtocolError) -> Self {
        TN3270Error::Protocol(err)
    }
}

impl From<TransferError> for TN3270Error {
    fn from(err: TransferError) -> Self {
        TN3270Error::Transfer(err)
    }
}

impl From<ConfigError> for TN3270Error {
    fn from(err: ConfigError) -> Self {
        TN3270Error::Config(err)
    }
}

impl From<InputError> for TN3270Error {
    fn from(err: InputError) -> Self {
        TN3270Error::Input(err)
    }
}

// Socket errors surface as network errors
impl From<io::Error> for TN3270Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => TN3270Error::Network(NetworkError::ConnectionRefused {
                host: "unknown".to_string(),
                port: 0,
            }),
            io::ErrorKind::TimedOut => TN3270Error::Network(NetworkError::Timeout {
                host: "unknown".to_string(),
                port: 0,
                timeout_seconds: 0,
            }),
            _ => TN3270Error::Network(NetworkError::ConnectionLost {
                reason: err.to_string(),
            }),
        }
    }
}

/// Result type alias for TN3270R operations
pub type TN3270Result<T> = Result<T, TN3270Error>;

pub type NetworkResult<T> = Result<T, NetworkError>;
pub type TelnetResult<T> = Result<T, TelnetError>;
pub type ProtocolResult<T> = Result<T, ProtocolError>;
pub type TransferResult<T> = Result<T, TransferError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type InputResult<T> = Result<T, InputError>;
