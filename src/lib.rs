//! TN3270R: a TN3270/TN3270E terminal data-stream engine
//!
//! The engine turns a raw byte stream from a telnet transport into a 3270
//! screen and turns operator input back into framed 3270 records, including
//! IND$FILE file transfer over structured fields.

/// LIB3270: IBM 3270 data stream, screen model and IND$FILE
pub mod lib3270;

pub mod callbacks;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod telnet_negotiation;

pub use callbacks::SessionCallback;
pub use config::EngineConfig;
pub use error::{TN3270Error, TN3270Result};
pub use session::Session;
