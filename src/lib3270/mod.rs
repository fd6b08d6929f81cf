//! IBM 3270 data stream (TN3270 / TN3270E)
//!
//! This module holds everything that operates on the 3270 data stream once
//! telnet framing has been removed: the screen model, outbound command and
//! order processing, inbound response construction, structured fields and
//! IND$FILE transfer.
//!
//! # Architecture
//!
//! - [`codes`] - command, order, WCC, AID and structured field code points
//! - [`ebcdic`] - code page 037 and APL character conversion
//! - [`addressing`] - 12/14-bit buffer address coding
//! - [`field`] - field and extended attributes
//! - [`display`] - the screen buffer, cursor and keyboard lock
//! - [`orders`] - order interpretation for Write-family commands
//! - [`response`] - Read Modified, Read Modified All and Read Buffer
//! - [`structured_field`] - Write Structured Field dispatch
//! - [`query_reply`] - Query Reply construction
//! - [`transfer`] - IND$FILE data chain handling
//! - [`ind_file`] - IND$FILE command construction
//!
//! # Example Usage
//!
//! ```rust
//! use tn3270r::lib3270::{apply_orders, Display3270, ScreenSize};
//!
//! let mut display = Display3270::new(ScreenSize::Model2);
//! display.erase(false);
//! // SBA to row 1 column 1, then "HI"
//! apply_orders(&mut display, &[0x11, 0xC1, 0xD1, 0xC8, 0xC9], 0).unwrap();
//! assert!(display.get_row(1).unwrap().starts_with(" HI"));
//! ```

pub mod addressing;
pub mod codes;
pub mod display;
pub mod ebcdic;
pub mod field;
pub mod ind_file;
pub mod orders;
pub mod query_reply;
pub mod response;
pub mod structured_field;
pub mod transfer;

pub use addressing::{decode_address, encode_address};
pub use codes::{AidKey, CommandCode, OrderCode};
pub use display::{Cell, Display3270, ScreenSize};
pub use ebcdic::Charset;
pub use field::{ExtendedAttributes, Field, FieldAttribute, Highlight};
pub use ind_file::{HostSystem, IndFileCommand, RecordFormat};
pub use orders::apply_orders;
pub use response::{ReplyMode, ResponseBuilder};
pub use structured_field::StructuredFieldEngine;
pub use transfer::{
    FileTransferEngine, TransferDirection, TransferEvent, TransferMode, TransferRequest, TransferState,
};
