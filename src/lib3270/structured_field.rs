//! Write Structured Field dispatch
//!
//! A Write Structured Field command carries a sequence of structured fields,
//! each `[length:2][id][body]` with the length counting itself. This module
//! splits them and routes each to its handler: Read Partition (queries and
//! partition reads), Set Reply Mode and Data Chain (IND$FILE).

use log::{debug, warn};

use super::codes::*;
use super::display::Display3270;
use super::query_reply::{build_query_list_reply, build_query_reply, QueryGeometry};
use super::response::{ReplyMode, ResponseBuilder};
use super::transfer::FileTransferEngine;
use crate::error::{ProtocolError, ProtocolResult};

/// Offset of the mode byte in Set Reply Mode (after length, id, partition)
const SET_REPLY_MODE_OFFSET: usize = 4;

/// Split a structured field payload into whole structured fields
///
/// Fails on the first field whose length is undersized or runs past the end.
pub fn split_structured_fields(payload: &[u8]) -> ProtocolResult<Vec<&[u8]>> {
    match scan(payload) {
        (fields, None) => Ok(fields),
        (_, Some(err)) => Err(err),
    }
}

/// Well-formed fields up to the first damaged one, and the damage
fn scan(payload: &[u8]) -> (Vec<&[u8]>, Option<ProtocolError>) {
    let mut fields = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let remaining = payload.len() - pos;
        if remaining < 3 {
            let err = ProtocolError::IncompleteData {
                context: "structured field header",
                needed: 3,
                available: remaining,
            };
            return (fields, Some(err));
        }
        let length = u16::from_be_bytes([payload[pos], payload[pos + 1]]) as usize;
        let field_id = payload[pos + 2];
        if length < 3 || length > remaining {
            let err = ProtocolError::InvalidStructuredField {
                field_id,
                reason: format!("length {length} with {remaining} bytes remaining"),
            };
            return (fields, Some(err));
        }
        fields.push(&payload[pos..pos + length]);
        pos += length;
    }
    (fields, None)
}

/// Structured field handling and the state it owns
pub struct StructuredFieldEngine {
    reply_mode: ReplyMode,
    transfer: FileTransferEngine,
}

impl StructuredFieldEngine {
    pub fn new(transfer: FileTransferEngine) -> Self {
        Self {
            reply_mode: ReplyMode::Field,
            transfer,
        }
    }

    pub fn reply_mode(&self) -> ReplyMode {
        self.reply_mode
    }

    pub fn set_reply_mode(&mut self, mode: ReplyMode) {
        self.reply_mode = mode;
    }

    pub fn transfer(&self) -> &FileTransferEngine {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut FileTransferEngine {
        &mut self.transfer
    }

    /// Process the body of a Write Structured Field command
    ///
    /// Returns the inbound records to send, in order. Fields before a
    /// malformed one are still processed.
    pub fn process(&mut self, payload: &[u8], display: &Display3270) -> Vec<Vec<u8>> {
        let (fields, error) = scan(payload);

        let mut records = Vec::new();
        for sf in fields {
            if let Some(record) = self.dispatch(sf, display) {
                records.push(record);
            }
        }
        if let Some(err) = error {
            warn!("discarding rest of structured field payload: {err}");
        }
        records
    }

    fn dispatch(&mut self, sf: &[u8], display: &Display3270) -> Option<Vec<u8>> {
        let field_id = sf[2];
        debug!("structured field 0x{field_id:02X}, {} bytes", sf.len());
        match field_id {
            SF_READ_PARTITION => self.read_partition(sf, display),
            SF_SET_REPLY_MODE => {
                let mode = sf.get(SET_REPLY_MODE_OFFSET).copied().unwrap_or(0x00);
                self.reply_mode = ReplyMode::from_u8(mode);
                debug!("reply mode set to {:?}", self.reply_mode);
                None
            }
            SF_DATA_CHAIN => self.transfer.process(sf).map(|reply| {
                let mut record = Vec::with_capacity(reply.len() + 1);
                record.push(AID_STRUCTURED_FIELD);
                record.extend_from_slice(&reply);
                record
            }),
            other => {
                debug!("ignoring structured field 0x{other:02X}");
                None
            }
        }
    }

    fn read_partition(&mut self, sf: &[u8], display: &Display3270) -> Option<Vec<u8>> {
        let request = match sf.get(4) {
            Some(&request) => request,
            None => {
                warn!("read partition without a request type");
                return None;
            }
        };
        let geometry = QueryGeometry {
            primary: display.primary_size(),
            alternate: display.alternate_size(),
        };
        let builder = ResponseBuilder::new(display, self.reply_mode);
        match request {
            RP_QUERY => Some(build_query_reply(geometry)),
            RP_QUERY_LIST => {
                let request_type = sf.get(5).copied().unwrap_or(0x80);
                let codes = sf.get(6..).unwrap_or(&[]);
                Some(build_query_list_reply(request_type, codes, geometry))
            }
            RP_READ_BUFFER => Some(builder.read_buffer(AidKey::NoAid)),
            RP_READ_MODIFIED => Some(builder.read_modified(AidKey::NoAid)),
            RP_READ_MODIFIED_ALL => Some(builder.read_modified_all(AidKey::NoAid)),
            other => {
                debug!("ignoring read partition request 0x{other:02X}");
                None
            }
        }
    }
}

impl Default for StructuredFieldEngine {
    fn default() -> Self {
        Self::new(FileTransferEngine::new())
    }
}
