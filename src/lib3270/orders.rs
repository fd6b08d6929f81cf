//! 3270 order interpreter
//!
//! Applies the order stream following a Write-family WCC to the display
//! buffer in one linear pass. The buffer position and the pen (color,
//! highlighting and character set applied to written characters) live only
//! for the duration of one Write.

use log::trace;

use super::addressing::decode_address;
use super::codes::*;
use super::display::Display3270;
use super::ebcdic::{ebcdic_to_display, Charset};
use super::field::{ExtendedAttributes, FieldAttribute};
use crate::error::{ProtocolError, ProtocolResult};

/// Apply `data` to `display`, starting at buffer position `start`
///
/// Returns the buffer position after the last order. On a malformed order the
/// changes made so far are kept and the error is returned; the caller drops
/// the rest of the record.
pub fn apply_orders(display: &mut Display3270, data: &[u8], start: usize) -> ProtocolResult<usize> {
    let mut processor = OrderProcessor::new(data, display.wrap(start));
    processor.run(display)?;
    Ok(processor.address)
}

/// Order stream cursor
pub struct OrderProcessor<'a> {
    data: &'a [u8],
    pos: usize,
    /// Current buffer position
    address: usize,
    pen: ExtendedAttributes,
}

impl<'a> OrderProcessor<'a> {
    pub fn new(data: &'a [u8], start: usize) -> Self {
        Self {
            data,
            pos: 0,
            address: start,
            pen: ExtendedAttributes::default(),
        }
    }

    /// Current buffer position
    pub fn address(&self) -> usize {
        self.address
    }

    /// Current pen
    pub fn pen(&self) -> ExtendedAttributes {
        self.pen
    }

    /// Process every order and character in the stream
    pub fn run(&mut self, display: &mut Display3270) -> ProtocolResult<()> {
        while self.pos < self.data.len() {
            let byte = self.data[self.pos];
            self.pos += 1;
            match OrderCode::from_u8(byte) {
                Some(order) => self.process_order(order, display)?,
                None => {
                    let ch = ebcdic_to_display(byte, self.pen.charset);
                    self.put(display, ch, self.pen);
                }
            }
        }
        Ok(())
    }

    fn process_order(&mut self, order: OrderCode, display: &mut Display3270) -> ProtocolResult<()> {
        trace!("order {:?} at buffer position {}", order, self.address);
        match order {
            OrderCode::StartField => self.start_field(display),
            OrderCode::StartFieldExtended => self.start_field_extended(display),
            OrderCode::SetBufferAddress => self.set_buffer_address(display),
            OrderCode::SetAttribute => self.set_attribute(),
            OrderCode::ModifyField => self.modify_field(display),
            OrderCode::InsertCursor => {
                display.set_cursor(self.address);
                Ok(())
            }
            OrderCode::ProgramTab => {
                if let Some(next) = display.next_unprotected_position(self.address) {
                    self.address = next;
                }
                Ok(())
            }
            OrderCode::RepeatToAddress => self.repeat_to_address(display),
            OrderCode::EraseUnprotectedToAddress => self.erase_unprotected_to_address(display),
            OrderCode::GraphicEscape => {
                let byte = self.take(1, "graphic escape")?[0];
                let ch = ebcdic_to_display(byte, Charset::Apl);
                self.put(display, ch, ExtendedAttributes { charset: Charset::Apl, ..self.pen });
                Ok(())
            }
            OrderCode::FieldMark => {
                self.put(display, ';', self.pen);
                Ok(())
            }
        }
    }

    /// SF: one attribute byte
    fn start_field(&mut self, display: &mut Display3270) -> ProtocolResult<()> {
        let attr = self.take(1, "start field")?[0];
        display.set_field_attribute(
            self.address,
            FieldAttribute::new(attr & 0x3F),
            ExtendedAttributes::default(),
        );
        self.pen = ExtendedAttributes::default();
        self.advance(display);
        Ok(())
    }

    /// SFE: count, then (type, value) pairs
    fn start_field_extended(&mut self, display: &mut Display3270) -> ProtocolResult<()> {
        let count = self.take(1, "start field extended")?[0] as usize;
        let pairs = self.take(count * 2, "start field extended pairs")?;

        let mut base_attr = 0u8;
        let mut extended = ExtendedAttributes::default();
        for pair in pairs.chunks_exact(2) {
            if pair[0] == XA_3270 {
                base_attr = pair[1] & 0x3F;
            } else if !extended.apply(pair[0], pair[1]) {
                trace!("SFE: ignoring attribute type 0x{:02X}", pair[0]);
            }
        }

        display.set_field_attribute(self.address, FieldAttribute::new(base_attr), extended);
        self.pen.merge_non_default(&extended);
        self.advance(display);
        Ok(())
    }

    fn set_buffer_address(&mut self, display: &Display3270) -> ProtocolResult<()> {
        self.address = self.read_address(display, "set buffer address")?;
        Ok(())
    }

    /// SA: (type, value); type 0x00 resets the pen
    fn set_attribute(&mut self) -> ProtocolResult<()> {
        let pair = self.take(2, "set attribute")?;
        if !self.pen.apply(pair[0], pair[1]) {
            trace!("SA: ignoring attribute type 0x{:02X}", pair[0]);
        }
        Ok(())
    }

    /// MF: rewrite the attributes of the field starting at the current position
    fn modify_field(&mut self, display: &mut Display3270) -> ProtocolResult<()> {
        let count = self.take(1, "modify field")?[0] as usize;
        let pairs = self.take(count * 2, "modify field pairs")?;

        if !display.is_field_start(self.address) {
            trace!("MF: position {} is not a field start", self.address);
            return Ok(());
        }

        let cell = display.cell_mut(self.address);
        for pair in pairs.chunks_exact(2) {
            if pair[0] == XA_3270 {
                cell.field_attr = Some(FieldAttribute::new(pair[1] & 0x3F));
            } else {
                cell.attrs.apply(pair[0], pair[1]);
            }
        }
        self.advance(display);
        Ok(())
    }

    /// RA: target address, then the character to repeat (possibly GE-prefixed)
    fn repeat_to_address(&mut self, display: &mut Display3270) -> ProtocolResult<()> {
        let target = self.read_address(display, "repeat to address")?;
        let mut byte = self.take(1, "repeat to address character")?[0];
        let mut attrs = self.pen;
        if byte == ORDER_GE {
            byte = self.take(1, "repeat to address graphic escape")?[0];
            attrs.charset = Charset::Apl;
        }
        let ch = ebcdic_to_display(byte, attrs.charset);

        while self.address != target {
            self.put(display, ch, attrs);
        }
        Ok(())
    }

    /// EUA: null unprotected cells up to the target; position is unchanged
    fn erase_unprotected_to_address(&mut self, display: &mut Display3270) -> ProtocolResult<()> {
        let target = self.read_address(display, "erase unprotected to address")?;
        let governing = display.governing_attributes();
        let mut pos = self.address;
        while pos != target {
            let protected = governing[pos].map(|a| a.is_protected()).unwrap_or(false);
            if !display.is_field_start(pos) && !protected {
                display.write_char(pos, '\0', ExtendedAttributes::default());
            }
            pos = display.wrap(pos + 1);
        }
        Ok(())
    }

    fn put(&mut self, display: &mut Display3270, ch: char, attrs: ExtendedAttributes) {
        display.write_char(self.address, ch, attrs);
        self.advance(display);
    }

    fn advance(&mut self, display: &Display3270) {
        self.address = display.wrap(self.address + 1);
    }

    fn read_address(&mut self, display: &Display3270, context: &'static str) -> ProtocolResult<usize> {
        let bytes = self.take(2, context)?;
        Ok(decode_address(bytes[0], bytes[1], display.buffer_size()))
    }

    fn take(&mut self, n: usize, context: &'static str) -> ProtocolResult<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if available < n {
            return Err(ProtocolError::IncompleteData { context, needed: n, available });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}
