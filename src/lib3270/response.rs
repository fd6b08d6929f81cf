//! Inbound data stream construction
//!
//! Builds the records a terminal sends to the host: Read Modified (the reply
//! to an AID key or a Read Modified command), Read Modified All and Read
//! Buffer. The host selects the framing with Set Reply Mode.

use super::addressing::encode_address;
use super::codes::*;
use super::display::{Cell, Display3270};
use super::ebcdic::display_to_ebcdic_in;
use super::ebcdic::Charset;
use super::field::{ExtendedAttributes, Field, FieldAttribute};

/// Inbound framing selected by Set Reply Mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    #[default]
    Field,
    ExtendedField,
    Character,
}

impl ReplyMode {
    /// Decode a Set Reply Mode value; unknown values mean Field
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::ExtendedField,
            0x02 => Self::Character,
            _ => Self::Field,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Field => 0x00,
            Self::ExtendedField => 0x01,
            Self::Character => 0x02,
        }
    }
}

/// Builds inbound records from the current screen
pub struct ResponseBuilder<'a> {
    display: &'a Display3270,
    mode: ReplyMode,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(display: &'a Display3270, mode: ReplyMode) -> Self {
        Self { display, mode }
    }

    /// AID and cursor address, the start of every inbound record
    fn header(&self, aid: AidKey) -> Vec<u8> {
        let mut out = vec![aid.to_u8()];
        out.extend_from_slice(&encode_address(self.display.cursor()));
        out
    }

    /// Read Modified: modified fields only, nothing after a short-read AID
    pub fn read_modified(&self, aid: AidKey) -> Vec<u8> {
        if aid.is_short_read() {
            return self.header(aid);
        }
        self.read_modified_all(aid)
    }

    /// Read Modified All: modified fields regardless of the AID
    pub fn read_modified_all(&self, aid: AidKey) -> Vec<u8> {
        let mut out = self.header(aid);
        let mut tracker = AttributeTracker::default();

        if !self.display.is_formatted() {
            let size = self.display.buffer_size();
            self.emit_run(&mut out, &mut tracker, 0..size, None);
            return out;
        }

        let size = self.display.buffer_size();
        for field in self.display.fields() {
            if !field.attribute.is_modified() {
                continue;
            }
            let positions: Vec<usize> = field.positions(size).collect();
            let first = positions.iter().position(|&p| self.display.cell(p).ch != '\0');
            let last = positions.iter().rposition(|&p| self.display.cell(p).ch != '\0');
            match (first, last) {
                (Some(first), Some(last)) => {
                    out.push(ORDER_SBA);
                    out.extend_from_slice(&encode_address(positions[first]));
                    self.emit_run(
                        &mut out,
                        &mut tracker,
                        positions[first..=last].iter().copied(),
                        Some(&field),
                    );
                }
                _ => {
                    out.push(ORDER_SBA);
                    out.extend_from_slice(&encode_address(field.data_start(size)));
                }
            }
        }
        out
    }

    /// Emit the cells at `positions`
    ///
    /// Unformatted screens skip nulls; inside a field every cell of the
    /// trimmed run is sent.
    fn emit_run<I>(&self, out: &mut Vec<u8>, tracker: &mut AttributeTracker, positions: I, field: Option<&Field>)
    where
        I: IntoIterator<Item = usize>,
    {
        let field_attrs = field.map(|f| f.extended).unwrap_or_default();
        let basic = field.map(|f| f.attribute).unwrap_or_default();
        for pos in positions {
            let cell = self.display.cell(pos);
            if field.is_none() && cell.ch == '\0' {
                continue;
            }
            let mut effective = field_attrs;
            effective.merge_non_default(&cell.attrs);
            if self.mode == ReplyMode::Character {
                tracker.emit_changes(out, basic, effective);
            }
            out.push(cell_byte(cell, effective.charset));
        }
    }

    /// Read Buffer: every cell, with field starts as SF or SFE
    pub fn read_buffer(&self, aid: AidKey) -> Vec<u8> {
        let mut out = self.header(aid);
        let mut tracker = AttributeTracker::default();
        let mut governing = self.display.fields().last().map(|f| f.attribute).unwrap_or_default();

        for cell in self.display.cells() {
            match cell.field_attr {
                Some(attr) => {
                    governing = attr;
                    tracker.field_started(attr);
                    if self.mode == ReplyMode::Field {
                        out.push(ORDER_SF);
                        out.push(attr.to_wire());
                    } else {
                        let pairs = cell.attrs.to_pairs();
                        out.push(ORDER_SFE);
                        out.push(pairs.len() as u8 + 1);
                        out.push(XA_3270);
                        out.push(attr.to_wire());
                        for (attr_type, value) in pairs {
                            out.push(attr_type);
                            out.push(value);
                        }
                    }
                }
                None => {
                    if self.mode == ReplyMode::Character {
                        tracker.emit_changes(&mut out, governing, cell.attrs);
                    } else if cell.attrs.charset == Charset::Apl {
                        out.push(ORDER_GE);
                    }
                    out.push(cell_byte(cell, cell.attrs.charset));
                }
            }
        }
        out
    }
}

fn cell_byte(cell: &Cell, charset: Charset) -> u8 {
    if cell.ch == '\0' {
        0x00
    } else {
        display_to_ebcdic_in(cell.ch, charset)
    }
}

/// Last attributes announced with SA in Character mode
///
/// The basic field attribute is compared without its MDT bit.
#[derive(Default)]
struct AttributeTracker {
    last: ExtendedAttributes,
    basic: u8,
}

impl AttributeTracker {
    /// A field start sent as SF or SFE already carries the basic attribute
    fn field_started(&mut self, attr: FieldAttribute) {
        self.basic = attr.base_attr & !ATTR_MDT;
    }

    fn emit_changes(&mut self, out: &mut Vec<u8>, field: FieldAttribute, attrs: ExtendedAttributes) {
        let basic = field.base_attr & !ATTR_MDT;
        if basic != self.basic {
            out.extend_from_slice(&[ORDER_SA, XA_3270, FieldAttribute::new(basic).to_wire()]);
            self.basic = basic;
        }
        if attrs.highlight != self.last.highlight {
            out.extend_from_slice(&[ORDER_SA, XA_HIGHLIGHTING, attrs.highlight.to_u8()]);
        }
        if attrs.color != self.last.color {
            out.extend_from_slice(&[ORDER_SA, XA_FOREGROUND, super::field::color_value(attrs.color)]);
        }
        if attrs.charset != self.last.charset {
            out.extend_from_slice(&[ORDER_SA, XA_CHARSET, super::field::charset_value(attrs.charset)]);
        }
        self.last = attrs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib3270::display::ScreenSize;
    use crate::lib3270::field::FieldAttribute;

    fn screen_with_field(text: &str, modified: bool) -> Display3270 {
        let mut d = Display3270::new(ScreenSize::Model2);
        d.erase(false);
        d.set_field_attribute(0, FieldAttribute::new(ATTR_PROTECTED), ExtendedAttributes::default());
        let attr = if modified { ATTR_MDT } else { 0x00 };
        d.set_field_attribute(10, FieldAttribute::new(attr), ExtendedAttributes::default());
        for (i, ch) in text.chars().enumerate() {
            d.write_char(11 + i, ch, ExtendedAttributes::default());
        }
        d.set_field_attribute(30, FieldAttribute::new(ATTR_PROTECTED), ExtendedAttributes::default());
        d.set_cursor(11 + text.len());
        d
    }

    #[test]
    fn test_reply_mode_decode() {
        assert_eq!(ReplyMode::from_u8(0x00), ReplyMode::Field);
        assert_eq!(ReplyMode::from_u8(0x01), ReplyMode::ExtendedField);
        assert_eq!(ReplyMode::from_u8(0x02), ReplyMode::Character);
        assert_eq!(ReplyMode::from_u8(0x07), ReplyMode::Field);
    }

    #[test]
    fn test_read_modified_field_mode() {
        let d = screen_with_field("AB", true);
        let out = ResponseBuilder::new(&d, ReplyMode::Field).read_modified(AidKey::Enter);
        let mut expected = vec![AID_ENTER];
        expected.extend_from_slice(&encode_address(13));
        expected.push(ORDER_SBA);
        expected.extend_from_slice(&encode_address(11));
        expected.extend_from_slice(&[0xC1, 0xC2]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_unmodified_fields_are_skipped() {
        let d = screen_with_field("AB", false);
        let out = ResponseBuilder::new(&d, ReplyMode::Field).read_modified(AidKey::Enter);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_short_read_sends_no_data() {
        let d = screen_with_field("AB", true);
        let out = ResponseBuilder::new(&d, ReplyMode::Field).read_modified(AidKey::PA(1));
        assert_eq!(out, vec![AID_PA1, encode_address(13)[0], encode_address(13)[1]]);
        let all = ResponseBuilder::new(&d, ReplyMode::Field).read_modified_all(AidKey::PA(1));
        assert!(all.len() > 3);
    }

    #[test]
    fn test_trailing_nulls_trimmed_spaces_kept() {
        let d = screen_with_field("A ", true);
        let out = ResponseBuilder::new(&d, ReplyMode::Field).read_modified(AidKey::Enter);
        assert_eq!(&out[out.len() - 2..], &[0xC1, 0x40]);
    }

    #[test]
    fn test_leading_nulls_move_start() {
        let mut d = screen_with_field("", true);
        d.write_char(13, 'Z', ExtendedAttributes::default());
        let out = ResponseBuilder::new(&d, ReplyMode::Field).read_modified(AidKey::Enter);
        let sba = [ORDER_SBA, encode_address(13)[0], encode_address(13)[1], 0xE9];
        assert_eq!(&out[3..], &sba);
    }

    #[test]
    fn test_character_mode_emits_set_attribute() {
        let mut d = screen_with_field("", true);
        let red = ExtendedAttributes { color: 2, ..Default::default() };
        d.write_char(11, 'A', red);
        d.write_char(12, 'B', ExtendedAttributes::default());
        let out = ResponseBuilder::new(&d, ReplyMode::Character).read_modified(AidKey::Enter);
        let tail = &out[6..];
        assert_eq!(
            tail,
            &[ORDER_SA, XA_FOREGROUND, COLOR_RED, 0xC1, ORDER_SA, XA_FOREGROUND, 0x00, 0xC2]
        );
    }

    #[test]
    fn test_character_mode_announces_basic_attribute() {
        let mut d = Display3270::new(ScreenSize::Model2);
        d.erase(false);
        d.set_field_attribute(0, FieldAttribute::new(ATTR_MDT), ExtendedAttributes::default());
        d.write_char(1, 'A', ExtendedAttributes::default());
        d.set_field_attribute(10, FieldAttribute::new(ATTR_NUMERIC | ATTR_MDT), ExtendedAttributes::default());
        d.write_char(11, '1', ExtendedAttributes::default());
        d.set_field_attribute(20, FieldAttribute::new(ATTR_MDT), ExtendedAttributes::default());
        d.write_char(21, 'B', ExtendedAttributes::default());
        d.set_field_attribute(30, FieldAttribute::new(ATTR_PROTECTED), ExtendedAttributes::default());

        let out = ResponseBuilder::new(&d, ReplyMode::Character).read_modified(AidKey::Enter);
        let numeric = FieldAttribute::new(ATTR_NUMERIC).to_wire();
        let unprotected = FieldAttribute::default().to_wire();
        let mut expected = vec![ORDER_SBA];
        expected.extend_from_slice(&encode_address(1));
        expected.push(0xC1);
        expected.push(ORDER_SBA);
        expected.extend_from_slice(&encode_address(11));
        expected.extend_from_slice(&[ORDER_SA, XA_3270, numeric, 0xF1]);
        expected.push(ORDER_SBA);
        expected.extend_from_slice(&encode_address(21));
        expected.extend_from_slice(&[ORDER_SA, XA_3270, unprotected, 0xC2]);
        assert_eq!(&out[3..], expected.as_slice());
    }

    #[test]
    fn test_unformatted_read_modified() {
        let mut d = Display3270::new(ScreenSize::Model2);
        d.erase(false);
        d.write_char(0, 'H', ExtendedAttributes::default());
        d.write_char(100, 'I', ExtendedAttributes::default());
        let out = ResponseBuilder::new(&d, ReplyMode::Field).read_modified(AidKey::Enter);
        assert_eq!(&out[3..], &[0xC8, 0xC9]);
    }

    #[test]
    fn test_read_buffer_field_and_extended() {
        let d = screen_with_field("AB", false);
        let out = ResponseBuilder::new(&d, ReplyMode::Field).read_buffer(AidKey::NoAid);
        assert_eq!(out[0], AID_NO_AID);
        assert_eq!(&out[3..5], &[ORDER_SF, 0x60]);
        assert_eq!(out.len(), 3 + 1920 + 3);

        let out = ResponseBuilder::new(&d, ReplyMode::ExtendedField).read_buffer(AidKey::NoAid);
        assert_eq!(&out[3..7], &[ORDER_SFE, 1, XA_3270, 0x60]);
    }
}
