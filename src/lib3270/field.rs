//! Field attribute and character attribute logic for 3270
//!
//! A 3270 field is introduced by a single attribute cell (written by the SF or
//! SFE order) and extends up to the next attribute cell, wrapping around the
//! end of the buffer. The attribute byte carries protection, numeric,
//! display intensity and the Modified Data Tag. Extended attributes
//! (color, highlighting, character set) can be attached to the attribute cell
//! by SFE, or to individual characters by SA.

use super::codes::*;
use super::ebcdic::Charset;

/// Basic field attribute byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldAttribute {
    pub base_attr: u8,
}

impl FieldAttribute {
    pub fn new(base_attr: u8) -> Self {
        Self { base_attr }
    }

    /// Check if field is protected
    pub fn is_protected(&self) -> bool {
        (self.base_attr & ATTR_PROTECTED) != 0
    }

    /// Check if field is numeric
    pub fn is_numeric(&self) -> bool {
        (self.base_attr & ATTR_NUMERIC) != 0
    }

    /// Protected and numeric together mark an autoskip field
    pub fn is_autoskip(&self) -> bool {
        self.is_protected() && self.is_numeric()
    }

    /// Check if field is hidden (non-display)
    pub fn is_hidden(&self) -> bool {
        (self.base_attr & ATTR_DISPLAY) == DISPLAY_HIDDEN
    }

    /// Check if field is intensified
    pub fn is_intensified(&self) -> bool {
        (self.base_attr & ATTR_DISPLAY) == DISPLAY_INTENSIFIED
    }

    /// Check if Modified Data Tag (MDT) is set
    pub fn is_modified(&self) -> bool {
        (self.base_attr & ATTR_MDT) != 0
    }

    /// Set the Modified Data Tag (MDT)
    pub fn set_modified(&mut self, modified: bool) {
        if modified {
            self.base_attr |= ATTR_MDT;
        } else {
            self.base_attr &= !ATTR_MDT;
        }
    }

    /// Attribute byte as sent on the wire
    ///
    /// Only the low six bits are significant; the top two bits are filled so
    /// the byte is a printable EBCDIC graphic, the same trick buffer addresses use.
    pub fn to_wire(&self) -> u8 {
        super::addressing::ADDRESS_CODE_TABLE[(self.base_attr & 0x3F) as usize]
    }
}

/// Highlighting applied to a character or field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Highlight {
    #[default]
    Normal,
    Blink,
    Reverse,
    Underscore,
}

impl Highlight {
    /// Decode an extended highlighting value; unknown values mean default
    pub fn from_u8(value: u8) -> Self {
        match value {
            HIGHLIGHT_BLINK => Self::Blink,
            HIGHLIGHT_REVERSE => Self::Reverse,
            HIGHLIGHT_UNDERSCORE => Self::Underscore,
            _ => Self::Normal,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Normal => HIGHLIGHT_DEFAULT,
            Self::Blink => HIGHLIGHT_BLINK,
            Self::Reverse => HIGHLIGHT_REVERSE,
            Self::Underscore => HIGHLIGHT_UNDERSCORE,
        }
    }
}

/// Normalize a color attribute value to a palette slot (0 = default, 1-7)
pub fn color_index(value: u8) -> u8 {
    match value {
        COLOR_BLUE..=COLOR_WHITE => value - 0xF0,
        0x01..=0x07 => value,
        _ => 0,
    }
}

/// Wire value for a palette slot
pub fn color_value(index: u8) -> u8 {
    match index {
        1..=7 => 0xF0 + index,
        _ => 0x00,
    }
}

/// Decode a character set attribute value
pub fn charset_from_u8(value: u8) -> Charset {
    match value {
        CHARSET_APL | 0x01 => Charset::Apl,
        _ => Charset::Standard,
    }
}

pub fn charset_value(charset: Charset) -> u8 {
    match charset {
        Charset::Standard => CHARSET_DEFAULT,
        Charset::Apl => CHARSET_APL,
    }
}

/// Extended attributes of a cell: the "pen" while orders are processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedAttributes {
    /// Palette slot, 0 for the default color
    pub color: u8,
    pub highlight: Highlight,
    pub charset: Charset,
}

impl ExtendedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Apply one (type, value) pair as carried by SA and SFE
    ///
    /// Returns false when the type is not one this terminal tracks.
    pub fn apply(&mut self, attr_type: u8, value: u8) -> bool {
        match attr_type {
            XA_ALL => {
                *self = Self::default();
                true
            }
            XA_HIGHLIGHTING => {
                self.highlight = Highlight::from_u8(value);
                true
            }
            XA_FOREGROUND => {
                self.color = color_index(value);
                true
            }
            XA_CHARSET => {
                self.charset = charset_from_u8(value);
                true
            }
            _ => false,
        }
    }

    /// Copy the non-default parts of `other` into self
    pub fn merge_non_default(&mut self, other: &ExtendedAttributes) {
        if other.color != 0 {
            self.color = other.color;
        }
        if other.highlight != Highlight::Normal {
            self.highlight = other.highlight;
        }
        if other.charset != Charset::Standard {
            self.charset = other.charset;
        }
    }

    /// (type, value) pairs needed to describe these attributes
    pub fn to_pairs(&self) -> Vec<(u8, u8)> {
        let mut pairs = Vec::new();
        if self.highlight != Highlight::Normal {
            pairs.push((XA_HIGHLIGHTING, self.highlight.to_u8()));
        }
        if self.color != 0 {
            pairs.push((XA_FOREGROUND, color_value(self.color)));
        }
        if self.charset != Charset::Standard {
            pairs.push((XA_CHARSET, charset_value(self.charset)));
        }
        pairs
    }
}

/// A field found on a formatted screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Position of the attribute cell
    pub start: usize,
    pub attribute: FieldAttribute,
    pub extended: ExtendedAttributes,
    /// Number of data cells following the attribute cell
    pub length: usize,
}

impl Field {
    /// First data position
    pub fn data_start(&self, buffer_size: usize) -> usize {
        (self.start + 1) % buffer_size
    }

    /// Buffer positions of the field's data cells, in order
    pub fn positions(&self, buffer_size: usize) -> impl Iterator<Item = usize> {
        let start = self.start;
        (1..=self.length).map(move |offset| (start + offset) % buffer_size)
    }

    pub fn contains(&self, pos: usize, buffer_size: usize) -> bool {
        let offset = (pos + buffer_size - self.start) % buffer_size;
        offset >= 1 && offset <= self.length
    }
}
