//! EBCDIC to display character conversion for 3270 screens
//!
//! The standard table implements code page 037 (EBCDIC US/Canada), the code
//! page mainframe hosts assume for a 3278 terminal. Control code points decode
//! to a blank, except 0x00 which stays the null character so the screen can
//! tell "unpainted" cells from painted blanks.
//!
//! The APL table is the standard table with the line-drawing and bracket
//! glyphs of the APL character set overlaid. It is selected by the Graphic
//! Escape order or by a character-set attribute of 0xF1.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Character set a cell was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Charset {
    #[default]
    Standard,
    Apl,
}

/// EBCDIC space
pub const EBCDIC_SPACE: u8 = 0x40;

/// EBCDIC code point that always renders as a vertical bar
pub const EBCDIC_VERTICAL_BAR: u8 = 0x4F;

/// Code page 037, with control code points folded to blank
const STANDARD_TO_DISPLAY: [char; 256] = [
    // 0x00-0x0F: null, then controls
    '\0', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    // 0x10-0x1F
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    // 0x20-0x2F
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    // 0x30-0x3F
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    ' ', ' ', ' ', ' ', ' ', ' ', ' ', ' ',
    // 0x40-0x4F: Space and special characters
    ' ', '\u{00A0}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E1}', '\u{00E3}', '\u{00E5}',
    '\u{00E7}', '\u{00F1}', '\u{00A2}', '.', '<', '(', '+', '|',
    // 0x50-0x5F
    '&', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00EC}', '\u{00DF}', '!', '$', '*', ')', ';', '\u{00AC}',
    // 0x60-0x6F
    '-', '/', '\u{00C2}', '\u{00C4}', '\u{00C0}', '\u{00C1}', '\u{00C3}', '\u{00C5}',
    '\u{00C7}', '\u{00D1}', '\u{00A6}', ',', '%', '_', '>', '?',
    // 0x70-0x7F
    '\u{00F8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00CC}', '`', ':', '#', '@', '\'', '=', '"',
    // 0x80-0x8F: lowercase a-i
    '\u{00D8}', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
    'h', 'i', '\u{00AB}', '\u{00BB}', '\u{00F0}', '\u{00FD}', '\u{00FE}', '\u{00B1}',
    // 0x90-0x9F: lowercase j-r
    '\u{00B0}', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', '\u{00AA}', '\u{00BA}', '\u{00E6}', '\u{00B8}', '\u{00C6}', '\u{00A4}',
    // 0xA0-0xAF: lowercase s-z
    '\u{00B5}', '~', 's', 't', 'u', 'v', 'w', 'x',
    'y', 'z', '\u{00A1}', '\u{00BF}', '\u{00D0}', '\u{00DD}', '\u{00DE}', '\u{00AE}',
    // 0xB0-0xBF
    '^', '\u{00A3}', '\u{00A5}', '\u{00B7}', '\u{00A9}', '\u{00A7}', '\u{00B6}', '\u{00BC}',
    '\u{00BD}', '\u{00BE}', '[', ']', '\u{00AF}', '\u{00A8}', '\u{00B4}', '\u{00D7}',
    // 0xC0-0xCF: uppercase A-I
    '{', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', '\u{00AD}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00F3}', '\u{00F5}',
    // 0xD0-0xDF: uppercase J-R
    '}', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', '\u{00B9}', '\u{00FB}', '\u{00FC}', '\u{00F9}', '\u{00FA}', '\u{00FF}',
    // 0xE0-0xEF: uppercase S-Z
    '\\', '\u{00F7}', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', '\u{00B2}', '\u{00D4}', '\u{00D6}', '\u{00D2}', '\u{00D3}', '\u{00D5}',
    // 0xF0-0xFF: digits
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '\u{00B3}', '\u{00DB}', '\u{00DC}', '\u{00D9}', '\u{00DA}', ' ',
];

/// Code points the APL set renders differently from code page 037
const APL_OVERRIDES: [(u8, char); 13] = [
    (0x85, '\u{2502}'), // │
    (0xA2, '\u{2500}'), // ─
    (0xAD, '['),
    (0xBD, ']'),
    (0xC4, '\u{2514}'), // └
    (0xC5, '\u{250C}'), // ┌
    (0xC6, '\u{251C}'), // ├
    (0xC7, '\u{2534}'), // ┴
    (0xD3, '\u{253C}'), // ┼
    (0xD4, '\u{2518}'), // ┘
    (0xD5, '\u{2510}'), // ┐
    (0xD6, '\u{2524}'), // ┤
    (0xD7, '\u{252C}'), // ┬
];

static APL_TO_DISPLAY: Lazy<[char; 256]> = Lazy::new(|| {
    let mut table = STANDARD_TO_DISPLAY;
    for &(byte, ch) in APL_OVERRIDES.iter() {
        table[byte as usize] = ch;
    }
    table
});

static DISPLAY_TO_EBCDIC: Lazy<HashMap<char, u8>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(192);
    map.insert('\0', 0x00);
    for byte in EBCDIC_SPACE..=0xFE {
        map.entry(STANDARD_TO_DISPLAY[byte as usize]).or_insert(byte);
    }
    map
});

/// Decode an EBCDIC byte to the character shown on screen
///
/// ```
/// use tn3270r::lib3270::ebcdic::{ebcdic_to_display, Charset};
///
/// assert_eq!(ebcdic_to_display(0xC1, Charset::Standard), 'A');
/// assert_eq!(ebcdic_to_display(0xC5, Charset::Apl), '┌');
/// assert_eq!(ebcdic_to_display(0x4F, Charset::Apl), '|');
/// ```
pub fn ebcdic_to_display(byte: u8, charset: Charset) -> char {
    if byte == EBCDIC_VERTICAL_BAR {
        return '|';
    }
    match charset {
        Charset::Standard => STANDARD_TO_DISPLAY[byte as usize],
        Charset::Apl => APL_TO_DISPLAY[byte as usize],
    }
}

/// Encode a display character back to EBCDIC
///
/// Characters with no code page 037 mapping become the EBCDIC space.
///
/// ```
/// use tn3270r::lib3270::ebcdic::display_to_ebcdic;
///
/// assert_eq!(display_to_ebcdic('A'), 0xC1);
/// assert_eq!(display_to_ebcdic('|'), 0x4F);
/// assert_eq!(display_to_ebcdic('€'), 0x40);
/// ```
pub fn display_to_ebcdic(ch: char) -> u8 {
    if ch == '|' {
        return EBCDIC_VERTICAL_BAR;
    }
    DISPLAY_TO_EBCDIC.get(&ch).copied().unwrap_or(EBCDIC_SPACE)
}

/// Encode a character that was written with `charset`
///
/// APL glyphs go back to their APL code point; everything else uses the
/// standard table.
pub fn display_to_ebcdic_in(ch: char, charset: Charset) -> u8 {
    if charset == Charset::Apl {
        if let Some(&(byte, _)) = APL_OVERRIDES.iter().find(|&&(_, glyph)| glyph == ch) {
            return byte;
        }
    }
    display_to_ebcdic(ch)
}

/// Decode a run of standard-set EBCDIC bytes
pub fn ebcdic_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| ebcdic_to_display(b, Charset::Standard)).collect()
}

/// Encode a string to EBCDIC
pub fn string_to_ebcdic(s: &str) -> Vec<u8> {
    s.chars().map(display_to_ebcdic).collect()
}
