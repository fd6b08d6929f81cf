//! 3270 buffer address coding
//!
//! Addresses travel as two bytes in one of two wire formats. Screens up to
//! 4096 cells use 12-bit addressing, where each byte carries six address bits
//! translated through a code table so the byte never collides with a control
//! character. Larger buffers use plain 14-bit binary addressing. The host
//! signals 14-bit form by leaving the top two bits of the first byte clear.

/// Graphic code for each 6-bit address value
pub const ADDRESS_CODE_TABLE: [u8; 64] = [
    0x40, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
    0xC8, 0xC9, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
    0x50, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7,
    0xD8, 0xD9, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F,
    0x60, 0x61, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7,
    0xE8, 0xE9, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F,
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
    0xF8, 0xF9, 0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F,
];

/// Highest address representable in 12-bit form
const TWELVE_BIT_LIMIT: usize = 0x1000;

/// Decode a two-byte buffer address, wrapped into `buffer_size`
///
/// ```
/// use tn3270r::lib3270::addressing::decode_address;
///
/// // 12-bit form: row 1, column 0 on an 80 column screen
/// assert_eq!(decode_address(0xC1, 0x50, 1920), 80);
/// // 14-bit binary form
/// assert_eq!(decode_address(0x10, 0x00, 5000), 4096);
/// ```
pub fn decode_address(b1: u8, b2: u8, buffer_size: usize) -> usize {
    let raw = if b1 & 0xC0 == 0 {
        ((b1 as usize) << 8) | b2 as usize
    } else {
        (((b1 & 0x3F) as usize) << 6) | (b2 & 0x3F) as usize
    };
    if buffer_size == 0 {
        0
    } else {
        raw % buffer_size
    }
}

/// Encode a buffer position into its two-byte wire form
pub fn encode_address(pos: usize) -> [u8; 2] {
    let pos = pos & 0x3FFF;
    if pos >= TWELVE_BIT_LIMIT {
        [(pos >> 8) as u8, (pos & 0xFF) as u8]
    } else {
        [
            ADDRESS_CODE_TABLE[(pos >> 6) & 0x3F],
            ADDRESS_CODE_TABLE[pos & 0x3F],
        ]
    }
}

/// Convert a buffer position to (row, col)
pub fn position_to_coords(pos: usize, cols: usize) -> (usize, usize) {
    (pos / cols, pos % cols)
}

/// Convert (row, col) to a buffer position
pub fn coords_to_position(row: usize, col: usize, cols: usize) -> usize {
    row * cols + col
}
