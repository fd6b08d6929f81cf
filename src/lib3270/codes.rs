/// TN3270 Protocol Constants and Codes
///
/// This module contains the IBM 3270 data stream constants: command codes
/// (both the CCW and the SNA spelling), order codes, AID keys, field
/// attribute bits, structured field identifiers and the IND$FILE data
/// chain operation codes.
///
/// # References
/// - RFC 1576: TN3270 Current Practices
/// - RFC 2355: TN3270 Enhancements
/// - IBM 3270 Data Stream Programmer's Reference (GA23-0059)

/// 3270 Command Codes (CCW form)
pub const CMD_WRITE: u8 = 0x01;
pub const CMD_ERASE_WRITE: u8 = 0x05;
pub const CMD_ERASE_WRITE_ALTERNATE: u8 = 0x0D;
pub const CMD_READ_BUFFER: u8 = 0x02;
pub const CMD_READ_MODIFIED: u8 = 0x06;
pub const CMD_READ_MODIFIED_ALL: u8 = 0x0E;
pub const CMD_ERASE_ALL_UNPROTECTED: u8 = 0x0F;
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0x11;

/// 3270 Command Codes (SNA form)
pub const SNA_CMD_WRITE: u8 = 0xF1;
pub const SNA_CMD_ERASE_WRITE: u8 = 0xF5;
pub const SNA_CMD_ERASE_WRITE_ALTERNATE: u8 = 0x7E;
pub const SNA_CMD_READ_BUFFER: u8 = 0xF2;
pub const SNA_CMD_READ_MODIFIED: u8 = 0xF6;
pub const SNA_CMD_READ_MODIFIED_ALL: u8 = 0x6E;
pub const SNA_CMD_ERASE_ALL_UNPROTECTED: u8 = 0x6F;
pub const SNA_CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3;

/// 3270 Order Codes
/// These are embedded in the data stream to control formatting
pub const ORDER_SF: u8 = 0x1D;    // Start Field
pub const ORDER_SFE: u8 = 0x29;   // Start Field Extended
pub const ORDER_SBA: u8 = 0x11;   // Set Buffer Address
pub const ORDER_SA: u8 = 0x28;    // Set Attribute
pub const ORDER_MF: u8 = 0x2C;    // Modify Field
pub const ORDER_IC: u8 = 0x13;    // Insert Cursor
pub const ORDER_PT: u8 = 0x05;    // Program Tab
pub const ORDER_RA: u8 = 0x3C;    // Repeat to Address
pub const ORDER_EUA: u8 = 0x12;   // Erase Unprotected to Address
pub const ORDER_GE: u8 = 0x08;    // Graphic Escape
pub const ORDER_FM: u8 = 0x0E;    // Field Mark

/// Write Control Character (WCC) Bits
/// Used with Write and Erase/Write commands
pub const WCC_RESET: u8 = 0x40;           // Reset bit
pub const WCC_ALARM: u8 = 0x04;           // Sound alarm
pub const WCC_RESTORE: u8 = 0x02;         // Restore keyboard
pub const WCC_RESET_MDT: u8 = 0x01;       // Reset MDT bits

/// AID (Attention Identifier) Keys
/// Sent from terminal to host to identify which key was pressed
pub const AID_NO_AID: u8 = 0x60;
pub const AID_STRUCTURED_FIELD: u8 = 0x88;

// Function keys
pub const AID_PF1: u8 = 0xF1;
pub const AID_PF2: u8 = 0xF2;
pub const AID_PF3: u8 = 0xF3;
pub const AID_PF4: u8 = 0xF4;
pub const AID_PF5: u8 = 0xF5;
pub const AID_PF6: u8 = 0xF6;
pub const AID_PF7: u8 = 0xF7;
pub const AID_PF8: u8 = 0xF8;
pub const AID_PF9: u8 = 0xF9;
pub const AID_PF10: u8 = 0x7A;
pub const AID_PF11: u8 = 0x7B;
pub const AID_PF12: u8 = 0x7C;
pub const AID_PF13: u8 = 0xC1;
pub const AID_PF14: u8 = 0xC2;
pub const AID_PF15: u8 = 0xC3;
pub const AID_PF16: u8 = 0xC4;
pub const AID_PF17: u8 = 0xC5;
pub const AID_PF18: u8 = 0xC6;
pub const AID_PF19: u8 = 0xC7;
pub const AID_PF20: u8 = 0xC8;
pub const AID_PF21: u8 = 0xC9;
pub const AID_PF22: u8 = 0x4A;
pub const AID_PF23: u8 = 0x4B;
pub const AID_PF24: u8 = 0x4C;

/// PF1-PF24 in key order
pub const PF_AIDS: [u8; 24] = [
    AID_PF1, AID_PF2, AID_PF3, AID_PF4, AID_PF5, AID_PF6,
    AID_PF7, AID_PF8, AID_PF9, AID_PF10, AID_PF11, AID_PF12,
    AID_PF13, AID_PF14, AID_PF15, AID_PF16, AID_PF17, AID_PF18,
    AID_PF19, AID_PF20, AID_PF21, AID_PF22, AID_PF23, AID_PF24,
];

// Program attention keys
pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6E;
pub const AID_PA3: u8 = 0x6B;

// Special keys
pub const AID_CLEAR: u8 = 0x6D;
pub const AID_ENTER: u8 = 0x7D;

/// Field Attribute Byte Bits
/// Used in Start Field (SF) order
pub const ATTR_PROTECTED: u8 = 0x20;      // Bit 5: Protected field
pub const ATTR_NUMERIC: u8 = 0x10;        // Bit 4: Numeric field
pub const ATTR_DISPLAY: u8 = 0x0C;        // Bits 2-3: Display attributes
pub const ATTR_MDT: u8 = 0x01;            // Bit 0: Modified Data Tag

/// Display Attribute Values (bits 2-3 of field attribute)
pub const DISPLAY_NORMAL: u8 = 0x00;
pub const DISPLAY_INTENSIFIED: u8 = 0x08;
pub const DISPLAY_HIDDEN: u8 = 0x0C;

/// Extended Field Attribute Types (for SFE, SA and MF orders)
pub const XA_ALL: u8 = 0x00;              // All character attributes (SA reset)
pub const XA_3270: u8 = 0xC0;             // 3270 field attribute
pub const XA_HIGHLIGHTING: u8 = 0x41;     // Highlighting
pub const XA_FOREGROUND: u8 = 0x42;       // Foreground color
pub const XA_CHARSET: u8 = 0x43;          // Character set

/// Color Attribute Values
pub const COLOR_DEFAULT: u8 = 0x00;
pub const COLOR_BLUE: u8 = 0xF1;
pub const COLOR_RED: u8 = 0xF2;
pub const COLOR_PINK: u8 = 0xF3;
pub const COLOR_GREEN: u8 = 0xF4;
pub const COLOR_TURQUOISE: u8 = 0xF5;
pub const COLOR_YELLOW: u8 = 0xF6;
pub const COLOR_WHITE: u8 = 0xF7;

/// Highlighting Attribute Values
pub const HIGHLIGHT_DEFAULT: u8 = 0x00;
pub const HIGHLIGHT_NORMAL: u8 = 0xF0;
pub const HIGHLIGHT_BLINK: u8 = 0xF1;
pub const HIGHLIGHT_REVERSE: u8 = 0xF2;
pub const HIGHLIGHT_UNDERSCORE: u8 = 0xF4;

/// Character set attribute values
pub const CHARSET_DEFAULT: u8 = 0x00;
pub const CHARSET_APL: u8 = 0xF1;

/// Structured field identifiers (outbound, host to terminal)
pub const SF_READ_PARTITION: u8 = 0x01;
pub const SF_SET_REPLY_MODE: u8 = 0x09;
pub const SF_DATA_CHAIN: u8 = 0xD0;

/// Read Partition operation types
pub const RP_QUERY: u8 = 0x02;
pub const RP_QUERY_LIST: u8 = 0x03;
pub const RP_READ_MODIFIED_ALL: u8 = 0x6E;
pub const RP_READ_BUFFER: u8 = 0xF2;
pub const RP_READ_MODIFIED: u8 = 0xF6;

/// Inbound Query Reply structured field identifier
pub const SF_QUERY_REPLY: u8 = 0x81;

/// Query reply codes (QCODEs)
pub const QR_SUMMARY: u8 = 0x80;
pub const QR_USABLE_AREA: u8 = 0x81;
pub const QR_ALPHA_PARTITIONS: u8 = 0x84;
pub const QR_CHARSETS: u8 = 0x85;
pub const QR_COLOR: u8 = 0x86;
pub const QR_HIGHLIGHTING: u8 = 0x87;
pub const QR_REPLY_MODES: u8 = 0x88;
pub const QR_FIELD_OUTLINING: u8 = 0x8C;
pub const QR_OEM_AUX_DEVICE: u8 = 0x8F;
pub const QR_DDM: u8 = 0x95;
pub const QR_AUX_DEVICE: u8 = 0x99;
pub const QR_ANOMALY_IMPLEMENTATION: u8 = 0x9D;
pub const QR_IMPLICIT_PARTITION: u8 = 0xA6;
pub const QR_TRANSPARENCY: u8 = 0xA8;
pub const QR_COOP_PROC_REQUESTOR: u8 = 0xAB;
pub const QR_SEGMENT: u8 = 0xB0;
pub const QR_PROCEDURE: u8 = 0xB1;
pub const QR_LINE_TYPE: u8 = 0xB2;
pub const QR_PORT: u8 = 0xB3;
pub const QR_GRAPHIC_COLOR: u8 = 0xB4;
pub const QR_EXTENDED_DRAWING: u8 = 0xB5;
pub const QR_GRAPHIC_SYMBOL_SETS: u8 = 0xB6;

/// Data chain (IND$FILE) operation codes
pub const DC_OPEN: u8 = 0x00;
pub const DC_CLOSE: u8 = 0x41;
pub const DC_SET_CURSOR: u8 = 0x45;
pub const DC_GET: u8 = 0x46;
pub const DC_INSERT: u8 = 0x47;

/// Data chain response codes
pub const DC_RESPONSE_POSITIVE: u8 = 0x09;
pub const DC_RESPONSE_NEGATIVE: u8 = 0x08;
/// Data chain request marker following the op code
pub const DC_REQUEST: u8 = 0x11;
pub const DC_OPEN_REQUEST: u8 = 0x12;
/// Insert data block marker following DC_INSERT
pub const DC_DATA_INSERT: u8 = 0x04;
/// Get reply marker following DC_GET
pub const DC_GET_REPLY: u8 = 0x05;

/// Data chain sub-headers
pub const DC_RECNUM_HEADER: [u8; 2] = [0x63, 0x06];
pub const DC_ERROR_HEADER: [u8; 2] = [0x69, 0x04];
pub const DC_NOT_COMPRESSED: [u8; 2] = [0xC0, 0x80];
pub const DC_BEGIN_DATA: u8 = 0x61;

/// Data chain error codes
pub const DC_ERR_FILE_NOT_FOUND: u16 = 0x1B00;
pub const DC_ERR_OPEN: u16 = 0x2000;
pub const DC_ERR_EOF: u16 = 0x2200;
pub const DC_ERR_WRITE: u16 = 0x4700;
pub const DC_ERR_UNSUPPORTED_TYPE: u16 = 0x5D00;
pub const DC_ERR_MISSING_DATA: u16 = 0x6E00;
pub const DC_ERR_CLOSE: u16 = 0x7100;

/// Enum representation of 3270 command codes for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    EraseAllUnprotected,
    WriteStructuredField,
}

impl CommandCode {
    /// Convert a byte value to a CommandCode enum, accepting both spellings
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_WRITE | SNA_CMD_WRITE => Some(Self::Write),
            CMD_ERASE_WRITE | SNA_CMD_ERASE_WRITE => Some(Self::EraseWrite),
            CMD_ERASE_WRITE_ALTERNATE | SNA_CMD_ERASE_WRITE_ALTERNATE => Some(Self::EraseWriteAlternate),
            CMD_READ_BUFFER | SNA_CMD_READ_BUFFER => Some(Self::ReadBuffer),
            CMD_READ_MODIFIED | SNA_CMD_READ_MODIFIED => Some(Self::ReadModified),
            CMD_READ_MODIFIED_ALL | SNA_CMD_READ_MODIFIED_ALL => Some(Self::ReadModifiedAll),
            CMD_ERASE_ALL_UNPROTECTED | SNA_CMD_ERASE_ALL_UNPROTECTED => Some(Self::EraseAllUnprotected),
            CMD_WRITE_STRUCTURED_FIELD | SNA_CMD_WRITE_STRUCTURED_FIELD => Some(Self::WriteStructuredField),
            _ => None,
        }
    }

    /// Convert CommandCode enum to its CCW byte value
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Write => CMD_WRITE,
            Self::EraseWrite => CMD_ERASE_WRITE,
            Self::EraseWriteAlternate => CMD_ERASE_WRITE_ALTERNATE,
            Self::ReadBuffer => CMD_READ_BUFFER,
            Self::ReadModified => CMD_READ_MODIFIED,
            Self::ReadModifiedAll => CMD_READ_MODIFIED_ALL,
            Self::EraseAllUnprotected => CMD_ERASE_ALL_UNPROTECTED,
            Self::WriteStructuredField => CMD_WRITE_STRUCTURED_FIELD,
        }
    }
}

/// Enum representation of 3270 order codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    StartField = ORDER_SF as isize,
    StartFieldExtended = ORDER_SFE as isize,
    SetBufferAddress = ORDER_SBA as isize,
    SetAttribute = ORDER_SA as isize,
    ModifyField = ORDER_MF as isize,
    InsertCursor = ORDER_IC as isize,
    ProgramTab = ORDER_PT as isize,
    RepeatToAddress = ORDER_RA as isize,
    EraseUnprotectedToAddress = ORDER_EUA as isize,
    GraphicEscape = ORDER_GE as isize,
    FieldMark = ORDER_FM as isize,
}

impl OrderCode {
    /// Convert a byte value to an OrderCode enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_SF => Some(Self::StartField),
            ORDER_SFE => Some(Self::StartFieldExtended),
            ORDER_SBA => Some(Self::SetBufferAddress),
            ORDER_SA => Some(Self::SetAttribute),
            ORDER_MF => Some(Self::ModifyField),
            ORDER_IC => Some(Self::InsertCursor),
            ORDER_PT => Some(Self::ProgramTab),
            ORDER_RA => Some(Self::RepeatToAddress),
            ORDER_EUA => Some(Self::EraseUnprotectedToAddress),
            ORDER_GE => Some(Self::GraphicEscape),
            ORDER_FM => Some(Self::FieldMark),
            _ => None,
        }
    }

    /// Convert OrderCode enum to byte value
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Enum representation of AID keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    NoAid,
    Enter,
    Clear,
    PA(u8),
    PF(u8),
    StructuredField,
}

impl AidKey {
    /// Convert a byte value to an AidKey enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            AID_NO_AID => Some(Self::NoAid),
            AID_ENTER => Some(Self::Enter),
            AID_CLEAR => Some(Self::Clear),
            AID_PA1 => Some(Self::PA(1)),
            AID_PA2 => Some(Self::PA(2)),
            AID_PA3 => Some(Self::PA(3)),
            AID_STRUCTURED_FIELD => Some(Self::StructuredField),
            other => PF_AIDS
                .iter()
                .position(|&b| b == other)
                .map(|i| Self::PF(i as u8 + 1)),
        }
    }

    /// Convert AidKey enum to byte value; out-of-range PF/PA numbers map to NoAid
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoAid => AID_NO_AID,
            Self::Enter => AID_ENTER,
            Self::Clear => AID_CLEAR,
            Self::PA(1) => AID_PA1,
            Self::PA(2) => AID_PA2,
            Self::PA(3) => AID_PA3,
            Self::PA(_) => AID_NO_AID,
            Self::PF(n @ 1..=24) => PF_AIDS[n as usize - 1],
            Self::PF(_) => AID_NO_AID,
            Self::StructuredField => AID_STRUCTURED_FIELD,
        }
    }

    /// Short-read keys transmit no field data
    pub fn is_short_read(self) -> bool {
        matches!(self, Self::Clear | Self::PA(_))
    }
}
