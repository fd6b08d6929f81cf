//! Query Reply generation
//!
//! Answers a Read Partition Query with the terminal's capabilities. Each
//! query reply is a structured field `[length:2][0x81][code][body]`; the
//! whole answer is one inbound record starting with the structured-field AID.
//! Geometry is reported from the alternate screen size, with the implicit
//! partition also carrying the 24x80 default size.

use super::codes::*;
use super::display::ScreenSize;

/// Query reply codes answered, in the order they are sent
pub const SUPPORTED_QUERY_REPLIES: [u8; 22] = [
    QR_SUMMARY,
    QR_USABLE_AREA,
    QR_ALPHA_PARTITIONS,
    QR_CHARSETS,
    QR_COLOR,
    QR_HIGHLIGHTING,
    QR_REPLY_MODES,
    QR_FIELD_OUTLINING,
    QR_OEM_AUX_DEVICE,
    QR_DDM,
    QR_AUX_DEVICE,
    QR_ANOMALY_IMPLEMENTATION,
    QR_IMPLICIT_PARTITION,
    QR_TRANSPARENCY,
    QR_COOP_PROC_REQUESTOR,
    QR_SEGMENT,
    QR_PROCEDURE,
    QR_LINE_TYPE,
    QR_PORT,
    QR_GRAPHIC_COLOR,
    QR_EXTENDED_DRAWING,
    QR_GRAPHIC_SYMBOL_SETS,
];

/// Query List request types
const QL_LIST: u8 = 0x00;

/// Largest data-chain buffer the DDM reply advertises
const DDM_BUFFER_SIZE: u16 = 0x0940;

/// Geometry reported in the query replies
#[derive(Debug, Clone, Copy)]
pub struct QueryGeometry {
    pub primary: ScreenSize,
    pub alternate: ScreenSize,
}

/// Build the full Query Reply record
pub fn build_query_reply(geometry: QueryGeometry) -> Vec<u8> {
    build_reply_for(&SUPPORTED_QUERY_REPLIES, geometry)
}

/// Build the reply to a Query List
///
/// `request_type` 0x00 asks for the listed codes only, anything else for
/// everything the terminal supports. Summary is always included.
pub fn build_query_list_reply(request_type: u8, codes: &[u8], geometry: QueryGeometry) -> Vec<u8> {
    if request_type != QL_LIST {
        return build_query_reply(geometry);
    }
    let selected: Vec<u8> = SUPPORTED_QUERY_REPLIES
        .iter()
        .copied()
        .filter(|&code| code == QR_SUMMARY || codes.contains(&code))
        .collect();
    build_reply_for(&selected, geometry)
}

fn build_reply_for(codes: &[u8], geometry: QueryGeometry) -> Vec<u8> {
    let mut record = vec![AID_STRUCTURED_FIELD];
    for &code in codes {
        let body = reply_body(code, geometry);
        let length = (body.len() + 4) as u16;
        record.extend_from_slice(&length.to_be_bytes());
        record.push(SF_QUERY_REPLY);
        record.push(code);
        record.extend_from_slice(&body);
    }
    record
}

/// Body of one query reply, after its code byte
pub fn reply_body(code: u8, geometry: QueryGeometry) -> Vec<u8> {
    let alt = geometry.alternate;
    let primary = geometry.primary;
    match code {
        QR_SUMMARY => SUPPORTED_QUERY_REPLIES.to_vec(),
        QR_USABLE_AREA => {
            let mut body = vec![0x01, 0x00];
            body.extend_from_slice(&(alt.cols() as u16).to_be_bytes());
            body.extend_from_slice(&(alt.rows() as u16).to_be_bytes());
            // units: millimetres
            body.push(0x01);
            body.extend_from_slice(&[0x00, 0x0A, 0x02, 0xE5]);
            body.extend_from_slice(&[0x00, 0x02, 0x00, 0x6F]);
            // character cell width and height
            body.extend_from_slice(&[0x09, 0x0C]);
            body.extend_from_slice(&(alt.buffer_size() as u16).to_be_bytes());
            body
        }
        QR_ALPHA_PARTITIONS => {
            let mut body = vec![0x00];
            body.extend_from_slice(&(alt.buffer_size() as u16).to_be_bytes());
            body.push(0x00);
            body
        }
        QR_CHARSETS => vec![
            0x82, 0x00, 0x09, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x07,
            // base set
            0x00, 0x10, 0x00, 0x02, 0xB9, 0x00, 0x25,
            // APL set, selected by 0xF1
            0x01, 0x00, 0xF1, 0x03, 0xC3, 0x01, 0x36,
        ],
        QR_COLOR => {
            let mut body = vec![0x00, 0x08, 0x00, COLOR_GREEN];
            for color in COLOR_BLUE..=COLOR_WHITE {
                body.push(color);
                body.push(color);
            }
            body
        }
        QR_HIGHLIGHTING => vec![
            0x05,
            HIGHLIGHT_DEFAULT, HIGHLIGHT_NORMAL,
            HIGHLIGHT_NORMAL, HIGHLIGHT_NORMAL,
            HIGHLIGHT_BLINK, HIGHLIGHT_BLINK,
            HIGHLIGHT_REVERSE, HIGHLIGHT_REVERSE,
            HIGHLIGHT_UNDERSCORE, HIGHLIGHT_UNDERSCORE,
        ],
        QR_REPLY_MODES => vec![0x00, 0x01, 0x02],
        QR_FIELD_OUTLINING => vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        QR_OEM_AUX_DEVICE => {
            let mut body = vec![0x00, 0x00];
            body.extend(crate::lib3270::ebcdic::string_to_ebcdic("TN3270R "));
            body.extend(crate::lib3270::ebcdic::string_to_ebcdic("IND$FILE"));
            body
        }
        QR_DDM => {
            let mut body = vec![0x00, 0x00];
            body.extend_from_slice(&DDM_BUFFER_SIZE.to_be_bytes());
            body.extend_from_slice(&DDM_BUFFER_SIZE.to_be_bytes());
            body.extend_from_slice(&[0x01, 0x01]);
            body
        }
        QR_AUX_DEVICE => vec![0x00, 0x00],
        QR_ANOMALY_IMPLEMENTATION => vec![0x00, 0x00, 0x00, 0x00],
        QR_IMPLICIT_PARTITION => {
            let mut body = vec![0x00, 0x00, 0x0B, 0x01, 0x00];
            body.extend_from_slice(&(primary.cols() as u16).to_be_bytes());
            body.extend_from_slice(&(primary.rows() as u16).to_be_bytes());
            body.extend_from_slice(&(alt.cols() as u16).to_be_bytes());
            body.extend_from_slice(&(alt.rows() as u16).to_be_bytes());
            body
        }
        QR_TRANSPARENCY => vec![0x00],
        QR_COOP_PROC_REQUESTOR => vec![0x00, 0x00, 0x00, 0x00],
        QR_SEGMENT | QR_PROCEDURE | QR_LINE_TYPE | QR_PORT | QR_GRAPHIC_COLOR
        | QR_EXTENDED_DRAWING | QR_GRAPHIC_SYMBOL_SETS => vec![0x00, 0x00],
        _ => Vec::new(),
    }
}

/// Walk a query reply record and return (code, body) for each reply
pub fn split_query_reply(record: &[u8]) -> Vec<(u8, &[u8])> {
    let mut replies = Vec::new();
    let mut pos = 1;
    while pos + 4 <= record.len() {
        let length = u16::from_be_bytes([record[pos], record[pos + 1]]) as usize;
        if length < 4 || pos + length > record.len() {
            break;
        }
        replies.push((record[pos + 3], &record[pos + 4..pos + length]));
        pos += length;
    }
    replies
}
