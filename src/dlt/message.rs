//! DLT frame decoding.
//!
//! A frame on disk is a storage header (magic, reception time, ECU id)
//! followed by the on-wire message: standard header, optional extension
//! fields, optional extended header, payload. The indexer only consults the
//! handful of attributes needed for filtering and the control side channels;
//! argument-level payload parsing is out of scope.

use anyhow::{bail, ensure, Result};

/// Frame magic: `D` `L` `T` 0x01.
pub const STORAGE_MAGIC: [u8; 4] = [0x44, 0x4c, 0x54, 0x01];

/// Storage header: magic + seconds + microseconds + ECU id.
pub const STORAGE_HEADER_SIZE: usize = 16;

/// Mandatory part of the standard header: htyp, counter, length.
pub const STANDARD_HEADER_SIZE: usize = 4;

/// Bytes needed to determine the full frame length.
pub const FRAME_PREFIX_SIZE: usize = STORAGE_HEADER_SIZE + STANDARD_HEADER_SIZE;

// Standard header type bits.
const HTYP_UEH: u8 = 0x01; // use extended header
const HTYP_MSBF: u8 = 0x02; // payload is big endian
const HTYP_WEID: u8 = 0x04; // with ECU id
const HTYP_WSID: u8 = 0x08; // with session id
const HTYP_WTMS: u8 = 0x10; // with timestamp

// Control service identifiers consulted by the side channels.
pub const SERVICE_GET_LOG_INFO: u32 = 0x03;
pub const SERVICE_GET_SOFTWARE_VERSION: u32 = 0x13;
pub const SERVICE_UNREGISTER_CONTEXT: u32 = 0x0f01;
pub const SERVICE_TIMEZONE: u32 = 0x0f03;

/// Payload size of a timezone control response:
/// service id (4) + status (1) + offset (4) + DST flag (1).
pub const TIMEZONE_PAYLOAD_SIZE: usize = 10;

/// Payload size of an unregister-context control response:
/// service id (4) + status (1) + apid (4) + ctid (4) + comid (4).
pub const UNREGISTER_CONTEXT_PAYLOAD_SIZE: usize = 17;

/// Control message subtype for responses.
pub const CONTROL_RESPONSE: u8 = 0x02;

/// Payload byte order, from the MSBF bit of the standard header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Default for Endianness {
    fn default() -> Self {
        Endianness::Little
    }
}

/// Message type from the extended header (mstp).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Log,
    AppTrace,
    NetworkTrace,
    Control,
    Unknown(u8),
}

impl MessageType {
    fn from_mstp(mstp: u8) -> Self {
        match mstp {
            0 => MessageType::Log,
            1 => MessageType::AppTrace,
            2 => MessageType::NetworkTrace,
            3 => MessageType::Control,
            other => MessageType::Unknown(other),
        }
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Unknown(0)
    }
}

/// One decoded DLT message.
///
/// Mutable only while the walker owns it; decoder plug-ins may attach
/// `decoded_text` or rewrite the payload in place.
#[derive(Debug, Clone, Default)]
pub struct DltMessage {
    /// Originating ECU, from the storage header (standard header wins if
    /// the WEID bit is set).
    pub ecu_id: String,
    /// Reception time, seconds part.
    pub seconds: u32,
    /// Reception time, microseconds part.
    pub microseconds: u32,
    /// Message counter from the standard header.
    pub counter: u8,
    pub endianness: Endianness,
    pub msg_type: MessageType,
    /// Message type info (mtin); for control messages 1 = request,
    /// 2 = response.
    pub subtype: u8,
    pub verbose: bool,
    pub app_id: String,
    pub context_id: String,
    pub payload: Vec<u8>,
    /// Human-readable payload attached by decoder plug-ins.
    pub decoded_text: Option<String>,
}

impl DltMessage {
    /// Decode one frame starting at its storage header. The slice must cover
    /// the entire frame; anything structurally off is an error and the frame
    /// counts as broken.
    pub fn parse(frame: &[u8]) -> Result<DltMessage> {
        ensure!(
            frame.len() >= FRAME_PREFIX_SIZE,
            "frame shorter than headers ({} bytes)",
            frame.len()
        );
        ensure!(frame[0..4] == STORAGE_MAGIC, "storage magic mismatch");

        let seconds = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let microseconds =
            i32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]).max(0) as u32;
        let mut ecu_id = id_string(&frame[12..16]);

        let htyp = frame[16];
        let counter = frame[17];
        let len = u16::from_be_bytes([frame[18], frame[19]]) as usize;
        ensure!(len >= STANDARD_HEADER_SIZE, "message length below header size");

        let end = STORAGE_HEADER_SIZE + len;
        ensure!(frame.len() >= end, "frame truncated ({} < {})", frame.len(), end);

        let endianness = if htyp & HTYP_MSBF != 0 {
            Endianness::Big
        } else {
            Endianness::Little
        };

        let mut off = FRAME_PREFIX_SIZE;
        if htyp & HTYP_WEID != 0 {
            ensure!(off + 4 <= end, "ECU id field truncated");
            ecu_id = id_string(&frame[off..off + 4]);
            off += 4;
        }
        if htyp & HTYP_WSID != 0 {
            ensure!(off + 4 <= end, "session id field truncated");
            off += 4;
        }
        if htyp & HTYP_WTMS != 0 {
            // device uptime; not consulted by the indexer
            ensure!(off + 4 <= end, "timestamp field truncated");
            off += 4;
        }

        let mut msg_type = MessageType::default();
        let mut subtype = 0;
        let mut verbose = false;
        let mut app_id = String::new();
        let mut context_id = String::new();
        if htyp & HTYP_UEH != 0 {
            ensure!(off + 10 <= end, "extended header truncated");
            let msin = frame[off];
            verbose = msin & 0x01 != 0;
            msg_type = MessageType::from_mstp((msin >> 1) & 0x07);
            subtype = (msin >> 4) & 0x0f;
            app_id = id_string(&frame[off + 2..off + 6]);
            context_id = id_string(&frame[off + 6..off + 10]);
            off += 10;
        }

        Ok(DltMessage {
            ecu_id,
            seconds,
            microseconds,
            counter,
            endianness,
            msg_type,
            subtype,
            verbose,
            app_id,
            context_id,
            payload: frame[off..end].to_vec(),
            decoded_text: None,
        })
    }

    /// True for control responses, the only messages the side channels look at.
    pub fn is_control_response(&self) -> bool {
        self.msg_type == MessageType::Control && self.subtype == CONTROL_RESPONSE
    }

    /// Service identifier of a control message: the first payload word,
    /// honoring the message's byte order.
    pub fn ctrl_service_id(&self) -> Option<u32> {
        if self.msg_type != MessageType::Control || self.payload.len() < 4 {
            return None;
        }
        let word = [self.payload[0], self.payload[1], self.payload[2], self.payload[3]];
        Some(match self.endianness {
            Endianness::Little => u32::from_le_bytes(word),
            Endianness::Big => u32::from_be_bytes(word),
        })
    }

    /// Read a 32-bit signed value out of the payload, honoring byte order.
    pub fn payload_i32(&self, offset: usize) -> Option<i32> {
        let bytes = self.payload.get(offset..offset + 4)?;
        let word = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Some(match self.endianness {
            Endianness::Little => i32::from_le_bytes(word),
            Endianness::Big => i32::from_be_bytes(word),
        })
    }

    /// Payload as text for filter matching: decoded form if a plug-in
    /// attached one, otherwise the escaped ASCII rendering.
    pub fn payload_text(&self) -> String {
        match &self.decoded_text {
            Some(text) => text.clone(),
            None => to_ascii(&self.payload),
        }
    }
}

/// Determine the full frame size (storage header included) from the first
/// [`FRAME_PREFIX_SIZE`] bytes of a frame.
pub fn frame_size_from_prefix(prefix: &[u8]) -> Result<usize> {
    if prefix.len() < FRAME_PREFIX_SIZE {
        bail!("frame prefix truncated");
    }
    let len = u16::from_be_bytes([prefix[18], prefix[19]]) as usize;
    Ok(STORAGE_HEADER_SIZE + len)
}

/// Render bytes as ASCII, escaping everything outside the printable range
/// as `\xNN`.
pub fn to_ascii(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        if (0x20..=0x7e).contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{b:02x}"));
        }
    }
    out
}

/// Four-character identifier: stops at the first NUL, non-printables become `?`.
pub fn id_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlt::testframe::FrameBuilder;

    #[test]
    fn test_parse_log_message() {
        let frame = FrameBuilder::new("ECU1")
            .time(1234, 567)
            .ids("APP1", "CTX1")
            .payload(b"hello world")
            .build();

        let msg = DltMessage::parse(&frame).unwrap();
        assert_eq!(msg.ecu_id, "ECU1");
        assert_eq!(msg.seconds, 1234);
        assert_eq!(msg.microseconds, 567);
        assert_eq!(msg.msg_type, MessageType::Log);
        assert_eq!(msg.app_id, "APP1");
        assert_eq!(msg.context_id, "CTX1");
        assert_eq!(msg.payload, b"hello world");
        assert_eq!(msg.endianness, Endianness::Little);
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut frame = FrameBuilder::new("ECU1").payload(b"x").build();
        frame[0] = b'X';
        assert!(DltMessage::parse(&frame).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_frame() {
        let frame = FrameBuilder::new("ECU1").payload(b"hello").build();
        assert!(DltMessage::parse(&frame[..frame.len() - 2]).is_err());
    }

    #[test]
    fn test_ctrl_service_id_respects_endianness() {
        let le = FrameBuilder::new("ECU1")
            .control_response()
            .payload(&0x13u32.to_le_bytes())
            .build();
        let msg = DltMessage::parse(&le).unwrap();
        assert_eq!(msg.ctrl_service_id(), Some(0x13));

        let be = FrameBuilder::new("ECU1")
            .control_response()
            .big_endian()
            .payload(&0x13u32.to_be_bytes())
            .build();
        let msg = DltMessage::parse(&be).unwrap();
        assert_eq!(msg.endianness, Endianness::Big);
        assert_eq!(msg.ctrl_service_id(), Some(0x13));
    }

    #[test]
    fn test_control_response_detection() {
        let frame = FrameBuilder::new("ECU1")
            .control_response()
            .payload(&SERVICE_TIMEZONE.to_le_bytes())
            .build();
        let msg = DltMessage::parse(&frame).unwrap();
        assert!(msg.is_control_response());
        assert_eq!(msg.msg_type, MessageType::Control);
    }

    #[test]
    fn test_frame_size_from_prefix() {
        let frame = FrameBuilder::new("ECU1").payload(b"abcdef").build();
        let size = frame_size_from_prefix(&frame[..FRAME_PREFIX_SIZE]).unwrap();
        assert_eq!(size, frame.len());
    }

    #[test]
    fn test_to_ascii_escapes_control_chars() {
        assert_eq!(to_ascii(b"ok"), "ok");
        assert_eq!(to_ascii(&[0x41, 0x00, 0x42]), "A\\x00B");
    }
}
