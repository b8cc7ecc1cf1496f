//! E1.20 RDM frame encode/decode.
//!
//! Layout and validation rules per spec §3/§4.1/§6. There is no directly
//! analogous file in the teacher repo (it only parses Art-Net/sACN), so this
//! follows the same builder/parser pairing style as `wire::artnet` and
//! `wire::sacn`, grounded on the checksum/length-field idioms in
//! `asayers-pcarp`'s `block` parsers.

use crate::error::{DmxNetError, Result};
use crate::uid::Uid;

pub const START_CODE: u8 = 0xCC;
pub const SUB_START_CODE: u8 = 0x01;

/// Fixed bytes before parameter data: start, sub-start, length, dst uid(6),
/// src uid(6), transaction, port-id, message count, sub-device(2), command
/// class, pid(2), pdl.
pub const FIXED_HEADER_LEN: usize = 24;
pub const MAX_PDL: usize = 231;

/// An E1.20 RDM frame, request or response (the `port_id` field doubles as
/// `response_type` on responses, per spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdmFrame {
    pub destination: Uid,
    pub source: Uid,
    pub transaction_number: u8,
    pub port_id: u8,
    pub message_count: u8,
    pub sub_device: u16,
    pub command_class: u8,
    pub pid: u16,
    pub parameter_data: Vec<u8>,
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u32, |acc, &b| acc + b as u32) as u16
}

/// Encodes an RDM frame, appending the big-endian checksum.
pub fn encode(frame: &RdmFrame) -> Result<Vec<u8>> {
    if frame.parameter_data.len() > MAX_PDL {
        return Err(DmxNetError::range(format!(
            "RDM PDL {} exceeds max {}",
            frame.parameter_data.len(),
            MAX_PDL
        )));
    }

    let pdl = frame.parameter_data.len();
    let message_length = (FIXED_HEADER_LEN + pdl) as u8;

    let mut buf = Vec::with_capacity(FIXED_HEADER_LEN + pdl + 2);
    buf.push(START_CODE);
    buf.push(SUB_START_CODE);
    buf.push(message_length);
    buf.extend_from_slice(&frame.destination.to_bytes());
    buf.extend_from_slice(&frame.source.to_bytes());
    buf.push(frame.transaction_number);
    buf.push(frame.port_id);
    buf.push(frame.message_count);
    buf.extend_from_slice(&frame.sub_device.to_be_bytes());
    buf.push(frame.command_class);
    buf.extend_from_slice(&frame.pid.to_be_bytes());
    buf.push(pdl as u8);
    buf.extend_from_slice(&frame.parameter_data);

    let sum = checksum(&buf);
    buf.extend_from_slice(&sum.to_be_bytes());
    Ok(buf)
}

/// Decodes and validates an RDM frame per spec §4.1: checks start codes,
/// message-length bounds, PDL bound, and checksum.
pub fn decode(buf: &[u8]) -> Result<RdmFrame> {
    if buf.len() < FIXED_HEADER_LEN + 2 {
        return Err(DmxNetError::range("invalid length"));
    }
    if buf[0] != START_CODE || buf[1] != SUB_START_CODE {
        return Err(DmxNetError::range("invalid start code"));
    }

    let message_length = buf[2] as usize;
    if message_length < FIXED_HEADER_LEN || message_length + 2 > buf.len() {
        return Err(DmxNetError::range("invalid length"));
    }

    let destination = Uid::from_bytes(&buf[3..9])?;
    let source = Uid::from_bytes(&buf[9..15])?;
    let transaction_number = buf[15];
    let port_id = buf[16];
    let message_count = buf[17];
    let sub_device = u16::from_be_bytes([buf[18], buf[19]]);
    let command_class = buf[20];
    let pid = u16::from_be_bytes([buf[21], buf[22]]);
    let pdl = buf[23] as usize;

    if pdl > MAX_PDL || FIXED_HEADER_LEN + pdl > message_length {
        return Err(DmxNetError::range("invalid PDL"));
    }

    let parameter_data = buf[24..24 + pdl].to_vec();

    let expected = checksum(&buf[..message_length]);
    let actual = u16::from_be_bytes([buf[message_length], buf[message_length + 1]]);
    if expected != actual {
        return Err(DmxNetError::range("checksum mismatch"));
    }

    Ok(RdmFrame {
        destination,
        source,
        transaction_number,
        port_id,
        message_count,
        sub_device,
        command_class,
        pid,
        parameter_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> RdmFrame {
        RdmFrame {
            destination: Uid::new(0x6574, 0x00000001),
            source: Uid::new(0x6574, 0x00000002),
            transaction_number: 5,
            port_id: 1,
            message_count: 0,
            sub_device: 0,
            command_class: 0x20, // GET_COMMAND
            pid: 0x0060,         // DEVICE_INFO
            parameter_data: vec![1, 2, 3, 4],
        }
    }

    #[test]
    fn round_trips() {
        let frame = sample_frame();
        let bytes = encode(&frame).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn checksum_matches_byte_sum() {
        let frame = sample_frame();
        let bytes = encode(&frame).unwrap();
        let message_length = bytes[2] as usize;
        let expected: u32 = bytes[..message_length].iter().map(|&b| b as u32).sum();
        let actual = u16::from_be_bytes([bytes[message_length], bytes[message_length + 1]]);
        assert_eq!(expected as u16, actual);
    }

    #[test]
    fn rejects_bad_start_code() {
        let mut bytes = encode(&sample_frame()).unwrap();
        bytes[0] = 0x00;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut bytes = encode(&sample_frame()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_pdl_too_large() {
        let mut frame = sample_frame();
        frame.parameter_data = vec![0u8; 232];
        assert!(encode(&frame).is_err());
    }

    #[test]
    fn rejects_truncated_buffer() {
        let bytes = encode(&sample_frame()).unwrap();
        assert!(decode(&bytes[..10]).is_err());
    }
}
