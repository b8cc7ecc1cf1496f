//! ACN root layer PDU (the RDMnet transport unit) and TCP stream reframing.
//!
//! Grounded on spec §3/§4.1/§6; the reassembly loop follows the same
//! "validate-then-slice-or-leave-as-remainder" shape as
//! `asayers-pcarp::internal::block_reader` reading fixed-size block headers
//! out of a growing buffer.

use crate::error::{DmxNetError, Result};
use uuid::Uuid;

pub const PREAMBLE_SIZE: u16 = 0x0010;
pub const POSTAMBLE_SIZE: u16 = 0x0000;
pub const ACN_PID: [u8; 12] = *b"ASC-E1.17\0\0\0";

/// Bytes before the root PDU proper (preamble size + postamble size + PID).
pub const PREAMBLE_BLOCK_LEN: usize = 16;
/// Minimum valid root PDU length (flags/len word + vector + CID).
pub const MIN_ROOT_PDU_LEN: usize = 22;

/// A decoded ACN root layer packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPacket {
    pub vector: u32,
    pub cid: [u8; 16],
    pub data: Vec<u8>,
}

/// Builds a complete ACN root-layer packet. Generates a random CID (UUID v4)
/// if none is supplied.
pub fn build_rdmnet_packet(vector: u32, data: &[u8], cid: Option<[u8; 16]>) -> Vec<u8> {
    let cid = cid.unwrap_or_else(|| *Uuid::new_v4().as_bytes());
    let root_pdu_len = MIN_ROOT_PDU_LEN + data.len();

    let mut buf = Vec::with_capacity(PREAMBLE_BLOCK_LEN + root_pdu_len);
    buf.extend_from_slice(&PREAMBLE_SIZE.to_be_bytes());
    buf.extend_from_slice(&POSTAMBLE_SIZE.to_be_bytes());
    buf.extend_from_slice(&ACN_PID);
    let flags_len = 0x7000u16 | (root_pdu_len as u16 & 0x0FFF);
    buf.extend_from_slice(&flags_len.to_be_bytes());
    buf.extend_from_slice(&vector.to_be_bytes());
    buf.extend_from_slice(&cid);
    buf.extend_from_slice(data);
    buf
}

/// Parses and strictly validates a single complete ACN root-layer packet.
/// Rejects trailing bytes, a bad flags nibble, a root PDU length below 22,
/// or a truncated buffer.
pub fn parse_rdmnet_packet(buf: &[u8]) -> Result<RootPacket> {
    validate_preamble(buf)?;
    if buf.len() < 18 {
        return Err(DmxNetError::range("root packet truncated before flags/length"));
    }
    let flags_len = u16::from_be_bytes([buf[16], buf[17]]);
    if flags_len >> 12 != 0x7 {
        return Err(DmxNetError::range("bad root flags nibble"));
    }
    let root_pdu_len = (flags_len & 0x0FFF) as usize;
    if root_pdu_len < MIN_ROOT_PDU_LEN {
        return Err(DmxNetError::range("root PDU length below minimum"));
    }
    let total = PREAMBLE_BLOCK_LEN + root_pdu_len;
    if buf.len() < total {
        return Err(DmxNetError::range("root packet truncated"));
    }
    if buf.len() > total {
        return Err(DmxNetError::range("trailing bytes after root packet"));
    }

    let vector = u32::from_be_bytes([buf[18], buf[19], buf[20], buf[21]]);
    let mut cid = [0u8; 16];
    cid.copy_from_slice(&buf[22..38]);
    let data = buf[38..total].to_vec();

    Ok(RootPacket { vector, cid, data })
}

fn validate_preamble(buf: &[u8]) -> Result<()> {
    if buf.len() < PREAMBLE_BLOCK_LEN {
        return Err(DmxNetError::range("root packet truncated before preamble end"));
    }
    if u16::from_be_bytes([buf[0], buf[1]]) != PREAMBLE_SIZE {
        return Err(DmxNetError::range("bad preamble size"));
    }
    if u16::from_be_bytes([buf[2], buf[3]]) != POSTAMBLE_SIZE {
        return Err(DmxNetError::range("bad postamble size"));
    }
    if buf[4..16] != ACN_PID {
        return Err(DmxNetError::range("bad ACN PID"));
    }
    Ok(())
}

/// Drains every complete ACN root packet from the front of `stream`,
/// returning them plus whatever partial tail remains. Framing corruption
/// (bad preamble/PID or bad flags nibble once enough bytes are present) is
/// an error; a merely-incomplete tail is not.
pub fn extract_rdmnet_packets(stream: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    let mut packets = Vec::new();
    let mut offset = 0usize;

    loop {
        let remaining = &stream[offset..];
        if remaining.len() < PREAMBLE_BLOCK_LEN {
            break;
        }
        validate_preamble(remaining)?;

        if remaining.len() < 18 {
            break;
        }
        let flags_len = u16::from_be_bytes([remaining[16], remaining[17]]);
        if flags_len >> 12 != 0x7 {
            return Err(DmxNetError::StreamFraming("bad root flags nibble".into()));
        }
        let root_pdu_len = (flags_len & 0x0FFF) as usize;
        if root_pdu_len < MIN_ROOT_PDU_LEN {
            return Err(DmxNetError::StreamFraming("root PDU length below minimum".into()));
        }
        let total = PREAMBLE_BLOCK_LEN + root_pdu_len;
        if remaining.len() < total {
            break;
        }
        packets.push(remaining[..total].to_vec());
        offset += total;
    }

    Ok((packets, stream[offset..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = vec![1, 2, 3, 4, 5];
        let cid = [7u8; 16];
        let bytes = build_rdmnet_packet(0x1, &data, Some(cid));
        let parsed = parse_rdmnet_packet(&bytes).unwrap();
        assert_eq!(parsed.vector, 0x1);
        assert_eq!(parsed.cid, cid);
        assert_eq!(parsed.data, data);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = build_rdmnet_packet(0x1, &[1, 2, 3], None);
        bytes.push(0xFF);
        assert!(parse_rdmnet_packet(&bytes).is_err());
    }

    #[test]
    fn reframing_is_total_for_n_packets() {
        let a = build_rdmnet_packet(0x1, &[1, 2, 3], Some([1u8; 16]));
        let b = build_rdmnet_packet(0x2, &[4, 5, 6, 7], Some([2u8; 16]));
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        let (packets, remainder) = extract_rdmnet_packets(&stream).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(remainder.is_empty());
        assert_eq!(packets[0], a);
        assert_eq!(packets[1], b);
    }

    #[test]
    fn partial_tail_is_remainder() {
        let a = build_rdmnet_packet(0x1, &[1, 2, 3], Some([1u8; 16]));
        let b = build_rdmnet_packet(0x2, &[4, 5, 6, 7], Some([2u8; 16]));
        let mut stream = a.clone();
        stream.extend_from_slice(&b[..b.len() - 1]);

        let (packets, remainder) = extract_rdmnet_packets(&stream).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0], a);
        assert_eq!(remainder.len(), b.len() - 1);
    }

    #[test]
    fn corrupt_preamble_is_an_error() {
        let mut a = build_rdmnet_packet(0x1, &[1, 2, 3], None);
        a[0] = 0xFF;
        assert!(extract_rdmnet_packets(&a).is_err());
    }

    #[test]
    fn corrupt_flags_nibble_is_an_error() {
        let mut a = build_rdmnet_packet(0x1, &[1, 2, 3], None);
        a[16] = 0x00; // zero out the upper-nibble-0x7 flags
        assert!(extract_rdmnet_packets(&a).is_err());
    }
}
