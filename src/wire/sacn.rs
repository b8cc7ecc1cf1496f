//! sACN (ANSI E1.31) packet builder + parser.
//!
//! Offsets are grounded on
//! `examples/kaelenfae-LXMonitor/src-tauri/src/network/sacn.rs`; this module
//! additionally builds packets (the teacher only parses) and validates every
//! fixed field strictly on parse, per spec §4.1.

use crate::error::{DmxNetError, Result};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

pub const SACN_PORT: u16 = 5568;

/// "ASC-E1.17\0\0\0"
pub const ACN_PACKET_IDENTIFIER: [u8; 12] = [
    0x41, 0x53, 0x43, 0x2d, 0x45, 0x31, 0x2e, 0x31, 0x37, 0x00, 0x00, 0x00,
];

const ROOT_VECTOR_DATA: u32 = 0x0000_0004;
const FRAMING_VECTOR_DMP: u32 = 0x0000_0002;
const DMP_VECTOR_SET_PROPERTY: u8 = 0x02;
const DMP_ADDRESS_TYPE: u8 = 0xA1;

pub const HEADER_LEN: usize = 126;
pub const PACKET_LEN: usize = 638; // 126 header + 513 payload (start code + 512 slots)

pub const DEFAULT_PRIORITY: u8 = 100;

/// Computes the sACN multicast group `239.255.<hi>.<lo>` for a universe.
/// Universe 0 is invalid; the special test universe 64214 is permitted
/// (spec §3).
pub fn multicast_group(universe: u16) -> Result<Ipv4Addr> {
    crate::universe::validate_universe_id(universe)?;
    Ok(Ipv4Addr::new(
        239,
        255,
        (universe >> 8) as u8,
        (universe & 0xFF) as u8,
    ))
}

/// Either a sparse percentage map (0..100 per channel) or a raw DMX byte
/// buffer, matching spec §4.1's "payload representation".
#[derive(Debug, Clone)]
pub enum Payload<'a> {
    /// 1-based channel -> percentage in `[0,100]`.
    Percent(&'a BTreeMap<u16, u8>),
    /// Raw DMX bytes, index 0 = channel 1.
    Raw(&'a [u8]),
}

/// Options for building an sACN data packet.
#[derive(Debug, Clone)]
pub struct PacketOptions {
    pub universe: u16,
    pub sequence: u8,
    pub source_name: String,
    pub priority: u8,
    pub sync_address: u16,
    pub options: u8,
    pub cid: [u8; 16],
    /// When true, `Payload::Percent` values are used directly (clamped to
    /// `[0,255]`) instead of being scaled from a percentage.
    pub use_raw_dmx_values: bool,
}

impl Default for PacketOptions {
    fn default() -> Self {
        Self {
            universe: 1,
            sequence: 0,
            source_name: String::new(),
            priority: DEFAULT_PRIORITY,
            sync_address: 0,
            options: 0,
            cid: [0; 16],
            use_raw_dmx_values: false,
        }
    }
}

fn scale_percent(pct: u8, use_raw: bool) -> u8 {
    if use_raw {
        pct
    } else {
        let pct = pct.min(100) as u32;
        ((pct * 255) / 100) as u8
    }
}

/// Builds a 638-byte sACN data packet.
pub fn build_packet(opts: &PacketOptions, payload: &Payload<'_>) -> Result<Vec<u8>> {
    crate::universe::validate_universe_id(opts.universe)?;

    let mut slots = [0u8; 512];
    match payload {
        Payload::Percent(map) => {
            for (&channel, &value) in map.iter() {
                if channel < 1 || channel > 512 {
                    return Err(DmxNetError::range(format!(
                        "sACN channel {channel} out of range [1,512]"
                    )));
                }
                slots[(channel - 1) as usize] = scale_percent(value, opts.use_raw_dmx_values);
            }
        }
        Payload::Raw(bytes) => {
            let len = bytes.len().min(512);
            slots[..len].copy_from_slice(&bytes[..len]);
        }
    }

    let mut buf = Vec::with_capacity(PACKET_LEN);

    // Root layer.
    buf.extend_from_slice(&0x0010u16.to_be_bytes()); // preamble size
    buf.extend_from_slice(&0x0000u16.to_be_bytes()); // postamble size
    buf.extend_from_slice(&ACN_PACKET_IDENTIFIER);
    let root_pdu_len = PACKET_LEN - 16; // everything after preamble/postamble/PID
    buf.extend_from_slice(&(0x7000 | (root_pdu_len as u16 & 0x0FFF)).to_be_bytes());
    buf.extend_from_slice(&ROOT_VECTOR_DATA.to_be_bytes());
    buf.extend_from_slice(&opts.cid);

    // Framing layer.
    let framing_pdu_len = PACKET_LEN - 38;
    buf.extend_from_slice(&(0x7000 | (framing_pdu_len as u16 & 0x0FFF)).to_be_bytes());
    buf.extend_from_slice(&FRAMING_VECTOR_DMP.to_be_bytes());
    let mut name_bytes = opts.source_name.as_bytes().to_vec();
    name_bytes.truncate(63);
    name_bytes.resize(64, 0);
    buf.extend_from_slice(&name_bytes);
    buf.push(opts.priority);
    buf.extend_from_slice(&opts.sync_address.to_be_bytes());
    buf.push(opts.sequence);
    buf.push(opts.options);
    buf.extend_from_slice(&opts.universe.to_be_bytes());

    // DMP layer.
    let dmp_pdu_len = PACKET_LEN - 115;
    buf.extend_from_slice(&(0x7000 | (dmp_pdu_len as u16 & 0x0FFF)).to_be_bytes());
    buf.push(DMP_VECTOR_SET_PROPERTY);
    buf.push(DMP_ADDRESS_TYPE);
    buf.extend_from_slice(&0u16.to_be_bytes()); // first address
    buf.extend_from_slice(&1u16.to_be_bytes()); // address increment
    buf.extend_from_slice(&0x0201u16.to_be_bytes()); // property value count (513)
    buf.push(0); // start code
    buf.extend_from_slice(&slots);

    debug_assert_eq!(buf.len(), PACKET_LEN);
    Ok(buf)
}

/// A decoded sACN data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub cid: [u8; 16],
    pub source_name: String,
    pub priority: u8,
    pub sync_address: u16,
    pub sequence: u8,
    pub options: u8,
    pub universe: u16,
    pub start_code: u8,
    pub data: Vec<u8>,
}

fn assert_field(cond: bool, what: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(DmxNetError::range(format!("sACN packet: {what}")))
    }
}

/// Parses and strictly validates a 638-byte sACN data packet, per spec
/// §4.1: "the constructor asserts every fixed field".
pub fn parse_packet(buf: &[u8]) -> Result<Packet> {
    if buf.len() < HEADER_LEN + 1 {
        return Err(DmxNetError::NotThisProtocol);
    }
    if &buf[4..16] != ACN_PACKET_IDENTIFIER {
        return Err(DmxNetError::NotThisProtocol);
    }

    assert_field(u16::from_be_bytes([buf[0], buf[1]]) == 0x0010, "bad preamble size")?;
    assert_field(u16::from_be_bytes([buf[2], buf[3]]) == 0x0000, "bad postamble size")?;

    let root_flags_len = u16::from_be_bytes([buf[16], buf[17]]);
    assert_field(root_flags_len >> 12 == 0x7, "bad root flags nibble")?;

    let root_vector = u32::from_be_bytes([buf[18], buf[19], buf[20], buf[21]]);
    assert_field(root_vector == ROOT_VECTOR_DATA, "unexpected root vector")?;

    let mut cid = [0u8; 16];
    cid.copy_from_slice(&buf[22..38]);

    let framing_flags_len = u16::from_be_bytes([buf[38], buf[39]]);
    assert_field(framing_flags_len >> 12 == 0x7, "bad framing flags nibble")?;

    let framing_vector = u32::from_be_bytes([buf[40], buf[41], buf[42], buf[43]]);
    assert_field(framing_vector == FRAMING_VECTOR_DMP, "unexpected framing vector")?;

    let source_name = extract_string(&buf[44..108]);
    let priority = buf[108];
    let sync_address = u16::from_be_bytes([buf[109], buf[110]]);
    let sequence = buf[111];
    let options = buf[112];
    let universe = u16::from_be_bytes([buf[113], buf[114]]);

    let dmp_flags_len = u16::from_be_bytes([buf[115], buf[116]]);
    assert_field(dmp_flags_len >> 12 == 0x7, "bad DMP flags nibble")?;

    let dmp_vector = buf[117];
    assert_field(dmp_vector == DMP_VECTOR_SET_PROPERTY, "unexpected DMP vector")?;

    let address_type = buf[118];
    assert_field(address_type == DMP_ADDRESS_TYPE, "unexpected DMP address/data type")?;

    let first_address = u16::from_be_bytes([buf[119], buf[120]]);
    assert_field(first_address == 0, "unexpected DMP first address")?;

    let address_increment = u16::from_be_bytes([buf[121], buf[122]]);
    assert_field(address_increment == 1, "unexpected DMP address increment")?;

    let property_count = u16::from_be_bytes([buf[123], buf[124]]) as usize;

    let start_code = buf[125];
    assert_field(start_code == 0, "unexpected DMX start code")?;

    let dmx_len = property_count.saturating_sub(1).min(512).min(buf.len() - 126);
    let data = buf[126..126 + dmx_len].to_vec();

    Ok(Packet {
        cid,
        source_name,
        priority,
        sync_address,
        sequence,
        options,
        universe,
        start_code,
        data,
    })
}

fn extract_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multicast_group_scenarios() {
        assert_eq!(multicast_group(256).unwrap(), Ipv4Addr::new(239, 255, 1, 0));
        assert_eq!(multicast_group(1).unwrap(), Ipv4Addr::new(239, 255, 0, 1));
        assert!(multicast_group(0).is_err());
    }

    #[test]
    fn encode_scenario_from_spec() {
        let mut payload = BTreeMap::new();
        payload.insert(1u16, 100u8);
        payload.insert(2u16, 50u8);

        let opts = PacketOptions {
            universe: 1,
            sequence: 7,
            source_name: "node-dmx-test".to_string(),
            priority: 120,
            ..Default::default()
        };
        let bytes = build_packet(&opts, &Payload::Percent(&payload)).unwrap();

        assert_eq!(bytes.len(), 638);
        assert_eq!(bytes[108], 120);
        assert_eq!(bytes[111], 7);
        assert_eq!(&bytes[113..115], &[0x00, 0x01]);
        assert_eq!(bytes[126], 255);
        assert_eq!(bytes[127], 127);
    }

    #[test]
    fn round_trip_raw_payload() {
        let mut raw = vec![0u8; 512];
        raw[0] = 10;
        raw[511] = 20;
        let opts = PacketOptions {
            universe: 42,
            sequence: 3,
            source_name: "src".into(),
            ..Default::default()
        };
        let bytes = build_packet(&opts, &Payload::Raw(&raw)).unwrap();
        let parsed = parse_packet(&bytes).unwrap();
        assert_eq!(parsed.universe, 42);
        assert_eq!(parsed.sequence, 3);
        assert_eq!(parsed.source_name, "src");
        assert_eq!(parsed.data, raw);
        assert_eq!(parsed.start_code, 0);
    }

    #[test]
    fn parse_rejects_bad_identifier() {
        let bytes = vec![0u8; 638];
        assert!(matches!(parse_packet(&bytes), Err(DmxNetError::NotThisProtocol)));
    }

    #[test]
    fn parse_rejects_corrupt_fixed_field() {
        let opts = PacketOptions {
            universe: 1,
            source_name: "x".into(),
            ..Default::default()
        };
        let mut bytes = build_packet(&opts, &Payload::Raw(&[])).unwrap();
        bytes[125] = 1; // start code must be 0
        assert!(parse_packet(&bytes).is_err());
    }

    #[test]
    fn source_name_truncated_to_64_bytes() {
        let long_name = "x".repeat(100);
        let opts = PacketOptions {
            universe: 1,
            source_name: long_name,
            ..Default::default()
        };
        let bytes = build_packet(&opts, &Payload::Raw(&[])).unwrap();
        assert_eq!(&bytes[44..108].len(), &64);
        assert_eq!(bytes[107], 0);
    }
}
