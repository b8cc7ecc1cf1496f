//! RPT (RDM transport over RDMnet) message codec (spec §3/§6).
//!
//! RPT vector numbering here is this crate's own internal profile, not a
//! reconciliation against the ESTA RPT vector registry (see DESIGN.md).

use crate::error::{DmxNetError, Result};
use crate::uid::Uid;
use crate::wire::rdm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum RptVector {
    Status = 1,
    RdmCommand = 2,
    RdmResponse = 3,
    EndpointAdvertisement = 4,
    EndpointAdvertisementAck = 5,
}

impl RptVector {
    fn from_u32(v: u32) -> Result<Self> {
        use RptVector::*;
        Ok(match v {
            1 => Status,
            2 => RdmCommand,
            3 => RdmResponse,
            4 => EndpointAdvertisement,
            5 => EndpointAdvertisementAck,
            other => return Err(DmxNetError::RptDecode(format!("unknown rpt vector {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RptStatus {
    pub sequence: u32,
    pub status: u16,
    pub text: String,
}

/// RDM command or response carried over RPT. The outer UID pair must equal
/// the embedded RDM frame's destination/source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RptRdm {
    pub sequence: u32,
    pub endpoint_id: u16,
    pub outer_destination: Uid,
    pub outer_source: Uid,
    pub rdm_frame: rdm::RdmFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAdvertisement {
    pub sequence: u32,
    pub endpoint_id: u16,
    pub role: u8,
    pub profiles: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAdvertisementAck {
    pub sequence: u32,
    pub endpoint_id: u16,
    pub accepted: bool,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RptMessage {
    Status(RptStatus),
    RdmCommand(RptRdm),
    RdmResponse(RptRdm),
    EndpointAdvertisement(EndpointAdvertisement),
    EndpointAdvertisementAck(EndpointAdvertisementAck),
}

impl RptMessage {
    pub fn sequence(&self) -> u32 {
        match self {
            RptMessage::Status(m) => m.sequence,
            RptMessage::RdmCommand(m) | RptMessage::RdmResponse(m) => m.sequence,
            RptMessage::EndpointAdvertisement(m) => m.sequence,
            RptMessage::EndpointAdvertisementAck(m) => m.sequence,
        }
    }
}

fn encode_rdm_variant(vector: RptVector, m: &RptRdm) -> Result<Vec<u8>> {
    let rdm_bytes = rdm::encode(&m.rdm_frame)?;
    if m.outer_destination != m.rdm_frame.destination || m.outer_source != m.rdm_frame.source {
        return Err(DmxNetError::RptDecode(
            "outer UIDs do not match embedded RDM frame".into(),
        ));
    }
    let mut buf = Vec::new();
    buf.extend_from_slice(&(vector as u32).to_be_bytes());
    buf.extend_from_slice(&m.sequence.to_be_bytes());
    buf.extend_from_slice(&m.endpoint_id.to_be_bytes());
    buf.extend_from_slice(&(rdm_bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(&m.outer_destination.to_bytes());
    buf.extend_from_slice(&m.outer_source.to_bytes());
    buf.extend_from_slice(&rdm_bytes);
    Ok(buf)
}

pub fn encode(msg: &RptMessage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match msg {
        RptMessage::Status(m) => {
            buf.extend_from_slice(&(RptVector::Status as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.status.to_be_bytes());
            let text_bytes = m.text.as_bytes();
            buf.extend_from_slice(&(text_bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(text_bytes);
        }
        RptMessage::RdmCommand(m) => return encode_rdm_variant(RptVector::RdmCommand, m),
        RptMessage::RdmResponse(m) => return encode_rdm_variant(RptVector::RdmResponse, m),
        RptMessage::EndpointAdvertisement(m) => {
            buf.extend_from_slice(&(RptVector::EndpointAdvertisement as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.endpoint_id.to_be_bytes());
            buf.push(m.role);
            if m.profiles.len() > 255 {
                return Err(DmxNetError::range("profile list exceeds 255 entries"));
            }
            buf.push(m.profiles.len() as u8);
            for p in &m.profiles {
                buf.extend_from_slice(&p.to_be_bytes());
            }
        }
        RptMessage::EndpointAdvertisementAck(m) => {
            buf.extend_from_slice(&(RptVector::EndpointAdvertisementAck as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.endpoint_id.to_be_bytes());
            buf.push(m.accepted as u8);
            buf.extend_from_slice(&m.status.to_be_bytes());
        }
    }
    Ok(buf)
}

fn require_len(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.len() < len {
        Err(DmxNetError::RptDecode(format!("{what}: buffer too short")))
    } else {
        Ok(())
    }
}

fn decode_rdm_variant(sequence: u32, rest: &[u8]) -> Result<RptRdm> {
    require_len(rest, 16, "RPT RDM message")?;
    let endpoint_id = u16::from_be_bytes([rest[0], rest[1]]);
    let rdm_len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
    let outer_destination = Uid::from_bytes(&rest[4..10])?;
    let outer_source = Uid::from_bytes(&rest[10..16])?;
    let rdm_bytes = &rest[16..];
    if rdm_bytes.len() != rdm_len {
        return Err(DmxNetError::RptDecode("rdm length mismatch".into()));
    }
    let rdm_frame = rdm::decode(rdm_bytes)?;
    if outer_destination != rdm_frame.destination || outer_source != rdm_frame.source {
        return Err(DmxNetError::RptDecode(
            "outer UIDs do not match embedded RDM frame".into(),
        ));
    }
    Ok(RptRdm {
        sequence,
        endpoint_id,
        outer_destination,
        outer_source,
        rdm_frame,
    })
}

pub fn decode(buf: &[u8]) -> Result<RptMessage> {
    require_len(buf, 8, "rpt message")?;
    let vector_raw = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let vector = RptVector::from_u32(vector_raw)?;
    let sequence = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let rest = &buf[8..];

    match vector {
        RptVector::Status => {
            require_len(rest, 4, "RPT Status")?;
            let status = u16::from_be_bytes([rest[0], rest[1]]);
            let text_len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            let text_bytes = &rest[4..];
            if text_bytes.len() != text_len {
                return Err(DmxNetError::RptDecode("text length mismatch".into()));
            }
            Ok(RptMessage::Status(RptStatus {
                sequence,
                status,
                text: String::from_utf8_lossy(text_bytes).to_string(),
            }))
        }
        RptVector::RdmCommand => Ok(RptMessage::RdmCommand(decode_rdm_variant(sequence, rest)?)),
        RptVector::RdmResponse => Ok(RptMessage::RdmResponse(decode_rdm_variant(sequence, rest)?)),
        RptVector::EndpointAdvertisement => {
            require_len(rest, 4, "RPT EndpointAdvertisement")?;
            let endpoint_id = u16::from_be_bytes([rest[0], rest[1]]);
            let role = rest[2];
            let count = rest[3] as usize;
            let profile_bytes = &rest[4..];
            if profile_bytes.len() != count * 2 {
                return Err(DmxNetError::RptDecode("profile count mismatch".into()));
            }
            let profiles = profile_bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Ok(RptMessage::EndpointAdvertisement(EndpointAdvertisement {
                sequence,
                endpoint_id,
                role,
                profiles,
            }))
        }
        RptVector::EndpointAdvertisementAck => {
            if rest.len() != 5 {
                return Err(DmxNetError::RptDecode(
                    "EndpointAdvertisementAck must be exactly 13 bytes".into(),
                ));
            }
            let endpoint_id = u16::from_be_bytes([rest[0], rest[1]]);
            let accepted = rest[2] != 0;
            let status = u16::from_be_bytes([rest[3], rest[4]]);
            Ok(RptMessage::EndpointAdvertisementAck(EndpointAdvertisementAck {
                sequence,
                endpoint_id,
                accepted,
                status,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rdm() -> rdm::RdmFrame {
        rdm::RdmFrame {
            destination: Uid::new(1, 1),
            source: Uid::new(1, 2),
            transaction_number: 0,
            port_id: 1,
            message_count: 0,
            sub_device: 0,
            command_class: 0x20,
            pid: 0x0060,
            parameter_data: vec![],
        }
    }

    #[test]
    fn status_round_trips() {
        let msg = RptMessage::Status(RptStatus {
            sequence: 1,
            status: 0,
            text: "ok".into(),
        });
        assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);
    }

    #[test]
    fn rdm_command_round_trips() {
        let frame = sample_rdm();
        let msg = RptMessage::RdmCommand(RptRdm {
            sequence: 7,
            endpoint_id: 1,
            outer_destination: frame.destination,
            outer_source: frame.source,
            rdm_frame: frame,
        });
        assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);
    }

    #[test]
    fn rejects_mismatched_outer_uids_on_encode() {
        let frame = sample_rdm();
        let msg = RptMessage::RdmCommand(RptRdm {
            sequence: 7,
            endpoint_id: 1,
            outer_destination: Uid::new(9, 9),
            outer_source: frame.source,
            rdm_frame: frame,
        });
        assert!(encode(&msg).is_err());
    }

    #[test]
    fn rejects_mismatched_outer_uids_on_decode() {
        let frame = sample_rdm();
        let good = RptMessage::RdmCommand(RptRdm {
            sequence: 7,
            endpoint_id: 1,
            outer_destination: frame.destination,
            outer_source: frame.source,
            rdm_frame: frame,
        });
        let mut bytes = encode(&good).unwrap();
        // corrupt the outer destination UID in place
        bytes[12] ^= 0xFF;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn endpoint_advertisement_round_trips() {
        let msg = RptMessage::EndpointAdvertisement(EndpointAdvertisement {
            sequence: 1,
            endpoint_id: 1,
            role: 1,
            profiles: vec![0x0100, 0x0200],
        });
        assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);
    }

    #[test]
    fn endpoint_advertisement_ack_is_exactly_13_bytes() {
        let msg = RptMessage::EndpointAdvertisementAck(EndpointAdvertisementAck {
            sequence: 1,
            endpoint_id: 1,
            accepted: true,
            status: 0,
        });
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.len(), 13);
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn rejects_unknown_vector() {
        let mut buf = vec![0u8; 8];
        buf[3] = 99;
        assert!(decode(&buf).is_err());
    }
}
