//! LLRP (low-level recovery protocol) message codec (spec §3/§4.6/§6).

use crate::error::{DmxNetError, Result};
use crate::uid::Uid;
use crate::wire::rdm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum LlrpVector {
    ProbeRequest = 1,
    ProbeReply = 2,
    RdmCommand = 3,
    RdmResponse = 4,
}

impl LlrpVector {
    fn from_u32(v: u32) -> Result<Self> {
        use LlrpVector::*;
        Ok(match v {
            1 => ProbeRequest,
            2 => ProbeReply,
            3 => RdmCommand,
            4 => RdmResponse,
            other => return Err(DmxNetError::LlrpDecode(format!("unknown llrp vector {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub sequence: u32,
    pub lower_uid: Uid,
    pub upper_uid: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReply {
    pub sequence: u32,
    pub target_uid: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlrpRdm {
    pub sequence: u32,
    pub target_uid: Uid,
    pub rdm_frame: rdm::RdmFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlrpMessage {
    ProbeRequest(ProbeRequest),
    ProbeReply(ProbeReply),
    RdmCommand(LlrpRdm),
    RdmResponse(LlrpRdm),
}

impl LlrpMessage {
    pub fn sequence(&self) -> u32 {
        match self {
            LlrpMessage::ProbeRequest(m) => m.sequence,
            LlrpMessage::ProbeReply(m) => m.sequence,
            LlrpMessage::RdmCommand(m) | LlrpMessage::RdmResponse(m) => m.sequence,
        }
    }
}

fn encode_rdm_variant(vector: LlrpVector, m: &LlrpRdm) -> Result<Vec<u8>> {
    let rdm_bytes = rdm::encode(&m.rdm_frame)?;
    let mut buf = Vec::new();
    buf.extend_from_slice(&(vector as u32).to_be_bytes());
    buf.extend_from_slice(&m.sequence.to_be_bytes());
    buf.extend_from_slice(&m.target_uid.to_bytes());
    buf.extend_from_slice(&(rdm_bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(&rdm_bytes);
    Ok(buf)
}

pub fn encode(msg: &LlrpMessage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match msg {
        LlrpMessage::ProbeRequest(m) => {
            buf.extend_from_slice(&(LlrpVector::ProbeRequest as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.lower_uid.to_bytes());
            buf.extend_from_slice(&m.upper_uid.to_bytes());
        }
        LlrpMessage::ProbeReply(m) => {
            buf.extend_from_slice(&(LlrpVector::ProbeReply as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.target_uid.to_bytes());
        }
        LlrpMessage::RdmCommand(m) => return encode_rdm_variant(LlrpVector::RdmCommand, m),
        LlrpMessage::RdmResponse(m) => return encode_rdm_variant(LlrpVector::RdmResponse, m),
    }
    Ok(buf)
}

fn require_exact(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.len() != len {
        Err(DmxNetError::LlrpDecode(format!("{what}: expected {len} bytes, got {}", buf.len())))
    } else {
        Ok(())
    }
}

pub fn decode(buf: &[u8]) -> Result<LlrpMessage> {
    if buf.len() < 8 {
        return Err(DmxNetError::LlrpDecode("llrp message: buffer too short".into()));
    }
    let vector_raw = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let vector = LlrpVector::from_u32(vector_raw)?;
    let sequence = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let rest = &buf[8..];

    match vector {
        LlrpVector::ProbeRequest => {
            require_exact(rest, 12, "ProbeRequest")?;
            let lower_uid = Uid::from_bytes(&rest[0..6])?;
            let upper_uid = Uid::from_bytes(&rest[6..12])?;
            Ok(LlrpMessage::ProbeRequest(ProbeRequest {
                sequence,
                lower_uid,
                upper_uid,
            }))
        }
        LlrpVector::ProbeReply => {
            require_exact(rest, 6, "ProbeReply")?;
            let target_uid = Uid::from_bytes(rest)?;
            Ok(LlrpMessage::ProbeReply(ProbeReply {
                sequence,
                target_uid,
            }))
        }
        LlrpVector::RdmCommand => Ok(LlrpMessage::RdmCommand(decode_rdm_variant(sequence, rest)?)),
        LlrpVector::RdmResponse => Ok(LlrpMessage::RdmResponse(decode_rdm_variant(sequence, rest)?)),
    }
}

fn decode_rdm_variant(sequence: u32, rest: &[u8]) -> Result<LlrpRdm> {
    if rest.len() < 8 {
        return Err(DmxNetError::LlrpDecode("llrp rdm message: buffer too short".into()));
    }
    let target_uid = Uid::from_bytes(&rest[0..6])?;
    let rdm_len = u16::from_be_bytes([rest[6], rest[7]]) as usize;
    let rdm_bytes = &rest[8..];
    if rdm_bytes.len() != rdm_len {
        return Err(DmxNetError::LlrpDecode("rdm length mismatch".into()));
    }
    let rdm_frame = rdm::decode(rdm_bytes)?;
    Ok(LlrpRdm {
        sequence,
        target_uid,
        rdm_frame,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_request_round_trips_at_exact_length() {
        let msg = LlrpMessage::ProbeRequest(ProbeRequest {
            sequence: 1,
            lower_uid: Uid::MIN,
            upper_uid: Uid::MAX,
        });
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn probe_reply_round_trips_at_exact_length() {
        let msg = LlrpMessage::ProbeReply(ProbeReply {
            sequence: 2,
            target_uid: Uid::new(0x6574, 0x01),
        });
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.len(), 14);
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn rdm_command_round_trips() {
        let frame = rdm::RdmFrame {
            destination: Uid::new(1, 1),
            source: Uid::new(1, 2),
            transaction_number: 0,
            port_id: 1,
            message_count: 0,
            sub_device: 0,
            command_class: 0x10,
            pid: 0x0001,
            parameter_data: vec![],
        };
        let msg = LlrpMessage::RdmCommand(LlrpRdm {
            sequence: 3,
            target_uid: frame.destination,
            rdm_frame: frame,
        });
        assert_eq!(decode(&encode(&msg).unwrap()).unwrap(), msg);
    }

    #[test]
    fn rejects_wrong_length_probe_request() {
        let mut bytes = encode(&LlrpMessage::ProbeRequest(ProbeRequest {
            sequence: 1,
            lower_uid: Uid::MIN,
            upper_uid: Uid::MAX,
        }))
        .unwrap();
        bytes.push(0);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_vector() {
        let mut buf = vec![0u8; 8];
        buf[3] = 99;
        assert!(decode(&buf).is_err());
    }
}
