//! EPT (extensible payload transport over RDMnet) message codec (spec §3/§6).

use crate::error::{DmxNetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum EptVector {
    Data = 1,
    Status = 2,
}

impl EptVector {
    fn from_u32(v: u32) -> Result<Self> {
        match v {
            1 => Ok(EptVector::Data),
            2 => Ok(EptVector::Status),
            other => Err(DmxNetError::EptDecode(format!("unknown ept vector {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EptData {
    pub sequence: u32,
    pub manufacturer_id: u16,
    pub protocol_id: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EptStatus {
    pub sequence: u32,
    pub status: u16,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EptMessage {
    Data(EptData),
    Status(EptStatus),
}

impl EptMessage {
    pub fn sequence(&self) -> u32 {
        match self {
            EptMessage::Data(m) => m.sequence,
            EptMessage::Status(m) => m.sequence,
        }
    }
}

pub fn encode(msg: &EptMessage) -> Vec<u8> {
    let mut buf = Vec::new();
    match msg {
        EptMessage::Data(m) => {
            buf.extend_from_slice(&(EptVector::Data as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.manufacturer_id.to_be_bytes());
            buf.extend_from_slice(&m.protocol_id.to_be_bytes());
            buf.extend_from_slice(&(m.payload.len() as u32).to_be_bytes());
            buf.extend_from_slice(&m.payload);
        }
        EptMessage::Status(m) => {
            buf.extend_from_slice(&(EptVector::Status as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.status.to_be_bytes());
            let text_bytes = m.text.as_bytes();
            buf.extend_from_slice(&(text_bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(text_bytes);
        }
    }
    buf
}

fn require_len(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.len() < len {
        Err(DmxNetError::EptDecode(format!("{what}: buffer too short")))
    } else {
        Ok(())
    }
}

pub fn decode(buf: &[u8]) -> Result<EptMessage> {
    require_len(buf, 8, "ept message")?;
    let vector_raw = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let vector = EptVector::from_u32(vector_raw)?;
    let sequence = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let rest = &buf[8..];

    match vector {
        EptVector::Data => {
            require_len(rest, 8, "EPT Data")?;
            let manufacturer_id = u16::from_be_bytes([rest[0], rest[1]]);
            let protocol_id = u16::from_be_bytes([rest[2], rest[3]]);
            let payload_len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
            let payload_bytes = &rest[8..];
            if payload_bytes.len() != payload_len {
                return Err(DmxNetError::EptDecode("payload length mismatch".into()));
            }
            Ok(EptMessage::Data(EptData {
                sequence,
                manufacturer_id,
                protocol_id,
                payload: payload_bytes.to_vec(),
            }))
        }
        EptVector::Status => {
            require_len(rest, 4, "EPT Status")?;
            let status = u16::from_be_bytes([rest[0], rest[1]]);
            let text_len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            let text_bytes = &rest[4..];
            if text_bytes.len() != text_len {
                return Err(DmxNetError::EptDecode("text length mismatch".into()));
            }
            Ok(EptMessage::Status(EptStatus {
                sequence,
                status,
                text: String::from_utf8_lossy(text_bytes).to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_round_trips() {
        let msg = EptMessage::Data(EptData {
            sequence: 1,
            manufacturer_id: 0x6574,
            protocol_id: 1,
            payload: vec![1, 2, 3, 4, 5],
        });
        assert_eq!(decode(&encode(&msg)).unwrap(), msg);
    }

    #[test]
    fn status_round_trips() {
        let msg = EptMessage::Status(EptStatus {
            sequence: 2,
            status: 1,
            text: "unsupported protocol".into(),
        });
        assert_eq!(decode(&encode(&msg)).unwrap(), msg);
    }

    #[test]
    fn rejects_payload_length_mismatch() {
        let mut bytes = encode(&EptMessage::Data(EptData {
            sequence: 1,
            manufacturer_id: 1,
            protocol_id: 1,
            payload: vec![1, 2, 3],
        }));
        bytes.truncate(bytes.len() - 1);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_vector() {
        let mut buf = vec![0u8; 8];
        buf[3] = 99;
        assert!(decode(&buf).is_err());
    }
}
