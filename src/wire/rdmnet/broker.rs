//! RDMnet Broker message codec (spec §3/§6).

use crate::error::{BrokerStatusCode, DmxNetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BrokerVector {
    ConnectRequest = 1,
    ConnectReply = 2,
    ClientBindRequest = 3,
    ClientBindReply = 4,
    Heartbeat = 5,
    Disconnect = 6,
    ClientListRequest = 7,
    ClientListReply = 8,
    EndpointListRequest = 9,
    EndpointListReply = 10,
}

impl BrokerVector {
    fn from_u32(v: u32) -> Result<Self> {
        use BrokerVector::*;
        Ok(match v {
            1 => ConnectRequest,
            2 => ConnectReply,
            3 => ClientBindRequest,
            4 => ClientBindReply,
            5 => Heartbeat,
            6 => Disconnect,
            7 => ClientListRequest,
            8 => ClientListReply,
            9 => EndpointListRequest,
            10 => EndpointListReply,
            other => return Err(DmxNetError::BrokerDecode(format!("unknown broker vector {other}"))),
        })
    }
}

/// Client role, as this crate's internal RDMnet profile defines it (spec §9:
/// treat as exact per this library, not an ESTA registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    Device = 0,
    Controller = 1,
}

impl Role {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Role::Device),
            1 => Ok(Role::Controller),
            other => Err(DmxNetError::BrokerDecode(format!("invalid role {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub sequence: u32,
    pub role: Role,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReply {
    pub sequence: u32,
    pub status_code: BrokerStatusCode,
    pub client_id: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBindRequest {
    pub sequence: u32,
    pub endpoint_id: u16,
    pub requested_role: Role,
    pub profiles: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBindReply {
    pub sequence: u32,
    pub status_code: BrokerStatusCode,
    pub endpoint_id: u16,
    pub negotiated_role: Role,
    pub negotiated_profile: u16,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub sequence: u32,
    pub reason: u16,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientListReply {
    pub sequence: u32,
    pub status: u16,
    pub client_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointListReply {
    pub sequence: u32,
    pub status: u16,
    pub endpoints: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerMessage {
    ConnectRequest(ConnectRequest),
    ConnectReply(ConnectReply),
    ClientBindRequest(ClientBindRequest),
    ClientBindReply(ClientBindReply),
    Heartbeat { sequence: u32 },
    Disconnect(Disconnect),
    ClientListRequest { sequence: u32 },
    ClientListReply(ClientListReply),
    EndpointListRequest { sequence: u32 },
    EndpointListReply(EndpointListReply),
}

impl BrokerMessage {
    pub fn sequence(&self) -> u32 {
        match self {
            BrokerMessage::ConnectRequest(m) => m.sequence,
            BrokerMessage::ConnectReply(m) => m.sequence,
            BrokerMessage::ClientBindRequest(m) => m.sequence,
            BrokerMessage::ClientBindReply(m) => m.sequence,
            BrokerMessage::Heartbeat { sequence } => *sequence,
            BrokerMessage::Disconnect(m) => m.sequence,
            BrokerMessage::ClientListRequest { sequence } => *sequence,
            BrokerMessage::ClientListReply(m) => m.sequence,
            BrokerMessage::EndpointListRequest { sequence } => *sequence,
            BrokerMessage::EndpointListReply(m) => m.sequence,
        }
    }
}

fn write_u8_list(buf: &mut Vec<u8>, items: &[u16]) -> Result<()> {
    if items.len() > 255 {
        return Err(DmxNetError::range("list exceeds 255 entries"));
    }
    buf.push(items.len() as u8);
    for &item in items {
        buf.extend_from_slice(&item.to_be_bytes());
    }
    Ok(())
}

pub fn encode(msg: &BrokerMessage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match msg {
        BrokerMessage::ConnectRequest(m) => {
            buf.extend_from_slice(&(BrokerVector::ConnectRequest as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.push(m.role as u8);
            buf.push(0); // reserved
            let scope_bytes = m.scope.as_bytes();
            buf.extend_from_slice(&(scope_bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(scope_bytes);
        }
        BrokerMessage::ConnectReply(m) => {
            buf.extend_from_slice(&(BrokerVector::ConnectReply as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&(m.status_code as u16).to_be_bytes());
            buf.extend_from_slice(&m.client_id.to_be_bytes());
            buf.extend_from_slice(m.text.as_bytes());
        }
        BrokerMessage::ClientBindRequest(m) => {
            buf.extend_from_slice(&(BrokerVector::ClientBindRequest as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.endpoint_id.to_be_bytes());
            buf.push(m.requested_role as u8);
            write_u8_list(&mut buf, &m.profiles)?;
        }
        BrokerMessage::ClientBindReply(m) => {
            buf.extend_from_slice(&(BrokerVector::ClientBindReply as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&(m.status_code as u16).to_be_bytes());
            buf.extend_from_slice(&m.endpoint_id.to_be_bytes());
            buf.push(m.negotiated_role as u8);
            buf.push(0); // reserved
            buf.extend_from_slice(&m.negotiated_profile.to_be_bytes());
            let text_bytes = m.text.as_bytes();
            buf.extend_from_slice(&(text_bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(text_bytes);
        }
        BrokerMessage::Heartbeat { sequence } => {
            buf.extend_from_slice(&(BrokerVector::Heartbeat as u32).to_be_bytes());
            buf.extend_from_slice(&sequence.to_be_bytes());
        }
        BrokerMessage::Disconnect(m) => {
            buf.extend_from_slice(&(BrokerVector::Disconnect as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.reason.to_be_bytes());
            let text_bytes = m.text.as_bytes();
            buf.extend_from_slice(&(text_bytes.len() as u16).to_be_bytes());
            buf.extend_from_slice(text_bytes);
        }
        BrokerMessage::ClientListRequest { sequence } => {
            buf.extend_from_slice(&(BrokerVector::ClientListRequest as u32).to_be_bytes());
            buf.extend_from_slice(&sequence.to_be_bytes());
        }
        BrokerMessage::ClientListReply(m) => {
            buf.extend_from_slice(&(BrokerVector::ClientListReply as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.status.to_be_bytes());
            if m.client_ids.len() > 255 {
                return Err(DmxNetError::range("client list exceeds 255 entries"));
            }
            buf.push(m.client_ids.len() as u8);
            for id in &m.client_ids {
                buf.extend_from_slice(&id.to_be_bytes());
            }
        }
        BrokerMessage::EndpointListRequest { sequence } => {
            buf.extend_from_slice(&(BrokerVector::EndpointListRequest as u32).to_be_bytes());
            buf.extend_from_slice(&sequence.to_be_bytes());
        }
        BrokerMessage::EndpointListReply(m) => {
            buf.extend_from_slice(&(BrokerVector::EndpointListReply as u32).to_be_bytes());
            buf.extend_from_slice(&m.sequence.to_be_bytes());
            buf.extend_from_slice(&m.status.to_be_bytes());
            write_u8_list(&mut buf, &m.endpoints)?;
        }
    }
    Ok(buf)
}

fn require_len(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.len() < len {
        Err(DmxNetError::BrokerDecode(format!("{what}: buffer too short")))
    } else {
        Ok(())
    }
}

fn status_code(v: u16) -> Result<BrokerStatusCode> {
    BrokerStatusCode::from_u16(v).ok_or_else(|| DmxNetError::BrokerDecode(format!("invalid status code {v}")))
}

pub fn decode(buf: &[u8]) -> Result<BrokerMessage> {
    require_len(buf, 8, "broker message")?;
    let vector_raw = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let vector = BrokerVector::from_u32(vector_raw)?;
    let sequence = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let rest = &buf[8..];

    match vector {
        BrokerVector::ConnectRequest => {
            require_len(rest, 4, "ConnectRequest")?;
            let role = Role::from_u8(rest[0])?;
            if rest[1] != 0 {
                return Err(DmxNetError::BrokerDecode("reserved byte must be 0".into()));
            }
            let scope_len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            let scope_bytes = &rest[4..];
            if scope_bytes.len() != scope_len {
                return Err(DmxNetError::BrokerDecode("scope length mismatch".into()));
            }
            let scope = String::from_utf8_lossy(scope_bytes).to_string();
            Ok(BrokerMessage::ConnectRequest(ConnectRequest {
                sequence,
                role,
                scope,
            }))
        }
        BrokerVector::ConnectReply => {
            require_len(rest, 6, "ConnectReply")?;
            let status = status_code(u16::from_be_bytes([rest[0], rest[1]]))?;
            let client_id = u32::from_be_bytes([rest[2], rest[3], rest[4], rest[5]]);
            let text = String::from_utf8_lossy(&rest[6..]).to_string();
            Ok(BrokerMessage::ConnectReply(ConnectReply {
                sequence,
                status_code: status,
                client_id,
                text,
            }))
        }
        BrokerVector::ClientBindRequest => {
            require_len(rest, 4, "ClientBindRequest")?;
            let endpoint_id = u16::from_be_bytes([rest[0], rest[1]]);
            let requested_role = Role::from_u8(rest[2])?;
            let count = rest[3] as usize;
            let profile_bytes = &rest[4..];
            if profile_bytes.len() != count * 2 {
                return Err(DmxNetError::BrokerDecode("profile count mismatch".into()));
            }
            let profiles = profile_bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Ok(BrokerMessage::ClientBindRequest(ClientBindRequest {
                sequence,
                endpoint_id,
                requested_role,
                profiles,
            }))
        }
        BrokerVector::ClientBindReply => {
            require_len(rest, 9, "ClientBindReply")?;
            let status = status_code(u16::from_be_bytes([rest[0], rest[1]]))?;
            let endpoint_id = u16::from_be_bytes([rest[2], rest[3]]);
            let negotiated_role = Role::from_u8(rest[4])?;
            if rest[5] != 0 {
                return Err(DmxNetError::BrokerDecode("reserved byte must be 0".into()));
            }
            let negotiated_profile = u16::from_be_bytes([rest[6], rest[7]]);
            require_len(rest, 10, "ClientBindReply text length")?;
            let text_len = u16::from_be_bytes([rest[8], rest[9]]) as usize;
            let text_bytes = &rest[10..];
            if text_bytes.len() != text_len {
                return Err(DmxNetError::BrokerDecode("text length mismatch".into()));
            }
            let text = String::from_utf8_lossy(text_bytes).to_string();
            Ok(BrokerMessage::ClientBindReply(ClientBindReply {
                sequence,
                status_code: status,
                endpoint_id,
                negotiated_role,
                negotiated_profile,
                text,
            }))
        }
        BrokerVector::Heartbeat => {
            if !rest.is_empty() {
                return Err(DmxNetError::BrokerDecode("Heartbeat must be exactly 8 bytes".into()));
            }
            Ok(BrokerMessage::Heartbeat { sequence })
        }
        BrokerVector::Disconnect => {
            require_len(rest, 4, "Disconnect")?;
            let reason = u16::from_be_bytes([rest[0], rest[1]]);
            let text_len = u16::from_be_bytes([rest[2], rest[3]]) as usize;
            let text_bytes = &rest[4..];
            if text_bytes.len() != text_len {
                return Err(DmxNetError::BrokerDecode("text length mismatch".into()));
            }
            let text = String::from_utf8_lossy(text_bytes).to_string();
            Ok(BrokerMessage::Disconnect(Disconnect {
                sequence,
                reason,
                text,
            }))
        }
        BrokerVector::ClientListRequest => {
            if !rest.is_empty() {
                return Err(DmxNetError::BrokerDecode(
                    "ClientListRequest must be exactly 8 bytes".into(),
                ));
            }
            Ok(BrokerMessage::ClientListRequest { sequence })
        }
        BrokerVector::ClientListReply => {
            require_len(rest, 3, "ClientListReply")?;
            let status = u16::from_be_bytes([rest[0], rest[1]]);
            let count = rest[2] as usize;
            let id_bytes = &rest[3..];
            if id_bytes.len() != count * 4 {
                return Err(DmxNetError::BrokerDecode("client id count mismatch".into()));
            }
            let client_ids = id_bytes
                .chunks_exact(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            Ok(BrokerMessage::ClientListReply(ClientListReply {
                sequence,
                status,
                client_ids,
            }))
        }
        BrokerVector::EndpointListRequest => {
            if !rest.is_empty() {
                return Err(DmxNetError::BrokerDecode(
                    "EndpointListRequest must be exactly 8 bytes".into(),
                ));
            }
            Ok(BrokerMessage::EndpointListRequest { sequence })
        }
        BrokerVector::EndpointListReply => {
            require_len(rest, 3, "EndpointListReply")?;
            let status = u16::from_be_bytes([rest[0], rest[1]]);
            let count = rest[2] as usize;
            let endpoint_bytes = &rest[3..];
            if endpoint_bytes.len() != count * 2 {
                return Err(DmxNetError::BrokerDecode("endpoint count mismatch".into()));
            }
            let endpoints = endpoint_bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Ok(BrokerMessage::EndpointListReply(EndpointListReply {
                sequence,
                status,
                endpoints,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_request_round_trips() {
        let msg = BrokerMessage::ConnectRequest(ConnectRequest {
            sequence: 1,
            role: Role::Controller,
            scope: "default".into(),
        });
        let bytes = encode(&msg).unwrap();
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn connect_reply_round_trips_happy_path() {
        let msg = BrokerMessage::ConnectReply(ConnectReply {
            sequence: 1,
            status_code: BrokerStatusCode::Ok,
            client_id: 99,
            text: String::new(),
        });
        let bytes = encode(&msg).unwrap();
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn bind_request_reply_round_trip() {
        let req = BrokerMessage::ClientBindRequest(ClientBindRequest {
            sequence: 2,
            endpoint_id: 1,
            requested_role: Role::Controller,
            profiles: vec![],
        });
        assert_eq!(decode(&encode(&req).unwrap()).unwrap(), req);

        let reply = BrokerMessage::ClientBindReply(ClientBindReply {
            sequence: 2,
            status_code: BrokerStatusCode::Ok,
            endpoint_id: 1,
            negotiated_role: Role::Controller,
            negotiated_profile: 0x0100,
            text: String::new(),
        });
        assert_eq!(decode(&encode(&reply).unwrap()).unwrap(), reply);
    }

    #[test]
    fn heartbeat_is_exactly_8_bytes() {
        let msg = BrokerMessage::Heartbeat { sequence: 42 };
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn rejects_unknown_vector() {
        let mut buf = vec![0u8; 8];
        buf[3] = 99;
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn rejects_trailing_bytes_on_heartbeat() {
        let mut bytes = encode(&BrokerMessage::Heartbeat { sequence: 1 }).unwrap();
        bytes.push(0);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_invalid_role() {
        let mut bytes = encode(&BrokerMessage::ConnectRequest(ConnectRequest {
            sequence: 1,
            role: Role::Controller,
            scope: "x".into(),
        }))
        .unwrap();
        bytes[8] = 9; // invalid role byte
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn connect_reply_mapped_to_invalid_scope_scenario() {
        let msg = BrokerMessage::ConnectReply(ConnectReply {
            sequence: 5,
            status_code: BrokerStatusCode::InvalidScope,
            client_id: 0,
            text: "bad scope".into(),
        });
        let bytes = encode(&msg).unwrap();
        let decoded = decode(&bytes).unwrap();
        match decoded {
            BrokerMessage::ConnectReply(r) => {
                assert_eq!(r.status_code, BrokerStatusCode::InvalidScope)
            }
            _ => panic!("wrong variant"),
        }
    }
}
