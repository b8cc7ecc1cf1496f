//! Structured errors shared by every codec and session component.
//!
//! Every error carries a stable `domain()` and `code()` pair per spec §7, so
//! callers can match on machine-readable identifiers instead of message text.

use thiserror::Error;

/// Error domain, used for routing/telemetry by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Range,
    Broker,
    Rpt,
    Ept,
    Llrp,
    Transport,
    Timeout,
    Protocol,
}

impl ErrorDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorDomain::Range => "range",
            ErrorDomain::Broker => "broker",
            ErrorDomain::Rpt => "rpt",
            ErrorDomain::Ept => "ept",
            ErrorDomain::Llrp => "llrp",
            ErrorDomain::Transport => "transport",
            ErrorDomain::Timeout => "timeout",
            ErrorDomain::Protocol => "protocol",
        }
    }
}

/// Broker status codes from a `ConnectReply`/`ClientBindReply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BrokerStatusCode {
    Ok = 0,
    Rejected = 1,
    InvalidScope = 2,
    Unauthorized = 3,
    AlreadyConnected = 4,
    InvalidRequest = 5,
}

impl BrokerStatusCode {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::Rejected),
            2 => Some(Self::InvalidScope),
            3 => Some(Self::Unauthorized),
            4 => Some(Self::AlreadyConnected),
            5 => Some(Self::InvalidRequest),
            _ => None,
        }
    }
}

/// The single error type returned by this crate's fallible operations.
#[derive(Debug, Error)]
pub enum DmxNetError {
    /// A value was outside the range a protocol or data type requires.
    #[error("range error: {0}")]
    Range(String),

    /// The buffer did not start with this codec's header/opcode at all -
    /// distinct from a malformed buffer that *does* match but is corrupt.
    #[error("buffer does not match this protocol")]
    NotThisProtocol,

    /// Broker message framing/contents failed to decode.
    #[error("broker decode error: {0}")]
    BrokerDecode(String),

    /// RPT message framing/contents failed to decode.
    #[error("rpt decode error: {0}")]
    RptDecode(String),

    /// EPT message framing/contents failed to decode.
    #[error("ept decode error: {0}")]
    EptDecode(String),

    /// LLRP message framing/contents failed to decode.
    #[error("llrp decode error: {0}")]
    LlrpDecode(String),

    /// The inbound stream buffer exceeded its cap; the connection must be
    /// torn down.
    #[error("stream framing error: {0}")]
    StreamFraming(String),

    /// The broker rejected a connect or bind request with a non-Ok status.
    #[error("broker rejected request: status={status:?}")]
    BrokerStatus {
        status: BrokerStatusCode,
        text: String,
    },

    /// Negotiated role did not match the requested role under strict
    /// negotiation.
    #[error("negotiated role {negotiated} does not match requested role {requested}")]
    NegotiationRoleMismatch { requested: u8, negotiated: u8 },

    /// Negotiated profile was not one of the requested profiles under
    /// strict negotiation.
    #[error("negotiated profile {negotiated:#06x} not in requested set")]
    NegotiationProfileMismatch { negotiated: u16 },

    /// A waiter's deadline elapsed before a matching packet arrived.
    #[error("response timed out")]
    ResponseTimeout,

    /// The socket was closed while a waiter was still pending.
    #[error("socket closed")]
    SocketClosed,

    /// An I/O error from the underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else that doesn't fit a more specific variant.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl DmxNetError {
    pub fn range(msg: impl Into<String>) -> Self {
        DmxNetError::Range(msg.into())
    }

    pub fn domain(&self) -> ErrorDomain {
        match self {
            DmxNetError::Range(_) | DmxNetError::NotThisProtocol => ErrorDomain::Range,
            DmxNetError::BrokerDecode(_) | DmxNetError::BrokerStatus { .. } => ErrorDomain::Broker,
            DmxNetError::RptDecode(_) => ErrorDomain::Rpt,
            DmxNetError::EptDecode(_) => ErrorDomain::Ept,
            DmxNetError::LlrpDecode(_) => ErrorDomain::Llrp,
            DmxNetError::StreamFraming(_) | DmxNetError::SocketClosed | DmxNetError::Io(_) => {
                ErrorDomain::Transport
            }
            DmxNetError::NegotiationRoleMismatch { .. }
            | DmxNetError::NegotiationProfileMismatch { .. } => ErrorDomain::Protocol,
            DmxNetError::ResponseTimeout => ErrorDomain::Timeout,
            DmxNetError::Protocol(_) => ErrorDomain::Protocol,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DmxNetError::Range(_) | DmxNetError::NotThisProtocol => "RANGE_ERROR",
            DmxNetError::BrokerDecode(_) => "BROKER_DECODE_ERROR",
            DmxNetError::RptDecode(_) => "RPT_DECODE_ERROR",
            DmxNetError::EptDecode(_) => "EPT_DECODE_ERROR",
            DmxNetError::LlrpDecode(_) => "LLRP_DECODE_ERROR",
            DmxNetError::StreamFraming(_) => "STREAM_FRAMING_ERROR",
            DmxNetError::BrokerStatus { status, .. } => match status {
                BrokerStatusCode::Rejected => "BROKER_REJECTED",
                BrokerStatusCode::InvalidScope => "BROKER_INVALID_SCOPE",
                BrokerStatusCode::Unauthorized => "BROKER_UNAUTHORIZED",
                BrokerStatusCode::AlreadyConnected => "BROKER_ALREADY_CONNECTED",
                BrokerStatusCode::InvalidRequest => "BROKER_INVALID_REQUEST",
                BrokerStatusCode::Ok => "PROTOCOL_ERROR",
            },
            DmxNetError::NegotiationRoleMismatch { .. } => "NEGOTIATION_ROLE_MISMATCH",
            DmxNetError::NegotiationProfileMismatch { .. } => "NEGOTIATION_PROFILE_MISMATCH",
            DmxNetError::ResponseTimeout => "RESPONSE_TIMEOUT",
            DmxNetError::SocketClosed => "SOCKET_CLOSED",
            DmxNetError::Io(_) => "PROTOCOL_ERROR",
            DmxNetError::Protocol(_) => "PROTOCOL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, DmxNetError>;

/// Maps a broker `statusCode` field to the appropriate error, per spec §7.
pub fn broker_status_error(status: u16, text: impl Into<String>) -> DmxNetError {
    match BrokerStatusCode::from_u16(status) {
        Some(status @ BrokerStatusCode::Ok) => {
            DmxNetError::Protocol(format!("unexpected Ok status in error path: {status:?}"))
        }
        Some(status) => DmxNetError::BrokerStatus {
            status,
            text: text.into(),
        },
        None => DmxNetError::BrokerDecode(format!("unknown status code {status}")),
    }
}
