//! RDMnet broker transport: TCP (optionally TLS) connect, and the stream
//! reassembly buffer (spec §4.7 "Transport" / "Stream reassembly").
//!
//! The TLS stack itself is an external collaborator: this module sequences
//! the handshake but the caller supplies the `TlsConnector`/`ServerName`,
//! including whatever certificate verification policy
//! `requireTlsAuthorization` should imply.

use tokio::io::{split, AsyncReadExt, AsyncWriteExt, ReadHalf as IoReadHalf, WriteHalf as IoWriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{DmxNetError, Result};
use crate::wire::acn_root;

/// Default RDMnet broker reassembly buffer cap (spec §4.7).
pub const DEFAULT_STREAM_BUFFER_CAP: usize = 1024 * 1024;

/// Default RDMnet broker TCP port.
pub const RDMNET_DEFAULT_PORT: u16 = 8888;

#[cfg(feature = "tls")]
#[derive(Clone)]
pub struct TlsConfig {
    pub connector: tokio_rustls::TlsConnector,
    pub server_name: rustls_pki_types::ServerName<'static>,
}

pub enum TransportKind {
    Plain,
    #[cfg(feature = "tls")]
    Tls(TlsConfig),
}

/// A connected broker transport. Both variants are `Unpin`.
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// The read half of a split [`Stream`].
pub enum ReadHalf {
    Tcp(OwnedReadHalf),
    #[cfg(feature = "tls")]
    Tls(IoReadHalf<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// The write half of a split [`Stream`].
pub enum WriteHalf {
    Tcp(OwnedWriteHalf),
    #[cfg(feature = "tls")]
    Tls(IoWriteHalf<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl ReadHalf {
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ReadHalf::Tcp(s) => s.read(buf).await,
            #[cfg(feature = "tls")]
            ReadHalf::Tls(s) => s.read(buf).await,
        }
    }
}

impl WriteHalf {
    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            WriteHalf::Tcp(s) => s.write_all(buf).await,
            #[cfg(feature = "tls")]
            WriteHalf::Tls(s) => s.write_all(buf).await,
        }
    }
}

impl Stream {
    pub fn set_nodelay(&self, value: bool) -> std::io::Result<()> {
        match self {
            Stream::Tcp(s) => s.set_nodelay(value),
            #[cfg(feature = "tls")]
            Stream::Tls(s) => s.get_ref().0.set_nodelay(value),
        }
    }

    /// Splits into independent read/write halves so one task can read and
    /// write concurrently without both borrowing the same value at once.
    /// `TcpStream` has its own owned split; the TLS stream (already
    /// `AsyncRead + AsyncWrite`) uses `tokio::io::split`.
    pub fn split(self) -> (ReadHalf, WriteHalf) {
        match self {
            Stream::Tcp(s) => {
                let (r, w) = s.into_split();
                (ReadHalf::Tcp(r), WriteHalf::Tcp(w))
            }
            #[cfg(feature = "tls")]
            Stream::Tls(s) => {
                let (r, w) = split(*s);
                (ReadHalf::Tls(r), WriteHalf::Tls(w))
            }
        }
    }
}

/// Opens a TCP connection to `(host, port)` and, for `TransportKind::Tls`,
/// completes the TLS handshake on top of it.
pub async fn connect(host: &str, port: u16, kind: TransportKind) -> Result<Stream> {
    let tcp = TcpStream::connect((host, port)).await?;
    match kind {
        TransportKind::Plain => Ok(Stream::Tcp(tcp)),
        #[cfg(feature = "tls")]
        TransportKind::Tls(cfg) => {
            let tls = cfg.connector.connect(cfg.server_name, tcp).await?;
            Ok(Stream::Tls(Box::new(tls)))
        }
    }
}

/// Accumulates inbound bytes and drains complete ACN root packets out of
/// them, enforcing the stream reassembly size cap.
pub struct ReassemblyBuffer {
    buf: Vec<u8>,
    cap: usize,
}

impl ReassemblyBuffer {
    pub fn new(cap: usize) -> Self {
        Self { buf: Vec::new(), cap }
    }

    /// Appends `chunk`. Returns a `StreamFraming` error (without mutating
    /// the retained buffer) if the cap would be exceeded; callers must tear
    /// the connection down when this happens.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.buf.len() + chunk.len() > self.cap {
            return Err(DmxNetError::StreamFraming(format!(
                "stream reassembly buffer exceeded {} byte cap",
                self.cap
            )));
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Drains every complete packet currently buffered, retaining any
    /// partial tail. Framing corruption is propagated as an error.
    pub fn drain_packets(&mut self) -> Result<Vec<Vec<u8>>> {
        let (packets, remainder) = acn_root::extract_rdmnet_packets(&self.buf)?;
        self.buf = remainder;
        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain_round_trips_a_packet() {
        let mut buffer = ReassemblyBuffer::new(DEFAULT_STREAM_BUFFER_CAP);
        let packet = acn_root::build_rdmnet_packet(1, &[1, 2, 3], Some([9u8; 16]));
        buffer.push(&packet[..5]).unwrap();
        assert!(buffer.drain_packets().unwrap().is_empty());
        buffer.push(&packet[5..]).unwrap();
        let drained = buffer.drain_packets().unwrap();
        assert_eq!(drained, vec![packet]);
    }

    #[test]
    fn push_rejects_once_cap_exceeded() {
        let mut buffer = ReassemblyBuffer::new(8);
        assert!(buffer.push(&[0u8; 9]).is_err());
    }

    #[test]
    fn corrupt_stream_surfaces_as_error_on_drain() {
        let mut buffer = ReassemblyBuffer::new(DEFAULT_STREAM_BUFFER_CAP);
        let mut packet = acn_root::build_rdmnet_packet(1, &[1, 2, 3], None);
        packet[0] = 0xFF;
        buffer.push(&packet).unwrap();
        assert!(buffer.drain_packets().is_err());
    }
}
