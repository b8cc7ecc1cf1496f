//! Art-Net RDM client and E1.20 binary-split discovery (spec §4.6).

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

use crate::error::{DmxNetError, Result};
use crate::uid::Uid;
use crate::wire::artnet::{self, ARTNET_PORT};
use crate::wire::rdm::{self, RdmFrame};

#[derive(Debug, Clone)]
pub struct ArtNetRdmClientConfig {
    pub destination_host: Ipv4Addr,
    pub destination_port: u16,
    pub bind_address: Ipv4Addr,
    pub net: u8,
    pub address: u8,
}

impl Default for ArtNetRdmClientConfig {
    fn default() -> Self {
        Self {
            destination_host: Ipv4Addr::new(255, 255, 255, 255),
            destination_port: ARTNET_PORT,
            bind_address: Ipv4Addr::UNSPECIFIED,
            net: 0,
            address: 0,
        }
    }
}

/// An Art-Net transport for RDM and TOD traffic: sends requests and waits
/// for responses on the same UDP socket.
pub struct ArtNetRdmClient {
    socket: UdpSocket,
    destination: SocketAddr,
    config: ArtNetRdmClientConfig,
    transaction_number: u8,
}

impl ArtNetRdmClient {
    pub async fn bind(config: ArtNetRdmClientConfig) -> Result<Self> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        raw.set_broadcast(true)?;
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(config.bind_address, 0));
        raw.bind(&bind_addr.into())?;
        raw.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = raw.into();
        let socket = UdpSocket::from_std(std_socket)?;
        let destination = SocketAddr::V4(SocketAddrV4::new(
            config.destination_host,
            config.destination_port,
        ));

        Ok(Self {
            socket,
            destination,
            config,
            transaction_number: 0,
        })
    }

    /// Sends an ArtTodRequest and collects every ArtTodData reply received
    /// within `timeout_duration`, returning the concatenated UID list.
    pub async fn get_tod(&self, timeout_duration: Duration) -> Result<Vec<Uid>> {
        let bytes = artnet::build_art_tod_request(self.config.net, &[self.config.address]);
        self.socket.send_to(&bytes, self.destination).await?;

        let mut uids = Vec::new();
        let deadline = Instant::now() + timeout_duration;
        let mut buf = vec![0u8; 1500];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, _))) => {
                    if let Ok(tod) = artnet::parse_art_tod_data(&buf[..len]) {
                        uids.extend(tod.uids);
                    }
                }
                _ => break,
            }
        }
        Ok(uids)
    }

    /// Sends `request` (without its RDM transaction number pre-filled here -
    /// callers set it) wrapped in ArtRdm and awaits at most one decodable
    /// RDM response.
    pub async fn rdm_transaction(
        &mut self,
        request: &RdmFrame,
        timeout_duration: Duration,
    ) -> Result<RdmFrame> {
        self.transaction_number = self.transaction_number.wrapping_add(1);
        let mut request = request.clone();
        request.transaction_number = self.transaction_number;

        let rdm_bytes = rdm::encode(&request)?;
        let art_bytes = artnet::build_art_rdm(self.config.net, self.config.address, &rdm_bytes);
        self.socket.send_to(&art_bytes, self.destination).await?;

        let mut buf = vec![0u8; 1500];
        let (len, _) = timeout(timeout_duration, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| DmxNetError::ResponseTimeout)??;

        let art_rdm = artnet::parse_art_rdm(&buf[..len])?;
        rdm::decode(&art_rdm.rdm_frame)
    }
}

/// The pluggable transport `discover_devices` drives: E1.20 discovery
/// commands framed however the underlying medium requires, plus decoded
/// manchester-masked DISC_UNIQUE_BRANCH responses.
#[async_trait]
pub trait DiscoveryTransport: Send {
    /// Sends a DISC_UNIQUE_BRANCH(lo, hi) and returns every raw response
    /// frame observed within a reasonable window (still in the
    /// 7x0xFE-preamble + 0xAA-separator + masked-UID wire form).
    async fn send_discovery_unique_branch(&mut self, lo: Uid, hi: Uid) -> Result<Vec<Vec<u8>>>;

    /// Mutes `uid`. Transports with a native DISC_MUTE helper use it;
    /// others fall back to an RDM request.
    async fn send_mute(&mut self, uid: Uid) -> Result<()>;

    /// Unmutes `uid` (DISC_UN_MUTE).
    async fn send_unmute(&mut self, uid: Uid) -> Result<()>;
}

/// Decodes one DISC_UNIQUE_BRANCH response frame per the E1.20
/// manchester-like convention: 7 bytes of `0xFE`, a `0xAA` separator, 12
/// masked UID bytes, then 4 masked checksum bytes. Returns `None` if the
/// preamble isn't present (no device responded in this slot) and a range
/// error if the preamble is present but the checksum doesn't validate.
pub fn decode_discovery_response(frame: &[u8]) -> Result<Option<Uid>> {
    let mut offset = 0;
    while offset < frame.len() && frame[offset] == 0xFE {
        offset += 1;
    }
    if offset == 0 || offset > 7 {
        return Ok(None);
    }
    if frame.len() < offset + 1 || frame[offset] != 0xAA {
        return Ok(None);
    }
    let body_start = offset + 1;
    if frame.len() < body_start + 16 {
        return Err(DmxNetError::range("discovery response frame truncated"));
    }
    let body = &frame[body_start..body_start + 16];

    let mut unmasked = [0u8; 8];
    for i in 0..8 {
        unmasked[i] = body[2 * i] & body[2 * i + 1];
    }

    let uid_bytes = &unmasked[0..6];
    let checksum_bytes = &unmasked[6..8];
    let expected: u16 = uid_bytes.iter().map(|&b| b as u32).sum::<u32>() as u16;
    let actual = u16::from_be_bytes([checksum_bytes[0], checksum_bytes[1]]);
    if expected != actual {
        return Err(DmxNetError::range("discovery response checksum mismatch"));
    }

    Ok(Some(Uid::from_bytes(uid_bytes)?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub uid: Uid,
    pub muted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions {
    pub mute_found: bool,
    pub unmute_at_end: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            mute_found: true,
            unmute_at_end: false,
        }
    }
}

/// Runs E1.20 binary-split discovery over `transport`, per spec §4.6.
pub async fn discover_devices(
    transport: &mut dyn DiscoveryTransport,
    options: DiscoveryOptions,
) -> Result<Vec<DiscoveredDevice>> {
    let mut found = Vec::new();
    let mut muted = Vec::new();
    discover_range(transport, Uid::MIN, Uid::MAX, options, &mut found, &mut muted).await?;

    if options.unmute_at_end {
        for uid in &muted {
            transport.send_unmute(*uid).await?;
        }
    }

    Ok(found)
}

#[async_recursion::async_recursion]
async fn discover_range(
    transport: &mut dyn DiscoveryTransport,
    lo: Uid,
    hi: Uid,
    options: DiscoveryOptions,
    found: &mut Vec<DiscoveredDevice>,
    muted: &mut Vec<Uid>,
) -> Result<()> {
    let responses = transport.send_discovery_unique_branch(lo, hi).await?;

    let mut decoded: HashMap<Uid, ()> = HashMap::new();
    for frame in &responses {
        if let Some(uid) = decode_discovery_response(frame)? {
            decoded.insert(uid, ());
        }
    }

    match decoded.len() {
        0 => Ok(()),
        1 => {
            let uid = *decoded.keys().next().unwrap();
            if uid.in_range(lo, hi) {
                let mut muted_flag = false;
                if options.mute_found {
                    transport.send_mute(uid).await?;
                    muted.push(uid);
                    muted_flag = true;
                }
                found.push(DiscoveredDevice {
                    uid,
                    muted: muted_flag,
                });
            }
            Ok(())
        }
        _ => {
            let mid = Uid::midpoint(lo, hi)?;
            discover_range(transport, lo, mid, options, found, muted).await?;
            let next = Uid::from_u64(mid.to_u64() + 1);
            discover_range(transport, next, hi, options, found, muted).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct SingleDeviceTransport {
        target: Uid,
        responded: Mutex<bool>,
        mutes: Mutex<Vec<Uid>>,
    }

    fn encode_discovery_response(uid: Uid) -> Vec<u8> {
        let uid_bytes = uid.to_bytes();
        let checksum: u16 = uid_bytes.iter().map(|&b| b as u32).sum::<u32>() as u16;
        let checksum_bytes = checksum.to_be_bytes();

        let mut frame = vec![0xFEu8; 7];
        frame.push(0xAA);
        for &b in &uid_bytes {
            frame.push(b | 0xAA);
            frame.push(b | 0x55);
        }
        for &b in &checksum_bytes {
            frame.push(b | 0xAA);
            frame.push(b | 0x55);
        }
        frame
    }

    #[async_trait]
    impl DiscoveryTransport for SingleDeviceTransport {
        async fn send_discovery_unique_branch(&mut self, lo: Uid, hi: Uid) -> Result<Vec<Vec<u8>>> {
            let mut responded = self.responded.lock().await;
            if *responded || !self.target.in_range(lo, hi) {
                return Ok(vec![]);
            }
            *responded = true;
            Ok(vec![encode_discovery_response(self.target)])
        }

        async fn send_mute(&mut self, uid: Uid) -> Result<()> {
            self.mutes.lock().await.push(uid);
            Ok(())
        }

        async fn send_unmute(&mut self, _uid: Uid) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn discovery_response_round_trips_and_checksums() {
        let uid = Uid::new(0x6574, 0x00001234);
        let frame = encode_discovery_response(uid);
        assert_eq!(decode_discovery_response(&frame).unwrap(), Some(uid));
    }

    #[test]
    fn discovery_response_rejects_bad_checksum() {
        let uid = Uid::new(0x6574, 0x00001234);
        let mut frame = encode_discovery_response(uid);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(decode_discovery_response(&frame).is_err());
    }

    #[test]
    fn discovery_response_absent_when_no_preamble() {
        assert_eq!(decode_discovery_response(&[0u8; 20]).unwrap(), None);
    }

    #[tokio::test]
    async fn single_device_discovery_finds_and_mutes_one() {
        let target = Uid::new(1, 42);
        let mut transport = SingleDeviceTransport {
            target,
            responded: Mutex::new(false),
            mutes: Mutex::new(Vec::new()),
        };
        let found = discover_devices(&mut transport, DiscoveryOptions::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uid, target);
        assert!(found[0].muted);
        assert_eq!(transport.mutes.lock().await.len(), 1);
    }
}
