//! Stateful sACN UDP sender (spec §4.5).
//!
//! Multicast interface selection via socket2 follows
//! `network::listener::start_sacn_listener` in the teacher repo.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::interval;
use tracing::warn;

use crate::error::Result;
use crate::events::EventBus;
use crate::wire::sacn::{self, Payload, PacketOptions, SACN_PORT};

/// The open-question policy from DESIGN.md: a sequence delta `>20` AND `!=1`
/// is treated as "significantly out of order" and just recorded, not
/// rejected; this is preserved as a documented policy choice rather than a
/// codec-level rule.
pub const SACN_SEQUENCE_JUMP_THRESHOLD: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOrder {
    InOrder,
    OutOfOrder,
}

/// Tracks the last-seen sACN sequence number for a single source and
/// classifies the next one, per the policy documented above.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<u8>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn observe(&mut self, sequence: u8) -> SequenceOrder {
        let order = match self.last {
            None => SequenceOrder::InOrder,
            Some(last) => {
                let delta = sequence.wrapping_sub(last);
                if delta != 1 && delta as u16 > SACN_SEQUENCE_JUMP_THRESHOLD as u16 {
                    SequenceOrder::OutOfOrder
                } else {
                    SequenceOrder::InOrder
                }
            }
        };
        self.last = Some(sequence);
        order
    }
}

#[derive(Debug, Clone)]
pub struct SacnSenderConfig {
    pub universe: u16,
    pub destination: SacnDestination,
    pub port: u16,
    pub bind_address: Ipv4Addr,
    pub multicast_interface: Ipv4Addr,
    pub default_options: PacketOptions,
    pub refresh_rate_hz: f64,
}

#[derive(Debug, Clone)]
pub enum SacnDestination {
    Multicast,
    Unicast(Ipv4Addr),
}

impl Default for SacnSenderConfig {
    fn default() -> Self {
        Self {
            universe: 1,
            destination: SacnDestination::Multicast,
            port: SACN_PORT,
            bind_address: Ipv4Addr::UNSPECIFIED,
            multicast_interface: Ipv4Addr::UNSPECIFIED,
            default_options: PacketOptions::default(),
            refresh_rate_hz: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SacnSenderEvent {
    Error(String),
    /// Fires on a success/failure transition in the refresh-rate resend
    /// loop.
    ChangedResendStatus { ok: bool },
}

pub struct SacnSender {
    socket: UdpSocket,
    destination: SocketAddr,
    config: SacnSenderConfig,
    sequence: u8,
    last_sent: Option<Vec<u8>>,
    last_resend_ok: Option<bool>,
    pub events: EventBus<SacnSenderEvent>,
}

impl SacnSender {
    pub async fn bind(config: SacnSenderConfig) -> Result<Self> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(config.bind_address, 0));
        raw.bind(&bind_addr.into())?;
        raw.set_multicast_if_v4(&config.multicast_interface)?;
        raw.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = raw.into();
        let socket = UdpSocket::from_std(std_socket)?;

        let dest_ip = match config.destination {
            SacnDestination::Multicast => sacn::multicast_group(config.universe)?,
            SacnDestination::Unicast(ip) => ip,
        };
        let destination = SocketAddr::V4(SocketAddrV4::new(dest_ip, config.port));

        Ok(Self {
            socket,
            destination,
            config,
            sequence: 0,
            last_sent: None,
            last_resend_ok: None,
            events: EventBus::new(),
        })
    }

    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    pub async fn send(&mut self, payload: &Payload<'_>) -> Result<()> {
        let sequence = self.next_sequence();
        let opts = PacketOptions {
            sequence,
            universe: self.config.universe,
            ..self.config.default_options.clone()
        };
        let bytes = sacn::build_packet(&opts, payload)?;
        self.send_bytes(bytes).await
    }

    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.send(&Payload::Raw(data)).await
    }

    async fn send_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        let result = self.socket.send_to(&bytes, self.destination).await;
        self.record_resend_status(result.is_ok());
        match result {
            Ok(_) => {
                self.last_sent = Some(bytes);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "sacn send failed");
                self.events.emit(&SacnSenderEvent::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn record_resend_status(&mut self, ok: bool) {
        if self.last_resend_ok != Some(ok) {
            self.events.emit(&SacnSenderEvent::ChangedResendStatus { ok });
        }
        self.last_resend_ok = Some(ok);
    }

    /// Repeats the last-sent packet at `1000/refresh_rate_hz` ms until
    /// cancelled. Intended to run as a spawned task.
    pub async fn run_refresh_loop(&mut self) {
        if self.config.refresh_rate_hz <= 0.0 {
            return;
        }
        let period = Duration::from_secs_f64(1.0 / self.config.refresh_rate_hz);
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            if let Some(bytes) = self.last_sent.clone() {
                let result = self.socket.send_to(&bytes, self.destination).await;
                self.record_resend_status(result.is_ok());
                if let Err(e) = result {
                    warn!(error = %e, "sacn refresh resend failed");
                    self.events.emit(&SacnSenderEvent::Error(e.to_string()));
                }
            }
        }
    }

    pub fn close(self) {
        drop(self.socket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_tracker_flags_large_non_adjacent_jumps() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(1), SequenceOrder::InOrder);
        assert_eq!(tracker.observe(2), SequenceOrder::InOrder);
        assert_eq!(tracker.observe(50), SequenceOrder::OutOfOrder);
    }

    #[test]
    fn sequence_tracker_allows_adjacent_wraparound() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(255);
        assert_eq!(tracker.observe(0), SequenceOrder::InOrder);
    }

    #[tokio::test]
    async fn send_raw_round_trips_over_unicast_loopback() {
        let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let listener_addr = listener.local_addr().unwrap();

        let config = SacnSenderConfig {
            universe: 1,
            destination: SacnDestination::Unicast(Ipv4Addr::LOCALHOST),
            port: listener_addr.port(),
            bind_address: Ipv4Addr::LOCALHOST,
            multicast_interface: Ipv4Addr::UNSPECIFIED,
            default_options: PacketOptions::default(),
            refresh_rate_hz: 0.0,
        };
        let mut sender = SacnSender::bind(config).await.unwrap();
        sender.send_raw(&[1, 2, 3]).await.unwrap();

        let mut buf = [0u8; 1500];
        let (len, _) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, sacn::PACKET_LEN);
        assert_eq!(buf[126], 1);
    }

    #[tokio::test]
    async fn resend_status_change_emits_once() {
        let config = SacnSenderConfig {
            bind_address: Ipv4Addr::LOCALHOST,
            destination: SacnDestination::Unicast(Ipv4Addr::LOCALHOST),
            port: 0,
            multicast_interface: Ipv4Addr::UNSPECIFIED,
            ..Default::default()
        };
        let mut sender = SacnSender::bind(config).await.unwrap();
        let transitions = std::sync::Arc::new(parking_lot::Mutex::new(0u32));
        let t = transitions.clone();
        sender.events.on(move |_e| {
            *t.lock() += 1;
        });
        sender.record_resend_status(true);
        sender.record_resend_status(true);
        sender.record_resend_status(false);
        assert_eq!(*transitions.lock(), 2);
    }
}
