//! Stateless Art-Net UDP sender (spec §4.4).
//!
//! Socket setup follows the same socket2-then-`UdpSocket::from_std` pattern
//! as `network::listener::start_artnet_listener` in the teacher repo.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::warn;

use crate::error::Result;
use crate::events::EventBus;
use crate::wire::artnet::{
    self, ArtCommandData, ArtDiagData, ArtDmxParams, ArtTimeCode, ArtTrigger, TalkToMe,
    ARTNET_PORT,
};

#[derive(Debug, Clone)]
pub struct ArtNetSenderConfig {
    pub universe: u16,
    pub destination_host: Ipv4Addr,
    pub destination_port: u16,
    pub bind_address: Ipv4Addr,
    pub broadcast: bool,
}

impl Default for ArtNetSenderConfig {
    fn default() -> Self {
        Self {
            universe: 1,
            destination_host: Ipv4Addr::new(255, 255, 255, 255),
            destination_port: ARTNET_PORT,
            bind_address: Ipv4Addr::UNSPECIFIED,
            broadcast: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ArtNetSenderEvent {
    Error(String),
}

/// Per-call overrides for [`ArtNetSender::send_raw`].
#[derive(Debug, Clone, Default)]
pub struct SendRawOverrides {
    pub universe: Option<u16>,
    pub physical: Option<u8>,
    pub sequence: Option<u8>,
    pub length: Option<u16>,
}

pub struct ArtNetSender {
    socket: UdpSocket,
    destination: SocketAddr,
    config: ArtNetSenderConfig,
    sequence: u8,
    pub events: EventBus<ArtNetSenderEvent>,
}

impl ArtNetSender {
    pub async fn bind(config: ArtNetSenderConfig) -> Result<Self> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        if config.broadcast {
            raw.set_broadcast(true)?;
        }
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
            sequence: 0,
            events: EventBus::new(),
        })
    }

    /// Increments mod 256, skipping 0 (spec §4.4).
    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1);
        if self.sequence == 0 {
            self.sequence = 1;
        }
        self.sequence
    }

    async fn dispatch(&self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.socket.send_to(bytes, self.destination).await {
            warn!(error = %e, "art-net send failed");
            self.events.emit(&ArtNetSenderEvent::Error(e.to_string()));
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn send_raw(&mut self, data: &[u8], overrides: SendRawOverrides) -> Result<()> {
        let sequence = overrides.sequence.unwrap_or_else(|| self.next_sequence());
        let universe = overrides.universe.unwrap_or(self.config.universe);
        let params = ArtDmxParams {
            universe,
            sequence,
            physical: overrides.physical.unwrap_or(0),
            data,
            length: overrides.length,
        };
        let bytes = artnet::build_art_dmx(&params)?;
        self.dispatch(&bytes).await
    }

    pub async fn send_sync(&self) -> Result<()> {
        self.dispatch(&artnet::build_art_sync()).await
    }

    pub async fn send_poll(&self, flags: TalkToMe, priority: u8) -> Result<()> {
        self.dispatch(&artnet::build_art_poll(flags, priority)).await
    }

    pub async fn send_diag(&self, priority: u8, logical_port: u8, text: &str) -> Result<()> {
        let bytes = artnet::build_art_diag_data(priority, logical_port, text.as_bytes());
        self.dispatch(&bytes).await
    }

    pub async fn send_time_code(&self, code: ArtTimeCode) -> Result<()> {
        let bytes = artnet::build_art_time_code(
            code.hours,
            code.minutes,
            code.seconds,
            code.frames,
            code.frame_type,
        );
        self.dispatch(&bytes).await
    }

    pub async fn send_command(&self, command: ArtCommandData) -> Result<()> {
        let bytes = artnet::build_art_command(command.esta_manufacturer, &command.data);
        self.dispatch(&bytes).await
    }

    pub async fn send_trigger(&self, trigger: ArtTrigger) -> Result<()> {
        let bytes = artnet::build_art_trigger(trigger.oem, trigger.key, trigger.sub_key, &trigger.data);
        self.dispatch(&bytes).await
    }

    pub fn close(self) {
        drop(self.socket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_skips_zero_on_wraparound() {
        let config = ArtNetSenderConfig {
            bind_address: Ipv4Addr::LOCALHOST,
            destination_host: Ipv4Addr::LOCALHOST,
            destination_port: 0,
            ..Default::default()
        };
        let mut sender = ArtNetSender::bind(config).await.unwrap();
        sender.sequence = 255;
        assert_eq!(sender.next_sequence(), 1);
    }

    #[tokio::test]
    async fn send_raw_round_trips_over_loopback() {
        let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let listener_addr = listener.local_addr().unwrap();

        let config = ArtNetSenderConfig {
            universe: 1,
            destination_host: Ipv4Addr::LOCALHOST,
            destination_port: listener_addr.port(),
            bind_address: Ipv4Addr::LOCALHOST,
            broadcast: false,
        };
        let mut sender = ArtNetSender::bind(config).await.unwrap();
        sender.send_raw(&[10, 20, 30], SendRawOverrides::default()).await.unwrap();

        let mut buf = [0u8; 1500];
        let (len, _) = listener.recv_from(&mut buf).await.unwrap();
        let dmx = artnet::parse_art_dmx(&buf[..len]).unwrap();
        assert_eq!(dmx.data, vec![10, 20, 30]);
        assert_eq!(dmx.sequence, 1);
    }
}
