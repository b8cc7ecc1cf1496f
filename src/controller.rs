//! DMX controller: owns universes and their senders, flushes dirty frames
//! (spec §4.8).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{DmxNetError, Result};
use crate::senders::artnet::{ArtNetSender, ArtNetSenderConfig, SendRawOverrides};
use crate::senders::sacn::{SacnSender, SacnSenderConfig};
use crate::universe::Universe;

/// Which built-in sender backs a universe, or a caller-supplied one.
pub enum Sender {
    ArtNet(ArtNetSender),
    Sacn(SacnSender),
    Custom(Box<dyn CustomSender>),
}

/// A caller-supplied sender for universes not served by a built-in protocol.
#[async_trait]
pub trait CustomSender: Send {
    async fn send_raw(&mut self, data: &[u8]) -> Result<()>;

    /// Whether this sender supports `sendSync` (spec §4.8 "first sender that
    /// supports it"). Defaults to unsupported.
    fn supports_sync(&self) -> bool {
        false
    }

    async fn send_sync(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Sender {
    async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Sender::ArtNet(s) => s.send_raw(data, SendRawOverrides::default()).await,
            Sender::Sacn(s) => s.send_raw(data).await,
            Sender::Custom(s) => s.send_raw(data).await,
        }
    }

    fn supports_sync(&self) -> bool {
        matches!(self, Sender::ArtNet(_)) || matches!(self, Sender::Custom(s) if s.supports_sync())
    }

    async fn send_sync(&mut self) -> Result<()> {
        match self {
            Sender::ArtNet(s) => s.send_sync().await,
            Sender::Sacn(_) => Ok(()),
            Sender::Custom(s) => s.send_sync().await,
        }
    }
}

/// Which built-in protocol backs a universe added via [`DmxController::add_universe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    ArtNet,
    Sacn,
}

/// Per-universe sender configuration overrides, merged over the
/// controller-wide defaults (spec §4.8 "per-protocol overrides win").
#[derive(Debug, Clone, Default)]
pub struct SenderOverrides {
    pub artnet: Option<ArtNetSenderConfig>,
    pub sacn: Option<SacnSenderConfig>,
}

/// A factory for a universe's sender. A custom factory takes precedence over
/// `protocol` entirely (spec §4.8 "a custom sender factory takes precedence").
#[async_trait]
pub trait SenderFactory: Send + Sync {
    async fn build(&self, universe_id: u16, protocol: Protocol, overrides: &SenderOverrides) -> Result<Sender>;
}

struct DefaultSenderFactory;

#[async_trait]
impl SenderFactory for DefaultSenderFactory {
    async fn build(&self, universe_id: u16, protocol: Protocol, overrides: &SenderOverrides) -> Result<Sender> {
        match protocol {
            Protocol::ArtNet => {
                let mut config = overrides.artnet.clone().unwrap_or_default();
                config.universe = universe_id;
                Ok(Sender::ArtNet(ArtNetSender::bind(config).await?))
            }
            Protocol::Sacn => {
                let mut config = overrides.sacn.clone().unwrap_or_default();
                config.universe = universe_id;
                Ok(Sender::Sacn(SacnSender::bind(config).await?))
            }
        }
    }
}

/// Controller-wide configuration; per-universe [`SenderOverrides`] win over
/// these when both specify the same field.
#[derive(Clone, Default)]
pub struct DmxControllerConfig {
    pub art_sync: bool,
    pub custom_factory: Option<std::sync::Arc<dyn SenderFactory>>,
}

struct Entry {
    universe: Universe,
    sender: Sender,
}

/// Owns a set of universes, each with its own sender, and flushes dirty
/// frames on demand (spec §4.8, §5 "The DMX controller owns its universes
/// and senders exclusively").
pub struct DmxController {
    config: DmxControllerConfig,
    universes: HashMap<u16, Entry>,
}

impl DmxController {
    pub fn new(config: DmxControllerConfig) -> Self {
        Self {
            config,
            universes: HashMap::new(),
        }
    }

    /// Adds `universe_id` with the given protocol and overrides. Idempotent:
    /// a universe already present is left untouched.
    pub async fn add_universe(
        &mut self,
        universe_id: u16,
        protocol: Protocol,
        overrides: SenderOverrides,
    ) -> Result<()> {
        if self.universes.contains_key(&universe_id) {
            return Ok(());
        }
        let sender = match &self.config.custom_factory {
            Some(factory) => factory.build(universe_id, protocol, &overrides).await?,
            None => DefaultSenderFactory.build(universe_id, protocol, &overrides).await?,
        };
        let universe = Universe::new(universe_id)?;
        self.universes.insert(universe_id, Entry { universe, sender });
        Ok(())
    }

    fn entry_mut(&mut self, universe_id: u16) -> Result<&mut Entry> {
        self.universes
            .get_mut(&universe_id)
            .ok_or_else(|| DmxNetError::range(format!("no universe {universe_id} registered")))
    }

    pub fn set_channel(&mut self, universe_id: u16, channel: u16, value: f64) -> Result<()> {
        self.entry_mut(universe_id)?.universe.set_channel(channel, value)
    }

    pub fn set_frame(&mut self, universe_id: u16, data: &[u8]) -> Result<()> {
        self.entry_mut(universe_id)?.universe.set_frame(data);
        Ok(())
    }

    /// Flushes one universe. Sends regardless of the dirty flag when `force`
    /// is set; otherwise only if dirty. Returns whether a send happened.
    pub async fn flush_universe(&mut self, universe_id: u16, force: bool) -> Result<bool> {
        let entry = self.entry_mut(universe_id)?;
        let should_send = if force {
            entry.universe.consume_dirty();
            true
        } else {
            entry.universe.consume_dirty()
        };
        if !should_send {
            return Ok(false);
        }
        let frame = *entry.universe.frame();
        entry.sender.send_raw(&frame).await?;
        Ok(true)
    }

    /// Flushes every universe, then (if `art_sync` is enabled and at least
    /// one universe was actually sent) issues exactly one `sendSync` to the
    /// first sender that supports it (spec §4.8).
    pub async fn flush_all(&mut self, force: bool) -> Result<usize> {
        let ids: Vec<u16> = self.universes.keys().copied().collect();
        let mut sent_count = 0;
        for id in &ids {
            if self.flush_universe(*id, force).await? {
                sent_count += 1;
            }
        }

        if self.config.art_sync && sent_count > 0 {
            if let Some(entry) = self.universes.values_mut().find(|e| e.sender.supports_sync()) {
                entry.sender.send_sync().await?;
            }
        }

        Ok(sent_count)
    }

    pub fn universe_ids(&self) -> Vec<u16> {
        self.universes.keys().copied().collect()
    }

    pub fn frame(&self, universe_id: u16) -> Option<[u8; 512]> {
        self.universes.get(&universe_id).map(|e| *e.universe.frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    struct RecordingSender {
        sent: Arc<AsyncMutex<Vec<Vec<u8>>>>,
        syncs: Arc<AtomicUsize>,
        supports_sync: bool,
    }

    #[async_trait]
    impl CustomSender for RecordingSender {
        async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
            self.sent.lock().await.push(data.to_vec());
            Ok(())
        }

        fn supports_sync(&self) -> bool {
            self.supports_sync
        }

        async fn send_sync(&mut self) -> Result<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct RecordingFactory {
        sent: Arc<AsyncMutex<Vec<Vec<u8>>>>,
        syncs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SenderFactory for RecordingFactory {
        async fn build(&self, _universe_id: u16, _protocol: Protocol, _overrides: &SenderOverrides) -> Result<Sender> {
            Ok(Sender::Custom(Box::new(RecordingSender {
                sent: self.sent.clone(),
                syncs: self.syncs.clone(),
                supports_sync: true,
            })))
        }
    }

    fn test_controller(art_sync: bool) -> (DmxController, Arc<AsyncMutex<Vec<Vec<u8>>>>, Arc<AtomicUsize>) {
        let sent = Arc::new(AsyncMutex::new(Vec::new()));
        let syncs = Arc::new(AtomicUsize::new(0));
        let factory = RecordingFactory {
            sent: sent.clone(),
            syncs: syncs.clone(),
        };
        let controller = DmxController::new(DmxControllerConfig {
            art_sync,
            custom_factory: Some(Arc::new(factory)),
        });
        (controller, sent, syncs)
    }

    #[tokio::test]
    async fn add_universe_is_idempotent() {
        let (mut controller, _sent, _syncs) = test_controller(false);
        controller.add_universe(1, Protocol::ArtNet, SenderOverrides::default()).await.unwrap();
        controller.add_universe(1, Protocol::ArtNet, SenderOverrides::default()).await.unwrap();
        assert_eq!(controller.universe_ids(), vec![1]);
    }

    #[tokio::test]
    async fn flush_only_sends_dirty_universes_unless_forced() {
        let (mut controller, sent, _syncs) = test_controller(false);
        controller.add_universe(1, Protocol::ArtNet, SenderOverrides::default()).await.unwrap();
        controller.add_universe(2, Protocol::ArtNet, SenderOverrides::default()).await.unwrap();
        controller.set_channel(1, 1, 255.0).unwrap();

        let sent_count = controller.flush_all(false).await.unwrap();
        assert_eq!(sent_count, 1);
        assert_eq!(sent.lock().await.len(), 1);

        let sent_count = controller.flush_all(true).await.unwrap();
        assert_eq!(sent_count, 2);
        assert_eq!(sent.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn art_sync_fires_once_when_something_was_sent() {
        let (mut controller, _sent, syncs) = test_controller(true);
        controller.add_universe(1, Protocol::ArtNet, SenderOverrides::default()).await.unwrap();
        controller.add_universe(2, Protocol::ArtNet, SenderOverrides::default()).await.unwrap();
        controller.set_channel(1, 1, 1.0).unwrap();

        controller.flush_all(false).await.unwrap();
        assert_eq!(syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn art_sync_does_not_fire_when_nothing_was_sent() {
        let (mut controller, _sent, syncs) = test_controller(true);
        controller.add_universe(1, Protocol::ArtNet, SenderOverrides::default()).await.unwrap();

        controller.flush_all(false).await.unwrap();
        assert_eq!(syncs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_universe_is_a_range_error() {
        let (mut controller, _sent, _syncs) = test_controller(false);
        assert!(controller.set_channel(5, 1, 1.0).is_err());
    }
}
