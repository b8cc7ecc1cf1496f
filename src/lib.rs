//! `dmxnet` — a DMX512 lighting-fixture-control library implementing
//! sACN (E1.31), Art-Net 4, RDM (E1.20), and RDMnet (E1.33).
//!
//! The crate never installs a `tracing` subscriber; the embedding
//! application owns that.

pub mod controller;
pub mod discovery;
pub mod error;
pub mod events;
pub mod rdmnet_client;
pub mod senders;
pub mod uid;
pub mod universe;
pub mod wire;

pub use controller::{
    CustomSender, DmxController, DmxControllerConfig, Protocol, Sender, SenderFactory, SenderOverrides,
};
pub use discovery::{
    decode_discovery_response, discover_devices, ArtNetRdmClient, ArtNetRdmClientConfig,
    DiscoveredDevice, DiscoveryOptions, DiscoveryTransport,
};
pub use error::{DmxNetError, ErrorDomain, Result};
pub use events::EventBus;
pub use rdmnet_client::{
    BrokerState, CapabilityCache, CapabilityEntry, CapabilityUpdated, InboundMessage, Provenance,
    RdmnetClient, RdmnetClientConfig, RdmnetClientEvent,
};
pub use senders::artnet::{ArtNetSender, ArtNetSenderConfig, ArtNetSenderEvent, SendRawOverrides};
pub use senders::sacn::{
    SacnDestination, SacnSender, SacnSenderConfig, SacnSenderEvent, SequenceOrder, SequenceTracker,
};
pub use uid::Uid;
pub use universe::{validate_universe_id, Universe, MAX_UNIVERSE_ID, MIN_UNIVERSE_ID, SACN_TEST_UNIVERSE};
pub use wire::rdm::RdmFrame;
pub use wire::rdmnet::broker::Role as RdmnetRole;
