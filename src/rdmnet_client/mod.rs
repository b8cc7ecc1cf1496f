//! Framed, reconnecting RDMnet broker client (spec §4.7).
//!
//! One task owns the transport and drives a read/write select loop
//! (`run_dispatch`); everything else talks to it through the waiter table,
//! an outbound byte channel, and shared, lock-protected session state. A
//! supervisor task watches that loop and, when `auto_reconnect` is set,
//! rebuilds the session with exponential backoff.

pub mod capability;
pub mod state;
pub mod transport;
pub mod waiters;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::error::{broker_status_error, BrokerStatusCode, DmxNetError, Result};
use crate::events::EventBus;
use crate::uid::Uid;
use crate::wire::rdm::RdmFrame;
use crate::wire::rdmnet::{broker, ept, llrp, rpt};
use crate::wire::{acn_root, RootVector};

pub use capability::{CapabilityCache, CapabilityEntry, CapabilityUpdated, Provenance};
pub use state::BrokerState;

/// A decoded message off the broker stream, tagged by which payload codec
/// produced it.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Broker(broker::BrokerMessage),
    Rpt(rpt::RptMessage),
    Ept(ept::EptMessage),
    Llrp(llrp::LlrpMessage),
}

impl InboundMessage {
    pub fn sequence(&self) -> u32 {
        match self {
            InboundMessage::Broker(m) => m.sequence(),
            InboundMessage::Rpt(m) => m.sequence(),
            InboundMessage::Ept(m) => m.sequence(),
            InboundMessage::Llrp(m) => m.sequence(),
        }
    }
}

/// Named events this client emits (spec §9).
#[derive(Debug, Clone)]
pub enum RdmnetClientEvent {
    Message(InboundMessage),
    RptMessage(rpt::RptMessage),
    BrokerState(BrokerState),
    Reconnecting { attempt: u32, delay_ms: u64 },
    Heartbeat,
    EndpointCapabilitiesUpdated(CapabilityEntry),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct RdmnetClientConfig {
    pub host: String,
    pub port: u16,
    pub scope: String,
    pub role: broker::Role,
    pub endpoint_id: u16,
    pub requested_profiles: Vec<u16>,
    pub strict_negotiation: bool,
    pub request_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub initial_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub auto_reconnect: bool,
    pub stream_buffer_cap: usize,
    #[cfg(feature = "tls")]
    pub tls: Option<transport::TlsConfig>,
}

impl Default for RdmnetClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: transport::RDMNET_DEFAULT_PORT,
            scope: "default".into(),
            role: broker::Role::Controller,
            endpoint_id: 1,
            requested_profiles: Vec::new(),
            strict_negotiation: false,
            request_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(15),
            initial_reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            auto_reconnect: true,
            stream_buffer_cap: transport::DEFAULT_STREAM_BUFFER_CAP,
            #[cfg(feature = "tls")]
            tls: None,
        }
    }
}

fn next_sequence(counter: &AtomicU32) -> u32 {
    loop {
        let v = counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if v != 0 {
            return v;
        }
    }
}

struct SessionHandle {
    state: Arc<parking_lot::Mutex<BrokerState>>,
    sequence: Arc<AtomicU32>,
    client_id: Arc<parking_lot::Mutex<Option<u32>>>,
    waiters: Arc<waiters::WaiterTable<InboundMessage>>,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

/// The handful of session fields a single request needs, cloned out from
/// under the session lock so the lock isn't held across an `.await`.
struct SessionRefs {
    sequence: Arc<AtomicU32>,
    waiters: Arc<waiters::WaiterTable<InboundMessage>>,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
}

fn send_broker(outbound_tx: &mpsc::UnboundedSender<Vec<u8>>, msg: &broker::BrokerMessage) -> Result<()> {
    let payload = broker::encode(msg)?;
    let packet = acn_root::build_rdmnet_packet(RootVector::Broker as u32, &payload, None);
    outbound_tx.send(packet).map_err(|_| DmxNetError::SocketClosed)
}

fn send_rpt(outbound_tx: &mpsc::UnboundedSender<Vec<u8>>, msg: &rpt::RptMessage) -> Result<()> {
    let payload = rpt::encode(msg)?;
    let packet = acn_root::build_rdmnet_packet(RootVector::Rpt as u32, &payload, None);
    outbound_tx.send(packet).map_err(|_| DmxNetError::SocketClosed)
}

fn send_llrp(outbound_tx: &mpsc::UnboundedSender<Vec<u8>>, msg: &llrp::LlrpMessage) -> Result<()> {
    let payload = llrp::encode(msg)?;
    let packet = acn_root::build_rdmnet_packet(RootVector::Llrp as u32, &payload, None);
    outbound_tx.send(packet).map_err(|_| DmxNetError::SocketClosed)
}

fn dispatch_packet(
    packet: &[u8],
    state: &parking_lot::Mutex<BrokerState>,
    waiters: &waiters::WaiterTable<InboundMessage>,
    events: &EventBus<RdmnetClientEvent>,
) {
    let root = match acn_root::parse_rdmnet_packet(packet) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse rdmnet root packet");
            events.emit(&RdmnetClientEvent::Error(e.to_string()));
            return;
        }
    };
    let vector = match RootVector::from_u32(root.vector) {
        Some(v) => v,
        None => {
            events.emit(&RdmnetClientEvent::Error(format!(
                "unknown rdmnet root vector {}",
                root.vector
            )));
            return;
        }
    };
    let decoded = match vector {
        RootVector::Broker => broker::decode(&root.data).map(InboundMessage::Broker),
        RootVector::Rpt => rpt::decode(&root.data).map(InboundMessage::Rpt),
        RootVector::Ept => ept::decode(&root.data).map(InboundMessage::Ept),
        RootVector::Llrp => llrp::decode(&root.data).map(InboundMessage::Llrp),
    };
    match decoded {
        Ok(msg) => {
            if let InboundMessage::Broker(broker::BrokerMessage::Disconnect(_)) = msg {
                *state.lock() = BrokerState::TcpConnected;
                events.emit(&RdmnetClientEvent::BrokerState(BrokerState::TcpConnected));
            }
            if let InboundMessage::Rpt(ref rpt_msg) = msg {
                events.emit(&RdmnetClientEvent::RptMessage(rpt_msg.clone()));
            }
            events.emit(&RdmnetClientEvent::Message(msg.clone()));
            waiters.dispatch(&msg);
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode rdmnet payload");
            events.emit(&RdmnetClientEvent::Error(e.to_string()));
        }
    }
}

async fn run_dispatch(
    stream: transport::Stream,
    mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<parking_lot::Mutex<BrokerState>>,
    waiters: Arc<waiters::WaiterTable<InboundMessage>>,
    events: Arc<EventBus<RdmnetClientEvent>>,
    buffer_cap: usize,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    // Split so a read in one select! branch and a write in another don't
    // both need `&mut` on the same value at once.
    let (mut reader, mut writer) = stream.split();
    let mut reassembly = transport::ReassemblyBuffer::new(buffer_cap);
    let mut read_buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            maybe_bytes = outbound_rx.recv() => {
                match maybe_bytes {
                    Some(bytes) => {
                        if let Err(e) = writer.write_all(&bytes).await {
                            tracing::warn!(error = %e, "rdmnet write failed");
                            events.emit(&RdmnetClientEvent::Error(e.to_string()));
                            break;
                        }
                    }
                    None => break,
                }
            }
            read_result = reader.read(&mut read_buf) => {
                match read_result {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) = reassembly.push(&read_buf[..n]) {
                            tracing::warn!(error = %e, "stream reassembly buffer overflowed");
                            events.emit(&RdmnetClientEvent::Error(e.to_string()));
                            break;
                        }
                        match reassembly.drain_packets() {
                            Ok(packets) => {
                                for packet in &packets {
                                    dispatch_packet(packet, &state, &waiters, &events);
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "stream framing error");
                                events.emit(&RdmnetClientEvent::Error(e.to_string()));
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "rdmnet read failed");
                        events.emit(&RdmnetClientEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    *state.lock() = BrokerState::Disconnected;
    events.emit(&RdmnetClientEvent::BrokerState(BrokerState::Disconnected));
    waiters.reject_all_socket_closed();
}

async fn run_heartbeat(
    interval: Duration,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    state: Arc<parking_lot::Mutex<BrokerState>>,
    sequence: Arc<AtomicU32>,
    events: Arc<EventBus<RdmnetClientEvent>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately; skip it
    loop {
        ticker.tick().await;
        let current_state = *state.lock();
        let packet = if matches!(current_state, BrokerState::Connected | BrokerState::Bound) {
            let seq = next_sequence(&sequence);
            let msg = broker::BrokerMessage::Heartbeat { sequence: seq };
            match broker::encode(&msg) {
                Ok(payload) => acn_root::build_rdmnet_packet(RootVector::Broker as u32, &payload, None),
                Err(_) => continue,
            }
        } else {
            acn_root::build_rdmnet_packet(RootVector::Broker as u32, &[], None)
        };
        if outbound_tx.send(packet).is_err() {
            break;
        }
        events.emit(&RdmnetClientEvent::Heartbeat);
    }
}

fn build_transport_kind(config: &RdmnetClientConfig) -> transport::TransportKind {
    #[cfg(feature = "tls")]
    if let Some(tls) = &config.tls {
        return transport::TransportKind::Tls(tls.clone());
    }
    transport::TransportKind::Plain
}

/// Runs the broker handshake (`ConnectRequest`/`ConnectReply`, then
/// `ClientBindRequest`/`ClientBindReply`) over an already-open session.
async fn bind_broker_session(
    session: &SessionHandle,
    config: &RdmnetClientConfig,
    capabilities: &CapabilityCache,
    events: &EventBus<RdmnetClientEvent>,
) -> Result<()> {
    let set_state = |s: BrokerState| {
        *session.state.lock() = s;
        events.emit(&RdmnetClientEvent::BrokerState(s));
    };

    set_state(BrokerState::Connecting);

    let seq = next_sequence(&session.sequence);
    let connect_request = broker::BrokerMessage::ConnectRequest(broker::ConnectRequest {
        sequence: seq,
        role: config.role,
        scope: config.scope.clone(),
    });
    let rx = session.waiters.register(
        move |m: &InboundMessage| {
            matches!(m, InboundMessage::Broker(broker::BrokerMessage::ConnectReply(r)) if r.sequence == seq)
        },
        config.request_timeout,
    );
    send_broker(&session.outbound_tx, &connect_request)?;

    let reply = match rx.await.map_err(|_| DmxNetError::SocketClosed)? {
        Ok(InboundMessage::Broker(broker::BrokerMessage::ConnectReply(r))) => r,
        Ok(_) => return Err(DmxNetError::Protocol("unexpected message type for ConnectReply".into())),
        Err(e) => {
            set_state(BrokerState::Error);
            return Err(e);
        }
    };
    if !matches!(reply.status_code, BrokerStatusCode::Ok) {
        set_state(BrokerState::Error);
        return Err(broker_status_error(reply.status_code as u16, reply.text));
    }
    *session.client_id.lock() = Some(reply.client_id);
    set_state(BrokerState::Connected);

    set_state(BrokerState::Binding);
    let seq2 = next_sequence(&session.sequence);
    let bind_request = broker::BrokerMessage::ClientBindRequest(broker::ClientBindRequest {
        sequence: seq2,
        endpoint_id: config.endpoint_id,
        requested_role: config.role,
        profiles: config.requested_profiles.clone(),
    });
    let rx2 = session.waiters.register(
        move |m: &InboundMessage| {
            matches!(m, InboundMessage::Broker(broker::BrokerMessage::ClientBindReply(r)) if r.sequence == seq2)
        },
        config.request_timeout,
    );
    send_broker(&session.outbound_tx, &bind_request)?;

    let bind_reply = match rx2.await.map_err(|_| DmxNetError::SocketClosed)? {
        Ok(InboundMessage::Broker(broker::BrokerMessage::ClientBindReply(r))) => r,
        Ok(_) => return Err(DmxNetError::Protocol("unexpected message type for ClientBindReply".into())),
        Err(e) => {
            set_state(BrokerState::Error);
            return Err(e);
        }
    };
    if !matches!(bind_reply.status_code, BrokerStatusCode::Ok) {
        set_state(BrokerState::Error);
        return Err(broker_status_error(bind_reply.status_code as u16, bind_reply.text));
    }

    if config.strict_negotiation {
        if bind_reply.negotiated_role as u8 != config.role as u8 {
            set_state(BrokerState::Error);
            return Err(DmxNetError::NegotiationRoleMismatch {
                requested: config.role as u8,
                negotiated: bind_reply.negotiated_role as u8,
            });
        }
        if !config.requested_profiles.is_empty()
            && !config.requested_profiles.contains(&bind_reply.negotiated_profile)
        {
            set_state(BrokerState::Error);
            return Err(DmxNetError::NegotiationProfileMismatch {
                negotiated: bind_reply.negotiated_profile,
            });
        }
    }

    set_state(BrokerState::Bound);
    capabilities.update(
        config.endpoint_id,
        Some(bind_reply.negotiated_role as u8),
        vec![bind_reply.negotiated_profile],
        Provenance::BrokerNegotiation,
        SystemTime::now(),
    );

    Ok(())
}

async fn connect_once(
    config: &RdmnetClientConfig,
    capabilities: &Arc<CapabilityCache>,
    events: &Arc<EventBus<RdmnetClientEvent>>,
) -> Result<(SessionHandle, JoinHandle<()>, JoinHandle<()>)> {
    let kind = build_transport_kind(config);
    let stream = transport::connect(&config.host, config.port, kind).await?;
    let _ = stream.set_nodelay(true);

    let state = Arc::new(parking_lot::Mutex::new(BrokerState::TcpConnected));
    events.emit(&RdmnetClientEvent::BrokerState(BrokerState::TcpConnected));
    let sequence = Arc::new(AtomicU32::new(0));
    let client_id = Arc::new(parking_lot::Mutex::new(None));
    let waiters: Arc<waiters::WaiterTable<InboundMessage>> = waiters::WaiterTable::new();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let dispatch_handle = tokio::spawn(run_dispatch(
        stream,
        outbound_rx,
        state.clone(),
        waiters.clone(),
        events.clone(),
        config.stream_buffer_cap,
        shutdown_rx,
    ));
    let heartbeat_handle = tokio::spawn(run_heartbeat(
        config.heartbeat_interval,
        outbound_tx.clone(),
        state.clone(),
        sequence.clone(),
        events.clone(),
    ));

    let session = SessionHandle {
        state,
        sequence,
        client_id,
        waiters,
        outbound_tx,
        shutdown_tx: Some(shutdown_tx),
    };

    if let Err(e) = bind_broker_session(&session, config, capabilities, events).await {
        dispatch_handle.abort();
        heartbeat_handle.abort();
        return Err(e);
    }

    Ok((session, dispatch_handle, heartbeat_handle))
}

fn backoff_delay(config: &RdmnetClientConfig, attempt: u32) -> Duration {
    let initial = config.initial_reconnect_delay.as_millis() as u64;
    let max = config.max_reconnect_delay.as_millis() as u64;
    let shift = attempt.saturating_sub(1).min(32);
    let scaled = initial.saturating_mul(1u64 << shift);
    Duration::from_millis(scaled.min(max.max(initial)))
}

async fn supervise(
    config: RdmnetClientConfig,
    inner: Arc<AsyncMutex<Option<SessionHandle>>>,
    capabilities: Arc<CapabilityCache>,
    events: Arc<EventBus<RdmnetClientEvent>>,
    mut dispatch_handle: JoinHandle<()>,
    mut heartbeat_handle: JoinHandle<()>,
) {
    let mut attempt = 0u32;
    loop {
        let _ = dispatch_handle.await;
        heartbeat_handle.abort();
        *inner.lock().await = None;

        if !config.auto_reconnect {
            break;
        }

        loop {
            attempt += 1;
            let delay = backoff_delay(&config, attempt);
            events.emit(&RdmnetClientEvent::Reconnecting {
                attempt,
                delay_ms: delay.as_millis() as u64,
            });
            tokio::time::sleep(delay).await;

            match connect_once(&config, &capabilities, &events).await {
                Ok((session, d_handle, h_handle)) => {
                    *inner.lock().await = Some(session);
                    dispatch_handle = d_handle;
                    heartbeat_handle = h_handle;
                    attempt = 0;
                    break;
                }
                Err(e) => {
                    events.emit(&RdmnetClientEvent::Error(e.to_string()));
                }
            }
        }
    }
}

/// Sends `Disconnect` and moves the session back to `TcpConnected`,
/// clearing `client_id` and the capability cache. The transport keeps
/// running; only the broker session ends.
async fn soft_disconnect(
    session: &SessionHandle,
    capabilities: &CapabilityCache,
    events: &EventBus<RdmnetClientEvent>,
    reason: u16,
    text: String,
) {
    let seq = next_sequence(&session.sequence);
    let msg = broker::BrokerMessage::Disconnect(broker::Disconnect { sequence: seq, reason, text });
    let _ = send_broker(&session.outbound_tx, &msg);
    *session.client_id.lock() = None;
    *session.state.lock() = BrokerState::TcpConnected;
    events.emit(&RdmnetClientEvent::BrokerState(BrokerState::TcpConnected));
    capabilities.clear();
}

/// Sends `Disconnect` and tears the transport itself down. Used only by
/// [`RdmnetClient::close`], which owns the session outright by this point.
async fn hard_disconnect(mut session: SessionHandle, reason: u16, text: String) {
    let seq = next_sequence(&session.sequence);
    let msg = broker::BrokerMessage::Disconnect(broker::Disconnect { sequence: seq, reason, text });
    let _ = send_broker(&session.outbound_tx, &msg);
    if let Some(tx) = session.shutdown_tx.take() {
        let _ = tx.send(());
    }
}

/// A connected, optionally auto-reconnecting RDMnet broker client.
pub struct RdmnetClient {
    config: RdmnetClientConfig,
    events: Arc<EventBus<RdmnetClientEvent>>,
    capabilities: Arc<CapabilityCache>,
    inner: Arc<AsyncMutex<Option<SessionHandle>>>,
    supervisor: Option<JoinHandle<()>>,
}

impl RdmnetClient {
    /// Opens the transport, runs the broker handshake to completion, and
    /// (if `config.auto_reconnect`) starts the reconnect supervisor.
    pub async fn connect(config: RdmnetClientConfig) -> Result<Self> {
        let events = Arc::new(EventBus::new());
        let capabilities = Arc::new(CapabilityCache::new());
        let forwarded_events = events.clone();
        capabilities
            .events
            .on(move |u: &CapabilityUpdated| {
                forwarded_events.emit(&RdmnetClientEvent::EndpointCapabilitiesUpdated(u.0.clone()));
            });

        let (session, dispatch_handle, heartbeat_handle) =
            connect_once(&config, &capabilities, &events).await?;
        let inner = Arc::new(AsyncMutex::new(Some(session)));

        let supervisor = tokio::spawn(supervise(
            config.clone(),
            inner.clone(),
            capabilities.clone(),
            events.clone(),
            dispatch_handle,
            heartbeat_handle,
        ));

        Ok(Self {
            config,
            events,
            capabilities,
            inner,
            supervisor: Some(supervisor),
        })
    }

    pub fn events(&self) -> &Arc<EventBus<RdmnetClientEvent>> {
        &self.events
    }

    pub fn capabilities(&self) -> &Arc<CapabilityCache> {
        &self.capabilities
    }

    pub async fn broker_state(&self) -> BrokerState {
        match &*self.inner.lock().await {
            Some(session) => *session.state.lock(),
            None => BrokerState::Disconnected,
        }
    }

    pub async fn client_id(&self) -> Option<u32> {
        match &*self.inner.lock().await {
            Some(session) => *session.client_id.lock(),
            None => None,
        }
    }

    async fn current_session_refs(&self) -> Result<SessionRefs> {
        let guard = self.inner.lock().await;
        let session = guard.as_ref().ok_or(DmxNetError::SocketClosed)?;
        Ok(SessionRefs {
            sequence: session.sequence.clone(),
            waiters: session.waiters.clone(),
            outbound_tx: session.outbound_tx.clone(),
        })
    }

    /// Sends `Disconnect` and transitions the session back to
    /// `TcpConnected`, clearing `client_id` and the capability cache. The
    /// TCP (or TLS) transport stays open and the reconnect supervisor keeps
    /// running - call [`Self::close`] to tear everything down.
    pub async fn stop_broker_session(&self) -> Result<()> {
        let guard = self.inner.lock().await;
        let session = guard.as_ref().ok_or(DmxNetError::SocketClosed)?;
        soft_disconnect(
            session,
            &self.capabilities,
            &self.events,
            0,
            "client requested disconnect".into(),
        )
        .await;
        Ok(())
    }

    /// Tears the transport down, stops the reconnect supervisor, and
    /// consumes the client.
    pub async fn close(mut self) -> Result<()> {
        let session_opt = self.inner.lock().await.take();
        if let Some(session) = session_opt {
            hard_disconnect(session, 0, "client closing".into()).await;
        }
        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
        self.capabilities.clear();
        Ok(())
    }

    /// Sends an RDM command over RPT to `outer_destination` via `endpoint_id`
    /// and awaits the matching response, correlated by RPT sequence alone.
    pub async fn rdm_transaction(
        &self,
        endpoint_id: u16,
        outer_destination: Uid,
        outer_source: Uid,
        rdm_frame: RdmFrame,
    ) -> Result<RdmFrame> {
        let refs = self.current_session_refs().await?;
        let seq = next_sequence(&refs.sequence);
        let command = rpt::RptMessage::RdmCommand(rpt::RptRdm {
            sequence: seq,
            endpoint_id,
            outer_destination,
            outer_source,
            rdm_frame,
        });
        let rx = refs.waiters.register(
            move |m: &InboundMessage| {
                matches!(m, InboundMessage::Rpt(rpt::RptMessage::RdmResponse(r)) if r.sequence == seq)
            },
            self.config.request_timeout,
        );
        send_rpt(&refs.outbound_tx, &command)?;

        match rx.await.map_err(|_| DmxNetError::SocketClosed)?? {
            InboundMessage::Rpt(rpt::RptMessage::RdmResponse(r)) => Ok(r.rdm_frame),
            _ => Err(DmxNetError::Protocol("unexpected message type for RdmResponse".into())),
        }
    }

    /// Advertises `endpoint_id`'s capabilities over RPT and records them
    /// locally with `Provenance::LocalAdvertisement`.
    pub async fn send_endpoint_advertisement(
        &self,
        endpoint_id: u16,
        role: u8,
        profiles: Vec<u16>,
    ) -> Result<()> {
        let refs = self.current_session_refs().await?;
        let seq = next_sequence(&refs.sequence);
        let msg = rpt::RptMessage::EndpointAdvertisement(rpt::EndpointAdvertisement {
            sequence: seq,
            endpoint_id,
            role,
            profiles: profiles.clone(),
        });
        send_rpt(&refs.outbound_tx, &msg)?;
        self.capabilities.update(
            endpoint_id,
            Some(role),
            profiles,
            Provenance::LocalAdvertisement,
            SystemTime::now(),
        );
        Ok(())
    }

    pub async fn wait_for_endpoint_advertisement_ack(
        &self,
        endpoint_id: u16,
        timeout_duration: Duration,
    ) -> Result<rpt::EndpointAdvertisementAck> {
        let refs = self.current_session_refs().await?;
        let rx = refs.waiters.register(
            move |m: &InboundMessage| {
                matches!(m, InboundMessage::Rpt(rpt::RptMessage::EndpointAdvertisementAck(a)) if a.endpoint_id == endpoint_id)
            },
            timeout_duration,
        );
        match rx.await.map_err(|_| DmxNetError::SocketClosed)?? {
            InboundMessage::Rpt(rpt::RptMessage::EndpointAdvertisementAck(a)) => Ok(a),
            _ => Err(DmxNetError::Protocol("unexpected message type for EndpointAdvertisementAck".into())),
        }
    }

    /// Sends an LLRP `ProbeRequest` over `[lower, upper]`, waits out the full
    /// `timeout_duration`, and returns every responder's UID, deduplicated.
    /// Unlike the request/response waiters, a range probe can draw more than
    /// one reply, so this taps the event bus with a listener that stays
    /// registered for the whole window instead of a one-shot waiter.
    pub async fn discover_llrp_targets(
        &self,
        lower: Uid,
        upper: Uid,
        timeout_duration: Duration,
    ) -> Result<Vec<Uid>> {
        let refs = self.current_session_refs().await?;
        let seq = next_sequence(&refs.sequence);
        let msg = llrp::LlrpMessage::ProbeRequest(llrp::ProbeRequest {
            sequence: seq,
            lower_uid: lower,
            upper_uid: upper,
        });

        let found: Arc<parking_lot::Mutex<std::collections::BTreeSet<Uid>>> =
            Arc::new(parking_lot::Mutex::new(std::collections::BTreeSet::new()));
        let collector = found.clone();
        let listener_id = self.events.on(move |e: &RdmnetClientEvent| {
            if let RdmnetClientEvent::Message(InboundMessage::Llrp(llrp::LlrpMessage::ProbeReply(r))) = e {
                if r.sequence == seq {
                    collector.lock().insert(r.target_uid);
                }
            }
        });

        send_llrp(&refs.outbound_tx, &msg)?;
        tokio::time::sleep(timeout_duration).await;
        self.events.off(listener_id);

        Ok(found.lock().iter().copied().collect())
    }
}

impl Drop for RdmnetClient {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let config = RdmnetClientConfig {
            initial_reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&config, 10), Duration::from_secs(10));
    }

    #[test]
    fn inbound_message_sequence_reads_through() {
        let msg = InboundMessage::Broker(broker::BrokerMessage::Heartbeat { sequence: 42 });
        assert_eq!(msg.sequence(), 42);
    }

    #[tokio::test]
    async fn connect_fails_cleanly_when_nothing_is_listening() {
        let config = RdmnetClientConfig {
            host: "127.0.0.1".into(),
            port: 1, // nothing listens on port 1
            auto_reconnect: false,
            ..Default::default()
        };
        assert!(RdmnetClient::connect(config).await.is_err());
    }
}
