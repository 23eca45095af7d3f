//! SoftDevice binding for the session state machine.
//!
//! [`ble_task`] owns the one BLE link. It executes every [`LinkAction`]
//! the [`Session`] asks for on the S140 SoftDevice and feeds the outcome
//! back as a [`LinkEvent`], until the session reaches streaming. It then
//! runs the notification loop, which hands packets to the [`Pipeline`]
//! straight from the SoftDevice event callback.

use defmt::{debug, error, info, warn};
use embassy_futures::join::join;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Timer;
use heapless::Deque;
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Descriptor, DiscoverError, HvxType};
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{central, Address, AddressType, Connection, SecurityMode, Uuid};
use nrf_softdevice::raw;
use nrf_softdevice::Softdevice;

use crate::ble::adv_parser::extract_device_name;
use crate::ble::discovery::Session;
use crate::ble::{
    AdvKind, Attribute, AttributeKind, ConnParams, DiscoverRequest, LinkAction, LinkEvent,
    PeerAddress, SubscribeOutcome,
};
use crate::config::{
    BLE_ATT_MTU, CCC_DESCRIPTOR_UUID, CCC_NOTIFY, CONTROLLER_DATA_UUID, CONTROLLER_SERVICE_UUID,
    SCAN_RETRY_MS,
};
use crate::daydream::{self, RawPacket};
use crate::error::{BleError, IngressError};
use crate::indicator::Indicators;
use crate::pipeline::Pipeline;

/// Pending actions; one event never produces more than a handful.
const ACTION_QUEUE_DEPTH: usize = 16;

// ═══════════════════════════════════════════════════════════════════════════
// GATT client
// ═══════════════════════════════════════════════════════════════════════════

/// GATT client for the controller service (0xFE55).
///
/// Written by hand rather than with `#[gatt_client]` so that notifications
/// of the wrong length are rejected by [`daydream::validate`] instead of
/// being forced into a fixed-size buffer.
pub struct DaydreamClient {
    /// `(declaration, value)` handles of the data characteristic.
    data: Option<(u16, u16)>,
    cccd: Option<u16>,
}

impl DaydreamClient {
    fn value_handle(&self) -> Option<u16> {
        self.data.map(|(_, value)| value)
    }

    /// The attribute answering `request`, if discovery found one in range.
    ///
    /// The SoftDevice procedure does not report the service declaration
    /// handle, so the declaration right before the characteristic stands
    /// in for it. That is a lower bound the characteristic query starts
    /// after, which is all the session needs.
    pub fn attribute(&self, request: &DiscoverRequest) -> Option<Attribute> {
        let found = match request.kind {
            AttributeKind::Service => self.data.map(|(decl, _)| Attribute::Service {
                handle: decl.saturating_sub(1),
            }),
            AttributeKind::Characteristic => {
                self.data
                    .map(|(decl, value)| Attribute::Characteristic {
                        handle: decl,
                        value_handle: value,
                    })
            }
            AttributeKind::Descriptor => self.cccd.map(|handle| Attribute::Descriptor { handle }),
        }?;

        (request.start..=request.end)
            .contains(&found.handle())
            .then_some(found)
    }
}

impl gatt_client::Client for DaydreamClient {
    type Event = Result<RawPacket, IngressError>;

    fn on_hvx(
        &self,
        _conn: &Connection,
        type_: HvxType,
        handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        if matches!(type_, HvxType::Notification) && Some(handle) == self.value_handle() {
            Some(daydream::validate(Some(data)))
        } else {
            None
        }
    }

    fn uuid() -> Uuid {
        Uuid::new_16(CONTROLLER_SERVICE_UUID)
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            data: None,
            cccd: None,
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &Characteristic,
        descriptors: &[Descriptor],
    ) {
        if characteristic.uuid != Some(Uuid::new_128(&CONTROLLER_DATA_UUID)) {
            return;
        }
        self.data = Some((characteristic.handle_decl, characteristic.handle_value));
        self.cccd = descriptors
            .iter()
            .find(|d| d.uuid == Some(Uuid::new_16(CCC_DESCRIPTOR_UUID)))
            .map(|d| d.handle);
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        if self.data.is_none() || self.cccd.is_none() {
            return Err(DiscoverError::ServiceIncomplete);
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Security
// ═══════════════════════════════════════════════════════════════════════════

/// Just Works pairing, no bonding: the controller re-pairs on every link.
struct JustWorks;

impl SecurityHandler for JustWorks {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        false
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("BLE security mode updated: {}", mode);
    }
}

static JUST_WORKS: JustWorks = JustWorks;

// ═══════════════════════════════════════════════════════════════════════════
// Address / parameter conversions
// ═══════════════════════════════════════════════════════════════════════════

fn peer_from_address(address: &Address) -> PeerAddress {
    let kind = match address.address_type() {
        AddressType::Public => 0,
        AddressType::RandomStatic => 1,
        AddressType::RandomPrivateResolvable => 2,
        AddressType::RandomPrivateNonResolvable => 3,
        AddressType::Anonymous => 4,
    };
    PeerAddress {
        kind,
        bytes: address.bytes(),
    }
}

fn address_from_peer(peer: &PeerAddress) -> Address {
    let kind = match peer.kind {
        0 => AddressType::Public,
        2 => AddressType::RandomPrivateResolvable,
        3 => AddressType::RandomPrivateNonResolvable,
        4 => AddressType::Anonymous,
        _ => AddressType::RandomStatic,
    };
    Address::new(kind, peer.bytes)
}

fn raw_conn_params(params: ConnParams) -> raw::ble_gap_conn_params_t {
    raw::ble_gap_conn_params_t {
        min_conn_interval: params.min_interval,
        max_conn_interval: params.max_interval,
        slave_latency: params.latency,
        conn_sup_timeout: params.supervision_timeout,
    }
}

fn adv_kind(report_type: &raw::ble_gap_adv_report_type_t) -> AdvKind {
    if report_type.scan_response() != 0 || report_type.connectable() == 0 {
        AdvKind::Other
    } else if report_type.directed() != 0 {
        AdvKind::ConnectableDirected
    } else {
        AdvKind::ConnectableUndirected
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Link executor
// ═══════════════════════════════════════════════════════════════════════════

struct Link<'p, M: RawMutex, I: Indicators> {
    sd: &'static Softdevice,
    pipeline: &'p Pipeline<M>,
    indicators: &'p I,
    session: Session,
    queue: Deque<LinkAction, ACTION_QUEUE_DEPTH>,
    conn: Option<Connection>,
    client: Option<DaydreamClient>,
    streaming_params: Option<ConnParams>,
}

impl<'p, M: RawMutex, I: Indicators> Link<'p, M, I> {
    fn enqueue(&mut self, actions: &[LinkAction]) {
        for action in actions {
            if self.queue.push_back(*action).is_err() {
                error!("link action queue full, dropping {}", action);
            }
        }
    }

    fn feed(&mut self, event: LinkEvent<'_>) {
        let actions = self.session.handle(event);
        self.enqueue(&actions);
    }

    fn drop_link(&mut self) {
        self.conn = None;
        self.client = None;
        self.streaming_params = None;
    }

    async fn execute(&mut self, action: LinkAction) {
        match action {
            LinkAction::StartScan => self.scan().await,
            // The scan callback already stopped the scan when it matched.
            LinkAction::StopScan => debug!("scan stopped"),
            LinkAction::Connect(peer) => self.connect(peer).await,
            LinkAction::ExchangeMtu => self.exchange_mtu().await,
            LinkAction::RequestSecurity => {
                if let Some(conn) = &self.conn {
                    if conn.request_pairing().is_err() {
                        error!("security request failed: {}", BleError::SecurityFailed);
                    }
                }
            }
            LinkAction::Discover(request) => self.discover(request).await,
            LinkAction::Subscribe { ccc_handle, .. } => self.subscribe(ccc_handle).await,
            LinkAction::UpdateConnParams(params) => self.streaming_params = Some(params),
            LinkAction::Disconnect => {
                if let Some(conn) = &self.conn {
                    if conn.disconnect().is_err() {
                        warn!("Disconnect request failed, link already down");
                    }
                }
                self.drop_link();
            }
            LinkAction::Indicate(led, command) => self.indicators.set(led, command),
            LinkAction::StreamingStarted => {
                info!("Streaming controller data");
                self.pipeline.begin_streaming();
            }
            LinkAction::SessionEnded => {
                self.pipeline.end_session();
                self.drop_link();
            }
        }
    }

    async fn scan(&mut self) {
        info!("Scanning for Daydream controller");
        let config = central::ScanConfig {
            active: true,
            ..Default::default()
        };

        let session = &mut self.session;
        let result = central::scan(self.sd, &config, |params| {
            let data = unsafe {
                core::slice::from_raw_parts(params.data.p_data, params.data.len as usize)
            };
            let event = LinkEvent::Advertisement {
                peer: peer_from_address(&Address::from_raw(params.peer_addr)),
                kind: adv_kind(&params.type_),
                data,
            };

            let actions = session.handle(event);
            if actions.is_empty() {
                // Keep scanning.
                return None;
            }
            info!("Found: {} (RSSI {})", extract_device_name(data).as_str(), params.rssi);
            Some(actions)
        })
        .await;

        match result {
            Ok(actions) => self.enqueue(&actions),
            Err(_) => {
                warn!("BLE scan ended with error: {}", BleError::ScanFailed);
                Timer::after_millis(SCAN_RETRY_MS).await;
                self.enqueue(&[LinkAction::StartScan]);
            }
        }
    }

    async fn connect(&mut self, peer: PeerAddress) {
        info!("Connecting to {}", peer);

        let address = address_from_peer(&peer);
        let whitelist = [&address];
        let config = central::ConnectConfig {
            scan_config: central::ScanConfig {
                whitelist: Some(&whitelist),
                ..Default::default()
            },
            conn_params: raw_conn_params(ConnParams::initial()),
            ..Default::default()
        };

        match central::connect_with_security(self.sd, &config, &JUST_WORKS).await {
            Ok(conn) => {
                info!("Connected");
                self.conn = Some(conn);
                self.feed(LinkEvent::Connected);
            }
            Err(_) => {
                warn!("Connection failed");
                self.feed(LinkEvent::ConnectFailed(BleError::ConnectFailed));
            }
        }
    }

    async fn exchange_mtu(&mut self) {
        let Some(conn) = self.conn.clone() else {
            return;
        };
        match gatt_client::att_mtu_exchange(&conn, BLE_ATT_MTU).await {
            Ok(()) => {
                let att_mtu = conn.att_mtu();
                info!("ATT MTU exchanged: {}", att_mtu);
                self.feed(LinkEvent::MtuUpdated { att_mtu });
            }
            Err(_) => error!("ATT MTU exchange failed"),
        }
    }

    /// Answer one discovery query.
    ///
    /// The SoftDevice walks the whole service in one procedure, so the
    /// first query runs it and later queries are served from its result.
    async fn discover(&mut self, request: DiscoverRequest) {
        if self.client.is_none() {
            let Some(conn) = self.conn.clone() else {
                return;
            };
            debug!("Discovering controller service");
            match gatt_client::discover::<DaydreamClient>(&conn).await {
                Ok(client) => self.client = Some(client),
                Err(_) => {
                    warn!("Discovery failed: {}", BleError::DiscoveryFailed);
                    self.feed(LinkEvent::DiscoveryFailed);
                    return;
                }
            }
        }

        let found = self.client.as_ref().and_then(|c| c.attribute(&request));
        match self.session.settle(found) {
            Ok(actions) => self.enqueue(&actions),
            Err(stuck) => {
                warn!(
                    "Discovery inconclusive in {} for {} in {=u16:#x}..{=u16:#x}, rescanning",
                    stuck.state,
                    stuck.request.kind,
                    stuck.request.start,
                    stuck.request.end
                );
                self.feed(LinkEvent::DiscoveryFailed);
            }
        }
    }

    async fn subscribe(&mut self, ccc_handle: u16) {
        let Some(conn) = self.conn.clone() else {
            return;
        };
        let outcome = match gatt_client::write(&conn, ccc_handle, &CCC_NOTIFY.to_le_bytes()).await
        {
            Ok(()) => SubscribeOutcome::Subscribed,
            Err(_) => {
                warn!("Subscribe failed: {}", BleError::SubscribeFailed);
                SubscribeOutcome::Failed
            }
        };
        self.feed(LinkEvent::Subscribed(outcome));
    }

    /// Run notifications until the link drops.
    async fn stream(&mut self) {
        let (Some(conn), Some(client)) = (self.conn.clone(), self.client.as_ref()) else {
            self.feed(LinkEvent::Disconnected { reason: None });
            return;
        };
        let pipeline = self.pipeline;
        let params = self.streaming_params.take();

        let notifications = gatt_client::run(&conn, client, |event| match event {
            Ok(packet) => {
                if pipeline.offer(packet).is_err() {
                    warn!("raw packet queue full - dropping packet");
                }
            }
            Err(e) => warn!("notification rejected: {}", e),
        });
        let update = async {
            if let Some(params) = params {
                match conn.set_conn_params(raw_conn_params(params)) {
                    Ok(()) => info!("Requested connection parameters {}", params),
                    Err(_) => warn!("{}", BleError::ConnParamsRejected),
                }
            }
        };

        join(notifications, update).await;

        info!("Controller disconnected");
        self.feed(LinkEvent::Disconnected { reason: None });
    }
}

/// BLE task: scan, connect, discover, subscribe, stream; forever.
pub async fn ble_task<M: RawMutex, I: Indicators>(
    sd: &'static Softdevice,
    pipeline: &Pipeline<M>,
    indicators: &I,
) -> ! {
    let mut link = Link {
        sd,
        pipeline,
        indicators,
        session: Session::new(),
        queue: Deque::new(),
        conn: None,
        client: None,
        streaming_params: None,
    };

    let start = link.session.start();
    link.enqueue(&start);

    loop {
        while let Some(action) = link.queue.pop_front() {
            link.execute(action).await;
        }

        if link.session.is_streaming() {
            link.stream().await;
        } else {
            // Nothing left to drive the session forward: start over.
            warn!("Session stalled in {}, restarting", link.session.state());
            link.feed(LinkEvent::Disconnected { reason: None });
            if link.queue.is_empty() {
                let start = link.session.start();
                link.enqueue(&start);
            }
        }
    }
}
