//! Bluetooth Low Energy subsystem.
//!
//! The Daydream controller is a GATT server; we run in **Central** role:
//!
//! 1. **Advertisement filter** ([`adv_parser`]) - picks the controller out
//!    of scan results by its Complete Local Name.
//! 2. **Session state machine** ([`discovery`]) - walks the link from
//!    "found" to "streaming notifications". It is pure: it consumes
//!    [`LinkEvent`]s and answers with [`LinkAction`]s.
//! 3. **SoftDevice binding** (`link`, embedded only) - executes the actions
//!    on the S140 SoftDevice and feeds its results back as events.

pub mod adv_parser;
pub mod discovery;
#[cfg(feature = "embedded")]
pub mod link;

use crate::config::{
    BLE_CONN_INTERVAL_MS, BLE_INITIAL_INTERVAL_MAX_MS, BLE_INITIAL_INTERVAL_MIN_MS,
    BLE_INITIAL_SUP_TIMEOUT_MS, BLE_PERIPHERAL_LATENCY, BLE_SUP_TIMEOUT_MS, CCC_DESCRIPTOR_UUID,
    CONTROLLER_DATA_UUID, CONTROLLER_SERVICE_UUID,
};
use crate::error::BleError;
use crate::indicator::{Led, LedCommand};

/// Raw BLE device address as reported by the scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    /// Address type (public, random static, ...), SoftDevice numbering.
    pub kind: u8,
    /// Address bytes, little-endian.
    pub bytes: [u8; 6],
}

/// Advertising PDU type, reduced to what connection decisions need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvKind {
    /// ADV_IND.
    ConnectableUndirected,
    /// ADV_DIRECT_IND.
    ConnectableDirected,
    /// Scannable / non-connectable / scan response.
    Other,
}

impl AdvKind {
    pub fn is_connectable(self) -> bool {
        matches!(self, AdvKind::ConnectableUndirected | AdvKind::ConnectableDirected)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttUuid {
    Uuid16(u16),
    Uuid128([u8; 16]),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttributeKind {
    Service,
    Characteristic,
    Descriptor,
}

/// One discovery hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attribute {
    Service { handle: u16 },
    /// `handle` is the declaration handle.
    Characteristic { handle: u16, value_handle: u16 },
    Descriptor { handle: u16 },
}

impl Attribute {
    pub fn handle(&self) -> u16 {
        match *self {
            Attribute::Service { handle }
            | Attribute::Characteristic { handle, .. }
            | Attribute::Descriptor { handle } => handle,
        }
    }
}

/// What to look for next, and where.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoverRequest {
    pub kind: AttributeKind,
    pub uuid: AttUuid,
    pub start: u16,
    pub end: u16,
}

pub const SERVICE_UUID: AttUuid = AttUuid::Uuid16(CONTROLLER_SERVICE_UUID);
pub const DATA_UUID: AttUuid = AttUuid::Uuid128(CONTROLLER_DATA_UUID);
pub const CCC_UUID: AttUuid = AttUuid::Uuid16(CCC_DESCRIPTOR_UUID);

/// Connection parameters in controller units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnParams {
    /// 1.25 ms units.
    pub min_interval: u16,
    /// 1.25 ms units.
    pub max_interval: u16,
    pub latency: u16,
    /// 10 ms units.
    pub supervision_timeout: u16,
}

impl ConnParams {
    /// Relaxed parameters used to establish the link.
    pub const fn initial() -> Self {
        Self {
            min_interval: BLE_INITIAL_INTERVAL_MIN_MS * 4 / 5,
            max_interval: BLE_INITIAL_INTERVAL_MAX_MS * 4 / 5,
            latency: 0,
            supervision_timeout: BLE_INITIAL_SUP_TIMEOUT_MS / 10,
        }
    }

    /// Fixed low-latency parameters requested once streaming.
    pub const fn low_latency() -> Self {
        let interval = BLE_CONN_INTERVAL_MS * 4 / 5;
        Self {
            min_interval: interval,
            max_interval: interval,
            latency: BLE_PERIPHERAL_LATENCY,
            supervision_timeout: BLE_SUP_TIMEOUT_MS / 10,
        }
    }
}

/// Result of writing the CCC descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
    Failed,
}

/// Something the link layer reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent<'a> {
    Advertisement {
        peer: PeerAddress,
        kind: AdvKind,
        data: &'a [u8],
    },
    Connected,
    ConnectFailed(BleError),
    /// The SoftDevice does not always report the HCI reason.
    Disconnected {
        reason: Option<u8>,
    },
    MtuUpdated {
        att_mtu: u16,
    },
    /// `None` is an inconclusive lookup (nothing found this round).
    Discovered(Option<Attribute>),
    DiscoveryFailed,
    Subscribed(SubscribeOutcome),
}

/// Something the link layer, pipeline or indicators should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkAction {
    StartScan,
    StopScan,
    Connect(PeerAddress),
    ExchangeMtu,
    RequestSecurity,
    Discover(DiscoverRequest),
    Subscribe { value_handle: u16, ccc_handle: u16 },
    UpdateConnParams(ConnParams),
    Disconnect,
    Indicate(Led, LedCommand),
    /// Notifications are flowing; the pipeline may accept packets.
    StreamingStarted,
    /// The session is gone; the pipeline must purge and reset.
    SessionEnded,
}
