//! Session state machine: scan → connect → discover → subscribe → stream.
//!
//! Every transition is keyed on the current [`DiscoveryState`] and the
//! incoming [`LinkEvent`]. The next discovery query is a pure function of
//! the state ([`Session::request`]), so nothing is inferred from which UUID
//! happened to be searched last.

use heapless::Vec;

use crate::config::{ATT_FIRST_HANDLE, ATT_LAST_HANDLE, CONNECT_BLINK_MS, SCAN_BLINK_MS};
use crate::indicator::{Led, LedCommand};

use super::adv_parser::is_daydream_controller;
use super::{
    Attribute, AttributeKind, ConnParams, DiscoverRequest, LinkAction, LinkEvent, PeerAddress,
    SubscribeOutcome, CCC_UUID, DATA_UUID, SERVICE_UUID,
};

/// Most actions a single event can produce.
pub const MAX_ACTIONS: usize = 6;

pub type Actions = Vec<LinkAction, MAX_ACTIONS>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryState {
    Scanning,
    Connecting,
    ExchangingCapabilities,
    DiscoveringService,
    DiscoveringCharacteristic {
        service_handle: u16,
    },
    DiscoveringDescriptor {
        characteristic_handle: u16,
        value_handle: u16,
    },
    Subscribing {
        value_handle: u16,
        ccc_handle: u16,
    },
    Streaming {
        value_handle: u16,
    },
}

/// A discovery answer that left the session where it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Inconclusive {
    pub state: DiscoveryState,
    pub request: DiscoverRequest,
}

/// The one live (or pending) BLE link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    state: DiscoveryState,
    peer: Option<PeerAddress>,
}

impl Session {
    pub const fn new() -> Self {
        Self {
            state: DiscoveryState::Scanning,
            peer: None,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn peer(&self) -> Option<PeerAddress> {
        self.peer
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, DiscoveryState::Streaming { .. })
    }

    /// Actions that bring a fresh session up (scan + searching blink).
    pub fn start(&mut self) -> Actions {
        *self = Self::new();
        let mut actions = Actions::new();
        push_all(&mut actions, &scan_actions());
        actions
    }

    /// Discovery query for the current state, if the state has one.
    pub fn request(&self) -> Option<DiscoverRequest> {
        match self.state {
            DiscoveryState::DiscoveringService => Some(DiscoverRequest {
                kind: AttributeKind::Service,
                uuid: SERVICE_UUID,
                start: ATT_FIRST_HANDLE,
                end: ATT_LAST_HANDLE,
            }),
            DiscoveryState::DiscoveringCharacteristic { service_handle } => Some(DiscoverRequest {
                kind: AttributeKind::Characteristic,
                uuid: DATA_UUID,
                start: service_handle.saturating_add(1),
                end: ATT_LAST_HANDLE,
            }),
            DiscoveryState::DiscoveringDescriptor {
                characteristic_handle,
                ..
            } => Some(DiscoverRequest {
                kind: AttributeKind::Descriptor,
                uuid: CCC_UUID,
                start: characteristic_handle.saturating_add(2),
                end: ATT_LAST_HANDLE,
            }),
            _ => None,
        }
    }

    /// Feed one discovery answer.
    ///
    /// Each query is answered exactly once, so an answer that does not
    /// advance the session is final. The caller reports it with
    /// [`LinkEvent::DiscoveryFailed`].
    pub fn settle(&mut self, found: Option<Attribute>) -> Result<Actions, Inconclusive> {
        let state = self.state;
        let request = self.request();
        let actions = self.handle(LinkEvent::Discovered(found));
        match request {
            Some(request) if self.state == state => Err(Inconclusive { state, request }),
            _ => Ok(actions),
        }
    }

    pub fn handle(&mut self, event: LinkEvent<'_>) -> Actions {
        let mut actions = Actions::new();

        match (self.state, event) {
            (DiscoveryState::Scanning, LinkEvent::Advertisement { peer, kind, data }) => {
                if kind.is_connectable() && is_daydream_controller(data) {
                    self.peer = Some(peer);
                    self.state = DiscoveryState::Connecting;
                    push_all(&mut actions, &[LinkAction::StopScan, LinkAction::Connect(peer)]);
                }
            }

            (DiscoveryState::Connecting, LinkEvent::Connected) => {
                self.state = DiscoveryState::ExchangingCapabilities;
                push_all(
                    &mut actions,
                    &[
                        LinkAction::Indicate(Led::LinkStatus, LedCommand::flash(CONNECT_BLINK_MS)),
                        LinkAction::ExchangeMtu,
                        LinkAction::RequestSecurity,
                    ],
                );
                self.enter(DiscoveryState::DiscoveringService, &mut actions);
            }

            (DiscoveryState::Connecting, LinkEvent::ConnectFailed(_)) => {
                self.teardown(false, &mut actions);
            }

            (_, LinkEvent::Discovered(found)) => {
                if let Some(attribute) = found {
                    self.on_discovered(attribute, &mut actions);
                }
            }

            (
                DiscoveryState::DiscoveringService
                | DiscoveryState::DiscoveringCharacteristic { .. }
                | DiscoveryState::DiscoveringDescriptor { .. },
                LinkEvent::DiscoveryFailed,
            ) => {
                self.teardown(true, &mut actions);
            }

            (
                DiscoveryState::Subscribing {
                    value_handle,
                    ccc_handle: _,
                },
                LinkEvent::Subscribed(outcome),
            ) => match outcome {
                SubscribeOutcome::Subscribed | SubscribeOutcome::AlreadySubscribed => {
                    self.state = DiscoveryState::Streaming { value_handle };
                    push_all(
                        &mut actions,
                        &[
                            LinkAction::Indicate(Led::LinkStatus, LedCommand::Off),
                            LinkAction::StreamingStarted,
                            LinkAction::UpdateConnParams(ConnParams::low_latency()),
                        ],
                    );
                }
                SubscribeOutcome::Failed => self.teardown(true, &mut actions),
            },

            (DiscoveryState::Scanning, LinkEvent::Disconnected { .. }) => {}

            (_, LinkEvent::Disconnected { .. }) => {
                self.teardown(false, &mut actions);
            }

            // Advertisements after a match, MTU reports and stale results
            // leave the state alone.
            _ => {}
        }

        actions
    }

    fn on_discovered(&mut self, attribute: Attribute, actions: &mut Actions) {
        let next = match (self.state, attribute) {
            (DiscoveryState::DiscoveringService, Attribute::Service { handle }) => {
                DiscoveryState::DiscoveringCharacteristic {
                    service_handle: handle,
                }
            }
            (
                DiscoveryState::DiscoveringCharacteristic { .. },
                Attribute::Characteristic {
                    handle,
                    value_handle,
                },
            ) => DiscoveryState::DiscoveringDescriptor {
                characteristic_handle: handle,
                value_handle,
            },
            (
                DiscoveryState::DiscoveringDescriptor { value_handle, .. },
                Attribute::Descriptor { handle },
            ) => {
                self.state = DiscoveryState::Subscribing {
                    value_handle,
                    ccc_handle: handle,
                };
                let _ = actions.push(LinkAction::Subscribe {
                    value_handle,
                    ccc_handle: handle,
                });
                return;
            }
            // Kind mismatch: inconclusive, wait for the next round.
            _ => return,
        };
        self.enter(next, actions);
    }

    fn enter(&mut self, state: DiscoveryState, actions: &mut Actions) {
        self.state = state;
        if let Some(request) = self.request() {
            let _ = actions.push(LinkAction::Discover(request));
        }
    }

    /// Drop the session and go back to scanning.
    fn teardown(&mut self, connected: bool, actions: &mut Actions) {
        if connected {
            let _ = actions.push(LinkAction::Disconnect);
        }
        let _ = actions.push(LinkAction::SessionEnded);
        *self = Self::new();
        push_all(actions, &scan_actions());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Scanning blocks the executor until a match, so the blink goes first.
fn scan_actions() -> [LinkAction; 2] {
    [
        LinkAction::Indicate(Led::LinkStatus, LedCommand::flash(SCAN_BLINK_MS)),
        LinkAction::StartScan,
    ]
}

fn push_all(actions: &mut Actions, items: &[LinkAction]) {
    for action in items {
        // Capacity covers the longest transition.
        let _ = actions.push(*action);
    }
}
