//! The seam between a session and whatever carries its messages.
//!
//! A [`MessagingClient`] is polled from the game thread. Implementations
//! queue inbound traffic and hand it out through [`MessagingClient::next_event`]
//! and the latest-message accessors; outbound calls never block.

use crate::config::ConnectionSettings;
use shared::{ClientVersion, NetworkItem, PrintMessage, RoomInfo, SlotData};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Authenticated,
    ConnectionRefused(String),
}

/// Inbound traffic that changes session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// `index` is the item's position in the slot's received-items list.
    ItemReceived { index: u32, item: NetworkItem },
    LocationsChecked(Vec<i64>),
    LocationInfo(Vec<NetworkItem>),
}

pub trait MessagingClient {
    fn set_client_version(&mut self, version: ClientVersion);
    fn set_death_link_supported(&mut self, supported: bool);
    /// Starts connecting. Progress is observed through [`Self::connection_status`].
    fn connect(&mut self, settings: &ConnectionSettings);
    fn connection_status(&mut self) -> ConnectionStatus;
    fn room_info(&self) -> Option<&RoomInfo>;
    fn slot_data(&self) -> Option<&SlotData>;

    fn next_event(&mut self) -> Option<SessionEvent>;
    fn is_message_pending(&mut self) -> bool;
    fn latest_message(&self) -> Option<&PrintMessage>;
    fn clear_latest_message(&mut self);

    fn send_location_checks(&mut self, locations: &[i64]);
    fn send_location_scouts(&mut self, locations: &[i64], create_as_hint: bool);
    fn send_chat(&mut self, text: &str);
    fn story_complete(&mut self);

    fn death_link_send(&mut self);
    fn death_link_clear(&mut self);
    fn death_link_pending(&mut self) -> bool;
}

/// In-process client driven by its public fields. Checks and scouts can be
/// answered locally so a session runs without a server.
#[derive(Debug, Default)]
pub struct MemoryClient {
    pub status: ConnectionStatus,
    /// Status reported once `connect` is called.
    pub status_on_connect: ConnectionStatus,
    pub room: Option<RoomInfo>,
    pub slot: Option<SlotData>,
    pub events: VecDeque<SessionEvent>,
    pub messages: VecDeque<PrintMessage>,
    pub version: Option<ClientVersion>,
    pub death_link_supported: bool,
    pub death_pending: bool,
    pub connected_with: Option<ConnectionSettings>,

    /// Answer `send_location_checks` with a `LocationsChecked` event.
    pub echo_checks: bool,
    /// Answer `send_location_scouts` with a `LocationInfo` event using these flags.
    pub answer_scouts: bool,
    pub scout_flags: HashMap<i64, u32>,

    pub sent_checks: Vec<i64>,
    pub scout_requests: Vec<Vec<i64>>,
    pub chat: Vec<String>,
    pub deaths_sent: usize,
    pub goal_sent: bool,
}

impl MemoryClient {
    /// A client that authenticates immediately into the given room.
    pub fn authenticated(seed_name: &str, slot_data: SlotData) -> Self {
        Self {
            status_on_connect: ConnectionStatus::Authenticated,
            room: Some(RoomInfo {
                seed_name: seed_name.to_string(),
                server_version: crate::config::CLIENT_VERSION,
            }),
            slot: Some(slot_data),
            echo_checks: true,
            answer_scouts: true,
            ..Self::default()
        }
    }

    pub fn push_item(&mut self, index: u32, item: i64) {
        self.events.push_back(SessionEvent::ItemReceived {
            index,
            item: NetworkItem {
                item,
                location: 0,
                player: 1,
                flags: 0,
            },
        });
    }

    pub fn push_message(&mut self, message: PrintMessage) {
        self.messages.push_back(message);
    }
}

impl MessagingClient for MemoryClient {
    fn set_client_version(&mut self, version: ClientVersion) {
        self.version = Some(version);
    }

    fn set_death_link_supported(&mut self, supported: bool) {
        self.death_link_supported = supported;
    }

    fn connect(&mut self, settings: &ConnectionSettings) {
        self.connected_with = Some(settings.clone());
        self.status = self.status_on_connect.clone();
    }

    fn connection_status(&mut self) -> ConnectionStatus {
        self.status.clone()
    }

    fn room_info(&self) -> Option<&RoomInfo> {
        self.room.as_ref()
    }

    fn slot_data(&self) -> Option<&SlotData> {
        self.slot.as_ref()
    }

    fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    fn is_message_pending(&mut self) -> bool {
        !self.messages.is_empty()
    }

    fn latest_message(&self) -> Option<&PrintMessage> {
        self.messages.front()
    }

    fn clear_latest_message(&mut self) {
        self.messages.pop_front();
    }

    fn send_location_checks(&mut self, locations: &[i64]) {
        self.sent_checks.extend_from_slice(locations);
        if self.echo_checks {
            self.events
                .push_back(SessionEvent::LocationsChecked(locations.to_vec()));
        }
    }

    fn send_location_scouts(&mut self, locations: &[i64], _create_as_hint: bool) {
        self.scout_requests.push(locations.to_vec());
        if self.answer_scouts {
            let items = locations
                .iter()
                .map(|&location| NetworkItem {
                    item: 0,
                    location,
                    player: 1,
                    flags: self.scout_flags.get(&location).copied().unwrap_or(0),
                })
                .collect();
            self.events.push_back(SessionEvent::LocationInfo(items));
        }
    }

    fn send_chat(&mut self, text: &str) {
        self.chat.push(text.to_string());
    }

    fn story_complete(&mut self) {
        self.goal_sent = true;
    }

    fn death_link_send(&mut self) {
        if self.death_link_supported {
            self.deaths_sent += 1;
        }
    }

    fn death_link_clear(&mut self) {
        self.death_pending = false;
    }

    fn death_link_pending(&mut self) -> bool {
        self.death_pending
    }
}
