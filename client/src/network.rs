//! UDP transport for a session.
//!
//! The socket lives on a dedicated I/O thread running a single-threaded tokio
//! runtime. The game thread talks to it through two unbounded channels: it
//! pushes outbound [`Packet`]s and drains inbound ones whenever the session
//! polls. Nothing on the game thread ever waits on the network.

use crate::config::ConnectionSettings;
use crate::messaging::{ConnectionStatus, MessagingClient, SessionEvent};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{ClientVersion, Packet, PrintMessage, RoomInfo, SlotData, MAX_DATAGRAM};
use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::interval;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

type TransportError = Box<dyn std::error::Error + Send + Sync>;

enum Inbound {
    Packet(Packet),
    Failed(String),
}

pub struct UdpMessagingClient {
    version: ClientVersion,
    death_link: bool,
    slot: String,
    status: ConnectionStatus,
    room: Option<RoomInfo>,
    slot_data: Option<SlotData>,
    events: VecDeque<SessionEvent>,
    messages: VecDeque<PrintMessage>,
    death_pending: bool,
    outbound: Option<UnboundedSender<Packet>>,
    inbound: Option<UnboundedReceiver<Inbound>>,
    worker: Option<JoinHandle<()>>,
}

impl Default for UdpMessagingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpMessagingClient {
    pub fn new() -> Self {
        Self {
            version: crate::config::CLIENT_VERSION,
            death_link: false,
            slot: String::new(),
            status: ConnectionStatus::Disconnected,
            room: None,
            slot_data: None,
            events: VecDeque::new(),
            messages: VecDeque::new(),
            death_pending: false,
            outbound: None,
            inbound: None,
            worker: None,
        }
    }

    fn send_packet(&self, packet: Packet) {
        match &self.outbound {
            Some(tx) => {
                if tx.send(packet).is_err() {
                    warn!("Transport is gone, dropping packet");
                }
            }
            None => warn!("Not connected, dropping packet"),
        }
    }

    /// Moves everything the I/O thread received into the local queues.
    fn pump(&mut self) {
        let mut received = Vec::new();
        if let Some(rx) = self.inbound.as_mut() {
            while let Ok(inbound) = rx.try_recv() {
                received.push(inbound);
            }
        }
        for inbound in received {
            match inbound {
                Inbound::Packet(packet) => self.handle_packet(packet),
                Inbound::Failed(reason) => {
                    error!("Transport failed: {}", reason);
                    if self.status == ConnectionStatus::Connecting {
                        self.status = ConnectionStatus::ConnectionRefused(reason);
                    } else {
                        self.status = ConnectionStatus::Disconnected;
                    }
                }
            }
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                slot_id,
                room,
                slot_data,
                checked_locations,
            } => {
                info!("Connected! Slot ID: {}", slot_id);
                self.status = ConnectionStatus::Authenticated;
                self.room = Some(room);
                self.slot_data = Some(slot_data);
                if !checked_locations.is_empty() {
                    self.events
                        .push_back(SessionEvent::LocationsChecked(checked_locations));
                }
            }

            Packet::ConnectionRefused { reason } => {
                warn!("Connection refused: {}", reason);
                self.status = ConnectionStatus::ConnectionRefused(reason);
            }

            Packet::ReceivedItems { index, items } => {
                for (offset, item) in items.into_iter().enumerate() {
                    self.events.push_back(SessionEvent::ItemReceived {
                        index: index + offset as u32,
                        item,
                    });
                }
            }

            Packet::LocationsChecked { locations } => {
                self.events.push_back(SessionEvent::LocationsChecked(locations));
            }

            Packet::LocationInfo { items } => {
                self.events.push_back(SessionEvent::LocationInfo(items));
            }

            Packet::Print { message } => self.messages.push_back(message),

            Packet::DeathLink { source, cause } => {
                if self.death_link && source != self.slot {
                    info!("Death link from {}: {}", source, cause);
                    self.death_pending = true;
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.status = ConnectionStatus::Disconnected;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }
}

impl MessagingClient for UdpMessagingClient {
    fn set_client_version(&mut self, version: ClientVersion) {
        self.version = version;
    }

    fn set_death_link_supported(&mut self, supported: bool) {
        self.death_link = supported;
    }

    fn connect(&mut self, settings: &ConnectionSettings) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let hello = Packet::Connect {
            client_version: self.version,
            game: settings.game.clone(),
            slot: settings.slot.clone(),
            password: settings.password.clone(),
            death_link: self.death_link,
        };
        let address = settings.address.clone();

        let spawned = thread::Builder::new()
            .name("ap-transport".into())
            .spawn(move || run_transport(address, hello, outbound_rx, inbound_tx));
        match spawned {
            Ok(handle) => {
                self.slot = settings.slot.clone();
                self.status = ConnectionStatus::Connecting;
                self.outbound = Some(outbound_tx);
                self.inbound = Some(inbound_rx);
                self.worker = Some(handle);
            }
            Err(e) => {
                error!("Failed to start transport thread: {}", e);
                self.status = ConnectionStatus::ConnectionRefused(e.to_string());
            }
        }
    }

    fn connection_status(&mut self) -> ConnectionStatus {
        self.pump();
        self.status.clone()
    }

    fn room_info(&self) -> Option<&RoomInfo> {
        self.room.as_ref()
    }

    fn slot_data(&self) -> Option<&SlotData> {
        self.slot_data.as_ref()
    }

    fn next_event(&mut self) -> Option<SessionEvent> {
        self.pump();
        self.events.pop_front()
    }

    fn is_message_pending(&mut self) -> bool {
        self.pump();
        !self.messages.is_empty()
    }

    fn latest_message(&self) -> Option<&PrintMessage> {
        self.messages.front()
    }

    fn clear_latest_message(&mut self) {
        self.messages.pop_front();
    }

    fn send_location_checks(&mut self, locations: &[i64]) {
        self.send_packet(Packet::LocationChecks {
            locations: locations.to_vec(),
        });
    }

    fn send_location_scouts(&mut self, locations: &[i64], create_as_hint: bool) {
        self.send_packet(Packet::LocationScouts {
            locations: locations.to_vec(),
            create_as_hint,
        });
    }

    fn send_chat(&mut self, text: &str) {
        self.send_packet(Packet::Say {
            text: text.to_string(),
        });
    }

    fn story_complete(&mut self) {
        self.send_packet(Packet::GoalComplete);
    }

    fn death_link_send(&mut self) {
        if !self.death_link {
            return;
        }
        self.send_packet(Packet::DeathLink {
            source: self.slot.clone(),
            cause: format!("{} died", self.slot),
        });
    }

    fn death_link_clear(&mut self) {
        self.death_pending = false;
    }

    fn death_link_pending(&mut self) -> bool {
        self.pump();
        self.death_pending
    }
}

impl Drop for UdpMessagingClient {
    fn drop(&mut self) {
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(Packet::Disconnect);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Transport thread panicked");
            }
        }
    }
}

fn run_transport(
    address: String,
    hello: Packet,
    outbound: UnboundedReceiver<Packet>,
    inbound: UnboundedSender<Inbound>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = inbound.send(Inbound::Failed(e.to_string()));
            return;
        }
    };

    if let Err(e) = runtime.block_on(transport_loop(&address, hello, outbound, &inbound)) {
        let _ = inbound.send(Inbound::Failed(e.to_string()));
    }
}

async fn transport_loop(
    address: &str,
    hello: Packet,
    mut outbound: UnboundedReceiver<Packet>,
    inbound: &UnboundedSender<Inbound>,
) -> Result<(), TransportError> {
    let server_addr = tokio::net::lookup_host(address)
        .await?
        .next()
        .ok_or_else(|| format!("could not resolve {}", address))?;
    let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server_addr).await?;
    info!("Connecting to server at {}...", server_addr);

    socket.send(&serialize(&hello)?).await?;

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    let mut buffer = vec![0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            result = socket.recv(&mut buffer) => {
                match result {
                    Ok(len) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if inbound.send(Inbound::Packet(packet)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed packet: {}", e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }

            packet = outbound.recv() => {
                let packet = packet.unwrap_or(Packet::Disconnect);
                let disconnect = matches!(packet, Packet::Disconnect);
                let data = serialize(&packet)?;
                if let Err(e) = socket.send(&data).await {
                    error!("Failed to send packet: {}", e);
                }
                if disconnect {
                    info!("Transport closed");
                    break;
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = socket.send(&serialize(&Packet::Ping)?).await {
                    warn!("Failed to send heartbeat: {}", e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::NetworkItem;

    fn item(id: i64) -> NetworkItem {
        NetworkItem {
            item: id,
            location: 0,
            player: 1,
            flags: 0,
        }
    }

    #[test]
    fn test_received_items_are_indexed() {
        let mut client = UdpMessagingClient::new();
        client.handle_packet(Packet::ReceivedItems {
            index: 4,
            items: vec![item(10), item(11)],
        });

        assert_eq!(
            client.next_event(),
            Some(SessionEvent::ItemReceived { index: 4, item: item(10) })
        );
        assert_eq!(
            client.next_event(),
            Some(SessionEvent::ItemReceived { index: 5, item: item(11) })
        );
        assert_eq!(client.next_event(), None);
    }

    #[test]
    fn test_connected_sets_status_and_replays_checks() {
        let mut client = UdpMessagingClient::new();
        client.handle_packet(Packet::Connected {
            slot_id: 1,
            room: RoomInfo {
                seed_name: "99".into(),
                server_version: ClientVersion::new(0, 4, 1),
            },
            slot_data: SlotData::default(),
            checked_locations: vec![7],
        });

        assert_eq!(client.connection_status(), ConnectionStatus::Authenticated);
        assert_eq!(client.room_info().unwrap().seed_name, "99");
        assert_eq!(client.next_event(), Some(SessionEvent::LocationsChecked(vec![7])));
    }

    #[test]
    fn test_refusal() {
        let mut client = UdpMessagingClient::new();
        client.handle_packet(Packet::ConnectionRefused {
            reason: "InvalidPassword".into(),
        });
        assert_eq!(
            client.connection_status(),
            ConnectionStatus::ConnectionRefused("InvalidPassword".into())
        );
    }

    #[test]
    fn test_death_link_ignores_own_deaths() {
        let mut client = UdpMessagingClient::new();
        client.set_death_link_supported(true);
        client.slot = "Me".into();

        client.handle_packet(Packet::DeathLink {
            source: "Me".into(),
            cause: String::new(),
        });
        assert!(!client.death_link_pending());

        client.handle_packet(Packet::DeathLink {
            source: "Other".into(),
            cause: "Other died".into(),
        });
        assert!(client.death_link_pending());
        client.death_link_clear();
        assert!(!client.death_link_pending());
    }

    #[test]
    fn test_death_link_disabled() {
        let mut client = UdpMessagingClient::new();
        client.handle_packet(Packet::DeathLink {
            source: "Other".into(),
            cause: String::new(),
        });
        assert!(!client.death_link_pending());
    }

    #[test]
    fn test_print_messages_queue() {
        let mut client = UdpMessagingClient::new();
        client.handle_packet(Packet::Print {
            message: PrintMessage::generic("hi"),
        });
        assert!(client.is_message_pending());
        assert_eq!(client.latest_message().unwrap().text, "hi");
        client.clear_latest_message();
        assert!(!client.is_message_pending());
    }
}
