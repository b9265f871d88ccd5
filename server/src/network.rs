//! Server network layer handling UDP communications and slot coordination

use crate::client_manager::ClientManager;
use crate::world::World;
use crate::ServerConfig;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PrintKind, PrintMessage, RoomInfo, MAX_DATAGRAM};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Version the server reports in room information.
pub const SERVER_VERSION: shared::ClientVersion = shared::ClientVersion::new(0, 4, 1);

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32, slot: String },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet, exclude: Option<u32> },
}

/// Main server coordinating networking and per-slot worlds
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: World,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let world = World::generate(
            shared::GameProfile::builtin(config.game),
            &config.slots,
            config.slot_data.clone(),
            config.seed,
        );
        info!(
            "Room {} ready: {} with {} slots",
            config.seed_name,
            config.game.name(),
            config.slots.len()
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            world,
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle that stops [`Server::run`] when sent [`ServerMessage::Shutdown`].
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) = server_tx.send(ServerMessage::PacketReceived { packet, addr }) {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client in timed_out {
                    let message = ServerMessage::ClientTimeout {
                        client_id: client.id,
                        slot: client.slot,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet, exclude }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Sends `packet` to every connection of `slot`.
    async fn send_to_slot(&self, packet: Packet, slot: &str) {
        let addrs = {
            let clients = self.clients.read().await;
            clients.slot_addrs(slot)
        };
        for addr in addrs {
            self.send_packet(packet.clone(), addr);
        }
    }

    fn broadcast_print(&self, message: PrintMessage) {
        info!("{}", message.text);
        self.broadcast_packet(Packet::Print { message }, None);
    }

    fn refuse(&self, addr: SocketAddr, reason: &str) {
        warn!("Refusing connection from {}: {}", addr, reason);
        self.send_packet(
            Packet::ConnectionRefused {
                reason: reason.to_string(),
            },
            addr,
        );
    }

    /// Processes incoming packets and updates slot progress
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let authenticated = {
            let mut clients = self.clients.write().await;
            clients.touch(addr);
            clients.lookup(addr)
        };

        match packet {
            Packet::Connect {
                client_version,
                game,
                slot,
                password,
                death_link,
            } => {
                info!(
                    "Client connecting from {} as {} (version: {}.{}.{})",
                    addr, slot, client_version.major, client_version.minor, client_version.build
                );

                if game != self.config.game.name() {
                    return self.refuse(addr, "InvalidGame");
                }
                let Some(slot_world) = self.world.slot(&slot) else {
                    return self.refuse(addr, "InvalidSlot");
                };
                if password != self.config.password {
                    return self.refuse(addr, "InvalidPassword");
                }
                let slot_id = slot_world.id;
                let checked_locations = slot_world.checked();
                let received = slot_world.received().to_vec();

                // Remove existing connection if present
                let client_id = {
                    let mut clients = self.clients.write().await;
                    if let Some((existing_id, _)) = authenticated {
                        info!("Removing existing client {} from {}", existing_id, addr);
                        clients.remove_client(&existing_id);
                    }
                    clients.add_client(addr, &slot, death_link)
                };
                if client_id.is_none() {
                    return self.refuse(addr, "Server full");
                }

                self.send_packet(
                    Packet::Connected {
                        slot_id,
                        room: RoomInfo {
                            seed_name: self.config.seed_name.clone(),
                            server_version: SERVER_VERSION,
                        },
                        slot_data: self.world.slot_data().clone(),
                        checked_locations,
                    },
                    addr,
                );
                if !received.is_empty() {
                    self.send_packet(
                        Packet::ReceivedItems {
                            index: 0,
                            items: received,
                        },
                        addr,
                    );
                }
                self.broadcast_print(PrintMessage::generic(format!(
                    "{} ({}) has joined",
                    slot,
                    self.config.game.name()
                )));
            }

            Packet::Ping => {}

            Packet::Disconnect => {
                if let Some((client_id, slot)) = authenticated {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(&client_id);
                    drop(clients);
                    self.broadcast_print(PrintMessage::generic(format!("{} has left", slot)));
                }
            }

            packet => match authenticated {
                Some((client_id, slot)) => self.handle_slot_packet(packet, client_id, &slot).await,
                None => warn!("Packet from unauthenticated client at {}", addr),
            },
        }
    }

    async fn handle_slot_packet(&mut self, packet: Packet, client_id: u32, slot: &str) {
        match packet {
            Packet::LocationChecks { locations } => {
                let first_new = self.world.slot(slot).map_or(0, |s| s.received().len());
                let found = self.world.check(slot, &locations);

                // Echo every known location so clients that lost an earlier reply catch up.
                let known: Vec<i64> = locations
                    .iter()
                    .copied()
                    .filter(|&id| self.world.profile().resolve_location(id).is_some())
                    .collect();
                if !known.is_empty() {
                    self.send_to_slot(Packet::LocationsChecked { locations: known }, slot)
                        .await;
                }
                if found.is_empty() {
                    return;
                }

                for item in &found {
                    let item_name = self.world.item_name(item.item);
                    let location_name = self.world.location_name(item.location);
                    self.broadcast_print(PrintMessage {
                        kind: PrintKind::ItemSend {
                            item: item_name.clone(),
                            recv_player: slot.to_string(),
                        },
                        text: format!("{} found their {} ({})", slot, item_name, location_name),
                    });
                }
                self.send_to_slot(
                    Packet::ReceivedItems {
                        index: first_new as u32,
                        items: found,
                    },
                    slot,
                )
                .await;
            }

            Packet::LocationScouts {
                locations,
                create_as_hint,
            } => {
                let items = self.world.scout(slot, &locations);
                debug!("{} scouted {} of {} locations", slot, items.len(), locations.len());

                if create_as_hint {
                    let checked = self.world.slot(slot).map(|s| s.checked()).unwrap_or_default();
                    for item in &items {
                        let item_name = self.world.item_name(item.item);
                        let location_name = self.world.location_name(item.location);
                        self.send_to_slot(
                            Packet::Print {
                                message: PrintMessage {
                                    kind: PrintKind::Hint {
                                        item: item_name.clone(),
                                        send_player: slot.to_string(),
                                        recv_player: slot.to_string(),
                                        location: location_name.clone(),
                                        checked: checked.contains(&item.location),
                                    },
                                    text: format!("[Hint]: {}'s {} is at {}", slot, item_name, location_name),
                                },
                            },
                            slot,
                        )
                        .await;
                    }
                }

                self.send_to_slot(Packet::LocationInfo { items }, slot).await;
            }

            Packet::Say { text } => {
                self.broadcast_packet(
                    Packet::Print {
                        message: PrintMessage {
                            kind: PrintKind::Chat,
                            text: format!("{}: {}", slot, text),
                        },
                    },
                    None,
                );
            }

            Packet::GoalComplete => {
                if self.world.complete_goal(slot) {
                    self.broadcast_print(PrintMessage::generic(format!(
                        "{} has completed their goal.",
                        slot
                    )));
                }
            }

            Packet::DeathLink { source, cause } => {
                info!("Death link from {}: {}", source, cause);
                let addrs = {
                    let clients = self.clients.read().await;
                    clients.death_link_addrs(Some(client_id))
                };
                for addr in addrs {
                    self.send_packet(
                        Packet::DeathLink {
                            source: source.clone(),
                            cause: cause.clone(),
                        },
                        addr,
                    );
                }
            }

            _ => {
                warn!("Unexpected packet type from {}", slot);
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::ClientTimeout { client_id, slot }) => {
                    debug!("Client {} timed out", client_id);
                    self.broadcast_print(PrintMessage::generic(format!("{} has left", slot)));
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
