//! # Coordination Server Library
//!
//! A small multiworld coordination server for DOOM-family session sync
//! clients. It hosts one room: a seed name, a game and a fixed list of slots,
//! each with its own item placement. Clients authenticate as a slot, report
//! checked locations, scout locations ahead of time and exchange chat and
//! death link traffic.
//!
//! ## Module Organization
//!
//! ### Client Manager (`client_manager`)
//! Tracks authenticated connections:
//! - Address to slot mapping
//! - Activity timestamps and timeout detection
//! - Death link subscriptions
//!
//! ### World Module (`world`)
//! Owns per-slot progress:
//! - Seeded item placement over the enabled episodes
//! - Checked locations and the ordered list of received items
//! - Scouting and goal completion
//!
//! ### Network Module (`network`)
//! Handles all networking operations:
//! - UDP socket management and packet processing
//! - Authentication and refusal reasons
//! - Routing of items, prints and death links to the right connections
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::ServerConfig;
//! use shared::GameId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new(GameId::Doom2, "12345", vec!["Player".to_string()]);
//!     let mut server = Server::new("127.0.0.1:38281", config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The server uses an event-driven architecture with internal async tasks:
//! - **Network Receiver**: Continuously listens for incoming packets
//! - **Network Sender**: Processes the outgoing packet queue and broadcasts
//! - **Timeout Checker**: Removes connections silent for more than five seconds
//! - **Main Loop**: Applies packets to the world and queues replies
//!
//! Item state is never lost when a client drops: every reconnect receives the
//! slot's checked locations and its full received-items list from index 0.

pub mod client_manager;
pub mod network;
pub mod world;

use shared::{GameId, SlotData};

/// Room definition.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub game: GameId,
    pub seed_name: String,
    pub slots: Vec<String>,
    /// Empty means no password.
    pub password: String,
    /// Options sent to every slot on connect.
    pub slot_data: SlotData,
    /// Seed of the item placement.
    pub seed: u64,
    pub max_clients: usize,
}

impl ServerConfig {
    pub fn new(game: GameId, seed_name: impl Into<String>, slots: Vec<String>) -> Self {
        Self {
            game,
            seed_name: seed_name.into(),
            slots,
            password: String::new(),
            slot_data: SlotData::default(),
            seed: 0,
            max_clients: 32,
        }
    }
}
