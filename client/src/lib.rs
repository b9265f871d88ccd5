//! # Session Sync Engine
//!
//! This library keeps a single-player DOOM-family game in sync with a
//! multiworld coordination server. It owns the player's persistent progress,
//! turns network traffic into game-side effects and persists everything to
//! disk between runs.
//!
//! ## Architecture Overview
//!
//! The engine is driven entirely by the host game. The host creates a
//! [`session::Session`] once, then calls [`session::Session::update`] every
//! game tick. All network I/O happens on a separate transport thread; the game
//! thread only ever polls queues, so a slow or dead server never stalls a frame.
//!
//! ### Bootstrap
//! [`session::Session::initialize`] resolves the game profile, authenticates
//! the slot, restores the JSON snapshot from the seed's save directory and
//! scouts every location of the enabled episodes to learn which of them hold
//! progression items. It either returns a ready session or an
//! [`error::InitError`].
//!
//! ### Event Ingestion
//! Received items are applied to session state immediately. Their in-game
//! effect is granted through [`session::GameHost::give_item`] when the player
//! is in a level, and queued otherwise. A persisted received-item index keeps
//! items that the server replays on reconnect from being granted twice.
//!
//! ### Persistence
//! The snapshot is written on shutdown and loaded leniently: unknown or
//! missing fields are skipped, so snapshots from older builds keep working.
//!
//! ## Module Organization
//!
//! - `config`: connection settings and bootstrap timings
//! - `error`: error types for bootstrap, snapshots and level select
//! - `state`: player and per-level state, slot options, level flipping
//! - `persistence`: the `apstate.json` snapshot
//! - `messaging`: the [`messaging::MessagingClient`] seam and an in-memory client
//! - `network`: the UDP implementation of the messaging seam
//! - `session`: bootstrap, per-tick update and outbound operations
//! - `events`: application of received items, checks and scout results
//! - `levels`: level select and per-level save games
//! - `notifications`: the falling item-icon stack
//! - `messages`: formatting of server print messages
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::{BootstrapTimings, ConnectionSettings};
//! use client::network::UdpMessagingClient;
//! use client::session::{GameHost, Session};
//! use shared::LevelId;
//!
//! struct Host;
//!
//! impl GameHost for Host {
//!     fn give_item(&mut self, effect_code: i32, level: Option<LevelId>) {
//!         println!("give {} for {:?}", effect_code, level);
//!     }
//! }
//!
//! let settings = ConnectionSettings::new("127.0.0.1:38281", "DOOM II", "Player");
//! let mut session = Session::initialize(
//!     &settings,
//!     UdpMessagingClient::new(),
//!     Box::new(Host),
//!     &BootstrapTimings::default(),
//! )?;
//!
//! session.set_in_game(true);
//! loop {
//!     session.update();
//!     # break;
//! }
//! session.shutdown();
//! # Ok::<(), client::error::InitError>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod levels;
pub mod messages;
pub mod messaging;
pub mod network;
pub mod notifications;
pub mod persistence;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;
