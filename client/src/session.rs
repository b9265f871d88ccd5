//! The session: one connected slot, its persisted state and the host game.
//!
//! A session is created by [`Session::initialize`], which blocks until the
//! slot is authenticated and every location of the enabled episodes has been
//! scouted. From then on the host calls [`Session::update`] once per game
//! tick and reports player actions through the outbound operations.

use crate::config::{BootstrapTimings, ConnectionSettings, CLIENT_VERSION};
use crate::error::{InitError, SnapshotError};
use crate::messages::{format_message, MessageBuffer};
use crate::messaging::{ConnectionStatus, MessagingClient};
use crate::notifications::{NotificationIcon, NotificationScheduler};
use crate::persistence;
use crate::state::{LevelState, PlayerState, SessionState};
use log::{debug, error, info, warn};
use shared::profile::{GameProfile, LevelId, COMPLETE_INDEX};
use shared::to_hex;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Callbacks into the game.
pub trait GameHost {
    /// Grants the effect of an item. `level` is set for per-level items.
    fn give_item(&mut self, effect_code: i32, level: Option<LevelId>);

    fn on_victory(&mut self) {}

    /// A formatted chat/log line, with `~N` color escapes.
    fn on_message(&mut self, _line: &str) {}
}

pub struct Session<C: MessagingClient> {
    pub(crate) profile: GameProfile,
    pub(crate) state: SessionState,
    pub(crate) client: C,
    pub(crate) host: Box<dyn GameHost>,
    pub(crate) notifications: NotificationScheduler,
    pub(crate) messages: MessageBuffer,
    pub(crate) in_game: bool,
    initialized: bool,
    seed_id: String,
    save_dir: PathBuf,
}

/// Calls `f` every `interval` until it yields a value or `deadline` has passed.
fn poll_until<T>(interval: Duration, deadline: Duration, mut f: impl FnMut() -> Option<T>) -> Option<T> {
    let start = Instant::now();
    loop {
        if let Some(value) = f() {
            return Some(value);
        }
        if start.elapsed() >= deadline {
            return None;
        }
        thread::sleep(interval);
    }
}

impl<C: MessagingClient> Session<C> {
    /// Connects, restores the snapshot and scouts the slot's locations.
    pub fn initialize(
        settings: &ConnectionSettings,
        mut client: C,
        host: Box<dyn GameHost>,
        timings: &BootstrapTimings,
    ) -> Result<Self, InitError> {
        let profile = match &settings.profile_tables {
            Some(path) => GameProfile::load(&settings.game, path)?,
            None => GameProfile::for_name(&settings.game)?,
        };
        let mut state = SessionState::new(&profile);

        info!("Connecting to {} as {}", settings.address, settings.slot);
        client.set_client_version(CLIENT_VERSION);
        client.set_death_link_supported(settings.death_link);
        client.connect(settings);

        let authenticated = poll_until(timings.poll_interval, timings.connect_timeout, || {
            match client.connection_status() {
                ConnectionStatus::Authenticated => Some(Ok(())),
                ConnectionStatus::ConnectionRefused(reason) => Some(Err(reason)),
                ConnectionStatus::Disconnected | ConnectionStatus::Connecting => None,
            }
        });
        match authenticated {
            Some(Ok(())) => info!("Authenticated as {}", settings.slot),
            Some(Err(reason)) => {
                error!("Connection refused: {}", reason);
                return Err(InitError::ConnectionRefused(reason));
            }
            None => {
                error!("Timed out waiting for authentication");
                return Err(InitError::AuthenticationTimeout);
            }
        }

        let room = client.room_info().cloned().ok_or(InitError::MissingRoomInfo)?;
        if let Some(slot_data) = client.slot_data() {
            state.apply_slot_data(slot_data);
        }

        let seed_id = format!("AP_{}_{}", room.seed_name, to_hex(&settings.slot));
        let save_dir = settings.save_root.join(&seed_id);
        fs::create_dir_all(&save_dir)?;

        match persistence::load(&mut state, &profile, &save_dir) {
            Ok(true) => info!("Restored session from {}", save_dir.display()),
            Ok(false) => info!("New session in {}", save_dir.display()),
            Err(e) => warn!("Ignoring unreadable snapshot in {}: {}", save_dir.display(), e),
        }
        state.ensure_episode_enabled();
        state.resolve_layout(&seed_id);

        let mut session = Session {
            profile,
            state,
            client,
            host,
            notifications: NotificationScheduler::new(),
            messages: MessageBuffer::default(),
            in_game: false,
            initialized: false,
            seed_id,
            save_dir,
        };

        if session.state.progressive_locations.is_empty() {
            let targets = session.scout_targets();
            info!("Scouting {} locations", targets.len());
            session.client.send_location_scouts(&targets, false);

            let scouted = poll_until(timings.poll_interval, timings.scout_timeout, || {
                session.update();
                (!session.state.progressive_locations.is_empty()).then_some(())
            });
            if scouted.is_none() {
                error!("Timed out waiting for location scouts");
                return Err(InitError::ScoutTimeout);
            }
        }

        session.initialized = true;
        info!(
            "Session {} ready: {} progressive locations",
            session.seed_id,
            session.state.progressive_locations.len()
        );
        Ok(session)
    }

    /// Regular locations of every enabled episode, exits excluded.
    fn scout_targets(&self) -> Vec<i64> {
        self.profile
            .level_ids()
            .filter(|level| self.state.episode_enabled(level.episode))
            .flat_map(|level| self.profile.level_locations(level))
            .filter(|&(index, _)| index != COMPLETE_INDEX)
            .map(|(_, id)| id)
            .collect()
    }

    /// Processes everything the messaging client has queued. Call once per tick.
    pub fn update(&mut self) {
        if self.initialized {
            for line in self.messages.take() {
                self.host.on_message(&line);
            }
        }

        while let Some(event) = self.client.next_event() {
            self.handle_event(event);
        }

        while self.client.is_message_pending() {
            if let Some(message) = self.client.latest_message() {
                info!("{}", message.text);
                let line = format_message(message);
                if self.initialized {
                    self.host.on_message(&line);
                } else {
                    self.messages.push(line);
                }
            }
            self.client.clear_latest_message();
        }

        if self.in_game {
            self.drain_pending_items();
        }

        self.notifications.tick();
    }

    /// Reports a location check. An index of `-1` is the level's exit.
    ///
    /// The check is only recorded locally once the server confirms it.
    /// Indices with no location in `level` are ignored.
    pub fn check_location(&mut self, level: LevelId, index: i32) {
        let Some(id) = self.profile.location_id(level, index) else {
            debug!("No location {} in {}", index, level);
            return;
        };
        if index != COMPLETE_INDEX && self.state.level(level).map_or(false, |l| l.is_checked(index)) {
            debug!("Location {} of {} already checked", index, level);
        }
        self.client.send_location_checks(&[id]);
    }

    /// True when the scout marked the item at this location as progression.
    pub fn is_location_progressive(&self, level: LevelId, index: i32) -> bool {
        self.profile
            .location_id(level, index)
            .map_or(false, |id| self.state.progressive_locations.contains(&id))
    }

    /// Marks a level completed and reports its exit.
    pub fn complete_level(&mut self, level: LevelId) {
        if let Some(state) = self.state.level_mut(level) {
            state.completed = true;
        }
        self.check_location(level, COMPLETE_INDEX);
    }

    /// Declares victory once every level of every enabled episode is completed.
    pub fn check_victory(&mut self) {
        if self.state.victory {
            return;
        }
        let all_completed = self
            .profile
            .level_ids()
            .filter(|level| self.state.episode_enabled(level.episode))
            .all(|level| self.state.level(level).map_or(false, |l| l.completed));
        if !all_completed {
            return;
        }

        info!("All levels completed, goal reached");
        self.state.victory = true;
        self.client.story_complete();
        self.host.on_victory();
    }

    /// Sends a chat line to the room.
    pub fn send_chat(&mut self, text: &str) {
        self.client.send_chat(text);
    }

    /// Tells the other death link players that we died.
    pub fn signal_death(&mut self) {
        info!("Sending death link");
        self.client.death_link_send();
    }

    /// Acknowledges a received death once the host has applied it.
    pub fn clear_death(&mut self) {
        self.client.death_link_clear();
    }

    /// True when another player's death should kill ours.
    pub fn death_pending(&mut self) -> bool {
        self.client.death_link_pending()
    }

    /// `AP_<seed>_<hex slot>`, also the name of the save directory.
    pub fn seed_identifier(&self) -> &str {
        &self.seed_id
    }

    /// Directory holding this slot's snapshot.
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Queued items are only granted while the player is in a level.
    pub fn set_in_game(&mut self, in_game: bool) {
        self.in_game = in_game;
    }

    /// Whether the player is currently in a level.
    pub fn in_game(&self) -> bool {
        self.in_game
    }

    /// Live notification icons, bottom of the stack first.
    pub fn notification_icons(&self) -> &[NotificationIcon] {
        self.notifications.icons()
    }

    /// The game tables this session was started with.
    pub fn profile(&self) -> &GameProfile {
        &self.profile
    }

    /// Read-only view of the session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// State of one level, `None` outside the game's grid.
    pub fn level_state(&self, level: LevelId) -> Option<&LevelState> {
        self.state.level(level)
    }

    /// The host writes player stats back here before saving.
    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.state.player
    }

    /// The messaging client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Mutable access to the messaging client.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Writes the snapshot now. A failure leaves the previous snapshot in place.
    pub fn save(&self) -> Result<(), SnapshotError> {
        persistence::save(&self.state, &self.profile, &self.save_dir)
    }

    /// Writes the final snapshot and drops the connection. A failed save is
    /// logged and does not stop the shutdown.
    pub fn shutdown(self) {
        match self.save() {
            Ok(()) => info!("Saved session to {}", self.save_dir.display()),
            Err(e) => error!("Failed to save session to {}: {}", self.save_dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MemoryClient;
    use crate::state::FlipMode;
    use crate::testing::{offline_session, RecordingHost};
    use shared::{PrintKind, PrintMessage, SlotData};

    #[test]
    fn test_initialize_doom2() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = offline_session("DOOM II", "Player", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });

        assert_eq!(session.profile().episode_count, 1);
        assert_eq!(session.profile().map_count, 32);
        assert_eq!(session.state().player.max_ammo, vec![200, 50, 300, 50]);
        assert!(session.state().episode_enabled(1));
        assert_eq!(session.seed_identifier(), "AP_1234_506C61796572");
        assert!(session.save_dir().is_dir());
        assert!(session.is_location_progressive(LevelId::new(1, 1), 0));
        assert!(!session.is_location_progressive(LevelId::new(1, 1), 1));
    }

    #[test]
    fn test_scouts_skip_exits_and_disabled_episodes() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = offline_session("DOOM 1993", "P", dir.path(), |client| {
            client.slot = Some(SlotData {
                episode2: Some(1),
                ..SlotData::default()
            });
            client.scout_flags.insert(350_900, 1);
        });

        let requested = &session.client().scout_requests[0];
        for &id in requested {
            let loc = session.profile().resolve_location(id).unwrap();
            assert_eq!(loc.level.episode, 2);
            assert_ne!(loc.index, COMPLETE_INDEX);
        }
        assert!(session.is_location_progressive(LevelId::new(2, 1), 0));
    }

    #[test]
    fn test_refused_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MemoryClient::default();
        client.status_on_connect = ConnectionStatus::ConnectionRefused("InvalidSlot".into());
        let mut settings = ConnectionSettings::new("memory", "DOOM II", "Nobody");
        settings.save_root = dir.path().to_path_buf();

        let result = Session::initialize(
            &settings,
            client,
            Box::new(RecordingHost::default()),
            &BootstrapTimings::default(),
        );
        assert!(matches!(result, Err(InitError::ConnectionRefused(reason)) if reason == "InvalidSlot"));
    }

    #[test]
    fn test_authentication_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut client = MemoryClient::default();
        client.status_on_connect = ConnectionStatus::Connecting;
        let mut settings = ConnectionSettings::new("memory", "DOOM II", "P");
        settings.save_root = dir.path().to_path_buf();
        let timings = BootstrapTimings {
            poll_interval: Duration::from_millis(5),
            connect_timeout: Duration::from_millis(30),
            scout_timeout: Duration::from_millis(30),
        };

        let result = Session::initialize(&settings, client, Box::new(RecordingHost::default()), &timings);
        assert!(matches!(result, Err(InitError::AuthenticationTimeout)));
    }

    #[test]
    fn test_unknown_game_fails_before_connecting() {
        let settings = ConnectionSettings::new("memory", "Hexen", "P");
        let result = Session::initialize(
            &settings,
            MemoryClient::authenticated("1", SlotData::default()),
            Box::new(RecordingHost::default()),
            &BootstrapTimings::default(),
        );
        assert!(matches!(result, Err(InitError::Profile(_))));
    }

    #[test]
    fn test_scout_timeout_when_nothing_is_progressive() {
        let dir = tempfile::tempdir().unwrap();
        let client = MemoryClient::authenticated("1", SlotData::default());
        let mut settings = ConnectionSettings::new("memory", "DOOM II", "P");
        settings.save_root = dir.path().to_path_buf();
        let timings = BootstrapTimings {
            poll_interval: Duration::from_millis(5),
            connect_timeout: Duration::from_millis(50),
            scout_timeout: Duration::from_millis(30),
        };

        let result = Session::initialize(&settings, client, Box::new(RecordingHost::default()), &timings);
        assert!(matches!(result, Err(InitError::ScoutTimeout)));
    }

    #[test]
    fn test_messages_before_init_are_released_on_first_update() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, host) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
            client.push_message(PrintMessage::generic("Welcome"));
        });
        assert!(host.lines().is_empty());

        session.client_mut().push_message(PrintMessage {
            kind: PrintKind::ItemSend {
                item: "Shotgun".into(),
                recv_player: "Bob".into(),
            },
            text: "Shotgun was sent to Bob".into(),
        });
        session.update();

        assert_eq!(host.lines(), vec!["~2Welcome", "~9Shotgun~2 was sent to ~4Bob"]);
    }

    #[test]
    fn test_check_location_sends_id() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });

        session.check_location(LevelId::new(1, 1), 2);
        session.check_location(LevelId::new(1, 1), 60);
        assert_eq!(session.client().sent_checks, vec![360_002]);

        session.update();
        assert_eq!(session.level_state(LevelId::new(1, 1)).unwrap().checks(), &[2]);
    }

    #[test]
    fn test_complete_level_reports_exit() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });

        session.complete_level(LevelId::new(1, 3));
        assert!(session.level_state(LevelId::new(1, 3)).unwrap().completed);
        assert_eq!(session.client().sent_checks, vec![360_299]);

        session.update();
        assert_eq!(session.level_state(LevelId::new(1, 3)).unwrap().check_count(), 0);
    }

    #[test]
    fn test_victory_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, host) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });

        for map in 1..=31 {
            session.complete_level(LevelId::new(1, map));
        }
        session.check_victory();
        assert!(!session.state().victory);

        session.complete_level(LevelId::new(1, 32));
        session.check_victory();
        session.check_victory();
        assert!(session.state().victory);
        assert!(session.client().goal_sent);
        assert_eq!(host.victories(), 1);
    }

    #[test]
    fn test_death_link_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });
        assert!(session.client().death_link_supported);

        session.signal_death();
        assert_eq!(session.client().deaths_sent, 1);

        session.client_mut().death_pending = true;
        assert!(session.death_pending());
        session.clear_death();
        assert!(!session.death_pending());
    }

    #[test]
    fn test_send_chat() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });
        session.send_chat("hello");
        assert_eq!(session.client().chat, vec!["hello"]);
    }

    #[test]
    fn test_seeded_flip_layout_from_slot_data() {
        let dir = tempfile::tempdir().unwrap();
        let start = |dir: &Path| {
            let (session, _) = offline_session("DOOM II", "P", dir, |client| {
                client.slot = Some(SlotData {
                    flip_levels: Some(2),
                    ..SlotData::default()
                });
                client.scout_flags.insert(360_000, 1);
            });
            session
        };
        let flips = |state: &SessionState| state.levels().map(|(_, l)| l.flipped).collect::<Vec<_>>();

        let session = start(dir.path());
        assert_eq!(session.state().flip_levels, FlipMode::Seeded);

        let mut expected = SessionState::new(session.profile());
        expected.flip_levels = FlipMode::Seeded;
        expected.resolve_layout("AP_1234_50");
        assert_eq!(flips(session.state()), flips(&expected));

        let layout = flips(session.state());
        session.shutdown();
        let restarted = start(dir.path());
        assert_eq!(flips(restarted.state()), layout);
    }

    #[test]
    fn test_failed_save_does_not_stop_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });
        let save_dir = session.save_dir().to_path_buf();
        fs::remove_dir_all(&save_dir).unwrap();

        assert!(matches!(session.save(), Err(SnapshotError::Io(_))));
        session.shutdown();
        assert!(!save_dir.exists());
    }

    #[test]
    fn test_shutdown_then_restart_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.scout_flags.insert(360_000, 1);
        });
        session.check_location(LevelId::new(1, 4), 1);
        session.update();
        session.player_mut().health = 55;
        session.shutdown();

        // Progressive locations come back from disk, so no scout round trip.
        let (session, _) = offline_session("DOOM II", "P", dir.path(), |client| {
            client.answer_scouts = false;
        });
        assert!(session.client().scout_requests.is_empty());
        assert_eq!(session.state().player.health, 55);
        assert_eq!(session.level_state(LevelId::new(1, 4)).unwrap().checks(), &[1]);
        assert!(session.is_location_progressive(LevelId::new(1, 1), 0));
    }
}
