//! Level-select helpers: per-level save games, entering and leaving levels.

use crate::error::LevelSelectError;
use crate::messaging::MessagingClient;
use crate::session::Session;
use log::info;
use shared::profile::LevelId;
use std::path::PathBuf;

/// How the host should start a level it was allowed to enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelLaunch {
    /// A save game of this level exists and should be loaded.
    Resume(PathBuf),
    Fresh,
}

impl<C: MessagingClient> Session<C> {
    /// Save game of one level inside the seed's save directory.
    pub fn level_save_path(&self, level: LevelId) -> PathBuf {
        let name = if self.profile.game.is_episodic() {
            format!("save_E{}M{}.dsg", level.episode, level.map)
        } else {
            format!("save_MAP{:02}.dsg", level.map)
        };
        self.save_dir().join(name)
    }

    /// Moves the cursor to `level` if the player may enter it.
    pub fn request_level(&mut self, level: LevelId) -> Result<LevelLaunch, LevelSelectError> {
        let unlocked = self
            .state
            .level(level)
            .ok_or(LevelSelectError::Unknown(level))?
            .unlocked;
        if !self.state.episode_enabled(level.episode) {
            return Err(LevelSelectError::EpisodeDisabled(level.episode));
        }
        if !unlocked {
            return Err(LevelSelectError::Locked(level));
        }

        self.state.cursor = Some(level);
        self.check_victory();

        let path = self.level_save_path(level);
        if path.is_file() {
            info!("Resuming {} from {}", level, path.display());
            Ok(LevelLaunch::Resume(path))
        } else {
            info!("Starting {}", level);
            Ok(LevelLaunch::Fresh)
        }
    }

    /// Leaves the current level. Queued items wait until the next one.
    pub fn return_to_level_select(&mut self) {
        self.state.cursor = None;
        self.in_game = false;
    }

    /// Next enabled episode after `from` in the given direction, wrapping around.
    /// Returns `from` when it is the only enabled one.
    pub fn next_enabled_episode(&self, from: u32, forward: bool) -> u32 {
        let count = self.profile.episode_count as u32;
        if count == 0 {
            return from;
        }
        let mut episode = from;
        for _ in 0..count {
            episode = if forward {
                episode % count + 1
            } else if episode <= 1 {
                count
            } else {
                episode - 1
            };
            if self.state.episode_enabled(episode) {
                return episode;
            }
        }
        from
    }
}
