use shared::{LevelId, ProfileError};
use thiserror::Error;

/// Reasons a session could not be brought up. None of these leave a
/// half-initialized session behind.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
    #[error("timed out waiting for authentication")]
    AuthenticationTimeout,
    #[error("server did not send room information")]
    MissingRoomInfo,
    #[error("timed out waiting for location scouts")]
    ScoutTimeout,
    #[error("failed to prepare the save directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelSelectError {
    #[error("level {0} does not exist")]
    Unknown(LevelId),
    #[error("level {0} is still locked")]
    Locked(LevelId),
    #[error("episode {0} is not part of this seed")]
    EpisodeDisabled(u32),
}
