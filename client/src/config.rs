use shared::ClientVersion;
use std::path::PathBuf;
use std::time::Duration;

/// Version reported to the server in the `Connect` packet.
pub const CLIENT_VERSION: ClientVersion = ClientVersion::new(0, 4, 1);

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// `host:port` of the coordination server.
    pub address: String,
    /// Game identity string, e.g. `"DOOM II"`.
    pub game: String,
    pub slot: String,
    pub password: String,
    /// Parent of the per-seed save directory.
    pub save_root: PathBuf,
    pub death_link: bool,
    /// Optional JSON table file replacing the built-in profile tables.
    pub profile_tables: Option<PathBuf>,
}

impl ConnectionSettings {
    pub fn new(address: impl Into<String>, game: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            game: game.into(),
            slot: slot.into(),
            password: String::new(),
            save_root: PathBuf::from("."),
            death_link: false,
            profile_tables: None,
        }
    }
}

/// Polling cadence and deadlines of the blocking bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapTimings {
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub scout_timeout: Duration,
}

impl Default for BootstrapTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(10),
            scout_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = ConnectionSettings::new("127.0.0.1:38281", "DOOM II", "Player");
        assert!(settings.password.is_empty());
        assert!(!settings.death_link);
        assert_eq!(settings.save_root, PathBuf::from("."));
    }

    #[test]
    fn test_default_timings() {
        let timings = BootstrapTimings::default();
        assert_eq!(timings.poll_interval, Duration::from_millis(100));
        assert_eq!(timings.connect_timeout, Duration::from_secs(10));
        assert_eq!(timings.scout_timeout, Duration::from_secs(10));
    }
}
