use crate::config::{BootstrapTimings, ConnectionSettings};
use crate::messaging::MemoryClient;
use crate::session::{GameHost, Session};
use shared::profile::LevelId;
use shared::SlotData;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Recorded {
    grants: Vec<(i32, Option<LevelId>)>,
    lines: Vec<String>,
    victories: usize,
}

/// Host whose observations stay readable after the session takes ownership of it.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingHost {
    pub fn grants(&self) -> Vec<(i32, Option<LevelId>)> {
        self.inner.lock().unwrap().grants.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().unwrap().lines.clone()
    }

    pub fn victories(&self) -> usize {
        self.inner.lock().unwrap().victories
    }
}

impl GameHost for RecordingHost {
    fn give_item(&mut self, effect_code: i32, level: Option<LevelId>) {
        self.inner.lock().unwrap().grants.push((effect_code, level));
    }

    fn on_victory(&mut self) {
        self.inner.lock().unwrap().victories += 1;
    }

    fn on_message(&mut self, line: &str) {
        self.inner.lock().unwrap().lines.push(line.to_string());
    }
}

/// Session on a [`MemoryClient`] in seed `1234` with death link enabled.
/// `configure` runs before the bootstrap.
pub fn offline_session(
    game: &str,
    slot: &str,
    save_root: &Path,
    configure: impl FnOnce(&mut MemoryClient),
) -> (Session<MemoryClient>, RecordingHost) {
    let mut client = MemoryClient::authenticated("1234", SlotData::default());
    configure(&mut client);

    let mut settings = ConnectionSettings::new("memory", game, slot);
    settings.save_root = save_root.to_path_buf();
    settings.death_link = true;
    let timings = BootstrapTimings {
        poll_interval: Duration::from_millis(1),
        ..BootstrapTimings::default()
    };

    let host = RecordingHost::default();
    let session = Session::initialize(&settings, client, Box::new(host.clone()), &timings).unwrap();
    (session, host)
}
