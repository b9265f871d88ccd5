//! Headless client: plays a slot by itself at 35 ticks per second, checking one
//! location every few ticks and exiting each level once it is cleared.

use clap::Parser;
use client::config::{BootstrapTimings, ConnectionSettings};
use client::messages::plain_text;
use client::messaging::MessagingClient;
use client::network::UdpMessagingClient;
use client::session::{GameHost, Session};
use log::{info, warn};
use shared::profile::COMPLETE_INDEX;
use shared::LevelId;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_micros(1_000_000 / 35);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:38281")]
    server: String,

    /// Game name, one of "DOOM 1993", "DOOM II" or "Heretic"
    #[arg(short = 'g', long, default_value = "DOOM II")]
    game: String,

    /// Slot (player) name
    #[arg(long)]
    slot: String,

    #[arg(long, default_value = "")]
    password: String,

    /// Directory holding the per-seed save directories
    #[arg(long, default_value = ".")]
    save_root: PathBuf,

    /// JSON table file to use instead of the built-in tables
    #[arg(long)]
    profile: Option<PathBuf>,

    #[arg(long)]
    death_link: bool,

    /// Ticks between two location checks
    #[arg(long, default_value = "70")]
    check_interval: u64,

    /// Stop after this many ticks, 0 plays until victory
    #[arg(long, default_value = "0")]
    ticks: u64,
}

struct ConsoleHost;

impl GameHost for ConsoleHost {
    fn give_item(&mut self, effect_code: i32, level: Option<LevelId>) {
        match level {
            Some(level) => info!("Granted effect {} in {}", effect_code, level),
            None => info!("Granted effect {}", effect_code),
        }
    }

    fn on_victory(&mut self) {
        println!("*** Victory! ***");
    }

    fn on_message(&mut self, line: &str) {
        println!("{}", plain_text(line));
    }
}

/// First unlocked, unfinished level of an enabled episode.
fn next_level<C: MessagingClient>(session: &Session<C>) -> Option<LevelId> {
    session
        .profile()
        .level_ids()
        .filter(|level| session.state().episode_enabled(level.episode))
        .find(|&level| {
            session
                .level_state(level)
                .map_or(false, |l| l.unlocked && !l.completed)
        })
}

fn next_unchecked<C: MessagingClient>(session: &Session<C>, level: LevelId) -> Option<i32> {
    let state = session.level_state(level)?;
    session
        .profile()
        .level_locations(level)
        .map(|(index, _)| index)
        .find(|&index| index != COMPLETE_INDEX && !state.is_checked(index))
}

fn play<C: MessagingClient>(session: &mut Session<C>, check_interval: u64, max_ticks: u64) {
    let mut tick: u64 = 0;
    let mut next_frame = Instant::now();

    while max_ticks == 0 || tick < max_ticks {
        session.update();

        if session.death_pending() {
            warn!("Killed by death link");
            session.clear_death();
        }

        if tick % check_interval.max(1) == 0 {
            match session.state().cursor {
                Some(level) => match next_unchecked(session, level) {
                    Some(index) => session.check_location(level, index),
                    None => {
                        info!("Leaving {}", level);
                        session.complete_level(level);
                        session.return_to_level_select();
                        session.check_victory();
                    }
                },
                None => match next_level(session) {
                    Some(level) => match session.request_level(level) {
                        Ok(_) => session.set_in_game(true),
                        Err(e) => warn!("Cannot enter {}: {}", level, e),
                    },
                    None if session.state().victory => break,
                    None => {}
                },
            }
        }

        tick += 1;
        next_frame += TICK;
        if let Some(wait) = next_frame.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut settings = ConnectionSettings::new(args.server, args.game, args.slot);
    settings.password = args.password;
    settings.save_root = args.save_root;
    settings.profile_tables = args.profile;
    settings.death_link = args.death_link;

    let mut session = Session::initialize(
        &settings,
        UdpMessagingClient::new(),
        Box::new(ConsoleHost),
        &BootstrapTimings::default(),
    )?;
    info!("Playing as {}", session.seed_identifier());

    play(&mut session, args.check_interval, args.ticks);
    session.shutdown();

    Ok(())
}
