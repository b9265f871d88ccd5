use clap::Parser;
use log::info;
use rand::Rng;
use server::network::Server;
use server::ServerConfig;
use shared::{GameId, SlotData};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "38281")]
    port: u16,

    /// Game name, one of "DOOM 1993", "DOOM II" or "Heretic"
    #[arg(short, long, default_value = "DOOM II")]
    game: String,

    /// Seed name reported to clients; random when omitted
    #[arg(long)]
    seed_name: Option<String>,

    /// Slot name, repeat for more slots
    #[arg(long = "slot", required = true)]
    slots: Vec<String>,

    #[arg(long, default_value = "")]
    password: String,

    /// 0 = off, 1 = every level, 2 = random per level
    #[arg(long, default_value = "0")]
    flip_levels: i32,

    /// Skill level, 0 to 4
    #[arg(long, default_value = "2")]
    difficulty: i32,

    /// Episodes to include, e.g. --episodes 1,3
    #[arg(long, value_delimiter = ',', default_value = "1")]
    episodes: Vec<u32>,

    /// Placement seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let game = GameId::from_name(&args.game).ok_or_else(|| format!("unknown game: {}", args.game))?;
    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let seed_name = args.seed_name.unwrap_or_else(|| seed.to_string());

    let flag = |ep: u32| Some(i32::from(args.episodes.contains(&ep)));
    let slot_data = SlotData {
        difficulty: Some(args.difficulty),
        random_monsters: Some(0),
        random_pickups: Some(0),
        flip_levels: Some(args.flip_levels),
        episode1: flag(1),
        episode2: flag(2),
        episode3: flag(3),
        episode4: flag(4),
        two_ways_keydoors: Some(0),
    };

    let mut config = ServerConfig::new(game, seed_name, args.slots);
    config.password = args.password;
    config.slot_data = slot_data;
    config.seed = seed;

    let address = format!("{}:{}", args.host, args.port);

    info!("Starting server...");
    info!("Seed {} for slots {:?}", config.seed_name, config.slots);

    let mut server = Server::new(&address, config).await?;
    server.run().await?;

    Ok(())
}
