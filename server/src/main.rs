use clap::Parser;
use log::{error, info};
use rand::Rng;
use server::game::{GameConfig, GameState};
use server::gateway::Gateway;
use server::network::Server;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, builds the world from its seed and runs the server
/// until it fails or Ctrl+C is received.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8000")]
        port: u16,
        /// Tick rate (updates per second)
        #[clap(short, long, default_value = "20")]
        tick_rate: u32,
        /// Maximum number of connected players
        #[clap(short, long, default_value = "50")]
        max_players: usize,
        /// Seconds without a message before a player is evicted
        #[clap(long, default_value = "30")]
        player_timeout: u64,
        /// World seed; random when omitted
        #[clap(short, long)]
        seed: Option<u32>,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = GameConfig {
        max_players: args.max_players,
        tick_rate: args.tick_rate,
        player_timeout: Duration::from_secs(args.player_timeout),
        ..GameConfig::default()
    };
    let tick_duration = config.tick_duration();

    let seed = args
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen_range(1..=1_000_000));
    info!("World seed {}", seed);

    let gateway = Gateway::new(GameState::new(config, seed));

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, gateway, tick_duration).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
