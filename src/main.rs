use std::sync::Arc;

use battlebots::{
    init_logging, AgentConfig, CreateOutcome, HttpPredictionClient, Identity, Registry, WsConnector,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep, Duration};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Settings {
    /// WebSocket endpoint of the game server.
    #[arg(
        long,
        env = "GAME_SERVER_URL",
        default_value = "ws://game-server.frontend.svc.cluster.local:8080/game"
    )]
    game_server_url: String,
    /// Base URL of the prediction service.
    #[arg(long, env = "AI_SERVER_URL")]
    ai_server_url: String,
    #[arg(long, env = "GAME_GRID_SIZE", default_value_t = battlebots::GRID_SIZE)]
    grid_size: u8,
    /// Minimum thinking time before an attack is sent, in milliseconds.
    #[arg(long, env = "MIN_ATTACK_DELAY", default_value_t = 3250)]
    min_attack_delay: u64,
    /// Delay applied to every outbound message, in milliseconds.
    #[arg(long, env = "AGENT_SEND_DELAY", default_value_t = 1000)]
    send_delay: u64,
    #[arg(long, default_value_t = battlebots::MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,
}

impl Settings {
    fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            grid_size: self.grid_size,
            min_attack_delay: Duration::from_millis(self.min_attack_delay),
            send_delay: Duration::from_millis(self.send_delay),
            max_reconnect_attempts: self.max_reconnect_attempts,
            ..AgentConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Play one match as a single bot until it retires.
    Run {
        #[arg(long)]
        uuid: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        game_id: String,
    },
    /// Connect many bots with random identities to the same game.
    Swarm {
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long)]
        game_id: String,
        #[arg(long, help = "Fix RNG seed for reproducible identities (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
}

fn random_uuid(rng: &mut SmallRng) -> String {
    let hex = format!("{:032x}", rng.random::<u128>());
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = cli.settings.agent_config();

    let predictor = Arc::new(HttpPredictionClient::new(
        &cli.settings.ai_server_url,
        config.prediction_timeout,
    )?);
    info!("using prediction endpoint {}", predictor.endpoint());
    let registry = Registry::new(
        cli.settings.game_server_url.clone(),
        config,
        Arc::new(WsConnector::new()),
        predictor,
    );

    let on_interrupt = registry.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, retiring all agents");
            on_interrupt.retire_all();
        }
    });

    match cli.command {
        Commands::Run {
            uuid,
            username,
            game_id,
        } => {
            registry.create(Identity::new(uuid, username, game_id)).await;
        }
        Commands::Swarm {
            count,
            game_id,
            seed,
        } => {
            let mut rng = match seed {
                Some(s) => SmallRng::seed_from_u64(s),
                None => SmallRng::from_rng(&mut rand::rng()),
            };
            info!("starting {} agents for game {}", count, game_id);
            for n in 0..count {
                let uuid = random_uuid(&mut rng);
                let username = format!("bot-{}", &uuid[..8]);
                if registry
                    .create(Identity::new(uuid, username, game_id.clone()))
                    .await
                    == CreateOutcome::AlreadyExisted
                {
                    warn!("agent {} collided with an existing id", n);
                }
                sleep(Duration::from_millis(rng.random_range(50..=100))).await;
            }
        }
    }

    registry.wait_idle().await;
    info!("all agents retired");
    Ok(())
}
