use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use satsim::{api, store};

#[derive(Parser)]
#[command(name = "satsim")]
#[command(about = "Virtual satellite tasking simulator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the simulator API server
    Serve {
        /// Port for the HTTP API
        #[arg(short, long, default_value = "6005")]
        port: u16,

        /// Seed the demo satellite fleet and ground stations on startup
        #[arg(long)]
        seed: bool,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "satsim=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(port: u16, seed: bool) -> anyhow::Result<()> {
    let store = store::Store::open_default()?;
    if seed {
        let satellites = store.seed_satellites();
        let stations = store.seed_ground_stations();
        tracing::info!(
            satellites = satellites.len(),
            ground_stations = stations.len(),
            "seeded demo registries"
        );
    }

    let app = api::create_router(store, api::SecurityConfig::from_env());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("satsim server listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port, seed }) => serve(port, seed).await?,
        None => serve(6005, false).await?,
    }

    Ok(())
}
