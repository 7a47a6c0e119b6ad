use clap::Parser;
use log::{error, info};
use server::network::Server;
use server::terrain::OccupancyGrid;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Terrain image the collision grid is built from
    #[arg(short, long)]
    terrain: PathBuf,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value = "64")]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // Terrain problems are fatal, before the socket ever opens.
    let grid = match OccupancyGrid::load(&args.terrain) {
        Ok(grid) => Arc::new(grid),
        Err(e) => {
            error!("Failed to load terrain {}: {}", args.terrain.display(), e);
            return Err(e.into());
        }
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, args.max_clients, grid).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
