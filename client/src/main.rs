use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay server address to push updates to
    #[arg(short, long, default_value = "127.0.0.1:5002")]
    server: String,

    /// Client id, also used as the player resource id
    #[arg(short, long, default_value = "1")]
    id: u32,

    /// UDP port to receive broadcasts on (0 picks an ephemeral port)
    #[arg(short, long, default_value = "0")]
    listen_port: u16,

    /// Milliseconds between state updates
    #[arg(long, default_value = "10")]
    interval_ms: u64,

    /// Number of updates to send before exiting
    #[arg(short, long, default_value = "1000")]
    count: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting load client {}...", args.id);
    info!("Relay server: {}", args.server);

    let client = Client::new(&args.server, args.id, args.listen_port).await?;
    client.register().await?;
    let receiver = client.spawn_receiver();

    client.run_updates(args.count, args.interval_ms).await?;

    // Give the last broadcast a moment to arrive before reporting.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    info!(
        "Client {} done: {} broadcasts received in final window",
        args.id,
        client.pop_stats()
    );

    receiver.abort();
    Ok(())
}
