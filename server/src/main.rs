use clap::Parser;
use server::network::{Server, ServerConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the relay socket to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// UDP port to listen on
    #[clap(short, long, default_value = "5002")]
    port: u16,
    /// Host whose ip replaces client source ips in broadcast addresses
    /// (single-gateway environments); resolved once at startup
    #[clap(short, long)]
    gateway: Option<String>,
    /// Number of reusable broadcast buffers
    #[clap(long, default_value = "4")]
    pool_size: usize,
    /// Capacity of each broadcast buffer in bytes
    #[clap(long, default_value = "8192")]
    buffer_capacity: usize,
    /// Accumulated snapshot size in bytes that triggers an immediate flush
    #[clap(long, default_value = "4096")]
    watermark: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let gateway = match &args.gateway {
        Some(host) => {
            let mut addrs = tokio::net::lookup_host((host.as_str(), 0)).await?;
            let addr = addrs
                .next()
                .ok_or_else(|| format!("gateway host {} did not resolve", host))?;
            Some(addr.ip())
        }
        None => None,
    };

    let config = ServerConfig {
        gateway,
        pool_size: args.pool_size,
        buffer_capacity: args.buffer_capacity,
        watermark: args.watermark,
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;
    server.run().await
}
