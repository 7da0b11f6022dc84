//! `webtail`: serve the files of a directory as live, tailing HTTP streams.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use webtail::{Config, QueuePolicy};

#[derive(Debug, Parser)]
#[command(name = "webtail")]
#[command(about = "Tail your filesystem from the web")]
#[command(version)]
struct Cli {
    /// Read from DIR
    #[arg(short = 'd', long = "directory", value_name = "DIR", default_value = ".")]
    directory: PathBuf,

    /// Turn on debug logging
    #[arg(short = 'D', long)]
    debug: bool,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Delay before retrying a read that found nothing new
    #[arg(long, value_name = "MS", default_value_t = 1)]
    poll_interval_ms: u64,

    /// Bound the interleaved queue to N lines (unbounded if omitted)
    #[arg(long, value_name = "N")]
    queue_capacity: Option<usize>,

    /// What a bounded queue does when full
    #[arg(long, value_enum, default_value_t = Overflow::DropOldest, requires = "queue_capacity")]
    overflow: Overflow,

    /// List files in name order instead of directory order
    #[arg(long)]
    sort: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Overflow {
    DropOldest,
    Block,
}

impl Cli {
    fn config(&self) -> Config {
        let queue = match (self.queue_capacity, self.overflow) {
            (None, _) => QueuePolicy::Unbounded,
            (Some(cap), Overflow::DropOldest) => QueuePolicy::DropOldest(cap),
            (Some(cap), Overflow::Block) => QueuePolicy::Block(cap),
        };

        Config::new(&self.directory)
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .queue(queue)
            .sort_listing(self.sort)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.debug { "webtail=debug" } else { "webtail=info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let config = cli.config();
    let app = webtail::server::router(config);

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        root = %cli.directory.display(),
        "serving"
    );

    // Streams never finish, so there is nothing to drain on shutdown.
    tokio::select! {
        res = axum::serve(listener, app).into_future() => res?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }

    Ok(())
}
