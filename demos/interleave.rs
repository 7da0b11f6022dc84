//! Demonstrates the merged stream of every file in a directory.
//!
//! Usage:
//!     interleave [/path/to/dir]
//!
//! Stop with Ctrl-C; the session's tails are cancelled on the way out.

use futures_util::stream::StreamExt;

use webtail::{Config, Multiplexer};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());

    let mux = Multiplexer::new(Config::new(root).sort_listing(true));
    let mut merged = mux.merge_all().await?;
    eprintln!("tailing {:?}", merged.sources());

    loop {
        tokio::select! {
            line = merged.next() => match line {
                Some(line) => print!("{}", line),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    merged.shutdown().await;
    Ok(())
}
