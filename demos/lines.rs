//! Demonstrates tailing a set of files, one task per file.
//!
//! Usage:
//!     lines /path/to/file1 /path/to/file2 ...
//!
//! Each file is printed from its first line on, then followed as data is
//! appended to it.

use futures_util::stream::{self, StreamExt};

use webtail::{Config, Tail};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::default();

    let mut tails = Vec::new();
    for f in args {
        let tail = Tail::open(&f, &config).await?;
        tails.push(tail.into_stream().map(move |line| (f.clone(), line)).boxed());
    }

    let mut lines = stream::select_all(tails);
    while let Some((source, line)) = lines.next().await {
        print!("({}) {}", source, line?);
    }

    Ok(())
}
