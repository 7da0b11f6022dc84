//! Tail your filesystem from the web.
//!
//! `webtail` reads text files incrementally as they grow, either one at a
//! time ([`Tail`]) or all files of a directory merged into a single stream
//! ([`Multiplexer`]). Both are plain async streams driven by tokio, which an
//! HTTP layer (see the `server` feature and the `webtail` binary) forwards as
//! a continuous response body.
//!
//! ## Example
//!
//! ```no_run
//! use futures_util::stream::StreamExt;
//! use webtail::{Config, Multiplexer};
//!
//! #[tokio::main]
//! async fn main() -> webtail::Result<()> {
//!     let mux = Multiplexer::new(Config::new("/var/log"));
//!
//!     // Every regular file under /var/log, from the first byte on.
//!     let mut merged = mux.merge_all().await?;
//!
//!     while let Some(line) = merged.next().await {
//!         print!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Caveats
//!
//! Tails poll: when no complete line is available they sleep for the
//! configured interval and look again, instead of subscribing to filesystem
//! events. Rotation and truncation are not handled, and every tail starts
//! from the beginning of its file.

mod config;
mod dir;
mod error;
mod mux;
mod queue;
mod session;
mod tail;

#[cfg(feature = "server")]
pub mod server;

pub use config::{Config, QueuePolicy, DEFAULT_LIVENESS_POLLS, DEFAULT_POLL_INTERVAL};
pub use dir::Directory;
pub use error::{Error, Result};
pub use mux::{Line, Merged, Multiplexer, ProducerGauge};
pub use queue::{MergeQueue, QueueSender};
pub use session::Session;
pub use tail::Tail;
pub use tokio_util::sync::CancellationToken;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
