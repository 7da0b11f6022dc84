//! Everything related to incrementally reading a single file.

use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{is_transient, Error, Result};
use crate::session::Session;

/// An open tail on one file.
///
/// A tail starts at offset zero, so it first replays everything already in
/// the file and then keeps producing lines as they are appended. When no
/// complete line is available it sleeps for the configured poll interval and
/// tries again; it never ends on its own. Content without a trailing `\n` is
/// held back until the terminator shows up.
///
/// Each `Tail` owns its file handle and cursor, so any number of tails on
/// the same file progress independently.
#[derive(Debug)]
pub struct Tail {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes of a line whose terminator hasn't been written yet.
    partial: Vec<u8>,
    /// Bytes handed out as complete lines so far.
    offset: u64,
    poll_interval: Duration,
    liveness_polls: u32,
    idle_polls: u32,
    token: CancellationToken,
    done: bool,
}

impl Tail {
    /// Opens `path` for tailing.
    ///
    /// Fails with [`Error::FileOpen`] if the file is missing, unreadable or
    /// a directory. There is no retry.
    pub async fn open(path: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        Self::open_with_token(path, config, CancellationToken::new()).await
    }

    /// Like [`open`](Tail::open), but the tail stops as soon as `token` is
    /// cancelled.
    pub async fn open_with_token(
        path: impl Into<PathBuf>,
        config: &Config,
        token: CancellationToken,
    ) -> Result<Self> {
        let path = path.into();
        let open_err = |source| Error::FileOpen {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).await.map_err(open_err)?;
        // Opening a directory succeeds on some platforms, reading it doesn't.
        if file.metadata().await.map_err(open_err)?.is_dir() {
            return Err(open_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "is a directory",
            )));
        }

        debug!(path = %path.display(), "opened tail");

        Ok(Tail {
            path,
            reader: BufReader::new(file),
            partial: Vec::new(),
            offset: 0,
            poll_interval: config.poll_every(),
            liveness_polls: config.liveness_every(),
            idle_polls: 0,
            token,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Number of bytes emitted as complete lines. Only ever grows.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// A handle that stops this tail when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Waits for the next complete line, terminator included.
    ///
    /// Returns `Ok(None)` once the tail was cancelled, or after it already
    /// reported an error. Transient read errors are retried silently.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if self.done || self.token.is_cancelled() {
                return Ok(None);
            }

            match self.reader.read_until(b'\n', &mut self.partial).await {
                Ok(_) if self.partial.last() == Some(&b'\n') => {
                    self.idle_polls = 0;
                    return Ok(Some(self.take_line()));
                }
                // EOF, possibly after buffering part of a line.
                Ok(_) => {}
                Err(e) if is_transient(&e) => {
                    trace!(path = %self.path.display(), error = %e, "transient read error");
                }
                Err(source) => {
                    self.done = true;
                    return Err(Error::Read {
                        path: self.path.clone(),
                        source,
                    });
                }
            }

            self.idle_polls = self.idle_polls.wrapping_add(1);
            if self.liveness_polls > 0 && self.idle_polls % self.liveness_polls == 0 {
                self.check_liveness().await?;
            }

            tokio::select! {
                _ = self.token.cancelled() => return Ok(None),
                _ = time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Turns the tail into a stream of lines.
    ///
    /// The stream ends after cancellation, or right after yielding the first
    /// error.
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> + Send + 'static {
        stream::unfold(Some(self), |state| async move {
            let mut tail = state?;
            match tail.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(tail))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Like [`into_stream`](Tail::into_stream), bound to a [`Session`] that
    /// cancels the tail when dropped.
    pub fn into_session(self) -> Session<impl Stream<Item = Result<String>> + Send + 'static> {
        let token = self.token.clone();
        Session::new(self.into_stream(), token)
    }

    fn take_line(&mut self) -> String {
        let raw = mem::take(&mut self.partial);
        self.offset += raw.len() as u64;

        let line = String::from_utf8(raw)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned());
        trace!(path = %self.path.display(), offset = self.offset, "line complete");
        line
    }

    async fn check_liveness(&mut self) -> Result<()> {
        match fs::metadata(&self.path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.done = true;
                debug!(path = %self.path.display(), "tailed file is gone");
                Err(Error::FileGone {
                    path: self.path.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}
