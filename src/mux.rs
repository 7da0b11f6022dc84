//! Merging the tails of every file under a root into one stream.

use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task;
use std::time::Duration;

use futures_util::ready;
use futures_util::stream::Stream as FuturesStream;
use std::future::Future;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, Sleep};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::dir::Directory;
use crate::error::Result;
use crate::queue::{self, MergeQueue, QueueSender};
use crate::session::Session;
use crate::tail::Tail;

/// A line read from one of the merged files.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Line {
    /// Name of the file, relative to the root, where the line was read.
    source: String,
    /// The line itself, terminator included.
    line: String,
}

impl Line {
    pub fn source(&self) -> &str {
        self.source.as_str()
    }

    pub fn line(&self) -> &str {
        self.line.as_str()
    }

    /// Returns the internal components that make up a `Line`.
    pub fn into_inner(self) -> (String, String) {
        let Line { source, line } = self;

        (source, line)
    }
}

/// Formats as `<source>: <line>`.
impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.line)
    }
}

/// Starts merge sessions over the files of one root directory.
#[derive(Clone, Debug)]
pub struct Multiplexer {
    config: Config,
    dir: Directory,
}

impl Multiplexer {
    pub fn new(config: Config) -> Self {
        let dir = Directory::new(&config);
        Multiplexer { config, dir }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn directory(&self) -> &Directory {
        &self.dir
    }

    /// Snapshots the file list and starts one tail per file, all feeding a
    /// single [`Merged`] stream.
    ///
    /// Only a failure to list the directory fails the call. A file that
    /// can't be opened, or fails later on, stops its own tail and nothing
    /// else. Files created after the snapshot are not picked up.
    pub async fn merge_all(&self) -> Result<Merged> {
        self.merge_all_with_token(CancellationToken::new()).await
    }

    /// Like [`merge_all`](Multiplexer::merge_all), with the session tied to
    /// `parent`: cancelling it stops every tail of the session.
    pub async fn merge_all_with_token(&self, parent: CancellationToken) -> Result<Merged> {
        let sources = self.dir.list().await?;

        let token = parent.child_token();
        let (tx, queue) = queue::channel(self.config.queue_policy());
        let gauge = ProducerGauge::default();
        let mut producers = JoinSet::new();

        for source in &sources {
            let path = match self.dir.resolve(source) {
                Ok(path) => path,
                Err(err) => {
                    warn!(source = %source, error = %err, "not tailing file");
                    continue;
                }
            };

            let producer = produce(
                source.clone(),
                path,
                self.config.clone(),
                tx.clone(),
                token.child_token(),
                gauge.enter(),
            );
            match self.config.runtime_handle() {
                Some(handle) => producers.spawn_on(producer, handle),
                None => producers.spawn(producer),
            };
        }

        debug!(
            root = %self.dir.root().display(),
            files = sources.len(),
            "merge session started"
        );

        Ok(Merged {
            queue,
            sources,
            producers,
            gauge,
            _cancel_on_drop: token.clone().drop_guard(),
            token,
            poll_interval: self.config.poll_every(),
            delay: Box::pin(time::sleep(Duration::ZERO)),
            waiting: false,
        })
    }
}

/// Tails one file into the session queue until cancelled or failed.
async fn produce(
    source: String,
    path: PathBuf,
    config: Config,
    queue: QueueSender<Line>,
    token: CancellationToken,
    _live: LiveProducer,
) {
    let mut tail = match Tail::open_with_token(path, &config, token.clone()).await {
        Ok(tail) => tail,
        Err(err) => {
            warn!(source = %source, error = %err, "not tailing file");
            return;
        }
    };

    loop {
        let line = match tail.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(source = %source, error = %err, "tail ended");
                break;
            }
        };
        trace!(source = %source, "queueing line");

        let item = Line {
            source: source.clone(),
            line,
        };
        tokio::select! {
            _ = token.cancelled() => break,
            pushed = queue.push(item) => {
                if pushed.is_err() {
                    break;
                }
            }
        }

        // Let sibling producers and the consumer run between lines.
        tokio::task::yield_now().await;
    }

    debug!(source = %source, "producer stopped");
}

/// Counts the producers of a session that are still running.
#[derive(Clone, Debug, Default)]
pub struct ProducerGauge {
    live: Arc<AtomicUsize>,
}

impl ProducerGauge {
    fn enter(&self) -> LiveProducer {
        self.live.fetch_add(1, Ordering::SeqCst);
        LiveProducer {
            live: Arc::clone(&self.live),
        }
    }

    /// Producers that have neither finished nor been torn down yet. Drops
    /// to zero once every tail of the session released its file.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Held by a producer task; dropping it (task exit or abort) decrements the
/// gauge.
struct LiveProducer {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveProducer {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The merged line stream of one session.
///
/// Yields every line of every file in the snapshot, each file's lines in
/// file order. The stream doesn't end on its own; dropping it, or cancelling
/// its token, stops all of its tails and releases their file handles.
pub struct Merged {
    queue: MergeQueue<Line>,
    sources: Vec<String>,
    producers: JoinSet<()>,
    gauge: ProducerGauge,
    _cancel_on_drop: DropGuard,
    token: CancellationToken,
    poll_interval: Duration,
    delay: Pin<Box<Sleep>>,
    waiting: bool,
}

impl Merged {
    /// Names of the files in the session snapshot.
    pub fn sources(&self) -> &[String] {
        self.sources.as_slice()
    }

    /// Producers that are still running.
    pub fn live_producers(&self) -> usize {
        self.gauge.live()
    }

    /// A gauge that stays readable after the session is gone.
    pub fn gauge(&self) -> ProducerGauge {
        self.gauge.clone()
    }

    /// The token governing this session's tails.
    pub fn session_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Lines queued but not yet consumed.
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Lines skipped by a drop-oldest queue.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Binds the stream to a [`Session`], for handing to a consumer.
    pub fn into_session(self) -> Session<Merged> {
        let token = self.token.clone();
        Session::new(self, token)
    }

    /// Cancels the session and waits for every producer to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        while self.producers.join_next().await.is_some() {}
        debug!(files = self.sources.len(), "merge session shut down");
    }
}

impl fmt::Debug for Merged {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Merged")
            .field("sources", &self.sources)
            .field("queue", &self.queue)
            .field("live_producers", &self.gauge.live())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl FuturesStream for Merged {
    type Item = Line;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if this.token.is_cancelled() {
                return task::Poll::Ready(None);
            }

            if let Some(line) = this.queue.try_pop() {
                this.waiting = false;
                return task::Poll::Ready(Some(line));
            }

            // Queue is empty: wait one poll interval and look again.
            if !this.waiting {
                let deadline = Instant::now() + this.poll_interval;
                this.delay.as_mut().reset(deadline);
                this.waiting = true;
            }
            ready!(this.delay.as_mut().poll(cx));
            this.waiting = false;
        }
    }
}
