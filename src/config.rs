//! The context object handed to every component.
//!
//! Nothing in this crate reads process-wide state: the root directory, the
//! poll interval and the queue policy all travel in a [`Config`], which makes
//! it cheap to run several independent roots side by side and to shrink the
//! timings in tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::runtime::Handle;

/// Delay between unsuccessful polls, used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Number of consecutive empty polls after which a tail checks that its path
/// still exists.
pub const DEFAULT_LIVENESS_POLLS: u32 = 1000;

/// Capacity handling for the queue shared by the producers of one merge
/// session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum QueuePolicy {
    /// Never blocks and never drops. A stalled consumer lets the queue grow
    /// without limit.
    #[default]
    Unbounded,
    /// Keeps the newest `capacity` items, rounded up to a power of two, and
    /// skips older ones the consumer fell behind on.
    DropOldest(usize),
    /// Keeps at most `capacity` items; producers wait for room.
    Block(usize),
}

impl QueuePolicy {
    pub(crate) fn capacity(&self) -> Option<usize> {
        match *self {
            QueuePolicy::Unbounded => None,
            QueuePolicy::DropOldest(cap) | QueuePolicy::Block(cap) => Some(cap.max(1)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    root: PathBuf,
    poll_interval: Duration,
    queue: QueuePolicy,
    sort_listing: bool,
    liveness_polls: u32,
    runtime: Option<Handle>,
}

impl Config {
    /// Creates a config rooted at `root`, with default timings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Config {
            root: root.into(),
            ..Config::default()
        }
    }

    /// Sets the delay between unsuccessful polls. Zero is raised to the
    /// default so that idle tasks still yield to the scheduler.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        self
    }

    pub fn queue(mut self, policy: QueuePolicy) -> Self {
        self.queue = policy;
        self
    }

    /// Sorts directory listings by name instead of returning them in
    /// directory order.
    pub fn sort_listing(mut self, sort: bool) -> Self {
        self.sort_listing = sort;
        self
    }

    /// Sets how many consecutive empty polls pass between checks that a
    /// tailed path still exists. `0` disables the check.
    pub fn liveness_polls(mut self, polls: u32) -> Self {
        self.liveness_polls = polls;
        self
    }

    /// Spawns merge producers onto `handle` rather than the ambient runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn root_dir(&self) -> &Path {
        self.root.as_path()
    }

    pub fn poll_every(&self) -> Duration {
        self.poll_interval
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        self.queue
    }

    pub fn sorts_listing(&self) -> bool {
        self.sort_listing
    }

    pub fn liveness_every(&self) -> u32 {
        self.liveness_polls
    }

    pub(crate) fn runtime_handle(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root: PathBuf::from("."),
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue: QueuePolicy::default(),
            sort_listing: false,
            liveness_polls: DEFAULT_LIVENESS_POLLS,
            runtime: None,
        }
    }
}
