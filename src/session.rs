//! Binding a line stream to the lifetime of its consumer.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task;

use futures_util::ready;
use futures_util::stream::Stream as FuturesStream;
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;
use tracing::debug;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pin_project! {
/// One consumer's tail, single-file or merged.
///
/// A session lives exactly as long as whoever reads it. Dropping it, which
/// is what happens when an HTTP client disconnects and its response body
/// goes away, cancels the token behind the wrapped stream so that every tail
/// feeding it stops and closes its file.
pub struct Session<S> {
    #[pin]
    lines: S,
    token: CancellationToken,
    id: u64,
    emitted: u64,
}

impl<S> PinnedDrop for Session<S> {
    fn drop(this: Pin<&mut Self>) {
        let this = this.project();
        this.token.cancel();
        debug!(session = *this.id, lines = *this.emitted, "session closed");
    }
}
}

impl<S> Session<S> {
    /// Wraps `lines`, whose producers stop when `token` is cancelled.
    pub fn new(lines: S, token: CancellationToken) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "session opened");

        Session {
            lines,
            token,
            id,
            emitted: 0,
        }
    }

    /// Identifier used in log output.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Items yielded so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Ends the session without dropping it; the wrapped stream winds down
    /// on its next poll.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl<S: FuturesStream> FuturesStream for Session<S> {
    type Item = S::Item;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        let this = self.project();

        let item = ready!(this.lines.poll_next(cx));
        if item.is_some() {
            *this.emitted += 1;
        }
        task::Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.lines.size_hint()
    }
}
