//! The channel shared by the producers of one merge session.

use std::fmt;

use tokio::sync::{broadcast, mpsc};

use crate::config::QueuePolicy;

/// Creates a merge queue: a cloneable [`QueueSender`] for the producers and
/// the [`MergeQueue`] the consumer drains.
///
/// Items pushed by one producer come out in the order they were pushed;
/// nothing is promised about the interleaving of different producers.
///
/// With [`QueuePolicy::Unbounded`] (the default) producers are never held
/// back, so a consumer that stops reading lets memory grow without limit.
/// [`QueuePolicy::Block`] makes producers wait for room.
/// [`QueuePolicy::DropOldest`] keeps producers running and skips the oldest
/// items instead; its capacity is rounded up to a power of two.
pub fn channel<T: Clone>(policy: QueuePolicy) -> (QueueSender<T>, MergeQueue<T>) {
    let (tx, rx) = match (policy, policy.capacity()) {
        (QueuePolicy::Block(_), Some(cap)) => {
            let (tx, rx) = mpsc::channel(cap);
            (Tx::Block(tx), Rx::Block(rx))
        }
        (QueuePolicy::DropOldest(_), Some(cap)) => {
            let (tx, rx) = broadcast::channel(cap);
            (Tx::DropOldest(tx), Rx::DropOldest(rx))
        }
        _ => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Tx::Unbounded(tx), Rx::Unbounded(rx))
        }
    };

    (
        QueueSender { tx },
        MergeQueue {
            rx,
            policy,
            dropped: 0,
        },
    )
}

/// Producer half of a merge queue.
pub struct QueueSender<T> {
    tx: Tx<T>,
}

enum Tx<T> {
    Unbounded(mpsc::UnboundedSender<T>),
    Block(mpsc::Sender<T>),
    DropOldest(broadcast::Sender<T>),
}

impl<T> QueueSender<T> {
    /// Pushes without waiting. A full [`QueuePolicy::Block`] queue, or one
    /// whose consumer is gone, hands the item back.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        match &self.tx {
            Tx::Unbounded(tx) => tx.send(item).map_err(|err| err.0),
            Tx::Block(tx) => tx.try_send(item).map_err(|err| err.into_inner()),
            Tx::DropOldest(tx) => tx.send(item).map(drop).map_err(|err| err.0),
        }
    }

    /// Pushes `item`, waiting for room if the queue blocks producers.
    ///
    /// Fails, handing the item back, only once the consumer has gone away.
    pub async fn push(&self, item: T) -> Result<(), T> {
        match &self.tx {
            Tx::Block(tx) => tx.send(item).await.map_err(|err| err.0),
            _ => self.try_push(item),
        }
    }
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        let tx = match &self.tx {
            Tx::Unbounded(tx) => Tx::Unbounded(tx.clone()),
            Tx::Block(tx) => Tx::Block(tx.clone()),
            Tx::DropOldest(tx) => Tx::DropOldest(tx.clone()),
        };
        QueueSender { tx }
    }
}

impl<T> fmt::Debug for QueueSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("QueueSender").finish_non_exhaustive()
    }
}

/// Consumer half of a merge queue.
pub struct MergeQueue<T> {
    rx: Rx<T>,
    policy: QueuePolicy,
    dropped: u64,
}

enum Rx<T> {
    Unbounded(mpsc::UnboundedReceiver<T>),
    Block(mpsc::Receiver<T>),
    DropOldest(broadcast::Receiver<T>),
}

impl<T: Clone> MergeQueue<T> {
    /// Takes the next item, if one is waiting. Never waits itself, and
    /// returns `None` both when the queue is empty and when every sender is
    /// gone.
    pub fn try_pop(&mut self) -> Option<T> {
        match &mut self.rx {
            Rx::Unbounded(rx) => rx.try_recv().ok(),
            Rx::Block(rx) => rx.try_recv().ok(),
            Rx::DropOldest(rx) => loop {
                match rx.try_recv() {
                    Ok(item) => return Some(item),
                    Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                        self.dropped += skipped;
                    }
                    Err(_) => return None,
                }
            },
        }
    }
}

impl<T> MergeQueue<T> {
    /// Items sent but not taken yet. Under [`QueuePolicy::DropOldest`] this
    /// includes the ones the next [`try_pop`](MergeQueue::try_pop) will skip.
    pub fn len(&self) -> usize {
        match &self.rx {
            Rx::Unbounded(rx) => rx.len(),
            Rx::Block(rx) => rx.len(),
            Rx::DropOldest(rx) => rx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items skipped so far under [`QueuePolicy::DropOldest`].
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }
}

impl<T> fmt::Debug for MergeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MergeQueue")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .field("dropped", &self.dropped)
            .finish()
    }
}
