//! Single-value channels that always hold the most recently published value.
//!
//! A [`Publisher`] never blocks: publishing a new value replaces the previous one if the
//! [`Subscriber`] has not taken it yet. This is used to pass camera frames and gestures between
//! threads that run at different rates, where only the newest value matters.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};

/// Creates a connected [`Publisher`] and [`Subscriber`].
pub fn slot<T>() -> (Publisher<T>, Subscriber<T>) {
    let (sender, recv) = channel::bounded(1);
    (
        Publisher {
            sender,
            drain: recv.clone(),
        },
        Subscriber { recv },
    )
}

/// The writing half of a slot.
pub struct Publisher<T> {
    sender: Sender<T>,
    /// Used to discard a stale value that the subscriber has not taken.
    drain: Receiver<T>,
}

impl<T> Publisher<T> {
    /// Stores `value` in the slot, replacing any value the subscriber has not taken yet.
    pub fn publish(&self, mut value: T) {
        loop {
            match self.sender.try_send(value) {
                Ok(()) => return,
                Err(TrySendError::Full(v)) => {
                    self.drain.try_recv().ok();
                    value = v;
                }
                // Cannot happen while `drain` is alive.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// The reading half of a slot.
pub struct Subscriber<T> {
    recv: Receiver<T>,
}

/// Error returned by [`Subscriber::take`] when the [`Publisher`] is gone and no value is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

impl<T> Subscriber<T> {
    /// Takes the latest value out of the slot, without blocking.
    ///
    /// Returns `Ok(None)` if no value was published since the last call.
    pub fn take(&self) -> Result<Option<T>, Closed> {
        match self.recv.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Closed),
        }
    }

    /// Blocks until a value is published.
    pub fn wait(&self) -> Result<T, Closed> {
        self.recv.recv().map_err(|_| Closed)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn empty() {
        let (_publisher, subscriber) = slot::<u32>();
        assert_eq!(subscriber.take(), Ok(None));
    }

    #[test]
    fn overwrites() {
        let (publisher, subscriber) = slot();
        publisher.publish(1);
        publisher.publish(2);
        publisher.publish(3);
        assert_eq!(subscriber.take(), Ok(Some(3)));
        assert_eq!(subscriber.take(), Ok(None));
    }

    #[test]
    fn closed_after_drain() {
        let (publisher, subscriber) = slot();
        publisher.publish("frame");
        drop(publisher);
        assert_eq!(subscriber.take(), Ok(Some("frame")));
        assert_eq!(subscriber.take(), Err(Closed));
        assert_eq!(subscriber.wait(), Err(Closed));
    }

    #[test]
    fn publish_does_not_block_without_reader() {
        let (publisher, subscriber) = slot();
        let handle = thread::spawn(move || {
            for i in 0..1000 {
                publisher.publish(i);
            }
        });
        handle.join().unwrap();
        assert_eq!(subscriber.take(), Ok(Some(999)));
    }

    #[test]
    fn values_are_monotonic() {
        let (publisher, subscriber) = slot();
        let handle = thread::spawn(move || {
            for i in 0..10_000u32 {
                publisher.publish(i);
            }
        });

        let mut last = None;
        while let Ok(value) = subscriber.wait() {
            if let Some(last) = last {
                assert!(value > last);
            }
            last = Some(value);
        }
        handle.join().unwrap();
        assert_eq!(last, Some(9999));
    }
}
