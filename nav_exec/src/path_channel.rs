//! # Path channel
//!
//! A single slot, always-latest conduit carrying local paths from the plan manager to trajectory
//! control. Publishing overwrites whatever is in the slot, there is no queue and no backpressure.
//! The receiver only sees the newest path published since it last looked.
//!
//! Each `clear` starts a new epoch. Paths are tagged with the epoch they were published in, so a
//! reader can tell a path taken just before a clear from one published after it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::path::Path;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Slot {
    /// Unread path and the epoch it was published in
    path: Option<(Path, u64)>,

    /// Number of clears so far
    epoch: u64,

    /// Number of paths published into the slot
    num_published: u64,
}

/// Writing end of the channel, held by the plan manager.
pub struct PathSender {
    slot: Arc<Mutex<Slot>>,
}

/// Reading end of the channel, held by trajectory control.
pub struct PathReceiver {
    slot: Arc<Mutex<Slot>>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Create a new connected sender/receiver pair around an empty slot.
pub fn path_channel() -> (PathSender, PathReceiver) {
    let slot = Arc::new(Mutex::new(Slot::default()));

    (
        PathSender { slot: slot.clone() },
        PathReceiver { slot },
    )
}

/// Lock the slot. A panic on the other side of the channel cannot leave the slot half written, so
/// a poisoned lock is recovered.
fn lock(slot: &Mutex<Slot>) -> MutexGuard<Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathSender {
    /// Publish a new path, replacing any path which has not been read yet.
    pub fn publish(&self, path: Path) {
        let mut slot = lock(&self.slot);
        slot.path = Some((path, slot.epoch));
        slot.num_published += 1;
    }

    /// Drop any path which has not been read yet and start a new epoch.
    pub fn clear(&self) {
        let mut slot = lock(&self.slot);
        slot.path = None;
        slot.epoch += 1;
    }

    /// Number of paths published so far.
    pub fn num_published(&self) -> u64 {
        lock(&self.slot).num_published
    }
}

impl PathReceiver {
    /// Take the newest path published since the last call, or `None` if nothing new arrived.
    pub fn latest(&mut self) -> Option<Path> {
        self.latest_with_epoch().map(|(path, _)| path)
    }

    /// As `latest`, also returning the epoch the path was published in.
    pub fn latest_with_epoch(&mut self) -> Option<(Path, u64)> {
        lock(&self.slot).path.take()
    }

    /// The current epoch.
    pub fn epoch(&self) -> u64 {
        lock(&self.slot).epoch
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loc::Pose2D;
    use std::thread;

    fn path_to(x: f64) -> Path {
        Path::from_points(vec![Pose2D::new(0.0, 0.0, 0.0), Pose2D::new(x, 0.0, 0.0)])
    }

    #[test]
    fn test_round_trip() {
        let (tx, mut rx) = path_channel();

        assert!(rx.latest().is_none());

        tx.publish(path_to(1.0));
        assert_eq!(rx.latest(), Some(path_to(1.0)));

        // Already consumed
        assert!(rx.latest().is_none());
    }

    #[test]
    fn test_only_latest_is_seen() {
        let (tx, mut rx) = path_to_channel_with(&[1.0, 2.0, 3.0]);

        assert_eq!(rx.latest(), Some(path_to(3.0)));
        assert!(rx.latest().is_none());
        assert_eq!(tx.num_published(), 3);
    }

    #[test]
    fn test_clear_drops_unread() {
        let (tx, mut rx) = path_to_channel_with(&[1.0]);

        tx.clear();
        assert!(rx.latest().is_none());

        // Empty paths are still delivered
        tx.publish(Path::new_empty());
        assert_eq!(rx.latest(), Some(Path::new_empty()));
    }

    #[test]
    fn test_clear_starts_new_epoch() {
        let (tx, mut rx) = path_channel();
        assert_eq!(rx.epoch(), 0);

        tx.publish(path_to(1.0));
        let (path, epoch) = rx.latest_with_epoch().unwrap();
        assert_eq!(path, path_to(1.0));
        assert_eq!(epoch, 0);

        // A path read before the clear is now stale
        tx.clear();
        assert_eq!(rx.epoch(), 1);

        tx.publish(path_to(2.0));
        assert_eq!(rx.latest_with_epoch(), Some((path_to(2.0), 1)));
    }

    #[test]
    fn test_across_threads() {
        let (tx, mut rx) = path_channel();

        let jh = thread::spawn(move || {
            for i in 1..=100 {
                tx.publish(path_to(i as f64));
            }
        });
        jh.join().unwrap();

        assert_eq!(rx.latest(), Some(path_to(100.0)));
    }

    #[test]
    fn test_poisoned_lock_recovered() {
        let (tx, mut rx) = path_channel();
        let slot = tx.slot.clone();

        let _ = thread::spawn(move || {
            let _guard = slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        tx.publish(path_to(1.0));
        assert_eq!(rx.latest(), Some(path_to(1.0)));
    }

    fn path_to_channel_with(xs: &[f64]) -> (PathSender, PathReceiver) {
        let (tx, rx) = path_channel();
        for &x in xs {
            tx.publish(path_to(x));
        }
        (tx, rx)
    }
}
