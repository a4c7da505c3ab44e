use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// Per-submission mutual exclusion. At most one delivery (automated, replay
/// or recovery) runs for a given submission id at a time.
///
/// Entries live only while someone holds or waits for the lock; the last
/// guard to drop removes its id from the map.
#[derive(Default)]
pub struct DeliveryLocks {
    locks: Arc<LockMap>,
}

pub struct DeliveryGuard {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl DeliveryGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        // Release first so our clone of the Arc is gone before the count check.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl DeliveryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    fn guard(&self, id: Uuid, guard: OwnedMutexGuard<()>) -> DeliveryGuard {
        DeliveryGuard {
            id,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Returns `None` when a delivery for `id` is already in flight.
    pub fn try_acquire(&self, id: Uuid) -> Option<DeliveryGuard> {
        match self.lock_for(id).try_lock_owned() {
            Ok(guard) => Some(self.guard(id, guard)),
            Err(_) => {
                // The holder may have released between our clone and the check.
                self.locks
                    .remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
                None
            }
        }
    }

    /// Waits for any in-flight delivery of `id` to finish.
    pub async fn acquire(&self, id: Uuid) -> DeliveryGuard {
        let guard = self.lock_for(id).lock_owned().await;
        self.guard(id, guard)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
