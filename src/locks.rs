//! Per-correlation-id shared/exclusive locking

use crate::CorrelationId;
use dashmap::DashMap;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::sync::Arc;

/// Reader/writer lock per correlation id.
///
/// Each held id maps to its own `parking_lot` lock, which is fair between
/// readers and writers: once a writer waits, new readers queue behind it.
/// Entries are dropped when their last holder releases, so ids nobody holds
/// take no space.
#[derive(Default)]
pub struct KeyedLocks {
    table: DashMap<CorrelationId, Arc<RwLock<()>>>,
}

enum Held {
    Shared(ArcRwLockReadGuard<RawRwLock, ()>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, ()>),
}

impl KeyedLocks {
    /// Empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access to `id`; waits while a writer holds or awaits it
    pub fn read(&self, id: CorrelationId) -> KeyGuard<'_> {
        let held = Held::Shared(self.lock_for(id).read_arc());
        KeyGuard {
            locks: self,
            id,
            held: Some(held),
        }
    }

    /// Exclusive access to `id`; waits for every other holder
    pub fn write(&self, id: CorrelationId) -> KeyGuard<'_> {
        let held = Held::Exclusive(self.lock_for(id).write_arc());
        KeyGuard {
            locks: self,
            id,
            held: Some(held),
        }
    }

    /// Number of ids currently held or awaited
    pub fn held(&self) -> usize {
        self.table.len()
    }

    fn lock_for(&self, id: CorrelationId) -> Arc<RwLock<()>> {
        // The clone is taken under the shard lock, so `release` cannot
        // drop the entry between lookup and acquisition.
        self.table.entry(id).or_default().clone()
    }

    fn release(&self, id: CorrelationId) {
        self.table.remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Held key lock, released on drop
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    id: CorrelationId,
    held: Option<Held>,
}

impl KeyGuard<'_> {
    /// Id this guard holds
    pub fn correlation_id(&self) -> CorrelationId {
        self.id
    }

    /// Whether this is the exclusive (writer) lock
    pub fn is_exclusive(&self) -> bool {
        matches!(self.held, Some(Held::Exclusive(_)))
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Unlock before pruning so the table's Arc is the last one left.
        drop(self.held.take());
        self.locks.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn test_readers_share() {
        let locks = KeyedLocks::new();
        let id = CorrelationId::new();
        let a = locks.read(id);
        let b = locks.read(id);
        assert!(!a.is_exclusive());
        assert_eq!(b.correlation_id(), id);
        assert_eq!(locks.held(), 1);
        drop(a);
        assert_eq!(locks.held(), 1);
        drop(b);
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn test_distinct_ids_do_not_block() {
        let locks = KeyedLocks::new();
        let a = locks.write(CorrelationId::new());
        let _b = locks.write(CorrelationId::new());
        assert!(a.is_exclusive());
        assert_eq!(locks.held(), 2);
    }

    #[test]
    fn test_writer_excludes_readers() {
        let locks = Arc::new(KeyedLocks::new());
        let id = CorrelationId::new();
        let writer_done = Arc::new(AtomicBool::new(false));

        let guard = locks.write(id);
        let reader = {
            let locks = locks.clone();
            let writer_done = writer_done.clone();
            std::thread::spawn(move || {
                let _g = locks.read(id);
                writer_done.load(Ordering::SeqCst)
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        writer_done.store(true, Ordering::SeqCst);
        drop(guard);

        assert!(reader.join().unwrap(), "reader ran while writer held the key");
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn test_writers_serialize() {
        let locks = Arc::new(KeyedLocks::new());
        let id = CorrelationId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let _g = locks.write(id);
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn test_writer_not_starved_by_overlapping_readers() {
        let locks = KeyedLocks::new();
        let id = CorrelationId::new();
        let stop = AtomicBool::new(false);

        let waited = std::thread::scope(|s| {
            for offset in [0, 2] {
                let locks = &locks;
                let stop = &stop;
                s.spawn(move || {
                    std::thread::sleep(Duration::from_millis(offset));
                    while !stop.load(Ordering::SeqCst) {
                        let _g = locks.read(id);
                        std::thread::sleep(Duration::from_millis(4));
                    }
                });
            }

            std::thread::sleep(Duration::from_millis(20));
            let began = Instant::now();
            let guard = locks.write(id);
            let waited = began.elapsed();
            drop(guard);
            stop.store(true, Ordering::SeqCst);
            waited
        });

        assert!(
            waited < Duration::from_millis(100),
            "writer waited {waited:?} behind readers"
        );
        assert_eq!(locks.held(), 0);
    }
}
