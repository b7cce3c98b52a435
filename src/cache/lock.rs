//! Poison-tolerant access to the in-process store.
//!
//! A panic while holding the entry map leaves at worst a stale or missing
//! entry, which the cache already tolerates, so the guard is reclaimed and the
//! store keeps serving.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn reclaim<G>(poisoned: PoisonError<G>, store: &'static str, op: &'static str, mode: &str) -> G {
    warn!(store, op, mode, "Cache lock poisoned, reclaiming guard");
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| reclaim(poisoned, store, op, "read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| reclaim(poisoned, store, op, "write"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn entries_survive_a_panicking_writer() {
        let lock = Arc::new(RwLock::new(vec!["kept"]));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let mut guard = poisoner.write().expect("lock");
            guard.push("written before panic");
            panic!("poison the lock");
        })
        .join();

        assert!(lock.is_poisoned());
        assert_eq!(rw_read(&lock, "local", "get").len(), 2);
        rw_write(&lock, "local", "set").clear();
        assert!(rw_read(&lock, "local", "get").is_empty());
    }
}
