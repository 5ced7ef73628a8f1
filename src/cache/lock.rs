//! Poison-tolerant lock access for the in-memory store.

use std::sync::{LockResult, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), source, op, "read")
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), source, op, "write")
}

fn recover<G>(result: LockResult<G>, source: &'static str, op: &'static str, access: &str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(source, op, access, "Store lock poisoned; continuing with its entries");
        poisoned.into_inner()
    })
}
