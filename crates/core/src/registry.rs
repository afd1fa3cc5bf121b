//! Process-wide per-epoch singletons.
//!
//! Caches and datasets are expensive to build and safe to share, so the
//! engine keeps one registry for each: a map from epoch number to a shared
//! entry, guarded by a mutex with a condition variable as the per-entry
//! completion signal. At most one build runs per epoch; concurrent callers
//! for the same epoch block until the in-flight build publishes or fails.
//! Builds themselves run outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use once_cell::sync::Lazy;

use crate::cache::Cache;
use crate::config::Retention;
use crate::dag::Dag;
use crate::error::{Error, Result};

enum Slot<T> {
    /// A build is in flight; `waiters` threads are blocked on it.
    Building { waiters: usize },
    Ready(Arc<T>),
    /// The build failed. The slot lingers until every waiter has taken a
    /// copy of the error, then disappears so the next caller rebuilds.
    Failed { error: Error, remaining: usize },
}

struct Inner<T> {
    slots: HashMap<u64, Slot<T>>,
    /// Ready epochs, least recently used first.
    order: Vec<u64>,
}

pub(crate) struct Registry<T> {
    inner: Mutex<Inner<T>>,
    done: Condvar,
}

enum Action<T> {
    Return(Arc<T>),
    Fail(Error),
    Wait,
    Build,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: Vec::new(),
            }),
            done: Condvar::new(),
        }
    }

    /// Return the shared entry for `epoch`, building it with `build` if it
    /// is not resident. `build` runs without the registry lock held.
    pub(crate) fn get_or_build(
        &self,
        epoch: u64,
        retention: Retention,
        build: impl FnOnce() -> Result<T>,
    ) -> Result<Arc<T>> {
        let mut inner = self.inner.lock().map_err(|_| Error::RegistryBusy)?;
        let mut waiting = false;
        loop {
            let mut drained = false;
            let action = match inner.slots.get_mut(&epoch) {
                None => Action::Build,
                Some(Slot::Ready(entry)) => Action::Return(entry.clone()),
                Some(Slot::Building { waiters }) => {
                    if !waiting {
                        *waiters += 1;
                        waiting = true;
                    }
                    Action::Wait
                }
                Some(Slot::Failed { error, remaining }) => {
                    if waiting {
                        *remaining -= 1;
                        drained = *remaining == 0;
                        Action::Fail(error.clone())
                    } else {
                        // A newcomer waits for the failed slot to drain,
                        // then rebuilds from scratch.
                        Action::Wait
                    }
                }
            };
            if drained {
                inner.slots.remove(&epoch);
                self.done.notify_all();
            }
            match action {
                Action::Return(entry) => {
                    touch(&mut inner.order, epoch);
                    return Ok(entry);
                }
                Action::Fail(error) => return Err(error),
                Action::Wait => {
                    inner = self.done.wait(inner).map_err(|_| Error::RegistryBusy)?;
                }
                Action::Build => break,
            }
        }

        inner.slots.insert(epoch, Slot::Building { waiters: 0 });
        drop(inner);

        let built = build();

        let mut inner = self.inner.lock().map_err(|_| Error::RegistryBusy)?;
        let waiters = match inner.slots.get(&epoch) {
            Some(Slot::Building { waiters }) => *waiters,
            _ => 0,
        };
        let outcome = match built {
            Ok(value) => {
                let entry = Arc::new(value);
                inner.slots.insert(epoch, Slot::Ready(entry.clone()));
                touch(&mut inner.order, epoch);
                evict(&mut inner, retention);
                Ok(entry)
            }
            Err(error) => {
                if waiters == 0 {
                    inner.slots.remove(&epoch);
                } else {
                    inner.slots.insert(
                        epoch,
                        Slot::Failed {
                            error: error.clone(),
                            remaining: waiters,
                        },
                    );
                }
                Err(error)
            }
        };
        self.done.notify_all();
        outcome
    }
}

/// Mark `epoch` as most recently used.
fn touch(order: &mut Vec<u64>, epoch: u64) {
    order.retain(|&e| e != epoch);
    order.push(epoch);
}

/// Drop registry references beyond the retention limit, oldest first.
/// External handles keep evicted entries alive until they drop.
fn evict<T>(inner: &mut Inner<T>, retention: Retention) {
    let keep = match retention {
        Retention::KeepAll => return,
        Retention::Lru(n) => n,
    };
    while inner.order.len() > keep {
        let epoch = inner.order.remove(0);
        inner.slots.remove(&epoch);
    }
}

/// Shared caches, one per epoch.
pub(crate) static CACHES: Lazy<Registry<Cache>> = Lazy::new(Registry::new);

/// Shared datasets, one per epoch. A dataset's embedded cache is the same
/// instance `CACHES` hands out for that epoch.
pub(crate) static DAGS: Lazy<Registry<Dag>> = Lazy::new(Registry::new);
