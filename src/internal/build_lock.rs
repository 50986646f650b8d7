//! Build locks that detect cross-thread dependency cycles.
//!
//! A build of one registration is serialized by a reentrant lock. When two
//! threads build the two ends of a cycle at the same time, each holds one lock
//! and waits for the other, and neither reaches the validator. Every lock
//! therefore records its owning thread, and every blocked thread records the
//! lock it waits for. A waiter that can follow owner and wait links back to
//! itself reports the cycle instead of blocking.

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::{const_mutex, Mutex, ReentrantMutex, ReentrantMutexGuard};

use crate::error::DependencyResolutionError;
use crate::key::ServiceType;

// How long a blocked thread sleeps on the lock between cycle checks.
const WAIT_POLL: Duration = Duration::from_millis(10);

struct LockState {
    service_type: ServiceType,
    // Owning thread and its reentry depth.
    owner: Mutex<Option<(ThreadId, usize)>>,
}

impl LockState {
    fn owner(&self) -> Option<ThreadId> {
        self.owner.lock().map(|(thread, _)| thread)
    }
}

// Threads currently blocked on a build lock, with the lock they wait for.
static WAITING: Mutex<Vec<(ThreadId, Arc<LockState>)>> = const_mutex(Vec::new());

/// Reentrant lock guarding the build of one service.
pub(crate) struct BuildLock {
    inner: ReentrantMutex<()>,
    state: Arc<LockState>,
}

impl BuildLock {
    pub(crate) fn new(service_type: ServiceType) -> Self {
        Self {
            inner: ReentrantMutex::new(()),
            state: Arc::new(LockState {
                service_type,
                owner: Mutex::new(None),
            }),
        }
    }

    /// Acquires the lock, failing with a circular dependency if waiting for it
    /// would close a wait cycle between threads.
    pub(crate) fn lock(&self) -> Result<BuildLockGuard<'_>, DependencyResolutionError> {
        if let Some(guard) = self.inner.try_lock() {
            return Ok(self.owned(guard));
        }

        let current = thread::current().id();
        let _waiting = WaitEntry::register(current, self.state.clone());
        loop {
            if let Some(guard) = self.inner.try_lock_for(WAIT_POLL) {
                return Ok(self.owned(guard));
            }
            if let Some(chain) = wait_cycle(current, &self.state) {
                return Err(DependencyResolutionError::CircularDependency { chain });
            }
        }
    }

    fn owned<'a>(&'a self, guard: ReentrantMutexGuard<'a, ()>) -> BuildLockGuard<'a> {
        let current = thread::current().id();
        let mut owner = self.state.owner.lock();
        *owner = match *owner {
            Some((thread, depth)) if thread == current => Some((thread, depth + 1)),
            _ => Some((current, 1)),
        };
        BuildLockGuard {
            state: &self.state,
            _guard: guard,
        }
    }
}

/// Held build lock. Clears the recorded owner before the lock is released.
pub(crate) struct BuildLockGuard<'a> {
    state: &'a LockState,
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl Drop for BuildLockGuard<'_> {
    fn drop(&mut self) {
        let mut owner = self.state.owner.lock();
        *owner = match *owner {
            Some((thread, depth)) if depth > 1 => Some((thread, depth - 1)),
            _ => None,
        };
    }
}

struct WaitEntry {
    thread: ThreadId,
}

impl WaitEntry {
    fn register(thread: ThreadId, lock: Arc<LockState>) -> Self {
        WAITING.lock().push((thread, lock));
        Self { thread }
    }
}

impl Drop for WaitEntry {
    fn drop(&mut self) {
        let mut waiting = WAITING.lock();
        if let Some(index) = waiting.iter().position(|(thread, _)| *thread == self.thread) {
            waiting.swap_remove(index);
        }
    }
}

/// Follows owner and wait links from `target`. Returns the cycle, starting and
/// ending at the lock `current` holds, if the links lead back to `current`.
fn wait_cycle(current: ThreadId, target: &Arc<LockState>) -> Option<Vec<&'static str>> {
    let waiting = WAITING.lock();
    let mut chain = vec![target.service_type.name()];
    let mut lock = target.clone();

    for _ in 0..=waiting.len() {
        let owner = lock.owner()?;
        if owner == current {
            let held = *chain.last()?;
            chain.insert(0, held);
            return Some(chain);
        }
        let (_, next) = waiting.iter().find(|(thread, _)| *thread == owner)?;
        chain.push(next.service_type.name());
        lock = next.clone();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    struct A;
    struct B;

    #[test]
    fn reentrant_on_the_same_thread() {
        let lock = BuildLock::new(ServiceType::of::<A>());
        let outer = lock.lock().unwrap();
        {
            let _inner = lock.lock().unwrap();
            assert_eq!(lock.state.owner.lock().map(|(_, depth)| depth), Some(2));
        }
        assert_eq!(lock.state.owner(), Some(thread::current().id()));
        drop(outer);
        assert_eq!(lock.state.owner(), None);
    }

    #[test]
    fn crossed_waits_report_a_cycle() {
        let a = BuildLock::new(ServiceType::of::<A>());
        let b = BuildLock::new(ServiceType::of::<B>());
        let barrier = Barrier::new(2);

        let (first, second) = crossbeam_utils::thread::scope(|s| {
            let first = s.spawn(|_| {
                let _held = a.lock().unwrap();
                barrier.wait();
                b.lock().map(|_| ())
            });
            let second = s.spawn(|_| {
                let _held = b.lock().unwrap();
                barrier.wait();
                a.lock().map(|_| ())
            });
            (first.join().unwrap(), second.join().unwrap())
        })
        .unwrap();

        // At least one side sees the cycle. The other acquires the lock once
        // the failing side lets go of its own.
        let failures: Vec<_> = [first, second].into_iter().filter_map(Result::err).collect();
        assert!(!failures.is_empty());
        for failure in failures {
            match failure {
                DependencyResolutionError::CircularDependency { chain } => {
                    assert_eq!(chain.len(), 3);
                    assert_eq!(chain.first(), chain.last());
                }
                other => panic!("expected cycle, got {:?}", other),
            }
        }
        assert!(!WAITING
            .lock()
            .iter()
            .any(|(_, lock)| Arc::ptr_eq(lock, &a.state) || Arc::ptr_eq(lock, &b.state)));
    }

    #[test]
    fn uncontended_wait_is_not_a_cycle() {
        let a = BuildLock::new(ServiceType::of::<A>());
        let held = a.lock().unwrap();

        crossbeam_utils::thread::scope(|s| {
            let waiter = s.spawn(|_| a.lock().map(|_| ()));
            std::thread::sleep(Duration::from_millis(30));
            drop(held);
            assert!(waiter.join().unwrap().is_ok());
        })
        .unwrap();
    }
}
