//! Invokers for delegate registrations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{DiError, DiResult};
use crate::internal::{BuildLock, ConstructionGuard};
use crate::key::ServiceType;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Routine};

/// Wraps a user delegate in the lifetime policy of its registration.
pub(crate) trait DelegateInvoker: Send + Sync {
    fn lifetime(&self) -> Lifetime;

    /// Routine that produces the service through the delegate.
    fn routine(&self) -> Routine;

    fn is_compiled(&self) -> bool;

    fn invalidate(&self);
}

pub(crate) fn for_lifetime(service_type: ServiceType, delegate: Routine, lifetime: Lifetime) -> Arc<dyn DelegateInvoker> {
    match lifetime {
        Lifetime::Transient => Arc::new(TransientDelegateInvoker::new(service_type, delegate)),
        Lifetime::Singleton => Arc::new(SingletonDelegateInvoker::new(service_type, delegate)),
    }
}

/// Calls the delegate every time.
pub(crate) struct TransientDelegateInvoker {
    routine: Routine,
    invalidated: Arc<AtomicBool>,
}

impl TransientDelegateInvoker {
    pub(crate) fn new(service_type: ServiceType, delegate: Routine) -> Self {
        let invalidated = Arc::new(AtomicBool::new(false));
        let flag = invalidated.clone();
        let routine: Routine = Arc::new(move || {
            if flag.load(Ordering::Acquire) {
                return Err(DiError::FactoryInvalidated(service_type.name()));
            }
            let _guard = ConstructionGuard::enter(service_type)?;
            delegate()
        });
        Self { routine, invalidated }
    }
}

impl DelegateInvoker for TransientDelegateInvoker {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    fn routine(&self) -> Routine {
        self.routine.clone()
    }

    fn is_compiled(&self) -> bool {
        !self.invalidated.load(Ordering::Acquire)
    }

    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }
}

struct SingletonCell {
    value: RwLock<Option<AnyArc>>,
    init_lock: BuildLock,
    invalidated: AtomicBool,
}

/// Calls the delegate once and caches the result until invalidation.
pub(crate) struct SingletonDelegateInvoker {
    routine: Routine,
    cell: Arc<SingletonCell>,
}

impl SingletonDelegateInvoker {
    pub(crate) fn new(service_type: ServiceType, delegate: Routine) -> Self {
        let cell = Arc::new(SingletonCell {
            value: RwLock::new(None),
            init_lock: BuildLock::new(service_type),
            invalidated: AtomicBool::new(false),
        });

        let shared = cell.clone();
        let routine: Routine = Arc::new(move || {
            if shared.invalidated.load(Ordering::Acquire) {
                return Err(DiError::FactoryInvalidated(service_type.name()));
            }
            if let Some(value) = shared.value.read().as_ref() {
                return Ok(value.clone());
            }

            // The guard comes first so a delegate resolving its own service
            // fails as a cycle instead of blocking on the init lock.
            let _guard = ConstructionGuard::enter(service_type)?;
            let _init = shared.init_lock.lock()?;
            if let Some(value) = shared.value.read().as_ref() {
                return Ok(value.clone());
            }

            let value = delegate()?;
            *shared.value.write() = Some(value.clone());
            Ok(value)
        });

        Self { routine, cell }
    }
}

impl DelegateInvoker for SingletonDelegateInvoker {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Singleton
    }

    fn routine(&self) -> Routine {
        self.routine.clone()
    }

    fn is_compiled(&self) -> bool {
        !self.cell.invalidated.load(Ordering::Acquire) && self.cell.value.read().is_some()
    }

    fn invalidate(&self) {
        self.cell.invalidated.store(true, Ordering::Release);
        self.cell.value.write().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Token(usize);

    fn counting(counter: Arc<AtomicUsize>) -> Routine {
        Arc::new(move || Ok(Arc::new(Arc::new(Token(counter.fetch_add(1, Ordering::SeqCst)))) as AnyArc))
    }

    fn token(value: &AnyArc) -> usize {
        value.downcast_ref::<Arc<Token>>().unwrap().0
    }

    #[test]
    fn transient_calls_every_time() {
        let counter = Arc::new(AtomicUsize::new(0));
        let invoker = TransientDelegateInvoker::new(ServiceType::of::<Token>(), counting(counter));
        let routine = invoker.routine();
        assert_eq!(token(&routine().unwrap()), 0);
        assert_eq!(token(&routine().unwrap()), 1);
    }

    #[test]
    fn singleton_calls_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let invoker = SingletonDelegateInvoker::new(ServiceType::of::<Token>(), counting(counter.clone()));
        let routine = invoker.routine();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!invoker.is_compiled());
        assert_eq!(token(&routine().unwrap()), 0);
        assert!(invoker.is_compiled());
        assert_eq!(token(&routine().unwrap()), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidated_routine_reports_invalidation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let invoker = for_lifetime(ServiceType::of::<Token>(), counting(counter), Lifetime::Singleton);
        let routine = invoker.routine();
        routine().unwrap();

        invoker.invalidate();
        assert!(!invoker.is_compiled());
        assert!(matches!(routine(), Err(DiError::FactoryInvalidated(_))));
    }
}
