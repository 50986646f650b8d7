//! Diagnostic observers for factory builds and invalidations.
//!
//! Observers are notified synchronously while the container compiles factories
//! and when compiled factories are invalidated. Resolutions served by an
//! already compiled factory are not reported, which keeps the hot path free of
//! observer calls.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::{ServiceKey, ServiceType};

/// Observer trait for factory compilation events.
///
/// # Performance
///
/// Observer calls are made on the resolving thread while the registration's
/// build lock is held. Keep implementations lightweight.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{DiError, DiObserver, IocContainer, ServiceKey, ServiceType};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct BuildCounter {
///     built: AtomicUsize,
/// }
///
/// impl DiObserver for BuildCounter {
///     fn building(&self, _key: &ServiceKey) {}
///
///     fn built(&self, _key: &ServiceKey, _duration: Duration) {
///         self.built.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn build_failed(&self, _key: &ServiceKey, _error: &DiError) {}
/// }
///
/// let counter = Arc::new(BuildCounter::default());
/// let container = IocContainer::builder().observer(counter.clone()).build();
/// # let _ = container;
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a registration's factory is compiled.
    fn building(&self, key: &ServiceKey);

    /// Called after a factory compiled successfully.
    ///
    /// # Arguments
    ///
    /// * `key` - The registration that was compiled
    /// * `duration` - Time spent compiling, including dependency factories
    ///   that had to be compiled along the way
    fn built(&self, key: &ServiceKey, duration: Duration);

    /// Called when compiling a factory failed.
    fn build_failed(&self, key: &ServiceKey, error: &DiError);

    /// Called when a compiled factory for `service_type` was invalidated.
    fn invalidated(&self, service_type: &ServiceType) {
        let _ = service_type;
    }
}

/// Registered observers.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn building(&self, key: &ServiceKey) {
        for observer in &self.observers {
            observer.building(key);
        }
    }

    #[inline]
    pub(crate) fn built(&self, key: &ServiceKey, duration: Duration) {
        for observer in &self.observers {
            observer.built(key, duration);
        }
    }

    #[inline]
    pub(crate) fn build_failed(&self, key: &ServiceKey, error: &DiError) {
        for observer in &self.observers {
            observer.build_failed(key, error);
        }
    }

    #[inline]
    pub(crate) fn invalidated(&self, service_type: &ServiceType) {
        for observer in &self.observers {
            observer.invalidated(service_type);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{IocContainer, LoggingObserver};
/// use std::sync::Arc;
///
/// let container = IocContainer::builder()
///     .observer(Arc::new(LoggingObserver::new()))
///     .build();
/// # let _ = container;
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "ferrous-ioc".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn building(&self, key: &ServiceKey) {
        tracing::debug!(prefix = %self.prefix, service = %key, "building factory");
    }

    fn built(&self, key: &ServiceKey, duration: Duration) {
        tracing::debug!(prefix = %self.prefix, service = %key, ?duration, "built factory");
    }

    fn build_failed(&self, key: &ServiceKey, error: &DiError) {
        tracing::warn!(prefix = %self.prefix, service = %key, %error, "factory build failed");
    }

    fn invalidated(&self, service_type: &ServiceType) {
        tracing::debug!(prefix = %self.prefix, service = %service_type, "factory invalidated");
    }
}
