//! Service lifetime definitions.

use std::fmt;

/// Service lifetimes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Constructor, Injectable, IocContainer, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Clock;
/// impl Injectable for Clock {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|| Clock)]
///     }
/// }
///
/// let container = IocContainer::new();
/// container.register_type::<Clock, Clock>(Lifetime::Transient).unwrap();
///
/// let a = container.get_instance::<Clock>().unwrap();
/// let b = container.get_instance::<Clock>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub enum Lifetime {
    /// New instance per resolution, never cached
    ///
    /// Dependencies of a transient service are produced fresh for every
    /// instance, so a transient dependency shared by two branches of one graph
    /// yields two distinct objects.
    Transient,
    /// Single instance per compiled factory
    ///
    /// The instance is constructed once when the factory is compiled and is
    /// returned unchanged until the factory is invalidated, for example by
    /// replacing the registration.
    Singleton,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Transient => f.write_str("transient"),
            Lifetime::Singleton => f.write_str("singleton"),
        }
    }
}
