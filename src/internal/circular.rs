//! Circular dependency detection infrastructure.

use std::cell::RefCell;

use parking_lot::Mutex;

use crate::error::DependencyResolutionError;
use crate::key::ServiceType;

/// Depth ceiling for one resolution, independent of real cycles.
pub const MAX_RESOLVE_DEPTH: usize = 50;

#[cfg(feature = "smallvec")]
type TypeStack = smallvec::SmallVec<[ServiceType; 16]>;
#[cfg(not(feature = "smallvec"))]
type TypeStack = Vec<ServiceType>;

fn cycle_chain(stack: &[ServiceType], repeated: ServiceType) -> Vec<&'static str> {
    stack
        .iter()
        .map(ServiceType::name)
        .chain(std::iter::once(repeated.name()))
        .collect()
}

fn check_stack(stack: &[ServiceType], service_type: ServiceType) -> Result<(), DependencyResolutionError> {
    if stack.len() >= MAX_RESOLVE_DEPTH {
        return Err(DependencyResolutionError::MaxDepthExceeded {
            limit: MAX_RESOLVE_DEPTH,
        });
    }

    if stack.contains(&service_type) {
        return Err(DependencyResolutionError::CircularDependency {
            chain: cycle_chain(stack, service_type),
        });
    }

    Ok(())
}

/// Resolution-depth stack used while compiling one dependency graph.
///
/// A validator is created for each top-level resolution and threaded through
/// every nested build of that resolution, so cycle and depth tracking spans
/// the whole graph. It is never stored or reused across resolutions.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{CircularDependencyValidator, ServiceType};
///
/// struct A;
/// struct B;
///
/// let validator = CircularDependencyValidator::new();
/// validator.check(ServiceType::of::<A>()).unwrap();
/// validator.check(ServiceType::of::<B>()).unwrap();
///
/// let err = validator.check(ServiceType::of::<A>()).unwrap_err();
/// assert!(err.to_string().ends_with("A"));
///
/// validator.release();
/// validator.release();
/// assert_eq!(validator.depth(), 0);
/// ```
#[derive(Default)]
pub struct CircularDependencyValidator {
    stack: Mutex<TypeStack>,
}

impl CircularDependencyValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `service_type`, failing if the stack is at the depth ceiling or
    /// already contains it.
    pub fn check(&self, service_type: ServiceType) -> Result<(), DependencyResolutionError> {
        let mut stack = self.stack.lock();
        check_stack(&stack, service_type)?;
        stack.push(service_type);
        Ok(())
    }

    /// Pops the most recent successful [`check`](Self::check).
    pub fn release(&self) {
        let popped = self.stack.lock().pop();
        debug_assert!(popped.is_some(), "release without matching check");
    }

    /// Current stack depth.
    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// Checks `service_type` and returns a guard that releases it on drop,
    /// so early returns inside a nested build keep push and pop balanced.
    pub(crate) fn enter(&self, service_type: ServiceType) -> Result<ValidatorScope<'_>, DependencyResolutionError> {
        self.check(service_type)?;
        Ok(ValidatorScope { validator: self })
    }
}

/// Releases one validator entry when dropped.
pub(crate) struct ValidatorScope<'a> {
    validator: &'a CircularDependencyValidator,
}

impl Drop for ValidatorScope<'_> {
    fn drop(&mut self) {
        self.validator.release();
    }
}

// Services currently being built or produced by a delegate on this thread.
// Delegates resolve through a fresh top-level resolution, which has its own
// validator, so re-entry through a delegate is only visible here.
thread_local! {
    static ACTIVE_CONSTRUCTIONS: RefCell<TypeStack> = RefCell::new(TypeStack::new());
}

/// Guard for the thread-local construction stack.
pub(crate) struct ConstructionGuard {
    service_type: ServiceType,
}

impl ConstructionGuard {
    pub(crate) fn enter(service_type: ServiceType) -> Result<Self, DependencyResolutionError> {
        ACTIVE_CONSTRUCTIONS.with(|active| {
            let mut active = active.borrow_mut();
            check_stack(&active, service_type)?;
            active.push(service_type);
            Ok(Self { service_type })
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        ACTIVE_CONSTRUCTIONS.with(|active| {
            let popped = active.borrow_mut().pop();
            debug_assert_eq!(popped, Some(self.service_type));
        });
    }
}
