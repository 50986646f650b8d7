//! Resolver traits for service resolution.

use std::any::type_name;
use std::sync::Arc;

use crate::constructor::InstanceArguments;
use crate::error::{DiError, DiResult};
use crate::key::{ServiceKey, ServiceType};
use crate::registration::AnyArc;

/// Core resolver trait for object-safe service resolution.
///
/// Resolved instances come back type-erased. Most users should use the
/// [`Resolver`] trait instead, which provides typed generic methods on top of
/// this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves the registration stored under `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(AnyArc)` - An `Arc<S>` for the service type, boxed as `Arc<dyn Any>`
    /// * `Err(DiError)` - Resolution error (not registered, circular, etc.)
    fn resolve_any(&self, key: &ServiceKey) -> DiResult<AnyArc>;

    /// Resolves `key` with explicit constructor arguments.
    fn resolve_any_with(&self, key: &ServiceKey, args: &InstanceArguments) -> DiResult<AnyArc>;

    /// Resolves every registration of `service_type`, named or not, in
    /// registration order.
    fn resolve_all(&self, service_type: &ServiceType) -> DiResult<Vec<AnyArc>>;

    /// Whether a registration exists under `key`.
    fn contains(&self, key: &ServiceKey) -> bool;
}

fn downcast<S: ?Sized + Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<S>> {
    any.downcast::<Arc<S>>()
        .map(|service| (*service).clone())
        .map_err(|_| DiError::TypeMismatch(type_name::<S>()))
}

/// High-level resolver interface with generic methods for type-safe service
/// resolution.
///
/// Implemented for every [`ResolverCore`], so the container and the
/// [`ResolverContext`](crate::ResolverContext) handed to factory delegates
/// share the same API. Service types may be sized types or trait objects.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{implements, Constructor, Injectable, IocContainer, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {}", msg)
///     }
/// }
/// impl Injectable for ConsoleLogger {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|| ConsoleLogger)]
///     }
/// }
/// implements!(ConsoleLogger => dyn Logger);
///
/// let container = IocContainer::new();
/// container.register_singleton::<dyn Logger, ConsoleLogger>().unwrap();
///
/// let logger = container.get_instance::<dyn Logger>().unwrap();
/// assert_eq!(logger.log("ready"), "LOG: ready");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves the unnamed registration of `S`.
    fn get_instance<S: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<S>> {
        let any = self.resolve_any(&ServiceKey::of::<S>())?;
        downcast(any)
    }

    /// Resolves the registration of `S` under `name`. Names ignore case.
    fn get_instance_by_name<S: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<S>> {
        let any = self.resolve_any(&ServiceKey::named::<S>(name))?;
        downcast(any)
    }

    /// Like [`get_instance`](Self::get_instance), but returns `Ok(None)` when
    /// `S` is not registered. Other failures are still reported.
    fn get_instance_optional<S: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<S>>> {
        if !self.contains(&ServiceKey::of::<S>()) {
            return Ok(None);
        }
        self.get_instance::<S>().map(Some)
    }

    /// Like [`get_instance_by_name`](Self::get_instance_by_name), but returns
    /// `Ok(None)` when nothing is registered under `name`.
    fn get_instance_optional_by_name<S: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> DiResult<Option<Arc<S>>> {
        if !self.contains(&ServiceKey::named::<S>(name)) {
            return Ok(None);
        }
        self.get_instance_by_name::<S>(name).map(Some)
    }

    /// Resolves `S` with explicit constructor arguments.
    ///
    /// Arguments are matched to constructor parameters by type and take
    /// precedence over registered dependencies. They only apply to transient,
    /// constructor-based registrations; singletons and delegates ignore them.
    ///
    /// ```
    /// use ferrous_ioc::{Constructor, Injectable, InstanceArguments, IocContainer, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Port(u16);
    /// struct Server { port: Arc<Port> }
    /// impl Injectable for Server {
    ///     fn constructors() -> Vec<Constructor<Self>> {
    ///         vec![Constructor::new(|port: Arc<Port>| Server { port })]
    ///     }
    /// }
    ///
    /// let container = IocContainer::new();
    /// container.register_transient::<Server, Server>().unwrap();
    ///
    /// let args = InstanceArguments::new().with(Arc::new(Port(8080)));
    /// let server = container.get_instance_with::<Server>(&args).unwrap();
    /// assert_eq!(server.port.0, 8080);
    /// ```
    fn get_instance_with<S: ?Sized + Send + Sync + 'static>(&self, args: &InstanceArguments) -> DiResult<Arc<S>> {
        let any = self.resolve_any_with(&ServiceKey::of::<S>(), args)?;
        downcast(any)
    }

    /// Resolves the registration of `S` named `name` with explicit
    /// constructor arguments.
    fn get_instance_by_name_with<S: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        args: &InstanceArguments,
    ) -> DiResult<Arc<S>> {
        let any = self.resolve_any_with(&ServiceKey::named::<S>(name), args)?;
        downcast(any)
    }

    /// Resolves every registration of `S`, named and unnamed, in registration
    /// order. Returns an empty vector when nothing is registered.
    fn get_all_instances<S: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<S>>> {
        self.resolve_all(&ServiceType::of::<S>())?
            .into_iter()
            .map(downcast)
            .collect()
    }

    /// Resolves `S`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if the service cannot be resolved.
    fn get_required<S: ?Sized + Send + Sync + 'static>(&self) -> Arc<S> {
        self.get_instance::<S>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", type_name::<S>(), e))
    }

    fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.contains(&ServiceKey::of::<S>())
    }

    fn is_registered_by_name<S: ?Sized + 'static>(&self, name: &str) -> bool {
        self.contains(&ServiceKey::named::<S>(name))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
