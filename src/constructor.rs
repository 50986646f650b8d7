//! Constructor descriptors and constructor selection.
//!
//! Rust has no runtime reflection over constructors, so implementation types
//! describe theirs by implementing [`Injectable`]. Each [`Constructor`] lists
//! the service types of its parameters and carries the function that builds
//! the value from resolved arguments. The container picks one of them with a
//! [`ConstructorChooser`] when it compiles the factory for a registration.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{ServiceKey, ServiceType};
use crate::registration::AnyArc;
use crate::registry::ServiceRegistry;

/// Implementation type that the container can construct.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Constructor, Injectable};
/// use std::sync::Arc;
///
/// struct Config;
/// struct Settings { config: Arc<Config> }
///
/// impl Injectable for Settings {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|config: Arc<Config>| Settings { config })]
///     }
/// }
///
/// assert_eq!(Settings::constructors()[0].parameters().len(), 1);
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructors the container may choose from, in declaration order.
    fn constructors() -> Vec<Constructor<Self>>;
}

/// Conversion from an implementation into the service type it is registered as.
///
/// Every type implements its own service type. Trait-object services are
/// declared with [`implements!`](crate::implements):
///
/// ```rust
/// use ferrous_ioc::{implements, Implements};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync { fn name(&self) -> &str; }
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger { fn name(&self) -> &str { "console" } }
///
/// implements!(ConsoleLogger => dyn Logger);
///
/// let logger: Arc<dyn Logger> = Arc::new(ConsoleLogger).upcast();
/// assert_eq!(logger.name(), "console");
/// ```
pub trait Implements<S: ?Sized + 'static>: 'static {
    fn upcast(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    #[inline(always)]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declares that an implementation type can be registered as one or more
/// trait-object service types.
#[macro_export]
macro_rules! implements {
    ($implementation:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$service> for $implementation {
                #[inline(always)]
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

type ConstructorBody<T> = Arc<dyn Fn(&mut Arguments<'_>) -> DiResult<T> + Send + Sync>;

/// One way of constructing `T` from resolved dependencies.
pub struct Constructor<T> {
    parameters: Vec<ServiceType>,
    body: ConstructorBody<T>,
}

impl<T: 'static> Constructor<T> {
    /// Creates a constructor from a function taking `Arc<Dependency>` arguments.
    ///
    /// ```rust
    /// use ferrous_ioc::{Constructor, ServiceType};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync {}
    /// struct Scheduler { clock: Arc<dyn Clock>, ticks: Arc<u64> }
    ///
    /// let ctor = Constructor::new(|clock: Arc<dyn Clock>, ticks: Arc<u64>| Scheduler { clock, ticks });
    /// assert_eq!(ctor.parameters(), &[ServiceType::of::<dyn Clock>(), ServiceType::of::<u64>()]);
    /// ```
    pub fn new<F, D>(function: F) -> Self
    where
        F: ConstructorFn<D, T>,
    {
        Self {
            parameters: F::parameters(),
            body: Arc::new(move |args: &mut Arguments<'_>| function.call(args)),
        }
    }

    /// Creates a constructor from an explicit parameter list and a body that
    /// pulls its arguments in order. Use this when a parameter is optional or
    /// construction can fail.
    pub fn from_parts<F>(parameters: Vec<ServiceType>, body: F) -> Self
    where
        F: Fn(&mut Arguments<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            parameters,
            body: Arc::new(body),
        }
    }

    pub fn parameters(&self) -> &[ServiceType] {
        &self.parameters
    }

    /// Erases the constructor into a descriptor producing service `S`.
    pub(crate) fn into_descriptor<S>(self, index: usize) -> ConstructorDescriptor
    where
        S: ?Sized + Send + Sync + 'static,
        T: Implements<S>,
    {
        let body = self.body;
        ConstructorDescriptor {
            implementation: ServiceType::of::<T>(),
            index,
            parameters: self.parameters.into(),
            invoke: Arc::new(move |args: &mut Arguments<'_>| {
                let instance = body(args)?;
                let service: Arc<S> = Arc::new(instance).upcast();
                Ok(Arc::new(service) as AnyArc)
            }),
        }
    }
}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("implementation", &type_name::<T>())
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Functions usable as constructors: any `Fn(Arc<A>, Arc<B>, ..) -> T` of up to
/// eight arguments.
pub trait ConstructorFn<D, T>: Send + Sync + 'static {
    /// Service types of the parameters, in order.
    fn parameters() -> Vec<ServiceType>;

    fn call(&self, args: &mut Arguments<'_>) -> DiResult<T>;
}

macro_rules! impl_constructor_fn {
    () => {
        impl_constructor_fn!(@impl ());
    };
    ($first:ident $(, $rest:ident)*) => {
        impl_constructor_fn!(@impl ($first $(, $rest)*));
        impl_constructor_fn!($($rest),*);
    };
    (@impl ($($arg:ident),*)) => {
        impl<F, T $(, $arg)*> ConstructorFn<($(Arc<$arg>,)*), T> for F
        where
            F: Fn($(Arc<$arg>),*) -> T + Send + Sync + 'static,
            $($arg: ?Sized + Send + Sync + 'static,)*
        {
            fn parameters() -> Vec<ServiceType> {
                vec![$(ServiceType::of::<$arg>()),*]
            }

            #[allow(unused_variables)]
            fn call(&self, args: &mut Arguments<'_>) -> DiResult<T> {
                Ok(self($(args.next::<$arg>()?),*))
            }
        }
    };
}

impl_constructor_fn!(A7, A6, A5, A4, A3, A2, A1, A0);

/// Type-erased constructor of one implementation type.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    implementation: ServiceType,
    index: usize,
    parameters: Arc<[ServiceType]>,
    invoke: Arc<dyn Fn(&mut Arguments<'_>) -> DiResult<AnyArc> + Send + Sync>,
}

impl ConstructorDescriptor {
    pub fn implementation(&self) -> ServiceType {
        self.implementation
    }

    /// Position of this constructor in the implementation's declaration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parameters(&self) -> &[ServiceType] {
        &self.parameters
    }

    /// Runs the constructor with one value slot per parameter. Empty slots are
    /// parameters that could not be supplied.
    pub(crate) fn invoke(&self, values: Vec<Option<AnyArc>>) -> DiResult<AnyArc> {
        let mut args = Arguments {
            implementation: self.implementation,
            parameters: &self.parameters,
            values,
            cursor: 0,
        };
        (self.invoke)(&mut args)
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("implementation", &self.implementation)
            .field("index", &self.index)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Resolved constructor arguments, consumed in parameter order.
pub struct Arguments<'a> {
    implementation: ServiceType,
    parameters: &'a [ServiceType],
    values: Vec<Option<AnyArc>>,
    cursor: usize,
}

impl Arguments<'_> {
    /// Takes the next argument.
    ///
    /// Fails with [`DiError::UnresolvedParameter`] if the parameter was not
    /// registered when the factory was compiled and no explicit value was
    /// supplied.
    pub fn next<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        let parameter = self.parameters.get(self.cursor).copied();
        match self.take::<T>()? {
            Some(value) => Ok(value),
            None => Err(DiError::UnresolvedParameter {
                implementation: self.implementation.name(),
                parameter: parameter.map_or(type_name::<T>(), |p| p.name()),
            }),
        }
    }

    /// Takes the next argument, yielding `None` when it could not be supplied.
    pub fn next_optional<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Option<Arc<T>>> {
        self.take::<T>()
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    fn take<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Option<Arc<T>>> {
        let index = self.cursor;
        self.cursor += 1;
        match self.values.get_mut(index).and_then(Option::take) {
            Some(value) => value
                .downcast::<Arc<T>>()
                .map(|service| Some((*service).clone()))
                .map_err(|_| DiError::TypeMismatch(type_name::<T>())),
            None => Ok(None),
        }
    }
}

/// Explicit per-call arguments, keyed by parameter type.
///
/// Passed to `get_instance_with` to supply constructor parameters directly.
/// A supplied value wins over the compiled dependency for the same type and
/// fills parameters that were skipped because they were not registered.
///
/// ```rust
/// use ferrous_ioc::{InstanceArguments, ServiceType};
/// use std::sync::Arc;
///
/// let args = InstanceArguments::new().with(Arc::new(8080u16));
/// assert!(args.contains(&ServiceType::of::<u16>()));
/// assert_eq!(args.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InstanceArguments {
    values: Vec<(ServiceType, AnyArc)>,
}

impl InstanceArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for parameters of type `T`, replacing any earlier one.
    pub fn with<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.insert(value);
        self
    }

    pub fn insert<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) {
        let service_type = ServiceType::of::<T>();
        self.values.retain(|(existing, _)| *existing != service_type);
        self.values.push((service_type, Arc::new(value) as AnyArc));
    }

    pub fn contains(&self, service_type: &ServiceType) -> bool {
        self.values.iter().any(|(existing, _)| existing == service_type)
    }

    pub(crate) fn get(&self, service_type: &ServiceType) -> Option<&AnyArc> {
        self.values
            .iter()
            .find(|(existing, _)| existing == service_type)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for InstanceArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter().map(|(t, _)| t)).finish()
    }
}

/// Picks the constructor used to compile an implementation type's factory.
///
/// Implementations must be deterministic: the same constructors and the same
/// set of registered services always give the same answer.
pub trait ConstructorChooser: Send + Sync {
    fn choose_constructor<'c>(
        &self,
        implementation: ServiceType,
        constructors: &'c [ConstructorDescriptor],
        registry: &dyn ServiceRegistry,
    ) -> Option<&'c ConstructorDescriptor>;
}

/// Default constructor selection rule.
///
/// Prefers the constructor with the most parameters whose types are all
/// registered. When no constructor is fully resolvable it falls back to the
/// one with the most registered parameters. Ties go to the constructor
/// declared first.
#[derive(Debug, Default, Clone, Copy)]
pub struct MostResolvableConstructorChooser;

impl ConstructorChooser for MostResolvableConstructorChooser {
    fn choose_constructor<'c>(
        &self,
        _implementation: ServiceType,
        constructors: &'c [ConstructorDescriptor],
        registry: &dyn ServiceRegistry,
    ) -> Option<&'c ConstructorDescriptor> {
        let mut best: Option<(&ConstructorDescriptor, bool, usize)> = None;

        for constructor in constructors {
            let registered = constructor
                .parameters()
                .iter()
                .filter(|p| registry.is_registered(&ServiceKey::new(**p, None)))
                .count();
            let complete = registered == constructor.parameters().len();

            let better = match best {
                None => true,
                Some((_, best_complete, best_count)) => {
                    (complete && !best_complete) || (complete == best_complete && registered > best_count)
                }
            };
            if better {
                best = Some((constructor, complete, registered));
            }
        }

        best.map(|(constructor, _, _)| constructor)
    }
}
