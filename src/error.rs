//! Error types for the dependency injection container.

use std::fmt;

/// Invalid registration, reported synchronously by the register call.
///
/// The one exception is [`RegistrationError::NoUsableConstructor`], which is
/// produced while compiling a factory if the constructor chooser declines every
/// constructor the implementation declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Service type is one of the reserved marker types (`String`, `str`,
    /// `TypeId`, `dyn Any`)
    RestrictedServiceType(&'static str),
    /// A named registration was given an empty name
    EmptyServiceName(&'static str),
    /// Implementation type declares no constructors
    NoConstructors(&'static str),
    /// No declared constructor was selected for the implementation type
    NoUsableConstructor(&'static str),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::RestrictedServiceType(name) => {
                write!(f, "Service type cannot be a restricted type: {}", name)
            }
            RegistrationError::EmptyServiceName(name) => {
                write!(f, "Service name cannot be empty for: {}", name)
            }
            RegistrationError::NoConstructors(name) => {
                write!(f, "Implementation type declares no constructors: {}", name)
            }
            RegistrationError::NoUsableConstructor(name) => {
                write!(f, "No usable constructor for implementation type: {}", name)
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Failure while compiling a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyResolutionError {
    /// A service reappeared on the active build stack. The chain runs from the
    /// root of the build through the repeated service.
    CircularDependency { chain: Vec<&'static str> },
    /// The active build stack reached the depth ceiling.
    MaxDepthExceeded { limit: usize },
}

impl fmt::Display for DependencyResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyResolutionError::CircularDependency { chain } => {
                write!(f, "Circular dependency detected: {}", chain.join(" -> "))
            }
            DependencyResolutionError::MaxDepthExceeded { limit } => {
                write!(f, "Max resolve depth {} exceeded", limit)
            }
        }
    }
}

impl std::error::Error for DependencyResolutionError {}

/// Dependency injection errors
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{DiError, IocContainer, Resolver};
///
/// let container = IocContainer::new();
/// match container.get_instance::<u32>() {
///     Err(DiError::NotRegistered { service, name }) => {
///         assert_eq!(service, "u32");
///         assert!(name.is_none());
///     }
///     _ => unreachable!(),
/// }
///
/// // Optional lookups report absence without an error
/// assert!(container.get_instance_optional::<u32>().unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub enum DiError {
    /// Invalid registration
    Registration(RegistrationError),
    /// Cycle or depth failure while compiling a graph
    Resolution(DependencyResolutionError),
    /// No registration exists for the requested key
    NotRegistered {
        service: &'static str,
        name: Option<String>,
    },
    /// Type downcast failed
    TypeMismatch(&'static str),
    /// Constructor asked for a parameter that was not registered when its
    /// factory was compiled and was not supplied explicitly
    UnresolvedParameter {
        implementation: &'static str,
        parameter: &'static str,
    },
    /// Factory was invalidated while being used
    FactoryInvalidated(&'static str),
    /// Delegate ran after its container was dropped
    ContainerDropped,
}

impl DiError {
    /// Returns `true` for cycle failures, whichever path detected them.
    pub fn is_circular(&self) -> bool {
        matches!(
            self,
            DiError::Resolution(DependencyResolutionError::CircularDependency { .. })
        )
    }

    /// Returns `true` for depth ceiling failures.
    pub fn is_max_depth_exceeded(&self) -> bool {
        matches!(
            self,
            DiError::Resolution(DependencyResolutionError::MaxDepthExceeded { .. })
        )
    }

    /// The cycle chain for circular dependency failures.
    pub fn circular_chain(&self) -> Option<&[&'static str]> {
        match self {
            DiError::Resolution(DependencyResolutionError::CircularDependency { chain }) => {
                Some(chain)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::Registration(err) => write!(f, "Registration error: {}", err),
            DiError::Resolution(err) => write!(f, "Dependency resolution error: {}", err),
            DiError::NotRegistered { service, name: Some(name) } => {
                write!(f, "Service not registered: {} (name: {})", service, name)
            }
            DiError::NotRegistered { service, name: None } => {
                write!(f, "Service not registered: {}", service)
            }
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::UnresolvedParameter { implementation, parameter } => write!(
                f,
                "Constructor parameter {} of {} is not registered",
                parameter, implementation
            ),
            DiError::FactoryInvalidated(name) => write!(f, "Service factory invalidated: {}", name),
            DiError::ContainerDropped => f.write_str("Container was dropped"),
        }
    }
}

impl std::error::Error for DiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiError::Registration(err) => Some(err),
            DiError::Resolution(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistrationError> for DiError {
    fn from(err: RegistrationError) -> Self {
        DiError::Registration(err)
    }
}

impl From<DependencyResolutionError> for DiError {
    fn from(err: DependencyResolutionError) -> Self {
        DiError::Resolution(err)
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
