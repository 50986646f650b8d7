//! Service registration types.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::constructor::{ConstructorDescriptor, Implements, Injectable};
use crate::error::{DiResult, RegistrationError};
use crate::key::{ServiceKey, ServiceType};
use crate::lifetime::Lifetime;

// Type-erased Arc for storage. The payload is always an `Arc<S>` for the
// registered service type `S`, so trait-object services go through the same path.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

// Compiled construction routine.
pub(crate) type Routine = Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>;

/// How a registration produces instances.
#[derive(Clone)]
pub enum Activator {
    /// Build the implementation type through one of its constructors.
    Constructors(Arc<[ConstructorDescriptor]>),
    /// Call a user supplied delegate.
    Delegate(Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>),
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activator::Constructors(ctors) => f.debug_tuple("Constructors").field(&ctors.len()).finish(),
            Activator::Delegate(_) => f.write_str("Delegate"),
        }
    }
}

// Marker types that are never valid service identities.
fn restricted_types() -> [TypeId; 5] {
    [
        TypeId::of::<String>(),
        TypeId::of::<str>(),
        TypeId::of::<TypeId>(),
        TypeId::of::<dyn Any>(),
        TypeId::of::<dyn Any + Send + Sync>(),
    ]
}

/// Immutable description of one registered service.
///
/// Replacing a registration creates a new `ServiceRegistration`; the previous
/// one and its compiled factory are discarded.
#[derive(Clone)]
pub struct ServiceRegistration {
    service_type: ServiceType,
    implementation_type: Option<ServiceType>,
    activator: Activator,
    lifetime: Lifetime,
    name: Option<Arc<str>>,
}

impl ServiceRegistration {
    /// Registration of implementation `I` as service `S`.
    pub fn for_type<S, I>(lifetime: Lifetime, name: Option<&str>) -> Result<Self, RegistrationError>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable + Implements<S>,
    {
        let constructors: Arc<[ConstructorDescriptor]> = I::constructors()
            .into_iter()
            .enumerate()
            .map(|(index, ctor)| ctor.into_descriptor::<S>(index))
            .collect();

        if constructors.is_empty() {
            return Err(RegistrationError::NoConstructors(std::any::type_name::<I>()));
        }

        Self::new(
            ServiceType::of::<S>(),
            Some(ServiceType::of::<I>()),
            Activator::Constructors(constructors),
            lifetime,
            name,
        )
    }

    /// Registration backed by a delegate. The delegate must yield an `Arc<S>`
    /// wrapped in [`AnyArc`] for the registered service type.
    pub fn for_delegate(
        service_type: ServiceType,
        delegate: Arc<dyn Fn() -> DiResult<AnyArc> + Send + Sync>,
        lifetime: Lifetime,
        name: Option<&str>,
    ) -> Result<Self, RegistrationError> {
        Self::new(service_type, None, Activator::Delegate(delegate), lifetime, name)
    }

    fn new(
        service_type: ServiceType,
        implementation_type: Option<ServiceType>,
        activator: Activator,
        lifetime: Lifetime,
        name: Option<&str>,
    ) -> Result<Self, RegistrationError> {
        if restricted_types().contains(&service_type.id()) {
            return Err(RegistrationError::RestrictedServiceType(service_type.name()));
        }
        if matches!(name, Some(n) if n.is_empty()) {
            return Err(RegistrationError::EmptyServiceName(service_type.name()));
        }

        Ok(Self {
            service_type,
            implementation_type,
            activator,
            lifetime,
            name: name.map(Arc::from),
        })
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    /// Concrete type behind the service, `None` for delegates.
    pub fn implementation_type(&self) -> Option<ServiceType> {
        self.implementation_type
    }

    pub fn activator(&self) -> &Activator {
        &self.activator
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Storage key for this registration.
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(self.service_type, self.name())
    }

    /// Name of the type that ends up constructed, for diagnostics.
    pub(crate) fn implementation_name(&self) -> &'static str {
        match self.implementation_type {
            Some(implementation) => implementation.name(),
            None => "<delegate>",
        }
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("key", &self.key())
            .field("implementation", &self.implementation_name())
            .field("activator", &self.activator)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
