//! # ferrous-ioc
//!
//! Dependency injection runtime that compiles registrations into cached
//! construction routines.
//!
//! ## Features
//!
//! - **Compiled factories**: each registration is compiled once into a tree of
//!   closures and reused for every resolution
//! - **Constructor injection**: implementation types declare their constructors
//!   and the container picks the one it can satisfy best
//! - **Trait services**: register implementations as `dyn Trait` services
//! - **Circular dependency detection**: cycles and overly deep graphs are
//!   rejected with the full chain while compiling
//! - **Safe invalidation**: replacing a registration invalidates every factory
//!   compiled on top of it, and the next resolution recompiles
//! - **Thread-safe**: concurrent first resolutions compile a factory once
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_ioc::{Constructor, Injectable, IocContainer, Lifetime, Resolver};
//! use std::sync::Arc;
//!
//! // Define your services
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(|db: Arc<Database>| UserService { db })]
//!     }
//! }
//!
//! // Register services
//! let container = IocContainer::new();
//! container
//!     .register_instance(Arc::new(Database {
//!         connection_string: "postgres://localhost".to_string(),
//!     }))
//!     .unwrap();
//! container.register_type::<UserService, UserService>(Lifetime::Transient).unwrap();
//!
//! // Resolve
//! let user_service = container.get_instance::<UserService>().unwrap();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Constructed once when its factory is compiled and shared
//!   until the factory is invalidated
//! - **Transient**: Constructed fresh on every resolution, together with all of
//!   its transient dependencies
//!
//! ## Trait Services
//!
//! ```rust
//! use ferrous_ioc::{implements, Constructor, Injectable, IocContainer, Resolver};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) {
//!         println!("[LOG] {}", message);
//!     }
//! }
//! impl Injectable for ConsoleLogger {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new(|| ConsoleLogger)]
//!     }
//! }
//! implements!(ConsoleLogger => dyn Logger);
//!
//! let container = IocContainer::new();
//! container.register_singleton::<dyn Logger, ConsoleLogger>().unwrap();
//!
//! let logger = container.get_instance::<dyn Logger>().unwrap();
//! logger.log("Hello, World!");
//! ```
//!
//! ## Circular Dependencies
//!
//! ```rust
//! use ferrous_ioc::{Constructor, Injectable, IocContainer, Resolver};
//! use std::sync::Arc;
//!
//! struct A(Arc<B>);
//! struct B(Arc<A>);
//! impl Injectable for A {
//!     fn constructors() -> Vec<Constructor<Self>> { vec![Constructor::new(A)] }
//! }
//! impl Injectable for B {
//!     fn constructors() -> Vec<Constructor<Self>> { vec![Constructor::new(B)] }
//! }
//!
//! let container = IocContainer::new();
//! container.register_transient::<A, A>().unwrap();
//! container.register_transient::<B, B>().unwrap();
//!
//! let err = container.get_instance::<A>().err().unwrap();
//! assert!(err.is_circular());
//! ```

// Module declarations
pub mod constructor;
pub mod container;
pub mod context;
pub mod creator;
pub mod descriptors;
pub mod error;
pub mod factory;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod registration;
pub mod registry;
pub mod traits;

// Internal modules
mod internal;

// Re-export core types
pub use constructor::{
    Arguments, Constructor, ConstructorChooser, ConstructorDescriptor, ConstructorFn, Implements, Injectable,
    InstanceArguments, MostResolvableConstructorChooser,
};
pub use container::{IocContainer, IocContainerBuilder};
pub use context::ResolverContext;
pub use creator::ServiceInstanceCreator;
pub use descriptors::ServiceDescriptor;
pub use error::{DependencyResolutionError, DiError, DiResult, RegistrationError};
pub use factory::ServiceFactory;
pub use internal::{CircularDependencyValidator, MAX_RESOLVE_DEPTH};
pub use key::{ServiceKey, ServiceType};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, LoggingObserver};
pub use registration::{Activator, AnyArc, ServiceRegistration};
pub use registry::{InvalidationListener, ServiceRegistrationManager, ServiceRegistry};
pub use traits::{Resolver, ResolverCore};
