//! Compilation of constructor-based registrations into routines.
//!
//! A compiled routine is a closure tree: the routine for a service captures
//! the routines of its dependencies and calls them before running the chosen
//! constructor. Compiling once and reusing the closure avoids walking the
//! registry on every resolution.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::constructor::{ConstructorDescriptor, InstanceArguments};
use crate::error::{DiError, DiResult};
use crate::factory::ServiceFactory;
use crate::key::ServiceType;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Routine};

/// Compiled dependency of a constructor parameter.
#[derive(Clone)]
pub(crate) struct Dependency {
    /// Parameter position in the chosen constructor.
    pub(crate) index: usize,
    pub(crate) factory: Arc<ServiceFactory>,
}

/// Turns a chosen constructor and its dependency factories into a routine.
///
/// States: uncompiled, compiled, invalidated. Invalidation returns the
/// compiler to the uncompiled state; a later `compile` rebuilds the routine.
pub(crate) trait ServiceFactoryCompiler: Send + Sync {
    fn implementation_type(&self) -> ServiceType;

    fn lifetime(&self) -> Lifetime;

    /// Returns the routine, compiling it on first use. Idempotent.
    fn compile(&self) -> DiResult<Routine>;

    fn is_compiled(&self) -> bool;

    /// Drops the routine and anything it cached.
    fn invalidate(&self);

    /// Produces an instance with explicit arguments overriding compiled
    /// dependencies.
    fn invoke_with(&self, args: &InstanceArguments) -> DiResult<AnyArc>;
}

// Constructor plus the dependencies that feed it.
struct CompilerCore {
    constructor: ConstructorDescriptor,
    dependencies: Vec<Dependency>,
}

impl CompilerCore {
    // One slot per constructor parameter; skipped parameters stay `None`.
    fn dependency_routines(&self) -> DiResult<Arc<[Option<Routine>]>> {
        let mut routines: Vec<Option<Routine>> = vec![None; self.constructor.parameters().len()];
        for dependency in &self.dependencies {
            routines[dependency.index] = Some(dependency.factory.routine()?);
        }
        Ok(routines.into())
    }
}

fn construct(constructor: &ConstructorDescriptor, routines: &[Option<Routine>]) -> DiResult<AnyArc> {
    let values = routines
        .iter()
        .map(|routine| routine.as_ref().map(|r| r()).transpose())
        .collect::<DiResult<Vec<_>>>()?;
    constructor.invoke(values)
}

fn construct_with(
    constructor: &ConstructorDescriptor,
    routines: &[Option<Routine>],
    args: &InstanceArguments,
) -> DiResult<AnyArc> {
    let values = constructor
        .parameters()
        .iter()
        .zip(routines)
        .map(|(parameter, routine)| match args.get(parameter) {
            Some(value) => Ok(Some(value.clone())),
            None => routine.as_ref().map(|r| r()).transpose(),
        })
        .collect::<DiResult<Vec<_>>>()?;
    constructor.invoke(values)
}

struct CompiledTransient {
    routine: Routine,
    dependencies: Arc<[Option<Routine>]>,
}

/// Compiler for transient services: every call of the routine constructs a
/// new instance from freshly produced dependencies.
pub(crate) struct TransientServiceFactoryCompiler {
    core: CompilerCore,
    compiled: RwLock<Option<CompiledTransient>>,
    compile_lock: Mutex<()>,
}

impl TransientServiceFactoryCompiler {
    pub(crate) fn new(constructor: ConstructorDescriptor, dependencies: Vec<Dependency>) -> Self {
        Self {
            core: CompilerCore {
                constructor,
                dependencies,
            },
            compiled: RwLock::new(None),
            compile_lock: Mutex::new(()),
        }
    }

    fn compiled_dependencies(&self) -> DiResult<Arc<[Option<Routine>]>> {
        self.compile()?;
        self.compiled
            .read()
            .as_ref()
            .map(|compiled| compiled.dependencies.clone())
            .ok_or(DiError::FactoryInvalidated(self.core.constructor.implementation().name()))
    }
}

impl ServiceFactoryCompiler for TransientServiceFactoryCompiler {
    fn implementation_type(&self) -> ServiceType {
        self.core.constructor.implementation()
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    fn compile(&self) -> DiResult<Routine> {
        if let Some(compiled) = self.compiled.read().as_ref() {
            return Ok(compiled.routine.clone());
        }

        let _guard = self.compile_lock.lock();
        if let Some(compiled) = self.compiled.read().as_ref() {
            return Ok(compiled.routine.clone());
        }

        let dependencies = self.core.dependency_routines()?;
        let constructor = self.core.constructor.clone();
        let captured = dependencies.clone();
        let routine: Routine = Arc::new(move || construct(&constructor, &captured));

        trace!(
            implementation = self.implementation_type().name(),
            parameters = dependencies.len(),
            "compiled transient routine"
        );

        *self.compiled.write() = Some(CompiledTransient {
            routine: routine.clone(),
            dependencies,
        });
        Ok(routine)
    }

    fn is_compiled(&self) -> bool {
        self.compiled.read().is_some()
    }

    fn invalidate(&self) {
        let _guard = self.compile_lock.lock();
        self.compiled.write().take();
    }

    fn invoke_with(&self, args: &InstanceArguments) -> DiResult<AnyArc> {
        let dependencies = self.compiled_dependencies()?;
        construct_with(&self.core.constructor, &dependencies, args)
    }
}

/// Compiler for singleton services: the instance is constructed once during
/// compilation and the routine hands out that instance until invalidation.
pub(crate) struct SingletonServiceFactoryCompiler {
    core: CompilerCore,
    compiled: RwLock<Option<Routine>>,
    compile_lock: Mutex<()>,
}

impl SingletonServiceFactoryCompiler {
    pub(crate) fn new(constructor: ConstructorDescriptor, dependencies: Vec<Dependency>) -> Self {
        Self {
            core: CompilerCore {
                constructor,
                dependencies,
            },
            compiled: RwLock::new(None),
            compile_lock: Mutex::new(()),
        }
    }
}

impl ServiceFactoryCompiler for SingletonServiceFactoryCompiler {
    fn implementation_type(&self) -> ServiceType {
        self.core.constructor.implementation()
    }

    fn lifetime(&self) -> Lifetime {
        Lifetime::Singleton
    }

    fn compile(&self) -> DiResult<Routine> {
        if let Some(routine) = self.compiled.read().as_ref() {
            return Ok(routine.clone());
        }

        let _guard = self.compile_lock.lock();
        if let Some(routine) = self.compiled.read().as_ref() {
            return Ok(routine.clone());
        }

        let dependencies = self.core.dependency_routines()?;
        let instance = construct(&self.core.constructor, &dependencies)?;
        let routine: Routine = Arc::new(move || Ok(instance.clone()));

        trace!(
            implementation = self.implementation_type().name(),
            "constructed singleton instance"
        );

        *self.compiled.write() = Some(routine.clone());
        Ok(routine)
    }

    fn is_compiled(&self) -> bool {
        self.compiled.read().is_some()
    }

    fn invalidate(&self) {
        let _guard = self.compile_lock.lock();
        self.compiled.write().take();
    }

    fn invoke_with(&self, _args: &InstanceArguments) -> DiResult<AnyArc> {
        let routine = self.compile()?;
        routine()
    }
}
