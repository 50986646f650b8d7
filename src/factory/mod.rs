//! Compiled service factories.
//!
//! A [`ServiceFactory`] is the compiled form of one registration. It wraps
//! either a compiler (constructor-based registrations) or a delegate invoker,
//! remembers which factories were compiled on top of it, and invalidates them
//! along with itself when its registration changes.

pub(crate) mod builder;
pub(crate) mod compiler;
pub(crate) mod invoker;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::constructor::InstanceArguments;
use crate::error::{DiError, DiResult};
use crate::key::ServiceType;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Routine, ServiceRegistration};
use crate::registry::InvalidationListener;

use compiler::ServiceFactoryCompiler;
use invoker::DelegateInvoker;

#[derive(Clone)]
enum FactoryKind {
    Compiled(Arc<dyn ServiceFactoryCompiler>),
    Delegate(Arc<dyn DelegateInvoker>),
}

impl FactoryKind {
    fn is_compiled(&self) -> bool {
        match self {
            FactoryKind::Compiled(compiler) => compiler.is_compiled(),
            FactoryKind::Delegate(invoker) => invoker.is_compiled(),
        }
    }

    fn invalidate(&self) {
        match self {
            FactoryKind::Compiled(compiler) => compiler.invalidate(),
            FactoryKind::Delegate(invoker) => invoker.invalidate(),
        }
    }
}

/// Compiled, cached construction routine for one registration.
pub struct ServiceFactory {
    service_type: ServiceType,
    implementation: &'static str,
    lifetime: Lifetime,
    kind: RwLock<Option<FactoryKind>>,
    invalidated: AtomicBool,
    parents: Mutex<Vec<Weak<ServiceFactory>>>,
    skipped_parameters: Vec<ServiceType>,
    listener: Option<Weak<dyn InvalidationListener>>,
}

impl ServiceFactory {
    /// Wraps a compiler and compiles it immediately.
    pub(crate) fn compiled(
        registration: &ServiceRegistration,
        compiler: Arc<dyn ServiceFactoryCompiler>,
        skipped_parameters: Vec<ServiceType>,
        listener: Option<Weak<dyn InvalidationListener>>,
    ) -> DiResult<Arc<Self>> {
        compiler.compile()?;
        debug_assert_eq!(compiler.lifetime(), registration.lifetime());
        Ok(Arc::new(Self {
            service_type: registration.service_type(),
            implementation: compiler.implementation_type().name(),
            lifetime: compiler.lifetime(),
            kind: RwLock::new(Some(FactoryKind::Compiled(compiler))),
            invalidated: AtomicBool::new(false),
            parents: Mutex::new(Vec::new()),
            skipped_parameters,
            listener,
        }))
    }

    pub(crate) fn delegate(
        registration: &ServiceRegistration,
        invoker: Arc<dyn DelegateInvoker>,
        listener: Option<Weak<dyn InvalidationListener>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            service_type: registration.service_type(),
            implementation: registration.implementation_name(),
            lifetime: invoker.lifetime(),
            kind: RwLock::new(Some(FactoryKind::Delegate(invoker))),
            invalidated: AtomicBool::new(false),
            parents: Mutex::new(Vec::new()),
            skipped_parameters: Vec::new(),
            listener,
        })
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Constructor parameters that were not registered when this factory was
    /// compiled.
    pub fn skipped_parameters(&self) -> &[ServiceType] {
        &self.skipped_parameters
    }

    /// Produces an instance.
    pub fn get_instance(&self) -> DiResult<AnyArc> {
        let routine = self.routine()?;
        routine()
    }

    /// Produces an instance with explicit per-call arguments.
    ///
    /// Arguments only apply to constructor-based transient services. Singleton
    /// and delegate factories ignore them.
    pub fn get_instance_with(&self, args: &InstanceArguments) -> DiResult<AnyArc> {
        if args.is_empty() {
            return self.get_instance();
        }

        match self.current_kind()? {
            FactoryKind::Compiled(compiler) if compiler.lifetime() == Lifetime::Transient => {
                compiler.invoke_with(args)
            }
            _ => {
                debug!(
                    service = self.service_type.name(),
                    lifetime = %self.lifetime,
                    "explicit arguments ignored"
                );
                self.get_instance()
            }
        }
    }

    /// Whether a routine or a cached delegate result exists and the factory
    /// has not been invalidated. A singleton delegate is not compiled until
    /// its first call.
    pub fn is_compiled(&self) -> bool {
        self.is_valid() && self.kind.read().as_ref().map_or(false, FactoryKind::is_compiled)
    }

    /// Whether the factory can still produce instances.
    pub fn is_valid(&self) -> bool {
        !self.invalidated.load(Ordering::Acquire) && self.kind.read().is_some()
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Routine for use inside a parent's compiled routine.
    pub(crate) fn routine(&self) -> DiResult<Routine> {
        match self.current_kind()? {
            FactoryKind::Compiled(compiler) => compiler.compile(),
            FactoryKind::Delegate(invoker) => Ok(invoker.routine()),
        }
    }

    fn current_kind(&self) -> DiResult<FactoryKind> {
        if self.invalidated.load(Ordering::Acquire) {
            return Err(DiError::FactoryInvalidated(self.service_type.name()));
        }
        self.kind
            .read()
            .clone()
            .ok_or(DiError::FactoryInvalidated(self.service_type.name()))
    }

    /// Records `parent` as compiled on top of this factory. A parent added
    /// after this factory was invalidated is invalidated right away.
    pub(crate) fn add_parent(&self, parent: &Arc<ServiceFactory>) {
        {
            let mut parents = self.parents.lock();
            parents.retain(|p| p.strong_count() > 0);
            parents.push(Arc::downgrade(parent));
        }
        if self.invalidated.load(Ordering::Acquire) {
            parent.invalidate();
        }
    }

    /// Invalidates this factory and every live parent. Idempotent.
    pub fn invalidate(&self) {
        if self.invalidated.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!(
            service = self.service_type.name(),
            implementation = self.implementation,
            "invalidating service factory"
        );

        let kind = self.kind.write().take();
        if let Some(kind) = kind {
            kind.invalidate();
        }

        let parents = std::mem::take(&mut *self.parents.lock());
        for parent in parents.iter().filter_map(Weak::upgrade) {
            parent.invalidate();
        }

        if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
            listener.on_invalidated(&self.service_type);
        }
    }
}

impl fmt::Debug for ServiceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFactory")
            .field("service_type", &self.service_type)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("compiled", &self.is_compiled())
            .field("skipped_parameters", &self.skipped_parameters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constructor::{Constructor, Injectable};
    use compiler::{Dependency, SingletonServiceFactoryCompiler, TransientServiceFactoryCompiler};

    struct Leaf;
    impl Injectable for Leaf {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|| Leaf)]
        }
    }

    struct Branch(Arc<Leaf>);
    impl Injectable for Branch {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(Branch)]
        }
    }

    fn leaf_factory(lifetime: Lifetime) -> Arc<ServiceFactory> {
        let registration = ServiceRegistration::for_type::<Leaf, Leaf>(lifetime, None).unwrap();
        let ctor = Leaf::constructors().remove(0).into_descriptor::<Leaf>(0);
        let compiler: Arc<dyn ServiceFactoryCompiler> = match lifetime {
            Lifetime::Transient => Arc::new(TransientServiceFactoryCompiler::new(ctor, Vec::new())),
            Lifetime::Singleton => Arc::new(SingletonServiceFactoryCompiler::new(ctor, Vec::new())),
        };
        ServiceFactory::compiled(&registration, compiler, Vec::new(), None).unwrap()
    }

    fn branch_factory(leaf: &Arc<ServiceFactory>) -> Arc<ServiceFactory> {
        let registration = ServiceRegistration::for_type::<Branch, Branch>(Lifetime::Transient, None).unwrap();
        let ctor = Branch::constructors().remove(0).into_descriptor::<Branch>(0);
        let dependencies = vec![Dependency {
            index: 0,
            factory: leaf.clone(),
        }];
        let compiler = Arc::new(TransientServiceFactoryCompiler::new(ctor, dependencies));
        let branch = ServiceFactory::compiled(&registration, compiler, Vec::new(), None).unwrap();
        leaf.add_parent(&branch);
        branch
    }

    #[test]
    fn compiles_eagerly() {
        let leaf = leaf_factory(Lifetime::Transient);
        assert!(leaf.is_compiled());
        assert!(leaf.get_instance().unwrap().downcast_ref::<Arc<Leaf>>().is_some());
    }

    #[test]
    fn invalidation_cascades_to_parents() {
        let leaf = leaf_factory(Lifetime::Singleton);
        let branch = branch_factory(&leaf);
        assert!(branch.is_compiled());

        leaf.invalidate();
        assert!(!leaf.is_compiled());
        assert!(!branch.is_compiled());
        assert!(matches!(branch.get_instance(), Err(DiError::FactoryInvalidated(_))));

        // Second call is a no-op.
        leaf.invalidate();
    }

    #[test]
    fn parent_added_after_invalidation_is_invalidated() {
        let leaf = leaf_factory(Lifetime::Transient);
        leaf.invalidate();

        let registration = ServiceRegistration::for_type::<Leaf, Leaf>(Lifetime::Transient, None).unwrap();
        let other = leaf_factory(Lifetime::Transient);
        let parent = ServiceFactory::delegate(
            &registration,
            invoker::for_lifetime(ServiceType::of::<Leaf>(), other.routine().unwrap(), Lifetime::Transient),
            None,
        );
        leaf.add_parent(&parent);
        assert!(parent.is_invalidated());
    }

    #[test]
    fn rebuilt_parents_do_not_accumulate() {
        let leaf = leaf_factory(Lifetime::Singleton);
        for _ in 0..1000 {
            let branch = branch_factory(&leaf);
            branch.invalidate();
        }
        let live = branch_factory(&leaf);

        let parents = leaf.parents.lock();
        assert_eq!(parents.len(), 1);
        assert!(Arc::ptr_eq(&parents[0].upgrade().unwrap(), &live));
    }

    #[test]
    fn singleton_delegate_is_compiled_after_first_call() {
        let registration = ServiceRegistration::for_type::<Leaf, Leaf>(Lifetime::Singleton, None).unwrap();
        let delegate: Routine = Arc::new(|| Ok(Arc::new(Arc::new(Leaf)) as AnyArc));
        let factory = ServiceFactory::delegate(
            &registration,
            invoker::for_lifetime(ServiceType::of::<Leaf>(), delegate, Lifetime::Singleton),
            None,
        );

        assert!(factory.is_valid());
        assert!(!factory.is_compiled());
        factory.get_instance().unwrap();
        assert!(factory.is_compiled());

        factory.invalidate();
        assert!(!factory.is_valid());
        assert!(!factory.is_compiled());
    }

    #[test]
    fn dropped_parents_are_skipped() {
        let leaf = leaf_factory(Lifetime::Transient);
        drop(branch_factory(&leaf));
        leaf.invalidate();
        assert!(leaf.is_invalidated());
    }
}
