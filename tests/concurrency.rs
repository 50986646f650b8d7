//! Concurrent resolution and registration.

use crossbeam_utils::thread;
use ferrous_ioc::{
    Constructor, ConstructorChooser, ConstructorDescriptor, DiError, DiObserver, Injectable, IocContainer, Lifetime,
    MostResolvableConstructorChooser, Resolver, ServiceKey, ServiceRegistry, ServiceType,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const THREADS: usize = 8;

static HEAVY_BUILT: AtomicUsize = AtomicUsize::new(0);

struct Heavy {
    data: Vec<u64>,
}

impl Injectable for Heavy {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| {
            HEAVY_BUILT.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            Heavy { data: (0..1000).collect() }
        })]
    }
}

#[derive(Default)]
struct BuildCounter {
    built: AtomicUsize,
}

impl DiObserver for BuildCounter {
    fn building(&self, _key: &ServiceKey) {}

    fn built(&self, _key: &ServiceKey, _duration: Duration) {
        self.built.fetch_add(1, Ordering::SeqCst);
    }

    fn build_failed(&self, _key: &ServiceKey, _error: &DiError) {}
}

#[test]
fn test_concurrent_first_resolution_builds_singleton_once() {
    let counter = Arc::new(BuildCounter::default());
    let container = IocContainer::builder().observer(counter.clone()).build();
    container.register_singleton::<Heavy, Heavy>().unwrap();

    let barrier = Barrier::new(THREADS);
    let instances = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    container.get_instance::<Heavy>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    })
    .unwrap();

    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(instances[0].data.len(), 1000);
    assert_eq!(HEAVY_BUILT.load(Ordering::SeqCst), 1);
    assert_eq!(counter.built.load(Ordering::SeqCst), 1);
}

static DELEGATE_CALLS: AtomicUsize = AtomicUsize::new(0);

struct Pool;

#[test]
fn test_concurrent_singleton_delegate_called_once() {
    let container = IocContainer::new();
    container
        .register_factory::<Pool, _>(Lifetime::Singleton, |_| {
            DELEGATE_CALLS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            Ok(Arc::new(Pool))
        })
        .unwrap();

    let barrier = Barrier::new(THREADS);
    let instances = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    container.get_instance::<Pool>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
    })
    .unwrap();

    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(DELEGATE_CALLS.load(Ordering::SeqCst), 1);
}

// ----- Graphs -----

struct Settings {
    generation: usize,
}

struct Service {
    settings: Arc<Settings>,
}

impl Injectable for Service {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|settings: Arc<Settings>| Service { settings })]
    }
}

struct Handler {
    service: Arc<Service>,
}

impl Injectable for Handler {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|service: Arc<Service>| Handler { service })]
    }
}

#[test]
fn test_concurrent_transient_graph_resolution() {
    let container = IocContainer::new();
    container.register_instance(Arc::new(Settings { generation: 0 })).unwrap();
    container.register_transient::<Service, Service>().unwrap();
    container.register_transient::<Handler, Handler>().unwrap();

    let barrier = Barrier::new(THREADS);
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                for _ in 0..200 {
                    let handler = container.get_instance::<Handler>().unwrap();
                    assert_eq!(handler.service.settings.generation, 0);
                }
            });
        }
    })
    .unwrap();

    assert!(container.service_descriptors().iter().all(|d| d.compiled));
}

#[test]
fn test_resolution_during_reregistration() {
    const GENERATIONS: usize = 20;

    let container = IocContainer::new();
    container.register_instance(Arc::new(Settings { generation: 0 })).unwrap();
    container.register_singleton::<Service, Service>().unwrap();
    container.register_transient::<Handler, Handler>().unwrap();

    let done = AtomicUsize::new(0);
    thread::scope(|s| {
        for _ in 0..THREADS - 1 {
            s.spawn(|_| {
                let mut last = 0;
                while done.load(Ordering::SeqCst) == 0 {
                    let handler = container.get_instance::<Handler>().unwrap();
                    // Generations never go backwards for a single reader.
                    assert!(handler.service.settings.generation >= last);
                    last = handler.service.settings.generation;
                }
            });
        }

        s.spawn(|_| {
            for generation in 1..=GENERATIONS {
                container.register_instance(Arc::new(Settings { generation })).unwrap();
                std::thread::sleep(Duration::from_millis(1));
            }
            done.store(1, Ordering::SeqCst);
        });
    })
    .unwrap();

    let handler = container.get_instance::<Handler>().unwrap();
    assert_eq!(handler.service.settings.generation, GENERATIONS);
}

#[test]
fn test_concurrent_named_registrations() {
    let container = IocContainer::new();

    thread::scope(|s| {
        for t in 0..THREADS {
            let container = &container;
            s.spawn(move |_| {
                for i in 0..25 {
                    let name = format!("worker-{}-{}", t, i);
                    container
                        .register_named_instance(Arc::new(Settings { generation: i }), &name)
                        .unwrap();
                    let settings = container.get_instance_by_name::<Settings>(&name).unwrap();
                    assert_eq!(settings.generation, i);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(container.get_all_instances::<Settings>().unwrap().len(), THREADS * 25);
}

// ----- Cycles built from both ends at once -----

#[derive(Debug)]
struct Left(#[allow(dead_code)] Arc<Right>);
#[derive(Debug)]
struct Right(#[allow(dead_code)] Arc<Left>);

impl Injectable for Left {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(Left)]
    }
}

impl Injectable for Right {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(Right)]
    }
}

// Holds each build open long enough for both threads to own one end.
struct SlowChooser;

impl ConstructorChooser for SlowChooser {
    fn choose_constructor<'c>(
        &self,
        implementation: ServiceType,
        constructors: &'c [ConstructorDescriptor],
        registry: &dyn ServiceRegistry,
    ) -> Option<&'c ConstructorDescriptor> {
        std::thread::sleep(Duration::from_millis(100));
        MostResolvableConstructorChooser.choose_constructor(implementation, constructors, registry)
    }
}

#[test]
fn test_concurrent_resolution_of_cycle_ends_reports_cycle() {
    for lifetime in [Lifetime::Transient, Lifetime::Singleton] {
        let container = IocContainer::builder().constructor_chooser(Arc::new(SlowChooser)).build();
        container.register_type::<Left, Left>(lifetime).unwrap();
        container.register_type::<Right, Right>(lifetime).unwrap();

        let barrier = Barrier::new(2);
        let (left, right) = thread::scope(|s| {
            let left = s.spawn(|_| {
                barrier.wait();
                container.get_instance::<Left>().map(|_| ())
            });
            let right = s.spawn(|_| {
                barrier.wait();
                container.get_instance::<Right>().map(|_| ())
            });
            (left.join().unwrap(), right.join().unwrap())
        })
        .unwrap();

        for result in [left, right] {
            let err = result.unwrap_err();
            assert!(err.is_circular(), "expected circular dependency, got {:?}", err);
        }

        // Nothing was left holding a build lock.
        assert!(container.get_instance::<Left>().unwrap_err().is_circular());
    }
}
