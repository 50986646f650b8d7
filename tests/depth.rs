//! Depth ceiling tests over a chain of distinct services, each depending on
//! the next one.

use ferrous_ioc::{Constructor, DiError, Injectable, IocContainer, Lifetime, Resolver, MAX_RESOLVE_DEPTH};
use std::sync::Arc;

macro_rules! chain {
    ($last:ident) => {
        pub struct $last;

        impl Injectable for $last {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::new(|| $last)]
            }
        }
    };
    ($head:ident, $next:ident $(, $rest:ident)*) => {
        pub struct $head(#[allow(dead_code)] pub Arc<$next>);

        impl Injectable for $head {
            fn constructors() -> Vec<Constructor<Self>> {
                vec![Constructor::new($head)]
            }
        }

        chain!($next $(, $rest)*);
    };
}

macro_rules! register_chain {
    ($container:expr, $lifetime:expr; $($link:ident),+) => {
        $( $container.register_type::<$link, $link>($lifetime).unwrap(); )+
    };
}

chain!(
    L00, L01, L02, L03, L04, L05, L06, L07, L08, L09, L10, L11, L12, L13, L14, L15, L16, L17, L18, L19, L20,
    L21, L22, L23, L24, L25, L26, L27, L28, L29, L30, L31, L32, L33, L34, L35, L36, L37, L38, L39, L40, L41,
    L42, L43, L44, L45, L46, L47, L48, L49, L50
);

fn full_chain(lifetime: Lifetime) -> IocContainer {
    let container = IocContainer::new();
    register_chain!(container, lifetime;
        L00, L01, L02, L03, L04, L05, L06, L07, L08, L09, L10, L11, L12, L13, L14, L15, L16, L17, L18, L19, L20,
        L21, L22, L23, L24, L25, L26, L27, L28, L29, L30, L31, L32, L33, L34, L35, L36, L37, L38, L39, L40, L41,
        L42, L43, L44, L45, L46, L47, L48, L49, L50
    );
    container
}

#[test]
fn test_chain_of_51_exceeds_depth() {
    assert_eq!(MAX_RESOLVE_DEPTH, 50);

    for lifetime in [Lifetime::Transient, Lifetime::Singleton] {
        let container = full_chain(lifetime);
        let err = container.get_instance::<L00>().err().unwrap();
        assert!(err.is_max_depth_exceeded(), "{:?}", err);
        assert!(!err.is_circular());
        assert_eq!(err.to_string(), "Dependency resolution error: Max resolve depth 50 exceeded");
    }
}

#[test]
fn test_chain_of_50_reaches_the_ceiling_exactly() {
    let container = full_chain(Lifetime::Transient);
    assert!(container.get_instance::<L01>().is_ok());
}

#[test]
fn test_chain_of_49_succeeds() {
    for lifetime in [Lifetime::Transient, Lifetime::Singleton] {
        let container = full_chain(lifetime);
        assert!(container.get_instance::<L02>().is_ok());
    }
}

#[test]
fn test_depth_counts_only_uncompiled_links() {
    let container = full_chain(Lifetime::Singleton);

    // Compile the tail first; the root build then stops at the compiled link.
    container.get_instance::<L25>().unwrap();
    let root = container.get_instance::<L00>().unwrap();
    let again = container.get_instance::<L00>().unwrap();
    assert!(Arc::ptr_eq(&root, &again));
}

#[test]
fn test_depth_failure_leaves_no_compiled_factories() {
    let container = full_chain(Lifetime::Transient);
    assert!(matches!(
        container.get_instance::<L00>(),
        Err(DiError::Resolution(_))
    ));
    assert!(container.service_descriptors().iter().all(|d| !d.compiled));
}
