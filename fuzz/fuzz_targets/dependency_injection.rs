#![no_main]

use ferrous_ioc::{DiResult, IocContainer, Lifetime, Resolver, ResolverContext};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

// Six node types; the input decides which nodes each node depends on.
macro_rules! nodes {
    ($($node:ident = $index:expr),+) => {
        $(struct $node;)+

        fn resolve_node(r: &ResolverContext<'_>, index: usize) -> DiResult<()> {
            match index {
                $($index => r.get_instance::<$node>().map(drop),)+
                _ => unreachable!(),
            }
        }

        fn register_node(container: &IocContainer, index: usize, lifetime: Lifetime, edges: Vec<usize>) {
            match index {
                $($index => container
                    .register_factory::<$node, _>(lifetime, move |r| {
                        for &edge in &edges {
                            resolve_node(r, edge)?;
                        }
                        Ok(Arc::new($node))
                    })
                    .unwrap(),)+
                _ => unreachable!(),
            }
        }

        fn get_node(container: &IocContainer, index: usize) -> DiResult<()> {
            match index {
                $($index => container.get_instance::<$node>().map(drop),)+
                _ => unreachable!(),
            }
        }
    };
}

nodes!(N0 = 0, N1 = 1, N2 = 2, N3 = 3, N4 = 4, N5 = 5);

const NODES: usize = 6;

fuzz_target!(|data: &[u8]| {
    if data.len() < NODES {
        return;
    }

    // One byte per node: low 6 bits are the dependency mask, bit 6 the lifetime
    let container = IocContainer::new();
    let mut adjacency = [[false; NODES]; NODES];
    for (index, byte) in data[..NODES].iter().enumerate() {
        let edges: Vec<usize> = (0..NODES).filter(|bit| byte & (1 << bit) != 0).collect();
        for &edge in &edges {
            adjacency[index][edge] = true;
        }
        let lifetime = if byte & 0x40 != 0 {
            Lifetime::Singleton
        } else {
            Lifetime::Transient
        };
        register_node(&container, index, lifetime, edges);
    }

    for index in 0..NODES {
        let result = get_node(&container, index);
        let cyclic = reaches_cycle(&adjacency, index, &mut Vec::new());
        match result {
            Ok(()) => assert!(!cyclic),
            Err(err) => {
                assert!(cyclic, "unexpected error: {}", err);
                assert!(err.is_circular(), "unexpected error: {}", err);
            }
        }
    }
});

fn reaches_cycle(adjacency: &[[bool; NODES]; NODES], node: usize, path: &mut Vec<usize>) -> bool {
    if path.contains(&node) {
        return true;
    }
    path.push(node);
    let found = (0..NODES).any(|next| adjacency[node][next] && reaches_cycle(adjacency, next, path));
    path.pop();
    found
}
