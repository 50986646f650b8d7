#![no_main]

use ferrous_ioc::{Constructor, Injectable, InstanceArguments, IocContainer, Resolver};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let pattern = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let register_config = pattern % 2 == 0;

    let container = IocContainer::new();
    container.register_transient::<Client, Client>().unwrap();
    if register_config {
        container.register_instance(Arc::new(Config { id: 42 })).unwrap();
    }

    // Replay the remaining bytes as a sequence of operations
    for op in &data[4..] {
        match op % 6 {
            0 => {
                let client = container.get_instance::<Client>();
                assert_eq!(client.is_ok(), container.is_registered::<Config>());
            }
            1 => {
                let config = container.get_instance_optional::<Config>().unwrap();
                assert_eq!(config.is_some(), container.is_registered::<Config>());
            }
            2 => {
                let args = InstanceArguments::new().with(Arc::new(Config { id: u32::from(*op) }));
                let client = container.get_instance_with::<Client>(&args).unwrap();
                assert_eq!(client.config.id, u32::from(*op));
            }
            3 => {
                container.register_instance(Arc::new(Config { id: 7 })).unwrap();
            }
            4 => {
                container.invalidate::<Config>();
            }
            5 => {
                let all = container.get_all_instances::<Config>().unwrap();
                assert_eq!(all.len(), usize::from(container.is_registered::<Config>()));
            }
            _ => unreachable!(),
        }
    }
});

#[derive(Debug)]
struct Config {
    id: u32,
}

#[derive(Debug)]
struct Client {
    config: Arc<Config>,
}

impl Injectable for Client {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|config: Arc<Config>| Client { config })]
    }
}
