#![no_main]

use ferrous_ioc::{DiError, IocContainer, Lifetime, RegistrationError, Resolver};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    // First 4 bytes pick the registration pattern, next 4 the value, the rest the name
    let pattern = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let value = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let name = String::from_utf8_lossy(&data[8..]).into_owned();

    let container = IocContainer::new();

    match pattern % 5 {
        0 => {
            container.register_instance(Arc::new(TestService { value })).unwrap();
            assert_eq!(container.get_instance::<TestService>().unwrap().value, value);
        }
        1 => {
            // Named registration with arbitrary names
            let result = container.register_named_instance(Arc::new(TestService { value }), &name);
            if name.is_empty() {
                assert!(matches!(
                    result,
                    Err(DiError::Registration(RegistrationError::EmptyServiceName(_)))
                ));
                return;
            }
            result.unwrap();
            let upper = name.to_ascii_uppercase();
            assert_eq!(container.get_instance_by_name::<TestService>(&upper).unwrap().value, value);
            assert!(container.get_instance::<TestService>().is_err());
        }
        2 => {
            // Transient factories produce distinct instances
            container
                .register_factory::<TestService, _>(Lifetime::Transient, move |_| Ok(Arc::new(TestService { value })))
                .unwrap();
            let a = container.get_instance::<TestService>().unwrap();
            let b = container.get_instance::<TestService>().unwrap();
            assert!(!Arc::ptr_eq(&a, &b));
            assert_eq!(a.value, value);
        }
        3 => {
            // Multiple registrations of the same key (last wins)
            container.register_instance(Arc::new(TestService { value: value / 2 })).unwrap();
            container.get_instance::<TestService>().unwrap();
            container.register_instance(Arc::new(TestService { value })).unwrap();
            assert_eq!(container.get_instance::<TestService>().unwrap().value, value);
            assert_eq!(container.service_descriptors().len(), 1);
        }
        4 => {
            // Restricted service types are rejected
            let result = container.register_instance(Arc::new(name));
            assert!(matches!(
                result,
                Err(DiError::Registration(RegistrationError::RestrictedServiceType(_)))
            ));
        }
        _ => unreachable!(),
    }
});

#[derive(Debug)]
struct TestService {
    value: i32,
}
