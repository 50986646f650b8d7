use ferrous_ioc::{implements, Constructor, Injectable, IocContainer, Lifetime, Resolver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ----- Application style graph -----

trait ILogger: Send + Sync {
    fn log(&self, message: &str) -> String;
}

trait IConfig: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

trait ISettings: Send + Sync {
    fn config(&self) -> &Arc<dyn IConfig>;
}

struct Logger;

impl ILogger for Logger {
    fn log(&self, message: &str) -> String {
        format!("[log] {}", message)
    }
}

impl Injectable for Logger {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| Logger)]
    }
}

struct ConfigManager;

impl IConfig for ConfigManager {
    fn get(&self, key: &str) -> Option<String> {
        (key == "mode").then(|| "release".to_string())
    }
}

impl Injectable for ConfigManager {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| ConfigManager)]
    }
}

struct Settings {
    config: Arc<dyn IConfig>,
}

impl ISettings for Settings {
    fn config(&self) -> &Arc<dyn IConfig> {
        &self.config
    }
}

impl Injectable for Settings {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|config: Arc<dyn IConfig>| Settings { config })]
    }
}

implements!(Logger => dyn ILogger);
implements!(ConfigManager => dyn IConfig);
implements!(Settings => dyn ISettings);

#[test]
fn test_singleton_graph_shares_instances() {
    let container = IocContainer::new();
    container.register_singleton::<dyn ILogger, Logger>().unwrap();
    container.register_singleton::<dyn ISettings, Settings>().unwrap();
    container.register_singleton::<dyn IConfig, ConfigManager>().unwrap();

    let first = container.get_instance::<dyn ISettings>().unwrap();
    let second = container.get_instance::<dyn ISettings>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(first.config(), second.config()));
    assert!(Arc::ptr_eq(first.config(), &container.get_instance::<dyn IConfig>().unwrap()));
    assert_eq!(first.config().get("mode").as_deref(), Some("release"));

    let logger = container.get_instance::<dyn ILogger>().unwrap();
    assert_eq!(logger.log("ready"), "[log] ready");
}

#[test]
fn test_transient_graph_builds_fresh_instances() {
    let container = IocContainer::new();
    container.register_transient::<dyn ISettings, Settings>().unwrap();
    container.register_transient::<dyn IConfig, ConfigManager>().unwrap();

    let first = container.get_instance::<dyn ISettings>().unwrap();
    let second = container.get_instance::<dyn ISettings>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(first.config(), second.config()));
}

#[test]
fn test_transient_over_singleton_dependency() {
    let container = IocContainer::new();
    container.register_transient::<dyn ISettings, Settings>().unwrap();
    container.register_singleton::<dyn IConfig, ConfigManager>().unwrap();

    let first = container.get_instance::<dyn ISettings>().unwrap();
    let second = container.get_instance::<dyn ISettings>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(first.config(), second.config()));
}

// ----- Shared dependencies inside one graph -----

struct Shared;
struct Left(Arc<Shared>);
struct Right(Arc<Shared>);
struct Root(Arc<Left>, Arc<Right>);

impl Injectable for Shared {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|| Shared)]
    }
}

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

impl Injectable for Root {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(Root)]
    }
}

fn root_container(shared: Lifetime) -> IocContainer {
    let container = IocContainer::new();
    container.register_type::<Shared, Shared>(shared).unwrap();
    container.register_transient::<Left, Left>().unwrap();
    container.register_transient::<Right, Right>().unwrap();
    container.register_transient::<Root, Root>().unwrap();
    container
}

#[test]
fn test_transient_dependency_shared_by_two_branches() {
    let container = root_container(Lifetime::Transient);
    let root = container.get_instance::<Root>().unwrap();
    assert!(!Arc::ptr_eq(&root.0 .0, &root.1 .0));
}

#[test]
fn test_singleton_dependency_shared_by_two_branches() {
    let container = root_container(Lifetime::Singleton);

    let a = container.get_instance::<Root>().unwrap();
    let b = container.get_instance::<Root>().unwrap();
    assert!(Arc::ptr_eq(&a.0 .0, &a.1 .0));
    assert!(Arc::ptr_eq(&a.0 .0, &b.1 .0));
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_singleton_delegate_called_once_on_first_use() {
    let built = Arc::new(AtomicUsize::new(0));
    struct Eager;

    let container = IocContainer::new();
    let counter = built.clone();
    container
        .register_factory::<Eager, _>(Lifetime::Singleton, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Eager))
        })
        .unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 0);
    let a = container.get_instance::<Eager>().unwrap();
    let b = container.get_instance::<Eager>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(built.load(Ordering::SeqCst), 1);
}
