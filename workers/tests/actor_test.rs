
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use test_helpers::{count, counter, wait_until, WAIT_LIMIT};
use workers::{
    Actor, ActorBehavior, ActorConfig, ActorError, Custom, DefaultBehavior, FnBehavior, Mailbox, Pool, Registry,
    RegistryError,
};

fn registry() -> Arc<Registry> {
    Arc::new(Registry::new())
}

/// Records every event tag and how the actor ended.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    shut_down: AtomicBool,
    failures: Mutex<Vec<String>>,
}

struct Recording(Arc<Recorder>);

impl ActorBehavior for Recording {
    fn process_event(&self, _actor: &Actor, event: Custom) -> anyhow::Result<()> {
        if event.tag() == "explode" {
            anyhow::bail!("exploded");
        }
        let entry = match event.payload_as::<u32>() {
            Some(n) => format!("{}:{}", event.tag(), n),
            None => event.tag().to_string(),
        };
        self.0.events.lock().push(entry);
        Ok(())
    }

    fn shutdown_handler(&self, _actor: &Actor) {
        self.0.shut_down.store(true, Ordering::SeqCst);
    }

    fn exception_handler(&self, _actor: &Actor, error: &anyhow::Error) {
        self.0.failures.lock().push(error.to_string());
    }
}

#[test]
fn test_duplicate_name_is_rejected() {
    let registry = registry();
    let pool = Arc::new(Pool::with_size(2).unwrap());
    let config = ActorConfig::default()
        .with_name("a")
        .with_registry(registry.clone())
        .with_pool(pool.clone());

    let first = Actor::new(config.clone(), DefaultBehavior).unwrap();
    let second = Actor::new(config, DefaultBehavior);

    assert!(matches!(
        second,
        Err(ActorError::Registry(RegistryError::DuplicateName(ref name))) if name == "a"
    ));
    assert_eq!(registry.get("a"), Some(first.clone()));

    first.shutdown();
    assert!(wait_until(|| !registry.contains("a")));
    assert!(pool.dispose(Some(WAIT_LIMIT)).unwrap());
}

#[test]
fn test_registry_register_directly() {
    let registry = registry();
    let actor = Actor::new(
        ActorConfig::dedicated().with_name("solo").with_registry(registry.clone()),
        DefaultBehavior,
    )
    .unwrap();

    assert!(matches!(
        registry.register(&actor),
        Err(RegistryError::DuplicateName(_))
    ));
    assert_eq!(registry.names(), vec!["solo".to_string()]);

    assert!(registry.unregister(&actor));
    assert!(!registry.unregister(&actor));
    assert_eq!(registry.register(&actor), Ok(true));

    registry.dispose();
    assert!(registry.is_empty());
    actor.shutdown();
}

#[test]
fn test_unnamed_actor_is_not_registered() {
    let registry = registry();
    let actor = Actor::new(ActorConfig::dedicated().with_registry(registry.clone()), DefaultBehavior).unwrap();

    assert_eq!(registry.register(&actor), Ok(false));
    assert!(registry.is_empty());
    actor.shutdown();
}

#[test]
fn test_dedicated_actor_processes_in_order() {
    let recorder = Arc::new(Recorder::default());
    let actor = Actor::new(
        ActorConfig::dedicated().with_registry(registry()),
        Recording(recorder.clone()),
    )
    .unwrap();

    for n in 0..20u32 {
        assert!(actor.tell_with("n", n));
    }
    assert!(actor.shutdown());

    assert!(wait_until(|| !actor.alive()));
    let expected: Vec<String> = (0..20).map(|n| format!("n:{}", n)).collect();
    assert_eq!(*recorder.events.lock(), expected);
    assert!(recorder.shut_down.load(Ordering::SeqCst));
    assert!(actor.is_dedicated());
}

#[test]
fn test_enqueue_after_shutdown_is_rejected() {
    let registry = registry();
    let actor = Actor::new(
        ActorConfig::dedicated().with_name("closing").with_registry(registry.clone()),
        DefaultBehavior,
    )
    .unwrap();

    assert!(actor.shutdown());
    assert!(wait_until(|| !actor.alive()));

    assert!(!actor.tell("late"));
    assert!(!actor.shutdown());
    assert!(wait_until(|| !registry.contains("closing")));
}

#[test]
fn test_shutdown_discards_backlog() {
    let recorder = Arc::new(Recorder::default());
    let actor = Actor::new(
        ActorConfig::dedicated().with_registry(registry()),
        Recording(recorder.clone()),
    )
    .unwrap();
    let (release, blocked) = flume::bounded::<()>(0);

    actor.perform(move || {
        blocked.recv().ok();
        Ok(())
    });
    actor.shutdown();
    actor.tell("after-shutdown");

    drop(release);
    assert!(wait_until(|| !actor.alive()));
    thread::sleep(Duration::from_millis(20));

    assert!(recorder.events.lock().is_empty());
    assert!(actor.mailbox().is_empty());
}

#[test]
fn test_failure_calls_exception_handler() {
    let recorder = Arc::new(Recorder::default());
    let registry = registry();
    let actor = Actor::new(
        ActorConfig::dedicated().with_name("volatile").with_registry(registry.clone()),
        Recording(recorder.clone()),
    )
    .unwrap();

    actor.tell("before");
    actor.tell("explode");
    actor.tell("after");

    assert!(wait_until(|| recorder.failures.lock().len() == 1));
    assert!(!actor.alive());
    assert_eq!(*recorder.failures.lock(), vec!["exploded".to_string()]);
    assert_eq!(*recorder.events.lock(), vec!["before".to_string()]);
    assert!(!recorder.shut_down.load(Ordering::SeqCst));
    assert!(!registry.contains("volatile"));
}

#[test]
fn test_shared_pool_actor() {
    let pool = Arc::new(Pool::with_size(3).unwrap());
    let (hits, inner) = counter();
    let actor = Actor::new(
        ActorConfig::default().with_pool(pool.clone()).with_registry(registry()),
        FnBehavior::new(move |_actor: &Actor, _event: Custom| {
            inner.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }),
    )
    .unwrap();

    for _ in 0..50 {
        assert!(actor.tell("tick"));
    }

    assert!(wait_until(|| count(&hits) == 50));
    assert!(!actor.is_dedicated());

    let (tx, rx) = flume::bounded(1);
    actor.shutdown_with(move |actor: &Actor| {
        tx.send(actor.id()).ok();
    });
    assert_eq!(rx.recv_timeout(WAIT_LIMIT).unwrap(), actor.id());
    assert!(wait_until(|| !actor.alive()));

    // The shared pool outlives the actor
    assert_eq!(pool.size(), 3);
    assert!(pool.dispose(Some(WAIT_LIMIT)).unwrap());
}

#[test]
fn test_shared_mailbox_is_used() {
    let mailbox = Arc::new(Mailbox::new());
    let actor = Actor::new(
        ActorConfig::dedicated()
            .with_mailbox(mailbox.clone())
            .with_registry(registry()),
        DefaultBehavior,
    )
    .unwrap();

    assert!(Arc::ptr_eq(actor.mailbox(), &mailbox));
    actor.shutdown();
    assert!(wait_until(|| !actor.alive()));
}
