use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tarkib::prelude::*;

struct A;
struct B;
struct C;
struct D;

#[test]
fn cycle_is_reported_with_full_path() {
    let err = Injector::builder()
        .with_factory(ReusePolicy::Prototype, |_: Arc<B>| A)
        .with_factory(ReusePolicy::Prototype, |_: Arc<C>| B)
        .with_factory(ReusePolicy::Prototype, |_: Arc<A>| C)
        .build()
        .unwrap_err();

    match err {
        TarkibError::CircularDependency(err) => {
            assert_eq!(err.render_chain(), "A -> B -> C -> A");
            assert_eq!(err.scope, "/");
        }
        other => panic!("Expected CircularDependency, got: {other:?}"),
    }
}

#[test]
fn diamond_builds_and_shares_singleton() {
    let injector = Injector::builder()
        .with_factory(ReusePolicy::Prototype, |_: Arc<B>, _: Arc<C>| A)
        .with_factory(ReusePolicy::Prototype, |_: Arc<D>| B)
        .with_factory(ReusePolicy::Prototype, |_: Arc<D>| C)
        .with_factory(ReusePolicy::Singleton, || D)
        .build()
        .unwrap();

    assert!(injector.get_instance::<A>().is_ok());
}

#[test]
fn missing_dependency_fails_build() {
    let err = Injector::builder()
        .with_factory(ReusePolicy::Prototype, |_: Arc<B>| A)
        .build()
        .unwrap_err();

    match err {
        TarkibError::NotRegistered(err) => {
            assert_eq!(err.requested, TypeKey::of::<B>());
            assert_eq!(err.required_by, Some(TypeKey::of::<A>()));
        }
        other => panic!("Expected NotRegistered, got: {other:?}"),
    }
}

#[test]
fn dependencies_are_built_before_dependents() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (log_a, log_b) = (Arc::clone(&log), Arc::clone(&log));

    let injector = Injector::builder()
        .with_factory(ReusePolicy::Prototype, move |_: Arc<B>| {
            log_a.lock().unwrap().push("A");
            A
        })
        .with_factory(ReusePolicy::Prototype, move || {
            log_b.lock().unwrap().push("B");
            B
        })
        .build()
        .unwrap();

    injector.get_instance::<A>().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["B", "A"]);
}

#[test]
fn prototypes_are_distinct() {
    let injector = Injector::builder()
        .with_factory(ReusePolicy::Prototype, || A)
        .build()
        .unwrap();

    let first: Arc<A> = injector.get_instance().unwrap();
    let second: Arc<A> = injector.get_instance().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn concurrent_first_requests_build_one_singleton() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let injector = Injector::builder()
        .with_factory(ReusePolicy::Singleton, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            A
        })
        .build()
        .unwrap();

    let instances: Vec<Arc<A>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| injector.get_instance::<A>().unwrap())).collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, &instances[0])));
}

struct Notifier {
    via: &'static str,
}

impl Injectable for Notifier {
    fn candidates() -> Vec<Candidate> {
        vec![Candidate::constructor("Notifier::new", || Notifier { via: "constructor" })]
    }
}

struct Mailer {
    via: &'static str,
}

impl Injectable for Mailer {
    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::constructor("Mailer::new", || Mailer { via: "constructor" }),
            Candidate::static_factory("Mailer::smtp", || Mailer { via: "smtp" }).preferred(),
        ]
    }
}

struct Printer;

impl Injectable for Printer {
    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::constructor("Printer::new", || Printer).preferred(),
            Candidate::static_factory("Printer::network", || Printer).preferred(),
        ]
    }
}

#[test]
fn single_candidate_needs_no_marker() {
    let injector = Injector::builder()
        .with_type::<Notifier>(ReusePolicy::Prototype)
        .build()
        .unwrap();
    assert_eq!(injector.get_instance::<Notifier>().unwrap().via, "constructor");
}

#[test]
fn preferred_candidate_wins() {
    let injector = Injector::builder()
        .with_type::<Mailer>(ReusePolicy::Singleton)
        .build()
        .unwrap();
    assert_eq!(injector.get_instance::<Mailer>().unwrap().via, "smtp");
}

#[test]
fn two_preferred_candidates_are_ambiguous() {
    let err = Injector::builder()
        .with_type::<Printer>(ReusePolicy::Prototype)
        .build()
        .unwrap_err();

    match err {
        TarkibError::AmbiguousInstantiation(err) => {
            assert_eq!(err.key, TypeKey::of::<Printer>());
            assert_eq!(err.candidates.len(), 2);
        }
        other => panic!("Expected AmbiguousInstantiation, got: {other:?}"),
    }
}

struct Pool {
    size: usize,
}

struct Repository {
    pool: Arc<Pool>,
}

impl Injectable for Repository {
    fn candidates() -> Vec<Candidate> {
        vec![Candidate::instance_factory::<Pool, (), _>("Pool::repository", |pool: Arc<Pool>| {
            Repository { pool }
        })]
    }
}

#[test]
fn instance_factory_is_called_on_resolved_factory() {
    let injector = Injector::builder()
        .with_constant(Pool { size: 4 })
        .with_type::<Repository>(ReusePolicy::Prototype)
        .build()
        .unwrap();

    assert_eq!(injector.get_instance::<Repository>().unwrap().pool.size, 4);
}

#[test]
fn debug_information_lists_definitions() {
    let injector = Injector::builder()
        .with_constant(7u32)
        .with_factory(ReusePolicy::Singleton, |_: Arc<u32>| A)
        .build()
        .unwrap();

    let dump = injector.debug_information();
    assert!(dump.contains("/ u32 (PROTOTYPE)"));
    assert!(dump.contains("(SINGLETON)"));

    let summaries = injector.definitions();
    assert_eq!(summaries.len(), 2);
    let a = summaries.iter().find(|s| s.type_name.ends_with("::A")).unwrap();
    assert_eq!(a.dependencies, vec!["u32".to_string()]);
}
