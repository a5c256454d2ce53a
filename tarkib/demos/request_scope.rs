//! Request-scoped resolution with Tarkib.
//!
//! Run with `RUST_LOG=tarkib_container=debug cargo run --example request_scope`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tarkib::prelude::*;

// === Define your types ===

struct ConsoleLogger;

impl ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<ConsoleLogger>,
    queries: AtomicUsize,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Close for Database {
    fn close(&self) -> std::result::Result<(), BoxError> {
        self.logger
            .log(&format!("Closing {} after {} queries", self.url, self.queries.load(Ordering::SeqCst)));
        Ok(())
    }
}

/// Entered once per incoming request.
struct HttpRequest {
    user_id: u64,
}

struct UserRepository {
    db: Arc<Database>,
}

impl Injectable for UserRepository {
    fn candidates() -> Vec<Candidate> {
        vec![Candidate::constructor("UserRepository::new", |db: Arc<Database>| UserRepository { db })]
    }
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    request: Arc<HttpRequest>,
    repo: Arc<UserRepository>,
    logger: Arc<ConsoleLogger>,
}

impl UserService {
    fn current_user(&self) -> String {
        self.logger.log(&format!("Getting user {}", self.request.user_id));
        self.repo.find_user(self.request.user_id)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let injector = Injector::builder()
        // Config: a pre-built value
        .with_constant(Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        })
        .with_factory(ReusePolicy::Singleton, || ConsoleLogger)
        // Database: one per injector, closed with it
        .with_factory(ReusePolicy::Singleton, |config: Arc<Config>, logger: Arc<ConsoleLogger>| {
            Database {
                url: config.database_url.clone(),
                logger,
                queries: AtomicUsize::new(0),
            }
        })
        .with_closeable::<Database>()
        .with_scope::<HttpRequest>(|request| {
            request
                // UserRepository: one per request
                .with_type::<UserRepository>(ReusePolicy::Singleton)
                // UserService: new each time
                .with_factory(
                    ReusePolicy::Prototype,
                    |request: Arc<HttpRequest>, repo: Arc<UserRepository>, logger: Arc<ConsoleLogger>| UserService {
                        request,
                        repo,
                        logger,
                    },
                )
        })
        .build()?;

    println!("Injector built successfully");
    println!("{injector:?}");
    println!("{}", injector.debug_information());

    let config: Arc<Config> = injector.get_instance()?;
    println!("Config: database_url={}, debug={}", config.database_url, config.debug);

    for user_id in [42, 7] {
        let request = injector.enter_scope(HttpRequest { user_id })?;
        tracing::info!(user_id, "Handling request");

        let service: Arc<UserService> = request.get_instance()?;
        println!("{}", service.current_user());

        // Same request, same repository
        let again: Arc<UserService> = request.get_instance()?;
        assert!(Arc::ptr_eq(&service.repo, &again.repo));

        request.close()?;
    }

    injector.close()?;
    println!("Everything works!");
    Ok(())
}
