//! # Tarkib: in-process dependency resolution for Rust
//!
//! Builds object graphs from explicit, statically-typed definitions:
//!
//! - **Scopes**: nested contexts entered with a caller-supplied object,
//!   each with its own singleton cache and teardown
//! - **Validation**: missing dependencies and cycles fail at build time
//! - **Disambiguation**: a pluggable chain picks one construction candidate
//! - **Interception**: substitute or observe instances, scope-aware
//! - **Lifecycle**: deterministic, failure-tolerant closing
//!
//! ```rust
//! use std::sync::Arc;
//! use tarkib::prelude::*;
//!
//! struct Greeting(&'static str);
//! struct Greeter {
//!     greeting: Arc<Greeting>,
//! }
//!
//! impl Injectable for Greeter {
//!     fn candidates() -> Vec<Candidate> {
//!         vec![Candidate::constructor("Greeter::new", |greeting: Arc<Greeting>| Greeter { greeting })]
//!     }
//! }
//!
//! let injector = Injector::builder()
//!     .with_constant(Greeting("hello"))
//!     .with_type::<Greeter>(ReusePolicy::Singleton)
//!     .build()
//!     .expect("Failed to build injector");
//!
//! let greeter: Arc<Greeter> = injector.get_instance().expect("Failed to resolve");
//! assert_eq!(greeter.greeting.0, "hello");
//! ```

pub use tarkib_container::*;
pub use tarkib_support::*;
