//! Core engine of Tarkib: definitions, scopes and the resolving injector.

pub mod builder;
pub mod disambiguation;
pub mod error;
pub mod factory;
mod graph;
pub mod injector;
pub mod instantiator;
pub mod interception;
pub mod key;
pub mod lifecycle;
pub mod policy;
pub mod provider;
pub mod registry;
pub mod scope;
mod store;

pub use builder::InjectorBuilder;
pub use error::{Result, TarkibError};
pub use injector::Injector;
pub use key::TypeKey;
pub use scope::Scope;

pub mod prelude {
    pub use crate::builder::InjectorBuilder;
    pub use crate::disambiguation::{
        Candidate, CandidateKind, Disambiguation, Disambiguator, Injectable, MarkerDisambiguator,
        SingleConstructorDisambiguator, SingleStaticFactoryDisambiguator,
    };
    pub use crate::error::{BoxError, Result, TarkibError};
    pub use crate::factory::{Instance, fallible};
    pub use crate::injector::Injector;
    pub use crate::interception::{Interceptor, ObservingInterceptor, OverwritingInterceptor, TransparentInterceptor};
    pub use crate::key::TypeKey;
    pub use crate::lifecycle::Close;
    pub use crate::policy::{ReusePolicy, SingletonType};
    pub use crate::provider::Provider;
    pub use crate::scope::Scope;
}
