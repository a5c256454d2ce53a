//! Provider trait: a module of related registrations.
//!
//! Providers group the definitions of one area of an application so the
//! root configuration stays short.
//!
//! # Examples
//! ```rust,ignore
//! struct PersistenceProvider;
//!
//! impl Provider for PersistenceProvider {
//!     fn register(&self, builder: InjectorBuilder) -> InjectorBuilder {
//!         builder
//!             .with_type::<ConnectionPool>(ReusePolicy::Singleton)
//!             .with_closeable::<ConnectionPool>()
//!             .with_scope::<Request>(|scope| scope.with_type::<UnitOfWork>(ReusePolicy::Singleton))
//!     }
//! }
//!
//! let injector = Injector::builder()
//!     .with_provider(&PersistenceProvider)
//!     .with_provider(&MailProvider)
//!     .build()?;
//! ```

use crate::builder::InjectorBuilder;

/// A module that registers related definitions into a builder.
///
/// A provider may declare scopes, register closers and interceptors:
/// anything the builder offers.
pub trait Provider: Send + Sync {
    /// Adds this provider's registrations. Called once per
    /// [`InjectorBuilder::with_provider`] call.
    fn register(&self, builder: InjectorBuilder) -> InjectorBuilder;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::Injector;
    use crate::policy::ReusePolicy;
    use std::sync::Arc;

    struct Settings {
        retries: u32,
    }
    struct Client {
        retries: u32,
    }
    struct Request;

    struct NetworkProvider;

    impl Provider for NetworkProvider {
        fn register(&self, builder: InjectorBuilder) -> InjectorBuilder {
            builder
                .with_constant(Settings { retries: 3 })
                .with_factory(ReusePolicy::Singleton, |settings: Arc<Settings>| Client {
                    retries: settings.retries,
                })
                .with_scope::<Request>(|scope| scope)
        }
    }

    #[test]
    fn provider_registers_definitions() {
        let injector = Injector::builder().with_provider(&NetworkProvider).build().unwrap();

        let client: Arc<Client> = injector.get_instance().unwrap();
        assert_eq!(client.retries, 3);
        assert!(injector.enter_scope(Request).is_ok());
    }

    #[test]
    fn provider_has_name() {
        assert!(NetworkProvider.name().contains("NetworkProvider"));
    }

    #[test]
    fn provider_applied_twice_is_a_duplicate() {
        let result = Injector::builder()
            .with_provider(&NetworkProvider)
            .with_provider(&NetworkProvider)
            .build();
        assert!(result.is_err());
    }
}
