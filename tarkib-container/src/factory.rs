//! Statically-typed construction functions.
//!
//! Instead of scanning constructors at runtime, a type hands the engine
//! plain functions whose parameters are its dependencies:
//!
//! ```rust
//! use std::sync::Arc;
//! use tarkib_container::factory::Factory;
//! use tarkib_container::key::TypeKey;
//!
//! struct Config;
//! struct Database { config: Arc<Config> }
//!
//! fn connect(config: Arc<Config>) -> Database {
//!     Database { config }
//! }
//!
//! assert_eq!(<fn(Arc<Config>) -> Database as Factory<(Config,)>>::parameters(),
//!            vec![TypeKey::of::<Config>()]);
//! # let _ = connect;
//! ```
//!
//! [`Factory`] covers free functions and closures, [`Method`] covers
//! functions called on a factory object, and [`fallible`] adapts functions
//! returning `Result`.

use std::any::{Any, type_name};
use std::sync::Arc;

use crate::error::BoxError;
use crate::key::TypeKey;

/// A resolved, type-erased instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds an `Output` from dependencies resolved in [`parameters`](Factory::parameters) order.
///
/// Implemented for every `Fn(Arc<A1>, .., Arc<An>) -> Out` up to eight
/// parameters; `Args` is the tuple `(A1, .., An)`.
pub trait Factory<Args>: Send + Sync + 'static {
    /// The type this factory builds.
    type Output: Send + Sync + 'static;

    /// Dependency types, in call order.
    fn parameters() -> Vec<TypeKey>;

    /// Calls the function with `arguments`, which must match [`parameters`](Factory::parameters).
    fn invoke(&self, arguments: &[Instance]) -> Result<Self::Output, BoxError>;
}

/// Builds an `Output` by calling a function on a factory object `Fac`.
///
/// Implemented for every `Fn(Arc<Fac>, Arc<A1>, .., Arc<An>) -> Out` up to
/// seven further parameters. The factory object is itself a dependency
/// and arrives first in `arguments`.
pub trait Method<Fac, Args>: Send + Sync + 'static {
    /// The type this method builds.
    type Output: Send + Sync + 'static;

    /// Dependency types after the factory object, in call order.
    fn parameters() -> Vec<TypeKey>;

    /// Calls the function; `arguments[0]` is the factory object.
    fn invoke(&self, arguments: &[Instance]) -> Result<Self::Output, BoxError>;
}

/// Marks functions returning `Result<Out, E>` as fallible factories.
///
/// ```rust
/// use std::sync::Arc;
/// use tarkib_container::factory::{Factory, fallible};
///
/// struct Config { port: u16 }
/// struct Listener;
///
/// fn bind(config: Arc<Config>) -> Result<Listener, std::io::Error> {
///     if config.port == 0 {
///         return Err(std::io::Error::other("port 0"));
///     }
///     Ok(Listener)
/// }
///
/// let factory = fallible(bind);
/// let config: tarkib_container::factory::Instance = Arc::new(Config { port: 0 });
/// assert!(factory.invoke(&[config]).is_err());
/// ```
pub fn fallible<F>(function: F) -> Fallible<F> {
    Fallible(function)
}

/// Wrapper produced by [`fallible`].
pub struct Fallible<F>(F);

/// Argument marker for [`Fallible`] factories.
pub struct Try<Args>(std::marker::PhantomData<Args>);

/// Takes the next argument and views it as `T`.
fn argument<T: Send + Sync + 'static>(
    arguments: &mut std::slice::Iter<'_, Instance>,
) -> Result<Arc<T>, BoxError> {
    let instance = arguments
        .next()
        .ok_or_else(|| format!("missing argument of type '{}'", type_name::<T>()))?;
    Arc::clone(instance)
        .downcast::<T>()
        .map_err(|_| format!("argument is not a '{}'", type_name::<T>()).into())
}

macro_rules! impl_factories {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Factory<($($arg,)*)> for Func
        where
            Func: Fn($(Arc<$arg>),*) -> Out + Send + Sync + 'static,
            Out: Send + Sync + 'static,
            $($arg: Send + Sync + 'static,)*
        {
            type Output = Out;

            fn parameters() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, arguments: &[Instance]) -> Result<Out, BoxError> {
                let mut arguments = arguments.iter();
                $(let $arg = argument::<$arg>(&mut arguments)?;)*
                Ok((self)($($arg),*))
            }
        }

        impl<Func, Out, Err, $($arg,)*> Factory<Try<($($arg,)*)>> for Fallible<Func>
        where
            Func: Fn($(Arc<$arg>),*) -> Result<Out, Err> + Send + Sync + 'static,
            Err: Into<BoxError>,
            Out: Send + Sync + 'static,
            $($arg: Send + Sync + 'static,)*
        {
            type Output = Out;

            fn parameters() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, arguments: &[Instance]) -> Result<Out, BoxError> {
                let mut arguments = arguments.iter();
                $(let $arg = argument::<$arg>(&mut arguments)?;)*
                (self.0)($($arg),*).map_err(Into::into)
            }
        }

        impl<Func, Fac, Out, $($arg,)*> Method<Fac, ($($arg,)*)> for Func
        where
            Func: Fn(Arc<Fac>, $(Arc<$arg>),*) -> Out + Send + Sync + 'static,
            Fac: Send + Sync + 'static,
            Out: Send + Sync + 'static,
            $($arg: Send + Sync + 'static,)*
        {
            type Output = Out;

            fn parameters() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$arg>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(&self, arguments: &[Instance]) -> Result<Out, BoxError> {
                let mut arguments = arguments.iter();
                let factory = argument::<Fac>(&mut arguments)?;
                $(let $arg = argument::<$arg>(&mut arguments)?;)*
                Ok((self)(factory, $($arg),*))
            }
        }
    };
}

impl_factories!();
impl_factories!(A1);
impl_factories!(A1, A2);
impl_factories!(A1, A2, A3);
impl_factories!(A1, A2, A3, A4);
impl_factories!(A1, A2, A3, A4, A5);
impl_factories!(A1, A2, A3, A4, A5, A6);
impl_factories!(A1, A2, A3, A4, A5, A6, A7);

impl<Func, Out, A1, A2, A3, A4, A5, A6, A7, A8> Factory<(A1, A2, A3, A4, A5, A6, A7, A8)> for Func
where
    Func: Fn(Arc<A1>, Arc<A2>, Arc<A3>, Arc<A4>, Arc<A5>, Arc<A6>, Arc<A7>, Arc<A8>) -> Out
        + Send
        + Sync
        + 'static,
    Out: Send + Sync + 'static,
    A1: Send + Sync + 'static,
    A2: Send + Sync + 'static,
    A3: Send + Sync + 'static,
    A4: Send + Sync + 'static,
    A5: Send + Sync + 'static,
    A6: Send + Sync + 'static,
    A7: Send + Sync + 'static,
    A8: Send + Sync + 'static,
{
    type Output = Out;

    fn parameters() -> Vec<TypeKey> {
        vec![
            TypeKey::of::<A1>(),
            TypeKey::of::<A2>(),
            TypeKey::of::<A3>(),
            TypeKey::of::<A4>(),
            TypeKey::of::<A5>(),
            TypeKey::of::<A6>(),
            TypeKey::of::<A7>(),
            TypeKey::of::<A8>(),
        ]
    }

    fn invoke(&self, arguments: &[Instance]) -> Result<Out, BoxError> {
        let mut arguments = arguments.iter();
        Ok((self)(
            argument::<A1>(&mut arguments)?,
            argument::<A2>(&mut arguments)?,
            argument::<A3>(&mut arguments)?,
            argument::<A4>(&mut arguments)?,
            argument::<A5>(&mut arguments)?,
            argument::<A6>(&mut arguments)?,
            argument::<A7>(&mut arguments)?,
            argument::<A8>(&mut arguments)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Config {
        url: &'static str,
    }
    struct Pool {
        url: &'static str,
    }
    struct Repository {
        pool: Arc<Pool>,
        config: Arc<Config>,
    }

    fn parameters_of<Args, F: Factory<Args>>(_: &F) -> Vec<TypeKey> {
        F::parameters()
    }

    fn invoke<Args, F: Factory<Args>>(factory: &F, arguments: &[Instance]) -> Result<F::Output, BoxError> {
        factory.invoke(arguments)
    }

    #[test]
    fn zero_argument_closure() {
        let factory = || Config { url: "postgres://" };
        assert!(parameters_of(&factory).is_empty());
        let config = invoke(&factory, &[]).unwrap();
        assert_eq!(config.url, "postgres://");
    }

    #[test]
    fn arguments_arrive_in_declared_order() {
        let factory = |pool: Arc<Pool>, config: Arc<Config>| Repository { pool, config };
        assert_eq!(
            parameters_of(&factory),
            vec![TypeKey::of::<Pool>(), TypeKey::of::<Config>()]
        );

        let pool: Instance = Arc::new(Pool { url: "a" });
        let config: Instance = Arc::new(Config { url: "b" });
        let repo = invoke(&factory, &[pool, config]).unwrap();
        assert_eq!(repo.pool.url, "a");
        assert_eq!(repo.config.url, "b");
    }

    #[test]
    fn wrong_argument_type_is_an_error() {
        let factory = |pool: Arc<Pool>| pool.url;
        let config: Instance = Arc::new(Config { url: "b" });
        let err = invoke(&factory, &[config]).unwrap_err();
        assert!(err.to_string().contains("Pool"));
    }

    #[test]
    fn missing_argument_is_an_error() {
        let factory = |pool: Arc<Pool>| pool.url;
        assert!(invoke(&factory, &[]).is_err());
    }

    #[test]
    fn fallible_factory_maps_errors() {
        fn parse(config: Arc<Config>) -> Result<u16, std::num::ParseIntError> {
            config.url.parse()
        }
        let factory = fallible(parse);
        assert_eq!(parameters_of(&factory), vec![TypeKey::of::<Config>()]);

        let good: Instance = Arc::new(Config { url: "8080" });
        assert_eq!(invoke(&factory, &[good]).unwrap(), 8080);

        let bad: Instance = Arc::new(Config { url: "eighty" });
        assert!(invoke(&factory, &[bad]).is_err());
    }

    #[test]
    fn method_receives_factory_object_first() {
        struct PoolFactory {
            url: &'static str,
        }
        fn create<Args, M: Method<PoolFactory, Args>>(method: &M, arguments: &[Instance]) -> M::Output {
            method.invoke(arguments).unwrap()
        }

        let method = |factory: Arc<PoolFactory>, _config: Arc<Config>| Pool { url: factory.url };
        let factory: Instance = Arc::new(PoolFactory { url: "from-factory" });
        let config: Instance = Arc::new(Config { url: "unused" });
        let pool = create(&method, &[factory, config]);
        assert_eq!(pool.url, "from-factory");
    }
}
