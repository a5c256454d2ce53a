//! Instantiators: how one instance of a type is built.
//!
//! Every definition carries exactly one [`Instantiator`]. It declares the
//! types it needs and builds an instance once the engine has resolved
//! those, bottom-up.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::factory::{Factory, Instance, Method};
use crate::key::TypeKey;

/// Scope objects visible from a scope instance, keyed by their type.
pub type ScopeObjects = Arc<HashMap<TypeKey, Instance>>;

/// Type-erased construction function shared by the function-based instantiators.
pub(crate) type BuildFn = Arc<dyn Fn(&[Instance]) -> Result<Instance, BoxError> + Send + Sync>;

pub(crate) fn build_fn<Args, F>(factory: F) -> BuildFn
where
    F: Factory<Args>,
{
    Arc::new(move |arguments: &[Instance]| {
        let output = factory.invoke(arguments)?;
        Ok(Arc::new(output) as Instance)
    })
}

pub(crate) fn method_build_fn<Fac, Args, M>(method: M) -> BuildFn
where
    M: Method<Fac, Args>,
{
    Arc::new(move |arguments: &[Instance]| {
        let output = method.invoke(arguments)?;
        Ok(Arc::new(output) as Instance)
    })
}

/// Builds instances of one type from already-resolved dependencies.
pub trait Instantiator: Send + Sync {
    /// The types this instantiator needs, in the order `instantiate` receives them.
    fn dependencies(&self) -> &[TypeKey];

    /// Builds the instance.
    ///
    /// `dependencies` holds one instance per entry of
    /// [`dependencies()`](Instantiator::dependencies), in the same order.
    fn instantiate(&self, dependencies: &[Instance], scope_objects: &ScopeObjects) -> Result<Instance, BoxError>;

    /// Human-readable description for diagnostics.
    fn description(&self) -> String;
}

impl fmt::Debug for dyn Instantiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instantiator")
            .field("description", &self.description())
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

/// Calls a constructor-like function of the type.
pub struct ConstructorInstantiator {
    signature: String,
    dependencies: Vec<TypeKey>,
    build: BuildFn,
}

impl ConstructorInstantiator {
    pub(crate) fn new(signature: String, dependencies: Vec<TypeKey>, build: BuildFn) -> Self {
        Self { signature, dependencies, build }
    }
}

impl Instantiator for ConstructorInstantiator {
    fn dependencies(&self) -> &[TypeKey] {
        &self.dependencies
    }

    fn instantiate(&self, dependencies: &[Instance], _: &ScopeObjects) -> Result<Instance, BoxError> {
        (self.build)(dependencies)
    }

    fn description(&self) -> String {
        format!("constructor '{}'", self.signature)
    }
}

/// Calls an associated factory function that returns the type.
pub struct StaticFactoryInstantiator {
    signature: String,
    dependencies: Vec<TypeKey>,
    build: BuildFn,
}

impl StaticFactoryInstantiator {
    pub(crate) fn new(signature: String, dependencies: Vec<TypeKey>, build: BuildFn) -> Self {
        Self { signature, dependencies, build }
    }
}

impl Instantiator for StaticFactoryInstantiator {
    fn dependencies(&self) -> &[TypeKey] {
        &self.dependencies
    }

    fn instantiate(&self, dependencies: &[Instance], _: &ScopeObjects) -> Result<Instance, BoxError> {
        (self.build)(dependencies)
    }

    fn description(&self) -> String {
        format!("static method '{}'", self.signature)
    }
}

/// Calls a method on a factory object, which is resolved as the first dependency.
pub struct InstanceFactoryInstantiator {
    signature: String,
    factory: TypeKey,
    dependencies: Vec<TypeKey>,
    build: BuildFn,
}

impl InstanceFactoryInstantiator {
    pub(crate) fn new(signature: String, factory: TypeKey, parameters: Vec<TypeKey>, build: BuildFn) -> Self {
        let mut dependencies = Vec::with_capacity(parameters.len() + 1);
        dependencies.push(factory);
        dependencies.extend(parameters);
        Self { signature, factory, dependencies, build }
    }

    /// The type of the factory object.
    pub fn factory(&self) -> TypeKey {
        self.factory
    }
}

impl Instantiator for InstanceFactoryInstantiator {
    fn dependencies(&self) -> &[TypeKey] {
        &self.dependencies
    }

    fn instantiate(&self, dependencies: &[Instance], _: &ScopeObjects) -> Result<Instance, BoxError> {
        (self.build)(dependencies)
    }

    fn description(&self) -> String {
        format!("method '{}' of '{}'", self.signature, self.factory.simple_name())
    }
}

/// Calls a factory supplied directly at registration, bypassing disambiguation.
pub struct CustomInstantiator {
    dependencies: Vec<TypeKey>,
    build: BuildFn,
}

impl CustomInstantiator {
    /// Wraps `factory`; its parameters become the dependencies.
    pub fn new<Args, F: Factory<Args>>(factory: F) -> Self {
        Self {
            dependencies: F::parameters(),
            build: build_fn(factory),
        }
    }
}

impl Instantiator for CustomInstantiator {
    fn dependencies(&self) -> &[TypeKey] {
        &self.dependencies
    }

    fn instantiate(&self, dependencies: &[Instance], _: &ScopeObjects) -> Result<Instance, BoxError> {
        (self.build)(dependencies)
    }

    fn description(&self) -> String {
        "custom instantiation".to_string()
    }
}

/// Hands out one pre-built value.
pub struct ConstantInstantiator {
    constant: Instance,
}

impl ConstantInstantiator {
    pub fn new<T: Send + Sync + 'static>(constant: T) -> Self {
        Self {
            constant: Arc::new(constant),
        }
    }
}

impl Instantiator for ConstantInstantiator {
    fn dependencies(&self) -> &[TypeKey] {
        &[]
    }

    fn instantiate(&self, _: &[Instance], _: &ScopeObjects) -> Result<Instance, BoxError> {
        Ok(Arc::clone(&self.constant))
    }

    fn description(&self) -> String {
        "constant".to_string()
    }
}

/// Hands out the object a scope was entered with.
pub struct ScopeObjectInstantiator {
    scope_type: TypeKey,
}

impl ScopeObjectInstantiator {
    pub fn new(scope_type: TypeKey) -> Self {
        Self { scope_type }
    }
}

impl Instantiator for ScopeObjectInstantiator {
    fn dependencies(&self) -> &[TypeKey] {
        &[]
    }

    fn instantiate(&self, _: &[Instance], scope_objects: &ScopeObjects) -> Result<Instance, BoxError> {
        scope_objects
            .get(&self.scope_type)
            .cloned()
            .ok_or_else(|| format!("no scope object of type '{}' has been entered", self.scope_type).into())
    }

    fn description(&self) -> String {
        format!("scope object '{}'", self.scope_type.simple_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock(u64);
    struct Scheduler {
        clock: Arc<Clock>,
    }
    struct SchedulerFactory {
        offset: u64,
    }

    fn no_scope_objects() -> ScopeObjects {
        Arc::new(HashMap::new())
    }

    fn downcast<T: Send + Sync + 'static>(instance: Instance) -> Arc<T> {
        instance.downcast::<T>().ok().unwrap()
    }

    #[test]
    fn constructor_builds_from_dependencies() {
        let make = |clock: Arc<Clock>| Scheduler { clock };
        let instantiator = ConstructorInstantiator::new(
            "Scheduler::new".into(),
            vec![TypeKey::of::<Clock>()],
            build_fn(make),
        );
        assert_eq!(instantiator.dependencies(), &[TypeKey::of::<Clock>()]);
        assert_eq!(instantiator.description(), "constructor 'Scheduler::new'");

        let clock: Instance = Arc::new(Clock(7));
        let built = instantiator.instantiate(&[clock], &no_scope_objects()).unwrap();
        assert_eq!(downcast::<Scheduler>(built).clock.0, 7);
    }

    #[test]
    fn instance_factory_depends_on_factory_object_first() {
        let method = |factory: Arc<SchedulerFactory>, clock: Arc<Clock>| Scheduler {
            clock: Arc::new(Clock(clock.0 + factory.offset)),
        };
        let instantiator = InstanceFactoryInstantiator::new(
            "SchedulerFactory::create".into(),
            TypeKey::of::<SchedulerFactory>(),
            vec![TypeKey::of::<Clock>()],
            method_build_fn(method),
        );
        assert_eq!(
            instantiator.dependencies(),
            &[TypeKey::of::<SchedulerFactory>(), TypeKey::of::<Clock>()]
        );
        assert!(instantiator.description().contains("SchedulerFactory"));

        let factory: Instance = Arc::new(SchedulerFactory { offset: 10 });
        let clock: Instance = Arc::new(Clock(1));
        let built = instantiator.instantiate(&[factory, clock], &no_scope_objects()).unwrap();
        assert_eq!(downcast::<Scheduler>(built).clock.0, 11);
    }

    #[test]
    fn constant_returns_the_same_instance() {
        let instantiator = ConstantInstantiator::new(Clock(3));
        let a = instantiator.instantiate(&[], &no_scope_objects()).unwrap();
        let b = instantiator.instantiate(&[], &no_scope_objects()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(instantiator.dependencies().is_empty());
    }

    #[test]
    fn custom_instantiator_takes_factory_parameters() {
        let instantiator = CustomInstantiator::new(|clock: Arc<Clock>| clock.0 * 2);
        assert_eq!(instantiator.dependencies(), &[TypeKey::of::<Clock>()]);

        let clock: Instance = Arc::new(Clock(21));
        let built = instantiator.instantiate(&[clock], &no_scope_objects()).unwrap();
        assert_eq!(*downcast::<u64>(built), 42);
    }

    #[test]
    fn scope_object_lookup() {
        let instantiator = ScopeObjectInstantiator::new(TypeKey::of::<Clock>());
        assert!(instantiator.instantiate(&[], &no_scope_objects()).is_err());

        let mut objects = HashMap::new();
        objects.insert(TypeKey::of::<Clock>(), Arc::new(Clock(5)) as Instance);
        let built = instantiator.instantiate(&[], &Arc::new(objects)).unwrap();
        assert_eq!(downcast::<Clock>(built).0, 5);
    }
}
