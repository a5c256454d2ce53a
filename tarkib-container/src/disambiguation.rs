//! Choosing one construction strategy among several.
//!
//! A type lists its construction [`Candidate`]s by implementing
//! [`Injectable`]. When there is more than one, an ordered chain of
//! [`Disambiguator`]s decides: the first strategy that does not ignore the
//! question wins.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tarkib_container::disambiguation::{Candidate, Injectable};
//!
//! struct Settings;
//! struct Mailer;
//!
//! impl Mailer {
//!     fn new(_settings: Arc<Settings>) -> Self { Mailer }
//!     fn disabled() -> Self { Mailer }
//! }
//!
//! impl Injectable for Mailer {
//!     fn candidates() -> Vec<Candidate> {
//!         vec![
//!             Candidate::constructor("Mailer::new", Mailer::new).preferred(),
//!             Candidate::static_factory("Mailer::disabled", Mailer::disabled),
//!         ]
//!     }
//! }
//! ```

use std::fmt;

use tracing::debug;

use crate::error::{AmbiguousInstantiationError, ConfigurationError, Result, TarkibError};
use crate::factory::{Factory, Method};
use crate::instantiator::{
    BuildFn, ConstructorInstantiator, InstanceFactoryInstantiator, Instantiator, StaticFactoryInstantiator,
    build_fn, method_build_fn,
};
use crate::key::TypeKey;

/// Describes how a type can be constructed.
///
/// This is the statically-checked stand-in for scanning a type's
/// constructors and factory methods.
pub trait Injectable: Send + Sync + 'static {
    /// Every viable way to build `Self`.
    fn candidates() -> Vec<Candidate>;
}

/// The shape of a construction candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A constructor of the type itself.
    Constructor,
    /// An associated function returning the type.
    StaticFactory,
    /// A method on another object, which must be resolvable itself.
    InstanceFactory { factory: TypeKey },
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKind::Constructor => write!(f, "constructor"),
            CandidateKind::StaticFactory => write!(f, "static factory"),
            CandidateKind::InstanceFactory { factory } => write!(f, "factory method of '{}'", factory.simple_name()),
        }
    }
}

/// One way to construct a type.
pub struct Candidate {
    kind: CandidateKind,
    signature: String,
    parameters: Vec<TypeKey>,
    produces: TypeKey,
    preferred: bool,
    build: BuildFn,
}

impl Candidate {
    /// A constructor taking the factory's parameters.
    pub fn constructor<Args, F: Factory<Args>>(signature: impl Into<String>, factory: F) -> Self {
        Self::from_factory(CandidateKind::Constructor, signature.into(), factory)
    }

    /// An associated function returning the type.
    pub fn static_factory<Args, F: Factory<Args>>(signature: impl Into<String>, factory: F) -> Self {
        Self::from_factory(CandidateKind::StaticFactory, signature.into(), factory)
    }

    /// A method on a `Fac` object; `Fac` is resolved like any other dependency.
    pub fn instance_factory<Fac, Args, M>(signature: impl Into<String>, method: M) -> Self
    where
        Fac: Send + Sync + 'static,
        M: Method<Fac, Args>,
    {
        Self {
            kind: CandidateKind::InstanceFactory {
                factory: TypeKey::of::<Fac>(),
            },
            signature: signature.into(),
            parameters: M::parameters(),
            produces: TypeKey::of::<M::Output>(),
            preferred: false,
            build: method_build_fn(method),
        }
    }

    fn from_factory<Args, F: Factory<Args>>(kind: CandidateKind, signature: String, factory: F) -> Self {
        Self {
            kind,
            signature,
            parameters: F::parameters(),
            produces: TypeKey::of::<F::Output>(),
            preferred: false,
            build: build_fn(factory),
        }
    }

    /// Marks this candidate as the one to use for injection.
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn parameters(&self) -> &[TypeKey] {
        &self.parameters
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    /// The type this candidate builds.
    pub fn produces(&self) -> TypeKey {
        self.produces
    }

    /// Turns the candidate into the instantiator of its kind.
    pub fn into_instantiator(self) -> Box<dyn Instantiator> {
        match self.kind {
            CandidateKind::Constructor => {
                Box::new(ConstructorInstantiator::new(self.signature, self.parameters, self.build))
            }
            CandidateKind::StaticFactory => {
                Box::new(StaticFactoryInstantiator::new(self.signature, self.parameters, self.build))
            }
            CandidateKind::InstanceFactory { factory } => Box::new(InstanceFactoryInstantiator::new(
                self.signature,
                factory,
                self.parameters,
                self.build,
            )),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.signature)
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("kind", &self.kind)
            .field("signature", &self.signature)
            .field("parameters", &self.parameters)
            .field("preferred", &self.preferred)
            .finish()
    }
}

/// Verdict of one disambiguation strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disambiguation {
    /// Use the candidate at this index.
    Success(usize),
    /// No opinion; the next strategy decides.
    Ignore(String),
    /// Stop; the configuration is ambiguous.
    Error(String),
}

/// A strategy that picks one candidate, passes, or rejects.
pub trait Disambiguator: Send + Sync {
    fn disambiguate(&self, candidates: &[Candidate]) -> Disambiguation;
}

/// Picks the single candidate marked with [`Candidate::preferred`].
#[derive(Debug, Default)]
pub struct MarkerDisambiguator;

impl Disambiguator for MarkerDisambiguator {
    fn disambiguate(&self, candidates: &[Candidate]) -> Disambiguation {
        let marked: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.is_preferred())
            .map(|(index, _)| index)
            .collect();
        match marked.as_slice() {
            [] => Disambiguation::Ignore("no candidate is marked as preferred".to_string()),
            [index] => Disambiguation::Success(*index),
            _ => Disambiguation::Error(format!(
                "ambiguous markers: {} candidates are marked as preferred",
                marked.len()
            )),
        }
    }
}

/// Picks the only constructor, if there is exactly one.
#[derive(Debug, Default)]
pub struct SingleConstructorDisambiguator;

impl Disambiguator for SingleConstructorDisambiguator {
    fn disambiguate(&self, candidates: &[Candidate]) -> Disambiguation {
        let mut constructors = candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.kind() == CandidateKind::Constructor);
        match (constructors.next(), constructors.next()) {
            (None, _) => Disambiguation::Ignore("no constructors found".to_string()),
            (Some((index, _)), None) => Disambiguation::Success(index),
            (Some(_), Some(_)) => Disambiguation::Ignore("more than one constructor found".to_string()),
        }
    }
}

/// Picks the only static factory, provided there are no constructors.
#[derive(Debug, Default)]
pub struct SingleStaticFactoryDisambiguator;

impl Disambiguator for SingleStaticFactoryDisambiguator {
    fn disambiguate(&self, candidates: &[Candidate]) -> Disambiguation {
        if candidates.iter().any(|c| c.kind() == CandidateKind::Constructor) {
            return Disambiguation::Ignore(
                "static factories are not considered because constructors have been found".to_string(),
            );
        }
        let factories: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind() == CandidateKind::StaticFactory)
            .map(|(index, _)| index)
            .collect();
        match factories.as_slice() {
            [] => Disambiguation::Ignore("no static factories found".to_string()),
            [index] => Disambiguation::Success(*index),
            _ => Disambiguation::Ignore("more than one static factory found".to_string()),
        }
    }
}

/// The ordered list of strategies consulted for ambiguous types.
pub struct DisambiguatorChain {
    strategies: Vec<Box<dyn Disambiguator>>,
}

impl DisambiguatorChain {
    /// A chain without any strategies.
    pub fn empty() -> Self {
        Self { strategies: Vec::new() }
    }

    /// Appends a strategy; it runs after all earlier ones.
    pub fn push(&mut self, strategy: Box<dyn Disambiguator>) {
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Selects the candidate to build `key` with.
    ///
    /// # Errors
    /// - [`TarkibError::NoCandidate`]: `candidates` is empty
    /// - [`TarkibError::AmbiguousInstantiation`]: a strategy rejected the
    ///   candidates, or every strategy ignored them
    /// - [`TarkibError::Configuration`]: a candidate builds another type
    pub fn choose(&self, key: TypeKey, mut candidates: Vec<Candidate>) -> Result<Candidate> {
        if let Some(wrong) = candidates.iter().find(|c| c.produces() != key) {
            return Err(TarkibError::Configuration(ConfigurationError::CandidateTypeMismatch {
                key,
                candidate: wrong.to_string(),
                produces: wrong.produces(),
            }));
        }
        match candidates.len() {
            0 => return Err(TarkibError::NoCandidate { key }),
            1 => return Ok(candidates.remove(0)),
            _ => {}
        }

        let mut reasons = Vec::new();
        for strategy in &self.strategies {
            match strategy.disambiguate(&candidates) {
                Disambiguation::Success(index) if index < candidates.len() => {
                    let chosen = candidates.swap_remove(index);
                    debug!(key = %key, candidate = %chosen, "Disambiguated");
                    return Ok(chosen);
                }
                Disambiguation::Success(index) => {
                    reasons.push(format!("strategy chose candidate #{index}, which does not exist"));
                    return Err(ambiguous(key, &candidates, reasons));
                }
                Disambiguation::Ignore(reason) => reasons.push(reason),
                Disambiguation::Error(message) => {
                    reasons.push(message);
                    return Err(ambiguous(key, &candidates, reasons));
                }
            }
        }
        Err(ambiguous(key, &candidates, reasons))
    }
}

impl Default for DisambiguatorChain {
    /// Markers first, then a lone constructor, then a lone static factory.
    fn default() -> Self {
        Self {
            strategies: vec![
                Box::new(MarkerDisambiguator) as Box<dyn Disambiguator>,
                Box::new(SingleConstructorDisambiguator),
                Box::new(SingleStaticFactoryDisambiguator),
            ],
        }
    }
}

fn ambiguous(key: TypeKey, candidates: &[Candidate], reasons: Vec<String>) -> TarkibError {
    TarkibError::AmbiguousInstantiation(AmbiguousInstantiationError {
        key,
        candidates: candidates.iter().map(ToString::to_string).collect(),
        reasons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Port(u16);
    struct Server {
        port: u16,
    }
    struct ServerFactory;

    fn with_port(port: Arc<Port>) -> Server {
        Server { port: port.0 }
    }

    fn default_server() -> Server {
        Server { port: 80 }
    }

    fn chain() -> DisambiguatorChain {
        DisambiguatorChain::default()
    }

    fn key() -> TypeKey {
        TypeKey::of::<Server>()
    }

    #[test]
    fn single_candidate_needs_no_marker() {
        let chosen = DisambiguatorChain::empty()
            .choose(key(), vec![Candidate::constructor("Server::new", with_port)])
            .unwrap();
        assert_eq!(chosen.signature(), "Server::new");
        assert_eq!(chosen.parameters(), &[TypeKey::of::<Port>()]);
    }

    #[test]
    fn no_candidates_is_an_error() {
        let err = chain().choose(key(), vec![]).unwrap_err();
        assert!(matches!(err, TarkibError::NoCandidate { .. }));
    }

    #[test]
    fn marked_candidate_wins() {
        let chosen = chain()
            .choose(
                key(),
                vec![
                    Candidate::constructor("Server::new", with_port),
                    Candidate::static_factory("Server::default_server", default_server).preferred(),
                ],
            )
            .unwrap();
        assert_eq!(chosen.kind(), CandidateKind::StaticFactory);
    }

    #[test]
    fn two_markers_are_ambiguous() {
        let err = chain()
            .choose(
                key(),
                vec![
                    Candidate::constructor("Server::new", with_port).preferred(),
                    Candidate::static_factory("Server::default_server", default_server).preferred(),
                ],
            )
            .unwrap_err();
        match err {
            TarkibError::AmbiguousInstantiation(e) => {
                assert_eq!(e.candidates.len(), 2);
                assert!(e.reasons.iter().any(|r| r.contains("ambiguous markers")));
            }
            other => panic!("Expected AmbiguousInstantiation, got: {other:?}"),
        }
    }

    #[test]
    fn unmarked_constructors_are_ambiguous() {
        let err = chain()
            .choose(
                key(),
                vec![
                    Candidate::constructor("Server::new", with_port),
                    Candidate::constructor("Server::default_server", default_server),
                    Candidate::static_factory("Server::fallback", default_server),
                ],
            )
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("constructor 'Server::new'"));
        assert!(msg.contains("static factory 'Server::fallback'"));
        assert!(msg.contains("no candidate is marked as preferred"));
        assert!(msg.contains("more than one constructor found"));
    }

    #[test]
    fn candidate_for_another_type_is_rejected() {
        let err = chain()
            .choose(TypeKey::of::<Port>(), vec![Candidate::constructor("Server::new", with_port)])
            .unwrap_err();
        assert!(matches!(err, TarkibError::Configuration(_)));
    }

    #[test]
    fn lone_constructor_wins_without_marker() {
        assert_eq!(chain().len(), 3);

        let chosen = chain()
            .choose(
                key(),
                vec![
                    Candidate::static_factory("Server::default_server", default_server),
                    Candidate::constructor("Server::new", with_port),
                ],
            )
            .unwrap();
        assert_eq!(chosen.kind(), CandidateKind::Constructor);
    }

    #[test]
    fn lone_static_factory_wins_without_constructors() {
        let chosen = chain()
            .choose(
                key(),
                vec![
                    Candidate::static_factory("Server::default_server", default_server),
                    Candidate::instance_factory::<ServerFactory, _, _>("ServerFactory::create", |_: Arc<ServerFactory>| {
                        default_server()
                    }),
                ],
            )
            .unwrap();
        assert_eq!(chosen.kind(), CandidateKind::StaticFactory);
    }

    #[test]
    fn marker_strategy_alone_leaves_unmarked_candidates_ambiguous() {
        let mut chain = DisambiguatorChain::empty();
        chain.push(Box::new(MarkerDisambiguator));

        let err = chain
            .choose(
                key(),
                vec![
                    Candidate::constructor("Server::new", with_port),
                    Candidate::static_factory("Server::default_server", default_server),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, TarkibError::AmbiguousInstantiation(_)));
    }

    #[test]
    fn single_static_factory_needs_no_constructor() {
        let candidates = vec![
            Candidate::static_factory("Server::default_server", default_server),
            Candidate::instance_factory::<ServerFactory, _, _>("ServerFactory::create", |_: Arc<ServerFactory>| {
                default_server()
            }),
        ];
        assert_eq!(
            SingleStaticFactoryDisambiguator.disambiguate(&candidates),
            Disambiguation::Success(0)
        );
        assert!(matches!(
            SingleConstructorDisambiguator.disambiguate(&candidates),
            Disambiguation::Ignore(_)
        ));
    }

    #[test]
    fn instance_factory_candidate_depends_on_factory() {
        let candidate = Candidate::instance_factory::<ServerFactory, _, _>(
            "ServerFactory::create",
            |_: Arc<ServerFactory>, port: Arc<Port>| Server { port: port.0 },
        );
        let instantiator = candidate.into_instantiator();
        assert_eq!(
            instantiator.dependencies(),
            &[TypeKey::of::<ServerFactory>(), TypeKey::of::<Port>()]
        );
    }

    #[test]
    fn built_candidate_produces_instance() {
        use crate::factory::Instance;
        use std::collections::HashMap;

        let instantiator = Candidate::constructor("Server::new", with_port).into_instantiator();
        let port: Instance = Arc::new(Port(8080));
        let built = instantiator.instantiate(&[port], &Arc::new(HashMap::new())).unwrap();
        assert_eq!(built.downcast::<Server>().ok().unwrap().port, 8080);
    }
}
