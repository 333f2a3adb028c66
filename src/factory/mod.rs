//! Proxy factory: strategy selection and blueprint-keyed shape caching.
//!
//! The factory turns a [`ProxyConfig`] into a live [`ProxyDispatcher`]. It
//! chooses the dispatch strategy, validates that the strategy is applicable,
//! and builds the immutable routing shape.
//!
//! # Blueprint cache
//!
//! Building a shape walks every surface once. Configurations that are
//! identical — same strategy and flags, and the very same surface, concrete,
//! and introduction objects — fingerprint to the same [`DispatcherBlueprint`]
//! and may share one shape. Surfaces are compared by reference, not by key:
//! two different surface objects under the same `TypeKey` carry different
//! invokers and never share a shape, so a cached build behaves exactly like an
//! uncached one. Sharing saves construction cost only: shapes carry no target,
//! delegate, or chain state, so it can never leak behavior between distinct
//! target instances. The cache is a concurrent map; when several threads race
//! to materialize the same blueprint, the entry API lets exactly one build win
//! and the losers adopt its shape.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};

use crate::config::{ProxyConfig, ProxyFlags};
use crate::dispatch::{DispatchStrategy, DispatcherShape, ProxyDispatcher, Route, RouteKind};
use crate::operation::{OperationDescriptor, OperationSurface, TypeKey};
use crate::{Error, Result};

/// Surface identity by reference.
///
/// Holding the `Arc` keeps the surface alive for as long as the blueprint is a
/// cache key, so a pointer can never be reused by a different surface while an
/// entry exists.
#[derive(Clone)]
pub(crate) struct SurfaceRef(Arc<OperationSurface>);

impl SurfaceRef {
    pub(crate) fn key(&self) -> &TypeKey {
        self.0.key()
    }
}

impl PartialEq for SurfaceRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SurfaceRef {}

impl Hash for SurfaceRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for SurfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceRef({})", self.0.key())
    }
}

/// Fingerprint of a configuration: strategy, flags, and the identities of the
/// exposed surface objects.
///
/// Two configurations with equal blueprints may share a dispatcher shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatcherBlueprint {
    pub(crate) strategy: DispatchStrategy,
    pub(crate) concrete: Option<SurfaceRef>,
    pub(crate) flags: ProxyFlags,
    pub(crate) surfaces: Vec<SurfaceRef>,
    pub(crate) introduced: Vec<SurfaceRef>,
}

impl DispatcherBlueprint {
    fn of(config: &ProxyConfig, strategy: DispatchStrategy) -> Self {
        DispatcherBlueprint {
            strategy,
            concrete: config
                .concrete()
                .map(|c| SurfaceRef(Arc::clone(&c.surface))),
            flags: config.flags(),
            surfaces: config
                .surfaces()
                .iter()
                .map(|surface| SurfaceRef(Arc::clone(surface)))
                .collect(),
            introduced: config
                .introductions()
                .iter()
                .map(|intro| SurfaceRef(Arc::clone(&intro.surface)))
                .collect(),
        }
    }

    /// The strategy this blueprint encodes.
    #[must_use]
    pub fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }
}

/// Builds dispatchers, optionally sharing shapes across equivalent
/// configurations.
#[derive(Default)]
pub struct ProxyFactory {
    shapes: DashMap<DispatcherBlueprint, Arc<DispatcherShape>>,
}

impl ProxyFactory {
    /// A factory with an empty shape cache.
    #[must_use]
    pub fn new() -> Self {
        ProxyFactory {
            shapes: DashMap::new(),
        }
    }

    /// Builds a dispatcher, reusing a cached shape when the configuration's
    /// blueprint has been materialized before.
    ///
    /// # Errors
    /// Returns [`Error::ProxyConstruction`] when no strategy fits the
    /// configuration (sealed concrete type, or no usable operation surface).
    pub fn create(&self, config: &ProxyConfig) -> Result<ProxyDispatcher> {
        let strategy = choose_strategy(config)?;
        let blueprint = DispatcherBlueprint::of(config, strategy);
        let shape = match self.shapes.entry(blueprint.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(strategy = %strategy, "dispatcher shape cache hit");
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                let shape = Arc::new(build_shape(config, strategy, blueprint)?);
                entry.insert(Arc::clone(&shape));
                tracing::debug!(strategy = %strategy, operations = shape.operation_count(), "dispatcher shape built");
                shape
            }
        };
        Ok(ProxyDispatcher::new(shape, config))
    }

    /// Number of cached shapes.
    #[must_use]
    pub fn cached_shapes(&self) -> usize {
        self.shapes.len()
    }
}

/// Builds a dispatcher without consulting any cache.
///
/// Behavior of the resulting dispatcher is identical to a cached build.
///
/// # Errors
/// Returns [`Error::ProxyConstruction`] when no strategy fits the configuration.
pub fn create_dispatcher(config: &ProxyConfig) -> Result<ProxyDispatcher> {
    let strategy = choose_strategy(config)?;
    let blueprint = DispatcherBlueprint::of(config, strategy);
    let shape = Arc::new(build_shape(config, strategy, blueprint)?);
    Ok(ProxyDispatcher::new(shape, config))
}

fn target_type_name(config: &ProxyConfig) -> String {
    config
        .target_source()
        .target_type()
        .map_or_else(|| "<no target>".to_string(), |key| key.to_string())
}

fn choose_strategy(config: &ProxyConfig) -> Result<DispatchStrategy> {
    if config.flags().contains(ProxyFlags::PROXY_TARGET_TYPE) {
        return subclass_applicable(config).map(|()| DispatchStrategy::Subclass);
    }
    if !config.surfaces().is_empty() || !config.introductions().is_empty() {
        return Ok(DispatchStrategy::Composition);
    }
    // No declared surfaces: fall back to extending the concrete type.
    if config.concrete().is_some() {
        return subclass_applicable(config).map(|()| DispatchStrategy::Subclass);
    }
    Err(Error::ProxyConstruction {
        type_name: target_type_name(config),
        reason: "no usable operation surface: declare a surface, an introduction, or a concrete type".to_string(),
    })
}

fn subclass_applicable(config: &ProxyConfig) -> Result<()> {
    let Some(concrete) = config.concrete() else {
        return Err(Error::ProxyConstruction {
            type_name: target_type_name(config),
            reason: "subclass strategy requested but no concrete surface is declared".to_string(),
        });
    };
    if !concrete.extendable {
        return Err(Error::ProxyConstruction {
            type_name: concrete.surface.key().to_string(),
            reason: "type is sealed or otherwise not extendable".to_string(),
        });
    }
    Ok(())
}

fn build_shape(
    config: &ProxyConfig,
    strategy: DispatchStrategy,
    blueprint: DispatcherBlueprint,
) -> Result<DispatcherShape> {
    let mut routes: HashMap<TypeKey, HashMap<Arc<str>, Route>> = HashMap::new();

    let mut add_surface =
        |surface: &Arc<OperationSurface>, kind_of: &dyn Fn(&OperationDescriptor) -> RouteKind| {
            let per_surface = routes.entry(surface.key().clone()).or_default();
            for descriptor in surface.operations() {
                per_surface.insert(
                    descriptor.sig().name.clone(),
                    Route {
                        descriptor: Arc::clone(descriptor),
                        kind: kind_of(descriptor),
                    },
                );
            }
        };

    for surface in config.surfaces() {
        add_surface(surface, &|_| RouteKind::Advised);
    }

    if strategy == DispatchStrategy::Subclass {
        if let Some(concrete) = config.concrete() {
            add_surface(&concrete.surface, &|descriptor| {
                if descriptor.is_overridable() {
                    RouteKind::Advised
                } else {
                    RouteKind::PassThrough
                }
            });
        }
    }

    for (index, intro) in config.introductions().iter().enumerate() {
        add_surface(&intro.surface, &|_| RouteKind::Introduced(index));
    }

    let mut attributes = config.attributes().to_vec();
    if config.flags().contains(ProxyFlags::PROPAGATE_ATTRIBUTES) {
        for surface in config.surfaces() {
            attributes.extend_from_slice(surface.attributes());
        }
        if strategy == DispatchStrategy::Subclass {
            if let Some(concrete) = config.concrete() {
                attributes.extend_from_slice(concrete.surface.attributes());
            }
        }
    }

    Ok(DispatcherShape {
        strategy,
        blueprint,
        routes,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{
        ret, AttributeValue, ConcreteSurface, OperationDescriptor, OperationSig,
    };
    use crate::invocation::ArgList;
    use crate::operation::TargetHandle;

    struct Service;

    fn service_surface(key: &str) -> Arc<OperationSurface> {
        let declaring = TypeKey::new(key);
        OperationSurface::builder(declaring.clone())
            .operation(OperationDescriptor::bind::<Service, _>(
                OperationSig::new(declaring.clone(), "ping", vec![]),
                |_, _, _| Ok(ret("pong".to_string())),
            ))
            .operation(
                OperationDescriptor::bind::<Service, _>(
                    OperationSig::new(declaring, "fixed", vec![]),
                    |_, _, _| Ok(ret(1_i32)),
                )
                .sealed(),
            )
            .build()
            .unwrap()
    }

    fn config_with_surface() -> ProxyConfig {
        let mut config = ProxyConfig::new();
        config.set_target(TypeKey::new("Service"), Arc::new(Service) as TargetHandle);
        config.add_surface(service_surface("ISvc"));
        config
    }

    #[test]
    fn test_composition_chosen_for_declared_surfaces() {
        let dispatcher = create_dispatcher(&config_with_surface()).unwrap();
        assert_eq!(dispatcher.strategy(), DispatchStrategy::Composition);
        assert!(dispatcher.exposes(&TypeKey::new("ISvc"), "ping"));
    }

    #[test]
    fn test_subclass_requires_concrete_surface() {
        let mut config = config_with_surface();
        config.proxy_target_type(true);
        let err = create_dispatcher(&config).unwrap_err();
        assert!(matches!(err, Error::ProxyConstruction { .. }));
    }

    #[test]
    fn test_sealed_concrete_type_rejected_by_name() {
        let mut config = config_with_surface();
        config.proxy_target_type(true);
        config.set_concrete(ConcreteSurface::sealed(service_surface("Service")));
        match create_dispatcher(&config).unwrap_err() {
            Error::ProxyConstruction { type_name, .. } => assert_eq!(type_name, "Service"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_surface_at_all_fails() {
        let config = ProxyConfig::new();
        assert!(matches!(
            create_dispatcher(&config).unwrap_err(),
            Error::ProxyConstruction { .. }
        ));
    }

    #[test]
    fn test_subclass_fallback_without_interfaces() {
        let mut config = ProxyConfig::new();
        config.set_target(TypeKey::new("Service"), Arc::new(Service) as TargetHandle);
        config.set_concrete(ConcreteSurface::new(service_surface("Service")));
        let dispatcher = create_dispatcher(&config).unwrap();
        assert_eq!(dispatcher.strategy(), DispatchStrategy::Subclass);
        assert!(dispatcher.is_advised(&TypeKey::new("Service"), "ping"));
        // Sealed member remains exposed but unadvised.
        assert!(dispatcher.exposes(&TypeKey::new("Service"), "fixed"));
        assert!(!dispatcher.is_advised(&TypeKey::new("Service"), "fixed"));
    }

    fn config_sharing(surface: &Arc<OperationSurface>) -> ProxyConfig {
        let mut config = ProxyConfig::new();
        config.set_target(TypeKey::new("Service"), Arc::new(Service) as TargetHandle);
        config.add_surface(Arc::clone(surface));
        config
    }

    #[test]
    fn test_blueprint_cache_shares_shapes() {
        let factory = ProxyFactory::new();
        let surface = service_surface("ISvc");
        let a = factory.create(&config_sharing(&surface)).unwrap();
        let b = factory.create(&config_sharing(&surface)).unwrap();
        assert_eq!(factory.cached_shapes(), 1);
        assert_eq!(a.strategy(), b.strategy());
    }

    #[test]
    fn test_differing_flags_are_distinct_blueprints() {
        let factory = ProxyFactory::new();
        let surface = service_surface("ISvc");
        factory.create(&config_sharing(&surface)).unwrap();

        let mut with_attrs = config_sharing(&surface);
        with_attrs.propagate_attributes(true);
        factory.create(&with_attrs).unwrap();
        assert_eq!(factory.cached_shapes(), 2);
    }

    #[test]
    fn test_same_key_surfaces_keep_their_own_invokers() {
        let declaring = TypeKey::new("ISvc");
        let surface_for = |answer: i32| {
            OperationSurface::builder(declaring.clone())
                .operation(OperationDescriptor::bind::<Service, _>(
                    OperationSig::new(declaring.clone(), "answer", vec![]),
                    move |_, _, _| Ok(ret(answer)),
                ))
                .build()
                .unwrap()
        };

        // Two distinct surface objects under the same key must never share a
        // cached shape: each dispatcher keeps its own invokers.
        let factory = ProxyFactory::new();
        let one = factory.create(&config_sharing(&surface_for(1))).unwrap();
        let two = factory.create(&config_sharing(&surface_for(2))).unwrap();
        assert_eq!(factory.cached_shapes(), 2);

        let mut args = ArgList::empty();
        let result = one.invoke(&declaring, "answer", &mut args).unwrap();
        assert_eq!(*result.downcast::<i32>().unwrap(), 1);

        let mut args = ArgList::empty();
        let result = two.invoke(&declaring, "answer", &mut args).unwrap();
        assert_eq!(*result.downcast::<i32>().unwrap(), 2);
    }

    #[test]
    fn test_attribute_propagation() {
        let declaring = TypeKey::new("ISvc");
        let surface = OperationSurface::builder(declaring.clone())
            .attribute(AttributeValue::marker("Transactional"))
            .operation(OperationDescriptor::bind::<Service, _>(
                OperationSig::new(declaring, "ping", vec![]),
                |_, _, _| Ok(ret(())),
            ))
            .build()
            .unwrap();

        let mut config = ProxyConfig::new();
        config.set_target(TypeKey::new("Service"), Arc::new(Service) as TargetHandle);
        config.add_surface(surface);

        let plain = create_dispatcher(&config).unwrap();
        assert!(plain.attributes().is_empty());

        config.propagate_attributes(true);
        let propagated = create_dispatcher(&config).unwrap();
        assert_eq!(propagated.attributes().len(), 1);
        assert_eq!(propagated.attributes()[0].name, "Transactional");
    }
}
