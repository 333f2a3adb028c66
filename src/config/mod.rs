//! Proxy configuration: everything assembled before a dispatcher is built.
//!
//! A configuration is the `Uninitialized` half of the dispatcher lifecycle: it
//! collects the target source, the exposed surfaces, flags, advisors, and
//! introductions. [`crate::factory::ProxyFactory::create`] materializes it into
//! an `Active` dispatcher.
//!
//! Freezing applies to the advisor list only. Every other setting stays
//! mutable at all times and simply takes effect on the next dispatcher build;
//! an already-built dispatcher keeps the shape it was built with.

use std::sync::Arc;

use bitflags::bitflags;

use crate::advice::Advice;
use crate::advisor::{Advisor, AdvisorRegistry};
use crate::operation::{AttributeValue, ConcreteSurface, OperationSurface, TargetHandle, TypeKey};
use crate::target::{EmptyTargetSource, SingletonTargetSource, TargetSource};
use crate::Result;

bitflags! {
    /// Construction flags of a proxy configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProxyFlags: u8 {
        /// Extend the target's concrete type (subclass strategy) instead of
        /// exposing only declared surfaces.
        const PROXY_TARGET_TYPE = 1;
        /// Copy the target surfaces' declarative attributes onto the proxy.
        const PROPAGATE_ATTRIBUTES = 1 << 1;
    }
}

/// An introduced capability: a surface served by a delegate object instead of
/// the target.
#[derive(Clone)]
pub struct Introduction {
    /// The introduced surface.
    pub surface: Arc<OperationSurface>,
    /// The object actually implementing it.
    pub delegate: TargetHandle,
}

/// Mutable assembly of a proxy: target, surfaces, flags, advisors.
pub struct ProxyConfig {
    target_source: Arc<dyn TargetSource>,
    surfaces: Vec<Arc<OperationSurface>>,
    concrete: Option<ConcreteSurface>,
    flags: ProxyFlags,
    registry: Arc<AdvisorRegistry>,
    introductions: Vec<Introduction>,
    attributes: Vec<AttributeValue>,
}

impl ProxyConfig {
    /// An empty configuration: no target, no surfaces, no advisors.
    #[must_use]
    pub fn new() -> Self {
        ProxyConfig {
            target_source: Arc::new(EmptyTargetSource),
            surfaces: Vec::new(),
            concrete: None,
            flags: ProxyFlags::empty(),
            registry: Arc::new(AdvisorRegistry::new()),
            introductions: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Sets a fixed target instance under its type key.
    pub fn set_target(&mut self, key: TypeKey, instance: TargetHandle) -> &mut Self {
        self.target_source = SingletonTargetSource::new(key, instance);
        self
    }

    /// Sets an arbitrary target source.
    pub fn set_target_source(&mut self, source: Arc<dyn TargetSource>) -> &mut Self {
        self.target_source = source;
        self
    }

    /// Exposes an operation surface on the proxy.
    pub fn add_surface(&mut self, surface: Arc<OperationSurface>) -> &mut Self {
        self.surfaces.push(surface);
        self
    }

    /// Declares the target's concrete surface, enabling the subclass strategy.
    pub fn set_concrete(&mut self, concrete: ConcreteSurface) -> &mut Self {
        self.concrete = Some(concrete);
        self
    }

    /// Requests (or clears) the subclass strategy.
    pub fn proxy_target_type(&mut self, enabled: bool) -> &mut Self {
        self.flags.set(ProxyFlags::PROXY_TARGET_TYPE, enabled);
        self
    }

    /// Enables (or clears) attribute propagation onto the proxy.
    pub fn propagate_attributes(&mut self, enabled: bool) -> &mut Self {
        self.flags.set(ProxyFlags::PROPAGATE_ATTRIBUTES, enabled);
        self
    }

    /// Adds an introduced capability served by `delegate`.
    pub fn add_introduction(&mut self, surface: Arc<OperationSurface>, delegate: TargetHandle) -> &mut Self {
        self.introductions.push(Introduction { surface, delegate });
        self
    }

    /// Attaches a declarative attribute to the proxy itself.
    pub fn add_attribute(&mut self, attribute: AttributeValue) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    /// Appends an advisor.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConfigurationFrozen`] if frozen.
    pub fn add_advisor(&self, advisor: Arc<Advisor>) -> Result<()> {
        self.registry.add(advisor)
    }

    /// Appends plain advice wrapped with an always-matching pointcut.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConfigurationFrozen`] if frozen.
    pub fn add_advice(&self, advice: Advice) -> Result<Arc<Advisor>> {
        self.registry.add_advice(advice)
    }

    /// Freezes the advisor list.
    pub fn freeze(&self) {
        self.registry.freeze();
    }

    /// Unfreezes the advisor list.
    pub fn unfreeze(&self) {
        self.registry.unfreeze();
    }

    /// Whether the advisor list is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.registry.is_frozen()
    }

    /// The advisor registry (shared with dispatchers built from this config).
    #[must_use]
    pub fn registry(&self) -> &Arc<AdvisorRegistry> {
        &self.registry
    }

    /// The configured target source.
    #[must_use]
    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.target_source
    }

    /// Exposed surfaces in declaration order.
    #[must_use]
    pub fn surfaces(&self) -> &[Arc<OperationSurface>] {
        &self.surfaces
    }

    /// The target's concrete surface, if declared.
    #[must_use]
    pub fn concrete(&self) -> Option<&ConcreteSurface> {
        self.concrete.as_ref()
    }

    /// Current flags.
    #[must_use]
    pub fn flags(&self) -> ProxyFlags {
        self.flags
    }

    /// Introduced capabilities.
    #[must_use]
    pub fn introductions(&self) -> &[Introduction] {
        &self.introductions
    }

    /// Attributes attached directly to the proxy.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeValue] {
        &self.attributes
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig::new()
    }
}
