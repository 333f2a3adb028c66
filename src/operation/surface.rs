use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::operation::{OperationDescriptor, TypeKey};
use crate::{Error, Result};

/// Declarative metadata attached to a surface.
///
/// Stands in for attribute/annotation reflection:
/// attributes are explicit structured data copied onto the proxy when attribute
/// propagation is enabled, never discovered at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    /// Attribute name.
    pub name: String,
    /// Named values carried by the attribute.
    pub entries: Vec<(String, String)>,
}

impl AttributeValue {
    /// Creates a marker attribute with no values.
    #[must_use]
    pub fn marker(name: &str) -> Self {
        AttributeValue {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    /// Adds a named value.
    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.push((key.to_string(), value.to_string()));
        self
    }
}

/// A named, ordered set of operations: the unit a proxy exposes.
///
/// A surface is the explicit stand-in for an interface. Surfaces are immutable
/// once built and are shared between configurations via `Arc`.
pub struct OperationSurface {
    key: TypeKey,
    ops: Vec<Arc<OperationDescriptor>>,
    by_name: HashMap<Arc<str>, usize>,
    attributes: Vec<AttributeValue>,
}

impl OperationSurface {
    /// Starts building a surface with the given identity.
    #[must_use]
    pub fn builder(key: TypeKey) -> SurfaceBuilder {
        SurfaceBuilder {
            key,
            ops: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// The surface identity.
    #[must_use]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// Looks up an operation by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<OperationDescriptor>> {
        self.by_name.get(name).map(|&i| &self.ops[i])
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &Arc<OperationDescriptor>> {
        self.ops.iter()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if the surface declares no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Declarative attributes attached to this surface.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeValue] {
        &self.attributes
    }
}

impl fmt::Debug for OperationSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSurface")
            .field("key", &self.key)
            .field("operations", &self.ops.len())
            .finish()
    }
}

/// Builder for [`OperationSurface`].
pub struct SurfaceBuilder {
    key: TypeKey,
    ops: Vec<Arc<OperationDescriptor>>,
    attributes: Vec<AttributeValue>,
}

impl SurfaceBuilder {
    /// Adds an operation.
    #[must_use]
    pub fn operation(mut self, descriptor: OperationDescriptor) -> Self {
        self.ops.push(Arc::new(descriptor));
        self
    }

    /// Attaches a declarative attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeValue) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Finalizes the surface.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateOperation`] if two operations share a name.
    pub fn build(self) -> Result<Arc<OperationSurface>> {
        let mut by_name = HashMap::with_capacity(self.ops.len());
        for (index, op) in self.ops.iter().enumerate() {
            let name = op.sig().name.clone();
            if by_name.insert(name, index).is_some() {
                return Err(Error::DuplicateOperation(op.sig().full_name()));
            }
        }
        Ok(Arc::new(OperationSurface {
            key: self.key,
            ops: self.ops,
            by_name,
            attributes: self.attributes,
        }))
    }
}

/// The target's own concrete type, as a surface plus extendability.
///
/// Used by the subclass dispatch strategy. `extendable: false` models a sealed
/// or non-public base type; requesting a subclass proxy over it fails at
/// construction with [`Error::ProxyConstruction`]. Individual operations marked
/// [`OperationDescriptor::sealed`] remain callable through the proxy but bypass
/// all advice.
#[derive(Debug, Clone)]
pub struct ConcreteSurface {
    /// The concrete type's operation surface.
    pub surface: Arc<OperationSurface>,
    /// Whether the type can be extended by a subclass proxy.
    pub extendable: bool,
}

impl ConcreteSurface {
    /// An extendable concrete surface.
    #[must_use]
    pub fn new(surface: Arc<OperationSurface>) -> Self {
        ConcreteSurface {
            surface,
            extendable: true,
        }
    }

    /// A sealed concrete surface.
    #[must_use]
    pub fn sealed(surface: Arc<OperationSurface>) -> Self {
        ConcreteSurface {
            surface,
            extendable: false,
        }
    }
}
