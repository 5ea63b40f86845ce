//! Builder for Ketama and array-modulus locators.

use std::sync::Arc;

use crate::config::LocatorConfig;
use crate::configuration::KetamaConfiguration;
use crate::error::Result;
use crate::hash::HashAlgorithm;
use crate::locator::{ArrayModNodeLocator, KetamaNodeLocator};
use crate::node::Node;
use crate::registry::{LocatorRegistry, RegistryHandle};

/// Collects nodes and settings, then builds a locator.
///
/// ```rust
/// use corelib::locator::LocatorBuilder;
/// use corelib::node::SimpleNode;
/// use std::sync::Arc;
///
/// let locator = LocatorBuilder::new()
///     .with_repetitions(40)
///     .add_node(Arc::new(SimpleNode::new("10.0.0.1:11211")))
///     .add_node(Arc::new(SimpleNode::new("10.0.0.2:11211")))
///     .build()
///     .unwrap();
/// assert_eq!(locator.node_count(), 2);
/// ```
pub struct LocatorBuilder<N: Node + ?Sized> {
    nodes: Vec<Arc<N>>,
    config: LocatorConfig,
    configuration: Option<Arc<dyn KetamaConfiguration<Arc<N>>>>,
    registry: Option<RegistryHandle>,
}

impl<N: Node + ?Sized> LocatorBuilder<N> {
    /// Create a builder with default settings (160 repetitions, Ketama hash).
    pub fn new() -> Self {
        Self::from_config(LocatorConfig::default())
    }

    pub fn from_config(config: LocatorConfig) -> Self {
        Self {
            nodes: Vec::new(),
            config,
            configuration: None,
            registry: None,
        }
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.config.repetitions = repetitions;
        self
    }

    pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.config.hash = hash;
        self
    }

    /// Use a custom ring construction strategy instead of the default one.
    pub fn with_configuration(mut self, configuration: Arc<dyn KetamaConfiguration<Arc<N>>>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Publish the built locator's stats under `name`.
    pub fn with_registry(mut self, registry: Arc<LocatorRegistry>, name: impl Into<String>) -> Self {
        self.registry = Some(RegistryHandle::new(registry, name));
        self
    }

    pub fn add_node(mut self, node: Arc<N>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_nodes(mut self, nodes: impl IntoIterator<Item = Arc<N>>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    /// Build a live Ketama locator. Fails on invalid settings or duplicates.
    pub fn build(self) -> Result<KetamaNodeLocator<N>> {
        self.config.validate()?;
        let configuration: Arc<dyn KetamaConfiguration<Arc<N>>> = match self.configuration {
            Some(configuration) => configuration,
            None => Arc::new(self.config.ketama_configuration()?),
        };
        let locator =
            KetamaNodeLocator::new(self.nodes, configuration)?.with_hash_algorithm(self.config.hash);
        Ok(match self.registry {
            Some(registry) => locator.with_registry(registry),
            None => locator,
        })
    }

    /// Build a fixed array-modulus locator.
    pub fn build_array_mod(self) -> Result<ArrayModNodeLocator<N>> {
        self.config.validate()?;
        Ok(ArrayModNodeLocator::new(self.nodes, self.config.hash))
    }
}

impl<N: Node + ?Sized> Default for LocatorBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}
