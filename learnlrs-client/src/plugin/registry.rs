//! Plugin registry and factory.
//!
//! The registry maps configuration names to plugin constructors. It
//! holds no live state beyond those mappings, so once built it is safe
//! to read from any number of tasks without locking.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::config::PluginConfig;
use crate::error::{ConfigError, Error, Result};
use crate::plugin::{lrsql, ralph, veracity, LrsPlugin, PluginDescriptor};

/// Constructs a plugin instance from its configuration map.
pub type PluginConstructor = fn(&PluginConfig) -> Result<Arc<dyn LrsPlugin>>;

/// Name -> (descriptor, constructor) mappings.
pub struct PluginRegistry {
    plugins: BTreeMap<&'static str, (&'static PluginDescriptor, PluginConstructor)>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// Registry with the built-in backends: lrsql, ralph, veracity.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(&lrsql::DESCRIPTOR, lrsql::LrsqlPlugin::from_config);
        registry.register(&ralph::DESCRIPTOR, ralph::RalphPlugin::from_config);
        registry.register(&veracity::DESCRIPTOR, veracity::VeracityPlugin::from_config);
        registry
    }

    /// Register a plugin. Re-registering a name overwrites the earlier
    /// entry.
    pub fn register(
        &mut self,
        descriptor: &'static PluginDescriptor,
        constructor: PluginConstructor,
    ) {
        if self
            .plugins
            .insert(descriptor.name, (descriptor, constructor))
            .is_some()
        {
            warn!(plugin = descriptor.name, "plugin already registered, overwriting");
        }
        info!(plugin = descriptor.name, "registered plugin");
    }

    pub fn descriptor(&self, name: &str) -> Option<&'static PluginDescriptor> {
        self.plugins.get(name).map(|(descriptor, _)| *descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered plugin names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.keys().copied().collect()
    }

    /// Construct a plugin by name.
    ///
    /// Fails with [`Error::PluginNotFound`] for an unknown name and
    /// with a [`ConfigError`] when the configuration is missing any of
    /// the descriptor's required keys.
    pub fn create(&self, name: &str, config: &PluginConfig) -> Result<Arc<dyn LrsPlugin>> {
        let (descriptor, constructor) =
            self.plugins.get(name).ok_or_else(|| Error::PluginNotFound {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;

        for key in descriptor.required_keys {
            if !config.contains(key) {
                return Err(ConfigError::MissingKey {
                    plugin: descriptor.name.to_string(),
                    key: (*key).to_string(),
                }
                .into());
            }
        }

        info!(plugin = name, "creating plugin instance");
        constructor(config)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

static ACTIVE: OnceLock<Arc<dyn LrsPlugin>> = OnceLock::new();

/// Install the process-wide plugin instance. Exactly one plugin may be
/// active per process lifetime.
pub fn activate(plugin: Arc<dyn LrsPlugin>) -> Result<()> {
    ACTIVE
        .set(plugin)
        .map_err(|_| ConfigError::AlreadyActive.into())
}

/// The process-wide plugin, if one has been activated.
pub fn active() -> Option<Arc<dyn LrsPlugin>> {
    ACTIVE.get().cloned()
}
