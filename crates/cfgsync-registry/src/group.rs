//! The per-type storage seam and its simplest implementation.

use std::any::Any;
use std::collections::BTreeMap;

use cfgsync_protocol::{ConfigClass, ConfigKey, ConfigValue};

use crate::RegistryError;

/// What a successful [`ConfigGroup::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupWrite {
    /// No config with that name existed; one was created.
    Inserted,
    /// A config with that name existed and now holds the new value.
    Overwritten,
}

/// Stores the configs of one class.
///
/// The sync layer only ever talks to configs through this trait, using
/// their serialized [`ConfigValue`]. What a group keeps internally
/// (raw bytes, decoded structs, handles shared with game code) is its
/// own business.
///
/// A *resource-backed* group holds configs whose defaults come from
/// on-disk assets. Such configs can be overridden but an update for a
/// name the group doesn't know can't be turned into an add.
pub trait ConfigGroup: Send + 'static {
    /// The class tag this group stores.
    fn class(&self) -> &ConfigClass;

    /// Returns `true` if this group's configs come from backing resources.
    fn is_resource_backed(&self) -> bool;

    /// Raw lookup: the current serialized value of `name`.
    fn get(&self, name: &str) -> Option<&ConfigValue>;

    /// Inserts `name`, or if it already exists overwrites the existing
    /// instance in place.
    ///
    /// # Errors
    /// Returns [`RegistryError::Value`] if `value` doesn't decode into the
    /// group's config type.
    fn add(
        &mut self,
        name: &str,
        value: &ConfigValue,
    ) -> Result<GroupWrite, RegistryError>;

    /// Copies `value` onto the existing config `name`, keeping its
    /// identity.
    ///
    /// # Errors
    /// - [`RegistryError::Missing`] if `name` doesn't exist.
    /// - [`RegistryError::Value`] if `value` doesn't decode.
    fn update_in_place(
        &mut self,
        name: &str,
        value: &ConfigValue,
    ) -> Result<(), RegistryError>;

    /// Deletes `name`. Returns the value it held, if any.
    fn remove(&mut self, name: &str) -> Option<ConfigValue>;

    /// Names of all configs currently in the group, sorted.
    fn names(&self) -> Vec<String>;

    /// Downcast support so callers can reach a concrete group type.
    fn as_any(&self) -> &dyn Any;
}

/// A group that keeps configs as raw serialized values.
///
/// Useful for relays and tools that move configs around without
/// understanding them, and as the default group in tests.
#[derive(Debug, Clone)]
pub struct MemoryGroup {
    class: ConfigClass,
    resource_backed: bool,
    configs: BTreeMap<String, ConfigValue>,
}

impl MemoryGroup {
    /// Creates an empty group whose configs are created at runtime.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: ConfigClass::new(class),
            resource_backed: false,
            configs: BTreeMap::new(),
        }
    }

    /// Creates a resource-backed group pre-filled with its defaults.
    pub fn resource_backed(
        class: impl Into<String>,
        defaults: impl IntoIterator<Item = (String, ConfigValue)>,
    ) -> Self {
        Self {
            class: ConfigClass::new(class),
            resource_backed: true,
            configs: defaults.into_iter().collect(),
        }
    }

    /// Number of configs in the group.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Returns `true` if the group holds nothing.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl ConfigGroup for MemoryGroup {
    fn class(&self) -> &ConfigClass {
        &self.class
    }

    fn is_resource_backed(&self) -> bool {
        self.resource_backed
    }

    fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.configs.get(name)
    }

    fn add(
        &mut self,
        name: &str,
        value: &ConfigValue,
    ) -> Result<GroupWrite, RegistryError> {
        match self.configs.insert(name.to_string(), value.clone()) {
            Some(_) => Ok(GroupWrite::Overwritten),
            None => Ok(GroupWrite::Inserted),
        }
    }

    fn update_in_place(
        &mut self,
        name: &str,
        value: &ConfigValue,
    ) -> Result<(), RegistryError> {
        let slot = self.configs.get_mut(name).ok_or_else(|| {
            RegistryError::Missing(ConfigKey {
                class: self.class.clone(),
                name: name.to_string(),
            })
        })?;
        *slot = value.clone();
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Option<ConfigValue> {
        self.configs.remove(name)
    }

    fn names(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
