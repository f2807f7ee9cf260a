//! The class → group table and its change queue.

use std::collections::HashMap;

use cfgsync_protocol::{ConfigClass, ConfigEntry, ConfigKey, ConfigValue};

use crate::{ConfigGroup, GroupWrite, RegistryError};

/// A mutation that happened in a [`ConfigRegistry`].
///
/// Every successful add, update or remove appends one of these to the
/// registry's queue. The client sync director drains the queue to learn
/// about local edits it should forward to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A config that didn't exist was created.
    Added(ConfigEntry),
    /// An existing config received a new value.
    Updated(ConfigEntry),
    /// A config was deleted.
    Removed(ConfigKey),
}

impl RegistryEvent {
    /// The key of the config this event concerns.
    pub fn key(&self) -> &ConfigKey {
        match self {
            Self::Added(entry) | Self::Updated(entry) => &entry.key,
            Self::Removed(key) => key,
        }
    }
}

/// Groups of named configs, one group per config class.
///
/// # Example
///
/// ```rust
/// use cfgsync_protocol::{ConfigEntry, ConfigKey, ConfigValue};
/// use cfgsync_registry::{ConfigGroup, ConfigRegistry, MemoryGroup, RegistryEvent};
///
/// let mut registry = ConfigRegistry::from_groups([
///     Box::new(MemoryGroup::new("Weapon")) as Box<dyn ConfigGroup>,
/// ])
/// .unwrap();
///
/// let entry = ConfigEntry::new(ConfigKey::new("Weapon", "sword"), ConfigValue(vec![1]));
/// registry.add(&entry).unwrap();
///
/// assert_eq!(registry.drain_events(), vec![RegistryEvent::Added(entry)]);
/// ```
#[derive(Default)]
pub struct ConfigRegistry {
    groups: HashMap<ConfigClass, Box<dyn ConfigGroup>>,
    events: Vec<RegistryEvent>,
}

impl ConfigRegistry {
    /// Creates a registry with no groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a registration list.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateClass`] if two groups share a class.
    pub fn from_groups(
        groups: impl IntoIterator<Item = Box<dyn ConfigGroup>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for group in groups {
            registry.register(group)?;
        }
        Ok(registry)
    }

    /// Adds a group to the table.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateClass`] if the class is taken.
    pub fn register(
        &mut self,
        group: Box<dyn ConfigGroup>,
    ) -> Result<(), RegistryError> {
        let class = group.class().clone();
        if self.groups.contains_key(&class) {
            return Err(RegistryError::DuplicateClass(class));
        }
        self.groups.insert(class, group);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    /// Same as `register`.
    pub fn with_group(
        mut self,
        group: impl ConfigGroup,
    ) -> Result<Self, RegistryError> {
        self.register(Box::new(group))?;
        Ok(self)
    }

    /// Returns the group storing `class`.
    pub fn group(&self, class: &ConfigClass) -> Option<&dyn ConfigGroup> {
        self.groups.get(class).map(|g| g.as_ref())
    }

    /// Returns the group storing `class` as its concrete type.
    pub fn group_as<G: ConfigGroup>(&self, class: &ConfigClass) -> Option<&G> {
        self.group(class)?.as_any().downcast_ref::<G>()
    }

    /// Whether `class` is resource-backed, or `None` if it's unregistered.
    pub fn is_resource_backed(&self, class: &ConfigClass) -> Option<bool> {
        self.group(class).map(|g| g.is_resource_backed())
    }

    /// Raw lookup of the current value stored under `key`.
    pub fn raw(&self, key: &ConfigKey) -> Option<&ConfigValue> {
        self.group(&key.class)?.get(&key.name)
    }

    /// Adds `entry`, or overwrites the existing config with that key.
    ///
    /// Queues [`RegistryEvent::Added`] or [`RegistryEvent::Updated`].
    ///
    /// # Errors
    /// - [`RegistryError::UnknownClass`] if no group stores the class.
    /// - Whatever the group's `add` returns.
    pub fn add(&mut self, entry: &ConfigEntry) -> Result<(), RegistryError> {
        let group = self.group_mut(&entry.key.class)?;
        let event = match group.add(&entry.key.name, &entry.value)? {
            GroupWrite::Inserted => RegistryEvent::Added(entry.clone()),
            GroupWrite::Overwritten => RegistryEvent::Updated(entry.clone()),
        };
        self.events.push(event);
        Ok(())
    }

    /// Copies `entry`'s value onto the existing config with that key.
    ///
    /// Queues [`RegistryEvent::Updated`].
    ///
    /// # Errors
    /// - [`RegistryError::UnknownClass`] if no group stores the class.
    /// - [`RegistryError::Missing`] if the config doesn't exist.
    pub fn update(&mut self, entry: &ConfigEntry) -> Result<(), RegistryError> {
        self.group_mut(&entry.key.class)?
            .update_in_place(&entry.key.name, &entry.value)?;
        self.events.push(RegistryEvent::Updated(entry.clone()));
        Ok(())
    }

    /// Deletes the config stored under `key` and returns its last value.
    ///
    /// Queues [`RegistryEvent::Removed`].
    ///
    /// # Errors
    /// - [`RegistryError::UnknownClass`] if no group stores the class.
    /// - [`RegistryError::Missing`] if the config doesn't exist.
    pub fn remove(
        &mut self,
        key: &ConfigKey,
    ) -> Result<ConfigValue, RegistryError> {
        let value = self
            .group_mut(&key.class)?
            .remove(&key.name)
            .ok_or_else(|| RegistryError::Missing(key.clone()))?;
        self.events.push(RegistryEvent::Removed(key.clone()));
        Ok(value)
    }

    /// Takes every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of queued events.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Every key currently stored, across all groups, sorted.
    pub fn keys(&self) -> Vec<ConfigKey> {
        let mut keys: Vec<ConfigKey> = self
            .groups
            .values()
            .flat_map(|group| {
                let class = group.class().clone();
                group.names().into_iter().map(move |name| ConfigKey {
                    class: class.clone(),
                    name,
                })
            })
            .collect();
        keys.sort();
        keys
    }

    fn group_mut(
        &mut self,
        class: &ConfigClass,
    ) -> Result<&mut Box<dyn ConfigGroup>, RegistryError> {
        self.groups
            .get_mut(class)
            .ok_or_else(|| RegistryError::UnknownClass(class.clone()))
    }
}
