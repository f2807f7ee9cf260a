//! A group that stores decoded config instances behind shared handles.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use cfgsync_protocol::{
    Codec, ConfigClass, ConfigEntry, ConfigKey, ConfigValue, JsonCodec,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{ConfigGroup, GroupWrite, RegistryError};

/// Shared handle to a live config instance.
///
/// In-place updates write through the same handle, so code holding one
/// sees every change applied by the sync layer.
pub type ConfigHandle<T> = Arc<RwLock<T>>;

struct Slot<T> {
    raw: ConfigValue,
    handle: ConfigHandle<T>,
}

/// Stores configs of type `T`, decoded with codec `C`.
pub struct TypedGroup<T, C = JsonCodec> {
    class: ConfigClass,
    resource_backed: bool,
    codec: C,
    slots: BTreeMap<String, Slot<T>>,
}

impl<T, C> TypedGroup<T, C>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Codec,
{
    /// Creates an empty group whose configs are created at runtime.
    pub fn new(class: impl Into<String>, codec: C) -> Self {
        Self {
            class: ConfigClass::new(class),
            resource_backed: false,
            codec,
            slots: BTreeMap::new(),
        }
    }

    /// Creates a resource-backed group pre-filled with `defaults`.
    ///
    /// # Errors
    /// Returns [`RegistryError::Value`] if a default can't be encoded.
    pub fn resource_backed(
        class: impl Into<String>,
        codec: C,
        defaults: impl IntoIterator<Item = (String, T)>,
    ) -> Result<Self, RegistryError> {
        let mut group = Self::new(class, codec);
        group.resource_backed = true;
        for (name, config) in defaults {
            let raw = group.encode_value(&name, &config)?;
            group.slots.insert(
                name,
                Slot {
                    raw,
                    handle: Arc::new(RwLock::new(config)),
                },
            );
        }
        Ok(group)
    }

    /// Returns the shared handle for `name`.
    pub fn handle(&self, name: &str) -> Option<ConfigHandle<T>> {
        self.slots.get(name).map(|slot| Arc::clone(&slot.handle))
    }

    /// Builds the entry that would set `name` to `config`.
    ///
    /// # Errors
    /// Returns [`RegistryError::Value`] if `config` can't be encoded.
    pub fn entry(
        &self,
        name: &str,
        config: &T,
    ) -> Result<ConfigEntry, RegistryError> {
        let value = self.encode_value(name, config)?;
        Ok(ConfigEntry::new(self.key(name), value))
    }

    fn key(&self, name: &str) -> ConfigKey {
        ConfigKey {
            class: self.class.clone(),
            name: name.to_string(),
        }
    }

    fn encode_value(
        &self,
        name: &str,
        config: &T,
    ) -> Result<ConfigValue, RegistryError> {
        ConfigValue::encode(&self.codec, config).map_err(|source| {
            RegistryError::Value {
                key: self.key(name),
                source,
            }
        })
    }

    fn decode_value(
        &self,
        name: &str,
        value: &ConfigValue,
    ) -> Result<T, RegistryError> {
        value.decode(&self.codec).map_err(|source| RegistryError::Value {
            key: self.key(name),
            source,
        })
    }
}

impl<T> Slot<T> {
    fn overwrite(&mut self, raw: &ConfigValue, config: T) {
        let mut guard =
            self.handle.write().unwrap_or_else(PoisonError::into_inner);
        *guard = config;
        self.raw = raw.clone();
    }
}

impl<T, C> ConfigGroup for TypedGroup<T, C>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Codec,
{
    fn class(&self) -> &ConfigClass {
        &self.class
    }

    fn is_resource_backed(&self) -> bool {
        self.resource_backed
    }

    fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.slots.get(name).map(|slot| &slot.raw)
    }

    fn add(
        &mut self,
        name: &str,
        value: &ConfigValue,
    ) -> Result<GroupWrite, RegistryError> {
        let config = self.decode_value(name, value)?;
        if let Some(slot) = self.slots.get_mut(name) {
            slot.overwrite(value, config);
            return Ok(GroupWrite::Overwritten);
        }
        self.slots.insert(
            name.to_string(),
            Slot {
                raw: value.clone(),
                handle: Arc::new(RwLock::new(config)),
            },
        );
        Ok(GroupWrite::Inserted)
    }

    fn update_in_place(
        &mut self,
        name: &str,
        value: &ConfigValue,
    ) -> Result<(), RegistryError> {
        if !self.slots.contains_key(name) {
            return Err(RegistryError::Missing(self.key(name)));
        }
        let config = self.decode_value(name, value)?;
        if let Some(slot) = self.slots.get_mut(name) {
            slot.overwrite(value, config);
        }
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Option<ConfigValue> {
        self.slots.remove(name).map(|slot| slot.raw)
    }

    fn names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
