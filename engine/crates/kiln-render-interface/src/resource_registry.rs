use std::collections::HashMap;

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Key of a registry entry; stays valid until the last `unload` of that name.
    pub struct RegistryKey;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0:?} is not loaded")]
    NotLoaded(String),

    #[error("failed to load {name:?}: {source}")]
    Load {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

struct RegistryEntry<V> {
    name: String,
    value: V,
    ref_count: usize,
}

/// Named, reference-counted resources owned by the application.
///
/// The registry never destroys anything itself: the last `unload` of a name hands the value back
/// and the caller releases whatever GPU objects it holds.
pub struct ResourceRegistry<V> {
    entries: SlotMap<RegistryKey, RegistryEntry<V>>,
    by_name: HashMap<String, RegistryKey>,
}
impl<V> Default for ResourceRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl<V> ResourceRegistry<V> {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            by_name: HashMap::new(),
        }
    }
}
// getters
impl<V> ResourceRegistry<V> {
    #[inline]
    pub fn get(&self, key: RegistryKey) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&V> {
        self.by_name.get(name).and_then(|key| self.get(*key))
    }

    pub fn ref_count(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).and_then(|key| self.entries.get(*key)).map(|entry| entry.ref_count)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|entry| (entry.name.as_str(), &entry.value))
    }
}
// update
impl<V> ResourceRegistry<V> {
    /// Returns the existing entry for `name` with its count bumped, or runs `loader` once.
    pub fn load<E>(&mut self, name: &str, loader: impl FnOnce() -> Result<V, E>) -> Result<RegistryKey, RegistryError>
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let existing = self.by_name.get(name).copied();
        if let Some((key, entry)) = existing.and_then(|key| self.entries.get_mut(key).map(|entry| (key, entry))) {
            entry.ref_count += 1;
            log::debug!("registry: {} now has {} users", name, entry.ref_count);
            return Ok(key);
        }

        let value = loader().map_err(|e| RegistryError::Load {
            name: name.to_string(),
            source: e.into(),
        })?;
        let key = self.entries.insert(RegistryEntry {
            name: name.to_string(),
            value,
            ref_count: 1,
        });
        self.by_name.insert(name.to_string(), key);
        log::info!("registry: loaded {}", name);
        Ok(key)
    }

    /// Drops one reference. Hands the value back when it was the last one.
    pub fn unload(&mut self, name: &str) -> Result<Option<V>, RegistryError> {
        let key = *self.by_name.get(name).ok_or_else(|| RegistryError::NotLoaded(name.to_string()))?;
        let entry = self.entries.get_mut(key).ok_or_else(|| RegistryError::NotLoaded(name.to_string()))?;

        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Ok(None);
        }

        self.by_name.remove(name);
        let entry = self.entries.remove(key).ok_or_else(|| RegistryError::NotLoaded(name.to_string()))?;
        log::info!("registry: unloaded {}", name);
        Ok(Some(entry.value))
    }

    /// Empties the registry regardless of reference counts.
    pub fn drain(&mut self) -> Vec<(String, V)> {
        self.by_name.clear();
        self.entries.drain().map(|(_, entry)| (entry.name, entry.value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(value: u32) -> impl FnOnce() -> Result<u32, std::io::Error> {
        move || Ok(value)
    }

    #[test]
    fn test_load_shares_by_name() {
        let mut registry = ResourceRegistry::new();
        let a = registry.load("cube", ok(1)).unwrap();
        let b = registry.load("cube", || -> Result<u32, std::io::Error> { panic!("loaded twice") }).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.ref_count("cube"), Some(2));
        assert_eq!(registry.get(a), Some(&1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_last_unload_returns_value() {
        let mut registry = ResourceRegistry::new();
        let key = registry.load("quad", ok(5)).unwrap();
        registry.load("quad", ok(5)).unwrap();

        assert_eq!(registry.unload("quad").unwrap(), None);
        assert_eq!(registry.unload("quad").unwrap(), Some(5));
        assert!(registry.get(key).is_none());
        assert!(registry.get_by_name("quad").is_none());
        assert!(matches!(registry.unload("quad"), Err(RegistryError::NotLoaded(_))));
    }

    #[test]
    fn test_failed_load_leaves_nothing() {
        let mut registry = ResourceRegistry::<u32>::new();
        let result = registry.load("broken", || Err(std::io::Error::other("missing file")));
        assert!(matches!(result, Err(RegistryError::Load { .. })));
        assert!(registry.is_empty());
        assert_eq!(registry.ref_count("broken"), None);
    }

    #[test]
    fn test_drain() {
        let mut registry = ResourceRegistry::new();
        registry.load("a", ok(1)).unwrap();
        registry.load("b", ok(2)).unwrap();
        let mut drained = registry.drain();
        drained.sort();
        assert_eq!(drained, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        assert!(registry.get_by_name("a").is_none());
    }
}
