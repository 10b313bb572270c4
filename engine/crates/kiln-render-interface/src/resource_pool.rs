use std::marker::PhantomData;

use crate::handles::{Handle, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("{kind} pool exhausted (capacity {capacity})")]
    Exhausted { kind: &'static str, capacity: u32 },

    #[error("stale {kind} handle {index}v{generation}")]
    StaleHandle {
        kind: &'static str,
        index: u32,
        generation: u32,
    },
}

/// A slot index taken out of circulation by [`ResourcePool::retire`].
///
/// Not `Clone`: each retired slot goes back to the free list exactly once.
#[derive(Debug)]
pub struct RetiredSlot<K> {
    index: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> RetiredSlot<K> {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity slab with a free list and generation-checked handles.
///
/// Slots are created lazily up to `capacity`; there is no growth past it.
pub struct ResourcePool<T, K> {
    slots: Vec<Slot<T>>,
    /// LIFO: the most recently freed index is handed out first
    free_list: Vec<u32>,
    capacity: u32,
    live: usize,

    _kind: PhantomData<fn() -> K>,
}

// new & init
impl<T, K: ResourceKind> ResourcePool<T, K> {
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            capacity,
            live: 0,
            _kind: PhantomData,
        }
    }
}
// getters
impl<T, K: ResourceKind> ResourcePool<T, K> {
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// number of live records
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn valid_handle(&self, handle: Handle<K>) -> bool {
        self.slots
            .get(handle.index() as usize)
            .is_some_and(|slot| slot.generation == handle.generation() && slot.value.is_some())
    }

    pub fn access(&self, handle: Handle<K>) -> Result<&T, PoolError> {
        match self.slots.get(handle.index() as usize) {
            Some(Slot {
                generation,
                value: Some(value),
            }) if *generation == handle.generation() => Ok(value),
            _ => Err(Self::stale(handle)),
        }
    }

    pub fn access_mut(&mut self, handle: Handle<K>) -> Result<&mut T, PoolError> {
        match self.slots.get_mut(handle.index() as usize) {
            Some(Slot {
                generation,
                value: Some(value),
            }) if *generation == handle.generation() => Ok(value),
            _ => Err(Self::stale(handle)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }

    /// Fails with `Exhausted` when the next `acquire` would.
    pub fn check_available(&self) -> Result<(), PoolError> {
        if self.free_list.is_empty() && self.slots.len() as u32 >= self.capacity {
            return Err(PoolError::Exhausted {
                kind: K::NAME,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    fn stale(handle: Handle<K>) -> PoolError {
        PoolError::StaleHandle {
            kind: K::NAME,
            index: handle.index(),
            generation: handle.generation(),
        }
    }
}
// update
impl<T, K: ResourceKind> ResourcePool<T, K> {
    pub fn acquire(&mut self, value: T) -> Result<Handle<K>, PoolError> {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None if (self.slots.len() as u32) < self.capacity => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                self.slots.len() as u32 - 1
            }
            None => {
                return Err(PoolError::Exhausted {
                    kind: K::NAME,
                    capacity: self.capacity,
                });
            }
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none(), "free list handed out an occupied slot");
        slot.value = Some(value);
        self.live += 1;
        Ok(Handle::new(index, slot.generation))
    }

    /// Takes the record out and makes the index available again right away.
    pub fn free(&mut self, handle: Handle<K>) -> Result<T, PoolError> {
        let (value, retired) = self.retire(handle)?;
        self.release(retired);
        Ok(value)
    }

    /// Takes the record out and invalidates every copy of `handle`, but keeps the index out of the
    /// free list until [`Self::release`].
    pub fn retire(&mut self, handle: Handle<K>) -> Result<(T, RetiredSlot<K>), PoolError> {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .ok_or_else(|| Self::stale(handle))?;
        let value = slot.value.take().ok_or_else(|| Self::stale(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;

        Ok((
            value,
            RetiredSlot {
                index: handle.index(),
                _kind: PhantomData,
            },
        ))
    }

    pub fn release(&mut self, retired: RetiredSlot<K>) {
        debug_assert!(self.slots[retired.index as usize].value.is_none());
        self.free_list.push(retired.index);
    }

    /// Removes every live record. Retired slots stay retired.
    pub fn drain(&mut self) -> Vec<(Handle<K>, T)> {
        let mut drained = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                drained.push((Handle::new(index as u32, slot.generation), value));
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        self.live = 0;
        drained
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::handles::{BufferKind, TextureKind};

    #[test]
    fn test_freed_index_is_reused() {
        let mut pool = ResourcePool::<&str, BufferKind>::new(4);
        let a = pool.acquire("a").unwrap();
        let b = pool.acquire("b").unwrap();
        assert_ne!(a.index(), b.index());

        assert_eq!(pool.free(a).unwrap(), "a");
        let c = pool.acquire("c").unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_stale_handle_detected() {
        let mut pool = ResourcePool::<u32, BufferKind>::new(2);
        let a = pool.acquire(7).unwrap();
        pool.free(a).unwrap();
        let _b = pool.acquire(8).unwrap();

        assert!(!pool.valid_handle(a));
        assert_eq!(
            pool.access(a),
            Err(PoolError::StaleHandle {
                kind: "Buffer",
                index: a.index(),
                generation: a.generation(),
            })
        );
        assert!(pool.access_mut(a).is_err());
        assert!(pool.free(a).is_err());
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut pool = ResourcePool::<(), TextureKind>::new(2);
        pool.acquire(()).unwrap();
        assert!(pool.check_available().is_ok());
        pool.acquire(()).unwrap();
        assert!(pool.check_available().is_err());
        assert_eq!(
            pool.acquire(()),
            Err(PoolError::Exhausted {
                kind: "Texture",
                capacity: 2,
            })
        );
    }

    #[test]
    fn test_live_handles_never_share_an_index() {
        let mut pool = ResourcePool::<usize, BufferKind>::new(64);
        let mut live = Vec::new();
        for round in 0..200usize {
            if round % 3 == 2 {
                let handle = live.remove(round % live.len());
                pool.free(handle).unwrap();
            } else if let Ok(handle) = pool.acquire(round) {
                live.push(handle);
            }
            let indices: HashSet<u32> = live.iter().map(|h| h.index()).collect();
            assert_eq!(indices.len(), live.len());
            assert!(live.iter().all(|h| pool.valid_handle(*h)));
        }
    }

    #[test]
    fn test_retired_index_held_until_release() {
        let mut pool = ResourcePool::<u8, TextureKind>::new(1);
        let a = pool.acquire(1).unwrap();
        let (value, retired) = pool.retire(a).unwrap();
        assert_eq!(value, 1);
        assert!(!pool.valid_handle(a));

        // the only slot is retired, not free
        assert!(matches!(pool.acquire(2), Err(PoolError::Exhausted { .. })));

        pool.release(retired);
        let b = pool.acquire(2).unwrap();
        assert_eq!(b.index(), a.index());
        assert_eq!(*pool.access(b).unwrap(), 2);
    }

    #[test]
    fn test_drain_invalidates_everything() {
        let mut pool = ResourcePool::<u8, BufferKind>::new(8);
        let handles: Vec<_> = (0..5).map(|i| pool.acquire(i).unwrap()).collect();
        let drained = pool.drain();
        assert_eq!(drained.len(), 5);
        assert!(pool.is_empty());
        assert!(handles.iter().all(|h| !pool.valid_handle(*h)));
        assert_eq!(pool.iter().count(), 0);
    }
}
