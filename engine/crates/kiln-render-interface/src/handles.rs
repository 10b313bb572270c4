use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// Marker for the kind of object a [`Handle`] points at.
pub trait ResourceKind: 'static {
    const NAME: &'static str;
}

macro_rules! resource_kinds {
    ($($kind:ident => $name:literal, $alias:ident;)*) => {
        $(
            #[derive(Debug)]
            pub enum $kind {}
            impl ResourceKind for $kind {
                const NAME: &'static str = $name;
            }
            pub type $alias = Handle<$kind>;
        )*
    };
}

resource_kinds! {
    BufferKind => "Buffer", BufferHandle;
    TextureKind => "Texture", TextureHandle;
    SamplerKind => "Sampler", SamplerHandle;
    DescriptorSetLayoutKind => "DescriptorSetLayout", DescriptorSetLayoutHandle;
    DescriptorSetKind => "DescriptorSet", DescriptorSetHandle;
    PipelineKind => "Pipeline", PipelineHandle;
}

/// Typed weak reference into a pool slot.
///
/// `index` addresses the slot, `generation` tells whether the slot still holds the object the
/// handle was issued for. For textures `index` is also the element in the bindless array.
pub struct Handle<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

// derives would put bounds on K
impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K> Copy for Handle<K> {}
impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<K> Eq for Handle<K> {}
impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}
impl<K: ResourceKind> Debug for Handle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Handle({}v{})", K::NAME, self.index, self.generation)
    }
}
impl<K: ResourceKind> Display for Handle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}v{}", K::NAME, self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_identity() {
        let a = TextureHandle::new(3, 0);
        let b = TextureHandle::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(format!("{:?}", a), "TextureHandle(3v0)");
        assert_eq!(format!("{}", b), "Texture#3v1");
    }
}
