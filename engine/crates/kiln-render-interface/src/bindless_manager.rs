use ash::vk;
use kiln_gfx::{
    descriptors::{descriptor_pool::GfxDescriptorPool, descriptor_set::GfxDescriptorSet},
    gfx::Gfx,
    utilities::descriptor_cursor::{GfxDescriptorBinding, GfxWriteDescriptorSet},
};

use crate::{
    handles::{DescriptorSetLayoutHandle, TextureHandle},
    resource_manager::{DescriptorSetLayoutDesc, ResourceManager, ResourceResult},
    resource_pool::PoolError,
};

/// One descriptor to write into the bindless array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BindlessTextureEntry {
    pub handle: TextureHandle,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
}

/// Binding 0 of the bindless set: `sampler2D textures[]`, indexed by `TextureHandle::index`.
pub fn bindless_textures_binding(capacity: u32) -> GfxDescriptorBinding {
    GfxDescriptorBinding::new(
        0,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        capacity,
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
    )
    .with_flags(vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND)
}

/// One write per entry, each landing on `array_element = handle.index`.
///
/// Handles past the end of the array are skipped with an error log; the texture pool and the
/// array share a capacity, so this only happens on a misconfigured renderer.
pub fn plan_texture_writes(
    binding: &GfxDescriptorBinding,
    dst_set: vk::DescriptorSet,
    entries: &[BindlessTextureEntry],
) -> Vec<GfxWriteDescriptorSet> {
    entries
        .iter()
        .filter(|entry| {
            let in_range = entry.handle.index() < binding.count;
            if !in_range {
                log::error!("{} is outside the bindless array ({})", entry.handle, binding.count);
            }
            in_range
        })
        .map(|entry| {
            binding.write_image(
                dst_set,
                entry.handle.index(),
                vec![
                    vk::DescriptorImageInfo::default()
                        .image_view(entry.view)
                        .sampler(entry.sampler)
                        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                ],
            )
        })
        .collect()
}

/// The long-lived texture table.
///
/// A single update-after-bind, partially-bound set whose array elements mirror the texture pool:
/// texture `H` lives at element `H.index`. Shaders receive the indices through push constants.
pub struct BindlessManager {
    binding: GfxDescriptorBinding,
    layout: DescriptorSetLayoutHandle,
    pool: Option<GfxDescriptorPool>,
    set: Option<GfxDescriptorSet>,
}

// new & init
impl BindlessManager {
    /// The layout goes into `resources` so pipelines can name it by handle.
    pub fn new(resources: &mut ResourceManager) -> ResourceResult<Self> {
        let capacity = resources.texture_capacity();
        let binding = bindless_textures_binding(capacity);

        let layout = resources.create_descriptor_set_layout(&DescriptorSetLayoutDesc {
            bindings: vec![binding],
            flags: vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL,
            name: "bindless",
        })?;

        let layout_record = resources.descriptor_set_layout(layout)?;
        let pool = GfxDescriptorPool::new(
            &[vk::DescriptorPoolSize {
                ty: binding.descriptor_type,
                descriptor_count: capacity,
            }],
            1,
            vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND,
            "bindless",
        )?;
        let set = match GfxDescriptorSet::new(&pool, layout_record, "bindless") {
            Ok(set) => set,
            Err(e) => {
                pool.destroy();
                return Err(e.into());
            }
        };

        log::info!("bindless texture table: {} elements", capacity);
        Ok(Self {
            binding,
            layout,
            pool: Some(pool),
            set: Some(set),
        })
    }
}
// getters
impl BindlessManager {
    #[inline]
    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.layout
    }

    #[inline]
    pub fn set_handle(&self) -> vk::DescriptorSet {
        self.set.as_ref().map_or(vk::DescriptorSet::null(), GfxDescriptorSet::handle)
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.binding.count
    }
}
// update
impl BindlessManager {
    /// Writes the current view and sampler of every handle into its array element.
    ///
    /// Fails without writing anything when any handle is stale.
    pub fn update_texture_set(&self, resources: &ResourceManager, handles: &[TextureHandle]) -> Result<(), PoolError> {
        let _span = tracy_client::span!("BindlessManager::update_texture_set");

        let entries = handles
            .iter()
            .map(|handle| {
                let texture = resources.texture(*handle)?;
                let sampler = resources.sampler(texture.sampler())?;
                Ok(BindlessTextureEntry {
                    handle: *handle,
                    view: texture.view(),
                    sampler: sampler.handle(),
                })
            })
            .collect::<Result<Vec<_>, PoolError>>()?;

        let writes = plan_texture_writes(&self.binding, self.set_handle(), &entries);
        Gfx::get().gfx_device().write_descriptor_sets(&writes);
        Ok(())
    }
}
// destroy
impl BindlessManager {
    /// The layout is left to the resource manager.
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    pub fn destroy_mut(&mut self) {
        // sets from a non-freeable pool go away with the pool
        self.set.take();
        if let Some(pool) = self.pool.take() {
            pool.destroy();
        }
    }
}
impl Drop for BindlessManager {
    fn drop(&mut self) {
        debug_assert!(self.pool.is_none(), "BindlessManager dropped without destroy()");
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle as _;

    use super::*;
    use crate::handles::Handle;

    fn entry(index: u32, generation: u32, raw: u64) -> BindlessTextureEntry {
        BindlessTextureEntry {
            handle: Handle::new(index, generation),
            view: vk::ImageView::from_raw(raw),
            sampler: vk::Sampler::from_raw(raw + 1000),
        }
    }

    #[test]
    fn test_write_targets_handle_index() {
        let binding = bindless_textures_binding(16);
        let set = vk::DescriptorSet::from_raw(42);
        let entries = [entry(3, 0, 7), entry(0, 5, 8), entry(15, 1, 9)];

        let writes = plan_texture_writes(&binding, set, &entries);
        assert_eq!(writes.len(), 3);
        for (write, entry) in writes.iter().zip(&entries) {
            assert_eq!(write.dst_set, set);
            assert_eq!(write.dst_binding, 0);
            assert_eq!(write.dst_array_element, entry.handle.index());
            assert_eq!(write.descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
            assert_eq!(write.image_infos.len(), 1);
            assert_eq!(write.image_infos[0].image_view, entry.view);
            assert_eq!(write.image_infos[0].sampler, entry.sampler);
            assert_eq!(write.image_infos[0].image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        }
    }

    #[test]
    fn test_out_of_range_handle_skipped() {
        let binding = bindless_textures_binding(4);
        let writes = plan_texture_writes(&binding, vk::DescriptorSet::null(), &[entry(4, 0, 1), entry(1, 0, 2)]);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].dst_array_element, 1);
    }

    #[test]
    fn test_binding_flags() {
        let binding = bindless_textures_binding(8);
        assert!(binding.flags.contains(vk::DescriptorBindingFlags::PARTIALLY_BOUND));
        assert!(binding.flags.contains(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND));
        assert_eq!(binding.count, 8);
    }
}
