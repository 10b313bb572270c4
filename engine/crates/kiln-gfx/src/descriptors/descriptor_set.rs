use ash::vk;

use crate::{
    descriptors::{descriptor_pool::GfxDescriptorPool, descriptor_set_layout::GfxDescriptorSetLayout},
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

pub struct GfxDescriptorSet {
    handle: vk::DescriptorSet,
    pool: vk::DescriptorPool,
    freeable: bool,
}

impl GfxDescriptorSet {
    pub fn new(
        pool: &GfxDescriptorPool,
        layout: &GfxDescriptorSetLayout,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(pool.handle()).set_layouts(&layouts);
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.allocate_descriptor_sets(&alloc_info)?[0] };
        let set = Self {
            handle,
            pool: pool.handle(),
            freeable: pool.can_free_sets(),
        };
        gfx_device.set_debug_name(&set, debug_name)?;
        Ok(set)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }

    /// Returns the set to a FREE_DESCRIPTOR_SET pool; other pools reclaim their sets on destroy.
    pub fn destroy(self) -> GfxResult<()> {
        if self.freeable {
            unsafe { Gfx::get().gfx_device().free_descriptor_sets(self.pool, &[self.handle])? };
        }
        Ok(())
    }
}
impl DebugType for GfxDescriptorSet {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSet"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
