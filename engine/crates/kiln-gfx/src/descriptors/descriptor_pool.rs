use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    flags: vk::DescriptorPoolCreateFlags,
}

impl GfxDescriptorPool {
    pub fn new(
        pool_sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let create_info =
            vk::DescriptorPoolCreateInfo::default().pool_sizes(pool_sizes).max_sets(max_sets).flags(flags);
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_descriptor_pool(&create_info, None)? };
        let pool = Self { handle, flags };
        if let Err(e) = gfx_device.set_debug_name(&pool, debug_name) {
            pool.destroy();
            return Err(e);
        }
        Ok(pool)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    /// Sets may be freed one by one only with FREE_DESCRIPTOR_SET.
    #[inline]
    pub fn can_free_sets(&self) -> bool {
        self.flags.contains(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
    }

    /// Frees every set allocated from the pool.
    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_descriptor_pool(self.handle, None) };
    }
}
impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
