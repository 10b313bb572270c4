use std::sync::Arc;

use ash::vk;

use crate::{
    commands::command_buffer::GfxCommandBuffer,
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// A command pool may only be used by one thread at a time. The renderer gives each recording lane
/// its own pool per frame slot, so no pool is ever locked.
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    queue_family_index: u32,
    device: Arc<GfxDevice>,
}

// new & init
impl GfxCommandPool {
    pub fn new(
        device: Arc<GfxDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index).flags(flags),
                None,
            )?
        };
        let pool = Self {
            handle: pool,
            queue_family_index,
            device,
        };
        pool.device.set_debug_name(&pool, debug_name)?;
        Ok(pool)
    }
}
// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}
// tools
impl GfxCommandPool {
    /// Resets every buffer allocated from the pool; the caller must have waited on the fence that
    /// covers their last submission.
    pub fn reset(&self) -> GfxResult<()> {
        unsafe { self.device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::RELEASE_RESOURCES)? };
        Ok(())
    }

    pub fn alloc_primary(&self, debug_name: &str) -> GfxResult<GfxCommandBuffer> {
        GfxCommandBuffer::new(self, vk::CommandBufferLevel::PRIMARY, debug_name)
    }

    pub fn alloc_secondary(&self, debug_name: &str) -> GfxResult<GfxCommandBuffer> {
        GfxCommandBuffer::new(self, vk::CommandBufferLevel::SECONDARY, debug_name)
    }

    #[inline]
    pub(crate) fn device(&self) -> &Arc<GfxDevice> {
        &self.device
    }
}
// destroy
impl GfxCommandPool {
    /// Frees every command buffer allocated from it.
    pub fn destroy(self) {
        unsafe { self.device.destroy_command_pool(self.handle, None) };
    }
}
impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
