use std::sync::Arc;

use ash::vk;

use crate::{
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// No `Drop`: the frame slots hand fences around by value, so destruction is explicit.
pub struct GfxFence {
    fence: vk::Fence,
    device: Arc<GfxDevice>,
}

// new & destroy
impl GfxFence {
    /// `signaled`: created already signaled, so the first wait of a fresh frame slot returns at once
    pub fn new(device: Arc<GfxDevice>, signaled: bool, debug_name: &str) -> GfxResult<Self> {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None)? };

        let fence = Self { fence, device };
        fence.device.set_debug_name(&fence, debug_name)?;
        Ok(fence)
    }

    pub fn destroy(self) {
        unsafe { self.device.destroy_fence(self.fence, None) };
    }
}
// getters
impl GfxFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}
// tools
impl GfxFence {
    /// Blocks without a timeout.
    pub fn wait(&self) -> GfxResult<()> {
        unsafe { self.device.wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX)? };
        Ok(())
    }

    pub fn reset(&self) -> GfxResult<()> {
        unsafe { self.device.reset_fences(std::slice::from_ref(&self.fence))? };
        Ok(())
    }

    pub fn is_signaled(&self) -> GfxResult<bool> {
        Ok(unsafe { self.device.get_fence_status(self.fence)? })
    }
}
impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.fence
    }
}
