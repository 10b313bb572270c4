use std::sync::Arc;

use ash::vk;

use crate::{
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// Binary semaphore for GPU-GPU ordering (acquire -> render -> present).
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
    device: Arc<GfxDevice>,
}

impl GfxSemaphore {
    pub fn new(device: Arc<GfxDevice>, debug_name: &str) -> GfxResult<Self> {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };
        let semaphore = Self { semaphore, device };
        semaphore.device.set_debug_name(&semaphore, debug_name)?;
        Ok(semaphore)
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    pub fn destroy(self) {
        unsafe { self.device.destroy_semaphore(self.semaphore, None) };
    }
}
impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}
