use std::ops::Deref;

use ash::vk;

use crate::error::GfxResult;

/// vk-mem allocator. Must be dropped before the device it was created from.
pub struct GfxMemAllocator {
    allocator: vk_mem::Allocator,
}

impl GfxMemAllocator {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &ash::Device) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxMemAllocator::new");

        let mut allocator_ci = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        allocator_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let allocator = unsafe { vk_mem::Allocator::new(allocator_ci)? };
        Ok(Self { allocator })
    }
}

impl Deref for GfxMemAllocator {
    type Target = vk_mem::Allocator;

    fn deref(&self) -> &Self::Target {
        &self.allocator
    }
}

impl Drop for GfxMemAllocator {
    fn drop(&mut self) {
        log::info!("destroying GfxMemAllocator");
    }
}
