use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType};

/// Window surface. Created together with the instance, since device selection needs to know which
/// queue family can present to it.
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

// new & init
impl GfxSurface {
    pub fn new(
        vk_entry: &ash::Entry,
        instance: &ash::Instance,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let surface_pf = ash::khr::surface::Instance::new(vk_entry, instance);
        let surface =
            unsafe { ash_window::create_surface(vk_entry, instance, raw_display_handle, raw_window_handle, None)? };

        Ok(Self {
            handle: surface,
            pf: surface_pf,
        })
    }
}
// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn capabilities(&self, pdevice: vk::PhysicalDevice) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        Ok(unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle)? })
    }

    pub fn formats(&self, pdevice: vk::PhysicalDevice) -> GfxResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle)? })
    }

    pub fn present_modes(&self, pdevice: vk::PhysicalDevice) -> GfxResult<Vec<vk::PresentModeKHR>> {
        Ok(unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle)? })
    }

    pub fn supports_present(&self, pdevice: vk::PhysicalDevice, queue_family_index: u32) -> GfxResult<bool> {
        Ok(unsafe { self.pf.get_physical_device_surface_support(pdevice, queue_family_index, self.handle)? })
    }
}
// destroy
impl GfxSurface {
    pub fn destroy(self) {
        log::info!("destroying GfxSurface");
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
