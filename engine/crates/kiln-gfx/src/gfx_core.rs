use std::sync::Arc;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::command_queue::GfxCommandQueue,
    error::GfxResult,
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance,
        physical_device::GfxPhysicalDevice,
    },
    swapchain::surface::GfxSurface,
};

/// Vulkan objects that live exactly as long as the process uses the GPU.
pub struct GfxCore {
    /// keeps the loaded vulkan library alive
    pub(crate) vk_entry: ash::Entry,
    pub(crate) instance: GfxInstance,
    pub(crate) surface: GfxSurface,
    pub(crate) physical_device: GfxPhysicalDevice,
    pub(crate) gfx_device: Arc<GfxDevice>,
    pub(crate) debug_utils: GfxDebugMsger,

    pub(crate) gfx_queue: GfxCommandQueue,
    pub(crate) present_queue: GfxCommandQueue,
    pub(crate) transfer_queue: GfxCommandQueue,
}

impl GfxCore {
    pub fn new(
        app_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxCore::new");

        let vk_entry = unsafe { ash::Entry::load()? };

        let surface_exts = ash_window::enumerate_required_extensions(raw_display_handle)?;
        let instance = GfxInstance::new(&vk_entry, app_name, "kiln", surface_exts)?;
        let debug_utils = GfxDebugMsger::new(&vk_entry, instance.ash_instance())?;
        let surface = GfxSurface::new(&vk_entry, instance.ash_instance(), raw_display_handle, raw_window_handle)?;
        let physical_device = GfxPhysicalDevice::select(instance.ash_instance(), &surface)?;

        let priorities = [1.0f32];
        let queue_create_infos = physical_device
            .unique_queue_families()
            .into_iter()
            .map(|family_idx| {
                vk::DeviceQueueCreateInfo::default().queue_family_index(family_idx).queue_priorities(&priorities)
            })
            .collect_vec();
        let gfx_device = Arc::new(GfxDevice::new(
            instance.ash_instance(),
            physical_device.vk_handle(),
            &queue_create_infos,
        )?);

        let gfx_queue = GfxCommandQueue::new(gfx_device.clone(), physical_device.gfx_queue_family.clone(), 0)?;
        let present_queue = GfxCommandQueue::new(gfx_device.clone(), physical_device.present_queue_family.clone(), 0)?;
        let transfer_queue =
            GfxCommandQueue::new(gfx_device.clone(), physical_device.transfer_queue_family.clone(), 0)?;

        gfx_device.set_debug_name(&physical_device, "main")?;
        gfx_device.set_debug_name(&surface, "main")?;

        Ok(Self {
            vk_entry,
            instance,
            surface,
            physical_device,
            gfx_device,
            debug_utils,
            gfx_queue,
            present_queue,
            transfer_queue,
        })
    }

    /// Reverse creation order. The allocator and every device child must be gone already.
    pub fn destroy(self) {
        let Self {
            vk_entry: _vk_entry,
            instance,
            surface,
            physical_device,
            gfx_device,
            debug_utils,
            gfx_queue,
            present_queue,
            transfer_queue,
        } = self;

        drop((gfx_queue, present_queue, transfer_queue));
        gfx_device.destroy();
        drop(gfx_device);
        physical_device.destroy();
        surface.destroy();
        debug_utils.destroy();
        instance.destroy();
    }
}
