use std::{
    ffi::{CStr, CString},
    ops::Deref,
    sync::atomic::{AtomicBool, Ordering},
};

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    utilities::descriptor_cursor::GfxWriteDescriptorSet,
};

/// Logical device plus the extension loaders the renderer uses.
///
/// Shared between the main thread and the recording workers through an `Arc`; workers only use it
/// to record commands, never to create or destroy objects.
pub struct GfxDevice {
    pub(crate) device: ash::Device,
    pub(crate) debug_utils: ash::ext::debug_utils::Device,
    pub(crate) swapchain: ash::khr::swapchain::Device,

    destroyed: AtomicBool,
}

// new & init
impl GfxDevice {
    pub fn new(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        queue_create_infos: &[vk::DeviceQueueCreateInfo],
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxDevice::new");

        let device_exts = Self::required_device_exts();
        log::info!("device exts: {}", device_exts.iter().map(|ext| format!("\n\t{:?}", ext)).join(""));
        let device_ext_ptrs = device_exts.iter().map(|ext| ext.as_ptr()).collect_vec();

        let mut indexing_features = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
            .descriptor_binding_partially_bound(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .shader_sampled_image_array_non_uniform_indexing(true);
        let mut sync2_features = vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true);
        let mut all_features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut indexing_features)
            .push_next(&mut sync2_features);

        let device_ci = vk::DeviceCreateInfo::default()
            .queue_create_infos(queue_create_infos)
            .enabled_extension_names(&device_ext_ptrs)
            .push_next(&mut all_features);

        let device = unsafe { instance.create_device(pdevice, &device_ci, None)? };

        let debug_utils = ash::ext::debug_utils::Device::new(instance, &device);
        let swapchain = ash::khr::swapchain::Device::new(instance, &device);

        Ok(Self {
            device,
            debug_utils,
            swapchain,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Every candidate GPU is checked against this list before the device is created.
    pub fn required_device_exts() -> Vec<&'static CStr> {
        vec![ash::khr::swapchain::NAME]
    }
}
// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn debug_utils(&self) -> &ash::ext::debug_utils::Device {
        &self.debug_utils
    }

    #[inline]
    pub fn swapchain(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain
    }
}
// tools
impl GfxDevice {
    #[inline]
    pub fn write_descriptor_sets(&self, writes: &[GfxWriteDescriptorSet]) {
        GfxWriteDescriptorSet::with_writes(writes, |writes| unsafe {
            self.device.update_descriptor_sets(writes, &[]);
        })
    }

    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: impl AsRef<str>) -> GfxResult<()> {
        let name = CString::new(name.as_ref()).map_err(|_| GfxError::DebugName(name.as_ref().to_string()))?;
        unsafe {
            self.debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
            )?;
        }
        Ok(())
    }

    /// Names the object `<TypeName>::<name>` in validation messages and captures.
    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) -> GfxResult<()> {
        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        let debug_name = CString::new(debug_name.as_str()).map_err(|_| GfxError::DebugName(debug_name.clone()))?;
        unsafe {
            self.debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_name(debug_name.as_c_str())
                    .object_handle(handle.vk_handle()),
            )?;
        }
        Ok(())
    }

    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}
// destroy
impl GfxDevice {
    pub fn destroy(&self) {
        log::info!("destroying GfxDevice");
        if self.destroyed.swap(true, Ordering::AcqRel) {
            log::warn!("GfxDevice destroyed twice");
            return;
        }
        unsafe { self.device.destroy_device(None) };
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        debug_assert!(self.destroyed.load(Ordering::Acquire), "GfxDevice dropped without destroy()");
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
