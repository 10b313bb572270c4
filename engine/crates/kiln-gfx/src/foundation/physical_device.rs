use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::command_queue::GfxQueueFamily,
    error::{GfxError, GfxResult},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    swapchain::surface::GfxSurface,
};

/// The graphics, present and transfer families. They may coincide.
#[derive(Clone, Debug)]
pub struct QueueFamilySelection {
    pub graphics: u32,
    pub present: u32,
    pub transfer: u32,
}

/// One GPU, already checked against everything the renderer requires.
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) gfx_queue_family: GfxQueueFamily,
    pub(crate) present_queue_family: GfxQueueFamily,
    pub(crate) transfer_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// Picks a GPU that has the bindless descriptor features, synchronization2, the swapchain
    /// extension and a queue able to present to `surface`. Discrete GPUs win over the rest.
    ///
    /// Fails with the rejection reason of every enumerated device when none qualifies.
    pub fn select(instance: &ash::Instance, surface: &GfxSurface) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxPhysicalDevice::select");

        let pdevices = unsafe { instance.enumerate_physical_devices()? };

        let mut rejections = Vec::new();
        let mut candidates = Vec::new();
        for pdevice in pdevices {
            match Self::inspect(instance, surface, pdevice)? {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => rejections.push(reason),
            }
        }

        candidates
            .into_iter()
            .find_or_first(GfxPhysicalDevice::is_discrete_gpu)
            .inspect(|pdevice| log::info!("selected gpu: {}", pdevice.device_name()))
            .ok_or_else(|| GfxError::NoSuitableDevice(rejections.join("\n")))
    }

    /// Outer error: a Vulkan query failed. Inner error: the device is unsuitable, with the reason.
    fn inspect(
        instance: &ash::Instance,
        surface: &GfxSurface,
        pdevice: vk::PhysicalDevice,
    ) -> GfxResult<Result<Self, String>> {
        let basic_props = unsafe { instance.get_physical_device_properties(pdevice) };
        let name = device_name(&basic_props);
        log::info!("found gpu: {}", name);

        let device_exts = unsafe { instance.enumerate_device_extension_properties(pdevice)? };
        let missing_exts = missing_extensions(&GfxDevice::required_device_exts(), &device_exts);
        if !missing_exts.is_empty() {
            return Ok(Err(format!("{}: missing extensions {:?}", name, missing_exts)));
        }

        let mut indexing_features = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        let mut sync2_features = vk::PhysicalDeviceSynchronization2Features::default();
        {
            let mut features2 = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut indexing_features)
                .push_next(&mut sync2_features);
            unsafe { instance.get_physical_device_features2(pdevice, &mut features2) };
        }
        let missing_features = missing_bindless_features(&indexing_features, sync2_features.synchronization2);
        if !missing_features.is_empty() {
            return Ok(Err(format!("{}: missing features {:?}", name, missing_features)));
        }

        let queue_family_props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        log::debug!("{}: queue family props:\n{:#?}", name, queue_family_props);
        let present_support = (0..queue_family_props.len() as u32)
            .map(|family_idx| surface.supports_present(pdevice, family_idx))
            .collect::<GfxResult<Vec<_>>>()?;
        let Some(selection) = select_queue_families(&queue_family_props, &present_support) else {
            return Ok(Err(format!("{}: no graphics queue family able to present", name)));
        };

        let make_family = |name: &str, family_idx: u32| {
            let props = &queue_family_props[family_idx as usize];
            GfxQueueFamily {
                name: name.to_string(),
                queue_family_index: family_idx,
                queue_flags: props.queue_flags,
                queue_count: props.queue_count,
            }
        };

        Ok(Ok(Self {
            vk_handle: pdevice,
            basic_props,
            gfx_queue_family: make_family("gfx", selection.graphics),
            present_queue_family: make_family("present", selection.present),
            transfer_queue_family: make_family("transfer", selection.transfer),
        }))
    }

    pub fn destroy(self) {
        // nothing to release
    }
}
// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn is_discrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.basic_props
    }

    pub fn device_name(&self) -> String {
        device_name(&self.basic_props)
    }

    /// distinct family indices, one queue each
    pub fn unique_queue_families(&self) -> Vec<u32> {
        [
            self.gfx_queue_family.queue_family_index,
            self.present_queue_family.queue_family_index,
            self.transfer_queue_family.queue_family_index,
        ]
        .into_iter()
        .unique()
        .collect()
    }
}
impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}

fn device_name(props: &vk::PhysicalDeviceProperties) -> String {
    props.device_name_as_c_str().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Names from `required` that `available` does not list
pub fn missing_extensions(required: &[&'static CStr], available: &[vk::ExtensionProperties]) -> Vec<String> {
    required
        .iter()
        .filter(|ext| !available.iter().any(|props| props.extension_name_as_c_str().is_ok_and(|name| name == **ext)))
        .map(|ext| ext.to_string_lossy().into_owned())
        .collect()
}

/// Features the bindless table and the submit path cannot live without
pub fn missing_bindless_features(
    indexing: &vk::PhysicalDeviceDescriptorIndexingFeatures<'_>,
    synchronization2: vk::Bool32,
) -> Vec<&'static str> {
    let checks = [
        (indexing.descriptor_binding_partially_bound, "descriptorBindingPartiallyBound"),
        (indexing.runtime_descriptor_array, "runtimeDescriptorArray"),
        (indexing.descriptor_binding_sampled_image_update_after_bind, "descriptorBindingSampledImageUpdateAfterBind"),
        (indexing.shader_sampled_image_array_non_uniform_indexing, "shaderSampledImageArrayNonUniformIndexing"),
        (synchronization2, "synchronization2"),
    ];
    checks.into_iter().filter(|(supported, _)| *supported != vk::TRUE).map(|(_, name)| name).collect()
}

/// - graphics: first family with GRAPHICS, preferring one that can also present
/// - present: the graphics family if it can present, else the first presenting family
/// - transfer: a dedicated transfer-only family when there is one, else the graphics family
pub fn select_queue_families(
    props: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> Option<QueueFamilySelection> {
    let can_present = |idx: usize| present_support.get(idx).copied().unwrap_or(false);
    let is_graphics = |p: &vk::QueueFamilyProperties| p.queue_flags.contains(vk::QueueFlags::GRAPHICS);

    let graphics = props
        .iter()
        .enumerate()
        .filter(|(_, p)| is_graphics(p))
        .find_or_first(|(idx, _)| can_present(*idx))
        .map(|(idx, _)| idx)?;

    let present = if can_present(graphics) { Some(graphics) } else { (0..props.len()).find(|idx| can_present(*idx)) }?;

    let transfer = props
        .iter()
        .position(|p| {
            p.queue_flags.contains(vk::QueueFlags::TRANSFER)
                && !p.queue_flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        })
        .unwrap_or(graphics);

    Some(QueueFamilySelection {
        graphics: graphics as u32,
        present: present as u32,
        transfer: transfer as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn ext(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = *src as std::ffi::c_char;
        }
        props
    }

    #[test]
    fn test_unified_queue_family() {
        let all = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
        let selection = select_queue_families(&[family(all)], &[true]).unwrap();
        assert_eq!((selection.graphics, selection.present, selection.transfer), (0, 0, 0));
    }

    #[test]
    fn test_dedicated_transfer_and_separate_present() {
        let props = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];
        let selection = select_queue_families(&props, &[false, false, true]).unwrap();
        assert_eq!(selection.graphics, 0);
        assert_eq!(selection.present, 2);
        assert_eq!(selection.transfer, 1);
    }

    #[test]
    fn test_graphics_family_that_presents_is_preferred() {
        let props = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::GRAPHICS)];
        let selection = select_queue_families(&props, &[false, true]).unwrap();
        assert_eq!(selection.graphics, 1);
        assert_eq!(selection.present, 1);
    }

    #[test]
    fn test_no_present_support() {
        let props = [family(vk::QueueFlags::GRAPHICS)];
        assert!(select_queue_families(&props, &[false]).is_none());
    }

    #[test]
    fn test_missing_extensions() {
        let available = [ext(ash::khr::swapchain::NAME)];
        assert!(missing_extensions(&[ash::khr::swapchain::NAME], &available).is_empty());
        assert_eq!(missing_extensions(&[ash::khr::swapchain::NAME], &[]), vec!["VK_KHR_swapchain".to_string()]);
    }

    #[test]
    fn test_missing_bindless_features() {
        let none = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        assert_eq!(missing_bindless_features(&none, vk::FALSE).len(), 5);

        let all = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
            .descriptor_binding_partially_bound(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_sampled_image_update_after_bind(true)
            .shader_sampled_image_array_non_uniform_indexing(true);
        assert!(missing_bindless_features(&all, vk::TRUE).is_empty());
        assert_eq!(missing_bindless_features(&all, vk::FALSE), vec!["synchronization2"]);
    }
}
