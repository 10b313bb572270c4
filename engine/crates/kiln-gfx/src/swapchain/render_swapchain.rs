use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    error::{GfxError, GfxResult},
    gfx::Gfx,
};

/// Result of an acquire or a present. Only `Optimal` leaves the swapchain alone; the other two
/// send the renderer into its resize path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapchainStatus {
    Optimal,
    /// usable this frame, but should be rebuilt afterwards
    Suboptimal,
    /// unusable: nothing may be presented until it is rebuilt
    OutOfDate,
}

impl SwapchainStatus {
    #[inline]
    pub fn needs_rebuild(self) -> bool {
        self != SwapchainStatus::Optimal
    }
}

/// `minImageCount + 1`, capped by `maxImageCount` when the surface has a cap (non-zero).
pub fn swapchain_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count == 0 { wanted } else { wanted.min(caps.max_image_count) }
}

/// The surface extent, or the window extent clamped to the surface limits when the surface lets
/// the swapchain decide (`current_extent == u32::MAX`).
pub fn calculate_swapchain_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    let surface_extent = caps.current_extent;
    if surface_extent.width == u32::MAX || surface_extent.height == u32::MAX {
        vk::Extent2D {
            width: window_extent.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    } else {
        surface_extent
    }
}

/// `preferred` when available; FIFO is always available and is the fallback.
pub fn choose_present_mode(available: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
    if available.contains(&preferred) { preferred } else { vk::PresentModeKHR::FIFO }
}

/// `preferred` when available, otherwise the first format the surface reports.
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .copied()
        .find(|format| format.format == preferred.format && format.color_space == preferred.color_space)
        .or_else(|| available.first().copied())
}

fn status_from_result(result: Result<bool, vk::Result>, what: &str) -> GfxResult<SwapchainStatus> {
    match result {
        Ok(false) => Ok(SwapchainStatus::Optimal),
        Ok(true) => {
            log::warn!("swapchain is suboptimal on {}", what);
            Ok(SwapchainStatus::Suboptimal)
        }
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
            log::warn!("swapchain is out of date on {}", what);
            Ok(SwapchainStatus::OutOfDate)
        }
        Err(e) => Err(e.into()),
    }
}

pub struct GfxRenderSwapchain {
    handle: vk::SwapchainKHR,

    images: Vec<vk::Image>,
    image_index: u32,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

// new & init
impl GfxRenderSwapchain {
    /// `window_extent` must be non-zero; the caller holds off while the window is minimized.
    pub fn new(
        preferred_present_mode: vk::PresentModeKHR,
        preferred_surface_format: vk::SurfaceFormatKHR,
        window_extent: vk::Extent2D,
        old_swapchain: Option<&GfxRenderSwapchain>,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxRenderSwapchain::new");

        let gfx = Gfx::get();
        let surface = gfx.surface();
        let pdevice = gfx.physical_device().vk_handle();

        let caps = surface.capabilities(pdevice)?;
        let extent = calculate_swapchain_extent(&caps, window_extent);
        let present_mode = choose_present_mode(&surface.present_modes(pdevice)?, preferred_present_mode);
        let surface_formats = surface.formats(pdevice)?;
        let surface_format = choose_surface_format(&surface_formats, preferred_surface_format)
            .ok_or_else(|| GfxError::NoSupportedFormat(vec![preferred_surface_format.format]))?;
        let image_count = swapchain_image_count(&caps);

        log::info!(
            "create swapchain: surface extent {}x{} (min {}x{}, max {}x{}), window {}x{}, final {}x{}, {} images, {:?}, {:?}",
            caps.current_extent.width,
            caps.current_extent.height,
            caps.min_image_extent.width,
            caps.min_image_extent.height,
            caps.max_image_extent.width,
            caps.max_image_extent.height,
            window_extent.width,
            window_extent.height,
            extent.width,
            extent.height,
            image_count,
            present_mode,
            surface_format.format,
        );

        let queue_families = [
            gfx.gfx_queue().queue_family().queue_family_index,
            gfx.present_queue().queue_family().queue_family_index,
        ];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.map_or(vk::SwapchainKHR::null(), |old| old.handle));
        create_info = if queue_families[0] == queue_families[1] {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::CONCURRENT).queue_family_indices(&queue_families)
        };

        let gfx_device = gfx.gfx_device();
        let handle = unsafe { gfx_device.swapchain().create_swapchain(&create_info, None)? };
        let images = match unsafe { gfx_device.swapchain().get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { gfx_device.swapchain().destroy_swapchain(handle, None) };
                return Err(e.into());
            }
        };

        let swapchain = Self {
            handle,
            images,
            image_index: 0,
            surface_format,
            present_mode,
            extent,
        };
        let named = gfx_device.set_object_debug_name(handle, "GfxSwapchain::main").and_then(|_| {
            swapchain.images.iter().enumerate().try_for_each(|(idx, image)| {
                gfx_device.set_object_debug_name(*image, format!("GfxSwapchain::image-{}", idx))
            })
        });
        if let Err(e) = named {
            swapchain.destroy();
            return Err(e);
        }
        Ok(swapchain)
    }
}
// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.surface_format.format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.image_index as usize
    }
}
// update
impl GfxRenderSwapchain {
    /// Blocks until an image is available. On `OutOfDate` the current index is left unchanged.
    pub fn acquire_next_image(&mut self, signal_semaphore: &GfxSemaphore) -> GfxResult<SwapchainStatus> {
        let _span = tracy_client::span!("acquire_next_image");
        let result = unsafe {
            Gfx::get().gfx_device().swapchain().acquire_next_image(
                self.handle,
                u64::MAX,
                signal_semaphore.handle(),
                vk::Fence::null(),
            )
        };
        let result = result.map(|(image_index, suboptimal)| {
            self.image_index = image_index;
            suboptimal
        });
        status_from_result(result, "acquire")
    }

    pub fn present_image(&self, queue: &GfxCommandQueue, wait_semaphores: &[&GfxSemaphore]) -> GfxResult<SwapchainStatus> {
        let _span = tracy_client::span!("present_image");
        let wait_semaphores = wait_semaphores.iter().map(|semaphore| semaphore.handle()).collect_vec();
        let image_indices = [self.image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.handle));

        let result = unsafe { Gfx::get().gfx_device().swapchain().queue_present(queue.handle(), &present_info) };
        status_from_result(result, "present")
    }
}
// destroy
impl GfxRenderSwapchain {
    pub fn destroy(mut self) {
        unsafe { Gfx::get().gfx_device().swapchain().destroy_swapchain(self.handle, None) };
        self.handle = vk::SwapchainKHR::null();
    }
}
impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null(), "GfxRenderSwapchain dropped without destroy()");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_image_count() {
        assert_eq!(swapchain_image_count(&caps(2, 0)), 3);
        assert_eq!(swapchain_image_count(&caps(2, 8)), 3);
        assert_eq!(swapchain_image_count(&caps(3, 3)), 3);
    }

    #[test]
    fn test_extent_follows_window_when_surface_is_undefined() {
        let extent = calculate_swapchain_extent(&caps(2, 0), vk::Extent2D { width: 800, height: 600 });
        assert_eq!((extent.width, extent.height), (800, 600));

        let clamped = calculate_swapchain_extent(&caps(2, 0), vk::Extent2D { width: 9000, height: 0 });
        assert_eq!((clamped.width, clamped.height), (4096, 1));
    }

    #[test]
    fn test_extent_follows_surface_when_defined() {
        let mut surface_caps = caps(2, 0);
        surface_caps.current_extent = vk::Extent2D { width: 1280, height: 720 };
        let extent = calculate_swapchain_extent(&surface_caps, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn test_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], vk::PresentModeKHR::MAILBOX), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_surface_format_choice() {
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[unorm, srgb], srgb), Some(srgb));
        assert_eq!(choose_surface_format(&[unorm], srgb), Some(unorm));
        assert_eq!(choose_surface_format(&[], srgb), None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_from_result(Ok(false), "t").unwrap(), SwapchainStatus::Optimal);
        assert_eq!(status_from_result(Ok(true), "t").unwrap(), SwapchainStatus::Suboptimal);
        assert_eq!(status_from_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), "t").unwrap(), SwapchainStatus::OutOfDate);
        assert!(status_from_result(Err(vk::Result::ERROR_DEVICE_LOST), "t").is_err());
        assert!(SwapchainStatus::Suboptimal.needs_rebuild());
        assert!(!SwapchainStatus::Optimal.needs_rebuild());
    }
}
