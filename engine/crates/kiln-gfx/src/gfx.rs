use std::sync::Arc;

use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        fence::GfxFence, submit_info::GfxSubmitInfo,
    },
    error::{GfxError, GfxResult},
    foundation::{
        device::GfxDevice, instance::GfxInstance, mem_allocator::GfxMemAllocator,
        physical_device::GfxPhysicalDevice,
    },
    gfx_core::GfxCore,
    swapchain::surface::GfxSurface,
};

static mut G_GFX: Option<Gfx> = None;

/// Process-wide GPU context.
///
/// Written only by [`Gfx::init`] and [`Gfx::destroy`] on the main thread. Between the two it is
/// read-only, which is what makes [`Gfx::get`] usable from recording workers.
pub struct Gfx {
    gfx_core: GfxCore,

    /// `Option` so teardown can drop it before the device goes away
    allocator: Option<GfxMemAllocator>,

    /// one-shot uploads and layout transitions
    temp_graphics_command_pool: GfxCommandPool,
}

// new & init & destroy
impl Gfx {
    pub fn init(
        app_name: &str,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::init");

        let gfx_core = GfxCore::new(app_name, raw_display_handle, raw_window_handle)?;
        let allocator = GfxMemAllocator::new(
            gfx_core.instance.ash_instance(),
            gfx_core.physical_device.vk_handle(),
            gfx_core.gfx_device.ash_device(),
        )?;
        let temp_graphics_command_pool = GfxCommandPool::new(
            gfx_core.gfx_device.clone(),
            gfx_core.gfx_queue.queue_family().queue_family_index,
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-temp-graphics",
        )?;

        let gfx = Self {
            gfx_core,
            allocator: Some(allocator),
            temp_graphics_command_pool,
        };
        unsafe {
            let slot = &mut *(&raw mut G_GFX);
            if slot.is_some() {
                log::warn!("Gfx::init called twice; replacing the old context");
            }
            *slot = Some(gfx);
        }
        Ok(())
    }

    /// # Panics
    /// When called outside the `init`..`destroy` window.
    #[inline]
    pub fn get() -> &'static Gfx {
        match unsafe { (*(&raw const G_GFX)).as_ref() } {
            Some(gfx) => gfx,
            None => panic!("Gfx::get() outside Gfx::init()..Gfx::destroy()"),
        }
    }

    /// Every object created through the context must have been destroyed already.
    pub fn destroy() {
        let Some(gfx) = (unsafe { (*(&raw mut G_GFX)).take() }) else {
            log::warn!("Gfx::destroy without a live context");
            return;
        };
        let Gfx {
            gfx_core,
            allocator,
            temp_graphics_command_pool,
        } = gfx;

        temp_graphics_command_pool.destroy();
        drop(allocator);
        gfx_core.destroy();
    }
}
// getters
impl Gfx {
    #[inline]
    pub fn gfx_device(&self) -> &Arc<GfxDevice> {
        &self.gfx_core.gfx_device
    }

    #[inline]
    pub fn allocator(&self) -> &vk_mem::Allocator {
        match &self.allocator {
            Some(allocator) => &**allocator,
            None => unreachable!("allocator lives until Gfx::destroy"),
        }
    }

    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.gfx_core.instance
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.gfx_core.physical_device
    }

    #[inline]
    pub fn surface(&self) -> &GfxSurface {
        &self.gfx_core.surface
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.gfx_queue
    }

    #[inline]
    pub fn present_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.present_queue
    }

    #[inline]
    pub fn transfer_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.transfer_queue
    }
}
// tools
impl Gfx {
    /// Records `func` into a throwaway command buffer, submits it to the graphics queue and blocks
    /// until it finishes.
    pub fn one_time_exec<F, R>(&self, func: F, name: &str) -> GfxResult<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let _span = tracy_client::span!("one_time_exec");

        let command_buffer = self.temp_graphics_command_pool.alloc_primary(name)?;
        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name)?;
        let result = func(&command_buffer);
        command_buffer.end()?;

        let fence = GfxFence::new(self.gfx_device().clone(), false, name)?;
        let submitted = self
            .gfx_queue()
            .submit(vec![GfxSubmitInfo::new(&[&command_buffer])], Some(&fence))
            .and_then(|_| fence.wait());
        fence.destroy();
        command_buffer.free();
        submitted?;

        Ok(result)
    }

    /// First candidate whose format properties contain `features` for `tiling`.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> GfxResult<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|format| {
                let props = unsafe {
                    self.instance()
                        .ash_instance()
                        .get_physical_device_format_properties(self.physical_device().vk_handle(), *format)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .ok_or_else(|| GfxError::NoSupportedFormat(candidates.to_vec()))
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        self.gfx_device().wait_idle()
    }
}
