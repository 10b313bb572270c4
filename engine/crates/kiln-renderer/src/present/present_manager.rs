use ash::vk;
use itertools::Itertools;
use kiln_gfx::{
    commands::semaphore::GfxSemaphore,
    error::GfxResult,
    gfx::Gfx,
    swapchain::render_swapchain::{GfxRenderSwapchain, SwapchainStatus},
};
use kiln_render_interface::{
    bindless_manager::BindlessManager,
    handles::{SamplerHandle, TextureHandle},
    pipeline_settings::DefaultRendererSettings,
    resource_manager::ResourceManager,
};

use crate::{
    error::RendererResult,
    present::{
        render_passes::RenderPasses,
        render_targets::{ImageTargets, RenderTargets},
        resize_tracker::ResizeTracker,
    },
};

/// Device/swapchain side of the renderer: the swapchain, the three render passes, the
/// per-image targets and the resize protocol.
///
/// Each viewport image is also a bindless texture, so the composite pass (and any editor panel)
/// can sample it by index through [`Self::viewport_texture`].
pub struct PresentManager {
    swapchain: GfxRenderSwapchain,
    present_mode: vk::PresentModeKHR,
    depth_format: vk::Format,

    passes: RenderPasses,
    targets: RenderTargets,
    /// one per swapchain image; a semaphore is only reused once its image is acquired again
    render_finished: Vec<GfxSemaphore>,

    viewport_sampler: SamplerHandle,
    viewport_textures: Vec<TextureHandle>,

    tracker: ResizeTracker,
}

// new & init
impl PresentManager {
    pub fn new(
        resources: &mut ResourceManager,
        bindless: &BindlessManager,
        viewport_sampler: SamplerHandle,
        window_extent: vk::Extent2D,
        present_mode: vk::PresentModeKHR,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("PresentManager::new");

        let depth_format = Gfx::get().find_supported_format(
            DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let swapchain = GfxRenderSwapchain::new(
            present_mode,
            DefaultRendererSettings::DEFAULT_SURFACE_FORMAT,
            window_extent,
            None,
        )?;
        let passes = RenderPasses::new(swapchain.color_format(), depth_format)?;
        let targets = RenderTargets::new(
            swapchain.images(),
            swapchain.color_format(),
            swapchain.extent(),
            depth_format,
            &passes,
        )?;
        let render_finished = Self::create_render_finished(swapchain.images().len())?;
        log::info!("depth format {:?}, swapchain format {:?}", depth_format, swapchain.color_format());

        let mut present = Self {
            swapchain,
            present_mode,
            depth_format,
            passes,
            targets,
            render_finished,
            viewport_sampler,
            viewport_textures: Vec::new(),
            tracker: ResizeTracker::new(window_extent),
        };
        present.register_viewport_textures(resources, bindless)?;
        Ok(present)
    }

    fn create_render_finished(image_count: usize) -> GfxResult<Vec<GfxSemaphore>> {
        let device = Gfx::get().gfx_device();
        (0..image_count)
            .map(|i| GfxSemaphore::new(device.clone(), &format!("render-finished-{}", i)))
            .collect()
    }

    fn register_viewport_textures(
        &mut self,
        resources: &mut ResourceManager,
        bindless: &BindlessManager,
    ) -> RendererResult<()> {
        debug_assert!(self.viewport_textures.is_empty());
        let extent = self.swapchain.extent();
        for (image_index, targets) in self.targets.iter().enumerate() {
            let handle = resources.register_texture(
                targets.viewport_view(),
                extent,
                DefaultRendererSettings::VIEWPORT_FORMAT,
                self.viewport_sampler,
                &format!("viewport-{image_index}"),
            )?;
            self.viewport_textures.push(handle);
        }
        bindless.update_texture_set(resources, &self.viewport_textures)?;
        log::debug!(
            "viewport textures: {}",
            self.viewport_textures.iter().map(ToString::to_string).join(", ")
        );
        Ok(())
    }
}
// getters
impl PresentManager {
    #[inline]
    pub fn passes(&self) -> &RenderPasses {
        &self.passes
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.images().len()
    }

    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.swapchain.current_image_index()
    }

    #[inline]
    pub fn targets(&self, image_index: usize) -> &ImageTargets {
        self.targets.image(image_index)
    }

    #[inline]
    pub fn render_finished(&self, image_index: usize) -> &GfxSemaphore {
        &self.render_finished[image_index]
    }

    /// The viewport image of `image_index` as a bindless texture.
    #[inline]
    pub fn viewport_texture(&self, image_index: usize) -> Option<TextureHandle> {
        self.viewport_textures.get(image_index).copied()
    }

    #[inline]
    pub fn tracker(&self) -> &ResizeTracker {
        &self.tracker
    }

    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.tracker.needs_rebuild()
    }
}
// update
impl PresentManager {
    pub fn notify_resized(&mut self, window_extent: vk::Extent2D) {
        self.tracker.notify_resized(window_extent);
    }

    pub fn acquire(&mut self, image_available: &GfxSemaphore) -> GfxResult<SwapchainStatus> {
        let _span = tracy_client::span!("PresentManager::acquire");
        let status = self.swapchain.acquire_next_image(image_available)?;
        self.tracker.notify_swapchain_status(status);
        Ok(status)
    }

    pub fn present(&mut self) -> GfxResult<SwapchainStatus> {
        let _span = tracy_client::span!("PresentManager::present");
        let image_index = self.swapchain.current_image_index();
        let status = self
            .swapchain
            .present_image(Gfx::get().present_queue(), &[&self.render_finished[image_index]])?;
        self.tracker.notify_swapchain_status(status);
        Ok(status)
    }

    /// Runs the resize protocol when a rebuild is pending. The caller must have waited for the
    /// device to go idle.
    ///
    /// Returns whether a frame can be rendered; `false` while the window has no area.
    pub fn rebuild_if_needed(
        &mut self,
        resources: &mut ResourceManager,
        bindless: &BindlessManager,
    ) -> RendererResult<bool> {
        if !self.tracker.needs_rebuild() {
            return Ok(true);
        }
        let Some(window_extent) = self.tracker.idle_reached() else {
            return Ok(false);
        };
        let _span = tracy_client::span!("PresentManager::rebuild");

        // teardown: everything derived from the old swapchain
        for handle in self.viewport_textures.drain(..) {
            resources.destroy_texture(handle)?;
        }
        self.targets.teardown();
        for semaphore in self.render_finished.drain(..) {
            semaphore.destroy();
        }
        self.tracker.teardown_done();

        // rebuild
        let swapchain = GfxRenderSwapchain::new(
            self.present_mode,
            DefaultRendererSettings::DEFAULT_SURFACE_FORMAT,
            window_extent,
            Some(&self.swapchain),
        )?;
        std::mem::replace(&mut self.swapchain, swapchain).destroy();

        if !self.passes.matches_swapchain_format(self.swapchain.color_format()) {
            log::warn!("swapchain format changed to {:?}, recreating passes", self.swapchain.color_format());
            let passes = RenderPasses::new(self.swapchain.color_format(), self.depth_format)?;
            std::mem::replace(&mut self.passes, passes).destroy();
        }
        self.targets.rebuild(
            self.swapchain.images(),
            self.swapchain.color_format(),
            self.swapchain.extent(),
            self.depth_format,
            &self.passes,
        )?;
        self.render_finished = Self::create_render_finished(self.swapchain.images().len())?;
        self.register_viewport_textures(resources, bindless)?;

        self.tracker.rebuild_done();
        Ok(true)
    }
}
// destroy
impl PresentManager {
    /// The device must be idle.
    pub fn destroy(mut self, resources: &mut ResourceManager) -> RendererResult<()> {
        for handle in self.viewport_textures.drain(..) {
            resources.destroy_texture(handle)?;
        }
        self.targets.teardown();
        for semaphore in self.render_finished.drain(..) {
            semaphore.destroy();
        }
        self.passes.destroy();
        self.swapchain.destroy();
        Ok(())
    }
}
