use std::sync::Arc;

use ash::vk;
use itertools::Itertools;
use kiln_gfx::{
    commands::{command_buffer::GfxCommandBuffer, submit_info::GfxSubmitInfo},
    gfx::Gfx,
    swapchain::render_swapchain::SwapchainStatus,
};
use kiln_render_interface::{
    bindless_manager::BindlessManager,
    frame_counter::FrameCounter,
    handles::{
        BufferHandle, DescriptorSetHandle, DescriptorSetLayoutHandle, PipelineHandle, SamplerHandle, TextureHandle,
    },
    pipeline_settings::RendererSettings,
    render_data::{CameraData, CompositePushConstants, NO_TEXTURE, RenderItem},
    resource_manager::{
        BufferDesc, DescriptorSetDesc, DescriptorSetLayoutDesc, PipelineDesc, ResourceManager, SamplerDesc, TextureDesc,
    },
};

use crate::{
    cmd_allocator::{CmdAllocator, LaneLayout},
    error::RendererResult,
    frame_sync::{FrameSync, describe_slots},
    pipelines::{FramePipelines, PIPELINE_CACHE_FILE, PipelineLayouts},
    present::{
        present_manager::PresentManager, render_passes::RenderPasses, render_targets::ImageTargets,
        ui_overlay::UiOverlay,
    },
    recorder::{ParallelRecorder, RecordContext, SkyboxDraw, resolve_draws},
    scene_bindings::SceneBindings,
    task_group::WorkerPool,
};

/// What became of one `render()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// the window has no area; nothing was recorded
    Minimized,
    /// acquire reported out-of-date; the swapchain is rebuilt on the next call
    OutOfDate,
}

/// The renderer core behind the scene.
///
/// ```ignore
/// let mut renderer = Renderer::new(display, window, extent, settings)?;
/// // edit time
/// let texture = renderer.create_texture(&desc)?;
/// // every tick
/// renderer.render(&items, &camera)?;
/// // teardown, after the scene destroyed what it created
/// renderer.destroy()?;
/// ```
pub struct Renderer {
    settings: RendererSettings,
    frame_counter: FrameCounter,

    resources: ResourceManager,
    bindless: BindlessManager,
    bindings: SceneBindings,
    pipelines: FramePipelines,

    frame_sync: FrameSync,
    cmd_allocator: CmdAllocator,
    recorder: ParallelRecorder,
    present: PresentManager,

    ui_overlay: Option<Box<dyn UiOverlay>>,
}

// new & init
impl Renderer {
    pub fn new(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
        window_extent: vk::Extent2D,
        settings: RendererSettings,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("Renderer::new");

        Gfx::init("kiln", raw_display_handle, raw_window_handle)?;
        let gfx = Gfx::get();
        let device = gfx.gfx_device();
        let queue_family_index = gfx.gfx_queue().queue_family().queue_family_index;

        let mut resources = ResourceManager::new(&settings.pool_capacities)?;
        let bindless = BindlessManager::new(&mut resources)?;
        let bindings = SceneBindings::new(&mut resources)?;
        let present = PresentManager::new(
            &mut resources,
            &bindless,
            bindings.viewport_sampler,
            window_extent,
            settings.present_mode.vk_present_mode(),
        )?;

        let layouts = PipelineLayouts {
            camera: bindings.camera_layout,
            bindless: bindless.layout(),
            material: bindings.material_layout,
        };
        let pipelines = FramePipelines::new(
            &mut resources,
            &layouts,
            present.passes(),
            settings.pipeline_cache_path(PIPELINE_CACHE_FILE),
            settings.skybox,
        )?;

        let worker_threads = settings.resolved_worker_threads();
        let frame_sync = FrameSync::new(device, queue_family_index)?;
        let cmd_allocator = CmdAllocator::new(device, queue_family_index, LaneLayout::new(worker_threads))?;
        let recorder = ParallelRecorder::new(WorkerPool::new(worker_threads)?);
        log::info!(
            "renderer ready: {} recording workers, {} frames in flight, {} swapchain images",
            worker_threads,
            FrameCounter::fif_count(),
            present.image_count()
        );

        Ok(Self {
            frame_counter: FrameCounter::new(0, settings.frame_limit),
            settings,
            resources,
            bindless,
            bindings,
            pipelines,
            frame_sync,
            cmd_allocator,
            recorder,
            present,
            ui_overlay: None,
        })
    }

    pub fn set_ui_overlay(&mut self, overlay: Option<Box<dyn UiOverlay>>) {
        self.ui_overlay = overlay;
    }
}
// getters
impl Renderer {
    #[inline]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[inline]
    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.present.extent()
    }

    /// The viewport image of a swapchain image as a bindless texture, for an editor panel.
    #[inline]
    pub fn viewport_texture(&self, image_index: usize) -> Option<TextureHandle> {
        self.present.viewport_texture(image_index)
    }

    #[inline]
    pub fn default_sampler(&self) -> SamplerHandle {
        self.bindings.default_sampler
    }

    /// Layout material sets must be created with; set 2 of the mesh pipeline.
    #[inline]
    pub fn material_layout(&self) -> DescriptorSetLayoutHandle {
        self.bindings.material_layout
    }
}
// create & destroy resources
impl Renderer {
    pub fn create_buffer(&mut self, desc: &BufferDesc) -> RendererResult<BufferHandle> {
        Ok(self.resources.create_buffer(desc)?)
    }

    /// The texture is sampleable as soon as this returns: its bindless element is written here.
    pub fn create_texture(&mut self, desc: &TextureDesc) -> RendererResult<TextureHandle> {
        let handle = self.resources.create_texture(desc)?;
        self.bindless.update_texture_set(&self.resources, &[handle])?;
        Ok(handle)
    }

    pub fn create_sampler(&mut self, desc: &SamplerDesc) -> RendererResult<SamplerHandle> {
        Ok(self.resources.create_sampler(desc)?)
    }

    pub fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorSetLayoutDesc,
    ) -> RendererResult<DescriptorSetLayoutHandle> {
        Ok(self.resources.create_descriptor_set_layout(desc)?)
    }

    pub fn create_descriptor_set(&mut self, desc: &DescriptorSetDesc) -> RendererResult<DescriptorSetHandle> {
        Ok(self.resources.create_descriptor_set(desc)?)
    }

    pub fn create_pipeline(&mut self, desc: &PipelineDesc) -> RendererResult<PipelineHandle> {
        Ok(self.resources.create_pipeline(desc)?)
    }

    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> RendererResult<()> {
        Ok(self.resources.destroy_buffer(handle)?)
    }

    pub fn destroy_texture(&mut self, handle: TextureHandle) -> RendererResult<()> {
        Ok(self.resources.destroy_texture(handle)?)
    }

    pub fn destroy_sampler(&mut self, handle: SamplerHandle) -> RendererResult<()> {
        Ok(self.resources.destroy_sampler(handle)?)
    }

    pub fn destroy_descriptor_set_layout(&mut self, handle: DescriptorSetLayoutHandle) -> RendererResult<()> {
        Ok(self.resources.destroy_descriptor_set_layout(handle)?)
    }

    pub fn destroy_descriptor_set(&mut self, handle: DescriptorSetHandle) -> RendererResult<()> {
        Ok(self.resources.destroy_descriptor_set(handle)?)
    }

    pub fn destroy_pipeline(&mut self, handle: PipelineHandle) -> RendererResult<()> {
        Ok(self.resources.destroy_pipeline(handle)?)
    }
}
// update
impl Renderer {
    pub fn notify_resized(&mut self, window_extent: vk::Extent2D) {
        self.present.notify_resized(window_extent);
    }

    pub fn wait_for_device_idle(&mut self) -> RendererResult<()> {
        let _span = tracy_client::span!("Renderer::wait_for_device_idle");
        Gfx::get().wait_idle()?;
        self.frame_sync.mark_idle();
        log::trace!("device idle, slots {}", describe_slots(&self.frame_sync));
        Ok(())
    }

    /// Renders one frame of `items` seen through `camera`.
    ///
    /// The frame id advances whatever happens, including a skipped frame or an error.
    pub fn render(&mut self, items: &[RenderItem], camera: &CameraData) -> RendererResult<FrameOutcome> {
        let _span = tracy_client::span!("Renderer::render");
        let outcome = self.render_frame(items, camera);
        self.frame_counter.next_frame();
        outcome
    }

    fn render_frame(&mut self, items: &[RenderItem], camera: &CameraData) -> RendererResult<FrameOutcome> {
        let frame_id = self.frame_counter.frame_id();
        let frame_label = self.frame_counter.frame_label();
        let frame_name = self.frame_counter.frame_name();

        if self.present.needs_rebuild() {
            self.wait_for_device_idle()?;
            if !self.present.rebuild_if_needed(&mut self.resources, &self.bindless)? {
                return Ok(FrameOutcome::Minimized);
            }
        }

        // begin frame
        {
            let _span = tracy_client::span!("begin_frame");
            self.frame_sync.wait_for_slot(frame_id)?;
            self.resources.cleanup(frame_id)?;
        }

        let resolution = {
            let _span = tracy_client::span!("resolve");
            let default_material_set = self.resources.descriptor_set(self.bindings.default_material_set)?.handle();
            resolve_draws(&self.resources, items, default_material_set)?
        };
        if !resolution.sampler_changes.is_empty() {
            self.apply_sampler_changes(&resolution.sampler_changes)?;
        }

        let status = self.present.acquire(self.frame_sync.slot(frame_label).image_available())?;
        if status == SwapchainStatus::OutOfDate {
            log::debug!("{} acquire out of date, skipping", frame_name);
            return Ok(FrameOutcome::OutOfDate);
        }
        let image_index = self.present.current_image_index();

        self.frame_sync.begin_slot(frame_id)?;
        self.cmd_allocator.reset_slot(frame_label)?;
        self.bindings.write_camera(&self.resources, frame_label, camera)?;

        // record
        let extent = self.present.extent();
        let targets = self.present.targets(image_index);
        let passes = self.present.passes();
        let secondaries = {
            let _span = tracy_client::span!("record");
            let mesh = self.resources.pipeline(self.pipelines.mesh)?;
            let ctx = RecordContext {
                render_pass: passes.viewport.handle(),
                framebuffer: targets.viewport_framebuffer(),
                extent,
                pipeline: mesh.handle(),
                layout: mesh.layout(),
                camera_set: self.resources.descriptor_set(self.bindings.camera_set(frame_label))?.handle(),
                bindless_set: self.bindless.set_handle(),
            };
            let skybox = match self.pipelines.skybox {
                Some(handle) => {
                    let skybox = self.resources.pipeline(handle)?;
                    Some(SkyboxDraw {
                        pipeline: skybox.handle(),
                        layout: skybox.layout(),
                    })
                }
                None => None,
            };
            self.recorder.record(&self.cmd_allocator, frame_label, ctx, skybox, Arc::from(resolution.draws))?
        };

        let slot = self.frame_sync.slot(frame_label);
        let primaries = slot.primaries();
        record_viewport_primary(
            &primaries.viewport,
            passes,
            targets,
            self.settings.clear_color,
            &secondaries,
            &frame_name,
        )?;
        let composite = self.resources.pipeline(self.pipelines.composite)?;
        let composite_push = CompositePushConstants {
            viewport_texture: self.present.viewport_texture(image_index).map_or(NO_TEXTURE, |handle| handle.index()),
        };
        {
            let cmd = &primaries.main;
            cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("{frame_name}main"))?;
            cmd.begin_render_pass(
                passes.main.handle(),
                targets.main_framebuffer(),
                extent,
                &passes.main.desc().clear_values(self.settings.clear_color),
                vk::SubpassContents::INLINE,
            );
            cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, composite.handle());
            cmd.set_viewport_and_scissor(extent);
            cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, composite.layout(), 0, &[self.bindless.set_handle()]);
            cmd.push_constants(
                composite.layout(),
                vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&composite_push),
            );
            cmd.draw(3, 0);
            cmd.end_render_pass();
            cmd.end()?;
        }
        {
            let cmd = &primaries.ui;
            cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("{frame_name}ui"))?;
            cmd.begin_render_pass(
                passes.ui.handle(),
                targets.ui_framebuffer(),
                extent,
                &passes.ui.desc().clear_values(self.settings.clear_color),
                vk::SubpassContents::INLINE,
            );
            if let Some(overlay) = self.ui_overlay.as_deref_mut() {
                overlay.record(cmd, extent);
            }
            cmd.end_render_pass();
            cmd.end()?;
        }

        // end frame
        {
            let _span = tracy_client::span!("end_frame");
            self.frame_sync.arm_fence(frame_id)?;
            let slot = self.frame_sync.slot(frame_label);
            let submit = GfxSubmitInfo::new(&slot.primaries().submit_order())
                .wait(slot.image_available(), vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .signal(self.present.render_finished(image_index), vk::PipelineStageFlags2::ALL_COMMANDS);
            Gfx::get().gfx_queue().submit(vec![submit], Some(slot.fence()))?;
            self.frame_sync.submitted(frame_id)?;

            let status = self.present.present()?;
            if status != SwapchainStatus::Optimal {
                log::debug!("{} present reported {:?}", frame_name, status);
            }
        }
        Ok(FrameOutcome::Presented)
    }

    /// Rewrites the bindless elements of textures whose sampler changed. The old descriptors may
    /// still be read by frames in flight, so this waits for the device first.
    fn apply_sampler_changes(&mut self, changes: &[(TextureHandle, SamplerHandle)]) -> RendererResult<()> {
        let _span = tracy_client::span!("apply_sampler_changes");
        let mut changed = Vec::with_capacity(changes.len());
        for (texture, sampler) in changes {
            if self.resources.set_texture_sampler(*texture, *sampler)? {
                changed.push(*texture);
            }
        }
        if changed.is_empty() {
            return Ok(());
        }

        self.wait_for_device_idle()?;
        self.bindless.update_texture_set(&self.resources, &changed)?;
        log::debug!("rewrote samplers of {}", changed.iter().join(", "));
        Ok(())
    }
}
// destroy
impl Renderer {
    /// Tears everything down, in reverse creation order. The scene must have destroyed its own
    /// resources first; anything left is reclaimed by the resource manager.
    pub fn destroy(self) -> RendererResult<()> {
        let _span = tracy_client::span!("Renderer::destroy");
        Gfx::get().wait_idle()?;

        let Self {
            mut resources,
            bindless,
            bindings,
            pipelines,
            frame_sync,
            cmd_allocator,
            recorder,
            present,
            ui_overlay,
            ..
        } = self;
        drop(ui_overlay);
        drop(recorder);

        if let Err(e) = resources.save_pipeline_caches() {
            log::warn!("failed to save pipeline caches: {}", e);
        }

        present.destroy(&mut resources)?;
        cmd_allocator.destroy();
        frame_sync.destroy();

        for pipeline in [Some(pipelines.mesh), Some(pipelines.composite), pipelines.skybox].into_iter().flatten() {
            resources.destroy_pipeline(pipeline)?;
        }
        bindings.destroy(&mut resources)?;
        bindless.destroy();
        resources.destroy_all()?;
        drop(resources);

        Gfx::destroy();
        Ok(())
    }
}

fn record_viewport_primary(
    cmd: &GfxCommandBuffer,
    passes: &RenderPasses,
    targets: &ImageTargets,
    clear_color: [f32; 4],
    secondaries: &[GfxCommandBuffer],
    frame_name: &str,
) -> RendererResult<()> {
    cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("{frame_name}viewport"))?;
    cmd.begin_render_pass(
        passes.viewport.handle(),
        targets.viewport_framebuffer(),
        targets.extent(),
        &passes.viewport.desc().clear_values(clear_color),
        vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
    );
    // an empty list still clears and transitions the viewport target
    cmd.execute_commands(&secondaries.iter().collect_vec());
    cmd.end_render_pass();
    cmd.end()?;
    Ok(())
}
