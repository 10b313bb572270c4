use std::{ffi::CString, sync::Arc};

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{barrier::GfxImageBarrier, command_pool::GfxCommandPool},
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// Freed together with its pool. Holds its own device reference so a worker thread can record into
/// it without going through the global [`crate::gfx::Gfx`].
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    command_pool: vk::CommandPool,
    level: vk::CommandBufferLevel,
    device: Arc<GfxDevice>,
}

// new & init
impl GfxCommandBuffer {
    pub fn new(pool: &GfxCommandPool, level: vk::CommandBufferLevel, debug_name: &str) -> GfxResult<Self> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool.handle())
            .level(level)
            .command_buffer_count(1);

        let device = pool.device().clone();
        let vk_handle = unsafe { device.allocate_command_buffers(&info)?[0] };
        let cmd = Self {
            vk_handle,
            command_pool: pool.handle(),
            level,
            device,
        };
        cmd.device.set_debug_name(&cmd, debug_name)?;
        Ok(cmd)
    }

    /// Returns the buffer to its pool early; normally the pool frees it on destroy.
    pub fn free(self) {
        unsafe {
            self.device.free_command_buffers(self.command_pool, std::slice::from_ref(&self.vk_handle));
        }
    }
}
// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }

    #[inline]
    pub fn level(&self) -> vk::CommandBufferLevel {
        self.level
    }
}
// begin & end
impl GfxCommandBuffer {
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) -> GfxResult<()> {
        unsafe {
            self.device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))?;
        }
        self.begin_label(debug_label_name, crate::basic::color::LabelColor::COLOR_CMD);
        Ok(())
    }

    /// Begins a secondary buffer that continues `render_pass` in subpass 0 of `framebuffer`.
    pub fn begin_secondary(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        debug_label_name: &str,
    ) -> GfxResult<()> {
        let inheritance = vk::CommandBufferInheritanceInfo::default()
            .render_pass(render_pass)
            .subpass(0)
            .framebuffer(framebuffer);
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT | vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE)
            .inheritance_info(&inheritance);
        unsafe { self.device.begin_command_buffer(self.vk_handle, &begin_info)? };
        self.begin_label(debug_label_name, crate::basic::color::LabelColor::COLOR_LANE);
        Ok(())
    }

    #[inline]
    pub fn end(&self) -> GfxResult<()> {
        self.end_label();
        unsafe { self.device.end_command_buffer(self.vk_handle)? };
        Ok(())
    }
}
// render pass
impl GfxCommandBuffer {
    /// `contents`: INLINE when this buffer records the draws itself, SECONDARY_COMMAND_BUFFERS when
    /// the pass body only executes secondaries
    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
        contents: vk::SubpassContents,
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(extent.into())
            .clear_values(clear_values);
        unsafe { self.device.cmd_begin_render_pass(self.vk_handle, &begin_info, contents) };
    }

    #[inline]
    pub fn end_render_pass(&self) {
        unsafe { self.device.cmd_end_render_pass(self.vk_handle) };
    }

    /// Secondaries run in slice order.
    pub fn execute_commands(&self, secondaries: &[&GfxCommandBuffer]) {
        if secondaries.is_empty() {
            return;
        }
        let handles = secondaries.iter().map(|cmd| cmd.vk_handle).collect_vec();
        unsafe { self.device.cmd_execute_commands(self.vk_handle, &handles) };
    }
}
// state
impl GfxCommandBuffer {
    #[inline]
    pub fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.cmd_bind_pipeline(self.vk_handle, bind_point, pipeline) };
    }

    #[inline]
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        pipeline_layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.vk_handle,
                bind_point,
                pipeline_layout,
                first_set,
                descriptor_sets,
                &[],
            )
        };
    }

    #[inline]
    pub fn bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe { self.device.cmd_bind_vertex_buffers(self.vk_handle, first_binding, buffers, offsets) };
    }

    #[inline]
    pub fn bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe { self.device.cmd_bind_index_buffer(self.vk_handle, buffer, offset, index_type) };
    }

    #[inline]
    pub fn push_constants(
        &self,
        pipeline_layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe { self.device.cmd_push_constants(self.vk_handle, pipeline_layout, stage, offset, data) };
    }

    #[inline]
    pub fn set_viewport(&self, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(self.vk_handle, 0, std::slice::from_ref(&viewport)) };
    }

    #[inline]
    pub fn set_scissor(&self, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(self.vk_handle, 0, std::slice::from_ref(&scissor)) };
    }

    /// Full-extent viewport and scissor.
    pub fn set_viewport_and_scissor(&self, extent: vk::Extent2D) {
        self.set_viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        self.set_scissor(extent.into());
    }
}
// draw
impl GfxCommandBuffer {
    #[inline]
    pub fn draw_indexed(&self, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe { self.device.cmd_draw_indexed(self.vk_handle, index_count, 1, first_index, vertex_offset, 0) };
    }

    #[inline]
    pub fn draw(&self, vertex_count: u32, first_vertex: u32) {
        unsafe { self.device.cmd_draw(self.vk_handle, vertex_count, 1, first_vertex, 0) };
    }
}
// transfer
impl GfxCommandBuffer {
    #[inline]
    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe { self.device.cmd_copy_buffer(self.vk_handle, src, dst, regions) };
    }

    #[inline]
    pub fn copy_buffer_to_image(&self, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.vk_handle,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            )
        };
    }
}
// sync
impl GfxCommandBuffer {
    pub fn image_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        let barriers = barriers.iter().map(|barrier| *barrier.inner()).collect_vec();
        let dependency_info =
            vk::DependencyInfo::default().image_memory_barriers(&barriers).dependency_flags(dependency_flags);
        unsafe { self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info) };
    }
}
// debug
impl GfxCommandBuffer {
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let Ok(name) = CString::new(label_name) else {
            return;
        };
        unsafe {
            self.device.debug_utils().cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    #[inline]
    pub fn end_label(&self) {
        unsafe { self.device.debug_utils().cmd_end_debug_utils_label(self.vk_handle) };
    }

    #[inline]
    pub fn insert_label(&self, label_name: &str, label_color: glam::Vec4) {
        let Ok(name) = CString::new(label_name) else {
            return;
        };
        unsafe {
            self.device.debug_utils().cmd_insert_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }
}
impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
