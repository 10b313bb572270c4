use std::path::PathBuf;

use ash::vk;

use crate::{
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    pipelines::shader::{ENTRY_MAIN, GfxShaderModuleCache},
};

pub struct GfxPipelineLayout {
    handle: vk::PipelineLayout,
}

impl GfxPipelineLayout {
    pub fn new(
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_pipeline_layout(&create_info, None)? };
        let layout = Self { handle };
        if let Err(e) = gfx_device.set_debug_name(&layout, debug_name) {
            layout.destroy();
            return Err(e);
        }
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_pipeline_layout(self.handle, None) };
    }
}
impl DebugType for GfxPipelineLayout {
    fn debug_type_name() -> &'static str {
        "GfxPipelineLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxBlendMode {
    Opaque,
    /// src-alpha over one-minus-src-alpha
    AlphaBlend,
}

#[derive(Clone, Copy, Debug)]
pub struct GfxDepthState {
    pub test: bool,
    pub write: bool,
    pub compare_op: vk::CompareOp,
}
impl Default for GfxDepthState {
    fn default() -> Self {
        Self {
            test: true,
            write: true,
            compare_op: vk::CompareOp::LESS,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GfxRasterState {
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
}
impl Default for GfxRasterState {
    fn default() -> Self {
        Self {
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        }
    }
}

/// Everything a graphics pipeline is built from, except the layout and the target pass.
/// Viewport and scissor are always dynamic.
#[derive(Clone, Debug)]
pub struct GfxGraphicsPipelineCreateInfo {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,

    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub primitive_topology: vk::PrimitiveTopology,

    pub raster: GfxRasterState,
    /// `None` when the pass has no depth attachment
    pub depth: Option<GfxDepthState>,
    pub blend: GfxBlendMode,
}

impl GfxGraphicsPipelineCreateInfo {
    pub fn new(vertex_shader: PathBuf, fragment_shader: PathBuf) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            vertex_bindings: vec![],
            vertex_attributes: vec![],
            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            raster: GfxRasterState::default(),
            depth: None,
            blend: GfxBlendMode::Opaque,
        }
    }

    pub fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        let state = vk::PipelineColorBlendAttachmentState::default().color_write_mask(vk::ColorComponentFlags::RGBA);
        match self.blend {
            GfxBlendMode::Opaque => state.blend_enable(false),
            GfxBlendMode::AlphaBlend => state
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD),
        }
    }

    pub fn depth_stencil_state(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        let depth = self.depth.unwrap_or(GfxDepthState {
            test: false,
            write: false,
            compare_op: vk::CompareOp::ALWAYS,
        });
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(depth.test)
            .depth_write_enable(depth.write)
            .depth_compare_op(depth.compare_op)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
    }
}

/// Graphics pipeline targeting subpass 0 of a render pass. Owns its layout.
pub struct GfxGraphicsPipeline {
    pipeline: vk::Pipeline,
    layout: GfxPipelineLayout,
}

impl GfxGraphicsPipeline {
    pub fn new(
        create_info: &GfxGraphicsPipelineCreateInfo,
        layout: GfxPipelineLayout,
        render_pass: vk::RenderPass,
        shader_cache: &mut GfxShaderModuleCache,
        pipeline_cache: vk::PipelineCache,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxGraphicsPipeline::new");

        let modules = shader_cache.get_or_load(&create_info.vertex_shader).and_then(|vs| {
            shader_cache.get_or_load(&create_info.fragment_shader).map(|fs| (vs, fs))
        });
        let (vertex_module, fragment_module) = match modules {
            Ok(modules) => modules,
            Err(e) => {
                layout.destroy();
                return Err(e);
            }
        };
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(ENTRY_MAIN),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(ENTRY_MAIN),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&create_info.vertex_bindings)
            .vertex_attribute_descriptions(&create_info.vertex_attributes);
        let input_assembly =
            vk::PipelineInputAssemblyStateCreateInfo::default().topology(create_info.primitive_topology);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(create_info.raster.polygon_mode)
            .cull_mode(create_info.raster.cull_mode)
            .front_face(create_info.raster.front_face)
            .line_width(1.0);
        let multisample =
            vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = create_info.depth_stencil_state();
        let blend_attachments = [create_info.color_blend_attachment()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_ci = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass)
            .subpass(0);

        let gfx_device = Gfx::get().gfx_device();
        let pipeline = match unsafe {
            gfx_device.create_graphics_pipelines(pipeline_cache, std::slice::from_ref(&pipeline_ci), None)
        } {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                layout.destroy();
                return Err(e.into());
            }
        };

        let pipeline = Self { pipeline, layout };
        if let Err(e) = gfx_device.set_debug_name(&pipeline, debug_name) {
            pipeline.destroy();
            return Err(e);
        }
        Ok(pipeline)
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        vk::PipelineBindPoint::GRAPHICS
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_pipeline(self.pipeline, None) };
        self.layout.destroy();
    }
}
impl DebugType for GfxGraphicsPipeline {
    fn debug_type_name() -> &'static str {
        "GfxGraphicsPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_state_off_without_depth() {
        let info = GfxGraphicsPipelineCreateInfo::new("a.vert.spv".into(), "a.frag.spv".into());
        let depth = info.depth_stencil_state();
        assert_eq!(depth.depth_test_enable, vk::FALSE);
        assert_eq!(depth.depth_write_enable, vk::FALSE);
    }

    #[test]
    fn test_alpha_blend_state() {
        let mut info = GfxGraphicsPipelineCreateInfo::new("a.vert.spv".into(), "a.frag.spv".into());
        assert_eq!(info.color_blend_attachment().blend_enable, vk::FALSE);
        info.blend = GfxBlendMode::AlphaBlend;
        info.depth = Some(GfxDepthState::default());
        let blend = info.color_blend_attachment();
        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(info.depth_stencil_state().depth_compare_op, vk::CompareOp::LESS);
    }
}
