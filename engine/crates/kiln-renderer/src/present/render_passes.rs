use ash::vk;
use kiln_gfx::{
    error::GfxResult,
    pipelines::render_pass::{GfxAttachmentDesc, GfxRenderPass, GfxRenderPassDesc},
};
use kiln_render_interface::pipeline_settings::DefaultRendererSettings;

fn external_to_pass(
    src_stage: vk::PipelineStageFlags,
    src_access: vk::AccessFlags,
    dst_stage: vk::PipelineStageFlags,
    dst_access: vk::AccessFlags,
) -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(src_stage)
        .src_access_mask(src_access)
        .dst_stage_mask(dst_stage)
        .dst_access_mask(dst_access)
}

fn pass_to_external(
    src_stage: vk::PipelineStageFlags,
    src_access: vk::AccessFlags,
    dst_stage: vk::PipelineStageFlags,
    dst_access: vk::AccessFlags,
) -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(0)
        .dst_subpass(vk::SUBPASS_EXTERNAL)
        .src_stage_mask(src_stage)
        .src_access_mask(src_access)
        .dst_stage_mask(dst_stage)
        .dst_access_mask(dst_access)
}

/// Off-screen scene pass. The color target starts undefined, is written as a color attachment and
/// is left ready for sampling by the main pass.
pub fn viewport_pass_desc(depth_format: vk::Format) -> GfxRenderPassDesc {
    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;

    GfxRenderPassDesc {
        color: GfxAttachmentDesc {
            format: DefaultRendererSettings::VIEWPORT_FORMAT,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        },
        depth: Some(GfxAttachmentDesc {
            format: depth_format,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }),
        dependencies: vec![
            // the previous composite that sampled this target, and the previous depth writes
            external_to_pass(
                vk::PipelineStageFlags::FRAGMENT_SHADER | attachment_stages,
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                attachment_stages,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            pass_to_external(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::AccessFlags::SHADER_READ,
            ),
        ],
    }
}

/// Composites the viewport into the swapchain image. Clears, since the acquired image's contents
/// are undefined.
pub fn main_pass_desc(swapchain_format: vk::Format) -> GfxRenderPassDesc {
    GfxRenderPassDesc {
        color: GfxAttachmentDesc {
            format: swapchain_format,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        },
        depth: None,
        dependencies: vec![
            // chains onto the image-available wait at COLOR_ATTACHMENT_OUTPUT
            external_to_pass(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::empty(),
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
        ],
    }
}

/// Overlay pass: keeps what the main pass wrote and hands the image to present.
pub fn ui_pass_desc(swapchain_format: vk::Format) -> GfxRenderPassDesc {
    GfxRenderPassDesc {
        color: GfxAttachmentDesc {
            format: swapchain_format,
            load_op: vk::AttachmentLoadOp::LOAD,
            store_op: vk::AttachmentStoreOp::STORE,
            initial_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        },
        depth: None,
        dependencies: vec![
            external_to_pass(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
            pass_to_external(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::AccessFlags::empty(),
            ),
        ],
    }
}

/// The three passes of a frame. They only depend on formats, so a resize keeps them.
pub struct RenderPasses {
    pub viewport: GfxRenderPass,
    pub main: GfxRenderPass,
    pub ui: GfxRenderPass,
}

// new & init
impl RenderPasses {
    pub fn new(swapchain_format: vk::Format, depth_format: vk::Format) -> GfxResult<Self> {
        let viewport = GfxRenderPass::new(viewport_pass_desc(depth_format), "viewport-pass")?;
        let main = GfxRenderPass::new(main_pass_desc(swapchain_format), "main-pass")?;
        let ui = GfxRenderPass::new(ui_pass_desc(swapchain_format), "ui-pass")?;
        Ok(Self { viewport, main, ui })
    }
}
// getters
impl RenderPasses {
    /// Whether the swapchain passes can be kept for a swapchain of `format`.
    #[inline]
    pub fn matches_swapchain_format(&self, format: vk::Format) -> bool {
        self.main.desc().color.format == format
    }
}
// destroy
impl RenderPasses {
    pub fn destroy(self) {
        self.ui.destroy();
        self.main.destroy();
        self.viewport.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_pass_layouts() {
        let desc = viewport_pass_desc(vk::Format::D32_SFLOAT);
        // subpass layout in between is COLOR_ATTACHMENT_OPTIMAL
        assert_eq!(desc.color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(desc.color.final_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(desc.color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(desc.color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(desc.color.format, DefaultRendererSettings::VIEWPORT_FORMAT);

        let depth = desc.depth.unwrap();
        assert_eq!(depth.format, vk::Format::D32_SFLOAT);
        assert_eq!(desc.attachment_descriptions().len(), 2);
        assert_eq!(desc.clear_values([0.0; 4]).len(), 2);
    }

    #[test]
    fn test_viewport_result_visible_to_sampling() {
        let desc = viewport_pass_desc(vk::Format::D32_SFLOAT);
        let out = desc
            .dependencies
            .iter()
            .find(|dep| dep.dst_subpass == vk::SUBPASS_EXTERNAL)
            .unwrap();
        assert!(out.dst_stage_mask.contains(vk::PipelineStageFlags::FRAGMENT_SHADER));
        assert!(out.dst_access_mask.contains(vk::AccessFlags::SHADER_READ));
    }

    #[test]
    fn test_swapchain_passes_chain_into_present() {
        let format = vk::Format::B8G8R8A8_SRGB;
        let main = main_pass_desc(format);
        let ui = ui_pass_desc(format);

        assert!(main.depth.is_none() && ui.depth.is_none());
        assert_eq!(main.color.final_layout, ui.color.initial_layout);
        assert_eq!(ui.color.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(ui.color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(
            main.dependencies
                .iter()
                .any(|dep| dep.src_subpass == vk::SUBPASS_EXTERNAL
                    && dep.src_stage_mask.contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT))
        );
    }
}
