use ash::vk;
use itertools::Itertools;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// How one attachment enters and leaves the pass.
#[derive(Clone, Copy, Debug)]
pub struct GfxAttachmentDesc {
    pub format: vk::Format,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

/// Single-subpass render pass: one color attachment and an optional depth attachment.
#[derive(Clone, Debug)]
pub struct GfxRenderPassDesc {
    pub color: GfxAttachmentDesc,
    pub depth: Option<GfxAttachmentDesc>,
    /// what waits on the pass (external -> 0) and what the pass must finish before (0 -> external)
    pub dependencies: Vec<vk::SubpassDependency>,
}

impl GfxRenderPassDesc {
    pub fn attachment_descriptions(&self) -> Vec<vk::AttachmentDescription> {
        std::iter::once(&self.color)
            .chain(self.depth.as_ref())
            .map(|attachment| vk::AttachmentDescription {
                format: attachment.format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: attachment.load_op,
                store_op: attachment.store_op,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: attachment.initial_layout,
                final_layout: attachment.final_layout,
                ..Default::default()
            })
            .collect_vec()
    }

    /// Color clears to `clear_color`, depth to 1.0. Ignored by attachments that LOAD.
    pub fn clear_values(&self, clear_color: [f32; 4]) -> Vec<vk::ClearValue> {
        let mut values = vec![vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        }];
        if self.depth.is_some() {
            values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });
        }
        values
    }
}

pub struct GfxRenderPass {
    handle: vk::RenderPass,
    desc: GfxRenderPassDesc,
}

impl GfxRenderPass {
    pub fn new(desc: GfxRenderPassDesc, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        let attachments = desc.attachment_descriptions();
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if desc.depth.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&desc.dependencies);

        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_render_pass(&create_info, None)? };
        let render_pass = Self { handle, desc };
        if let Err(e) = gfx_device.set_debug_name(&render_pass, debug_name) {
            render_pass.destroy();
            return Err(e);
        }
        Ok(render_pass)
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxRenderPassDesc {
        &self.desc
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_render_pass(self.handle, None) };
    }
}
impl DebugType for GfxRenderPass {
    fn debug_type_name() -> &'static str {
        "GfxRenderPass"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(final_layout: vk::ImageLayout) -> GfxAttachmentDesc {
        GfxAttachmentDesc {
            format: vk::Format::R8G8B8A8_UNORM,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout,
        }
    }

    #[test]
    fn test_color_and_depth_attachments() {
        let desc = GfxRenderPassDesc {
            color: color(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            depth: Some(GfxAttachmentDesc {
                format: vk::Format::D32_SFLOAT,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }),
            dependencies: vec![],
        };
        let attachments = desc.attachment_descriptions();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachments[0].final_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(attachments[1].format, vk::Format::D32_SFLOAT);
        assert_eq!(desc.clear_values([0.0; 4]).len(), 2);
    }

    #[test]
    fn test_color_only() {
        let desc = GfxRenderPassDesc {
            color: color(vk::ImageLayout::PRESENT_SRC_KHR),
            depth: None,
            dependencies: vec![],
        };
        assert_eq!(desc.attachment_descriptions().len(), 1);
        assert_eq!(desc.clear_values([0.0; 4]).len(), 1);
    }
}
