use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxFramebuffer {
    handle: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl GfxFramebuffer {
    /// `attachments` must match the render pass attachment order (color, then depth).
    pub fn new(
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_framebuffer(&create_info, None)? };
        let framebuffer = Self { handle, extent };
        if let Err(e) = gfx_device.set_debug_name(&framebuffer, debug_name) {
            framebuffer.destroy();
            return Err(e);
        }
        Ok(framebuffer)
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_framebuffer(self.handle, None) };
    }
}
impl DebugType for GfxFramebuffer {
    fn debug_type_name() -> &'static str {
        "GfxFramebuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
