use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    pub format: vk::Format,
    pub aspect_mask: vk::ImageAspectFlags,
}
impl GfxImageViewDesc {
    pub fn new_2d(format: vk::Format, aspect_mask: vk::ImageAspectFlags) -> Self {
        Self { format, aspect_mask }
    }
}

/// 2D view over the first mip and layer.
pub struct GfxImageView {
    handle: vk::ImageView,
    desc: GfxImageViewDesc,
    name: String,
}

// new & init
impl GfxImageView {
    pub fn new(image: vk::Image, desc: GfxImageViewDesc, name: impl AsRef<str>) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();

        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: desc.aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let handle = unsafe { gfx_device.create_image_view(&info, None)? };
        let image_view = Self {
            handle,
            desc,
            name: name.as_ref().to_string(),
        };
        if let Err(e) = gfx_device.set_debug_name(&image_view, &image_view.name) {
            image_view.destroy();
            return Err(e);
        }
        Ok(image_view)
    }
}
// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}
// destroy
impl GfxImageView {
    pub fn destroy(mut self) {
        unsafe { Gfx::get().gfx_device().destroy_image_view(self.handle, None) };
        self.handle = vk::ImageView::null();
    }
}
impl Drop for GfxImageView {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null(), "GfxImageView {} dropped without destroy()", self.name);
    }
}
impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl std::fmt::Display for GfxImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageView({}, {:?})", self.name, self.handle)
    }
}
