use ash::vk;
use vk_mem::Alloc;

use crate::{
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    resources::buffer::GfxBuffer,
};

/// Bytes per texel for the uncompressed formats the renderer uploads. `None` for anything else.
pub fn texel_size_in_bytes(format: vk::Format) -> Option<usize> {
    match format {
        vk::Format::R8_UNORM | vk::Format::R8_SRGB => Some(1),
        vk::Format::R8G8_UNORM | vk::Format::R8G8_SRGB => Some(2),
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB
        | vk::Format::R32_SFLOAT
        | vk::Format::D32_SFLOAT => Some(4),
        vk::Format::R16G16B16A16_SFLOAT | vk::Format::R16G16B16A16_UNORM => Some(8),
        vk::Format::R32G32B32A32_SFLOAT => Some(16),
        _ => None,
    }
}

pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::D32_SFLOAT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// 2D, single mip, single layer, optimal tiling, exclusive sharing
#[derive(Clone, Copy, Debug)]
pub struct GfxImageCreateInfo {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
}
impl GfxImageCreateInfo {
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self { extent, format, usage }
    }

    #[inline]
    pub fn as_info(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.format)
            .extent(self.extent.into())
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

pub enum ImageSource {
    Allocated(vk_mem::Allocation),
    /// owned by someone else, e.g. the swapchain
    External,
}

pub struct GfxImage {
    handle: vk::Image,
    source: ImageSource,

    extent: vk::Extent2D,
    format: vk::Format,

    name: String,
}

// new & init
impl GfxImage {
    pub fn new(image_info: &GfxImageCreateInfo, debug_name: &str) -> GfxResult<Self> {
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let (handle, allocation) = unsafe { Gfx::get().allocator().create_image(&image_info.as_info(), &alloc_info)? };
        let image = Self {
            handle,
            source: ImageSource::Allocated(allocation),
            extent: image_info.extent,
            format: image_info.format,
            name: debug_name.to_string(),
        };
        if let Err(e) = Gfx::get().gfx_device().set_debug_name(&image, debug_name) {
            image.destroy();
            return Err(e);
        }
        Ok(image)
    }

    /// Wraps an image whose memory belongs to another object.
    pub fn from_external(handle: vk::Image, extent: vk::Extent2D, format: vk::Format, debug_name: &str) -> Self {
        Self {
            handle,
            source: ImageSource::External,
            extent,
            format,
            name: debug_name.to_string(),
        }
    }

    /// Sampled image filled with `data`, left in SHADER_READ_ONLY_OPTIMAL.
    ///
    /// # Panics
    /// When `data` does not hold exactly `width * height` texels of `format`.
    pub fn from_pixels(
        extent: vk::Extent2D,
        format: vk::Format,
        data: &[u8],
        debug_name: &str,
    ) -> GfxResult<Self> {
        let image_info = GfxImageCreateInfo::new_image_2d_info(
            extent,
            format,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        );
        let image = Self::new(&image_info, debug_name)?;

        let stage_buffer = match image.stage_pixels(data) {
            Ok(stage_buffer) => stage_buffer,
            Err(e) => {
                image.destroy();
                return Err(e);
            }
        };
        let uploaded = Gfx::get().one_time_exec(|cmd| image.record_upload(cmd, &stage_buffer), debug_name);
        drop(stage_buffer);
        if let Err(e) = uploaded {
            image.destroy();
            return Err(e);
        }

        Ok(image)
    }
}
// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
// tools
impl GfxImage {
    fn stage_pixels(&self, data: &[u8]) -> GfxResult<GfxBuffer> {
        let texel_size = texel_size_in_bytes(self.format)
            .unwrap_or_else(|| panic!("{}: cannot upload pixels of format {:?}", self.name, self.format));
        let expected = texel_size * (self.extent.width * self.extent.height) as usize;
        assert_eq!(data.len(), expected, "{}: pixel data size mismatch", self.name);

        let stage_buffer = GfxBuffer::new_stage_buffer(data.len() as vk::DeviceSize, format!("{}-stage", self.name))?;
        stage_buffer.write_mapped(data)?;
        Ok(stage_buffer)
    }

    /// UNDEFINED -> TRANSFER_DST, copy, TRANSFER_DST -> SHADER_READ_ONLY
    fn record_upload(&self, cmd: &GfxCommandBuffer, stage_buffer: &GfxBuffer) {
        let to_transfer_dst = GfxImageBarrier::new()
            .image(self.handle)
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &[to_transfer_dst]);

        let region = vk::BufferImageCopy::default()
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(self.extent.into());
        cmd.copy_buffer_to_image(stage_buffer.vk_buffer(), self.handle, &[region]);

        let to_shader_read = GfxImageBarrier::new()
            .image(self.handle)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ)
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &[to_shader_read]);
    }
}
// destroy
impl GfxImage {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    fn destroy_mut(&mut self) {
        log::debug!("destroying GfxImage: {}", self.name);
        match &mut self.source {
            ImageSource::External => (),
            ImageSource::Allocated(allocation) => unsafe {
                Gfx::get().allocator().destroy_image(self.handle, allocation)
            },
        }
        self.handle = vk::Image::null();
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        use ash::vk::Handle;
        debug_assert!(self.handle.is_null(), "GfxImage {} dropped without destroy()", self.name);
    }
}
impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texel_sizes() {
        assert_eq!(texel_size_in_bytes(vk::Format::R8G8B8A8_UNORM), Some(4));
        assert_eq!(texel_size_in_bytes(vk::Format::R16G16B16A16_SFLOAT), Some(8));
        assert_eq!(texel_size_in_bytes(vk::Format::BC7_UNORM_BLOCK), None);
    }

    #[test]
    fn test_depth_formats() {
        assert!(is_depth_format(vk::Format::D32_SFLOAT));
        assert!(!has_stencil(vk::Format::D32_SFLOAT));
        assert!(has_stencil(vk::Format::D24_UNORM_S8_UINT));
        assert!(!is_depth_format(vk::Format::R8G8B8A8_UNORM));
    }

    #[test]
    fn test_image_create_info_is_single_level_2d() {
        let info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width: 64, height: 32 },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
        )
        .as_info();
        assert_eq!(info.extent.depth, 1);
        assert_eq!(info.mip_levels, 1);
        assert_eq!(info.initial_layout, vk::ImageLayout::UNDEFINED);
    }
}
