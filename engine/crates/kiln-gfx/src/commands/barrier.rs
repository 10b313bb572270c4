use ash::vk;

/// synchronization2 image barrier, whole-image by default
#[derive(Clone, Copy)]
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2::default()
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: vk::REMAINING_MIP_LEVELS,
                    base_array_layer: 0,
                    layer_count: vk::REMAINING_ARRAY_LAYERS,
                }),
        }
    }
}

impl GfxImageBarrier {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier2<'static> {
        &self.inner
    }

    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }

    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    #[inline]
    pub fn src_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = stage;
        self.inner.src_access_mask = access;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = stage;
        self.inner.dst_access_mask = access;
        self
    }

    #[inline]
    pub fn image_aspect_flag(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.inner.subresource_range.aspect_mask = aspect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_builder_covers_whole_image() {
        let barrier = GfxImageBarrier::new()
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE)
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);
        let inner = barrier.inner();
        assert_eq!(inner.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(inner.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(inner.subresource_range.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(inner.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(inner.dst_access_mask, vk::AccessFlags2::TRANSFER_WRITE);
    }
}
