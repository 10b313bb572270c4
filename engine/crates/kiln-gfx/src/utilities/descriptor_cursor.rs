use ash::vk;
use itertools::Itertools;

/// One binding of a descriptor set layout, plus helpers that write into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxDescriptorBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
    pub flags: vk::DescriptorBindingFlags,
}

impl GfxDescriptorBinding {
    pub const fn new(
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        Self {
            binding,
            descriptor_type,
            count,
            stages,
            flags: vk::DescriptorBindingFlags::empty(),
        }
    }

    pub const fn with_flags(mut self, flags: vk::DescriptorBindingFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn layout_binding(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.descriptor_type)
            .descriptor_count(self.count)
            .stage_flags(self.stages)
    }

    pub fn write_image(
        &self,
        dst_set: vk::DescriptorSet,
        dst_array_element: u32,
        image_infos: Vec<vk::DescriptorImageInfo>,
    ) -> GfxWriteDescriptorSet {
        GfxWriteDescriptorSet {
            dst_set,
            dst_binding: self.binding,
            dst_array_element,
            descriptor_type: self.descriptor_type,
            image_infos,
            buffer_infos: Vec::new(),
        }
    }

    pub fn write_buffer(
        &self,
        dst_set: vk::DescriptorSet,
        dst_array_element: u32,
        buffer_infos: Vec<vk::DescriptorBufferInfo>,
    ) -> GfxWriteDescriptorSet {
        GfxWriteDescriptorSet {
            dst_set,
            dst_binding: self.binding,
            dst_array_element,
            descriptor_type: self.descriptor_type,
            image_infos: Vec::new(),
            buffer_infos,
        }
    }
}

/// Owned form of `vk::WriteDescriptorSet`, so writes can be planned and inspected without a device.
#[derive(Clone, Debug)]
pub struct GfxWriteDescriptorSet {
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_type: vk::DescriptorType,
    pub image_infos: Vec<vk::DescriptorImageInfo>,
    pub buffer_infos: Vec<vk::DescriptorBufferInfo>,
}

impl GfxWriteDescriptorSet {
    #[inline]
    pub fn descriptor_count(&self) -> usize {
        self.image_infos.len() + self.buffer_infos.len()
    }

    /// Borrows every write as a `vk::WriteDescriptorSet` for the duration of `f`.
    pub fn with_writes<R>(writes: &[Self], f: impl FnOnce(&[vk::WriteDescriptorSet]) -> R) -> R {
        let vk_writes = writes
            .iter()
            .filter(|write| write.descriptor_count() > 0)
            .map(|write| {
                let vk_write = vk::WriteDescriptorSet::default()
                    .dst_set(write.dst_set)
                    .dst_binding(write.dst_binding)
                    .dst_array_element(write.dst_array_element)
                    .descriptor_type(write.descriptor_type);
                if write.image_infos.is_empty() {
                    vk_write.buffer_info(&write.buffer_infos)
                } else {
                    vk_write.image_info(&write.image_infos)
                }
            })
            .collect_vec();
        f(&vk_writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_writes_skips_empty_writes() {
        let binding = GfxDescriptorBinding::new(
            0,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            16,
            vk::ShaderStageFlags::FRAGMENT,
        );
        let writes = vec![
            binding.write_image(vk::DescriptorSet::null(), 3, vec![vk::DescriptorImageInfo::default()]),
            binding.write_image(vk::DescriptorSet::null(), 4, vec![]),
        ];
        let count = GfxWriteDescriptorSet::with_writes(&writes, |vk_writes| {
            assert_eq!(vk_writes[0].dst_array_element, 3);
            assert_eq!(vk_writes[0].descriptor_count, 1);
            vk_writes.len()
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_layout_binding() {
        let binding = GfxDescriptorBinding::new(2, vk::DescriptorType::UNIFORM_BUFFER, 1, vk::ShaderStageFlags::VERTEX)
            .with_flags(vk::DescriptorBindingFlags::PARTIALLY_BOUND);
        let layout_binding = binding.layout_binding();
        assert_eq!(layout_binding.binding, 2);
        assert_eq!(layout_binding.descriptor_count, 1);
        assert_eq!(binding.flags, vk::DescriptorBindingFlags::PARTIALLY_BOUND);
    }
}
