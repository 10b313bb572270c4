use ash::vk;
use itertools::Itertools;

use crate::{
    error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx,
    utilities::descriptor_cursor::GfxDescriptorBinding,
};

pub struct GfxDescriptorSetLayout {
    handle: vk::DescriptorSetLayout,
    bindings: Vec<GfxDescriptorBinding>,
}

impl GfxDescriptorSetLayout {
    /// Per-binding flags are chained only when at least one binding has some.
    pub fn new(
        bindings: &[GfxDescriptorBinding],
        flags: vk::DescriptorSetLayoutCreateFlags,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let vk_bindings = bindings.iter().map(GfxDescriptorBinding::layout_binding).collect_vec();
        let binding_flags = bindings.iter().map(|binding| binding.flags).collect_vec();
        let mut binding_flags_ci =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let mut create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings).flags(flags);
        if binding_flags.iter().any(|flags| !flags.is_empty()) {
            create_info = create_info.push_next(&mut binding_flags_ci);
        }

        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_descriptor_set_layout(&create_info, None)? };
        let layout = Self {
            handle,
            bindings: bindings.to_vec(),
        };
        if let Err(e) = gfx_device.set_debug_name(&layout, debug_name) {
            layout.destroy();
            return Err(e);
        }
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    #[inline]
    pub fn bindings(&self) -> &[GfxDescriptorBinding] {
        &self.bindings
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_descriptor_set_layout(self.handle, None) };
    }
}
impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
