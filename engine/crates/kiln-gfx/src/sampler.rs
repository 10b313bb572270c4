use ash::vk;

use crate::{error::GfxResult, gfx::Gfx};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GfxSamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub address_mode: vk::SamplerAddressMode,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub compare_op: Option<vk::CompareOp>,
}
impl Default for GfxSamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            compare_op: None,
        }
    }
}
impl GfxSamplerDesc {
    pub fn nearest_clamp() -> Self {
        Self {
            mag_filter: vk::Filter::NEAREST,
            min_filter: vk::Filter::NEAREST,
            address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            mipmap_mode: vk::SamplerMipmapMode::NEAREST,
            compare_op: None,
        }
    }

    pub fn as_info(&self) -> vk::SamplerCreateInfo<'static> {
        vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter)
            .min_filter(self.min_filter)
            .address_mode_u(self.address_mode)
            .address_mode_v(self.address_mode)
            .address_mode_w(self.address_mode)
            .mipmap_mode(self.mipmap_mode)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .anisotropy_enable(false)
            .compare_enable(self.compare_op.is_some())
            .compare_op(self.compare_op.unwrap_or(vk::CompareOp::NEVER))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
    }
}

/// Released on drop.
pub struct GfxSampler {
    handle: vk::Sampler,
    desc: GfxSamplerDesc,
}
// new & init
impl GfxSampler {
    pub fn new(desc: &GfxSamplerDesc, name: impl AsRef<str>) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_sampler(&desc.as_info(), None)? };
        let sampler = Self { handle, desc: *desc };
        gfx_device.set_object_debug_name(handle, format!("GfxSampler::{}", name.as_ref()))?;
        Ok(sampler)
    }
}
// getters
impl GfxSampler {
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxSamplerDesc {
        &self.desc
    }
}
impl Drop for GfxSampler {
    fn drop(&mut self) {
        unsafe { Gfx::get().gfx_device().destroy_sampler(self.handle, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_info_from_desc() {
        let info = GfxSamplerDesc::nearest_clamp().as_info();
        assert_eq!(info.mag_filter, vk::Filter::NEAREST);
        assert_eq!(info.address_mode_w, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.compare_enable, vk::FALSE);

        let shadow = GfxSamplerDesc {
            compare_op: Some(vk::CompareOp::LESS),
            ..Default::default()
        };
        assert_eq!(shadow.as_info().compare_enable, vk::TRUE);
    }
}
