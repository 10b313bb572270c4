use crate::handles::{BufferHandle, DescriptorSetHandle, SamplerHandle, TextureHandle};

/// Texture slots a material can fill.
pub const MATERIAL_TEXTURE_SLOTS: usize = 4;

/// Texture index pushed for an empty material slot; shaders test for it.
pub const NO_TEXTURE: u32 = u32::MAX;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mesh {
    pub vertex_buffer: BufferHandle,
    /// `u32` indices
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Material {
    /// bound at set 2; `None` uses the renderer's default material set
    pub descriptor_set: Option<DescriptorSetHandle>,
    pub textures: [Option<TextureHandle>; MATERIAL_TEXTURE_SLOTS],
    /// sampler the material's textures are read with
    pub sampler: SamplerHandle,
}

/// One draw, produced fresh by the scene every frame and read-only during recording.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderItem {
    pub transform: glam::Mat4,
    pub mesh: Mesh,
    pub material: Material,
}

/// Camera uniform, set 0 binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraData {
    pub view: glam::Mat4,
    pub projection: glam::Mat4,
}
impl Default for CameraData {
    fn default() -> Self {
        Self {
            view: glam::Mat4::IDENTITY,
            projection: glam::Mat4::IDENTITY,
        }
    }
}

/// Per-material uniform, set 2 binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialParams {
    pub base_color: glam::Vec4,
}
impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: glam::Vec4::ONE,
        }
    }
}

/// Push-constant block of the mesh pipeline, vertex and fragment stages.
///
/// `texture_indices` are bindless array elements, [`NO_TEXTURE`] for an empty slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshPushConstants {
    pub model: glam::Mat4,
    pub texture_indices: [u32; MATERIAL_TEXTURE_SLOTS],
}
impl MeshPushConstants {
    pub fn new(model: glam::Mat4, textures: &[Option<TextureHandle>; MATERIAL_TEXTURE_SLOTS]) -> Self {
        Self {
            model,
            texture_indices: textures.map(|texture| texture.map_or(NO_TEXTURE, |handle| handle.index())),
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Push-constant block of the composite pipeline: which viewport image to sample.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CompositePushConstants {
    pub viewport_texture: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::Handle;

    #[test]
    fn test_push_constant_layout() {
        // 128 bytes is the guaranteed minimum maxPushConstantsSize
        assert_eq!(size_of::<MeshPushConstants>(), 80);
        assert_eq!(std::mem::offset_of!(MeshPushConstants, texture_indices), 64);
        assert_eq!(size_of::<CameraData>(), 128);
    }

    #[test]
    fn test_texture_indices_follow_handles() {
        let textures = [Some(Handle::new(7, 2)), None, Some(Handle::new(0, 9)), None];
        let pc = MeshPushConstants::new(glam::Mat4::IDENTITY, &textures);
        assert_eq!(pc.texture_indices, [7, NO_TEXTURE, 0, NO_TEXTURE]);
        assert_eq!(pc.as_bytes().len(), 80);
        assert_eq!(&pc.as_bytes()[64..68], &7u32.to_ne_bytes());
    }
}
