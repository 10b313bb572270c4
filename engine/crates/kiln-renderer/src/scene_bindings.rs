use ash::vk;
use kiln_gfx::{sampler::GfxSamplerDesc, utilities::descriptor_cursor::GfxDescriptorBinding};
use kiln_render_interface::{
    frame_counter::FrameCounter,
    handles::{BufferHandle, DescriptorSetHandle, DescriptorSetLayoutHandle, SamplerHandle},
    pipeline_settings::FrameLabel,
    render_data::{CameraData, MaterialParams},
    resource_manager::{
        BufferDesc, DescriptorSetDesc, DescriptorSetLayoutDesc, MemoryLocation, ResourceManager, SamplerDesc,
    },
};

use crate::error::RendererResult;

fn uniform_layout_desc(name: &str) -> DescriptorSetLayoutDesc<'_> {
    DescriptorSetLayoutDesc {
        bindings: vec![GfxDescriptorBinding::new(
            0,
            vk::DescriptorType::UNIFORM_BUFFER,
            1,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )],
        flags: vk::DescriptorSetLayoutCreateFlags::empty(),
        name,
    }
}

/// Renderer-owned objects the scene draws against: the camera uniform of each frame slot, the
/// material fallback and the samplers the renderer itself samples with.
pub struct SceneBindings {
    pub camera_layout: DescriptorSetLayoutHandle,
    pub material_layout: DescriptorSetLayoutHandle,

    /// indexed by frame label; host visible, rewritten every frame
    camera_buffers: Vec<BufferHandle>,
    camera_sets: Vec<DescriptorSetHandle>,

    default_material_buffer: BufferHandle,
    pub default_material_set: DescriptorSetHandle,

    pub default_sampler: SamplerHandle,
    pub viewport_sampler: SamplerHandle,
}

// new & init
impl SceneBindings {
    pub fn new(resources: &mut ResourceManager) -> RendererResult<Self> {
        let camera_layout = resources.create_descriptor_set_layout(&uniform_layout_desc("camera"))?;
        let material_layout = resources.create_descriptor_set_layout(&uniform_layout_desc("material"))?;

        let mut camera_buffers = Vec::with_capacity(FrameCounter::fif_count());
        let mut camera_sets = Vec::with_capacity(FrameCounter::fif_count());
        for label in FrameCounter::frame_labels() {
            let buffer = resources.create_buffer(&BufferDesc {
                size: size_of::<CameraData>() as vk::DeviceSize,
                usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
                memory: MemoryLocation::HostVisible,
                initial_data: Some(bytemuck::bytes_of(&CameraData::default())),
                name: &format!("camera-{label}"),
            })?;
            let set = resources.create_descriptor_set(&DescriptorSetDesc {
                layout: camera_layout,
                buffers: vec![(0, buffer)],
                name: &format!("camera-{label}"),
            })?;
            camera_buffers.push(buffer);
            camera_sets.push(set);
        }

        let default_material_buffer = resources.create_buffer(&BufferDesc {
            size: size_of::<MaterialParams>() as vk::DeviceSize,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            memory: MemoryLocation::GpuOnly,
            initial_data: Some(bytemuck::bytes_of(&MaterialParams::default())),
            name: "default-material",
        })?;
        let default_material_set = resources.create_descriptor_set(&DescriptorSetDesc {
            layout: material_layout,
            buffers: vec![(0, default_material_buffer)],
            name: "default-material",
        })?;

        let default_sampler = resources.create_sampler(&SamplerDesc {
            desc: GfxSamplerDesc::default(),
            name: "default-linear-repeat",
        })?;
        let viewport_sampler = resources.create_sampler(&SamplerDesc {
            desc: GfxSamplerDesc::nearest_clamp(),
            name: "viewport",
        })?;

        Ok(Self {
            camera_layout,
            material_layout,
            camera_buffers,
            camera_sets,
            default_material_buffer,
            default_material_set,
            default_sampler,
            viewport_sampler,
        })
    }
}
// getters
impl SceneBindings {
    #[inline]
    pub fn camera_set(&self, label: FrameLabel) -> DescriptorSetHandle {
        self.camera_sets[*label]
    }
}
// update
impl SceneBindings {
    /// The slot's previous frame has retired, so its buffer is free to overwrite.
    pub fn write_camera(&self, resources: &ResourceManager, label: FrameLabel, camera: &CameraData) -> RendererResult<()> {
        resources.buffer(self.camera_buffers[*label])?.write_mapped(std::slice::from_ref(camera))?;
        Ok(())
    }
}
// destroy
impl SceneBindings {
    pub fn destroy(self, resources: &mut ResourceManager) -> RendererResult<()> {
        for set in self.camera_sets {
            resources.destroy_descriptor_set(set)?;
        }
        for buffer in self.camera_buffers {
            resources.destroy_buffer(buffer)?;
        }
        resources.destroy_descriptor_set(self.default_material_set)?;
        resources.destroy_buffer(self.default_material_buffer)?;
        resources.destroy_sampler(self.viewport_sampler)?;
        resources.destroy_sampler(self.default_sampler)?;
        resources.destroy_descriptor_set_layout(self.material_layout)?;
        resources.destroy_descriptor_set_layout(self.camera_layout)?;
        Ok(())
    }
}
