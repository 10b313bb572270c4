use std::path::PathBuf;

use ash::vk;
use kiln_crate_tools::resource::KilnPath;
use kiln_gfx::pipelines::graphics_pipeline::{GfxDepthState, GfxGraphicsPipelineCreateInfo, GfxRasterState};
use kiln_render_interface::{
    handles::{DescriptorSetLayoutHandle, PipelineHandle},
    render_data::{CompositePushConstants, MeshPushConstants},
    resource_manager::{PipelineDesc, ResourceManager},
    vertex::Vertex,
};

use crate::{error::RendererResult, present::render_passes::RenderPasses};

/// Cache file shared by every pipeline the renderer builds.
pub const PIPELINE_CACHE_FILE: &str = "kiln-pipelines.bin";

/// Set layouts the frame pipelines are built against.
#[derive(Clone, Copy, Debug)]
pub struct PipelineLayouts {
    pub camera: DescriptorSetLayoutHandle,
    pub bindless: DescriptorSetLayoutHandle,
    pub material: DescriptorSetLayoutHandle,
}

fn push_range<T>(stages: vk::ShaderStageFlags) -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: stages,
        offset: 0,
        size: size_of::<T>() as u32,
    }
}

/// Scene geometry: camera at set 0, bindless textures at set 1, material at set 2.
pub fn mesh_pipeline_desc<'a>(
    layouts: &PipelineLayouts,
    render_pass: vk::RenderPass,
    cache_path: PathBuf,
) -> PipelineDesc<'a> {
    let mut create_info = GfxGraphicsPipelineCreateInfo::new(
        KilnPath::shader_build_path("mesh.vert"),
        KilnPath::shader_build_path("mesh.frag"),
    );
    create_info.vertex_bindings = Vertex::vertex_input_bindings();
    create_info.vertex_attributes = Vertex::vertex_input_attributes();
    create_info.depth = Some(GfxDepthState::default());

    PipelineDesc {
        create_info,
        set_layouts: vec![layouts.camera, layouts.bindless, layouts.material],
        push_constant_ranges: vec![push_range::<MeshPushConstants>(
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )],
        render_pass,
        cache_path,
        name: "mesh",
    }
}

/// Fullscreen triangle sampling one viewport image out of the bindless table.
pub fn composite_pipeline_desc<'a>(
    layouts: &PipelineLayouts,
    render_pass: vk::RenderPass,
    cache_path: PathBuf,
) -> PipelineDesc<'a> {
    let mut create_info = GfxGraphicsPipelineCreateInfo::new(
        KilnPath::shader_build_path("composite.vert"),
        KilnPath::shader_build_path("composite.frag"),
    );
    create_info.raster = GfxRasterState {
        cull_mode: vk::CullModeFlags::NONE,
        ..Default::default()
    };

    PipelineDesc {
        create_info,
        set_layouts: vec![layouts.bindless],
        push_constant_ranges: vec![push_range::<CompositePushConstants>(vk::ShaderStageFlags::FRAGMENT)],
        render_pass,
        cache_path,
        name: "composite",
    }
}

/// Fullscreen triangle at the far plane; drawn first, so scene geometry covers it.
pub fn skybox_pipeline_desc<'a>(
    layouts: &PipelineLayouts,
    render_pass: vk::RenderPass,
    cache_path: PathBuf,
) -> PipelineDesc<'a> {
    let mut create_info = GfxGraphicsPipelineCreateInfo::new(
        KilnPath::shader_build_path("skybox.vert"),
        KilnPath::shader_build_path("skybox.frag"),
    );
    create_info.raster = GfxRasterState {
        cull_mode: vk::CullModeFlags::NONE,
        ..Default::default()
    };
    create_info.depth = Some(GfxDepthState {
        test: true,
        write: false,
        compare_op: vk::CompareOp::LESS_OR_EQUAL,
    });

    PipelineDesc {
        create_info,
        // same set 0 as the mesh pipeline, so the camera set stays compatible across both
        set_layouts: vec![layouts.camera],
        push_constant_ranges: vec![],
        render_pass,
        cache_path,
        name: "skybox",
    }
}

/// The pipelines every frame records with.
#[derive(Clone, Copy, Debug)]
pub struct FramePipelines {
    pub mesh: PipelineHandle,
    pub composite: PipelineHandle,
    pub skybox: Option<PipelineHandle>,
}
impl FramePipelines {
    pub fn new(
        resources: &mut ResourceManager,
        layouts: &PipelineLayouts,
        passes: &RenderPasses,
        cache_path: PathBuf,
        with_skybox: bool,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("FramePipelines::new");

        let mesh = resources.create_pipeline(&mesh_pipeline_desc(layouts, passes.viewport.handle(), cache_path.clone()))?;
        let composite =
            resources.create_pipeline(&composite_pipeline_desc(layouts, passes.main.handle(), cache_path.clone()))?;
        let skybox = match with_skybox {
            true => Some(resources.create_pipeline(&skybox_pipeline_desc(layouts, passes.viewport.handle(), cache_path))?),
            false => None,
        };
        Ok(Self { mesh, composite, skybox })
    }
}

#[cfg(test)]
mod tests {
    use kiln_render_interface::resource_pool::ResourcePool;

    use super::*;

    fn layouts() -> PipelineLayouts {
        let mut pool = ResourcePool::<(), _>::new(3);
        PipelineLayouts {
            camera: pool.acquire(()).unwrap(),
            bindless: pool.acquire(()).unwrap(),
            material: pool.acquire(()).unwrap(),
        }
    }

    #[test]
    fn test_mesh_pipeline_sets_and_push_range() {
        let layouts = layouts();
        let desc = mesh_pipeline_desc(&layouts, vk::RenderPass::null(), PathBuf::from("cache.bin"));
        assert_eq!(desc.set_layouts, vec![layouts.camera, layouts.bindless, layouts.material]);

        let range = desc.push_constant_ranges[0];
        assert_eq!(range.size, 80);
        assert!(range.size <= 128);
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::FRAGMENT));
        assert!(desc.create_info.depth.is_some_and(|depth| depth.write));
        assert!(desc.create_info.vertex_shader.ends_with("shader/.build/mesh.vert.spv"));
    }

    #[test]
    fn test_skybox_shares_camera_set() {
        let layouts = layouts();
        let mesh = mesh_pipeline_desc(&layouts, vk::RenderPass::null(), PathBuf::from("cache.bin"));
        let skybox = skybox_pipeline_desc(&layouts, vk::RenderPass::null(), PathBuf::from("cache.bin"));
        assert_eq!(skybox.set_layouts[0], mesh.set_layouts[0]);
        let depth = skybox.create_info.depth.unwrap();
        assert!(!depth.write);
        assert_eq!(depth.compare_op, vk::CompareOp::LESS_OR_EQUAL);
    }

    #[test]
    fn test_composite_has_no_depth() {
        let layouts = layouts();
        let desc = composite_pipeline_desc(&layouts, vk::RenderPass::null(), PathBuf::from("cache.bin"));
        assert!(desc.create_info.depth.is_none());
        assert_eq!(desc.set_layouts, vec![layouts.bindless]);
        assert_eq!(desc.push_constant_ranges[0].size, 4);
    }
}
