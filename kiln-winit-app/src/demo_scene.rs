use std::path::Path;

use anyhow::Context;
use ash::vk;
use kiln_gfx::sampler::GfxSamplerDesc;
use kiln_render_interface::{
    handles::{BufferHandle, DescriptorSetHandle, SamplerHandle, TextureHandle},
    render_data::{CameraData, Material, MaterialParams, Mesh, RenderItem},
    resource_manager::{BufferDesc, DescriptorSetDesc, MemoryLocation, SamplerDesc, TextureDesc},
    resource_registry::{RegistryKey, ResourceRegistry},
};
use kiln_renderer::renderer::Renderer;

use crate::mesh_data::{MeshData, checker_pixels};

const CUBE_MESH: &str = "cube";
const GROUND_MESH: &str = "ground";
const GRID_SIDE: usize = 8;
const GRID_SPACING: f32 = 1.6;

/// GPU buffers of one registry mesh.
#[derive(Clone, Copy, Debug)]
pub struct MeshAsset {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}
impl MeshAsset {
    fn upload(renderer: &mut Renderer, name: &str, mesh: &MeshData) -> anyhow::Result<Self> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let vertex_buffer = renderer.create_buffer(&BufferDesc {
            size: vertex_bytes.len() as vk::DeviceSize,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER,
            memory: MemoryLocation::GpuOnly,
            initial_data: Some(vertex_bytes),
            name: &format!("{name}-vertices"),
        })?;
        let index_buffer = renderer.create_buffer(&BufferDesc {
            size: index_bytes.len() as vk::DeviceSize,
            usage: vk::BufferUsageFlags::INDEX_BUFFER,
            memory: MemoryLocation::GpuOnly,
            initial_data: Some(index_bytes),
            name: &format!("{name}-indices"),
        })?;
        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    fn mesh(&self) -> Mesh {
        Mesh {
            vertex_buffer: self.vertex_buffer,
            index_buffer: self.index_buffer,
            index_count: self.index_count,
        }
    }

    fn destroy(self, renderer: &mut Renderer) -> anyhow::Result<()> {
        renderer.destroy_buffer(self.index_buffer)?;
        renderer.destroy_buffer(self.vertex_buffer)?;
        Ok(())
    }
}

struct DemoMaterial {
    buffer: BufferHandle,
    set: DescriptorSetHandle,
}

/// Centers of a `side` x `side` grid in the XZ plane, row by row.
pub fn grid_positions(side: usize, spacing: f32) -> Vec<glam::Vec3> {
    let offset = (side as f32 - 1.0) * spacing * 0.5;
    (0..side * side)
        .map(|i| glam::vec3((i % side) as f32 * spacing - offset, 0.5, (i / side) as f32 * spacing - offset))
        .collect()
}

/// Right-handed perspective with Y flipped for Vulkan clip space.
pub fn vulkan_projection(fov_y_rad: f32, aspect: f32) -> glam::Mat4 {
    let mut projection = glam::Mat4::perspective_rh(fov_y_rad, aspect.max(f32::EPSILON), 0.1, 200.0);
    projection.y_axis.y *= -1.0;
    projection
}

/// A grid of spinning textured cubes over a ground plane.
///
/// Owns everything it creates and gives it back through [`Self::destroy`]; the renderer never
/// reaches into the scene.
pub struct DemoScene {
    meshes: ResourceRegistry<MeshAsset>,
    cube: RegistryKey,
    ground: RegistryKey,

    texture: TextureHandle,
    linear_sampler: SamplerHandle,
    nearest_sampler: SamplerHandle,
    use_nearest: bool,
    materials: Vec<DemoMaterial>,

    positions: Vec<glam::Vec3>,
    time_s: f32,
}

// new & init
impl DemoScene {
    pub fn new(renderer: &mut Renderer, texture_path: Option<&Path>) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("DemoScene::new");

        let mut meshes = ResourceRegistry::new();
        let cube = meshes.load(CUBE_MESH, || MeshAsset::upload(renderer, CUBE_MESH, &MeshData::cube()))?;
        let ground = meshes.load(GROUND_MESH, || MeshAsset::upload(renderer, GROUND_MESH, &MeshData::ground(8.0)))?;

        let linear_sampler = renderer.default_sampler();
        let nearest_sampler = renderer.create_sampler(&SamplerDesc {
            desc: GfxSamplerDesc {
                address_mode: vk::SamplerAddressMode::REPEAT,
                ..GfxSamplerDesc::nearest_clamp()
            },
            name: "demo-nearest",
        })?;
        let texture = Self::load_texture(renderer, texture_path, linear_sampler)?;

        let tints = [
            glam::vec4(1.0, 1.0, 1.0, 1.0),
            glam::vec4(1.0, 0.55, 0.35, 1.0),
            glam::vec4(0.4, 0.7, 1.0, 1.0),
        ];
        let material_layout = renderer.material_layout();
        let materials = tints
            .iter()
            .enumerate()
            .map(|(i, tint)| {
                let params = MaterialParams { base_color: *tint };
                let buffer = renderer.create_buffer(&BufferDesc {
                    size: size_of::<MaterialParams>() as vk::DeviceSize,
                    usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
                    memory: MemoryLocation::GpuOnly,
                    initial_data: Some(bytemuck::bytes_of(&params)),
                    name: &format!("material-{i}"),
                })?;
                let set = renderer.create_descriptor_set(&DescriptorSetDesc {
                    layout: material_layout,
                    buffers: vec![(0, buffer)],
                    name: &format!("material-{i}"),
                })?;
                Ok(DemoMaterial { buffer, set })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            meshes,
            cube,
            ground,
            texture,
            linear_sampler,
            nearest_sampler,
            use_nearest: false,
            materials,
            positions: grid_positions(GRID_SIDE, GRID_SPACING),
            time_s: 0.0,
        })
    }

    /// `path` is decoded with `image`; without one a checkerboard is generated.
    fn load_texture(renderer: &mut Renderer, path: Option<&Path>, sampler: SamplerHandle) -> anyhow::Result<TextureHandle> {
        let (extent, pixels, name) = match path {
            Some(path) => {
                let image = image::open(path).with_context(|| format!("failed to load texture {}", path.display()))?;
                let rgba = image.into_rgba8();
                let extent = vk::Extent2D {
                    width: rgba.width(),
                    height: rgba.height(),
                };
                (extent, rgba.into_raw(), path.display().to_string())
            }
            None => (
                vk::Extent2D {
                    width: 256,
                    height: 256,
                },
                checker_pixels(256, 8, [40, 40, 48, 255], [220, 220, 210, 255]),
                "checker".to_string(),
            ),
        };
        log::info!("demo texture {} ({}x{})", name, extent.width, extent.height);

        Ok(renderer.create_texture(&TextureDesc {
            extent,
            format: vk::Format::R8G8B8A8_SRGB,
            pixels: &pixels,
            sampler,
            name: &name,
        })?)
    }
}
// update
impl DemoScene {
    pub fn update(&mut self, delta_time_s: f32) {
        self.time_s += delta_time_s;
    }

    /// Switches every material between linear and nearest filtering of the shared texture.
    pub fn toggle_nearest(&mut self) {
        self.use_nearest = !self.use_nearest;
        log::info!("demo sampler: {}", if self.use_nearest { "nearest" } else { "linear" });
    }
}
// getters
impl DemoScene {
    pub fn camera(&self, extent: vk::Extent2D) -> CameraData {
        let angle = self.time_s * 0.2;
        let eye = glam::vec3(angle.cos() * 16.0, 9.0, angle.sin() * 16.0);
        CameraData {
            view: glam::Mat4::look_at_rh(eye, glam::Vec3::ZERO, glam::Vec3::Y),
            projection: vulkan_projection(45f32.to_radians(), extent.width as f32 / extent.height.max(1) as f32),
        }
    }

    /// Fresh every frame: the ground first, then the cube grid in row order.
    pub fn render_items(&self) -> anyhow::Result<Vec<RenderItem>> {
        let cube = self.mesh(self.cube)?;
        let ground = self.mesh(self.ground)?;
        let sampler = if self.use_nearest { self.nearest_sampler } else { self.linear_sampler };
        let material = |i: usize| Material {
            descriptor_set: Some(self.materials[i % self.materials.len()].set),
            textures: [Some(self.texture), None, None, None],
            sampler,
        };

        let mut items = Vec::with_capacity(self.positions.len() + 1);
        items.push(RenderItem {
            transform: glam::Mat4::IDENTITY,
            mesh: ground,
            material: Material {
                descriptor_set: None,
                ..material(0)
            },
        });
        for (i, position) in self.positions.iter().enumerate() {
            let spin = glam::Quat::from_rotation_y(self.time_s * (0.5 + (i % 5) as f32 * 0.2));
            items.push(RenderItem {
                transform: glam::Mat4::from_rotation_translation(spin, *position),
                mesh: cube,
                material: material(i),
            });
        }
        Ok(items)
    }

    fn mesh(&self, key: RegistryKey) -> anyhow::Result<Mesh> {
        self.meshes.get(key).map(MeshAsset::mesh).context("demo mesh was unloaded")
    }
}
// destroy
impl DemoScene {
    /// Caller-driven teardown: hands every handle back before the renderer goes away.
    pub fn destroy(mut self, renderer: &mut Renderer) -> anyhow::Result<()> {
        for name in [CUBE_MESH, GROUND_MESH] {
            if let Some(mesh) = self.meshes.unload(name)? {
                mesh.destroy(renderer)?;
            }
        }
        for (name, mesh) in self.meshes.drain() {
            log::warn!("mesh {} still referenced at teardown", name);
            mesh.destroy(renderer)?;
        }
        for material in self.materials {
            renderer.destroy_descriptor_set(material.set)?;
            renderer.destroy_buffer(material.buffer)?;
        }
        renderer.destroy_texture(self.texture)?;
        renderer.destroy_sampler(self.nearest_sampler)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_is_centered() {
        let positions = grid_positions(GRID_SIDE, GRID_SPACING);
        assert_eq!(positions.len(), GRID_SIDE * GRID_SIDE);
        let sum = positions.iter().fold(glam::Vec3::ZERO, |acc, p| acc + *p);
        let center = sum / positions.len() as f32;
        assert!(center.x.abs() < 1e-4 && center.z.abs() < 1e-4);
        assert_eq!(positions[1].x - positions[0].x, GRID_SPACING);
    }

    #[test]
    fn test_projection_flips_y() {
        let projection = vulkan_projection(45f32.to_radians(), 16.0 / 9.0);
        // a point above the view axis lands in the upper half, which is -Y in Vulkan clip space
        let clip = projection * glam::vec4(0.0, 1.0, -5.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
        // a zero-height window does not produce NaNs
        assert!(!vulkan_projection(1.0, 0.0).is_nan());
    }
}
