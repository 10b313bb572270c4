use std::{collections::HashMap, ops::Range, sync::Arc};

use ash::vk;
use kiln_gfx::{commands::command_buffer::GfxCommandBuffer, error::GfxResult};
use kiln_render_interface::{
    handles::{BufferHandle, DescriptorSetHandle, SamplerHandle, TextureHandle},
    pipeline_settings::FrameLabel,
    render_data::{MeshPushConstants, RenderItem},
    resource_manager::ResourceManager,
    resource_pool::PoolError,
};

use crate::{
    cmd_allocator::CmdAllocator,
    error::RendererResult,
    partition::plan_partitions,
    task_group::WorkerPool,
};

/// Everything one draw needs, with every handle already turned into a raw Vulkan object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedDraw {
    pub push: MeshPushConstants,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub material_set: vk::DescriptorSet,
}

/// Lookups the resolve step needs from the resource pools.
pub trait DrawSource {
    fn vk_buffer(&self, handle: BufferHandle) -> Result<vk::Buffer, PoolError>;
    fn texture_sampler(&self, handle: TextureHandle) -> Result<SamplerHandle, PoolError>;
    fn check_sampler(&self, handle: SamplerHandle) -> Result<(), PoolError>;
    fn vk_descriptor_set(&self, handle: DescriptorSetHandle) -> Result<vk::DescriptorSet, PoolError>;
}

impl DrawSource for ResourceManager {
    fn vk_buffer(&self, handle: BufferHandle) -> Result<vk::Buffer, PoolError> {
        self.buffer(handle).map(|buffer| buffer.vk_buffer())
    }

    fn texture_sampler(&self, handle: TextureHandle) -> Result<SamplerHandle, PoolError> {
        self.texture(handle).map(|texture| texture.sampler())
    }

    fn check_sampler(&self, handle: SamplerHandle) -> Result<(), PoolError> {
        self.sampler(handle).map(|_| ())
    }

    fn vk_descriptor_set(&self, handle: DescriptorSetHandle) -> Result<vk::DescriptorSet, PoolError> {
        self.descriptor_set(handle).map(|set| set.handle())
    }
}

/// Output of [`resolve_draws`].
#[derive(Debug, Default)]
pub struct Resolution {
    /// same order as the render list
    pub draws: Vec<ResolvedDraw>,
    /// textures whose bindless slot must be rewritten with a new sampler before recording
    pub sampler_changes: Vec<(TextureHandle, SamplerHandle)>,
}

/// Turns the scene's render list into [`ResolvedDraw`]s.
///
/// Any stale handle fails the whole list, before anything is recorded. A texture referenced by
/// several materials ends up with the sampler of the last one in list order.
pub fn resolve_draws(
    source: &impl DrawSource,
    items: &[RenderItem],
    default_material_set: vk::DescriptorSet,
) -> Result<Resolution, PoolError> {
    let mut wanted_samplers: HashMap<TextureHandle, SamplerHandle> = HashMap::new();
    let mut first_seen: Vec<TextureHandle> = Vec::new();

    let mut draws = Vec::with_capacity(items.len());
    for item in items {
        let material = &item.material;
        source.check_sampler(material.sampler)?;
        for texture in material.textures.iter().flatten() {
            // validates the handle as well
            source.texture_sampler(*texture)?;
            if wanted_samplers.insert(*texture, material.sampler).is_none() {
                first_seen.push(*texture);
            }
        }

        let material_set = match material.descriptor_set {
            Some(set) => source.vk_descriptor_set(set)?,
            None => default_material_set,
        };
        draws.push(ResolvedDraw {
            push: MeshPushConstants::new(item.transform, &material.textures),
            vertex_buffer: source.vk_buffer(item.mesh.vertex_buffer)?,
            index_buffer: source.vk_buffer(item.mesh.index_buffer)?,
            index_count: item.mesh.index_count,
            material_set,
        });
    }

    let mut sampler_changes = Vec::new();
    for texture in first_seen {
        let wanted = wanted_samplers[&texture];
        if source.texture_sampler(texture)? != wanted {
            sampler_changes.push((texture, wanted));
        }
    }

    Ok(Resolution { draws, sampler_changes })
}

/// Raw objects every secondary of the viewport pass binds.
#[derive(Clone, Copy, Debug)]
pub struct RecordContext {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    /// set 0
    pub camera_set: vk::DescriptorSet,
    /// set 1
    pub bindless_set: vk::DescriptorSet,
}

/// Fullscreen-triangle pipeline drawn behind the scene; binds the camera set only.
#[derive(Clone, Copy, Debug)]
pub struct SkyboxDraw {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

/// Records `draws` into `cmd` as a continuation of the viewport pass.
pub fn record_partition(cmd: &GfxCommandBuffer, ctx: &RecordContext, draws: &[ResolvedDraw], label: &str) -> GfxResult<()> {
    cmd.begin_secondary(ctx.render_pass, ctx.framebuffer, label)?;
    cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, ctx.pipeline);
    cmd.set_viewport_and_scissor(ctx.extent);
    cmd.bind_descriptor_sets(
        vk::PipelineBindPoint::GRAPHICS,
        ctx.layout,
        0,
        &[ctx.camera_set, ctx.bindless_set],
    );

    let mut bound_material = vk::DescriptorSet::null();
    for draw in draws {
        if draw.material_set != bound_material {
            cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, ctx.layout, 2, &[draw.material_set]);
            bound_material = draw.material_set;
        }
        cmd.push_constants(
            ctx.layout,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            draw.push.as_bytes(),
        );
        cmd.bind_vertex_buffers(0, &[draw.vertex_buffer], &[0]);
        cmd.bind_index_buffer(draw.index_buffer, 0, vk::IndexType::UINT32);
        cmd.draw_indexed(draw.index_count, 0, 0);
    }
    cmd.end()
}

pub fn record_skybox(cmd: &GfxCommandBuffer, ctx: &RecordContext, skybox: &SkyboxDraw, label: &str) -> GfxResult<()> {
    cmd.begin_secondary(ctx.render_pass, ctx.framebuffer, label)?;
    cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, skybox.pipeline);
    cmd.set_viewport_and_scissor(ctx.extent);
    cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, skybox.layout, 0, &[ctx.camera_set]);
    cmd.draw(3, 0);
    cmd.end()
}

/// One secondary to record: a lane and what goes into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaneJob {
    Skybox { lane: usize },
    Draws { lane: usize, range: Range<usize> },
}

/// Jobs in execute order: the skybox first when enabled, then one job per partition.
pub fn plan_lane_jobs(item_count: usize, workers: usize, skybox_lane: Option<usize>) -> Vec<LaneJob> {
    skybox_lane
        .map(|lane| LaneJob::Skybox { lane })
        .into_iter()
        .chain(
            plan_partitions(item_count, workers)
                .into_iter()
                .enumerate()
                .map(|(lane, range)| LaneJob::Draws { lane, range }),
        )
        .collect()
}

/// Records the viewport pass body across the worker pool.
pub struct ParallelRecorder {
    workers: WorkerPool,
}

// new & init
impl ParallelRecorder {
    pub fn new(workers: WorkerPool) -> Self {
        Self { workers }
    }
}
// getters
impl ParallelRecorder {
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.thread_count()
    }
}
// tools
impl ParallelRecorder {
    /// Returns the recorded secondaries in the order they must be executed.
    ///
    /// Each job records into a different lane of `frame_label`'s slot. The call returns only after
    /// every job has finished, even when one of them failed.
    pub fn record(
        &self,
        allocator: &CmdAllocator,
        frame_label: FrameLabel,
        ctx: RecordContext,
        skybox: Option<SkyboxDraw>,
        draws: Arc<[ResolvedDraw]>,
    ) -> RendererResult<Vec<GfxCommandBuffer>> {
        let _span = tracy_client::span!("ParallelRecorder::record");

        let lanes = allocator.layout();
        let jobs = plan_lane_jobs(draws.len(), self.workers.thread_count(), skybox.map(|_| lanes.skybox_lane()));
        log::trace!("[{}] recording {} draws in {} secondaries", frame_label, draws.len(), jobs.len());

        let mut group = self.workers.task_group::<GfxResult<GfxCommandBuffer>>();
        for job in jobs {
            match (job, skybox) {
                (LaneJob::Skybox { lane }, Some(skybox)) => {
                    let cmd = allocator.secondary(frame_label, lane);
                    group.spawn(move || {
                        record_skybox(&cmd, &ctx, &skybox, "skybox")?;
                        Ok(cmd)
                    });
                }
                (LaneJob::Skybox { .. }, None) => (),
                (LaneJob::Draws { lane, range }, _) => {
                    debug_assert!(lane < lanes.partition_lanes());
                    let cmd = allocator.secondary(frame_label, lane);
                    let draws = draws.clone();
                    group.spawn(move || {
                        let label = format!("draws-{}..{}", range.start, range.end);
                        record_partition(&cmd, &ctx, &draws[range], &label)?;
                        Ok(cmd)
                    });
                }
            }
        }

        let recorded = group.wait_all()?.into_iter().collect::<GfxResult<Vec<_>>>()?;
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use kiln_render_interface::{
        handles::{BufferKind, DescriptorSetKind, SamplerKind, TextureKind},
        render_data::{Material, Mesh, NO_TEXTURE},
        resource_pool::ResourcePool,
    };
    use ash::vk::Handle as _;

    use super::*;

    struct FakePools {
        buffers: ResourcePool<vk::Buffer, BufferKind>,
        /// the sampler each texture's bindless slot currently uses
        textures: ResourcePool<SamplerHandle, TextureKind>,
        samplers: ResourcePool<(), SamplerKind>,
        sets: ResourcePool<vk::DescriptorSet, DescriptorSetKind>,
    }
    impl DrawSource for FakePools {
        fn vk_buffer(&self, handle: BufferHandle) -> Result<vk::Buffer, PoolError> {
            self.buffers.access(handle).copied()
        }
        fn texture_sampler(&self, handle: TextureHandle) -> Result<SamplerHandle, PoolError> {
            self.textures.access(handle).copied()
        }
        fn check_sampler(&self, handle: SamplerHandle) -> Result<(), PoolError> {
            self.samplers.access(handle).map(|_| ())
        }
        fn vk_descriptor_set(&self, handle: DescriptorSetHandle) -> Result<vk::DescriptorSet, PoolError> {
            self.sets.access(handle).copied()
        }
    }

    struct Scene {
        pools: FakePools,
        mesh: Mesh,
        sampler_a: SamplerHandle,
        sampler_b: SamplerHandle,
        texture: TextureHandle,
    }

    fn scene() -> Scene {
        let mut pools = FakePools {
            buffers: ResourcePool::new(16),
            textures: ResourcePool::new(16),
            samplers: ResourcePool::new(4),
            sets: ResourcePool::new(4),
        };
        let vertex_buffer = pools.buffers.acquire(vk::Buffer::from_raw(10)).unwrap();
        let index_buffer = pools.buffers.acquire(vk::Buffer::from_raw(11)).unwrap();
        let sampler_a = pools.samplers.acquire(()).unwrap();
        let sampler_b = pools.samplers.acquire(()).unwrap();
        let texture = pools.textures.acquire(sampler_a).unwrap();
        Scene {
            pools,
            mesh: Mesh {
                vertex_buffer,
                index_buffer,
                index_count: 36,
            },
            sampler_a,
            sampler_b,
            texture,
        }
    }

    fn item(scene: &Scene, x: f32, sampler: SamplerHandle, set: Option<DescriptorSetHandle>) -> RenderItem {
        RenderItem {
            transform: glam::Mat4::from_translation(glam::vec3(x, 0.0, 0.0)),
            mesh: scene.mesh,
            material: Material {
                descriptor_set: set,
                textures: [Some(scene.texture), None, None, None],
                sampler,
            },
        }
    }

    #[test]
    fn test_draws_keep_list_order() {
        let mut scene = scene();
        let set = scene.pools.sets.acquire(vk::DescriptorSet::from_raw(77)).unwrap();
        let items: Vec<_> = (0..5)
            .map(|i| item(&scene, i as f32, scene.sampler_a, (i % 2 == 0).then_some(set)))
            .collect();

        let default_set = vk::DescriptorSet::from_raw(5);
        let resolution = resolve_draws(&scene.pools, &items, default_set).unwrap();
        assert_eq!(resolution.draws.len(), 5);
        for (i, draw) in resolution.draws.iter().enumerate() {
            assert_eq!(draw.push.model.w_axis.x, i as f32);
            assert_eq!(draw.push.texture_indices, [scene.texture.index(), NO_TEXTURE, NO_TEXTURE, NO_TEXTURE]);
            assert_eq!(draw.vertex_buffer, vk::Buffer::from_raw(10));
            assert_eq!(draw.index_buffer, vk::Buffer::from_raw(11));
            assert_eq!(draw.index_count, 36);
            let expected_set = if i % 2 == 0 { vk::DescriptorSet::from_raw(77) } else { default_set };
            assert_eq!(draw.material_set, expected_set);
        }
        assert!(resolution.sampler_changes.is_empty());
    }

    #[test]
    fn test_stale_handle_fails_whole_list() {
        let mut scene = scene();
        let items = vec![item(&scene, 0.0, scene.sampler_a, None); 3];
        let texture = scene.texture;
        scene.pools.textures.free(texture).unwrap();

        let err = resolve_draws(&scene.pools, &items, vk::DescriptorSet::null()).unwrap_err();
        assert!(matches!(err, PoolError::StaleHandle { kind: "Texture", .. }));

        let mesh_buffer = scene.mesh.vertex_buffer;
        scene.pools.buffers.free(mesh_buffer).unwrap();
        let items = vec![RenderItem {
            material: Material {
                textures: [None; 4],
                ..items[0].material
            },
            ..items[0]
        }];
        let err = resolve_draws(&scene.pools, &items, vk::DescriptorSet::null()).unwrap_err();
        assert!(matches!(err, PoolError::StaleHandle { kind: "Buffer", .. }));
    }

    #[test]
    fn test_last_material_sampler_wins() {
        let scene = scene();
        let items = vec![
            item(&scene, 0.0, scene.sampler_b, None),
            item(&scene, 1.0, scene.sampler_a, None),
            item(&scene, 2.0, scene.sampler_b, None),
        ];
        let resolution = resolve_draws(&scene.pools, &items, vk::DescriptorSet::null()).unwrap();
        assert_eq!(resolution.sampler_changes, vec![(scene.texture, scene.sampler_b)]);

        // already on the wanted sampler: nothing to rewrite
        let items = vec![
            item(&scene, 0.0, scene.sampler_b, None),
            item(&scene, 1.0, scene.sampler_a, None),
        ];
        let resolution = resolve_draws(&scene.pools, &items, vk::DescriptorSet::null()).unwrap();
        assert!(resolution.sampler_changes.is_empty());
    }

    #[test]
    fn test_ten_draws_four_workers_five_secondaries() {
        let jobs = plan_lane_jobs(10, 4, None);
        assert_eq!(
            jobs,
            vec![
                LaneJob::Draws { lane: 0, range: 0..2 },
                LaneJob::Draws { lane: 1, range: 2..4 },
                LaneJob::Draws { lane: 2, range: 4..6 },
                LaneJob::Draws { lane: 3, range: 6..8 },
                LaneJob::Draws { lane: 4, range: 8..10 },
            ]
        );
    }

    #[test]
    fn test_skybox_recorded_first() {
        let jobs = plan_lane_jobs(3, 4, Some(5));
        assert_eq!(jobs[0], LaneJob::Skybox { lane: 5 });
        assert_eq!(jobs.len(), 4);

        // an empty list still draws the skybox
        assert_eq!(plan_lane_jobs(0, 4, Some(5)), vec![LaneJob::Skybox { lane: 5 }]);
        assert!(plan_lane_jobs(0, 4, None).is_empty());
    }
}
