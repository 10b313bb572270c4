use std::{
    collections::{HashMap, hash_map::Entry},
    path::PathBuf,
};

use ash::vk;
use itertools::Itertools;
use kiln_gfx::{
    descriptors::{
        descriptor_pool::GfxDescriptorPool, descriptor_set::GfxDescriptorSet,
        descriptor_set_layout::GfxDescriptorSetLayout,
    },
    error::GfxError,
    gfx::Gfx,
    pipelines::{
        graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineCreateInfo, GfxPipelineLayout},
        pipeline_cache::GfxPipelineCache,
        shader::GfxShaderModuleCache,
    },
    resources::{
        buffer::GfxBuffer,
        image::{GfxImage, texel_size_in_bytes},
        image_view::{GfxImageView, GfxImageViewDesc},
    },
    sampler::{GfxSampler, GfxSamplerDesc},
    utilities::descriptor_cursor::GfxDescriptorBinding,
};

use crate::{
    deferred_destroy::DeferredDestroyQueue,
    frame_counter::FrameCounter,
    handles::{
        BufferHandle, BufferKind, DescriptorSetHandle, DescriptorSetKind, DescriptorSetLayoutHandle,
        DescriptorSetLayoutKind, PipelineHandle, PipelineKind, SamplerHandle, SamplerKind, TextureHandle, TextureKind,
    },
    pipeline_settings::PoolCapacities,
    resource_pool::{PoolError, ResourcePool, RetiredSlot},
};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error("{name}: initial data is {actual} bytes but the buffer holds {size}")]
    InitialDataTooLarge { name: String, size: vk::DeviceSize, actual: usize },

    #[error("{name}: expected {expected} bytes of pixels, got {actual}")]
    PixelDataSize { name: String, expected: usize, actual: usize },

    #[error("{name}: pixels of format {format:?} cannot be uploaded")]
    UnsupportedFormat { name: String, format: vk::Format },

    #[error("{name}: the layout has no binding {binding}")]
    UnknownBinding { name: String, binding: u32 },

    #[error("resource manager used after destroy_all")]
    Destroyed,
}

pub type ResourceResult<T> = Result<T, ResourceError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryLocation {
    /// filled through a staging copy
    GpuOnly,
    /// persistently mapped
    HostVisible,
}

pub struct BufferDesc<'a> {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory: MemoryLocation,
    pub initial_data: Option<&'a [u8]>,
    pub name: &'a str,
}

/// A 2D sampled texture filled from tightly packed pixels.
pub struct TextureDesc<'a> {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub pixels: &'a [u8],
    pub sampler: SamplerHandle,
    pub name: &'a str,
}

pub struct SamplerDesc<'a> {
    pub desc: GfxSamplerDesc,
    pub name: &'a str,
}

pub struct DescriptorSetLayoutDesc<'a> {
    pub bindings: Vec<GfxDescriptorBinding>,
    pub flags: vk::DescriptorSetLayoutCreateFlags,
    pub name: &'a str,
}

/// A set from the shared pool. Each `(binding, buffer)` pair is written as the whole buffer.
pub struct DescriptorSetDesc<'a> {
    pub layout: DescriptorSetLayoutHandle,
    pub buffers: Vec<(u32, BufferHandle)>,
    pub name: &'a str,
}

pub struct PipelineDesc<'a> {
    pub create_info: GfxGraphicsPipelineCreateInfo,
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    pub render_pass: vk::RenderPass,
    /// pipelines naming the same file share one `vk::PipelineCache`
    pub cache_path: PathBuf,
    pub name: &'a str,
}

enum TextureSource {
    Owned { image: GfxImage, view: GfxImageView },
    /// image and view belong to someone else, e.g. the viewport render targets
    External { view: vk::ImageView },
}

pub struct TextureRecord {
    source: TextureSource,
    extent: vk::Extent2D,
    format: vk::Format,
    sampler: SamplerHandle,
    name: String,
}
impl TextureRecord {
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        match &self.source {
            TextureSource::Owned { view, .. } => view.handle(),
            TextureSource::External { view } => *view,
        }
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// sampler the bindless slot was last written with
    #[inline]
    pub fn sampler(&self) -> SamplerHandle {
        self.sampler
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn destroy(self) {
        if let TextureSource::Owned { image, view } = self.source {
            view.destroy();
            image.destroy();
        }
    }
}

pub struct DescriptorSetRecord {
    set: GfxDescriptorSet,
    layout: DescriptorSetLayoutHandle,
}
impl DescriptorSetRecord {
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.set.handle()
    }

    #[inline]
    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.layout
    }
}

enum RetiredResource {
    Buffer(GfxBuffer, RetiredSlot<BufferKind>),
    Texture(TextureRecord, RetiredSlot<TextureKind>),
    Sampler(GfxSampler, RetiredSlot<SamplerKind>),
    DescriptorSetLayout(GfxDescriptorSetLayout, RetiredSlot<DescriptorSetLayoutKind>),
    DescriptorSet(DescriptorSetRecord, RetiredSlot<DescriptorSetKind>),
    Pipeline(GfxGraphicsPipeline, RetiredSlot<PipelineKind>),
}

/// Owner of every GPU object the scene can name.
///
/// Objects live in fixed-capacity pools and are addressed by generation-checked handles.
/// `destroy_*` invalidates the handle at once, but the object itself and its slot index are held
/// for [`FrameCounter::fif_count`] frames, until no in-flight command buffer can reference them.
pub struct ResourceManager {
    buffers: ResourcePool<GfxBuffer, BufferKind>,
    textures: ResourcePool<TextureRecord, TextureKind>,
    samplers: ResourcePool<GfxSampler, SamplerKind>,
    descriptor_set_layouts: ResourcePool<GfxDescriptorSetLayout, DescriptorSetLayoutKind>,
    descriptor_sets: ResourcePool<DescriptorSetRecord, DescriptorSetKind>,
    pipelines: ResourcePool<GfxGraphicsPipeline, PipelineKind>,

    /// shared pool for every set the scene creates; FREE_DESCRIPTOR_SET
    descriptor_pool: Option<GfxDescriptorPool>,
    shader_modules: GfxShaderModuleCache,
    pipeline_caches: HashMap<PathBuf, GfxPipelineCache>,

    pending_destroy: DeferredDestroyQueue<RetiredResource>,
    /// frame id of the last `cleanup`, stamped on everything retired since
    current_frame: u64,

    destroyed: bool,
}

// new & init
impl ResourceManager {
    pub fn new(capacities: &PoolCapacities) -> ResourceResult<Self> {
        let set_count = capacities.descriptor_sets;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: set_count * 2,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: set_count,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: set_count,
            },
        ];
        let descriptor_pool = GfxDescriptorPool::new(
            &pool_sizes,
            set_count,
            vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
            "resource-manager",
        )?;

        log::info!("resource manager capacities: {:?}", capacities);
        Ok(Self {
            buffers: ResourcePool::new(capacities.buffers),
            textures: ResourcePool::new(capacities.textures),
            samplers: ResourcePool::new(capacities.samplers),
            descriptor_set_layouts: ResourcePool::new(capacities.descriptor_set_layouts),
            descriptor_sets: ResourcePool::new(capacities.descriptor_sets),
            pipelines: ResourcePool::new(capacities.pipelines),

            descriptor_pool: Some(descriptor_pool),
            shader_modules: GfxShaderModuleCache::new(),
            pipeline_caches: HashMap::new(),

            pending_destroy: DeferredDestroyQueue::new(FrameCounter::fif_count() as u64),
            current_frame: 0,

            destroyed: false,
        })
    }
}

// create
impl ResourceManager {
    pub fn create_buffer(&mut self, desc: &BufferDesc) -> ResourceResult<BufferHandle> {
        let _span = tracy_client::span!("ResourceManager::create_buffer");

        let data_len = desc.initial_data.map_or(0, <[u8]>::len);
        if data_len as vk::DeviceSize > desc.size {
            return Err(ResourceError::InitialDataTooLarge {
                name: desc.name.to_string(),
                size: desc.size,
                actual: data_len,
            });
        }
        self.buffers.check_available()?;

        let buffer = match desc.memory {
            MemoryLocation::HostVisible => {
                let buffer = GfxBuffer::new(desc.size, desc.usage, true, desc.name)?;
                if let Some(data) = desc.initial_data {
                    buffer.write_mapped(data)?;
                }
                buffer
            }
            MemoryLocation::GpuOnly => {
                let usage = match desc.initial_data {
                    Some(_) => desc.usage | vk::BufferUsageFlags::TRANSFER_DST,
                    None => desc.usage,
                };
                let buffer = GfxBuffer::new(desc.size, usage, false, desc.name)?;
                if let Some(data) = desc.initial_data {
                    buffer.upload_sync(data)?;
                }
                buffer
            }
        };

        Ok(self.buffers.acquire(buffer)?)
    }

    pub fn create_texture(&mut self, desc: &TextureDesc) -> ResourceResult<TextureHandle> {
        let _span = tracy_client::span!("ResourceManager::create_texture");

        self.samplers.access(desc.sampler)?;
        self.textures.check_available()?;
        let texel_size = texel_size_in_bytes(desc.format).ok_or_else(|| ResourceError::UnsupportedFormat {
            name: desc.name.to_string(),
            format: desc.format,
        })?;
        let expected = texel_size * desc.extent.width as usize * desc.extent.height as usize;
        if desc.pixels.len() != expected {
            return Err(ResourceError::PixelDataSize {
                name: desc.name.to_string(),
                expected,
                actual: desc.pixels.len(),
            });
        }

        let image = GfxImage::from_pixels(desc.extent, desc.format, desc.pixels, desc.name)?;
        let view = match GfxImageView::new(
            image.handle(),
            GfxImageViewDesc::new_2d(desc.format, vk::ImageAspectFlags::COLOR),
            desc.name,
        ) {
            Ok(view) => view,
            Err(e) => {
                image.destroy();
                return Err(e.into());
            }
        };

        let record = TextureRecord {
            source: TextureSource::Owned { image, view },
            extent: desc.extent,
            format: desc.format,
            sampler: desc.sampler,
            name: desc.name.to_string(),
        };
        Ok(self.textures.acquire(record)?)
    }

    /// Gives an externally owned view a texture handle, and with it a bindless index.
    ///
    /// The record does not own the view; destroying the handle only frees the index.
    pub fn register_texture(
        &mut self,
        view: vk::ImageView,
        extent: vk::Extent2D,
        format: vk::Format,
        sampler: SamplerHandle,
        name: &str,
    ) -> ResourceResult<TextureHandle> {
        self.samplers.access(sampler)?;
        Ok(self.textures.acquire(TextureRecord {
            source: TextureSource::External { view },
            extent,
            format,
            sampler,
            name: name.to_string(),
        })?)
    }

    pub fn create_sampler(&mut self, desc: &SamplerDesc) -> ResourceResult<SamplerHandle> {
        self.samplers.check_available()?;
        let sampler = GfxSampler::new(&desc.desc, desc.name)?;
        Ok(self.samplers.acquire(sampler)?)
    }

    pub fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorSetLayoutDesc,
    ) -> ResourceResult<DescriptorSetLayoutHandle> {
        self.descriptor_set_layouts.check_available()?;
        let layout = GfxDescriptorSetLayout::new(&desc.bindings, desc.flags, desc.name)?;
        Ok(self.descriptor_set_layouts.acquire(layout)?)
    }

    pub fn create_descriptor_set(&mut self, desc: &DescriptorSetDesc) -> ResourceResult<DescriptorSetHandle> {
        self.descriptor_sets.check_available()?;
        let layout = self.descriptor_set_layouts.access(desc.layout)?;

        let mut writes = Vec::with_capacity(desc.buffers.len());
        let bindings = desc
            .buffers
            .iter()
            .map(|(binding, buffer)| {
                let layout_binding = layout.bindings().iter().find(|b| b.binding == *binding).ok_or_else(|| {
                    ResourceError::UnknownBinding {
                        name: desc.name.to_string(),
                        binding: *binding,
                    }
                })?;
                let buffer = self.buffers.access(*buffer)?;
                Ok((*layout_binding, buffer.vk_buffer()))
            })
            .collect::<ResourceResult<Vec<_>>>()?;

        let pool = self.descriptor_pool.as_ref().ok_or(ResourceError::Destroyed)?;
        let set = GfxDescriptorSet::new(pool, layout, desc.name)?;
        for (layout_binding, buffer) in bindings {
            writes.push(layout_binding.write_buffer(
                set.handle(),
                0,
                vec![vk::DescriptorBufferInfo {
                    buffer,
                    offset: 0,
                    range: vk::WHOLE_SIZE,
                }],
            ));
        }
        Gfx::get().gfx_device().write_descriptor_sets(&writes);

        let record = DescriptorSetRecord {
            set,
            layout: desc.layout,
        };
        Ok(self.descriptor_sets.acquire(record)?)
    }

    pub fn create_pipeline(&mut self, desc: &PipelineDesc) -> ResourceResult<PipelineHandle> {
        let _span = tracy_client::span!("ResourceManager::create_pipeline");

        let set_layouts = desc
            .set_layouts
            .iter()
            .map(|handle| self.descriptor_set_layouts.access(*handle).map(GfxDescriptorSetLayout::handle))
            .collect::<Result<Vec<_>, _>>()?;

        self.pipelines.check_available()?;
        let pipeline_cache = match self.pipeline_caches.entry(desc.cache_path.clone()) {
            Entry::Occupied(entry) => entry.get().handle(),
            Entry::Vacant(entry) => entry.insert(GfxPipelineCache::load(&desc.cache_path)?).handle(),
        };

        let layout = GfxPipelineLayout::new(&set_layouts, &desc.push_constant_ranges, desc.name)?;
        let pipeline = GfxGraphicsPipeline::new(
            &desc.create_info,
            layout,
            desc.render_pass,
            &mut self.shader_modules,
            pipeline_cache,
            desc.name,
        )?;
        log::info!("created pipeline {} ({} shader modules cached)", desc.name, self.shader_modules.len());

        Ok(self.pipelines.acquire(pipeline)?)
    }
}

// getters
impl ResourceManager {
    #[inline]
    pub fn buffer(&self, handle: BufferHandle) -> Result<&GfxBuffer, PoolError> {
        self.buffers.access(handle)
    }

    #[inline]
    pub fn texture(&self, handle: TextureHandle) -> Result<&TextureRecord, PoolError> {
        self.textures.access(handle)
    }

    #[inline]
    pub fn sampler(&self, handle: SamplerHandle) -> Result<&GfxSampler, PoolError> {
        self.samplers.access(handle)
    }

    #[inline]
    pub fn descriptor_set_layout(&self, handle: DescriptorSetLayoutHandle) -> Result<&GfxDescriptorSetLayout, PoolError> {
        self.descriptor_set_layouts.access(handle)
    }

    #[inline]
    pub fn descriptor_set(&self, handle: DescriptorSetHandle) -> Result<&DescriptorSetRecord, PoolError> {
        self.descriptor_sets.access(handle)
    }

    #[inline]
    pub fn pipeline(&self, handle: PipelineHandle) -> Result<&GfxGraphicsPipeline, PoolError> {
        self.pipelines.access(handle)
    }

    #[inline]
    pub fn texture_capacity(&self) -> u32 {
        self.textures.capacity()
    }
}

// update
impl ResourceManager {
    /// Points the texture at another sampler. Returns whether anything changed; when it did, the
    /// bindless slot has to be rewritten.
    pub fn set_texture_sampler(&mut self, texture: TextureHandle, sampler: SamplerHandle) -> Result<bool, PoolError> {
        self.samplers.access(sampler)?;
        let record = self.textures.access_mut(texture)?;
        if record.sampler == sampler {
            return Ok(false);
        }
        log::debug!("{}: sampler {} -> {}", record.name, record.sampler, sampler);
        record.sampler = sampler;
        Ok(true)
    }
}

// destroy
impl ResourceManager {
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), PoolError> {
        let (buffer, slot) = self.buffers.retire(handle)?;
        self.retire(RetiredResource::Buffer(buffer, slot));
        Ok(())
    }

    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<(), PoolError> {
        let (texture, slot) = self.textures.retire(handle)?;
        self.retire(RetiredResource::Texture(texture, slot));
        Ok(())
    }

    pub fn destroy_sampler(&mut self, handle: SamplerHandle) -> Result<(), PoolError> {
        let (sampler, slot) = self.samplers.retire(handle)?;
        self.retire(RetiredResource::Sampler(sampler, slot));
        Ok(())
    }

    pub fn destroy_descriptor_set_layout(&mut self, handle: DescriptorSetLayoutHandle) -> Result<(), PoolError> {
        let (layout, slot) = self.descriptor_set_layouts.retire(handle)?;
        self.retire(RetiredResource::DescriptorSetLayout(layout, slot));
        Ok(())
    }

    pub fn destroy_descriptor_set(&mut self, handle: DescriptorSetHandle) -> Result<(), PoolError> {
        let (set, slot) = self.descriptor_sets.retire(handle)?;
        self.retire(RetiredResource::DescriptorSet(set, slot));
        Ok(())
    }

    pub fn destroy_pipeline(&mut self, handle: PipelineHandle) -> Result<(), PoolError> {
        let (pipeline, slot) = self.pipelines.retire(handle)?;
        self.retire(RetiredResource::Pipeline(pipeline, slot));
        Ok(())
    }

    fn retire(&mut self, resource: RetiredResource) {
        self.pending_destroy.push(self.current_frame, resource);
    }

    /// Destroys whatever was retired at least `fif_count` frames before `current_frame_id` and
    /// puts the indices back in circulation.
    ///
    /// Call after the fence of the frame slot has been waited on.
    pub fn cleanup(&mut self, current_frame_id: u64) -> ResourceResult<()> {
        let _span = tracy_client::span!("ResourceManager::cleanup");
        self.current_frame = current_frame_id;

        let expired = self.pending_destroy.drain_expired(current_frame_id);
        if !expired.is_empty() {
            log::debug!("[F{}] destroying {} retired resources", current_frame_id, expired.len());
        }
        for resource in expired {
            self.destroy_retired(resource)?;
        }
        Ok(())
    }

    fn destroy_retired(&mut self, resource: RetiredResource) -> ResourceResult<()> {
        match resource {
            RetiredResource::Buffer(buffer, slot) => {
                buffer.destroy();
                self.buffers.release(slot);
            }
            RetiredResource::Texture(texture, slot) => {
                texture.destroy();
                self.textures.release(slot);
            }
            RetiredResource::Sampler(sampler, slot) => {
                drop(sampler);
                self.samplers.release(slot);
            }
            RetiredResource::DescriptorSetLayout(layout, slot) => {
                layout.destroy();
                self.descriptor_set_layouts.release(slot);
            }
            RetiredResource::DescriptorSet(record, slot) => {
                record.set.destroy()?;
                self.descriptor_sets.release(slot);
            }
            RetiredResource::Pipeline(pipeline, slot) => {
                pipeline.destroy();
                self.pipelines.release(slot);
            }
        }
        Ok(())
    }

    /// Writes every pipeline cache this manager loaded back to disk.
    pub fn save_pipeline_caches(&self) -> ResourceResult<()> {
        let _span = tracy_client::span!("ResourceManager::save_pipeline_caches");
        for cache in self.pipeline_caches.values().sorted_by_key(|cache| cache.path().to_path_buf()) {
            cache.save()?;
        }
        Ok(())
    }

    /// Destroys everything, live or retired. The device must be idle.
    pub fn destroy_all(&mut self) -> ResourceResult<()> {
        let _span = tracy_client::span!("ResourceManager::destroy_all");

        for resource in self.pending_destroy.drain_all() {
            self.destroy_retired(resource)?;
        }

        for (_, pipeline) in self.pipelines.drain() {
            pipeline.destroy();
        }
        for (_, record) in self.descriptor_sets.drain() {
            record.set.destroy()?;
        }
        for (_, layout) in self.descriptor_set_layouts.drain() {
            layout.destroy();
        }
        for (_, texture) in self.textures.drain() {
            texture.destroy();
        }
        self.samplers.drain();
        self.buffers.drain();

        if let Some(pool) = self.descriptor_pool.take() {
            pool.destroy();
        }
        for (_, cache) in self.pipeline_caches.drain() {
            cache.destroy();
        }
        std::mem::take(&mut self.shader_modules).destroy();

        self.destroyed = true;
        Ok(())
    }
}
impl Drop for ResourceManager {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "ResourceManager dropped without destroy_all()");
    }
}
