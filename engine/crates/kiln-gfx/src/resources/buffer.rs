use ash::vk;
use vk_mem::Alloc;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// A vk-mem backed buffer; released on drop.
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,

    /// fixed at creation: host-visible buffers stay mapped for their whole life
    mapped_ptr: Option<*mut u8>,

    debug_name: String,
}

// init & destroy
impl GfxBuffer {
    /// Device memory is preferred. `mem_map` asks for host access and keeps the buffer mapped.
    pub fn new(
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        mem_map: bool,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let buffer_ci = vk::BufferCreateInfo::default().size(size).usage(usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let allocator = Gfx::get().allocator();
        let (handle, mut allocation) = unsafe { allocator.create_buffer(&buffer_ci, &alloc_ci)? };

        let mapped_ptr = if mem_map {
            match unsafe { allocator.map_memory(&mut allocation) } {
                Ok(ptr) => Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(handle, &mut allocation) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let buffer = Self {
            handle,
            allocation,
            size,
            usage,
            mapped_ptr,
            debug_name: debug_name.as_ref().to_string(),
        };
        Gfx::get().gfx_device().set_debug_name(&buffer, debug_name)?;
        Ok(buffer)
    }

    #[inline]
    pub fn new_stage_buffer(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        Self::new(size, vk::BufferUsageFlags::TRANSFER_SRC, true, debug_name)
    }

    pub fn new_vertex_buffer(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        Self::new(size, vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST, false, debug_name)
    }

    pub fn new_index_buffer(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        Self::new(size, vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST, false, debug_name)
    }

    #[inline]
    pub fn destroy(self) {
        drop(self)
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        let allocator = Gfx::get().allocator();
        unsafe {
            if self.mapped_ptr.is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }
            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}
// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    #[inline]
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.mapped_ptr
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    /// Copies `data` through the persistent mapping and flushes it. Does nothing on an unmapped buffer.
    ///
    /// # Panics
    /// When `data` does not fit.
    pub fn write_mapped<T: bytemuck::Pod>(&self, data: &[T]) -> GfxResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        assert!(bytes.len() as vk::DeviceSize <= self.size, "{}: write of {} bytes overflows", self.debug_name, bytes.len());
        let Some(ptr) = self.mapped_ptr else {
            log::warn!("{}: write_mapped on an unmapped buffer", self.debug_name);
            return Ok(());
        };
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
        Gfx::get().allocator().flush_allocation(&self.allocation, 0, bytes.len() as vk::DeviceSize)?;
        Ok(())
    }

    /// Uploads `data` through a temporary staging buffer and waits for the copy to finish.
    pub fn upload_sync<T: bytemuck::Pod>(&self, data: &[T]) -> GfxResult<()> {
        let byte_size = size_of_val(data) as vk::DeviceSize;
        let stage_buffer = Self::new_stage_buffer(byte_size, format!("{}-stage", self.debug_name))?;
        stage_buffer.write_mapped(data)?;

        Gfx::get().one_time_exec(
            |cmd| {
                cmd.copy_buffer(
                    stage_buffer.vk_buffer(),
                    self.handle,
                    &[vk::BufferCopy {
                        size: byte_size,
                        ..Default::default()
                    }],
                )
            },
            &format!("{}-upload", self.debug_name),
        )
    }
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
