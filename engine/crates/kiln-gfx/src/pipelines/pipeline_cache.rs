use std::path::{Path, PathBuf};

use ash::vk;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

/// `VkPipelineCacheHeaderVersionOne`, read from the front of a cache blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineCacheHeader {
    pub header_size: u32,
    pub header_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub pipeline_cache_uuid: [u8; vk::UUID_SIZE],
}

/// Why a cache blob on disk was not handed to the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheRejection {
    Truncated(usize),
    HeaderSize(u32),
    /// the header claims more bytes than the blob holds
    ShorterThanHeader { header_size: u32, len: usize },
    HeaderVersion(u32),
    Vendor { cached: u32, live: u32 },
    Device { cached: u32, live: u32 },
    Uuid,
}

impl PipelineCacheHeader {
    pub const SIZE: usize = 16 + vk::UUID_SIZE;

    pub fn parse(data: &[u8]) -> Result<Self, CacheRejection> {
        if data.len() < Self::SIZE {
            return Err(CacheRejection::Truncated(data.len()));
        }
        let read_u32 = |offset: usize| u32::from_ne_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]);
        let mut pipeline_cache_uuid = [0u8; vk::UUID_SIZE];
        pipeline_cache_uuid.copy_from_slice(&data[16..Self::SIZE]);

        Ok(Self {
            header_size: read_u32(0),
            header_version: read_u32(4),
            vendor_id: read_u32(8),
            device_id: read_u32(12),
            pipeline_cache_uuid,
        })
    }

    /// The blob is reusable only on the exact device and driver build that produced it.
    pub fn validate(&self, props: &vk::PhysicalDeviceProperties) -> Result<(), CacheRejection> {
        if (self.header_size as usize) < Self::SIZE {
            return Err(CacheRejection::HeaderSize(self.header_size));
        }
        if self.header_version != vk::PipelineCacheHeaderVersion::ONE.as_raw() as u32 {
            return Err(CacheRejection::HeaderVersion(self.header_version));
        }
        if self.vendor_id != props.vendor_id {
            return Err(CacheRejection::Vendor {
                cached: self.vendor_id,
                live: props.vendor_id,
            });
        }
        if self.device_id != props.device_id {
            return Err(CacheRejection::Device {
                cached: self.device_id,
                live: props.device_id,
            });
        }
        if self.pipeline_cache_uuid != props.pipeline_cache_uuid {
            return Err(CacheRejection::Uuid);
        }
        Ok(())
    }
}

/// Returns `data` untouched when its header matches the live device.
pub fn validated_cache_data<'a>(data: &'a [u8], props: &vk::PhysicalDeviceProperties) -> Result<&'a [u8], CacheRejection> {
    let header = PipelineCacheHeader::parse(data)?;
    header.validate(props)?;
    if data.len() < header.header_size as usize {
        return Err(CacheRejection::ShorterThanHeader {
            header_size: header.header_size,
            len: data.len(),
        });
    }
    Ok(data)
}

/// `vk::PipelineCache` backed by a file. Seeded from disk when the file matches this device.
pub struct GfxPipelineCache {
    handle: vk::PipelineCache,
    path: PathBuf,
}

impl GfxPipelineCache {
    /// A missing, stale or corrupt file gives an empty cache and a warning.
    pub fn load(path: &Path) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxPipelineCache::load");

        let on_disk = match std::fs::read(path) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no pipeline cache at {:?}, starting empty", path);
                None
            }
            Err(e) => {
                log::warn!("failed to read pipeline cache {:?}: {}", path, e);
                None
            }
        };

        let props = Gfx::get().physical_device().properties();
        let initial_data = on_disk.as_deref().and_then(|data| match validated_cache_data(data, props) {
            Ok(data) => Some(data),
            Err(reason) => {
                log::warn!("discarding pipeline cache {:?}: {:?}", path, reason);
                None
            }
        });

        let create_info = vk::PipelineCacheCreateInfo::default().initial_data(initial_data.unwrap_or_default());
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_pipeline_cache(&create_info, None)? };
        let cache = Self {
            handle,
            path: path.to_path_buf(),
        };
        if let Err(e) = gfx_device.set_debug_name(&cache, path.to_string_lossy()) {
            cache.destroy();
            return Err(e);
        }
        log::info!("pipeline cache {:?}: seeded with {} bytes", path, initial_data.map_or(0, <[u8]>::len));
        Ok(cache)
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineCache {
        self.handle
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the driver's current blob back to the file, creating parent directories.
    pub fn save(&self) -> GfxResult<()> {
        let data = unsafe { Gfx::get().gfx_device().get_pipeline_cache_data(self.handle)? };
        let io_err = |source| GfxError::PipelineCacheIo {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        std::fs::write(&self.path, &data).map_err(io_err)?;
        log::info!("saved pipeline cache {:?}: {} bytes", self.path, data.len());
        Ok(())
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_pipeline_cache(self.handle, None) };
    }
}
impl DebugType for GfxPipelineCache {
    fn debug_type_name() -> &'static str {
        "GfxPipelineCache"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_props() -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            vendor_id: 0x10de,
            device_id: 0x2684,
            pipeline_cache_uuid: [7; vk::UUID_SIZE],
            ..Default::default()
        }
    }

    fn blob(header_size: u32, version: u32, vendor: u32, device: u32, uuid: [u8; vk::UUID_SIZE]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&header_size.to_ne_bytes());
        data.extend_from_slice(&version.to_ne_bytes());
        data.extend_from_slice(&vendor.to_ne_bytes());
        data.extend_from_slice(&device.to_ne_bytes());
        data.extend_from_slice(&uuid);
        // driver payload
        data.extend_from_slice(&[0xAB; 64]);
        data
    }

    #[test]
    fn test_matching_cache_is_accepted() {
        let data = blob(32, 1, 0x10de, 0x2684, [7; vk::UUID_SIZE]);
        let accepted = validated_cache_data(&data, &device_props()).unwrap();
        assert_eq!(accepted.len(), data.len());
    }

    #[test]
    fn test_truncated_cache_is_rejected() {
        let data = blob(32, 1, 0x10de, 0x2684, [7; vk::UUID_SIZE]);
        assert_eq!(validated_cache_data(&data[..20], &device_props()), Err(CacheRejection::Truncated(20)));
        assert_eq!(validated_cache_data(&[], &device_props()), Err(CacheRejection::Truncated(0)));
    }

    #[test]
    fn test_cache_from_other_device_is_rejected() {
        let props = device_props();
        assert_eq!(
            validated_cache_data(&blob(32, 1, 0x1002, 0x2684, [7; vk::UUID_SIZE]), &props),
            Err(CacheRejection::Vendor {
                cached: 0x1002,
                live: 0x10de
            })
        );
        assert_eq!(
            validated_cache_data(&blob(32, 1, 0x10de, 0x1111, [7; vk::UUID_SIZE]), &props),
            Err(CacheRejection::Device {
                cached: 0x1111,
                live: 0x2684
            })
        );
        assert_eq!(validated_cache_data(&blob(32, 1, 0x10de, 0x2684, [8; vk::UUID_SIZE]), &props), Err(CacheRejection::Uuid));
    }

    #[test]
    fn test_corrupt_header_is_rejected() {
        let props = device_props();
        assert_eq!(
            validated_cache_data(&blob(4, 1, 0x10de, 0x2684, [7; vk::UUID_SIZE]), &props),
            Err(CacheRejection::HeaderSize(4))
        );
        assert_eq!(
            validated_cache_data(&blob(32, 9, 0x10de, 0x2684, [7; vk::UUID_SIZE]), &props),
            Err(CacheRejection::HeaderVersion(9))
        );
    }

    #[test]
    fn test_blob_shorter_than_its_header_is_rejected() {
        let props = device_props();
        let data = blob(128, 1, 0x10de, 0x2684, [7; vk::UUID_SIZE]);
        assert_eq!(data.len(), 96);
        assert_eq!(
            validated_cache_data(&data, &props),
            Err(CacheRejection::ShorterThanHeader {
                header_size: 128,
                len: 96
            })
        );
        // a larger header is fine as long as the blob covers it
        let data = blob(64, 1, 0x10de, 0x2684, [7; vk::UUID_SIZE]);
        assert!(validated_cache_data(&data, &props).is_ok());
    }
}
