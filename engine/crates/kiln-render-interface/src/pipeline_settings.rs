use std::{
    fmt::Display,
    ops::Deref,
    path::{Path, PathBuf},
};

use ash::vk;
use kiln_crate_tools::resource::KilnPath;
use serde::{Deserialize, Serialize};

/// Renderer defaults that are not worth a setting
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        // shader output is converted linear -> sRGB on write
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;
    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] = &[
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ];
    /// off-screen viewport target, sampled by the main pass
    pub const VIEWPORT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
}

/// Which frame-in-flight slot a frame uses. Derefs to the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 2] = [0, 1];

    /// # Panics
    /// When `idx` is not a slot index.
    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            _ => panic!("Invalid frame index: {idx}"),
        }
    }
}

/// Fixed capacity of every resource pool. Nothing grows past these.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolCapacities {
    pub buffers: u32,
    /// also the length of the bindless texture array
    pub textures: u32,
    pub samplers: u32,
    pub descriptor_set_layouts: u32,
    pub descriptor_sets: u32,
    pub pipelines: u32,
}
impl Default for PoolCapacities {
    fn default() -> Self {
        Self {
            buffers: 4096,
            textures: 1024,
            samplers: 64,
            descriptor_set_layouts: 64,
            descriptor_sets: 1024,
            pipelines: 64,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresentModePreference {
    #[default]
    Mailbox,
    Fifo,
    Immediate,
}
impl PresentModePreference {
    pub fn vk_present_mode(self) -> vk::PresentModeKHR {
        match self {
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Renderer configuration. Every field has a default, so a settings file only lists overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub pool_capacities: PoolCapacities,
    /// recording workers; 0 means one per available core
    pub worker_threads: usize,
    /// frames per second the app loop aims for
    pub frame_limit: f32,
    pub present_mode: PresentModePreference,
    /// `None` keeps caches under the workspace target directory
    pub pipeline_cache_dir: Option<PathBuf>,
    pub clear_color: [f32; 4],
    /// record the skybox lane ahead of the scene draws
    pub skybox: bool,
}
impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            pool_capacities: PoolCapacities::default(),
            worker_threads: 0,
            frame_limit: 120.0,
            present_mode: PresentModePreference::default(),
            pipeline_cache_dir: None,
            clear_color: [0.05, 0.05, 0.08, 1.0],
            skybox: true,
        }
    }
}
// new & init
impl RendererSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
// getters
impl RendererSettings {
    #[inline]
    pub fn max_bindless_textures(&self) -> u32 {
        self.pool_capacities.textures
    }

    /// `worker_threads`, with 0 resolved against the machine and clamped to at least 1
    pub fn resolved_worker_threads(&self) -> usize {
        match self.worker_threads {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        }
    }

    pub fn pipeline_cache_path(&self, filename: &str) -> PathBuf {
        match &self.pipeline_cache_dir {
            Some(dir) => dir.join(filename),
            None => KilnPath::pipeline_cache_path(filename),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_label() {
        assert_eq!(*FrameLabel::from_usize(1), 1);
        assert_eq!(FrameLabel::from_usize(0), FrameLabel::A);
        assert_eq!(FrameLabel::B.to_string(), "B");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            RendererSettings::from_json_str(r#"{ "worker_threads": 3, "pool_capacities": { "textures": 16 } }"#)
                .unwrap();
        assert_eq!(settings.worker_threads, 3);
        assert_eq!(settings.max_bindless_textures(), 16);
        assert_eq!(settings.pool_capacities.buffers, PoolCapacities::default().buffers);
        assert_eq!(settings.present_mode, PresentModePreference::Mailbox);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(matches!(RendererSettings::from_json_str("{ nope"), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_worker_threads_never_zero() {
        let settings = RendererSettings::default();
        assert!(settings.resolved_worker_threads() >= 1);
        let settings = RendererSettings {
            worker_threads: 5,
            ..Default::default()
        };
        assert_eq!(settings.resolved_worker_threads(), 5);
    }

    #[test]
    fn test_cache_dir_override() {
        let settings = RendererSettings {
            pipeline_cache_dir: Some(PathBuf::from("/tmp/kiln")),
            ..Default::default()
        };
        assert_eq!(settings.pipeline_cache_path("mesh.bin"), PathBuf::from("/tmp/kiln/mesh.bin"));
    }
}
