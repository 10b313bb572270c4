use std::path::PathBuf;

use ash::vk;

/// Errors raised by the GFX layer.
///
/// All of them are fatal for the renderer. The two recoverable swapchain results never show up
/// here; they are reported as [`crate::swapchain::render_swapchain::SwapchainStatus`].
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("failed to load the vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),

    #[error("required instance extension is missing: {0}")]
    MissingInstanceExtension(String),

    #[error("no physical device can run the renderer:\n{0}")]
    NoSuitableDevice(String),

    #[error("no supported format among {0:?}")]
    NoSupportedFormat(Vec<vk::Format>),

    #[error("failed to load shader {path:?}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline cache io failed on {path:?}: {source}")]
    PipelineCacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid debug name {0:?}")]
    DebugName(String),
}

pub type GfxResult<T> = Result<T, GfxError>;
