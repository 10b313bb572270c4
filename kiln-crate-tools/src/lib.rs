//! Kiln shared tools
//!
//! Logging setup and workspace-relative paths for shaders, assets and pipeline caches.

pub mod init_log;
pub mod resource;
