//! Per-frame rendering for the kiln engine
//!
//! The [`renderer::Renderer`] facade drives one frame at a time: it waits on the frame slot's
//! fence, resolves the scene's render list against the resource pools, records the viewport pass
//! on a rayon worker pool (one secondary command buffer per partition, executed in partition
//! order), composites the viewport into the swapchain image and presents.

pub mod cmd_allocator;
pub mod error;
pub mod frame_pacer;
pub mod frame_sync;
pub mod partition;
pub mod pipelines;
pub mod present;
pub mod recorder;
pub mod renderer;
pub mod scene_bindings;
pub mod task_group;
