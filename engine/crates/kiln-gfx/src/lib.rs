//! Vulkan wrappers for the kiln renderer
//!
//! Device, queues, command buffers, descriptors, render passes, pipelines and the swapchain.
//! Every wrapper reaches the device through the [`gfx::Gfx`] singleton, which is created once on
//! the main thread before any worker starts recording and destroyed after all of them have joined.

pub mod basic;
pub mod commands;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod gfx;
pub mod gfx_core;
pub mod pipelines;
pub mod resources;
pub mod sampler;
pub mod swapchain;
pub mod utilities;
