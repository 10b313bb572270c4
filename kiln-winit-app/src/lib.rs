//! Window collaborator for the kiln renderer, and the demo scene behind the `kiln-demo` binary.

pub mod app;
pub mod app_config;
pub mod demo_scene;
pub mod frame_timer;
pub mod mesh_data;
pub mod stats_overlay;
