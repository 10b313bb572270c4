pub mod present_manager;
pub mod render_passes;
pub mod render_targets;
pub mod resize_tracker;
pub mod ui_overlay;
