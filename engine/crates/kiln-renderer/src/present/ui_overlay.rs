use ash::vk;
use kiln_gfx::commands::command_buffer::GfxCommandBuffer;

/// Draws on top of the composited frame, inline inside the UI pass.
///
/// The pass has already begun on the swapchain image when `record` runs, with the main pass's
/// output loaded; viewport and scissor are left to the overlay.
pub trait UiOverlay {
    fn record(&mut self, cmd: &GfxCommandBuffer, extent: vk::Extent2D);
}
