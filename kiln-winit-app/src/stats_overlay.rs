use ash::vk;
use kiln_gfx::{basic::color::LabelColor, commands::command_buffer::GfxCommandBuffer};
use kiln_renderer::present::ui_overlay::UiOverlay;

/// Marks each UI pass with the running frame count, visible in a frame capture.
#[derive(Debug, Default)]
pub struct StatsOverlay {
    frames: u64,
}

impl StatsOverlay {
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl UiOverlay for StatsOverlay {
    fn record(&mut self, cmd: &GfxCommandBuffer, extent: vk::Extent2D) {
        self.frames += 1;
        cmd.set_viewport_and_scissor(extent);
        cmd.insert_label(
            &format!("overlay frame {} at {}x{}", self.frames, extent.width, extent.height),
            LabelColor::COLOR_PASS,
        );
    }
}
