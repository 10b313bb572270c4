use ash::vk;
use kiln_gfx::swapchain::render_swapchain::SwapchainStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeState {
    Stable,
    /// a rebuild is due; waiting for the device to go idle and for a non-zero extent
    IdleWait,
    /// swapchain-derived targets are being destroyed
    Teardown,
    /// swapchain and targets are being recreated
    Rebuild,
}

/// Drives the swapchain through Stable -> IdleWait -> Teardown -> Rebuild -> Stable.
///
/// A window resize or a suboptimal/out-of-date swapchain sends it to `IdleWait`. It leaves
/// `IdleWait` only with a non-zero window extent, so no zero-sized swapchain is ever created
/// while the window is minimized.
#[derive(Debug)]
pub struct ResizeTracker {
    state: ResizeState,
    window_extent: vk::Extent2D,
}

// new & init
impl ResizeTracker {
    pub fn new(window_extent: vk::Extent2D) -> Self {
        Self {
            state: ResizeState::Stable,
            window_extent,
        }
    }
}
// getters
impl ResizeTracker {
    #[inline]
    pub fn state(&self) -> ResizeState {
        self.state
    }

    #[inline]
    pub fn window_extent(&self) -> vk::Extent2D {
        self.window_extent
    }

    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.state != ResizeState::Stable
    }

    #[inline]
    fn extent_is_zero(&self) -> bool {
        self.window_extent.width == 0 || self.window_extent.height == 0
    }
}
// update
impl ResizeTracker {
    pub fn notify_resized(&mut self, window_extent: vk::Extent2D) {
        if window_extent != self.window_extent {
            log::debug!(
                "window resized {}x{} -> {}x{}",
                self.window_extent.width,
                self.window_extent.height,
                window_extent.width,
                window_extent.height
            );
            self.window_extent = window_extent;
            self.request_rebuild();
        }
    }

    pub fn notify_swapchain_status(&mut self, status: SwapchainStatus) {
        if status.needs_rebuild() {
            self.request_rebuild();
        }
    }

    fn request_rebuild(&mut self) {
        if self.state == ResizeState::Stable {
            self.state = ResizeState::IdleWait;
        }
    }

    /// Called once the device is idle. Returns the extent to rebuild at, or `None` while the
    /// window has no area; the caller skips the frame and asks again next tick.
    pub fn idle_reached(&mut self) -> Option<vk::Extent2D> {
        if self.state != ResizeState::IdleWait || self.extent_is_zero() {
            return None;
        }
        self.state = ResizeState::Teardown;
        Some(self.window_extent)
    }

    pub fn teardown_done(&mut self) {
        debug_assert_eq!(self.state, ResizeState::Teardown);
        self.state = ResizeState::Rebuild;
    }

    pub fn rebuild_done(&mut self) {
        debug_assert_eq!(self.state, ResizeState::Rebuild);
        self.state = ResizeState::Stable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_resize_round_trip() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        assert!(!tracker.needs_rebuild());

        tracker.notify_resized(extent(1024, 768));
        assert_eq!(tracker.state(), ResizeState::IdleWait);
        assert_eq!(tracker.idle_reached(), Some(extent(1024, 768)));
        assert_eq!(tracker.state(), ResizeState::Teardown);
        tracker.teardown_done();
        assert_eq!(tracker.state(), ResizeState::Rebuild);
        tracker.rebuild_done();
        assert_eq!(tracker.state(), ResizeState::Stable);
    }

    #[test]
    fn test_minimized_window_waits() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        tracker.notify_resized(extent(0, 0));
        for _ in 0..3 {
            assert_eq!(tracker.idle_reached(), None);
            assert_eq!(tracker.state(), ResizeState::IdleWait);
        }
        tracker.notify_resized(extent(640, 0));
        assert_eq!(tracker.idle_reached(), None);

        tracker.notify_resized(extent(640, 480));
        assert_eq!(tracker.idle_reached(), Some(extent(640, 480)));
    }

    #[test]
    fn test_swapchain_status_triggers() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        tracker.notify_swapchain_status(SwapchainStatus::Optimal);
        assert!(!tracker.needs_rebuild());

        tracker.notify_swapchain_status(SwapchainStatus::Suboptimal);
        assert_eq!(tracker.state(), ResizeState::IdleWait);
        // a second trigger does not restart anything
        tracker.notify_swapchain_status(SwapchainStatus::OutOfDate);
        assert_eq!(tracker.state(), ResizeState::IdleWait);
        assert_eq!(tracker.idle_reached(), Some(extent(800, 600)));
    }

    #[test]
    fn test_same_extent_is_not_a_resize() {
        let mut tracker = ResizeTracker::new(extent(800, 600));
        tracker.notify_resized(extent(800, 600));
        assert!(!tracker.needs_rebuild());
        assert_eq!(tracker.idle_reached(), None);
    }
}
