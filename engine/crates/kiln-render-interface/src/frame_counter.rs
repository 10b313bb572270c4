use crate::pipeline_settings::FrameLabel;

pub struct FrameCounter {
    /// monotonically increasing, advanced once per `render()` call
    frame_id: u64,
    frame_limit: f32,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, frame_limit: f32) -> Self {
        Self {
            frame_id: init_frame_id,
            frame_limit,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    const FIF_COUNT: usize = 2;
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn frame_limit(&self) -> f32 {
        self.frame_limit
    }
    #[inline]
    pub const fn fif_count() -> usize {
        Self::FIF_COUNT
    }
    #[inline]
    pub const fn frame_labels() -> [FrameLabel; Self::FIF_COUNT] {
        [FrameLabel::A, FrameLabel::B]
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_usize(self.frame_id as usize % Self::fif_count())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_cycles_with_frame_id() {
        let mut counter = FrameCounter::new(0, 60.0);
        let labels: Vec<usize> = (0..5)
            .map(|_| {
                let label = *counter.frame_label();
                counter.next_frame();
                label
            })
            .collect();
        assert_eq!(labels, vec![0, 1, 0, 1, 0]);
        assert_eq!(counter.frame_id(), 5);
        assert_eq!(counter.frame_name(), "[F5B]");
    }
}
