use kiln_render_interface::frame_counter::FrameCounter;

use crate::error::{RendererError, RendererResult};

/// Where a frame slot is in its submit cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// never submitted, its fence was created signaled
    NotSubmitted,
    /// the fence was reset for `frame_id`, which has not reached the queue yet
    Armed { frame_id: u64 },
    Submitted { frame_id: u64 },
    /// the fence covering `frame_id` has been observed signaled
    Signaled { frame_id: u64 },
}

/// Bookkeeping half of the frame/sync manager.
///
/// Frame `n` uses slot `n % fif_count`. A slot may only be recorded again once the fence of the
/// frame that last used it has been observed signaled, so with two slots frame `n + 2` always
/// waits on frame `n`.
pub struct FramePacer {
    slots: [SlotState; FrameCounter::fif_count()],
}
impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl FramePacer {
    pub fn new() -> Self {
        Self {
            slots: [SlotState::NotSubmitted; FrameCounter::fif_count()],
        }
    }
}
// getters
impl FramePacer {
    #[inline]
    pub fn slot_of(frame_id: u64) -> usize {
        (frame_id % FrameCounter::fif_count() as u64) as usize
    }

    #[inline]
    pub fn state(&self, slot: usize) -> SlotState {
        self.slots[slot]
    }

    /// The earlier frame whose fence `frame_id` has to wait for, if that frame is still in flight.
    pub fn pending_wait(&self, frame_id: u64) -> Option<u64> {
        match self.slots[Self::slot_of(frame_id)] {
            SlotState::Submitted { frame_id } => Some(frame_id),
            _ => None,
        }
    }

    #[inline]
    pub fn can_record(&self, frame_id: u64) -> bool {
        self.pending_wait(frame_id).is_none()
    }

    /// Whether the slot's fence will ever be signaled. An armed slot belongs to a frame that failed
    /// before its submit; waiting on it would block forever.
    #[inline]
    pub fn fence_pending(&self, slot: usize) -> bool {
        !matches!(self.slots[slot], SlotState::Armed { .. })
    }
}
// update
impl FramePacer {
    /// Called after the slot's fence wait returned.
    pub fn fence_signaled(&mut self, slot: usize) {
        if let SlotState::Submitted { frame_id } = self.slots[slot] {
            self.slots[slot] = SlotState::Signaled { frame_id };
        }
    }

    /// Every fence is signaled once the device is idle.
    pub fn all_signaled(&mut self) {
        for slot in 0..self.slots.len() {
            self.fence_signaled(slot);
        }
    }

    /// Called right after the slot's fence was reset for `frame_id`.
    pub fn armed(&mut self, frame_id: u64) -> RendererResult<()> {
        let slot = Self::slot_of(frame_id);
        if let SlotState::Submitted { .. } = self.slots[slot] {
            return Err(RendererError::SlotInFlight { frame_id, slot });
        }
        self.slots[slot] = SlotState::Armed { frame_id };
        Ok(())
    }

    pub fn submitted(&mut self, frame_id: u64) -> RendererResult<()> {
        let slot = Self::slot_of(frame_id);
        if let SlotState::Submitted { .. } = self.slots[slot] {
            return Err(RendererError::SlotInFlight { frame_id, slot });
        }
        self.slots[slot] = SlotState::Submitted { frame_id };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_waits_on_frame_two_back() {
        let mut pacer = FramePacer::new();
        assert_eq!(pacer.pending_wait(0), None);
        pacer.submitted(0).unwrap();
        assert_eq!(pacer.pending_wait(1), None);
        pacer.submitted(1).unwrap();

        assert_eq!(pacer.pending_wait(2), Some(0));
        assert_eq!(pacer.pending_wait(3), Some(1));
        assert!(!pacer.can_record(2));

        pacer.fence_signaled(FramePacer::slot_of(2));
        assert!(pacer.can_record(2));
        assert_eq!(pacer.state(0), SlotState::Signaled { frame_id: 0 });
        pacer.submitted(2).unwrap();

        // frame 3 still waits on frame 1, not on frame 2
        assert_eq!(pacer.pending_wait(3), Some(1));
    }

    #[test]
    fn test_resubmit_without_wait_is_rejected() {
        let mut pacer = FramePacer::new();
        pacer.submitted(4).unwrap();
        assert!(matches!(
            pacer.submitted(6),
            Err(RendererError::SlotInFlight { frame_id: 6, slot: 0 })
        ));
    }

    #[test]
    fn test_skipped_frame_leaves_slot_signaled() {
        let mut pacer = FramePacer::new();
        pacer.submitted(0).unwrap();
        pacer.fence_signaled(0);
        // frame 2 waited but never submitted (out-of-date acquire): frame 4 does not wait
        assert!(pacer.can_record(4));

        pacer.submitted(1).unwrap();
        pacer.all_signaled();
        assert!(pacer.can_record(3));
    }

    #[test]
    fn test_failed_submit_does_not_block_the_slot() {
        let mut pacer = FramePacer::new();
        pacer.armed(0).unwrap();
        pacer.submitted(0).unwrap();
        pacer.fence_signaled(0);

        // frame 2 resets the fence, then fails before reaching the queue
        pacer.armed(2).unwrap();
        assert_eq!(pacer.state(0), SlotState::Armed { frame_id: 2 });
        assert!(!pacer.fence_pending(0));
        assert!(pacer.can_record(4));

        // a device-wide wait does not signal a fence nobody submitted
        pacer.all_signaled();
        assert_eq!(pacer.state(0), SlotState::Armed { frame_id: 2 });

        pacer.armed(4).unwrap();
        pacer.submitted(4).unwrap();
        assert!(pacer.fence_pending(0));
        assert_eq!(pacer.pending_wait(6), Some(4));
        assert!(matches!(
            pacer.armed(6),
            Err(RendererError::SlotInFlight { frame_id: 6, slot: 0 })
        ));
    }
}
