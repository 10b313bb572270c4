use std::sync::Arc;

use ash::vk;
use itertools::Itertools;
use kiln_gfx::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, fence::GfxFence, semaphore::GfxSemaphore,
    },
    error::GfxResult,
    foundation::device::GfxDevice,
};
use kiln_render_interface::{frame_counter::FrameCounter, pipeline_settings::FrameLabel};

use crate::{
    error::RendererResult,
    frame_pacer::{FramePacer, SlotState},
};

/// The primary command buffers of one frame, submitted together in this order.
pub struct FramePrimaries {
    /// executes the recorded secondaries inside the viewport pass
    pub viewport: GfxCommandBuffer,
    /// composites the viewport image into the swapchain image
    pub main: GfxCommandBuffer,
    pub ui: GfxCommandBuffer,
}
impl FramePrimaries {
    #[inline]
    pub fn submit_order(&self) -> [&GfxCommandBuffer; 3] {
        [&self.viewport, &self.main, &self.ui]
    }
}

/// Sync objects and primaries owned by one frame-in-flight slot.
pub struct FrameSlot {
    label: FrameLabel,
    /// created signaled
    fence: GfxFence,
    image_available: GfxSemaphore,
    command_pool: GfxCommandPool,
    primaries: FramePrimaries,
}
impl FrameSlot {
    fn new(device: &Arc<GfxDevice>, queue_family_index: u32, label: FrameLabel) -> GfxResult<Self> {
        let fence = GfxFence::new(device.clone(), true, &format!("frame-{label}-in-flight"))?;
        let image_available = GfxSemaphore::new(device.clone(), &format!("frame-{label}-image-available"))?;
        let command_pool = GfxCommandPool::new(
            device.clone(),
            queue_family_index,
            vk::CommandPoolCreateFlags::TRANSIENT,
            &format!("frame-{label}-primaries"),
        )?;
        let primaries = FramePrimaries {
            viewport: command_pool.alloc_primary(&format!("[{label}]viewport"))?,
            main: command_pool.alloc_primary(&format!("[{label}]main"))?,
            ui: command_pool.alloc_primary(&format!("[{label}]ui"))?,
        };

        Ok(Self {
            label,
            fence,
            image_available,
            command_pool,
            primaries,
        })
    }

    #[inline]
    pub fn label(&self) -> FrameLabel {
        self.label
    }

    #[inline]
    pub fn fence(&self) -> &GfxFence {
        &self.fence
    }

    #[inline]
    pub fn image_available(&self) -> &GfxSemaphore {
        &self.image_available
    }

    #[inline]
    pub fn primaries(&self) -> &FramePrimaries {
        &self.primaries
    }

    fn destroy(self) {
        // primaries are freed with the pool
        self.command_pool.destroy();
        self.image_available.destroy();
        self.fence.destroy();
    }
}

/// Exactly [`FrameCounter::fif_count`] slots; frame `n` uses slot `n % fif_count`.
pub struct FrameSync {
    slots: Vec<FrameSlot>,
    pacer: FramePacer,
}

// new & init
impl FrameSync {
    pub fn new(device: &Arc<GfxDevice>, queue_family_index: u32) -> GfxResult<Self> {
        let slots = FrameCounter::frame_labels()
            .into_iter()
            .map(|label| FrameSlot::new(device, queue_family_index, label))
            .collect::<GfxResult<Vec<_>>>()?;
        Ok(Self {
            slots,
            pacer: FramePacer::new(),
        })
    }
}
// getters
impl FrameSync {
    #[inline]
    pub fn slot(&self, label: FrameLabel) -> &FrameSlot {
        &self.slots[*label]
    }

    #[inline]
    pub fn slot_state(&self, label: FrameLabel) -> SlotState {
        self.pacer.state(*label)
    }
}
// update
impl FrameSync {
    /// Blocks until the slot of `frame_id` is no longer in flight.
    ///
    /// The fence is left signaled: a frame that bails out after this (out-of-date acquire) must
    /// not leave the next user of the slot waiting on a fence nobody will signal.
    pub fn wait_for_slot(&mut self, frame_id: u64) -> GfxResult<()> {
        let _span = tracy_client::span!("FrameSync::wait_for_slot");
        let slot = FramePacer::slot_of(frame_id);
        if let Some(waited_frame) = self.pacer.pending_wait(frame_id) {
            log::trace!("[F{}] waiting on frame {}", frame_id, waited_frame);
        }
        if !self.pacer.fence_pending(slot) {
            log::warn!("[F{}] slot {} was reset by a frame that never submitted, not waiting", frame_id, slot);
            return Ok(());
        }
        self.slots[slot].fence.wait()?;
        self.pacer.fence_signaled(slot);
        Ok(())
    }

    /// Resets the primaries of `frame_id`'s slot, once an image has been acquired.
    pub fn begin_slot(&mut self, frame_id: u64) -> GfxResult<&FrameSlot> {
        let slot = &self.slots[FramePacer::slot_of(frame_id)];
        slot.command_pool.reset()?;
        Ok(slot)
    }

    /// Resets the slot's fence right before the submit that will signal it.
    pub fn arm_fence(&mut self, frame_id: u64) -> RendererResult<()> {
        let slot = FramePacer::slot_of(frame_id);
        self.pacer.armed(frame_id)?;
        self.slots[slot].fence.reset()?;
        Ok(())
    }

    /// Records that the slot's fence was handed to a submit.
    pub fn submitted(&mut self, frame_id: u64) -> RendererResult<()> {
        self.pacer.submitted(frame_id)
    }

    /// For after a device-wide wait.
    pub fn mark_idle(&mut self) {
        self.pacer.all_signaled();
    }
}
// destroy
impl FrameSync {
    /// The device must be idle.
    pub fn destroy(self) {
        for slot in self.slots {
            slot.destroy();
        }
    }
}

/// Slots in frame-label order, for diagnostics.
pub fn describe_slots(sync: &FrameSync) -> String {
    FrameCounter::frame_labels()
        .iter()
        .map(|label| format!("{}:{:?}", label, sync.slot_state(*label)))
        .join(" ")
}
