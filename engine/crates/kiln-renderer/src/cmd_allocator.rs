use std::sync::Arc;

use ash::vk;
use kiln_gfx::{
    commands::{command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool},
    error::GfxResult,
    foundation::device::GfxDevice,
};
use kiln_render_interface::{frame_counter::FrameCounter, pipeline_settings::FrameLabel};

/// Which secondary-buffer lanes a frame has.
///
/// Lane `i < workers` belongs to partition `i`; the lane after them takes the surplus partition;
/// the last one records the skybox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneLayout {
    workers: usize,
}
impl LaneLayout {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// enough for the largest partition plan of `workers` workers
    #[inline]
    pub fn partition_lanes(&self) -> usize {
        self.workers + 1
    }

    #[inline]
    pub fn skybox_lane(&self) -> usize {
        self.workers + 1
    }

    #[inline]
    pub fn lane_count(&self) -> usize {
        self.workers + 2
    }
}

struct Lane {
    pool: GfxCommandPool,
    secondary: GfxCommandBuffer,
}

/// Per frame slot, per lane command pools, each with one secondary allocated up front.
///
/// A lane is recorded by at most one task per frame and its pool is only reset by the main
/// thread after the slot's fence has been waited on, so no pool is ever shared between threads.
pub struct CmdAllocator {
    layout: LaneLayout,
    /// `[frame slot][lane]`
    lanes: Vec<Vec<Lane>>,
}

// new & init
impl CmdAllocator {
    pub fn new(device: &Arc<GfxDevice>, queue_family_index: u32, layout: LaneLayout) -> GfxResult<Self> {
        let lanes = FrameCounter::frame_labels()
            .iter()
            .map(|label| {
                (0..layout.lane_count())
                    .map(|lane| {
                        let pool = GfxCommandPool::new(
                            device.clone(),
                            queue_family_index,
                            vk::CommandPoolCreateFlags::TRANSIENT,
                            &format!("lane-{label}-{lane}"),
                        )?;
                        let secondary = pool.alloc_secondary(&format!("[{label}]lane-{lane}"))?;
                        Ok(Lane { pool, secondary })
                    })
                    .collect::<GfxResult<Vec<_>>>()
            })
            .collect::<GfxResult<Vec<_>>>()?;

        log::info!(
            "command allocator: {} slots x {} lanes",
            FrameCounter::fif_count(),
            layout.lane_count()
        );
        Ok(Self { layout, lanes })
    }
}
// getters
impl CmdAllocator {
    #[inline]
    pub fn layout(&self) -> LaneLayout {
        self.layout
    }

    /// A clone of the lane's secondary; the clone can be moved into a worker job.
    #[inline]
    pub fn secondary(&self, frame_label: FrameLabel, lane: usize) -> GfxCommandBuffer {
        self.lanes[*frame_label][lane].secondary.clone()
    }
}
// update
impl CmdAllocator {
    /// Resets every lane of the slot. The slot's fence must have been waited on.
    pub fn reset_slot(&self, frame_label: FrameLabel) -> GfxResult<()> {
        let _span = tracy_client::span!("CmdAllocator::reset_slot");
        self.lanes[*frame_label].iter().try_for_each(|lane| lane.pool.reset())
    }
}
// destroy
impl CmdAllocator {
    /// The device must be idle.
    pub fn destroy(self) {
        let lane_count = self.lanes.iter().map(Vec::len).sum::<usize>();
        for lane in self.lanes.into_iter().flatten() {
            lane.pool.destroy();
        }
        log::info!("command allocator: destroyed {} lane pools", lane_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::plan_partitions;

    #[test]
    fn test_lanes_cover_every_partition_plan() {
        for workers in 0..9 {
            let layout = LaneLayout::new(workers);
            for items in 0..100 {
                let partitions = plan_partitions(items, workers);
                assert!(partitions.len() <= layout.partition_lanes(), "items={items} workers={workers}");
            }
            assert!(layout.skybox_lane() >= layout.partition_lanes());
            assert_eq!(layout.skybox_lane() + 1, layout.lane_count());
        }
    }
}
