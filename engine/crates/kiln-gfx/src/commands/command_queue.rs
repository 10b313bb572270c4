use std::sync::Arc;

use ash::vk;

use crate::{
    commands::{fence::GfxFence, submit_info::GfxSubmitInfo},
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// One queue of a family. Only the main thread submits.
pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) device: Arc<GfxDevice>,
}

// new & init
impl GfxCommandQueue {
    pub fn new(device: Arc<GfxDevice>, queue_family: GfxQueueFamily, queue_index: u32) -> GfxResult<Self> {
        let vk_queue = unsafe { device.get_device_queue(queue_family.queue_family_index, queue_index) };
        let queue = Self {
            vk_queue,
            queue_family,
            device,
        };
        queue.device.set_debug_name(&queue, &queue.queue_family.name)?;
        Ok(queue)
    }
}
// getters
impl GfxCommandQueue {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }

    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }
}
// tools
impl GfxCommandQueue {
    /// All batches go to the queue in one `vkQueueSubmit2`, in the order given.
    pub fn submit(&self, batches: Vec<GfxSubmitInfo>, fence: Option<&GfxFence>) -> GfxResult<()> {
        let submit_infos = batches.iter().map(|batch| batch.submit_info()).collect::<Vec<_>>();
        unsafe {
            self.device.queue_submit2(
                self.vk_queue,
                &submit_infos,
                fence.map_or(vk::Fence::null(), |fence| fence.handle()),
            )?;
        }
        Ok(())
    }

    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.queue_wait_idle(self.vk_queue)? };
        Ok(())
    }

    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let Ok(name) = std::ffi::CString::new(label_name) else {
            return;
        };
        unsafe {
            self.device.debug_utils.queue_begin_debug_utils_label(
                self.vk_queue,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    #[inline]
    pub fn end_label(&self) {
        unsafe { self.device.debug_utils.queue_end_debug_utils_label(self.vk_queue) };
    }
}
impl DebugType for GfxCommandQueue {
    fn debug_type_name() -> &'static str {
        "GfxCommandQueue"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}
