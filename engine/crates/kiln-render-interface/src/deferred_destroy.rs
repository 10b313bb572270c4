/// Items waiting for the GPU to stop using them.
///
/// An item queued during frame `f` may still be referenced by the command buffers of frames
/// `f..f + latency`, so it expires once `f + latency <= current_frame`.
pub struct DeferredDestroyQueue<T> {
    pending: Vec<(u64, T)>,
    latency: u64,
}

impl<T> DeferredDestroyQueue<T> {
    pub fn new(latency: u64) -> Self {
        Self {
            pending: Vec::new(),
            latency,
        }
    }

    #[inline]
    pub fn push(&mut self, retire_frame: u64, item: T) {
        self.pending.push((retire_frame, item));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Expired items, in the order they were queued.
    pub fn drain_expired(&mut self, current_frame: u64) -> Vec<T> {
        let latency = self.latency;
        let (expired, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(retire_frame, _)| retire_frame + latency <= current_frame);
        self.pending = pending;
        expired.into_iter().map(|(_, item)| item).collect()
    }

    pub fn drain_all(&mut self) -> Vec<T> {
        self.pending.drain(..).map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_latency() {
        let mut queue = DeferredDestroyQueue::new(2);
        queue.push(5, "a");
        queue.push(6, "b");

        assert!(queue.drain_expired(5).is_empty());
        assert!(queue.drain_expired(6).is_empty());
        assert_eq!(queue.drain_expired(7), vec!["a"]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain_expired(100), vec!["b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let mut queue = DeferredDestroyQueue::new(2);
        queue.push(0, 1);
        queue.push(3, 2);
        queue.push(1, 3);
        assert_eq!(queue.drain_expired(3), vec![1, 3]);
        assert_eq!(queue.drain_all(), vec![2]);
    }

    #[test]
    fn test_same_frame_retirements_expire_together() {
        let mut queue = DeferredDestroyQueue::new(2);
        for slot in 0..4 {
            queue.push(10, slot);
        }
        assert_eq!(queue.len(), 4);
        assert!(queue.drain_expired(11).is_empty());
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.drain_expired(12), vec![0, 1, 2, 3]);
        assert_eq!(queue.len(), 0);
    }
}
