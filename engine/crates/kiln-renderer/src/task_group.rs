use crossbeam_channel::Receiver;
use crossbeam_utils::sync::WaitGroup;

use crate::error::{RendererError, RendererResult};

/// The fixed rayon pool recording jobs run on. Only used inside the recording window of a frame.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    thread_count: usize,
}

// new & init
impl WorkerPool {
    /// `thread_count` of 0 is raised to 1.
    pub fn new(thread_count: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let thread_count = thread_count.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|index| format!("kiln-record-{}", index))
            // a panicking job drops its sender; the join reports it as a lost task
            .panic_handler(|_| log::error!("recording task panicked"))
            .build()?;
        log::info!("recording worker pool: {} threads", thread_count);
        Ok(Self { pool, thread_count })
    }
}
// getters
impl WorkerPool {
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }
}
// tools
impl WorkerPool {
    pub fn task_group<R: Send + 'static>(&self) -> OrderedTaskGroup<'_, R> {
        OrderedTaskGroup {
            pool: &self.pool,
            receivers: Vec::new(),
            wait_group: WaitGroup::new(),
        }
    }
}

/// Jobs that finish in any order but are collected in the order they were spawned.
///
/// Every job owns whatever it works on (`'static`), sends its result over its own one-shot
/// channel and holds a [`WaitGroup`] clone until its closure is gone.
pub struct OrderedTaskGroup<'p, R> {
    pool: &'p rayon::ThreadPool,
    receivers: Vec<Receiver<R>>,
    wait_group: WaitGroup,
}

impl<R: Send + 'static> OrderedTaskGroup<'_, R> {
    pub fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let task_wg = self.wait_group.clone();
        let task_index = self.receivers.len();

        self.pool.spawn(move || {
            let _span = tracy_client::span!("record task");
            let result = job();
            if result_tx.send(result).is_err() {
                log::warn!("task {} finished after its group was dropped", task_index);
            }
            drop(task_wg);
        });
        self.receivers.push(result_rx);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Blocks until every job is done. Results come back in spawn order.
    pub fn wait_all(self) -> RendererResult<Vec<R>> {
        let _span = tracy_client::span!("OrderedTaskGroup::wait_all");
        let results = self
            .receivers
            .iter()
            .enumerate()
            .map(|(index, rx)| rx.recv().map_err(|_| RendererError::TaskLost(index)))
            .collect::<RendererResult<Vec<_>>>();

        // even on a lost task, nothing may still be running when the caller reuses the lanes
        self.wait_group.wait();
        results
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    fn workers(threads: usize) -> WorkerPool {
        // jobs and the join are profiled
        tracy_client::Client::start();
        WorkerPool::new(threads).unwrap()
    }

    #[test]
    fn test_results_in_spawn_order() {
        let workers = workers(4);
        let mut group = workers.task_group();
        for i in 0..16u64 {
            // later tasks finish first
            group.spawn(move || {
                thread::sleep(Duration::from_millis(16 - i));
                i
            });
        }
        assert_eq!(group.len(), 16);
        assert_eq!(group.wait_all().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_tasks_run_on_named_workers() {
        let workers = workers(2);
        let mut group = workers.task_group();
        group.spawn(|| thread::current().name().map(str::to_string));
        let names = group.wait_all().unwrap();
        assert!(names[0].as_deref().is_some_and(|name| name.starts_with("kiln-record-")));
    }

    #[test]
    fn test_empty_group() {
        let workers = workers(0);
        assert_eq!(workers.thread_count(), 1);
        let group = workers.task_group::<()>();
        assert!(group.is_empty());
        assert!(group.wait_all().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_task_is_lost() {
        let workers = workers(2);
        let mut group = workers.task_group();
        group.spawn(|| 1);
        group.spawn(|| -> i32 { panic!("boom") });
        group.spawn(|| 3);
        assert!(matches!(group.wait_all(), Err(RendererError::TaskLost(1))));
    }
}
