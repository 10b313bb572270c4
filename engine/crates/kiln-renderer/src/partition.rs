use std::ops::Range;

/// Splits `item_count` draws into contiguous ranges for `worker_count` workers.
///
/// With at least as many workers as items every item gets its own range. Otherwise each worker
/// takes `item_count / worker_count` items and the remainder goes to one extra trailing range.
/// The ranges cover `0..item_count` in ascending order with no gaps; `worker_count == 0` is
/// treated as one worker.
pub fn plan_partitions(item_count: usize, worker_count: usize) -> Vec<Range<usize>> {
    let workers = worker_count.max(1);
    if item_count == 0 {
        return Vec::new();
    }
    if workers >= item_count {
        return (0..item_count).map(|i| i..i + 1).collect();
    }

    let per = item_count / workers;
    let surplus = item_count % workers;

    let mut ranges: Vec<Range<usize>> = (0..workers).map(|w| w * per..(w + 1) * per).collect();
    if surplus != 0 {
        let tail_start = workers * per;
        ranges.push(tail_start..tail_start + surplus);
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(ranges: &[Range<usize>]) -> Vec<usize> {
        ranges.iter().map(|r| r.len()).collect()
    }

    #[test]
    fn test_ten_items_four_workers() {
        let ranges = plan_partitions(10, 4);
        assert_eq!(sizes(&ranges), vec![2, 2, 2, 2, 2]);
        assert_eq!(ranges.last(), Some(&(8..10)));
    }

    #[test]
    fn test_more_workers_than_items() {
        let ranges = plan_partitions(3, 8);
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_empty_list_has_no_tasks() {
        assert!(plan_partitions(0, 4).is_empty());
        assert!(plan_partitions(0, 0).is_empty());
    }

    #[test]
    fn test_zero_workers_means_one() {
        assert_eq!(plan_partitions(7, 0), vec![0..7]);
    }

    #[test]
    fn test_exact_cover_in_order() {
        for n in 0..64 {
            for t in 0..12 {
                let ranges = plan_partitions(n, t);
                let mut next = 0;
                for range in &ranges {
                    assert_eq!(range.start, next, "n={n} t={t}");
                    assert!(!range.is_empty());
                    next = range.end;
                }
                assert_eq!(next, n, "n={n} t={t}");
                assert!(ranges.len() <= t.max(1) + 1);
            }
        }
    }
}
