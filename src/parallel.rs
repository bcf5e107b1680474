//! Fork-join execution of batched work.
//!
//! Every function here blocks until all of its work has completed, so the stages of a draw call never overlap.

use crate::math::Bounds2;
use core::marker::PhantomData;

/// Runs a number of independent tasks, returning once all of them have completed.
pub trait Scheduler: Send + Sync {
    /// Invoke `task(i)` once for every `i` in `0..tasks`, in any order and on any thread.
    ///
    /// A panic in any task must propagate to the caller.
    fn run(&self, tasks: usize, task: &(dyn Fn(usize) + Sync));
}

impl<'a, S: Scheduler + ?Sized> Scheduler for &'a S {
    #[inline]
    fn run(&self, tasks: usize, task: &(dyn Fn(usize) + Sync)) {
        (**self).run(tasks, task)
    }
}

/// Runs every task in order on the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct Inline;

impl Scheduler for Inline {
    #[inline]
    fn run(&self, tasks: usize, task: &(dyn Fn(usize) + Sync)) {
        (0..tasks).for_each(task);
    }
}

/// Runs tasks on scoped worker threads that claim work from a shared counter.
#[cfg(feature = "par")]
#[derive(Copy, Clone, Debug)]
pub struct ThreadPool {
    threads: usize,
}

#[cfg(feature = "par")]
impl ThreadPool {
    /// Create a pool with one worker per logical CPU.
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get())
    }

    /// # Panics
    ///
    /// Panics if `threads` is zero.
    pub fn with_threads(threads: usize) -> Self {
        assert!(threads > 0, "A thread pool needs at least one thread");
        log::info!("Created thread pool with {} worker threads", threads);
        Self { threads }
    }
}

#[cfg(feature = "par")]
impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "par")]
impl Scheduler for ThreadPool {
    fn run(&self, tasks: usize, task: &(dyn Fn(usize) + Sync)) {
        use core::sync::atomic::{AtomicUsize, Ordering};
        use std::any::Any;

        let workers = self.threads.min(tasks);
        if workers <= 1 {
            return Inline.run(tasks, task);
        }

        let next = AtomicUsize::new(0);
        let result = crossbeam_utils::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    if i >= tasks {
                        break;
                    }
                    task(i);
                });
            }
        });

        if let Err(err) = result {
            // Rethrow the first worker panic with its payload
            let payload = match err.downcast::<Vec<Box<dyn Any + Send + 'static>>>() {
                Ok(mut panics) if !panics.is_empty() => panics.swap_remove(0),
                Ok(_) => Box::new("A worker thread panicked") as Box<dyn Any + Send + 'static>,
                Err(other) => other,
            };
            std::panic::resume_unwind(payload);
        }
    }
}

/// The scheduler used by the rasterizer unless another one is given.
#[cfg(feature = "par")]
pub type DefaultScheduler = ThreadPool;

/// The scheduler used by the rasterizer unless another one is given.
#[cfg(not(feature = "par"))]
pub type DefaultScheduler = Inline;

/// Call `f(i)` for every `i` in `0..end`, handing out `batch` consecutive indices at a time.
///
/// # Panics
///
/// Panics if `batch` is zero.
pub fn parallel_for<S, F>(scheduler: &S, end: usize, batch: usize, f: F)
where
    S: Scheduler + ?Sized,
    F: Fn(usize) + Sync,
{
    assert!(batch > 0, "Batch size cannot be zero");
    let batches = (end + batch - 1) / batch;
    scheduler.run(batches, &|b| {
        let start = b * batch;
        (start..(start + batch).min(end)).for_each(&f);
    });
}

/// Call `f` once for every square block of side `block` that `bounds` splits into.
///
/// # Panics
///
/// Panics if `block` is zero.
pub fn parallel_for_2d<S, F>(scheduler: &S, bounds: Bounds2, block: usize, f: F)
where
    S: Scheduler + ?Sized,
    F: Fn(Bounds2) + Sync,
{
    let blocks = bounds.tiles(block).collect::<Vec<_>>();
    scheduler.run(blocks.len(), &|i| f(blocks[i]));
}

/// Call `f(i, &mut items[i])` for every item of a slice, handing out `batch` consecutive items at a time.
///
/// # Panics
///
/// Panics if `batch` is zero.
pub fn parallel_for_each_mut<S, T, F>(scheduler: &S, items: &mut [T], batch: usize, f: F)
where
    S: Scheduler + ?Sized,
    T: Send,
    F: Fn(usize, &mut T) + Sync,
{
    let len = items.len();
    let shared = SharedSliceMut::new(items);
    parallel_for(scheduler, len, batch, |i| {
        // Safety: `parallel_for` visits every index exactly once
        f(i, unsafe { shared.get_mut(i) })
    });
}

/// A mutable slice that may be written from many threads, provided no two of them touch the same element.
pub(crate) struct SharedSliceMut<'a, T> {
    ptr: *mut T,
    len: usize,
    phantom: PhantomData<&'a mut [T]>,
}

// Safety: the slice is uniquely borrowed for `'a` and callers uphold per-element exclusivity
unsafe impl<'a, T: Send> Send for SharedSliceMut<'a, T> {}
unsafe impl<'a, T: Send> Sync for SharedSliceMut<'a, T> {}

impl<'a, T> SharedSliceMut<'a, T> {
    pub(crate) fn new(items: &'a mut [T]) -> Self {
        Self {
            ptr: items.as_mut_ptr(),
            len: items.len(),
            phantom: PhantomData,
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// # Safety
    ///
    /// Nothing else may access element `i` while the returned reference is alive.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self, i: usize) -> &mut T {
        assert!(i < self.len, "Index {} out of bounds of shared slice of length {}", i, self.len);
        &mut *self.ptr.add(i)
    }

    /// # Safety
    ///
    /// Nothing else may access any element of `range` while the returned slice is alive.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, range: core::ops::Range<usize>) -> &mut [T] {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "Range {:?} out of bounds of shared slice of length {}",
            range,
            self.len,
        );
        core::slice::from_raw_parts_mut(self.ptr.add(range.start), range.end - range.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn schedulers() -> Vec<Box<dyn Scheduler>> {
        let mut schedulers: Vec<Box<dyn Scheduler>> = vec![Box::new(Inline)];
        #[cfg(feature = "par")]
        schedulers.push(Box::new(ThreadPool::with_threads(4)));
        schedulers
    }

    #[test]
    fn every_index_is_visited_once() {
        for scheduler in schedulers() {
            for &(end, batch) in [(0, 1), (1, 64), (100, 7), (1000, 64)].iter() {
                let counts = (0..end).map(|_| AtomicU32::new(0)).collect::<Vec<_>>();
                parallel_for(&*scheduler, end, batch, |i| {
                    counts[i].fetch_add(1, Ordering::Relaxed);
                });
                assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
            }
        }
    }

    #[test]
    fn for_each_mut_writes_every_item() {
        for scheduler in schedulers() {
            let mut items = vec![0usize; 517];
            parallel_for_each_mut(&*scheduler, &mut items, 16, |i, item| *item = i * 2);
            assert!(items.iter().enumerate().all(|(i, &item)| item == i * 2));
        }
    }

    #[test]
    fn blocks_cover_bounds() {
        for scheduler in schedulers() {
            let bounds = Bounds2::new([0, 0], [100, 37]);
            let area = AtomicUsize::new(0);
            parallel_for_2d(&*scheduler, bounds, 32, |block| {
                assert!(block.width() <= 32 && block.height() <= 32);
                area.fetch_add(block.area(), Ordering::Relaxed);
            });
            assert_eq!(area.load(Ordering::Relaxed), bounds.area());
        }
    }

    #[cfg(feature = "par")]
    #[test]
    #[should_panic(expected = "task 13 failed")]
    fn worker_panics_propagate() {
        parallel_for(&ThreadPool::with_threads(3), 64, 1, |i| {
            if i == 13 {
                panic!("task {} failed", i);
            }
        });
    }
}
