//! Per-frame scratch memory.
//!
//! Everything the rasterizer creates while drawing (vertex shader outputs, triangles, fragment records) lives in
//! linear bump-allocated arrays that are reset wholesale at the end of each draw call. Allocations are handed out as
//! [`Span`]s: plain index ranges into the owning array. Resetting never frees the underlying storage, so once the
//! arrays have grown to fit a frame the following frames allocate nothing.

use core::ops::Range;

/// A handle to a contiguous run of items allocated from a [`Scratch`] array.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub const EMPTY: Self = Self { start: 0, len: 0 };

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A linear allocator of `T`s with an upper limit on the number of live items.
#[derive(Clone, Debug)]
pub struct Scratch<T> {
    items: Vec<T>,
    limit: usize,
}

impl<T> Scratch<T> {
    /// Create an empty scratch array that may hold up to `limit` items between resets.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
        }
    }

    /// Bump-allocate `count` items, initialising each by calling `f`.
    ///
    /// # Panics
    ///
    /// Panics if the allocation would take the array past its limit.
    #[inline]
    pub fn alloc_with<F: FnMut() -> T>(&mut self, count: usize, f: F) -> Span {
        let start = self.items.len();
        assert!(
            count <= self.limit.saturating_sub(start),
            "Scratch arena overrun: requested {} items with {} of {} in use",
            count,
            start,
            self.limit,
        );
        self.items.extend(core::iter::repeat_with(f).take(count));
        Span { start, len: count }
    }

    /// Bump-allocate the items produced by an iterator.
    ///
    /// # Panics
    ///
    /// Panics if the allocation would take the array past its limit.
    pub fn alloc_from<I: IntoIterator<Item = T>>(&mut self, items: I) -> Span {
        let start = self.items.len();
        self.items.extend(items);
        assert!(
            self.items.len() <= self.limit,
            "Scratch arena overrun: {} items in use with a limit of {}",
            self.items.len(),
            self.limit,
        );
        Span {
            start,
            len: self.items.len() - start,
        }
    }

    #[inline]
    pub fn alloc(&mut self, count: usize) -> Span
    where
        T: Default,
    {
        self.alloc_with(count, T::default)
    }

    #[inline]
    pub fn get(&self, span: Span) -> &[T] {
        &self.items[span.range()]
    }

    #[inline]
    pub fn get_mut(&mut self, span: Span) -> &mut [T] {
        &mut self.items[span.range()]
    }

    /// View every live item as one slice.
    #[inline]
    pub fn all(&self) -> &[T] {
        &self.items
    }

    /// View every live item as one mutable slice.
    #[inline]
    pub fn all_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Release every allocation at once, keeping the storage for the next frame.
    #[inline]
    pub fn reset(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_are_contiguous_and_disjoint() {
        let mut scratch = Scratch::<u32>::with_limit(16);
        let a = scratch.alloc(3);
        let b = scratch.alloc_with(4, || 7);
        let c = scratch.alloc_from(vec![1, 2]);
        assert_eq!(a, Span { start: 0, len: 3 });
        assert_eq!(b, Span { start: 3, len: 4 });
        assert_eq!(c, Span { start: 7, len: 2 });
        assert_eq!(scratch.get(b), &[7, 7, 7, 7]);
        assert_eq!(scratch.get(c), &[1, 2]);

        scratch.get_mut(a).copy_from_slice(&[9, 8, 7]);
        assert_eq!(&scratch.all()[..3], &[9, 8, 7]);
    }

    #[test]
    fn reset_keeps_storage() {
        let mut scratch = Scratch::<u64>::with_limit(1024);
        scratch.alloc(1000);
        scratch.reset();
        assert!(scratch.is_empty());
        let span = scratch.alloc(1024);
        assert_eq!(span.start, 0);
        assert_eq!(scratch.len(), 1024);
    }

    #[test]
    #[should_panic(expected = "Scratch arena overrun")]
    fn overrun_panics() {
        let mut scratch = Scratch::<u8>::with_limit(4);
        scratch.alloc(3);
        scratch.alloc(2);
    }
}
