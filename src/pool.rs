//! Page-based bump allocator scoped to a decoding cycle.
//!
//! [`Pool`] serves small requests by carving them off the active page and
//! large requests (bigger than a page) from dedicated blocks. Nothing is freed
//! individually: [`Pool::recycle`] rewinds every page for reuse in the next
//! cycle and forgets the large blocks.
//!
//! Pages are zero-filled once, when first reserved. Carving a view off a page
//! touches none of its bytes, so [`Pool::reserve`] hands out empty buffers
//! whose capacity is a slice of the page and [`Pool::alloc`] zeroes only the
//! bytes it returns.
//!
//! Allocations are [`BytesMut`] views into the page they were carved from.
//! A view keeps its page alive after a recycle, so a page still referenced by
//! an earlier frame is replaced rather than overwritten. Callers should still
//! recycle only between frames: a replaced page costs a fresh allocation.

use std::{mem, num::NonZeroUsize};

use bytes::{Bytes, BytesMut};

use crate::error::AmqpError;

/// Growable arena of fixed-size pages plus oversized blocks.
#[derive(Debug)]
pub struct Pool {
    page_size: NonZeroUsize,
    pages: Vec<BytesMut>,
    next_page: usize,
    large_blocks: usize,
}

impl Pool {
    /// Create an empty pool. Pages are allocated lazily.
    #[must_use]
    pub const fn new(page_size: NonZeroUsize) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            next_page: 0,
            large_blocks: 0,
        }
    }

    /// Return the page size in bytes.
    #[must_use]
    pub const fn page_size(&self) -> usize { self.page_size.get() }

    /// Number of pages created so far.
    #[must_use]
    pub fn page_count(&self) -> usize { self.pages.len() }

    /// Number of oversized blocks handed out since the last recycle.
    #[must_use]
    pub const fn large_block_count(&self) -> usize { self.large_blocks }

    /// Reserve an empty buffer able to hold `size` bytes without growing.
    ///
    /// No byte of the reservation is written: callers fill it with
    /// `extend_from_slice` or similar. Writing past `size` moves the buffer to
    /// a fresh allocation instead of spilling into the rest of the page.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::NoMemory`] if the underlying allocator refuses a
    /// new page or block.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use amqp_wire::pool::Pool;
    ///
    /// let mut pool = Pool::new(NonZeroUsize::new(64).expect("non-zero"));
    /// let block = pool.reserve(16).expect("reservation");
    /// assert!(block.is_empty());
    /// assert!(block.capacity() >= 16);
    /// ```
    pub fn reserve(&mut self, size: usize) -> Result<BytesMut, AmqpError> {
        if size == 0 {
            return Ok(BytesMut::new());
        }
        if size > self.page_size() {
            let block = reserve_block(size)?;
            self.large_blocks += 1;
            return Ok(block);
        }

        if let Some(page) = self.pages.get_mut(self.next_page) {
            if page.capacity() >= size {
                return Ok(carve(page, size));
            }
            self.next_page += 1;
        }

        if self.next_page >= self.pages.len() {
            self.pages.push(reserve_block(self.page_size())?);
            self.next_page = self.pages.len() - 1;
        }
        let page = &mut self.pages[self.next_page];
        Ok(carve(page, size))
    }

    /// Allocate `size` bytes, each set to zero.
    ///
    /// Only the returned bytes are written; the rest of the page is left as
    /// it is. A zero-size request returns an empty buffer without touching
    /// any page.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::NoMemory`] if the underlying allocator refuses a
    /// new page or block.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use amqp_wire::pool::Pool;
    ///
    /// let mut pool = Pool::new(NonZeroUsize::new(64).expect("non-zero"));
    /// let block = pool.alloc(16).expect("allocation");
    /// assert_eq!(block.len(), 16);
    /// assert_eq!(pool.page_count(), 1);
    /// ```
    pub fn alloc(&mut self, size: usize) -> Result<BytesMut, AmqpError> {
        let mut block = self.reserve(size)?;
        block.resize(size, 0);
        Ok(block)
    }

    /// Rewind the pool for another cycle.
    ///
    /// Pages no longer referenced by earlier allocations are kept for reuse;
    /// pages still referenced are dropped from the pool and left to their
    /// remaining owners. Memory is not cleared.
    pub fn recycle(&mut self) {
        let page_size = self.page_size();
        self.pages.retain_mut(|page| page.try_reclaim(page_size));
        self.next_page = 0;
        self.large_blocks = 0;
        tracing::trace!(pages = self.pages.len(), "pool recycled");
    }

    /// Release every page.
    pub fn empty(&mut self) {
        self.pages.clear();
        self.next_page = 0;
        self.large_blocks = 0;
    }
}

/// Reserve `capacity` bytes as an empty, uniquely owned buffer.
///
/// The block is zero-filled so the `Vec` converts without shedding its spare
/// capacity, then cleared.
fn reserve_block(capacity: usize) -> Result<BytesMut, AmqpError> {
    let mut block: Vec<u8> = Vec::new();
    block
        .try_reserve_exact(capacity)
        .map_err(|_| AmqpError::NoMemory)?;
    block.resize(capacity, 0);
    let mut page = BytesMut::from(Bytes::from(block));
    page.clear();
    Ok(page)
}

/// Split the first `size` bytes of capacity off an empty page.
fn carve(page: &mut BytesMut, size: usize) -> BytesMut {
    let rest = page.split_off(size);
    mem::replace(page, rest)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    use super::{Pool, reserve_block};

    #[fixture]
    fn pool() -> Pool { Pool::new(NonZeroUsize::new(1024).expect("non-zero page size")) }

    #[rstest]
    fn zero_size_allocation_is_empty(mut pool: Pool) {
        let block = pool.alloc(0).expect("zero-size allocation");
        assert!(block.is_empty());
        assert_eq!(pool.page_count(), 0);
    }

    #[rstest]
    fn small_allocations_share_a_page(mut pool: Pool) {
        let first = pool.alloc(100).expect("first");
        let second = pool.alloc(200).expect("second");
        assert_eq!(first.len(), 100);
        assert_eq!(second.len(), 200);
        assert_eq!(pool.page_count(), 1);
    }

    #[rstest]
    fn exhausted_page_advances_to_a_new_one(mut pool: Pool) {
        let _first = pool.alloc(1000).expect("first");
        let _second = pool.alloc(100).expect("second");
        assert_eq!(pool.page_count(), 2);
    }

    #[rstest]
    fn oversized_requests_use_large_blocks(mut pool: Pool) {
        let block = pool.alloc(4096).expect("large block");
        assert_eq!(block.len(), 4096);
        assert_eq!(pool.page_count(), 0);
        assert_eq!(pool.large_block_count(), 1);
    }

    #[rstest]
    fn recycle_reuses_unreferenced_pages(mut pool: Pool) {
        drop(pool.alloc(1000).expect("first"));
        drop(pool.alloc(1000).expect("second"));
        drop(pool.alloc(4096).expect("large"));
        assert_eq!(pool.page_count(), 2);

        pool.recycle();
        assert_eq!(pool.large_block_count(), 0);

        let _again = pool.alloc(1000).expect("after recycle");
        let _more = pool.alloc(1000).expect("second page after recycle");
        assert_eq!(pool.page_count(), 2);
    }

    #[rstest]
    fn allocations_after_recycle_are_disjoint_from_live_ones(mut pool: Pool) {
        let mut before = pool.alloc(512).expect("before recycle");
        before.fill(0xAA);
        let before = before.freeze();

        pool.recycle();

        let mut after = pool.alloc(512).expect("after recycle");
        after.fill(0xBB);

        assert!(before.iter().all(|&b| b == 0xAA));
        assert!(after.iter().all(|&b| b == 0xBB));
    }

    #[rstest]
    #[case(1)]
    #[case(1024)]
    #[case(131_072)]
    fn reserved_blocks_keep_their_capacity(#[case] size: usize) {
        let block = reserve_block(size).expect("block");
        assert!(block.is_empty());
        assert!(block.capacity() >= size);
    }

    #[rstest]
    fn reservations_are_carved_without_writing(mut pool: Pool) {
        let mut first = pool.reserve(300).expect("first");
        let second = pool.reserve(300).expect("second");
        assert!(first.is_empty() && second.is_empty());
        assert!(first.capacity() >= 300 && second.capacity() >= 300);
        assert_eq!(pool.page_count(), 1);

        first.extend_from_slice(&[0xCC; 300]);
        assert_eq!(first.capacity(), 300);
        assert!(second.is_empty());
    }

    #[rstest]
    fn carving_a_whole_page_repeatedly_reuses_it(mut pool: Pool) {
        for round in 0u8..16 {
            let mut block = pool.reserve(1024).expect("page-sized reservation");
            block.extend_from_slice(&[round; 1024]);
            drop(block);
            pool.recycle();
        }
        assert_eq!(pool.page_count(), 1);
        assert_eq!(pool.large_block_count(), 0);
    }

    #[rstest]
    fn alloc_zeroes_only_what_it_returns(mut pool: Pool) {
        let mut dirty = pool.reserve(64).expect("reservation");
        dirty.extend_from_slice(&[0xFF; 64]);
        drop(dirty);
        pool.recycle();

        let block = pool.alloc(64).expect("allocation");
        assert!(block.iter().all(|&b| b == 0));
    }

    #[rstest]
    fn empty_releases_all_pages(mut pool: Pool) {
        let _block = pool.alloc(10).expect("allocation");
        pool.empty();
        assert_eq!(pool.page_count(), 0);
    }

    proptest! {
        #[test]
        fn any_page_sized_allocation_succeeds(
            sizes in proptest::collection::vec(0usize..=1024, 1..64),
        ) {
            let mut pool = Pool::new(NonZeroUsize::new(1024).expect("non-zero page size"));
            for size in sizes {
                let block = pool.alloc(size).expect("allocation");
                prop_assert_eq!(block.len(), size);
            }
            pool.recycle();
            prop_assert_eq!(pool.alloc(1024).expect("full page").len(), 1024);
        }
    }
}
