//! Bucket splitting.
//!
//! Partitions an ordered list into at most `K` contiguous buckets whose sizes
//! differ by at most one, larger buckets first:
//!
//! ```text
//! 3 buckets for [a, b, c, d, e, f, g, h]
//!     → [a, b, c], [d, e, f], [g, h]
//! ```

use std::iter::FusedIterator;
use std::num::NonZeroUsize;
use tracing::trace;

use crate::error::{Result, StripingError};
use crate::item::CacheItem;

/// Default number of concurrent precache installations.
pub const DEFAULT_BUCKET_COUNT: usize = 4;

/// Lazy iterator over contiguous buckets of a slice.
#[derive(Debug, Clone)]
pub struct Buckets<'a, T> {
    items: &'a [T],
    offset: usize,
    base: usize,
    extra: usize,
}

impl<'a, T> Buckets<'a, T> {
    fn new(items: &'a [T], bucket_count: NonZeroUsize) -> Self {
        let count = bucket_count.get();
        Self {
            items,
            offset: 0,
            base: items.len() / count,
            extra: items.len() % count,
        }
    }

    fn remaining_buckets(&self) -> usize {
        let rest = self.items.len() - self.offset;
        if rest == 0 {
            0
        } else if self.base == 0 {
            // Only single-item buckets remain.
            rest
        } else {
            self.extra + (rest - self.extra * (self.base + 1)) / self.base
        }
    }
}

impl<'a, T> Iterator for Buckets<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.items.len();
        if self.offset >= len {
            return None;
        }

        let mut size = self.base;
        if self.extra > 0 {
            self.extra -= 1;
            size += 1;
        }
        let start = self.offset;
        let end = (start + size).min(len);
        if end == start {
            return None;
        }

        trace!(start, end, "Bucket boundaries");
        self.offset = end;
        Some(&self.items[start..end])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining_buckets();
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for Buckets<'_, T> {}

impl<T> FusedIterator for Buckets<'_, T> {}

/// Split `items` into at most `bucket_count` contiguous buckets.
///
/// Fails fast on a bucket count of zero. Empty input yields no buckets.
pub fn split_into_buckets<T>(items: &[T], bucket_count: usize) -> Result<Buckets<'_, T>> {
    let count =
        NonZeroUsize::new(bucket_count).ok_or(StripingError::InvalidBucketCount(bucket_count))?;
    Ok(Buckets::new(items, count))
}

/// Strategy for partitioning precache entries into independently installed
/// groups.
pub trait SplitEntries {
    /// Lazily yield the groups. Concatenating them must reproduce `entries`.
    fn split<'a>(
        &'a self,
        entries: &'a [CacheItem],
    ) -> Box<dyn Iterator<Item = Vec<CacheItem>> + 'a>;
}

impl<F> SplitEntries for F
where
    F: Fn(&[CacheItem]) -> Vec<Vec<CacheItem>>,
{
    fn split<'a>(
        &'a self,
        entries: &'a [CacheItem],
    ) -> Box<dyn Iterator<Item = Vec<CacheItem>> + 'a> {
        Box::new(self(entries).into_iter())
    }
}

/// The default strategy: a fixed number of balanced buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSplitter {
    bucket_count: NonZeroUsize,
}

impl BucketSplitter {
    pub fn bucket_count(&self) -> usize {
        self.bucket_count.get()
    }
}

impl SplitEntries for BucketSplitter {
    fn split<'a>(
        &'a self,
        entries: &'a [CacheItem],
    ) -> Box<dyn Iterator<Item = Vec<CacheItem>> + 'a> {
        Box::new(Buckets::new(entries, self.bucket_count).map(<[CacheItem]>::to_vec))
    }
}

/// Build the default split strategy for `bucket_count` buckets.
pub fn split_by_bucket_size(bucket_count: usize) -> Result<BucketSplitter> {
    let bucket_count =
        NonZeroUsize::new(bucket_count).ok_or(StripingError::InvalidBucketCount(bucket_count))?;
    Ok(BucketSplitter { bucket_count })
}
