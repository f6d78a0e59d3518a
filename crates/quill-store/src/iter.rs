//! Lazy paging iteration over key ranges.

use std::collections::VecDeque;

use crate::error::StoreResult;
use crate::kv::KvStore;

/// Default number of entries fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (empty prefix or all `0xff`),
/// meaning the range is unbounded above.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Ascending iterator over `[start, end)` that fetches one page at a time.
///
/// Between pages the iterator only remembers the next key to resume from,
/// so it never pins a cursor inside the store. A backend error is yielded
/// once and ends the iteration.
pub struct RangeIter<'a> {
    store: &'a dyn KvStore,
    next_start: Vec<u8>,
    end: Option<Vec<u8>>,
    page_size: usize,
    buffer: VecDeque<(Vec<u8>, Vec<u8>)>,
    exhausted: bool,
}

impl<'a> RangeIter<'a> {
    pub fn new(
        store: &'a dyn KvStore,
        start: Vec<u8>,
        end: Option<Vec<u8>>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            next_start: start,
            end,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Iterate every key that starts with `prefix`.
    pub fn prefix(store: &'a dyn KvStore, prefix: &[u8], page_size: usize) -> Self {
        Self::new(store, prefix.to_vec(), prefix_end(prefix), page_size)
    }

    fn fill(&mut self) -> StoreResult<()> {
        let page = self
            .store
            .scan(&self.next_start, self.end.as_deref(), self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some((last, _)) = page.last() {
            // The immediate successor of `last` in byte order.
            let mut resume = last.clone();
            resume.push(0);
            self.next_start = resume;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for RangeIter<'_> {
    type Item = StoreResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl std::fmt::Debug for RangeIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIter")
            .field("next_start", &hex::encode(&self.next_start))
            .field("page_size", &self.page_size)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
