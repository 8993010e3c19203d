use std::ops::Range;

use crate::error::{Error, Result};

/// Split `len` positions into at most `threads` contiguous ranges
///
/// The chunk count is `min(threads, len)`. Every chunk holds `len / k`
/// positions and the first `len % k` chunks hold one more, so the ranges
/// cover `0..len` in order with no gaps or overlap. An empty sequence yields
/// no ranges at all.
pub fn chunk_ranges(len: usize, threads: usize) -> Result<Vec<Range<usize>>> {
    if threads == 0 {
        return Err(Error::InvalidConfiguration(String::from(
            "thread budget must be at least 1",
        )));
    }
    if len == 0 {
        return Ok(Vec::new());
    }

    let count = threads.min(len);
    let base = len / count;
    let extra = len % count;

    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let end = start + base + usize::from(i < extra);
        ranges.push(start..end);
        start = end;
    }
    debug_assert_eq!(start, len);

    tracing::trace!(
        len,
        threads,
        chunks = count,
        base,
        extra,
        "partitioned sequence"
    );
    Ok(ranges)
}

/// Borrow `items` as the chunks described by [`chunk_ranges`]
pub fn split<T>(items: &[T], threads: usize) -> Result<Vec<&[T]>> {
    Ok(chunk_ranges(items.len(), threads)?
        .into_iter()
        .map(|range| &items[range])
        .collect())
}
