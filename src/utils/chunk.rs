//! Fixed-chunk growth for the reactor's wait sets.
//!
//! The wait sets never double: when full they grow by exactly one chunk, so
//! memory tracks the number of suspended tasks in page-sized steps.

/// Chunk used when none is configured: one OS page worth of entries.
pub(crate) fn default_chunk() -> usize {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page > 0 { page as usize } else { 4096 }
}

/// Creates a vector with room for one chunk.
pub(crate) fn with_chunk<T>(chunk: usize) -> Vec<T> {
    Vec::with_capacity(chunk.max(1))
}

/// Grows `items` by one chunk if it is exhausted.
pub(crate) fn reserve_chunk<T>(items: &mut Vec<T>, chunk: usize) {
    if items.len() == items.capacity() {
        items.reserve_exact(chunk.max(1));
    }
}
