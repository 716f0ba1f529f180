//! Worker pools for threaded decoding.
//!
//! A pool is started the first time a given worker count is requested and is
//! kept for the life of the process, so repeated threaded decodes reuse the
//! same OS threads.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use ahash::AHashMap;
use colstream_common::{Error, Result};

type PoolMap = AHashMap<usize, Arc<rayon::ThreadPool>>;

/// Returns the shared pool with `threads` workers.
pub(crate) fn get(threads: usize) -> Result<Arc<rayon::ThreadPool>> {
    static POOLS: OnceLock<Mutex<PoolMap>> = OnceLock::new();
    let mut pools = POOLS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = pools.get(&threads) {
        return Ok(pool.clone());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("colstream_decode_{threads}_{i}"))
        .build()
        .map_err(|e| Error::unknown(format!("decode thread pool: {e}")))?;
    log::debug!("started decode pool with {threads} workers");
    let pool = Arc::new(pool);
    pools.insert(threads, pool.clone());
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    #[test]
    fn test_pool_is_reused() {
        let a = super::get(3).unwrap();
        let b = super::get(3).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.current_num_threads(), 3);

        let other = super::get(5).unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(other.current_num_threads(), 5);

        let name = a.install(|| std::thread::current().name().map(str::to_string));
        assert!(name.unwrap().starts_with("colstream_decode_3_"));
    }
}
