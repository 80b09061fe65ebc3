/// Builds a bounded rayon pool for `concurrent_lookup`/`concurrent_insert`,
/// sized `min(n_tasks, worker_pool_size)` so a handful of operations don't
/// spin up dozens of idle threads.
pub fn build(worker_pool_size: usize, n_tasks: usize) -> rayon::ThreadPool {
    let threads = worker_pool_size.min(n_tasks).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("failed to build worker pool")
}
