//! Fixed-size pool of blocking worker threads.

use tokio::runtime::{Builder, Runtime};

use crate::error::RepositoryError;

pub struct WorkerPool {
    runtime: Option<Runtime>,
    size: usize,
}

impl WorkerPool {
    /// At most `size` jobs run at once; the rest wait in submission order.
    pub fn new(size: usize) -> Result<Self, RepositoryError> {
        let size = size.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(size)
            .thread_name("billbook-worker")
            .build()?;
        tracing::debug!(size, "Worker pool started");
        Ok(Self {
            runtime: Some(runtime),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(runtime) = &self.runtime {
            runtime.spawn_blocking(job);
        }
    }

    /// Stops accepting work. Jobs already running finish on their own
    /// threads; queued jobs are dropped without running.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            tracing::debug!(size = self.size, "Worker pool stopped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}
