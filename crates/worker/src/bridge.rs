use anyhow::Context;
use std::future::Future;
use tokio::runtime::{Handle, Runtime};

const POOL_THREADS: usize = 3;

/// Runs async report tasks from synchronous entry points.
///
/// With no runtime on the calling thread the future is driven directly. Inside a runtime it is
/// handed to a small dedicated pool and the caller blocks until it finishes.
pub struct TaskBridge {
    pool: Option<Runtime>,
}

impl TaskBridge {
    pub fn new() -> anyhow::Result<Self> {
        let pool = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(POOL_THREADS)
            .thread_name("report-bridge")
            .enable_all()
            .build()
            .context("failed to build bridge runtime")?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn run<F, T>(&self, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.as_ref().context("bridge runtime already shut down")?;

        if Handle::try_current().is_err() {
            return pool.block_on(fut);
        }

        tracing::debug!("event loop already running; dispatching to bridge pool");
        let (tx, rx) = std::sync::mpsc::channel();
        pool.spawn(async move {
            let _ = tx.send(fut.await);
        });
        rx.recv().context("bridge task ended without a result")?
    }
}

impl Drop for TaskBridge {
    fn drop(&mut self) {
        // A plain drop would block, which panics inside an async context.
        if let Some(pool) = self.pool.take() {
            pool.shutdown_background();
        }
    }
}
