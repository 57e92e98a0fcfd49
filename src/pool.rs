use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::ProviderError;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, T>(&self, task: F) -> Result<T, ProviderError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| ProviderError::Worker(err.to_string()))?;
        tokio::spawn(async move {
            let _permit = permit;
            task.await
        })
        .await
        .map_err(|err| ProviderError::Worker(err.to_string()))
    }

    pub async fn run_blocking<F, T>(&self, task: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| ProviderError::Worker(err.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await
        .map_err(|err| ProviderError::Worker(err.to_string()))
    }
}
