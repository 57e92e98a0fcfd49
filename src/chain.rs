use async_trait::async_trait;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::error::{ProviderError, StageError};

#[async_trait]
pub trait Strategy<I, O>: Send + Sync
where
    I: Send + Sync,
{
    fn name(&self) -> &str;

    async fn attempt(&self, input: &I) -> Result<O, StageError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: String,
    pub error: ProviderError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome<O> {
    pub value: O,
    pub stage: String,
    pub failures: Vec<StageFailure>,
}

pub struct FallbackChain<I, O> {
    label: String,
    strategies: Vec<Box<dyn Strategy<I, O>>>,
}

impl<I, O> FallbackChain<I, O>
where
    I: Send + Sync,
    O: Send,
{
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            strategies: Vec::new(),
        }
    }

    pub fn push(&mut self, strategy: impl Strategy<I, O> + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    pub fn with(mut self, strategy: impl Strategy<I, O> + 'static) -> Self {
        self.push(strategy);
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub async fn run(
        &self,
        input: &I,
        cancel: &CancelToken,
    ) -> Result<ChainOutcome<O>, StageError> {
        let mut failures = Vec::new();
        for strategy in &self.strategies {
            cancel.checkpoint()?;
            match strategy.attempt(input).await {
                Ok(value) => {
                    if !failures.is_empty() {
                        info!("{}: {} succeeded after fallback", self.label, strategy.name());
                    }
                    return Ok(ChainOutcome {
                        value,
                        stage: strategy.name().to_string(),
                        failures,
                    });
                }
                Err(StageError::Cancelled(cancelled)) => return Err(cancelled.into()),
                Err(StageError::Provider(error)) => {
                    warn!("{}: {} failed ({}): {}", self.label, strategy.name(), error.kind(), error);
                    failures.push(StageFailure {
                        stage: strategy.name().to_string(),
                        error,
                    });
                }
            }
        }
        Err(failures
            .pop()
            .map(|failure| failure.error)
            .unwrap_or_else(|| ProviderError::Worker(format!("{} has no strategies", self.label)))
            .into())
    }
}
