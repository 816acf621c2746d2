use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{BackendError, Result};

/// Deadline and cancellation carried by every I/O call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Share an externally owned token, e.g. one tripped by Ctrl-C.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fails fast when the run was cancelled or the deadline passed.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(BackendError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Race `fut` against cancellation and the deadline.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        let guarded = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::DeadlineExceeded),
                },
                None => fut.await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BackendError::Cancelled),
            result = guarded => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let ctx = Context::new();
        ctx.cancel();
        assert!(matches!(ctx.check(), Err(BackendError::Cancelled)));
        let result = ctx.run(async { Ok(1) }).await;
        assert!(matches!(result, Err(BackendError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_interrupts_slow_calls() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(BackendError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn live_context_passes_results_through() {
        let ctx = Context::new().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.run(async { Ok(7) }).await.ok(), Some(7));
    }
}
