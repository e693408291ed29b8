use std::time::Duration;

/// A dependency call exceeded its time budget. The underlying future is
/// dropped; whatever work it started may still complete on the remote
/// side, but its result is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineElapsed {
    pub dependency: &'static str,
    pub budget: Duration,
}

impl std::fmt::Display for DeadlineElapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} did not answer within {}ms",
            self.dependency,
            self.budget.as_millis()
        )
    }
}

impl std::error::Error for DeadlineElapsed {}

/// Awaits `fut` for at most `budget`.
///
/// Every external dependency call in the request path goes through this
/// combinator so that a slow or dead dependency degrades to an error the
/// caller can handle instead of hanging the request.
pub async fn with_deadline<F>(
    dependency: &'static str,
    budget: Duration,
    fut: F,
) -> Result<F::Output, DeadlineElapsed>
where
    F: Future,
{
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| DeadlineElapsed { dependency, budget })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_budget() {
        let result = with_deadline("fast", Duration::from_millis(100), async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn elapses_when_future_is_slow() {
        let result = with_deadline("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            42
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.dependency, "slow");
        assert_eq!(err.budget, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let result: Result<Result<(), &str>, _> =
            with_deadline("inner", Duration::from_millis(100), async { Err("boom") }).await;
        assert_eq!(result.unwrap(), Err("boom"));
    }
}
