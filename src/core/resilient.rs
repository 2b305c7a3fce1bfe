use crate::core::rate_limiter::RateLimiter;
use crate::utils::error::NlpError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 第一次呼叫之後最多再重試幾次
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// 第 n 次重試前的等待時間：base * 2^n
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// 呼叫失敗而改用 fallback 的原因
#[derive(Debug)]
pub enum FallbackReason {
    /// 每日配額已用盡，未送出請求
    DailyQuotaExhausted,
    /// 重試次數用完，保留最後一個錯誤
    RetriesExhausted(NlpError),
    /// 限流器設定無效，未送出請求
    LimiterRejected(NlpError),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::DailyQuotaExhausted => write!(f, "daily quota exhausted"),
            FallbackReason::RetriesExhausted(e) => write!(f, "retries exhausted: {}", e),
            FallbackReason::LimiterRejected(e) => write!(f, "rate limiter rejected call: {}", e),
        }
    }
}

#[derive(Debug)]
pub enum CallOutcome<T> {
    Success(T),
    Fallback(FallbackReason),
}

impl<T> CallOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            CallOutcome::Success(value) => Some(value),
            CallOutcome::Fallback(_) => None,
        }
    }
}

/// 限流 + 指數退避重試的遠端呼叫包裝；失敗時不丟出錯誤而是回傳 fallback 原因
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn call<T, F, Fut>(&self, mut request: F) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NlpError>>,
    {
        let mut retry = 0;
        loop {
            if let Err(err) = self.limiter.acquire().await {
                if err.is_daily_quota() {
                    return CallOutcome::Fallback(FallbackReason::DailyQuotaExhausted);
                }
                tracing::error!("❌ {}", err);
                return CallOutcome::Fallback(FallbackReason::LimiterRejected(err));
            }

            let err = match request().await {
                Ok(value) => return CallOutcome::Success(value),
                Err(err) => err,
            };

            if err.is_daily_quota() {
                self.limiter.mark_exhausted().await;
                return CallOutcome::Fallback(FallbackReason::DailyQuotaExhausted);
            }

            if retry >= self.policy.max_retries {
                tracing::warn!(
                    "⚠️ Remote call failed after {} retries: {}",
                    self.policy.max_retries,
                    err
                );
                return CallOutcome::Fallback(FallbackReason::RetriesExhausted(err));
            }

            let delay = self.policy.backoff(retry);
            tracing::debug!(
                "🔁 Remote call failed ({}), retry {}/{} in {:?}",
                err,
                retry + 1,
                self.policy.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
