use crate::utils::error::{NlpError, Result};
use crate::utils::validation::{validate_positive_number, Validate};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);
pub const DAY_WINDOW: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub requests_per_minute: usize,
    pub requests_per_day: usize,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: 15,
            requests_per_day: 1500,
        }
    }
}

impl Validate for RateLimits {
    fn validate(&self) -> Result<()> {
        validate_positive_number(
            "rate_limit.requests_per_minute",
            self.requests_per_minute as u64,
            1,
        )?;
        validate_positive_number("rate_limit.requests_per_day", self.requests_per_day as u64, 1)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct WindowState {
    minute_calls: VecDeque<Instant>,
    day_calls: VecDeque<Instant>,
    exhausted: bool,
}

impl WindowState {
    fn prune(&mut self, now: Instant) {
        prune_window(&mut self.minute_calls, now, MINUTE_WINDOW);
        prune_window(&mut self.day_calls, now, DAY_WINDOW);
    }
}

fn prune_window(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = calls.front() {
        if now.saturating_duration_since(oldest) >= window {
            calls.pop_front();
        } else {
            break;
        }
    }
}

/// 雙滑動視窗限流器（每分鐘、每日），狀態只存在於本程序。
///
/// 每日視窗滿了之後會設定 exhausted 旗標，之後所有呼叫立即失敗，直到程序重啟。
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// 等待直到有可用的呼叫額度。額度為 0 的設定永遠無法取得，直接回傳錯誤
    pub async fn acquire(&self) -> Result<()> {
        self.limits.validate()?;
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                if state.exhausted {
                    return Err(NlpError::DailyQuotaExhausted);
                }

                let now = Instant::now();
                state.prune(now);

                if state.day_calls.len() >= self.limits.requests_per_day {
                    state.exhausted = true;
                    tracing::warn!(
                        "🛑 Daily request limit of {} reached, failing fast until restart",
                        self.limits.requests_per_day
                    );
                    return Err(NlpError::DailyQuotaExhausted);
                }

                if state.minute_calls.len() < self.limits.requests_per_minute {
                    state.minute_calls.push_back(now);
                    state.day_calls.push_back(now);
                    return Ok(());
                }

                match state.minute_calls.front() {
                    Some(&oldest) => (oldest + MINUTE_WINDOW).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            tracing::debug!("⏳ Per-minute limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// 遠端回報每日配額用盡時呼叫
    pub async fn mark_exhausted(&self) {
        let mut state = self.state.lock().await;
        if !state.exhausted {
            tracing::warn!("🛑 Remote daily quota exceeded, failing fast until restart");
        }
        state.exhausted = true;
    }

    pub async fn is_exhausted(&self) -> bool {
        self.state.lock().await.exhausted
    }

    /// 目前兩個視窗中的呼叫數 (每分鐘, 每日)
    pub async fn usage(&self) -> (usize, usize) {
        let mut state = self.state.lock().await;
        state.prune(Instant::now());
        (state.minute_calls.len(), state.day_calls.len())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(per_minute: usize, per_day: usize) -> RateLimiter {
        RateLimiter::new(RateLimits {
            requests_per_minute: per_minute,
            requests_per_day: per_day,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_within_minute_limit_are_immediate() {
        let limiter = limiter(3, 100);
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await.unwrap();
        }

        assert_eq!(Instant::now(), start);
        assert_eq!(limiter.usage().await, (3, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_call_waits_for_oldest_to_age_out() {
        let limiter = Arc::new(limiter(2, 100));
        let start = Instant::now();

        limiter.acquire().await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.acquire().await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.acquire().await.unwrap();
                Instant::now()
            })
        };

        tokio::time::advance(Duration::from_secs(49)).await;
        assert!(!waiter.is_finished());

        let acquired_at = waiter.await.unwrap();
        assert_eq!(acquired_at.duration_since(start), MINUTE_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_limit_sets_exhausted_flag() {
        let limiter = limiter(10, 2);

        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert!(matches!(
            limiter.acquire().await,
            Err(NlpError::DailyQuotaExhausted)
        ));
        assert!(limiter.is_exhausted().await);

        // 即使每日視窗已經過去也不會重置
        tokio::time::advance(DAY_WINDOW + Duration::from_secs(1)).await;
        assert!(limiter.acquire().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_exhausted_fails_fast() {
        let limiter = limiter(10, 100);
        limiter.mark_exhausted().await;

        let start = Instant::now();
        assert!(limiter.acquire().await.is_err());
        assert_eq!(Instant::now(), start);
        assert_eq!(limiter.usage().await, (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limits_fail_without_waiting() {
        for (per_minute, per_day) in [(0, 10), (10, 0)] {
            let limiter = limiter(per_minute, per_day);
            let start = Instant::now();

            let result =
                tokio::time::timeout(Duration::from_secs(2), limiter.acquire()).await;
            assert!(
                matches!(result, Ok(Err(NlpError::InvalidConfigValueError { .. }))),
                "limits ({}, {}) should be rejected, got {:?}",
                per_minute,
                per_day,
                result
            );
            assert_eq!(Instant::now(), start);
            assert!(!limiter.is_exhausted().await);
            assert_eq!(limiter.usage().await, (0, 0));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_prune_expired_entries() {
        let limiter = limiter(5, 100);
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.usage().await, (0, 2));
    }
}
